//! The eight mandatory body columns plus the raw attribute text.

use crate::error::{ParseError, ParseErrorKind};
use crate::model::Span;
use crate::strand::{Phase, Strand};

/// A body line split into its columns, before type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawColumns<'a> {
    pub sequence: &'a str,
    pub source: &'a str,
    pub ontology: &'a str,
    pub start: &'a str,
    pub end: &'a str,
    pub score: &'a str,
    pub strand: &'a str,
    pub phase: &'a str,
    pub attributes: &'a str,
}

/// Columns 4-8 after validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Columns {
    pub span: Span,
    pub score: Option<f64>,
    pub strand: Strand,
    pub phase: Phase,
}

/// Split a body line on tabs. Anything past the ninth tab stays in the attribute column.
pub fn split_columns(line: &str) -> Result<RawColumns<'_>, ParseError> {
    let fields: Vec<&str> = line.splitn(9, '\t').collect();
    let &[sequence, source, ontology, start, end, score, strand, phase, attributes] =
        fields.as_slice()
    else {
        return Err(ParseError::new(
            ParseErrorKind::BadFieldCount,
            format!("body line has {} columns, expected 9", fields.len()),
        ));
    };
    Ok(RawColumns {
        sequence,
        source,
        ontology,
        start,
        end,
        score,
        strand,
        phase,
        attributes,
    })
}

/// Parse start/end as positive integers with start <= end.
pub fn parse_span(start: &str, end: &str) -> Result<Span, ParseError> {
    let parse = |label: &str, s: &str| {
        let v: i32 = s.trim().parse().map_err(|e| {
            ParseError::new(
                ParseErrorKind::BadCoordinate,
                format!("invalid {label} '{s}': {e}"),
            )
        })?;
        if v < 1 {
            return Err(ParseError::new(
                ParseErrorKind::BadCoordinate,
                format!("{label} {v} is not a positive coordinate"),
            ));
        }
        Ok(v)
    };
    let (start, end) = (parse("start", start)?, parse("end", end)?);
    if start > end {
        return Err(ParseError::new(
            ParseErrorKind::BadCoordinate,
            format!("start {start} > end {end}"),
        ));
    }
    Ok(Span { start, end })
}

/// `.` for no score, otherwise a floating point number.
pub fn parse_score(s: &str) -> Result<Option<f64>, ParseError> {
    if s == "." {
        return Ok(None);
    }
    let score = s.parse::<f64>().map_err(|e| {
        ParseError::new(ParseErrorKind::BadScore, format!("invalid score '{s}': {e}"))
    })?;
    if !score.is_finite() {
        return Err(ParseError::new(
            ParseErrorKind::BadScore,
            format!("score '{s}' is not a finite number"),
        ));
    }
    Ok(Some(score))
}

impl RawColumns<'_> {
    /// Validate columns 4-8 in column order.
    pub fn parse(&self) -> Result<Columns, ParseError> {
        Ok(Columns {
            span: parse_span(self.start, self.end)?,
            score: parse_score(self.score)?,
            strand: Strand::from_gff(self.strand)?,
            phase: Phase::from_gff(self.phase)?,
        })
    }
}
