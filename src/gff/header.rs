//! `##` directive parsing and the header record they fill.

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseErrorKind};
use crate::model::Span;

use super::GffVersion;

/// A `##sequence-region` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRegion {
    pub name: String,
    pub span: Span,
}

/// One recognised `##` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Version(GffVersion),
    SequenceRegion(SequenceRegion),
    /// `##FASTA`: the rest of the stream is sequence.
    Fasta,
    /// v2 `##DNA [name]`: in-line DNA follows as `##bases` lines.
    Dna(Option<String>),
    EndDna,
    /// `###`: all forward references so far are resolved.
    Closure,
    Other { name: String, value: String },
}

/// Header directives collected for a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub source_version: Option<String>,
    pub date: Option<String>,
    pub feature_ontology: Option<String>,
    pub attribute_ontology: Option<String>,
    pub source_ontology: Option<String>,
    pub species: Option<String>,
    pub genome_build: Option<String>,
    pub sequence_region: Option<SequenceRegion>,
    /// Directives with no dedicated field, in stream order.
    pub other: Vec<(String, String)>,
}

impl Header {
    /// Record a metadata directive. Structural directives are ignored here.
    pub fn record(&mut self, directive: &Directive) {
        let Directive::Other { name, value } = directive else {
            return;
        };
        let value = Some(value.clone());
        match name.as_str() {
            "source-version" => self.source_version = value,
            "date" => self.date = value,
            "feature-ontology" => self.feature_ontology = value,
            "attribute-ontology" => self.attribute_ontology = value,
            "source-ontology" => self.source_ontology = value,
            "species" => self.species = value,
            "genome-build" => self.genome_build = value,
            _ => self
                .other
                .push((name.clone(), value.unwrap_or_default())),
        }
    }
}

fn bad_header(message: String) -> ParseError {
    ParseError::new(ParseErrorKind::BadHeader, message)
}

/// Parse the version number of a `##gff-version` line. Only major versions 2 and 3 are accepted.
pub fn parse_version(value: &str) -> Result<GffVersion, ParseError> {
    let major = value.trim().split('.').next().unwrap_or_default();
    match major {
        "2" => Ok(GffVersion::V2),
        "3" => Ok(GffVersion::V3),
        _ => Err(bad_header(format!(
            "unsupported GFF version '{}', expected 2 or 3",
            value.trim()
        ))),
    }
}

fn parse_sequence_region(value: &str) -> Result<SequenceRegion, ParseError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    let &[name, start, end] = fields.as_slice() else {
        return Err(bad_header(format!(
            "##sequence-region needs name, start and end: '{value}'"
        )));
    };
    let parse = |s: &str| {
        s.parse::<i32>()
            .map_err(|e| bad_header(format!("##sequence-region coordinate '{s}': {e}")))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if start < 1 || end < start {
        return Err(bad_header(format!(
            "##sequence-region end {end} before start {start}"
        )));
    }
    Ok(SequenceRegion {
        name: name.to_string(),
        span: Span { start, end },
    })
}

/// Parse a line starting with `##` (or exactly `###`).
pub fn parse_directive(line: &str) -> Result<Directive, ParseError> {
    let line = line.trim_end();
    if line == "###" {
        return Ok(Directive::Closure);
    }
    let body = line.trim_start_matches('#').trim_start();
    let (name, value) = match body.split_once(char::is_whitespace) {
        Some((name, value)) => (name, value.trim()),
        None => (body, ""),
    };

    match name {
        "gff-version" => parse_version(value).map(Directive::Version),
        "sequence-region" => parse_sequence_region(value).map(Directive::SequenceRegion),
        "FASTA" => Ok(Directive::Fasta),
        "DNA" => Ok(Directive::Dna((!value.is_empty()).then(|| value.to_string()))),
        "end-DNA" => Ok(Directive::EndDna),
        _ => Ok(Directive::Other {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
