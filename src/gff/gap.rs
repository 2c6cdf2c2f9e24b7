//! Gapped-alignment strings: the v3 `Gap` CIGAR form, the `cigar_*` dialects, and the
//! v2 `Gaps` block list.

use std::fmt;

use crate::error::{ParseError, ParseErrorKind};
use crate::model::{AlignBlock, Span};
use crate::strand::Strand;

/// CIGAR operation type, named from the reference's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOpType {
    Match,
    Insertion,
    Deletion,
}

/// A single CIGAR operation with type and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub op_type: CigarOpType,
    pub length: u32,
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op_type {
            CigarOpType::Match => 'M',
            CigarOpType::Insertion => 'I',
            CigarOpType::Deletion => 'D',
        };
        write!(f, "{op}{}", self.length)
    }
}

fn malformed(message: String) -> ParseError {
    ParseError::new(ParseErrorKind::MalformedAttribute, message)
}

/// Alignment-string dialects that can describe a gapped match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarFormat {
    /// GFF3 `Gap`: operator then length, `M8 D3 M6`.
    Gap,
    /// `cigar_exonerate`: operator then length, joined or space separated (`M 8 D 3`).
    Exonerate,
    /// `cigar_ensembl`: length then operator, with `I` and `D` named from the other side.
    Ensembl,
    /// `cigar_bam`: length then operator; `N` skips reference, `X` and `=` are matches.
    Bam,
}

impl CigarFormat {
    /// Checked in this order; the first one present on a line wins.
    pub const ALL: [CigarFormat; 4] = [
        CigarFormat::Gap,
        CigarFormat::Exonerate,
        CigarFormat::Ensembl,
        CigarFormat::Bam,
    ];

    #[must_use]
    pub fn attribute(self) -> &'static str {
        match self {
            CigarFormat::Gap => "Gap",
            CigarFormat::Exonerate => "cigar_exonerate",
            CigarFormat::Ensembl => "cigar_ensembl",
            CigarFormat::Bam => "cigar_bam",
        }
    }

    fn op_type(self, op: char) -> Option<CigarOpType> {
        use CigarOpType::{Deletion, Insertion, Match};
        match (self, op) {
            (_, 'M') => Some(Match),
            (CigarFormat::Gap | CigarFormat::Exonerate | CigarFormat::Bam, 'I') => Some(Insertion),
            (CigarFormat::Gap | CigarFormat::Exonerate | CigarFormat::Bam, 'D') => Some(Deletion),
            (CigarFormat::Ensembl, 'I') => Some(Deletion),
            (CigarFormat::Ensembl, 'D') => Some(Insertion),
            (CigarFormat::Bam, 'X' | '=') => Some(Match),
            (CigarFormat::Bam, 'N') => Some(Deletion),
            _ => None,
        }
    }
}

impl fmt::Display for CigarFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Parse CIGAR operations from an alignment string in the given dialect.
pub fn parse_cigar(format: CigarFormat, value: &str) -> Result<Vec<CigarOp>, ParseError> {
    let ops = match format {
        CigarFormat::Gap | CigarFormat::Exonerate => parse_op_first(format, value)?,
        CigarFormat::Ensembl | CigarFormat::Bam => parse_length_first(format, value)?,
    };
    if !ops.iter().any(|op| op.op_type == CigarOpType::Match) {
        return Err(malformed(format!("{format} has no match operation: '{value}'")));
    }
    Ok(ops)
}

fn push_op(
    ops: &mut Vec<CigarOp>,
    format: CigarFormat,
    op: char,
    length: &str,
) -> Result<(), ParseError> {
    let op_type = format
        .op_type(op)
        .ok_or_else(|| malformed(format!("invalid {format} operation: '{op}'")))?;
    let length: u32 = length
        .parse()
        .map_err(|e| malformed(format!("invalid {format} length '{length}' for '{op}': {e}")))?;
    if length == 0 {
        return Err(malformed(format!("zero-length {format} operation: '{op}'")));
    }
    ops.push(CigarOp { op_type, length });
    Ok(())
}

fn parse_op_first(format: CigarFormat, value: &str) -> Result<Vec<CigarOp>, ParseError> {
    let mut ops = Vec::new();
    let mut tokens = value.split_whitespace();
    while let Some(token) = tokens.next() {
        let mut chars = token.chars();
        let Some(op) = chars.next() else { continue };
        let mut length = chars.as_str();
        if length.is_empty() && format == CigarFormat::Exonerate {
            length = tokens.next().unwrap_or_default();
        }
        push_op(&mut ops, format, op, length)?;
    }
    Ok(ops)
}

fn parse_length_first(format: CigarFormat, value: &str) -> Result<Vec<CigarOp>, ParseError> {
    let value = value.trim();
    let mut ops = Vec::new();
    let mut digits_from = 0;
    for (i, c) in value.char_indices() {
        if c.is_ascii_digit() {
            continue;
        }
        let digits = &value[digits_from..i];
        // a bare operator stands for a length of one
        push_op(&mut ops, format, c, if digits.is_empty() { "1" } else { digits })?;
        digits_from = i + c.len_utf8();
    }
    if digits_from < value.len() {
        return Err(malformed(format!(
            "{format} ends without an operator: '{value}'"
        )));
    }
    Ok(ops)
}

/// Check that the operations walk exactly across both extents.
pub fn check_cigar_lengths(
    format: CigarFormat,
    ops: &[CigarOp],
    query: Span,
    target: Span,
) -> Result<(), ParseError> {
    let (mut on_query, mut on_target) = (0_i64, 0_i64);
    for op in ops {
        let length = i64::from(op.length);
        match op.op_type {
            CigarOpType::Match => {
                on_query += length;
                on_target += length;
            }
            CigarOpType::Deletion => on_query += length,
            CigarOpType::Insertion => on_target += length,
        }
    }
    if on_query != query.len() || on_target != target.len() {
        return Err(malformed(format!(
            "{format} covers {on_query} reference and {on_target} match bases, \
             expected {} and {}",
            query.len(),
            target.len()
        )));
    }
    Ok(())
}

/// Walks one sequence's coordinates in its strand direction.
struct Cursor {
    pos: i64,
    reverse: bool,
}

impl Cursor {
    fn new(span: Span, strand: Strand) -> Self {
        let reverse = strand.is_reverse();
        let pos = if reverse { span.end } else { span.start };
        Self {
            pos: i64::from(pos),
            reverse,
        }
    }

    fn take(&mut self, length: u32) -> Span {
        let length = i64::from(length);
        let (a, b) = if self.reverse {
            (self.pos - length + 1, self.pos)
        } else {
            (self.pos, self.pos + length - 1)
        };
        self.skip(length as u32);
        Span::new(clamp_i32(a), clamp_i32(b))
    }

    fn skip(&mut self, length: u32) {
        let length = i64::from(length);
        if self.reverse {
            self.pos -= length;
        } else {
            self.pos += length;
        }
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Expand CIGAR operations into aligned blocks.
///
/// `M` advances both sequences, `D` only the query, `I` only the target. Reverse-strand
/// sequences are walked from their end downward.
#[must_use]
pub fn cigar_to_blocks(
    ops: &[CigarOp],
    query: Span,
    query_strand: Strand,
    target: Span,
    target_strand: Strand,
) -> Vec<AlignBlock> {
    let mut q = Cursor::new(query, query_strand);
    let mut t = Cursor::new(target, target_strand);
    let mut blocks = Vec::new();

    for op in ops {
        match op.op_type {
            CigarOpType::Match => blocks.push(AlignBlock {
                query: q.take(op.length),
                target: t.take(op.length),
            }),
            CigarOpType::Deletion => q.skip(op.length),
            CigarOpType::Insertion => t.skip(op.length),
        }
    }
    blocks
}

/// Distance between consecutive blocks along a strand; negative when they overlap or regress.
fn step(prev: Span, next: Span, strand: Strand) -> i64 {
    if strand.is_reverse() {
        i64::from(prev.start) - i64::from(next.end) - 1
    } else {
        i64::from(next.start) - i64::from(prev.end) - 1
    }
}

/// Re-encode blocks as a `Gap` string, or `None` when they cannot be expressed as one
/// walk from the extents (unequal block lengths, regressions, or loose ends).
#[must_use]
pub fn blocks_to_cigar(
    blocks: &[AlignBlock],
    query: Span,
    query_strand: Strand,
    target: Span,
    target_strand: Strand,
) -> Option<String> {
    let first = blocks.first()?;
    let last = blocks.last()?;
    if blocks.iter().any(|b| b.query.len() != b.target.len()) {
        return None;
    }

    let starts_at = |block: Span, extent: Span, strand: Strand| {
        if strand.is_reverse() {
            block.end == extent.end
        } else {
            block.start == extent.start
        }
    };
    let ends_at = |block: Span, extent: Span, strand: Strand| {
        if strand.is_reverse() {
            block.start == extent.start
        } else {
            block.end == extent.end
        }
    };
    if !starts_at(first.query, query, query_strand)
        || !starts_at(first.target, target, target_strand)
        || !ends_at(last.query, query, query_strand)
        || !ends_at(last.target, target, target_strand)
    {
        return None;
    }

    let op = |op_type, length: i64| CigarOp {
        op_type,
        length: length as u32,
    };
    let mut ops = vec![op(CigarOpType::Match, first.query.len())];
    for pair in blocks.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let dq = step(prev.query, next.query, query_strand);
        let dt = step(prev.target, next.target, target_strand);
        if dq < 0 || dt < 0 {
            return None;
        }
        if dq > 0 {
            ops.push(op(CigarOpType::Deletion, dq));
        }
        if dt > 0 {
            ops.push(op(CigarOpType::Insertion, dt));
        }
        ops.push(op(CigarOpType::Match, next.query.len()));
    }

    Some(
        ops.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Parse a v2 `Gaps` value: comma-separated groups of `qstart qend tstart tend`.
pub fn parse_v2_gaps(value: &str) -> Result<Vec<AlignBlock>, ParseError> {
    let mut blocks = Vec::new();
    for group in value.split(',') {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let numbers: Vec<i32> = group
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| malformed(format!("invalid Gaps group '{group}': {e}")))?;
        let &[q1, q2, t1, t2] = numbers.as_slice() else {
            return Err(malformed(format!(
                "Gaps group has {} numbers, expected 4: '{group}'",
                numbers.len()
            )));
        };
        if q1 < 1 || q2 < 1 || t1 < 1 || t2 < 1 || q1 > q2 || t1 > t2 {
            return Err(malformed(format!("Gaps group out of order: '{group}'")));
        }
        blocks.push(AlignBlock {
            query: Span::new(q1, q2),
            target: Span::new(t1, t2),
        });
    }
    Ok(blocks)
}

/// Format blocks as a v2 `Gaps` value (unquoted).
#[must_use]
pub fn format_v2_gaps(blocks: &[AlignBlock]) -> String {
    blocks
        .iter()
        .map(|b| {
            format!(
                "{} {} {} {}",
                b.query.start, b.query.end, b.target.start, b.target.end
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(q1: i32, q2: i32, t1: i32, t2: i32) -> AlignBlock {
        AlignBlock {
            query: Span::new(q1, q2),
            target: Span::new(t1, t2),
        }
    }

    #[test]
    fn parse_ops() {
        let ops = parse_cigar(CigarFormat::Gap, "M8 D3 M6 I1 M6").unwrap();
        assert_eq!(ops.len(), 5);
        assert_eq!(
            ops[1],
            CigarOp {
                op_type: CigarOpType::Deletion,
                length: 3
            }
        );
        assert!(parse_cigar(CigarFormat::Gap, "X5").is_err());
        assert!(parse_cigar(CigarFormat::Gap, "M0").is_err());
        assert!(parse_cigar(CigarFormat::Gap, "D5").is_err());
        assert!(parse_cigar(CigarFormat::Gap, "M 5").is_err());
    }

    #[test]
    fn forward_walk() {
        let ops = parse_cigar(CigarFormat::Gap, "M8 D3 M6 I1 M6").unwrap();
        let blocks = cigar_to_blocks(&ops, Span::new(100, 122), Strand::Forward, Span::new(1, 21), Strand::Forward);
        assert_eq!(
            blocks,
            vec![block(100, 107, 1, 8), block(111, 116, 9, 14), block(117, 122, 16, 21)]
        );
    }

    #[test]
    fn reverse_query_walks_down() {
        let ops = parse_cigar(CigarFormat::Gap, "M10 D5 M10").unwrap();
        let blocks = cigar_to_blocks(&ops, Span::new(1, 25), Strand::Reverse, Span::new(1, 20), Strand::Forward);
        assert_eq!(blocks, vec![block(16, 25, 1, 10), block(1, 10, 11, 20)]);
    }

    #[test]
    fn cigar_reencoding() {
        let blocks = vec![block(100, 107, 1, 8), block(111, 116, 9, 14), block(117, 122, 16, 21)];
        let gap = blocks_to_cigar(&blocks, Span::new(100, 122), Strand::Forward, Span::new(1, 21), Strand::Forward);
        assert_eq!(gap.as_deref(), Some("M8 D3 M6 I1 M6"));

        let reverse = vec![block(16, 25, 1, 10), block(1, 10, 11, 20)];
        let gap = blocks_to_cigar(&reverse, Span::new(1, 25), Strand::Reverse, Span::new(1, 20), Strand::Forward);
        assert_eq!(gap.as_deref(), Some("M10 D5 M10"));
    }

    #[test]
    fn unencodable_blocks() {
        // file order goes backwards along the forward strand
        let regress = vec![block(200, 210, 11, 21), block(100, 110, 1, 11)];
        assert!(blocks_to_cigar(&regress, Span::new(100, 210), Strand::Forward, Span::new(1, 21), Strand::Forward).is_none());

        let uneven = vec![block(100, 129, 1, 10)];
        assert!(blocks_to_cigar(&uneven, Span::new(100, 129), Strand::Forward, Span::new(1, 10), Strand::Forward).is_none());
    }

    #[test]
    fn cigar_dialects_agree() {
        let gap = parse_cigar(CigarFormat::Gap, "M8 D3 M6 I1 M6").unwrap();
        assert_eq!(parse_cigar(CigarFormat::Exonerate, "M 8 D 3 M 6 I 1 M 6").unwrap(), gap);
        assert_eq!(parse_cigar(CigarFormat::Exonerate, "M8 D3 M6 I1 M6").unwrap(), gap);
        assert_eq!(parse_cigar(CigarFormat::Bam, "8M3D6MI6M").unwrap(), gap);
        assert_eq!(parse_cigar(CigarFormat::Bam, "8=3N6X1I6M").unwrap(), gap);
        // ensembl names insertions and deletions from the other side
        assert_eq!(parse_cigar(CigarFormat::Ensembl, "8M3I6M1D6M").unwrap(), gap);

        assert!(parse_cigar(CigarFormat::Bam, "8M3").is_err());
        assert!(parse_cigar(CigarFormat::Bam, "8M 3D").is_err());
        assert!(parse_cigar(CigarFormat::Ensembl, "8M3N").is_err());
        assert!(parse_cigar(CigarFormat::Exonerate, "M 8 D").is_err());
    }

    #[test]
    fn cigar_must_span_both_extents() {
        let ops = parse_cigar(CigarFormat::Gap, "M8 D3 M6 I1 M6").unwrap();
        assert!(check_cigar_lengths(CigarFormat::Gap, &ops, Span::new(100, 122), Span::new(1, 21)).is_ok());

        let short = parse_cigar(CigarFormat::Gap, "M50").unwrap();
        let err = check_cigar_lengths(CigarFormat::Gap, &short, Span::new(100, 109), Span::new(1, 50)).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MalformedAttribute);
        assert!(check_cigar_lengths(CigarFormat::Gap, &short, Span::new(1, 50), Span::new(1, 49)).is_err());
    }

    #[test]
    fn v2_gaps() {
        let blocks = parse_v2_gaps("100 149 1 50,160 209 51 100").unwrap();
        assert_eq!(blocks, vec![block(100, 149, 1, 50), block(160, 209, 51, 100)]);
        assert_eq!(format_v2_gaps(&blocks), "100 149 1 50,160 209 51 100");
        assert!(parse_v2_gaps("1 2 3").is_err());
        assert!(parse_v2_gaps("5 1 1 5").is_err());
    }
}
