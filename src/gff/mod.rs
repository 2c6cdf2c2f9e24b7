//! GFF2/GFF3 reading and writing: the line parser, its resumable state, the writer and the
//! loop that feeds a parser from a line source.

pub mod attribute;
pub mod columns;
pub mod gap;
pub mod header;
pub mod parser;
pub mod state;
pub mod writer;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ParserConfig;
use crate::error::{Error, ParseError};
use crate::model::Context;
use crate::source::LineSource;

pub use parser::Parser;
pub use state::{ParseState, ParserState, StateCache};
pub use writer::Writer;

/// Attribute dialect, fixed by the `##gff-version` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GffVersion {
    V2,
    V3,
}

impl GffVersion {
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for GffVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Per-kind line counts, for progress reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCounters {
    pub header: usize,
    pub body: usize,
    pub sequence: usize,
    pub fasta_directive: usize,
    pub comment: usize,
    /// Body lines dropped by the clip policy.
    pub clipped: usize,
    /// Lines whose kind disagreed with an existing feature of the same id.
    pub type_conflicts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    /// Stream ended cleanly.
    Done,
    /// Stream ended inside the header or with multi-line features still waiting for lines.
    Incomplete,
    /// A fatal error stopped the parse.
    Failed,
    /// The cancellation flag was raised between lines.
    Cancelled,
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Done => "done",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What a finished parse reports besides the populated context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub status: ParseStatus,
    pub features_added: usize,
    /// First recorded error, if any.
    pub error: Option<ParseError>,
    pub errors: Vec<ParseError>,
    pub counters: LineCounters,
    pub last_line: usize,
}

impl ParseOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ParseStatus::Done && self.errors.is_empty()
    }
}

/// Pull lines from `source` into `parser` until the source is drained, the parser stops,
/// or `cancel` is raised. Returns `false` if cancelled.
///
/// The flag is only checked between lines.
pub fn feed<S: LineSource + ?Sized>(
    source: &mut S,
    parser: &mut Parser,
    cancel: &AtomicBool,
) -> Result<bool, Error> {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(false);
        }
        let Some(line) = source.next_line()? else {
            return Ok(true);
        };
        // per-line failures are recorded in the parser state
        let _ = parser.parse_line(&line);
        if parser.is_stopped() {
            return Ok(true);
        }
    }
}

/// Parse a whole source into a fresh context.
pub fn run<S: LineSource + ?Sized>(
    source: &mut S,
    config: ParserConfig,
) -> Result<(Context, ParseOutcome), Error> {
    run_with_cancel(source, config, &AtomicBool::new(false))
}

/// [`run`] with a cancellation flag. A cancelled parse still returns everything merged so far.
pub fn run_with_cancel<S: LineSource + ?Sized>(
    source: &mut S,
    config: ParserConfig,
    cancel: &AtomicBool,
) -> Result<(Context, ParseOutcome), Error> {
    let mut parser = Parser::new(config);
    let completed = feed(source, &mut parser, cancel)?;
    let (context, outcome) = parser.conclude(!completed);
    info!(
        "parsed {} from {}: {} features, {} errors, {} lines",
        context.sequence_name,
        source.identity(),
        outcome.features_added,
        outcome.errors.len(),
        outcome.last_line
    );
    Ok((context, outcome))
}

/// Read only the header of a source. The returned parser holds the first body line and can
/// be stashed and resumed later on the rest of the same stream.
pub fn run_header<S: LineSource + ?Sized>(
    source: &mut S,
    config: ParserConfig,
) -> Result<Parser, Error> {
    let mut parser = Parser::new(config);
    while let Some(line) = source.next_line()? {
        match parser.parse_header_line(&line) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) if parser.is_stopped() => return Err(e.into()),
            Err(_) => {}
        }
    }
    Ok(parser)
}

/// Resume a stashed parser on the remainder of its stream.
pub fn resume<S: LineSource + ?Sized>(
    source: &mut S,
    state: ParserState,
) -> Result<(Context, ParseOutcome), Error> {
    let mut parser = Parser::resume(state);
    feed(source, &mut parser, &AtomicBool::new(false))?;
    Ok(parser.finish())
}
