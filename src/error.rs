//! Error types for the gffctx library.

use std::fmt;

use thiserror::Error;

/// Errors that can occur during gffctx operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A validation constraint was violated.
    #[error("{0}")]
    Validation(String),

    /// A single GFF line failed and the caller asked for it to be fatal.
    #[error(transparent)]
    Line(#[from] ParseError),

    /// Saved parser state could not be serialized or restored.
    #[error("parser state: {0}")]
    State(#[from] serde_json::Error),
}

/// Closed set of per-line failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ParseErrorKind {
    /// Missing or malformed version directive, or a bad `##sequence-region`.
    BadHeader,
    /// Body line without 9 tab-separated columns.
    BadFieldCount,
    /// Non-numeric coordinate or start > end.
    BadCoordinate,
    BadScore,
    BadStrand,
    BadPhase,
    /// Type term not recognised by the classifier.
    UnknownType,
    /// Attribute column fails its dialect grammar.
    MalformedAttribute,
    /// Stream ended in the middle of a multi-line feature or header.
    IncompleteFeature,
    /// DNA or FASTA line contains non-sequence characters.
    BadSequence,
}

impl ParseErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadHeader => "BadHeader",
            Self::BadFieldCount => "BadFieldCount",
            Self::BadCoordinate => "BadCoordinate",
            Self::BadScore => "BadScore",
            Self::BadStrand => "BadStrand",
            Self::BadPhase => "BadPhase",
            Self::UnknownType => "UnknownType",
            Self::MalformedAttribute => "MalformedAttribute",
            Self::IncompleteFeature => "IncompleteFeature",
            Self::BadSequence => "BadSequence",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded line-level failure: where it happened, what kind, and the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{kind} at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
    pub message: String,
    pub text: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            line: 0,
            kind,
            message: message.into(),
            text: String::new(),
        }
    }

    /// Attach the line number and raw text once the caller knows them.
    #[must_use]
    pub fn at(mut self, line: usize, text: &str) -> Self {
        self.line = line;
        self.text = text.to_string();
        self
    }
}
