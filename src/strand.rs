//! Strand and phase columns of a GFF body line.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseErrorKind};

/// Strand orientation of a feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    #[default]
    None,
    Forward,
    Reverse,
}

impl Strand {
    /// Parse GFF column 7. Only `+`, `-` and `.` are accepted.
    pub fn from_gff(s: &str) -> Result<Self, ParseError> {
        match s {
            "+" => Ok(Self::Forward),
            "-" => Ok(Self::Reverse),
            "." => Ok(Self::None),
            _ => Err(ParseError::new(
                ParseErrorKind::BadStrand,
                format!("invalid strand '{s}', expected one of + - ."),
            )),
        }
    }

    #[must_use]
    pub fn is_reverse(self) -> bool {
        self == Self::Reverse
    }

    /// Character used inside feature unique ids and block ids.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Forward => '+',
            Self::Reverse => '-',
            Self::None => '.',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Reading frame of a CDS line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    None,
    Zero,
    One,
    Two,
}

impl Phase {
    /// Parse GFF column 8.
    pub fn from_gff(s: &str) -> Result<Self, ParseError> {
        match s {
            "." => Ok(Self::None),
            "0" => Ok(Self::Zero),
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            _ => Err(ParseError::new(
                ParseErrorKind::BadPhase,
                format!("invalid phase '{s}', expected one of 0 1 2 ."),
            )),
        }
    }

    #[must_use]
    pub fn offset(self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::Zero => Some(0),
            Self::One => Some(1),
            Self::Two => Some(2),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset() {
            Some(n) => write!(f, "{n}"),
            None => write!(f, "."),
        }
    }
}
