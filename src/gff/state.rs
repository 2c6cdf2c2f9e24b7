//! Saveable parser state and the cache that holds it between invocations.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::ParserConfig;
use crate::error::{Error, ParseError};
use crate::model::Context;

use super::header::Header;
use super::{GffVersion, LineCounters};

/// Where the line parser is in a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseState {
    /// Waiting for `##gff-version`.
    #[default]
    None,
    HeaderIncomplete,
    /// Header read; the first body line is held for replay.
    HeaderComplete,
    Body,
    Sequence,
    /// Terminal: a fatal error was recorded.
    Error,
    /// Terminal: the stream was finished.
    Done,
}

impl ParseState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Done)
    }
}

/// Where sequence lines currently go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum SequenceTarget {
    /// Not inside a record yet (right after `##FASTA`).
    Unnamed,
    /// The context's own sequence: goes to the master block's DNA.
    Master,
    Other(String),
}

/// Everything a parser needs to continue a stream where it left off.
///
/// A state is handed between phases by value. It is never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserState {
    pub config: ParserConfig,
    pub state: ParseState,
    pub version: Option<GffVersion>,
    pub header: Header,
    pub line_number: usize,
    pub counters: LineCounters,
    /// First body line met during a header scan.
    pub pending_line: Option<String>,
    pub context: Context,
    pub errors: Vec<ParseError>,
    pub features_added: usize,
    /// Open multi-line features: feature set id, then grouping key, to feature unique id.
    pub(crate) multiline: BTreeMap<String, BTreeMap<String, String>>,
    /// Grouping keys dropped by the clip policy, per feature set.
    pub(crate) excluded: BTreeMap<String, BTreeSet<String>>,
    /// Keys created from component lines whose head line has not been seen yet.
    pub(crate) awaiting_head: BTreeMap<String, BTreeSet<String>>,
    pub(crate) sequence_target: Option<SequenceTarget>,
    /// In a v2 `##DNA` block rather than a FASTA section.
    pub(crate) in_dna_block: bool,
    pub(crate) region_seen: bool,
    pub(crate) warned_sequences: BTreeSet<String>,
}

impl ParserState {
    pub fn new(config: ParserConfig) -> Self {
        let mut context = Context::new(
            config.sequence_name.as_deref().unwrap_or_default(),
            config.window(),
        );
        for style in &config.styles {
            context.add_style(style.clone());
        }
        context.source_to_style = config.source_styles.clone();
        context.featureset_to_column = config.featureset_to_column.clone();

        Self {
            config,
            state: ParseState::None,
            version: None,
            header: Header::default(),
            line_number: 0,
            counters: LineCounters::default(),
            pending_line: None,
            context,
            errors: Vec::new(),
            features_added: 0,
            multiline: BTreeMap::new(),
            excluded: BTreeMap::new(),
            awaiting_head: BTreeMap::new(),
            sequence_target: None,
            in_dna_block: false,
            region_seen: false,
            warned_sequences: BTreeSet::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of multi-line features still waiting for their head line.
    #[must_use]
    pub fn awaiting_count(&self) -> usize {
        self.awaiting_head.values().map(BTreeSet::len).sum()
    }
}

/// Parser states keyed by source identity.
#[derive(Debug, Default)]
pub struct StateCache {
    states: HashMap<String, ParserState>,
}

impl StateCache {
    /// Store a state, replacing any earlier one for the same source.
    pub fn stash(&mut self, source: impl Into<String>, state: ParserState) {
        self.states.insert(source.into(), state);
    }

    /// Remove and return the state for `source`.
    pub fn take(&mut self, source: &str) -> Option<ParserState> {
        self.states.remove(source)
    }

    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.states.contains_key(source)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
