//! Root of a parse session: one sequence region and everything loaded for it.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::block::{Alignment, Block};
use super::feature::Feature;
use super::span::Span;
use super::style::{Style, normalize_id};

/// Counts of what a [`Context::merge`] moved across.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub alignments_added: usize,
    pub blocks_added: usize,
    pub feature_sets_added: usize,
    pub features_added: usize,
    pub features_existing: usize,
}

/// Feature context for one sequence region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub sequence_name: String,
    /// Requested coordinate window, when one is known.
    pub window: Option<Span>,
    pub master_alignment_id: String,
    pub alignments: BTreeMap<String, Alignment>,
    pub styles: BTreeMap<String, Style>,
    pub featureset_to_column: BTreeMap<String, String>,
    /// Source name to style id.
    pub source_to_style: BTreeMap<String, String>,
}

impl Context {
    pub fn new(sequence_name: &str, window: Option<Span>) -> Self {
        Self {
            sequence_name: sequence_name.to_string(),
            window,
            master_alignment_id: normalize_id(sequence_name),
            alignments: BTreeMap::new(),
            styles: BTreeMap::new(),
            featureset_to_column: BTreeMap::new(),
            source_to_style: BTreeMap::new(),
        }
    }

    /// Adopt a sequence name learned after construction (from a header or first body line).
    pub fn set_sequence(&mut self, sequence_name: &str) {
        if self.alignments.is_empty() {
            self.sequence_name = sequence_name.to_string();
            self.master_alignment_id = normalize_id(sequence_name);
        }
    }

    pub fn add_style(&mut self, style: Style) {
        self.styles.insert(style.id(), style);
    }

    /// Style for a source: explicit mapping first, then a style named after the source.
    #[must_use]
    pub fn style_for_source(&self, source: &str) -> Option<&Style> {
        match self.source_to_style.get(source) {
            Some(id) => self.styles.get(&normalize_id(id)),
            None => self.styles.get(&normalize_id(source)),
        }
    }

    #[must_use]
    pub fn master_alignment(&self) -> Option<&Alignment> {
        self.alignments.get(&self.master_alignment_id)
    }

    pub fn master_alignment_mut(&mut self) -> &mut Alignment {
        let name = self.sequence_name.clone();
        self.alignments
            .entry(self.master_alignment_id.clone())
            .or_insert_with(|| Alignment::new(&name, true))
    }

    /// The block that receives parsed features: the master alignment's block for the window.
    pub fn master_block_mut(&mut self) -> &mut Block {
        let reference = self.window.unwrap_or_else(Span::unbounded);
        self.master_alignment_mut().block_or_insert(reference)
    }

    #[must_use]
    pub fn master_block(&self) -> Option<&Block> {
        let reference = self.window.unwrap_or_else(Span::unbounded);
        self.master_alignment()?
            .blocks
            .iter()
            .find(|b| b.reference == reference)
    }

    /// DNA of the loaded region, if a sequence section was read.
    #[must_use]
    pub fn dna(&self) -> Option<&str> {
        self.master_block()?.dna.as_deref()
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.alignments.values().map(Alignment::feature_count).sum()
    }

    /// All features of the master block, across feature sets.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.master_block()
            .into_iter()
            .flat_map(|b| b.feature_sets.values())
            .flat_map(|s| s.features.values())
    }

    /// Look a feature up by feature-set id and unique id in the master block.
    #[must_use]
    pub fn find_feature(&self, feature_set_id: &str, unique_id: &str) -> Option<&Feature> {
        self.master_block()?
            .feature_set(feature_set_id)?
            .feature(unique_id)
    }

    /// Fold a newly parsed context into this one.
    ///
    /// Structures missing here are moved in; features already present by unique id are
    /// left untouched, so merging the same data twice changes nothing.
    pub fn merge(&mut self, other: Context) -> Result<MergeStats, Error> {
        if normalize_id(&other.sequence_name) != normalize_id(&self.sequence_name) {
            return Err(Error::Validation(format!(
                "cannot merge context for '{}' into context for '{}'",
                other.sequence_name, self.sequence_name
            )));
        }

        let mut stats = MergeStats::default();
        for (id, style) in other.styles {
            self.styles.entry(id).or_insert(style);
        }
        for (set, column) in other.featureset_to_column {
            self.featureset_to_column.entry(set).or_insert(column);
        }
        for (source, style) in other.source_to_style {
            self.source_to_style.entry(source).or_insert(style);
        }
        if self.window.is_none() {
            self.window = other.window;
        }

        for (id, alignment) in other.alignments {
            let Some(existing) = self.alignments.get_mut(&id) else {
                stats.alignments_added += 1;
                stats.blocks_added += alignment.blocks.len();
                stats.features_added += alignment.feature_count();
                self.alignments.insert(id, alignment);
                continue;
            };
            for block in alignment.blocks {
                match existing.block_mut(&block.id) {
                    Some(target) => merge_block(target, block, &mut stats),
                    None => {
                        stats.blocks_added += 1;
                        stats.features_added += block.feature_count();
                        existing.blocks.push(block);
                    }
                }
            }
        }

        debug!(
            "merged context {}: {} features added, {} already present",
            self.sequence_name, stats.features_added, stats.features_existing
        );
        Ok(stats)
    }
}

fn merge_block(target: &mut Block, source: Block, stats: &mut MergeStats) {
    if let Some(loaded) = source.loaded {
        target.mark_loaded(loaded);
    }
    if target.dna.is_none() {
        target.dna = source.dna;
    }
    for (name, seq) in source.other_sequences {
        target.other_sequences.entry(name).or_insert(seq);
    }

    for (id, set) in source.feature_sets {
        let Some(existing) = target.feature_sets.get_mut(&id) else {
            stats.feature_sets_added += 1;
            stats.features_added += set.len();
            target.feature_sets.insert(id, set);
            continue;
        };
        if existing.style_id.is_none() {
            existing.style_id = set.style_id;
        }
        for (uid, feature) in set.features {
            if existing.features.contains_key(&uid) {
                stats.features_existing += 1;
            } else {
                existing.features.insert(uid, feature);
                stats.features_added += 1;
            }
        }
    }
}
