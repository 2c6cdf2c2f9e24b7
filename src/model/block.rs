//! Alignments and their coordinate blocks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::strand::Strand;

use super::feature_set::FeatureSet;
use super::span::Span;
use super::style::normalize_id;

/// A contiguous span of one alignment, with its own DNA and feature sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    /// Back-reference to the owning alignment's id.
    pub alignment_id: String,
    /// Span in the alignment's reference coordinates.
    pub reference: Span,
    pub strand: Strand,
    /// Sub-range that has actually been queried. Set even when nothing was found.
    pub loaded: Option<Span>,
    pub dna: Option<String>,
    /// Sequence records for other names met in FASTA sections.
    pub other_sequences: BTreeMap<String, String>,
    pub feature_sets: BTreeMap<String, FeatureSet>,
}

impl Block {
    pub fn new(alignment_id: &str, reference: Span) -> Self {
        Self {
            id: block_id(reference, Strand::Forward, reference, Strand::Forward),
            alignment_id: alignment_id.to_string(),
            reference,
            strand: Strand::Forward,
            loaded: None,
            dna: None,
            other_sequences: BTreeMap::new(),
            feature_sets: BTreeMap::new(),
        }
    }

    /// Feature set for a source name, created on first use.
    pub fn feature_set_or_insert(&mut self, name: &str) -> &mut FeatureSet {
        let id = normalize_id(name);
        let block_id = self.id.clone();
        self.feature_sets
            .entry(id)
            .or_insert_with(|| FeatureSet::new(name, &block_id))
    }

    #[must_use]
    pub fn feature_set(&self, id: &str) -> Option<&FeatureSet> {
        self.feature_sets.get(id)
    }

    pub fn feature_set_mut(&mut self, id: &str) -> Option<&mut FeatureSet> {
        self.feature_sets.get_mut(id)
    }

    /// Record that `span` has been queried, widening any earlier loaded range.
    pub fn mark_loaded(&mut self, span: Span) {
        self.loaded = Some(match self.loaded {
            Some(l) => l.union(span),
            None => span,
        });
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_sets.values().map(FeatureSet::len).sum()
    }
}

/// `refstart.refend.strand_start.end.strand`
#[must_use]
pub fn block_id(reference: Span, ref_strand: Strand, span: Span, strand: Strand) -> String {
    let sign = |s: Strand| if s.is_reverse() { '-' } else { '+' };
    format!(
        "{}.{}.{}_{}.{}.{}",
        reference.start,
        reference.end,
        sign(ref_strand),
        span.start,
        span.end,
        sign(strand)
    )
}

/// One sequence assembly and its blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub id: String,
    pub sequence_name: String,
    pub is_master: bool,
    pub blocks: Vec<Block>,
}

impl Alignment {
    pub fn new(sequence_name: &str, is_master: bool) -> Self {
        Self {
            id: normalize_id(sequence_name),
            sequence_name: sequence_name.to_string(),
            is_master,
            blocks: Vec::new(),
        }
    }

    #[must_use]
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn block_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    /// Block covering exactly `reference`, created if absent.
    pub fn block_or_insert(&mut self, reference: Span) -> &mut Block {
        let id = block_id(reference, Strand::Forward, reference, Strand::Forward);
        let index = match self.blocks.iter().position(|b| b.id == id) {
            Some(i) => i,
            None => {
                self.blocks.push(Block::new(&self.id, reference));
                self.blocks.len() - 1
            }
        };
        &mut self.blocks[index]
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.blocks.iter().map(Block::feature_count).sum()
    }
}
