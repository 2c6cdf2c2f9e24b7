//! The atomic annotated span and its kind-specific payloads.

use serde::{Deserialize, Serialize};

use crate::strand::{Phase, Strand};
use crate::term::FeatureKind;

use super::span::Span;

/// Whether an alignment's target is nucleotide or protein sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HomolType {
    #[default]
    None,
    Dna,
    Protein,
}

impl HomolType {
    /// Parse a v2 `Class` value; unknown classes map to `None`.
    #[must_use]
    pub fn from_class(class: &str) -> Self {
        let starts = |prefix: &str| {
            class
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };
        if starts("Sequence") || starts("Motif") || starts("SAGE_tag") {
            Self::Dna
        } else if starts("Protein") || starts("Mass_spec_peptide") {
            Self::Protein
        } else {
            Self::None
        }
    }

    /// Class word written in v2 output.
    #[must_use]
    pub fn class_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Dna => Some("Sequence"),
            Self::Protein => Some("Protein"),
        }
    }
}

/// One gapless aligned segment: the span on the loaded sequence and the matching target span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignBlock {
    pub query: Span,
    pub target: Span,
}

/// Alignment payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Homology {
    pub target_id: Option<String>,
    /// Union of the target spans of all blocks.
    pub target: Option<Span>,
    pub target_strand: Strand,
    pub percent_id: Option<f64>,
    pub homol_type: HomolType,
    /// Full length of the target sequence, when given.
    pub length: Option<i32>,
    pub clone_id: Option<String>,
    /// Target sequence carried inline (`sequence` attribute).
    pub sequence: Option<String>,
    /// Aligned segments in file order.
    pub blocks: Vec<AlignBlock>,
}

impl Homology {
    /// Append a block unless an identical one is already present.
    pub fn add_block(&mut self, block: AlignBlock) -> bool {
        if self.blocks.contains(&block) {
            return false;
        }
        self.target = Some(match self.target {
            Some(t) => t.union(block.target),
            None => block.target,
        });
        self.blocks.push(block);
        true
    }

    #[must_use]
    pub fn is_gapped(&self) -> bool {
        self.blocks.len() > 1
    }
}

/// Transcript payload. Introns are derived from the exons, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Exons in the order their lines appeared.
    pub exons: Vec<Span>,
    pub cds: Option<Span>,
    pub cds_phase: Phase,
    /// Codon position (1..=3) where an incomplete CDS starts.
    pub start_not_found: Option<u8>,
    pub end_not_found: bool,
}

impl Transcript {
    pub fn add_exon(&mut self, exon: Span) -> bool {
        if self.exons.contains(&exon) {
            return false;
        }
        self.exons.push(exon);
        true
    }

    /// Widen the CDS to cover `span`. The first CDS line fixes the phase.
    pub fn add_cds(&mut self, span: Span, phase: Phase) {
        self.cds = Some(match self.cds {
            Some(cds) => cds.union(span),
            None => {
                self.cds_phase = phase;
                span
            }
        });
    }

    /// Gaps between consecutive exons in coordinate order.
    #[must_use]
    pub fn introns(&self) -> Vec<Span> {
        let mut sorted = self.exons.clone();
        sorted.sort_unstable();
        sorted
            .windows(2)
            .filter(|w| w[1].start > w[0].end + 1)
            .map(|w| Span::new(w[0].end + 1, w[1].start - 1))
            .collect()
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureData {
    Basic,
    Transcript(Transcript),
    Alignment(Homology),
}

impl FeatureData {
    #[must_use]
    pub fn empty(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Basic => Self::Basic,
            FeatureKind::Transcript => Self::Transcript(Transcript::default()),
            FeatureKind::Alignment => Self::Alignment(Homology::default()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Basic => FeatureKind::Basic,
            Self::Transcript(_) => FeatureKind::Transcript,
            Self::Alignment(_) => FeatureKind::Alignment,
        }
    }
}

/// A single annotated feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Key within the owning feature set; derived from name, strand and coordinates.
    pub unique_id: String,
    /// Display name.
    pub original_id: String,
    /// Column 3 term of the first line seen for this feature.
    pub ontology: String,
    /// Column 2 as written in the file.
    pub source: String,
    /// Back-reference to the owning feature set's unique id.
    pub feature_set_id: String,
    pub style_id: Option<String>,
    pub x1: i32,
    pub x2: i32,
    pub strand: Strand,
    pub phase: Phase,
    pub score: Option<f64>,
    /// Grouping identity (`ID`, or the parent id a component was filed under).
    pub gff_id: Option<String>,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub derives_from: Option<String>,
    pub notes: Vec<String>,
    pub url: Option<String>,
    pub locus: Option<String>,
    pub variation: Option<String>,
    pub evidence: Vec<String>,
    /// Attributes with no typed field, in first-seen order.
    pub extra_attributes: Vec<(String, String)>,
    pub data: FeatureData,
}

impl Feature {
    pub fn new(
        original_id: impl Into<String>,
        ontology: impl Into<String>,
        kind: FeatureKind,
        span: Span,
        strand: Strand,
    ) -> Self {
        let mut feature = Self {
            unique_id: String::new(),
            original_id: original_id.into(),
            ontology: ontology.into(),
            source: String::new(),
            feature_set_id: String::new(),
            style_id: None,
            x1: span.start,
            x2: span.end,
            strand,
            phase: Phase::None,
            score: None,
            gff_id: None,
            name: None,
            parent: None,
            derives_from: None,
            notes: Vec::new(),
            url: None,
            locus: None,
            variation: None,
            evidence: Vec::new(),
            extra_attributes: Vec::new(),
            data: FeatureData::empty(kind),
        };
        feature.unique_id = feature.derive_unique_id();
        feature
    }

    #[must_use]
    pub fn kind(&self) -> FeatureKind {
        self.data.kind()
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span {
            start: self.x1,
            end: self.x2,
        }
    }

    /// Grow the feature's extent to cover `span`.
    pub fn extend(&mut self, span: Span) {
        self.x1 = self.x1.min(span.start);
        self.x2 = self.x2.max(span.end);
    }

    #[must_use]
    pub fn transcript(&self) -> Option<&Transcript> {
        match &self.data {
            FeatureData::Transcript(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn homology(&self) -> Option<&Homology> {
        match &self.data {
            FeatureData::Alignment(h) => Some(h),
            _ => None,
        }
    }

    /// Unique id for the feature's current name, strand and extent.
    #[must_use]
    pub fn derive_unique_id(&self) -> String {
        let target = self.homology().and_then(|h| h.target);
        make_unique_id(&self.original_id, self.strand, self.span(), target)
    }

    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra_attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// `name_'strand'_start.end`, with `_tstart.tend` appended for alignments.
#[must_use]
pub fn make_unique_id(name: &str, strand: Strand, span: Span, target: Option<Span>) -> String {
    let mut id = format!(
        "{}_'{}'_{}.{}",
        name.to_lowercase(),
        strand.as_char(),
        span.start,
        span.end
    );
    if let Some(t) = target {
        id.push_str(&format!("_{}.{}", t.start, t.end));
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_id_scheme() {
        let f = Feature::new("B0250.1", "mRNA", FeatureKind::Transcript, Span::new(100, 900), Strand::Reverse);
        assert_eq!(f.unique_id, "b0250.1_'-'_100.900");

        let target = Some(Span::new(1, 50));
        assert_eq!(
            make_unique_id("EST:Yk1", Strand::Forward, Span::new(10, 59), target),
            "est:yk1_'+'_10.59_1.50"
        );
    }

    #[test]
    fn introns_are_derived_in_coordinate_order() {
        let mut t = Transcript::default();
        t.add_exon(Span::new(500, 600));
        t.add_exon(Span::new(100, 200));
        t.add_exon(Span::new(300, 400));
        assert_eq!(t.exons[0], Span::new(500, 600));
        assert_eq!(t.introns(), vec![Span::new(201, 299), Span::new(401, 499)]);
    }

    #[test]
    fn duplicate_spans_ignored() {
        let mut t = Transcript::default();
        assert!(t.add_exon(Span::new(1, 10)));
        assert!(!t.add_exon(Span::new(1, 10)));
        assert_eq!(t.exons.len(), 1);

        let mut h = Homology::default();
        let block = AlignBlock {
            query: Span::new(100, 149),
            target: Span::new(1, 50),
        };
        assert!(h.add_block(block));
        assert!(!h.add_block(block));
        assert_eq!(h.target, Some(Span::new(1, 50)));
    }

    #[test]
    fn cds_union_keeps_first_phase() {
        let mut t = Transcript::default();
        t.add_cds(Span::new(150, 200), Phase::Two);
        t.add_cds(Span::new(300, 350), Phase::Zero);
        assert_eq!(t.cds, Some(Span::new(150, 350)));
        assert_eq!(t.cds_phase, Phase::Two);
    }

    #[test]
    fn homol_class() {
        assert_eq!(HomolType::from_class("Sequence"), HomolType::Dna);
        assert_eq!(HomolType::from_class("protein"), HomolType::Protein);
        assert_eq!(HomolType::from_class("Clone"), HomolType::None);
    }
}
