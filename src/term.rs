//! Feature-type term classification (column 3 → feature kind).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of feature a GFF type term maps to. Selects the payload a feature carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Basic,
    Transcript,
    Alignment,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Transcript => write!(f, "transcript"),
            Self::Alignment => write!(f, "alignment"),
        }
    }
}

const SO_ALIGNMENT: &[&str] = &[
    "nucleotide_match",
    "expressed_sequence_match",
    "EST_match",
    "cDNA_match",
    "repeat_region",
    "inverted_repeat",
    "tandem_repeat",
    "translated_nucleotide_match",
    "protein_match",
];

const SO_TRANSCRIPT: &[&str] = &[
    "exon",
    "intron",
    "pseudogene",
    "transcript",
    "protein_coding_primary_transcript",
    "CDS",
    "mRNA",
    "nc_primary_transcript",
];

const SO_BASIC: &[&str] = &[
    "reagent",
    "assembly_path",
    "oligo",
    "PCR_product",
    "RNAi_reagent",
    "clone",
    "clone_end",
    "trans_splice_acceptor_site",
    "transposable_element_insertion_site",
    "deletion",
    "region",
    "UTR",
    "polyA_signal_sequence",
    "polyA_site",
    "operon",
    "experimental_result_region",
    "chromosomal_structural_element",
    "transposable_element",
    "SNP",
    "STS",
    "sequence_variant",
    "substitution",
];

const LEGACY_ALIGNMENT: &[&str] = &["similarity", "transcription"];

const LEGACY_TRANSCRIPT: &[&str] = &[
    "transcript",
    "protein-coding_primary_transcript",
    "Sequence",
    "protein_coding_primary_transcript",
    "miRNA_primary_transcript",
    "snRNA_primary_transcript",
    "snoRNA_primary_transcript",
    "tRNA_primary_transcript",
    "rRNA_primary_transcript",
    "Pseudogene",
    "coding_exon",
    "exon",
    "intron",
];

const LEGACY_BASIC: &[&str] = &[
    "Clone",
    "repeat",
    "atg",
    "splice3",
    "splice5",
    "Clone_left_end",
    "Clone_right_end",
    "Locus",
    "SL1_acceptor_site",
    "SL2_acceptor_site",
    "utr",
    "experimental",
    "reagent",
    "structural",
    "contig",
    "supercontig",
    "misc_feature",
    "SNP",
    "complex_change_in_nucleotide_sequence",
    "trans-splice_acceptor",
    "read",
];

/// Three disjoint term lists, checked alignment first, then transcript, then basic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermList {
    pub alignment: Vec<String>,
    pub transcript: Vec<String>,
    pub basic: Vec<String>,
}

impl TermList {
    fn from_static(alignment: &[&str], transcript: &[&str], basic: &[&str]) -> Self {
        let own = |terms: &[&str]| terms.iter().map(|t| (*t).to_string()).collect();
        Self {
            alignment: own(alignment),
            transcript: own(transcript),
            basic: own(basic),
        }
    }

    fn lookup(&self, term: &str) -> Option<FeatureKind> {
        let hit = |terms: &[String]| terms.iter().any(|t| t.eq_ignore_ascii_case(term));
        if hit(&self.alignment) {
            Some(FeatureKind::Alignment)
        } else if hit(&self.transcript) {
            Some(FeatureKind::Transcript)
        } else if hit(&self.basic) {
            Some(FeatureKind::Basic)
        } else {
            None
        }
    }
}

/// Maps type terms to feature kinds. Owned by whoever composes the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermClassifier {
    pub so: TermList,
    pub legacy: TermList,
}

impl Default for TermClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TermClassifier {
    /// Classifier loaded with the built-in Sequence Ontology and legacy term lists.
    pub fn new() -> Self {
        Self {
            so: TermList::from_static(SO_ALIGNMENT, SO_TRANSCRIPT, SO_BASIC),
            legacy: TermList::from_static(LEGACY_ALIGNMENT, LEGACY_TRANSCRIPT, LEGACY_BASIC),
        }
    }

    /// Classify a type token. `None` means the term is invalid under these settings.
    ///
    /// The SO list is always consulted first. The legacy list and the basic fallback
    /// only apply when `so_compliant` is false.
    #[must_use]
    pub fn classify(
        &self,
        term: &str,
        so_compliant: bool,
        default_to_basic: bool,
    ) -> Option<FeatureKind> {
        if let Some(kind) = self.so.lookup(term) {
            return Some(kind);
        }
        if so_compliant {
            return None;
        }
        if let Some(kind) = self.legacy.lookup(term) {
            return Some(kind);
        }
        default_to_basic.then_some(FeatureKind::Basic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn so_terms() {
        let c = TermClassifier::new();
        assert_eq!(c.classify("exon", true, false), Some(FeatureKind::Transcript));
        assert_eq!(c.classify("nucleotide_match", true, false), Some(FeatureKind::Alignment));
        assert_eq!(c.classify("SNP", true, false), Some(FeatureKind::Basic));
    }

    #[test]
    fn case_insensitive() {
        let c = TermClassifier::new();
        assert_eq!(c.classify("MRNA", true, false), Some(FeatureKind::Transcript));
        assert_eq!(c.classify("est_MATCH", true, false), Some(FeatureKind::Alignment));
    }

    #[test]
    fn legacy_terms_only_when_not_compliant() {
        let c = TermClassifier::new();
        assert_eq!(c.classify("similarity", false, false), Some(FeatureKind::Alignment));
        assert_eq!(c.classify("similarity", true, false), None);
        assert_eq!(c.classify("coding_exon", false, false), Some(FeatureKind::Transcript));
        assert_eq!(c.classify("Clone_left_end", false, false), Some(FeatureKind::Basic));
    }

    #[test]
    fn default_to_basic() {
        let c = TermClassifier::new();
        assert_eq!(c.classify("bogus_term", false, true), Some(FeatureKind::Basic));
        assert_eq!(c.classify("bogus_term", false, false), None);
        // compliance wins over the basic fallback
        assert_eq!(c.classify("bogus_term", true, true), None);
    }

    #[test]
    fn alignment_checked_first() {
        let mut c = TermClassifier::new();
        c.so.basic.push("protein_match".to_string());
        assert_eq!(c.classify("protein_match", true, false), Some(FeatureKind::Alignment));
    }

    #[test]
    fn built_in_lists_are_disjoint() {
        for list in [&TermClassifier::new().so, &TermClassifier::new().legacy] {
            for a in &list.alignment {
                assert!(!list.transcript.iter().any(|t| t.eq_ignore_ascii_case(a)));
                assert!(!list.basic.iter().any(|t| t.eq_ignore_ascii_case(a)));
            }
            for t in &list.transcript {
                assert!(!list.basic.iter().any(|b| b.eq_ignore_ascii_case(t)));
            }
        }
    }
}
