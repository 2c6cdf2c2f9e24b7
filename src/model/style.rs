//! Minimal style records: the parts of a display style the parser and writer consult.

use serde::{Deserialize, Serialize};

use crate::term::FeatureKind;

/// A named style. Only the mode and GFF column overrides matter here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub name: String,
    /// Overrides the classifier's kind for features of sources using this style.
    #[serde(default)]
    pub mode: Option<FeatureKind>,
    /// Column 2 written for features using this style.
    #[serde(default)]
    pub gff_source: Option<String>,
    /// Column 3 written when a feature has no ontology term of its own.
    #[serde(default)]
    pub gff_feature: Option<String>,
}

impl Style {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: None,
            gff_source: None,
            gff_feature: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FeatureKind) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn id(&self) -> String {
        normalize_id(&self.name)
    }
}

/// Lower-case a display name and drop its whitespace. Used for style and featureset keys.
#[must_use]
pub fn normalize_id(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
