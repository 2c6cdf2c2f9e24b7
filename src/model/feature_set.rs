//! One GFF source's worth of features.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::feature::Feature;
use super::style::normalize_id;

/// Features sharing a source column value, keyed by feature unique id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub unique_id: String,
    /// Display name, case preserved.
    pub original_id: String,
    /// Back-reference to the owning block's id.
    pub block_id: String,
    /// Resolved style id; `None` until resolved.
    pub style_id: Option<String>,
    pub features: BTreeMap<String, Feature>,
}

impl FeatureSet {
    pub fn new(name: &str, block_id: &str) -> Self {
        Self {
            unique_id: normalize_id(name),
            original_id: name.to_string(),
            block_id: block_id.to_string(),
            style_id: None,
            features: BTreeMap::new(),
        }
    }

    /// Insert a feature unless one with the same unique id exists. Returns whether it was added.
    pub fn add_feature(&mut self, mut feature: Feature) -> bool {
        if self.features.contains_key(&feature.unique_id) {
            return false;
        }
        feature.feature_set_id = self.unique_id.clone();
        self.features.insert(feature.unique_id.clone(), feature);
        true
    }

    #[must_use]
    pub fn feature(&self, unique_id: &str) -> Option<&Feature> {
        self.features.get(unique_id)
    }

    pub fn feature_mut(&mut self, unique_id: &str) -> Option<&mut Feature> {
        self.features.get_mut(unique_id)
    }

    pub fn remove_feature(&mut self, unique_id: &str) -> Option<Feature> {
        self.features.remove(unique_id)
    }

    /// Re-derive a feature's unique id after its extent changed and move it to the new key.
    ///
    /// Returns the key the feature ends up under. If another feature already holds the
    /// derived id, the feature keeps its old key.
    pub fn rekey(&mut self, unique_id: &str) -> Option<String> {
        let derived = self.features.get(unique_id)?.derive_unique_id();
        if derived == unique_id {
            return Some(derived);
        }
        if self.features.contains_key(&derived) {
            debug!("feature set {}: id {derived} already taken, keeping {unique_id}", self.unique_id);
            return Some(unique_id.to_string());
        }
        let mut feature = self.features.remove(unique_id)?;
        feature.unique_id = derived.clone();
        self.features.insert(derived.clone(), feature);
        Some(derived)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features ordered by start coordinate, then unique id.
    #[must_use]
    pub fn sorted_features(&self) -> Vec<&Feature> {
        let mut features: Vec<&Feature> = self.features.values().collect();
        features.sort_by(|a, b| a.x1.cmp(&b.x1).then_with(|| a.unique_id.cmp(&b.unique_id)));
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::span::Span;
    use crate::strand::Strand;
    use crate::term::FeatureKind;

    fn basic(name: &str, start: i32, end: i32) -> Feature {
        Feature::new(name, "region", FeatureKind::Basic, Span::new(start, end), Strand::Forward)
    }

    #[test]
    fn keyed_by_normalized_name() {
        let set = FeatureSet::new("Curated Genes", "1.1000.+_1.1000.+");
        assert_eq!(set.unique_id, "curatedgenes");
        assert_eq!(set.original_id, "Curated Genes");
    }

    #[test]
    fn add_is_idempotent() {
        let mut set = FeatureSet::new("ests", "b");
        assert!(set.add_feature(basic("x", 1, 10)));
        assert!(!set.add_feature(basic("x", 1, 10)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.features.values().next().unwrap().feature_set_id, "ests");
    }

    #[test]
    fn rekey_after_extend() {
        let mut set = FeatureSet::new("ests", "b");
        set.add_feature(basic("x", 1, 10));
        let old = "x_'+'_1.10".to_string();
        set.feature_mut(&old).unwrap().extend(Span::new(20, 30));
        let new = set.rekey(&old).unwrap();
        assert_eq!(new, "x_'+'_1.30");
        assert!(set.feature(&old).is_none());
        assert_eq!(set.feature(&new).unwrap().unique_id, new);
    }

    #[test]
    fn sorted_by_start() {
        let mut set = FeatureSet::new("s", "b");
        set.add_feature(basic("b", 50, 60));
        set.add_feature(basic("a", 5, 6));
        let names: Vec<_> = set.sorted_features().iter().map(|f| f.original_id.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
