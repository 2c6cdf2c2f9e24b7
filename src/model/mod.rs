//! Feature context data model: context → alignment → block → feature set → feature.
//!
//! Ownership runs strictly downward. Upward links (`Feature::feature_set_id`,
//! `FeatureSet::block_id`, `Block::alignment_id`) are plain ids used for lookup only.

pub mod block;
pub mod context;
pub mod feature;
pub mod feature_set;
pub mod span;
pub mod style;

pub use block::{Alignment, Block};
pub use context::{Context, MergeStats};
pub use feature::{AlignBlock, Feature, FeatureData, HomolType, Homology, Transcript};
pub use feature_set::FeatureSet;
pub use span::Span;
pub use style::{Style, normalize_id};
