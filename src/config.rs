use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::model::{Span, Style};

/// How features are treated against the requested window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    /// Keep everything.
    None,
    /// Drop features outside the window, clip the ones that straddle it.
    #[default]
    Overlap,
    /// Keep only features entirely inside the window.
    All,
}

impl FromStr for ClipMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "overlap" => Ok(Self::Overlap),
            "all" => Ok(Self::All),
            _ => Err(format!("invalid clip mode '{s}', expected none, overlap or all")),
        }
    }
}

impl fmt::Display for ClipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Overlap => write!(f, "overlap"),
            Self::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserConfig {
    /// Expected column 1 value. Adopted from the first region or body line when unset.
    pub sequence_name: Option<String>,
    pub features_start: Option<i32>,
    pub features_end: Option<i32>,
    pub clip_mode: ClipMode,
    pub so_compliant: bool,
    pub default_to_basic: bool,
    pub stop_on_error: bool,
    /// Validate and count lines without building features.
    pub parse_only: bool,
    /// Source name to style name.
    pub source_styles: BTreeMap<String, String>,
    pub styles: Vec<Style>,
    pub featureset_to_column: BTreeMap<String, String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            sequence_name: None,
            features_start: None,
            features_end: None,
            clip_mode: ClipMode::Overlap,
            so_compliant: false,
            default_to_basic: false,
            stop_on_error: false,
            parse_only: false,
            source_styles: BTreeMap::new(),
            styles: Vec::new(),
            featureset_to_column: BTreeMap::new(),
        }
    }
}

impl ParserConfig {
    /// Config for one sequence and window, everything else default.
    pub fn new(sequence_name: &str, start: i32, end: i32) -> Self {
        Self {
            sequence_name: Some(sequence_name.to_string()),
            features_start: Some(start),
            features_end: Some(end),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(start) = self.features_start
            && start < 1
        {
            bail!("invalid featuresStart {start}: coordinates are 1-based");
        }
        if let (Some(start), Some(end)) = (self.features_start, self.features_end)
            && end < start
        {
            bail!("invalid window: featuresEnd {end} is before featuresStart {start}");
        }
        for (source, style) in &self.source_styles {
            if style.trim().is_empty() {
                bail!("source '{source}' maps to an empty style name");
            }
        }
        Ok(())
    }

    /// The requested window, if either end was given.
    #[must_use]
    pub fn window(&self) -> Option<Span> {
        match (self.features_start, self.features_end) {
            (None, None) => None,
            (start, end) => Some(Span {
                start: start.unwrap_or(1),
                end: end.unwrap_or(i32::MAX),
            }),
        }
    }
}
