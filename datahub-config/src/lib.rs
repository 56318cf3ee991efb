//! Administrative configuration for the data hub: resource caps, buffer
//! caps, path limits and unit defaults. Loaded from a YAML file the same
//! way the rest of the stack's configuration is — see
//! [`HubConfig::load_file`].

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Error loading or parsing a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Load(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Administrative knobs for one hub instance (SPEC_FULL.md §6.3).
/// Unset fields fall back to [`HubConfig::default`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    /// Caps the number of resources a single client namespace may create
    /// under its `/app/<client-id>/` subtree (spec.md §4.5).
    pub max_resources_per_client: usize,
    /// Default observation buffer size cap (spec.md §3.1, §4.4) used when
    /// an observation is created without an explicit override.
    pub observation_buffer_max_count: usize,
    /// Default observation buffer time-window cap, in seconds.
    /// `inf` disables window-based eviction.
    pub observation_buffer_max_window_sec: f64,
    /// Units string assumed for a resource created without one.
    pub default_units: String,
    /// Maximum path depth (spec.md §4.1 "Design Note").
    pub max_path_depth: usize,
    /// Maximum length, in bytes, of a single path segment.
    pub max_segment_len: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_resources_per_client: 256,
            observation_buffer_max_count: 64,
            observation_buffer_max_window_sec: f64::INFINITY,
            default_units: String::new(),
            max_path_depth: 64,
            max_segment_len: 255,
        }
    }
}

impl HubConfig {
    /// Parse a YAML document directly (useful for embedding config inline
    /// or in tests).
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Load configuration from `path`. A missing file yields
    /// [`HubConfig::default`] rather than an error — a freshly deployed
    /// device with no config file still boots.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        Self::from_yaml_str(&content)
    }
}
