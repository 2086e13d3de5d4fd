//! Ingestion settings.

use anyhow::Context;
use mailsift_mime::{DEFAULT_MAX_DEPTH, ParseOptions};
use std::path::{Path, PathBuf};

/// Settings read from `config.json`, overridable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of messages parsed concurrently.
    pub jobs: usize,
    /// Maximum multipart nesting depth.
    pub max_depth: usize,
    /// JSON-lines output file; stdout when unset.
    pub output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            max_depth: DEFAULT_MAX_DEPTH,
            output: None,
        }
    }
}

/// One worker per available CPU.
fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

impl Config {
    /// Location of the per-user configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailsift")
            .join("config.json")
    }

    /// Loads settings from `path`, or from [`Config::default_path`] when it
    /// exists. Falls back to defaults when neither is available.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }

        let default_path = Self::default_path();
        if default_path.is_file() {
            return Self::read(&default_path);
        }

        Ok(Self::default())
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_json(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses settings from JSON. Missing fields keep their defaults.
    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_json::from_str(contents)?;
        if config.jobs == 0 {
            config.jobs = default_jobs();
        }
        Ok(config)
    }

    /// Options for the message parser.
    pub const fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_depth,
        }
    }
}
