//! Engine configuration, stored as TOML.
//!
//! ```toml
//! store_path = "/home/me/kg.json"
//!
//! [llm]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key = "sk-..."
//! timeout_secs = 60
//! max_retries = 2
//!
//! [query]
//! top_n = 10
//!
//! [extraction]
//! min_sentence_chars = 10
//! confidence = 0.8
//! detect_fact_type = false
//! ```
//!
//! Every field is optional. Credentials only come from this file or from the
//! caller; nothing here reads the process environment.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or saving configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(tkg::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(tkg::config::parse),
        help("Check the TOML syntax. Run `tkg config` to print a valid configuration.")
    )]
    Parse { path: String, message: String },

    #[error("invalid config {path}: {field} {message}")]
    #[diagnostic(
        code(tkg::config::invalid),
        help("Fix the value in the config file. Run `tkg config` to see the defaults.")
    )]
    Invalid {
        path: String,
        field: String,
        message: String,
    },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(tkg::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_top_n() -> usize {
    crate::query::DEFAULT_TOP_N
}

fn default_min_sentence_chars() -> usize {
    10
}

fn default_extraction_confidence() -> f64 {
    0.8
}

/// Chat-completion endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token. Requests fail with `MissingCredentials` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after the first failed request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Statements handed to the summarizer per question.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Document sentences this short or shorter are skipped.
    #[serde(default = "default_min_sentence_chars")]
    pub min_sentence_chars: usize,
    /// Confidence assigned to extracted statements.
    #[serde(default = "default_extraction_confidence")]
    pub confidence: f64,
    /// Ask the extractor for fact/opinion/prediction too.
    #[serde(default)]
    pub detect_fact_type: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_sentence_chars: default_min_sentence_chars(),
            confidence: default_extraction_confidence(),
            detect_fact_type: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Everything the engine and the `tkg` binary are configured with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Store file used when `--store` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        config
            .validate()
            .map_err(|(field, message)| ConfigError::Invalid {
                path: path.display().to_string(),
                field: field.into(),
                message,
            })?;
        Ok(config)
    }

    /// Check value ranges serde cannot express. Returns the offending field.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        let confidence = self.extraction.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err((
                "extraction.confidence",
                format!("must be within [0, 1], got {confidence}"),
            ));
        }
        Ok(())
    }

    /// Load from `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }

    fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml().map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.llm.max_retries, 2);
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.query.top_n, 10);
        assert_eq!(cfg.extraction.min_sentence_chars, 10);
        assert!(!cfg.extraction.detect_fact_type);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg = EngineConfig::from_toml(
            r#"
            [llm]
            model = "local-model"

            [query]
            top_n = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.model, "local-model");
        assert_eq!(cfg.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.query.top_n, 3);
        assert_eq!(cfg.extraction, ExtractionConfig::default());
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.toml");

        let cfg = EngineConfig {
            store_path: Some(tmp.path().join("kg.json")),
            llm: LlmConfig {
                api_key: Some("sk-test".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.store_path, cfg.store_path);
        assert_eq!(loaded.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[query\ntop_n = ").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        for bad in ["1.5", "-0.1", "nan"] {
            std::fs::write(&path, format!("[extraction]\nconfidence = {bad}\n")).unwrap();
            assert!(
                matches!(
                    EngineConfig::load(&path),
                    Err(ConfigError::Invalid { ref field, .. }) if field == "extraction.confidence"
                ),
                "confidence = {bad}"
            );
        }

        std::fs::write(&path, "[extraction]\nconfidence = 1.0\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().extraction.confidence, 1.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = EngineConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.query.top_n, 10);
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = LlmConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }
}
