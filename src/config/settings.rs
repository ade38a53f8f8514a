//! TOML-based settings for tablesmith.
//!
//! Example configuration:
//! ```toml
//! [compile]
//! default_join_type = "left"   # inner | left | right | full
//!
//! [log]
//! filter = "tablesmith=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::CompileOptions;
use crate::plan::JoinType;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub compile: CompileSettings,
    pub log: LogSettings,
}

/// Compiler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Join type used when a join condition has no fifth element.
    pub default_join_type: String,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            default_join_type: "inner".to_string(),
        }
    }
}

/// Logging settings, read by the CLI only.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.compile_options()?;
        Ok(settings)
    }

    /// Load settings from the default locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TABLESMITH_CONFIG`
    /// 2. `./tablesmith.toml`
    ///
    /// Falls back to defaults when neither exists.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TABLESMITH_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tablesmith.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    /// Compiler options described by these settings.
    pub fn compile_options(&self) -> Result<CompileOptions, SettingsError> {
        let join_type = self
            .compile
            .default_join_type
            .parse::<JoinType>()
            .map_err(|_| {
                SettingsError::InvalidConfig(format!(
                    "compile.default_join_type: unknown join type '{}'",
                    self.compile.default_join_type
                ))
            })?;
        Ok(CompileOptions::default().with_default_join_type(join_type))
    }
}
