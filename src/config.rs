//! Application configuration module
//!
//! Settings are persisted with `confy` in the OS-specific config directory.

use crate::constant::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER, DEFAULT_CONTEXT_LINES};
use crate::version::BackendKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Confy(#[from] confy::ConfyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Config {
    pub settings: Settings,
}

impl Config {
    /// Load configuration from disk, creating default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let settings: Settings = confy::load(APP_NAME, None)?;
        info!("Load config from {:?}", Self::config_path()?);
        Ok(Self { settings })
    }

    /// Get the application data directory
    /// Falls back to a local "data" directory if platform dirs are unavailable
    pub fn data_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME) {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from("data")
        }
    }

    /// Where recovery snapshots live
    pub fn snapshot_dir(&self) -> PathBuf {
        self.settings
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("snapshots"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load().unwrap_or_else(|_| Self {
            settings: Settings::default(),
        })
    }
}

/// Word-level or line-level highlighting inside changed lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStyle {
    Word,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    LineByLine,
    SideBySide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Backend a new comparison opens with
    #[serde(default = "default_backend")]
    pub default_backend: BackendKind,

    #[serde(default = "default_diff_style")]
    pub diff_style: DiffStyle,

    /// Similarity above which changed lines are paired word by word
    #[serde(default = "default_match_words_threshold")]
    pub match_words_threshold: f32,

    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub color_blind: bool,

    /// Unchanged lines shown around each hunk
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    #[serde(default = "default_true")]
    pub snapshots_enabled: bool,

    /// Overrides the snapshot directory under the data dir
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

fn default_backend() -> BackendKind {
    BackendKind::Recovery
}

fn default_diff_style() -> DiffStyle {
    DiffStyle::Word
}

fn default_match_words_threshold() -> f32 {
    0.25
}

fn default_output_format() -> OutputFormat {
    OutputFormat::LineByLine
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            diff_style: default_diff_style(),
            match_words_threshold: default_match_words_threshold(),
            output_format: default_output_format(),
            color_blind: false,
            context_lines: default_context_lines(),
            git_binary: default_git_binary(),
            snapshots_enabled: true,
            snapshot_dir: None,
        }
    }
}
