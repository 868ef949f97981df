//! Persisted user defaults for chanmix
//!
//! Stores preferred processing parameters. Values given on the command line
//! always win over the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::wav::OutputFormat;

/// Errors reading or writing the defaults file
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Cannot read config '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Cannot write config '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// User defaults
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// Frame duration in milliseconds
    pub frame_duration: Option<u32>,
    /// Frame overlap in percent
    pub overlap: Option<u32>,
    pub volume: Option<f64>,
    /// WAV sample format
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if the file doesn't exist or can't be read.
    pub fn load() -> Self {
        Self::load_or_default(&Self::config_path()).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Self::default()
        })
    }

    /// Load config from `path`, or the default config when it doesn't exist
    ///
    /// Other read errors are returned.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigFileError> {
        match Self::load_from(path) {
            Err(ConfigFileError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            result => result,
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigFileError> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let write_err = |source| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, self.serialize()).map_err(write_err)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chanmix")
            .join("config.txt")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "frame_duration" => config.frame_duration = parse_value(key, value),
                "overlap" => config.overlap = parse_value(key, value),
                "volume" => config.volume = parse_value(key, value),
                "format" => config.format = parse_value(key, value),
                _ => {}
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# chanmix defaults".to_string()];

        if let Some(duration) = self.frame_duration {
            lines.push(format!("frame_duration={}", duration));
        }
        if let Some(overlap) = self.overlap {
            lines.push(format!("overlap={}", overlap));
        }
        if let Some(volume) = self.volume {
            lines.push(format!("volume={}", volume));
        }
        if let Some(format) = self.format {
            lines.push(format!("format={}", format));
        }

        lines.join("\n")
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring invalid value '{}' for '{}' in config", value, key);
            None
        }
    }
}
