//! Configuration management for bulkup.
//!
//! Settings are read from a TOML file in the XDG config directory. Every
//! section falls back to its defaults, so a partial or missing file is fine.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::upload::session::SessionSettings;
use crate::upload::TransportKind;

/// Main configuration structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub preferences: PreferencesConfig,
}

/// Where uploads go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the upload endpoints (`/check`, `/progress`, `/cancel`, `/upload`).
    pub base_url: String,

    /// Server-side folder the files are written into.
    pub target_folder: String,

    /// Connect timeout for every request.
    pub timeout_secs: u64,
}

/// Upload behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Files larger than this are listed but never selected.
    /// None means no limit.
    pub max_file_size: Option<u64>,

    pub poll_interval_ms: u64,

    /// How long the completion screen stays up before closing.
    pub close_delay_ms: u64,

    pub transport: TransportKind,

    /// Upper bound for the binary transport, which buffers every file.
    pub max_in_memory_bytes: u64,

    /// Follow symlinks when walking directories given on the command line.
    pub follow_symlinks: bool,
}

/// User interface and behavior preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Theme name to use for the TUI.
    pub theme: String,

    /// Key binding preset name.
    pub key_preset: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/upload".to_string(),
            target_folder: "/".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: None,
            poll_interval_ms: 1000,
            close_delay_ms: 3000,
            transport: TransportKind::Auto,
            max_in_memory_bytes: 64 * 1024 * 1024,
            follow_symlinks: false,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            key_preset: "arrows".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Returns the default configuration file path using XDG conventions.
    ///
    /// Returns None if the project directories cannot be determined.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "bulkup")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
    }

    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// If path is None or the file doesn't exist, returns default configuration.
    /// Read and parse errors are logged and also yield the defaults.
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let Some(config_path) = path else {
            return Self::default();
        };

        match fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file at {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file at {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file to {}", path.display()))?;

        Ok(())
    }

    /// Saves the current configuration to the default XDG config path.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_path().context("Failed to determine config directory")?;
        self.save_to(&config_path)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            target_folder: self.server.target_folder.clone(),
            poll_interval: Duration::from_millis(self.upload.poll_interval_ms.max(1)),
            close_delay: Duration::from_millis(self.upload.close_delay_ms),
        }
    }
}
