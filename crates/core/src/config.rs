use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sacn::frame::MAX_SOURCE_NAME_BYTES;
use crate::sacn::network_config::parse_destination;
use crate::Settings;

/// Configuration manager for Folje settings
/// Settings are stored as JSON in the user's config directory by default,
/// falling back to settings.json in the working directory
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub source_name: ConfigOption<String>,
    pub fps: ConfigOption<u32>,
    pub multicast: ConfigOption<bool>,
    pub source_address: ConfigOption<String>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to write config file: {0}")]
    Write(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to `<config dir>/Folje/settings.json`
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(Self::default_path);

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("Folje").join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("settings.json"))
    }

    /// Load settings from configuration file
    /// Writes a default file first if none exists
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content =
            fs::read_to_string(&self.config_path).map_err(|e| ConfigError::Read(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.existing_created_at().unwrap_or_else(|| now.clone());

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;

        Ok(())
    }

    /// Validate, update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            source_name: ConfigOption {
                default: "Folje".to_string(),
                valid_range: None,
                valid_choices: None,
                description: "Source name announced in sACN packets".to_string(),
                requires_restart: true,
            },
            fps: ConfigOption {
                default: 25,
                valid_range: Some((0, 120)),
                valid_choices: None,
                description: "sACN frames per second (0 sends once per second)".to_string(),
                requires_restart: false,
            },
            multicast: ConfigOption {
                default: true,
                valid_range: None,
                valid_choices: None,
                description: "Send each universe to its sACN multicast group".to_string(),
                requires_restart: false,
            },
            source_address: ConfigOption {
                default: String::new(),
                valid_range: None,
                valid_choices: None, // Populated from interface enumeration
                description: "Local IPv4 address to send from".to_string(),
                requires_restart: false,
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();
        let broadcast = &settings.broadcast;

        if let Some((min, max)) = schema.fps.valid_range {
            if broadcast.fps < min || broadcast.fps > max {
                errors.push(format!("fps must be between {} and {}", min, max));
            }
        }

        let source_address = broadcast.source_address.trim();
        if !source_address.is_empty() && source_address.parse::<Ipv4Addr>().is_err() {
            errors.push(format!(
                "source_address '{}' is not an IPv4 address",
                broadcast.source_address
            ));
        }

        for destination in &broadcast.destinations {
            if parse_destination(destination).is_none() {
                errors.push(format!(
                    "destination '{}' must be an IP address or IP:port",
                    destination
                ));
            }
        }

        if settings.source_name.trim().is_empty() {
            errors.push("source_name must not be empty".to_string());
        } else if settings.source_name.len() > MAX_SOURCE_NAME_BYTES {
            errors.push(format!(
                "source_name must be at most {} bytes",
                MAX_SOURCE_NAME_BYTES
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }

    fn existing_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        let config_file: ConfigFile = serde_json::from_str(&content).ok()?;
        Some(config_file.created_at)
    }
}
