// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Runtime settings for the toolflow engine.
//!
//! Settings resolve from three layers, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A JSON config file (explicit path, or `~/.toolflow/config.json`)
//! 3. Environment variables
//!
//! CLI flags override all of these at the binary boundary.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "model": "gemini-2.5-flash",
//!   "servers": ["http://localhost:8080/mcp", "http://localhost:8081/mcp"],
//!   "max_rounds": 20
//! }
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `GEMINI_API_KEY` | Gemini API key |
//! | `TOOLFLOW_MODEL` | Override the model identifier |
//! | `TOOLFLOW_SERVERS` | Comma-separated MCP endpoint URLs |
//! | `TOOLFLOW_MAX_ROUNDS` | Override the round cap |

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Global config directory name under the home directory.
pub const GLOBAL_CONFIG_DIR: &str = ".toolflow";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config file path (`~/.toolflow/config.json`).
pub fn get_global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Resolved runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Gemini API key. Usually supplied via `GEMINI_API_KEY` rather than
    /// written into a config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// MCP endpoint URLs. Kept as strings here; parse with
    /// [`Settings::server_urls`].
    #[serde(default)]
    pub servers: Vec<String>,

    /// Cap on model rounds per run.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Replacement system prompt, if the built-in one is not wanted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_rounds() -> u32 {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: default_model(),
            servers: Vec::new(),
            max_rounds: default_max_rounds(),
            system_prompt: None,
        }
    }
}

impl Settings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::from)
    }

    /// Resolve settings from file layers plus the environment.
    ///
    /// An explicit `path` must exist; the global file is optional.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match get_global_config_path() {
                Some(global) if global.exists() => Self::load_from_file(&global)?,
                _ => Self::default(),
            },
        };
        settings.apply_env()?;
        Ok(settings)
    }

    /// Overlay environment variables onto these settings.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("TOOLFLOW_MODEL") {
            self.model = model;
        }
        if let Ok(servers) = std::env::var("TOOLFLOW_SERVERS") {
            self.servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(rounds) = std::env::var("TOOLFLOW_MAX_ROUNDS") {
            self.max_rounds = rounds
                .parse()
                .map_err(|_| ConfigError::invalid("max_rounds", format!("not a number: {rounds}")))?;
        }
        Ok(())
    }

    /// Parse the configured endpoints into URLs.
    pub fn server_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.servers
            .iter()
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::invalid("servers", format!("{raw}: {e}")))
            })
            .collect()
    }

    /// Get the API key, or a missing-field error naming the variable.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("GEMINI_API_KEY".to_string()))
    }
}
