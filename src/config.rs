//! Connection Configuration
//!
//! Handles persistent connection settings for awstab: region, endpoint
//! override, bearer token, and the per-connection error-code suppression
//! list. Values resolve as file config > environment > built-in default.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default region when neither config nor environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionConfig {
    /// AWS region for endpoint construction
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint URL override (emulators, test servers)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Bearer token attached to API calls. Signature V4 signing is out of
    /// scope; override endpoints are expected not to verify signatures.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Error codes converted into empty get results instead of failures,
    /// in addition to the plugin defaults.
    #[serde(default)]
    pub ignore_error_codes: Vec<String>,
}

impl ConnectionConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("awstab").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective region (config > AWS_REGION > AWS_DEFAULT_REGION > default)
    pub fn effective_region(&self) -> String {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Get effective endpoint override (config > AWS_ENDPOINT_URL)
    pub fn effective_endpoint(&self) -> Option<String> {
        self.endpoint_url
            .clone()
            .or_else(|| std::env::var("AWS_ENDPOINT_URL").ok())
    }

    /// Get effective bearer token (config > AWS_BEARER_TOKEN)
    pub fn effective_token(&self) -> Option<String> {
        self.bearer_token
            .clone()
            .or_else(|| std::env::var("AWS_BEARER_TOKEN").ok())
    }
}
