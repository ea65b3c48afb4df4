//! Layered settings: defaults, then the JSON config file, then flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use classdrive_common::{Error, Role};
use classdrive_roster::DEFAULT_EMAIL_DOMAIN;

/// Directory holding the config file and the token cache.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("classdrive")
}

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Google OAuth client-secret JSON downloaded from the Cloud console.
    pub credentials_path: PathBuf,
    pub token_cache: PathBuf,
    /// Domain appended to team member ccids.
    pub email_domain: String,
    pub default_role: Role,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_cache: config_dir().join("token.json"),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            default_role: Role::Writer,
        }
    }
}

impl AppConfig {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (config_dir().join("config.json"), false),
        };

        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Cannot read config {}: {}",
                    path.display(),
                    e
                ))
                .into())
            }
        };

        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        config
            .validate()
            .with_context(|| format!("In config {}", path.display()))?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, credentials: Option<PathBuf>, token_cache: Option<PathBuf>) -> Self {
        if let Some(credentials) = credentials {
            self.credentials_path = credentials;
        }
        if let Some(token_cache) = token_cache {
            self.token_cache = token_cache;
        }
        self
    }

    /// Domain from the flag if given, else from the settings.
    pub fn email_domain<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.unwrap_or(&self.email_domain)
    }

    fn validate(&self) -> classdrive_common::Result<()> {
        if self.email_domain.trim().is_empty() {
            return Err(Error::Config("email_domain cannot be empty".to_string()));
        }
        if self.default_role.is_owner() {
            return Err(Error::Config("default_role cannot be owner".to_string()));
        }
        Ok(())
    }
}
