//! Configuration for the Sitedesk CLI

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sitedesk_client::{BackendClient, BackendConfig};
use sitedesk_core::IdentityStore;
use sitedesk_guard::GuardConfig;
use tracing::info;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SITEDESK_CONFIG";

/// Environment variable overriding `backend_url`
pub const BACKEND_URL_ENV: &str = "SITEDESK_BACKEND_URL";

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitedeskConfig {
    /// Base URL of the Sitedesk backend
    pub backend_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Where the signed-in identity is kept; platform data dir when unset
    #[serde(default)]
    pub identity_path: Option<PathBuf>,

    /// Idle-session timing
    #[serde(default)]
    pub guard: GuardConfig,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SitedeskConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8001".to_string(),
            request_timeout_secs: default_timeout_secs(),
            identity_path: None,
            guard: GuardConfig::default(),
        }
    }
}

impl SitedeskConfig {
    /// `$SITEDESK_CONFIG`, or `<config dir>/sitedesk/config.json`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("sitedesk")
                    .join("config.json")
            })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Load `path`, writing the defaults there first if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        info!("Created default config at {:?}", path);
        Ok(config)
    }

    /// Apply environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend_url = url;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.guard.validate().context("Invalid guard timing")?;
        Ok(())
    }

    pub fn identity_store(&self) -> Result<IdentityStore> {
        match &self.identity_path {
            Some(path) => Ok(IdentityStore::new(path.clone())),
            None => Ok(IdentityStore::default_location()?),
        }
    }

    pub fn backend(&self) -> Result<BackendClient> {
        let config = BackendConfig::new(self.backend_url.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        BackendClient::new(config).context("Cannot build backend client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = SitedeskConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, SitedeskConfig::default());
        assert_eq!(SitedeskConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"backend_url": "https://api.example.com"}"#).unwrap();

        let config = SitedeskConfig::load(&path).unwrap();
        assert_eq!(config.backend_url, "https://api.example.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.guard, GuardConfig::default());
        assert!(config.identity_path.is_none());
    }

    #[test]
    fn test_guard_timing_in_milliseconds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"backend_url": "http://localhost:8001",
                "guard": {"warn_after_ms": 120000, "purge_after_ms": 180000}}"#,
        )
        .unwrap();

        let config = SitedeskConfig::load(&path).unwrap();
        assert_eq!(config.guard, GuardConfig::strict());
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_guard_timing_is_rejected() {
        let mut config = SitedeskConfig::default();
        config.guard.purge_offset = config.guard.warn_offset;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_identity_path() {
        let dir = TempDir::new().unwrap();
        let config = SitedeskConfig {
            identity_path: Some(dir.path().join("me.json")),
            ..Default::default()
        };
        assert_eq!(
            config.identity_store().unwrap().path(),
            dir.path().join("me.json")
        );
    }

    #[test]
    fn test_backend_rejects_bad_url() {
        let config = SitedeskConfig {
            backend_url: "ftp://nowhere".to_string(),
            ..Default::default()
        };
        assert!(config.backend().is_err());
    }
}
