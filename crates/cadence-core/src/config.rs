use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Where the track list comes from and how hard to try loading it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// GET endpoint returning the track list as JSON.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Prefix joined with a track's `cover` field to form its cover URL.
    #[serde(default = "default_asset_base")]
    pub asset_base: String,
    /// Extra attempts after a transport error or 5xx response.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-track duration probe timeout. 0 waits forever.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    #[serde(default)]
    pub start_muted: bool,
    /// Explicit mpv executable; otherwise looked up beside the binary and on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl CatalogConfig {
    pub fn probe_timeout(&self) -> Option<Duration> {
        (self.probe_timeout_secs > 0).then(|| Duration::from_secs(self.probe_timeout_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            asset_base: default_asset_base(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            start_muted: false,
            binary: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_endpoint() -> String {
    "https://cms.samespace.com/items/songs".to_string()
}

fn default_asset_base() -> String {
    "https://cms.samespace.com/assets/".to_string()
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_probe_timeout_secs() -> u64 {
    20
}

fn default_volume() -> f32 {
    0.7
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl Config {
    /// Load from the user config dir, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            mpv: MpvConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.http.enabled);
        assert_eq!(config.http.port, 8990);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert!(config.catalog.endpoint.starts_with("https://"));
        assert!(config.catalog.asset_base.ends_with('/'));
        assert_eq!(config.catalog.probe_timeout(), Some(Duration::from_secs(20)));
        assert!(!config.mpv.start_muted);
    }

    #[test]
    fn test_zero_probe_timeout_disables_it() {
        let catalog = CatalogConfig {
            probe_timeout_secs: 0,
            ..CatalogConfig::default()
        };
        assert_eq!(catalog.probe_timeout(), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [catalog]
            endpoint = "http://localhost:9000/songs"
            fetch_retries = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.endpoint, "http://localhost:9000/songs");
        assert_eq!(config.catalog.fetch_retries, 0);
        assert_eq!(config.catalog.retry_backoff_ms, 500);
        assert_eq!(config.http.port, 8990);
        assert_eq!(config.mpv.binary, None);
    }

    #[test]
    fn test_mpv_binary_override() {
        let config: Config = toml::from_str(
            r#"
            [mpv]
            binary = "/opt/mpv/bin/mpv"
            "#,
        )
        .unwrap();
        assert_eq!(config.mpv.binary, Some(PathBuf::from("/opt/mpv/bin/mpv")));
        assert_eq!(config.mpv.default_volume, 0.7);
    }

    #[test]
    fn test_load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.catalog.fetch_retries, 2);

        let mut edited = config.clone();
        edited.mpv.start_muted = true;
        edited.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert!(reloaded.mpv.start_muted);
    }
}
