//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hnpipe_core::{HttpConfig, PipelineConfig, default_workers};
use serde::Deserialize;

/// Global configuration for hnpipe
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub source: SourceSection,
    pub http: HttpSection,
    pub store: StoreSection,
    pub queue: QueueSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub workers: usize,
    pub interval_secs: u64,
    pub run_deadline_secs: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            interval_secs: 300,
            run_deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    #[serde(deserialize_with = "deserialize_env_string")]
    pub base_url: String,
    pub feed: String,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            base_url: hnpipe_hn::DEFAULT_BASE_URL.to_string(),
            feed: "topstories".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 30,
            max_retries: 0,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    #[serde(deserialize_with = "deserialize_env_path")]
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/hnpipe.duckdb"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    #[serde(deserialize_with = "deserialize_env_path")]
    pub dir: PathBuf,
    pub poll_interval_ms: u64,
    pub stats_interval_secs: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/queue"),
            poll_interval_ms: 250,
            stats_interval_secs: 60,
        }
    }
}

/// Deserialize a string that may be an environment variable reference like ${VAR}
fn deserialize_env_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    expand_env_var(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("environment variable in {raw} is not set")))
}

fn deserialize_env_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_env_string(deserializer).map(PathBuf::from)
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./hnpipe.toml (current directory)
    /// 2. the user config dir (`~/.config/hnpipe/config.toml` on Linux)
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("hnpipe.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "hnpipe") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            max_retries: self.http.max_retries,
            retry_base_delay: Duration::from_millis(self.http.retry_base_delay_ms),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.pipeline.workers,
            interval: Duration::from_secs(self.pipeline.interval_secs),
            run_deadline: self.pipeline.run_deadline_secs.map(Duration::from_secs),
            fetch: self.http_config().fetch_policy(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue.poll_interval_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.queue.stats_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.source.base_url, "https://hacker-news.firebaseio.com/v0");
        assert_eq!(config.source.feed, "topstories");
        assert_eq!(config.pipeline.interval_secs, 300);
        assert_eq!(config.http.max_retries, 0);
        assert!(config.pipeline.workers >= 1);
        assert_eq!(config.store.path, PathBuf::from("./data/hnpipe.duckdb"));
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn expand_env_var_from_environment() {
        // PATH is set in any environment the tests run in
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_var("${PATH}"), Some(path));
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[pipeline]
workers = 4
interval_secs = 60
run_deadline_secs = 120

[source]
base_url = "http://localhost:8080/v0"
feed = "newstories"

[http]
max_retries = 2

[queue]
dir = "/var/spool/hnpipe"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.feed, "newstories");
        assert_eq!(config.queue.dir, PathBuf::from("/var/spool/hnpipe"));
        assert_eq!(config.queue.poll_interval_ms, 250);

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.workers, 4);
        assert_eq!(pipeline.interval, Duration::from_secs(60));
        assert_eq!(pipeline.run_deadline, Some(Duration::from_secs(120)));
        assert_eq!(pipeline.fetch.max_retries, 2);
        assert_eq!(pipeline.fetch.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_env_var_is_parse_error() {
        let toml = r#"
[store]
path = "${NONEXISTENT_VAR_12345}"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
