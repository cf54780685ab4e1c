//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::services::marker::{MarkerScale, DEFAULT_MARKER_SCALE};
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// What to do with a summary whose selling-point totals disagree with
/// their terminals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    /// Keep the summary, log and flag the inconsistent nodes
    #[default]
    Warn,
    /// Refuse to load the summary
    Reject,
}

impl IntegrityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityPolicy::Warn => "warn",
            IntegrityPolicy::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), timeout_ms: default_timeout_ms() }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Wall-clock time per bucket, independent of bucket spacing
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Divisor `k` in `radius = sqrt(cumulative) / k`
    #[serde(default = "default_marker_scale")]
    pub marker_scale: f64,
    /// Playback command channel capacity
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            marker_scale: default_marker_scale(),
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_marker_scale() -> f64 {
    DEFAULT_MARKER_SCALE
}

fn default_command_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SummaryConfig {
    #[serde(default)]
    pub integrity: IntegrityPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_timeout_ms: u64,
    tick_interval_ms: u64,
    marker_scale: MarkerScale,
    command_buffer: usize,
    integrity_policy: IntegrityPolicy,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            api_timeout_ms: default_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            marker_scale: MarkerScale::default(),
            command_buffer: default_command_buffer(),
            integrity_policy: IntegrityPolicy::Warn,
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Self::from_toml(toml_config, path.display().to_string())
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> anyhow::Result<Self> {
        let marker_scale = MarkerScale::new(toml_config.playback.marker_scale).with_context(|| {
            format!(
                "playback.marker_scale must be a positive number, got {}",
                toml_config.playback.marker_scale
            )
        })?;

        if toml_config.playback.tick_interval_ms == 0 {
            anyhow::bail!("playback.tick_interval_ms must be greater than zero");
        }

        Ok(Self {
            api_base_url: toml_config.api.base_url.trim_end_matches('/').to_string(),
            api_timeout_ms: toml_config.api.timeout_ms,
            tick_interval_ms: toml_config.playback.tick_interval_ms,
            marker_scale,
            command_buffer: toml_config.playback.command_buffer.max(1),
            integrity_policy: toml_config.summary.integrity,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            config_file,
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout_ms(&self) -> u64 {
        self.api_timeout_ms
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn marker_scale(&self) -> MarkerScale {
        self.marker_scale
    }

    pub fn command_buffer(&self) -> usize {
        self.command_buffer
    }

    pub fn integrity_policy(&self) -> IntegrityPolicy {
        self.integrity_policy
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to point the client at another backend
    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:8000");
        assert_eq!(config.api_timeout_ms(), 5000);
        assert_eq!(config.tick_interval_ms(), 1000);
        assert_eq!(config.marker_scale().divisor(), 10.0);
        assert_eq!(config.integrity_policy(), IntegrityPolicy::Warn);
        assert_eq!(config.metrics_interval_secs(), 10);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string()).unwrap();
        assert_eq!(config.tick_interval_ms(), 1000);
        assert_eq!(config.marker_scale(), MarkerScale::default());
        assert_eq!(config.command_buffer(), 64);
    }

    #[test]
    fn test_invalid_marker_scale_rejected() {
        let toml_config: TomlConfig = toml::from_str("[playback]\nmarker_scale = 0.0\n").unwrap();
        assert!(Config::from_toml(toml_config, "inline".to_string()).is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let toml_config: TomlConfig =
            toml::from_str("[playback]\ntick_interval_ms = 0\n").unwrap();
        assert!(Config::from_toml(toml_config, "inline".to_string()).is_err());
    }

    #[test]
    fn test_integrity_policy_parses() {
        let toml_config: TomlConfig = toml::from_str("[summary]\nintegrity = \"reject\"\n").unwrap();
        assert_eq!(toml_config.summary.integrity, IntegrityPolicy::Reject);
        assert!(toml::from_str::<TomlConfig>("[summary]\nintegrity = \"ignore\"\n").is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = Config::default().with_api_base_url("http://backend:9000/");
        assert_eq!(config.api_base_url(), "http://backend:9000");
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> = vec![
            "sales-replay".to_string(),
            "--config".to_string(),
            "config/festival.toml".to_string(),
        ];
        assert_eq!(Config::resolve_config_path(&args), "config/festival.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> =
            vec!["sales-replay".to_string(), "--config=config/prod.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/prod.toml");
    }
}
