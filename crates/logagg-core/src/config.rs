//! Configuration types for logagg.
//!
//! [`Config::load`] layers, in order: the embedded defaults, a TOML file
//! (an explicit path, or `$XDG_CONFIG_HOME/logagg/config.toml` when it
//! exists), and `LOGAGG__SECTION__KEY` environment variables.
//! [`Config::defaults`] returns the embedded defaults without touching the
//! filesystem or the environment (useful in tests).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregator::{AggregatorOptions, FailurePolicy, DEFAULT_QUEUE_CAPACITY};

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[aggregator]
queue_capacity   = 100
workers          = 5
store_timeout_ms = 0

[server]
bind = "0.0.0.0:8080"

[simulator]
enabled     = true
source      = "server1"
message     = "This is a log message"
level       = "INFO"
interval_ms = 1000
"#;

const ENV_PREFIX: &str = "LOGAGG";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[aggregator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-record store deadline in milliseconds; 0 disables it.
    #[serde(default)]
    pub store_timeout_ms: u64,
}

fn default_queue_capacity() -> usize { DEFAULT_QUEUE_CAPACITY }
fn default_workers() -> usize { 5 }

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            store_timeout_ms: 0,
        }
    }
}

impl AggregatorConfig {
    pub fn store_timeout(&self) -> Option<Duration> {
        (self.store_timeout_ms > 0).then(|| Duration::from_millis(self.store_timeout_ms))
    }

    /// Aggregator options for this section with the given failure policy.
    pub fn options(&self, failure_policy: FailurePolicy) -> AggregatorOptions {
        AggregatorOptions {
            queue_capacity: self.queue_capacity,
            failure_policy,
            store_timeout: self.store_timeout(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "0.0.0.0:8080".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Also append every record to this JSON Lines file. Memory only when unset.
    #[serde(default)]
    pub jsonl_path: Option<PathBuf>,
}

/// `[simulator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_enabled() -> bool { true }
fn default_source() -> String { "server1".to_string() }
fn default_message() -> String { "This is a log message".to_string() }
fn default_level() -> String { "INFO".to_string() }
fn default_interval_ms() -> u64 { 1000 }

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            source: default_source(),
            message: default_message(),
            level: default_level(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl SimulatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// An explicit `path` must exist; the default XDG location is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(config_path().as_path()).required(false),
        };

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("logagg")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
