//! Configuration system for efficientsqs.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $EFFICIENTSQS_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/efficientsqs/config.toml
//!   3. ~/.config/efficientsqs/config.toml
//!
//! Loading never validates. Callers run [`EfficientSqsConfig::validate`]
//! before handing the value to any component.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::batch::{BatchLimits, MAX_BATCH_ITEMS};
use crate::ingest::IngestPolicy;
use crate::packing::PackLimits;

/// Largest message the downstream queue accepts (1 MiB).
pub const DOWNSTREAM_MAX_MESSAGE_SIZE: usize = 1_048_576;

pub const MIN_POLLING_MS: u64 = 50;
pub const MAX_POLLING_MS: u64 = 10_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficientSqsConfig {
    pub server: ServerConfig,
    pub buffer: BufferConfig,
    pub downstream: DownstreamConfig,
    pub consolidation: ConsolidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ingestion listen port.
    pub port: u16,
    /// Route that accepts producer POSTs.
    pub route_pattern: String,
    pub mode: RuntimeMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub backend: BufferBackend,
    pub host: String,
    pub port: u16,
    /// Name of the FIFO list holding not-yet-consolidated messages.
    pub queue_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    pub backend: DownstreamBackend,
    pub queue_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub polling_ms: u64,
    pub min_message_size: usize,
    pub max_message_size: usize,
    /// Byte budget of one batch submission.
    pub max_batch_bytes: usize,
    pub separator: String,
    pub compression: Compression,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Debug,
    #[default]
    Release,
}

impl RuntimeMode {
    /// Log level used when RUST_LOG is unset.
    pub fn default_log_level(self) -> &'static str {
        match self {
            RuntimeMode::Debug => "debug",
            RuntimeMode::Release => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamBackend {
    #[default]
    Sqs,
    Memory,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            route_pattern: "/sqs".to_string(),
            mode: RuntimeMode::Release,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            backend: BufferBackend::Redis,
            host: "localhost".to_string(),
            port: 6379,
            queue_name: "queue_b1946ac92".to_string(),
        }
    }
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            backend: DownstreamBackend::Sqs,
            queue_name: String::new(),
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            polling_ms: 100,
            min_message_size: 1,
            max_message_size: DOWNSTREAM_MAX_MESSAGE_SIZE,
            max_batch_bytes: DOWNSTREAM_MAX_MESSAGE_SIZE,
            separator: String::new(),
            compression: Compression::None,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("efficientsqs")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid environment override {0}={1:?}")]
    BadOverride(&'static str, String),
    #[error("config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl EfficientSqsConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            EfficientSqsConfig::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("EFFICIENTSQS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&EfficientSqsConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply EFFICIENTSQS_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parsed<T: std::str::FromStr>(key: &'static str, v: String) -> Result<T, ConfigError> {
            v.parse().map_err(|_| ConfigError::BadOverride(key, v))
        }
        fn keyword<T: for<'de> Deserialize<'de>>(
            key: &'static str,
            v: String,
        ) -> Result<T, ConfigError> {
            T::deserialize(serde::de::value::StrDeserializer::<serde::de::value::Error>::new(&v))
                .map_err(|_| ConfigError::BadOverride(key, v))
        }

        if let Some(v) = lookup("EFFICIENTSQS_SERVER__PORT") {
            self.server.port = parsed("EFFICIENTSQS_SERVER__PORT", v)?;
        }
        if let Some(v) = lookup("EFFICIENTSQS_SERVER__MODE") {
            self.server.mode = keyword("EFFICIENTSQS_SERVER__MODE", v)?;
        }
        if let Some(v) = lookup("EFFICIENTSQS_BUFFER__HOST") {
            self.buffer.host = v;
        }
        if let Some(v) = lookup("EFFICIENTSQS_BUFFER__PORT") {
            self.buffer.port = parsed("EFFICIENTSQS_BUFFER__PORT", v)?;
        }
        if let Some(v) = lookup("EFFICIENTSQS_BUFFER__QUEUE_NAME") {
            self.buffer.queue_name = v;
        }
        if let Some(v) = lookup("EFFICIENTSQS_DOWNSTREAM__QUEUE_NAME") {
            self.downstream.queue_name = v;
        }
        if let Some(v) = lookup("EFFICIENTSQS_CONSOLIDATION__POLLING_MS") {
            self.consolidation.polling_ms = parsed("EFFICIENTSQS_CONSOLIDATION__POLLING_MS", v)?;
        }
        if let Some(v) = lookup("EFFICIENTSQS_CONSOLIDATION__SEPARATOR") {
            self.consolidation.separator = v;
        }
        if let Some(v) = lookup("EFFICIENTSQS_CONSOLIDATION__COMPRESSION") {
            self.consolidation.compression = keyword("EFFICIENTSQS_CONSOLIDATION__COMPRESSION", v)?;
        }
        Ok(())
    }

    /// Check every option against its allowed range. The first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.consolidation;

        if !(MIN_POLLING_MS..=MAX_POLLING_MS).contains(&c.polling_ms) {
            return Err(invalid(
                "consolidation.polling_ms",
                format!("must be between {MIN_POLLING_MS} and {MAX_POLLING_MS}, got {}", c.polling_ms),
            ));
        }
        if c.max_message_size == 0 || c.max_message_size > DOWNSTREAM_MAX_MESSAGE_SIZE {
            return Err(invalid(
                "consolidation.max_message_size",
                format!("must be between 1 and {DOWNSTREAM_MAX_MESSAGE_SIZE}, got {}", c.max_message_size),
            ));
        }
        if c.min_message_size == 0 || c.min_message_size > c.max_message_size {
            return Err(invalid(
                "consolidation.min_message_size",
                format!("must be between 1 and max_message_size, got {}", c.min_message_size),
            ));
        }
        if c.max_batch_bytes < c.max_message_size {
            return Err(invalid(
                "consolidation.max_batch_bytes",
                "must be at least max_message_size",
            ));
        }
        if c.separator.is_empty() {
            return Err(invalid("consolidation.separator", "must be set"));
        }
        if c.separator.len() >= c.max_message_size {
            return Err(invalid(
                "consolidation.separator",
                "must be shorter than max_message_size",
            ));
        }
        if self.buffer.queue_name.is_empty() {
            return Err(invalid("buffer.queue_name", "must be set"));
        }
        if self.downstream.backend == DownstreamBackend::Sqs && self.downstream.queue_name.is_empty() {
            return Err(invalid("downstream.queue_name", "must be set"));
        }
        let route = &self.server.route_pattern;
        if !route.starts_with('/') {
            return Err(invalid("server.route_pattern", "must start with '/'"));
        }
        if route == "/status" {
            return Err(invalid("server.route_pattern", "collides with /status"));
        }
        Ok(())
    }

    // ── Component views ───────────────────────────────────────────────────────

    pub fn pack_limits(&self) -> PackLimits {
        PackLimits {
            max_message_size: self.consolidation.max_message_size,
            separator: Bytes::from(self.consolidation.separator.clone().into_bytes()),
        }
    }

    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_items: MAX_BATCH_ITEMS,
            max_bytes: self.consolidation.max_batch_bytes,
        }
    }

    pub fn ingest_policy(&self) -> IngestPolicy {
        IngestPolicy {
            min_message_size: self.consolidation.min_message_size,
            max_message_size: self.consolidation.max_message_size,
            separator: Bytes::from(self.consolidation.separator.clone().into_bytes()),
            compression: self.consolidation.compression,
        }
    }

    pub fn polling_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.consolidation.polling_ms)
    }
}
