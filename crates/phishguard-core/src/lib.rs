//! Core types shared across the PhishGuard workspace.
//!
//! This crate holds the error type used by every other crate together with
//! the service configuration that the server loads from YAML. It carries no
//! inference logic of its own.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Top-level configuration for the inference service.
///
/// Every section has a serde default, so a partial YAML file (or an empty
/// one) yields a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address and port to bind the HTTP server to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_request_size_bytes")]
    pub max_request_size_bytes: u64,
    /// Model loading configuration.
    #[serde(default)]
    pub model: ModelConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Inference latency statistics configuration.
    #[serde(default)]
    pub stats: StatsConfig,
    /// Graceful shutdown configuration.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_request_size_bytes() -> u64 {
    64 * 1024
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_request_size_bytes: default_max_request_size_bytes(),
            model: ModelConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Where the model parameters come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the safetensors parameter file.
    #[serde(default)]
    pub weights_path: Option<String>,
    /// Number of rows in the embedding table.
    ///
    /// 97 covers every code the encoder emits (padding, 95 printable
    /// characters, unknown). Artifacts trained with a 96-row table load with
    /// `vocab_size: 96`; URLs containing unknown characters then fail to score.
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    /// Start with freshly initialised weights when `weights_path` is unset.
    ///
    /// Development only: scores are meaningless.
    #[serde(default)]
    pub allow_random_weights: bool,
    /// Compute device: `auto` (best available accelerator) or `cpu`.
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_vocab_size() -> usize {
    97
}

fn default_device() -> String {
    "auto".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: None,
            vocab_size: default_vocab_size(),
            allow_random_weights: false,
            device: default_device(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Inference latency tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Number of recent inference durations kept for percentile reporting.
    #[serde(default = "default_stats_window")]
    pub window_size: usize,
}

fn default_stats_window() -> usize {
    1000
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_size: default_stats_window(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds to wait for in-flight requests after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub timeout_seconds: u64,
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_shutdown_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum PhishGuardError {
    /// The request did not carry a usable URL.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tensor construction or forward pass failure.
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration or parameter-file problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhishGuardError {
    /// Returns `true` when the error was caused by the caller's input rather
    /// than by the service itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Serialization(_))
    }
}

/// Convenience alias for `std::result::Result<T, PhishGuardError>`.
pub type Result<T> = std::result::Result<T, PhishGuardError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
