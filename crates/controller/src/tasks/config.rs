//! Controller Configuration
//!
//! Loaded from a YAML file mounted into the controller pod. Every section is optional and
//! falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main controller configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Requeue behaviour of the reconciler
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// HTTP probe server
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Requeue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    /// Periodic re-reconcile after a successful pass; 0 waits for the next change
    #[serde(default)]
    pub resync_interval_seconds: u64,

    /// Delay before retrying a pass that lost an optimistic-concurrency race
    #[serde(default = "default_conflict_requeue_seconds")]
    pub conflict_requeue_seconds: u64,

    /// Delay before retrying a pass that failed for any other reason
    #[serde(default = "default_error_requeue_seconds")]
    pub error_requeue_seconds: u64,
}

impl ReconcileConfig {
    #[must_use]
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_seconds > 0)
            .then(|| Duration::from_secs(self.resync_interval_seconds))
    }

    #[must_use]
    pub fn conflict_requeue(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_seconds)
    }

    #[must_use]
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_seconds)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            resync_interval_seconds: 0,
            conflict_requeue_seconds: default_conflict_requeue_seconds(),
            error_requeue_seconds: default_error_requeue_seconds(),
        }
    }
}

fn default_conflict_requeue_seconds() -> u64 {
    1
}

fn default_error_requeue_seconds() -> u64 {
    30
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl ControllerConfig {
    /// Validate that the configuration can drive the controller
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.reconcile.conflict_requeue_seconds == 0 {
            return Err(anyhow::anyhow!(
                "reconcile.conflictRequeueSeconds must be greater than zero"
            ));
        }
        if self.reconcile.error_requeue_seconds == 0 {
            return Err(anyhow::anyhow!(
                "reconcile.errorRequeueSeconds must be greater than zero"
            ));
        }
        self.server
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| {
                anyhow::anyhow!(
                    "server.bindAddress '{}' is not a socket address: {e}",
                    self.server.bind_address
                )
            })?;
        Ok(())
    }

    /// Load configuration from mounted `ConfigMap` file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, anyhow::Error> {
        serde_yaml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))
    }
}
