use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Invalid plot image: {0}")]
    InvalidPlot(String),

    #[error("CLI argument error: {0}")]
    Cli(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ChatError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ChatError::Config(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        ChatError::Network(msg.into())
    }

    pub fn timeout<S: Into<String>>(endpoint: S) -> Self {
        ChatError::Timeout {
            endpoint: endpoint.into(),
        }
    }

    pub fn status<S: Into<String>>(endpoint: S, status: u16) -> Self {
        ChatError::Status {
            endpoint: endpoint.into(),
            status,
        }
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        ChatError::Decode(msg.into())
    }

    pub fn invalid_plot<S: Into<String>>(msg: S) -> Self {
        ChatError::InvalidPlot(msg.into())
    }

    pub fn cli<S: Into<String>>(msg: S) -> Self {
        ChatError::Cli(msg.into())
    }

    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Network(_) | ChatError::Timeout { .. } => true,
            ChatError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Maps a reqwest failure for `endpoint` onto the local taxonomy.
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::timeout(endpoint)
        } else if err.is_decode() {
            ChatError::decode(format!("{endpoint}: {err}"))
        } else if let Some(status) = err.status() {
            ChatError::status(endpoint, status.as_u16())
        } else {
            ChatError::network(format!("{endpoint}: {err}"))
        }
    }
}

/// Result type alias for moodchat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Retry configuration for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that tries exactly once.
    #[cfg(test)]
    pub fn none() -> Self {
        RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        }
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.max_attempts == 0 {
            return Err(ChatError::config("retry.max_attempts must be at least 1"));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(ChatError::config(format!(
                "retry.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ChatError::config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    fn next_delay(&self, delay_ms: u64) -> u64 {
        (delay_ms as f64 * self.backoff_factor).min(self.max_delay_ms as f64) as u64
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` is exhausted. Delays grow exponentially.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> ChatResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChatResult<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut delay_ms = config.base_delay_ms;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "succeeded after previous failures");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms,
                    error = %e,
                    "attempt failed with retryable error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = config.next_delay(delay_ms);
            }
            Err(e) => {
                if e.is_retryable() {
                    error!(operation = operation_name, attempts, error = %e, "giving up after retries");
                } else {
                    debug!(operation = operation_name, attempt, error = %e, "non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
