//! Environment-driven configuration.

use crate::error::{GraphMemError, Result};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000/mcp";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Connection and logging settings for the orchestration layer.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Address of the remote tool server.
    pub server_url: String,
    /// Default log filter when RUST_LOG is unset.
    pub log_level: String,
    /// Optional graph partition scope passed through to searches.
    pub group_id: Option<String>,
}

impl GraphConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: std::env::var("GRAPHMEM_SERVER_URL")
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),
            log_level: std::env::var("GRAPHMEM_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            group_id: std::env::var("GRAPHMEM_GROUP_ID").ok(),
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Check connection parameters before any connect attempt.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(GraphMemError::Configuration(
                "GRAPHMEM_SERVER_URL is empty".into(),
            ));
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(GraphMemError::Configuration(format!(
                "server URL must be http(s): {}",
                self.server_url
            )));
        }
        Ok(())
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            group_id: None,
        }
    }
}
