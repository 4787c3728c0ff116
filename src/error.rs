use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphMemError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Session not initialized — call initialize() first")]
    NotInitialized,

    #[error("Tool not found in remote catalog: {name}")]
    ToolNotFound { name: String },

    #[error("Remote invocation failed: tool={tool}, {message}")]
    Remote { tool: String, message: String },

    #[error("JSON-RPC error: code={code}, {message}")]
    JsonRpc { code: i32, message: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Batch aborted at episode {index}: {source}")]
    BatchAborted {
        index: usize,
        #[source]
        source: Box<GraphMemError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GraphMemError>;
