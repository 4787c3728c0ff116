//! Episode ingestion — submits canonical episodes to the remote graph
//! service through the invocation facade.
//!
//! Batches are strictly sequential and fail fast: the first failing episode
//! aborts the batch, reporting its index and the original remote error.
//! Already-submitted episodes are never rolled back by this layer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::episode::Episode;
use crate::error::{GraphMemError, Result};
use crate::mcp::GraphClient;

const ADD_MEMORY_TOOL: &str = "add_memory";

/// Drives single and batch episode submission.
pub struct IngestPipeline {
    client: Arc<GraphClient>,
}

impl IngestPipeline {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }

    /// Submit one episode. The episode is consumed; no local copy survives
    /// the call. Remote errors pass through unmodified.
    pub async fn add_single(&self, episode: Episode) -> Result<Value> {
        info!(
            name = %episode.name,
            source = episode.source.as_str(),
            body_chars = episode.body.chars().count(),
            "adding episode"
        );

        let args = build_args(&episode);
        match self.client.invoke(ADD_MEMORY_TOOL, args).await {
            Ok(result) => {
                info!(name = %episode.name, "episode added");
                Ok(result.to_json())
            }
            Err(e) => {
                error!(name = %episode.name, error = %e, "episode add failed");
                Err(e)
            }
        }
    }

    /// Submit episodes in order. On the first failure at index `k` the batch
    /// aborts: remaining episodes are not attempted and the error reports
    /// both `k` and the underlying cause.
    pub async fn add_batch(&self, episodes: Vec<Episode>) -> Result<Vec<Value>> {
        if episodes.is_empty() {
            warn!("add_batch called with no episodes");
            return Ok(Vec::new());
        }

        info!(count = episodes.len(), "adding episode batch");
        let mut acks = Vec::with_capacity(episodes.len());
        for (index, episode) in episodes.into_iter().enumerate() {
            match self.add_single(episode).await {
                Ok(ack) => acks.push(ack),
                Err(e) => {
                    error!(index, error = %e, "batch aborted");
                    return Err(GraphMemError::BatchAborted {
                        index,
                        source: Box::new(e),
                    });
                }
            }
        }
        info!(count = acks.len(), "episode batch complete");
        Ok(acks)
    }
}

fn build_args(episode: &Episode) -> Value {
    let mut args = serde_json::json!({
        "name": episode.name,
        "episode_body": episode.body,
        "source": episode.source.as_str(),
        "source_description": episode.description,
    });
    if let Some(reference_time) = &episode.reference_time {
        args["reference_time"] = Value::String(reference_time.to_rfc3339());
    }
    args
}
