//! Search orchestration — composes the remote search strategies.
//!
//! Result ordering is the remote service's own relevance ordering; nothing
//! here re-sorts. The two composition operations deliberately diverge on
//! failure handling: the two-phase rerank converts a missing basis into an
//! empty result, while the aggregate propagates any sub-search error and
//! never returns a partial structure.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::mcp::GraphClient;
use crate::presenter::SearchRecord;

const SEARCH_NODES_TOOL: &str = "search_nodes";
const SEARCH_FACTS_TOOL: &str = "search_memory_facts";

/// Aggregate outcome of [`SearchOrchestrator::comprehensive_search`]:
/// exactly three named sections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComprehensiveResults {
    pub basic: Vec<Value>,
    pub node: Vec<Value>,
    pub center_reranked: Option<Vec<Value>>,
}

/// Exposes the remote search strategies and their compositions.
pub struct SearchOrchestrator {
    client: Arc<GraphClient>,
    group_ids: Option<Vec<String>>,
}

impl SearchOrchestrator {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            group_ids: None,
        }
    }

    /// Scope every search to the given graph partitions.
    pub fn with_group_ids(mut self, group_ids: Vec<String>) -> Self {
        self.group_ids = Some(group_ids);
        self
    }

    fn apply_group_ids(&self, args: &mut Value) {
        if let Some(group_ids) = &self.group_ids {
            args["group_ids"] = serde_json::json!(group_ids);
        }
    }

    /// Hybrid lexical+semantic search over the graph's nodes.
    pub async fn basic_search(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        info!(query, limit, "basic search");
        let mut args = serde_json::json!({
            "query": query,
            "max_nodes": limit,
        });
        self.apply_group_ids(&mut args);
        let results = result_items(self.client.invoke_json(SEARCH_NODES_TOOL, args).await?);
        info!(count = results.len(), "basic search complete");
        Ok(results)
    }

    /// Node-focused variant: entities rather than relational facts.
    pub async fn node_search(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        info!(query, limit, "node search");
        let mut args = serde_json::json!({
            "query": query,
            "max_nodes": limit,
        });
        self.apply_group_ids(&mut args);
        let results = result_items(self.client.invoke_json(SEARCH_NODES_TOOL, args).await?);
        info!(count = results.len(), "node search complete");
        Ok(results)
    }

    /// Fact search reranked by graph distance from a seed node.
    pub async fn center_node_search(
        &self,
        query: &str,
        center_node_uuid: &str,
        limit: usize,
    ) -> Result<Vec<Value>> {
        info!(query, center_node_uuid, limit, "center-node search");
        let mut args = serde_json::json!({
            "query": query,
            "max_facts": limit,
            "center_node_uuid": center_node_uuid,
        });
        self.apply_group_ids(&mut args);
        let results = result_items(self.client.invoke_json(SEARCH_FACTS_TOOL, args).await?);
        info!(count = results.len(), "center-node search complete");
        Ok(results)
    }

    /// Two-phase search: basic search, then rerank around its best hit.
    ///
    /// A missing basis — no basic results, or a first result without a
    /// resolvable node identifier — yields an empty list, not an error.
    pub async fn search_with_center_node_reranking(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Value>> {
        info!(query, limit, "search with center-node reranking");
        let initial = self.basic_search(query, limit).await?;
        let Some(first) = initial.first() else {
            warn!(query, "no basic results to seed reranking");
            return Ok(Vec::new());
        };
        let Some(center_node_uuid) = SearchRecord::from_value(first).uuid else {
            warn!(query, "first basic result has no resolvable uuid");
            return Ok(Vec::new());
        };

        info!(center_node_uuid = %center_node_uuid, "reranking around center node");
        self.center_node_search(query, &center_node_uuid, limit)
            .await
    }

    /// Run every strategy and aggregate the outcomes.
    ///
    /// Unlike the two-phase variant, any sub-search error aborts the whole
    /// call; no partial aggregate is ever returned.
    pub async fn comprehensive_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<ComprehensiveResults> {
        info!(query, limit, "comprehensive search");
        let basic = self.basic_search(query, limit).await?;
        let node = self.node_search(query, limit).await?;

        let center_reranked = match basic.first().and_then(|v| SearchRecord::from_value(v).uuid) {
            Some(center_node_uuid) => Some(
                self.center_node_search(query, &center_node_uuid, limit)
                    .await?,
            ),
            None => None,
        };

        Ok(ComprehensiveResults {
            basic,
            node,
            center_reranked,
        })
    }
}

/// Pull the ordered result list out of a provider payload. The service
/// returns either a bare array or an object wrapping one under a known key.
fn result_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            for key in ["nodes", "facts", "results"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.clone();
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}
