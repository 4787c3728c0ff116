//! Upstream service boundary — the transport-free face an HTTP layer (or any
//! other host) consumes.
//!
//! Owns request validation (reference-time normalization, result limits) and
//! the success/failure envelope shapes; the HTTP routing itself lives
//! elsewhere.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::GraphConfig;
use crate::episode::EpisodeBuilder;
use crate::error::{GraphMemError, Result};
use crate::ingest::IngestPipeline;
use crate::mcp::GraphClient;
use crate::presenter::SearchRecord;
use crate::search::SearchOrchestrator;

/// Result limit bounds for entity search.
pub const MIN_SEARCH_LIMIT: usize = 1;
pub const MAX_SEARCH_LIMIT: usize = 50;

const CONTENT_PREVIEW_CHARS: usize = 50;
const DEFAULT_TEXT_DESCRIPTION: &str = "text information";

/// Request to submit a text episode.
#[derive(Debug, Clone, Deserialize)]
pub struct TextEpisodeRequest {
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// `yyyyMMdd` or `yyyyMM`; the latter is normalized to the first day of
    /// the month. Unparseable values fall back to the current time.
    #[serde(default)]
    pub reference_time: Option<String>,
}

/// Receipt for an accepted episode.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeReceipt {
    pub name: String,
    pub description: String,
    pub content_preview: String,
    pub reference_time: Option<String>,
    pub episode_type: String,
}

/// Success envelope for episode submission.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeResponse {
    pub success: bool,
    pub message: String,
    pub data: EpisodeReceipt,
}

/// One entity hit in a search reply.
#[derive(Debug, Clone, Serialize)]
pub struct EntityHit {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    pub properties: Map<String, Value>,
}

/// Success envelope for entity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub message: String,
    pub query: String,
    pub results: Vec<EntityHit>,
    pub total_count: usize,
}

/// Failure envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(message: impl Into<String>, error: &GraphMemError) -> Self {
        Self {
            success: false,
            message: message.into(),
            detail: Some(error.to_string()),
        }
    }
}

/// Knowledge-graph service facade wiring the client, builder, pipeline, and
/// orchestrator together behind one lifecycle.
pub struct GraphMemoryService {
    config: GraphConfig,
    client: Arc<GraphClient>,
    builder: EpisodeBuilder,
    pipeline: IngestPipeline,
    search: SearchOrchestrator,
}

impl GraphMemoryService {
    /// Production wiring: streamable-HTTP client from the given config.
    pub fn new(config: GraphConfig) -> Self {
        Self::with_client(config, Arc::new(GraphClient::over_http()))
    }

    /// Wire the service around an existing client (tests inject a mock
    /// transport this way).
    pub fn with_client(config: GraphConfig, client: Arc<GraphClient>) -> Self {
        let mut search = SearchOrchestrator::new(client.clone());
        if let Some(group_id) = &config.group_id {
            search = search.with_group_ids(vec![group_id.clone()]);
        }
        Self {
            pipeline: IngestPipeline::new(client.clone()),
            builder: EpisodeBuilder::new(),
            search,
            client,
            config,
        }
    }

    /// Validate configuration and bring the session up.
    pub async fn initialize(&self) -> Result<()> {
        self.config.validate()?;
        info!(server_url = %self.config.server_url, "initializing graph memory service");
        self.client.initialize(&self.config.server_url).await?;
        info!("graph memory service ready");
        Ok(())
    }

    /// Tear the session down. Safe to call repeatedly.
    pub async fn shutdown(&self) -> Result<()> {
        self.client.close().await
    }

    pub fn search_orchestrator(&self) -> &SearchOrchestrator {
        &self.search
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Submit one text episode per the upstream contract.
    pub async fn add_text_episode(&self, request: TextEpisodeRequest) -> Result<EpisodeResponse> {
        if request.content.trim().is_empty() {
            return Err(GraphMemError::Validation("content must not be empty".into()));
        }

        let description = request
            .description
            .unwrap_or_else(|| DEFAULT_TEXT_DESCRIPTION.to_string());
        let reference_time = normalize_reference_time(request.reference_time.as_deref());

        let episode = self
            .builder
            .text(request.content.clone(), description.clone(), request.name)
            .with_reference_time(reference_time);
        let name = episode.name.clone();

        info!(name = %name, "received text episode");
        if let Err(e) = self.pipeline.add_single(episode).await {
            error!(name = %name, error = %e, "text episode submission failed");
            return Err(e);
        }

        Ok(EpisodeResponse {
            success: true,
            message: "text episode added".into(),
            data: EpisodeReceipt {
                name,
                description,
                content_preview: crate::presenter::preview(
                    &request.content,
                    CONTENT_PREVIEW_CHARS,
                ),
                reference_time: Some(reference_time.format("%Y%m%d").to_string()),
                episode_type: "text".into(),
            },
        })
    }

    /// Search entities per the upstream contract (limit bounded to 1–50).
    pub async fn search_entities(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(GraphMemError::Validation("query must not be empty".into()));
        }
        if !(MIN_SEARCH_LIMIT..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(GraphMemError::Validation(format!(
                "limit must be between {MIN_SEARCH_LIMIT} and {MAX_SEARCH_LIMIT}, got {limit}"
            )));
        }

        info!(query, limit, "entity search");
        let raw = self.search.basic_search(query, limit).await?;
        let total_count = raw.len();
        let results = raw
            .iter()
            .map(|value| {
                let record = SearchRecord::from_value(value);
                EntityHit {
                    name: record.name.unwrap_or_else(|| "Unknown".into()),
                    summary: record.summary,
                    entity_type: record.entity_type,
                    relevance_score: record.score,
                    properties: record.attributes,
                }
            })
            .collect();

        Ok(SearchResponse {
            success: true,
            message: "search complete".into(),
            query: query.to_string(),
            results,
            total_count,
        })
    }
}

/// Normalize an upstream reference time.
///
/// `yyyyMMdd` parses as that day (midnight UTC); `yyyyMM` becomes the first
/// day of that month; anything else — including an absent value — falls back
/// to the current time.
pub fn normalize_reference_time(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    let digits = raw.chars().all(|c| c.is_ascii_digit());
    let padded = match raw.len() {
        8 if digits => raw.to_string(),
        6 if digits => format!("{raw}01"),
        _ => return Utc::now(),
    };
    NaiveDate::parse_from_str(&padded, "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcId, JsonRpcResponse};
    use crate::mcp::transport::mock::MockFactory;
    use chrono::Datelike;
    use serde_json::json;

    fn handshake_responses() -> Vec<JsonRpcResponse> {
        vec![
            JsonRpcResponse::success(
                JsonRpcId::Number(0),
                json!({"serverInfo": {"name": "graphiti"}, "capabilities": {}}),
            ),
            JsonRpcResponse::success(
                JsonRpcId::Number(0),
                json!({"tools": [
                    {"name": "add_memory", "inputSchema": {}},
                    {"name": "search_nodes", "inputSchema": {}},
                    {"name": "search_memory_facts", "inputSchema": {}}
                ]}),
            ),
        ]
    }

    fn text_result(text: &str) -> JsonRpcResponse {
        JsonRpcResponse::success(
            JsonRpcId::Number(0),
            json!({"content": [{"type": "text", "text": text}], "isError": false}),
        )
    }

    async fn ready_service(tool_responses: Vec<JsonRpcResponse>) -> GraphMemoryService {
        let mut responses = handshake_responses();
        responses.extend(tool_responses);
        let client = Arc::new(GraphClient::new(Box::new(MockFactory::new(vec![responses]))));
        let service = GraphMemoryService::with_client(GraphConfig::default(), client);
        service.initialize().await.unwrap();
        service
    }

    #[test]
    fn reference_time_full_date() {
        let dt = normalize_reference_time(Some("20240104"));
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 4));
    }

    #[test]
    fn reference_time_month_normalizes_to_first_day() {
        let dt = normalize_reference_time(Some("202401"));
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 1));
    }

    #[test]
    fn reference_time_invalid_falls_back_to_now() {
        let before = Utc::now();
        let dt = normalize_reference_time(Some("not-a-date"));
        assert!(dt >= before);

        let dt = normalize_reference_time(Some("20241340")); // month 13
        assert!(dt >= before);

        let dt = normalize_reference_time(None);
        assert!(dt >= before);
    }

    #[tokio::test]
    async fn add_text_episode_returns_receipt() {
        let service = ready_service(vec![text_result("ok")]).await;
        let response = service
            .add_text_episode(TextEpisodeRequest {
                content: "张三是一名软件工程师，在北京科技公司工作，主要负责前端开发。".into(),
                description: Some("员工信息".into()),
                name: Some("张三档案".into()),
                reference_time: Some("20240104".into()),
            })
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.data.name, "张三档案");
        assert_eq!(response.data.reference_time.as_deref(), Some("20240104"));
        assert_eq!(response.data.episode_type, "text");
    }

    #[tokio::test]
    async fn add_text_episode_previews_long_content() {
        let service = ready_service(vec![text_result("ok")]).await;
        let content = "长".repeat(80);
        let response = service
            .add_text_episode(TextEpisodeRequest {
                content,
                description: None,
                name: Some("ep".into()),
                reference_time: None,
            })
            .await
            .unwrap();

        assert_eq!(response.data.content_preview.chars().count(), 53);
        assert!(response.data.content_preview.ends_with("..."));
        assert_eq!(response.data.description, DEFAULT_TEXT_DESCRIPTION);
    }

    #[tokio::test]
    async fn add_text_episode_rejects_empty_content() {
        let service = ready_service(vec![]).await;
        let err = service
            .add_text_episode(TextEpisodeRequest {
                content: "   ".into(),
                description: None,
                name: None,
                reference_time: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphMemError::Validation(_)));
    }

    #[tokio::test]
    async fn search_entities_maps_records() {
        let payload = json!([
            {"uuid": "n1", "name": "张三", "summary": "软件工程师", "entity_type": "Person",
             "score": 0.95, "attributes": {"position": "软件工程师", "location": "北京"}},
            {"uuid": "n2", "attributes": {"name": "李四"}}
        ]);
        let service = ready_service(vec![text_result(&payload.to_string())]).await;

        let response = service.search_entities("软件工程师", 10).await.unwrap();
        assert!(response.success);
        assert_eq!(response.total_count, 2);
        assert_eq!(response.results[0].name, "张三");
        assert_eq!(response.results[0].relevance_score, Some(0.95));
        assert_eq!(
            response.results[0].properties["position"],
            json!("软件工程师")
        );
        // Dual-shape: the second record only carries its name in attributes.
        assert_eq!(response.results[1].name, "李四");
    }

    #[tokio::test]
    async fn search_entities_validates_limit() {
        let service = ready_service(vec![]).await;
        for limit in [0usize, 51] {
            let err = service.search_entities("张三", limit).await.unwrap_err();
            assert!(matches!(err, GraphMemError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn search_entities_rejects_empty_query() {
        let service = ready_service(vec![]).await;
        let err = service.search_entities("", 10).await.unwrap_err();
        assert!(matches!(err, GraphMemError::Validation(_)));
    }

    #[test]
    fn error_response_envelope() {
        let err = GraphMemError::Validation("limit out of range".into());
        let body = ErrorResponse::from_error("search failed", &err);
        assert!(!body.success);
        assert_eq!(body.message, "search failed");
        assert!(body.detail.unwrap().contains("limit out of range"));
    }
}
