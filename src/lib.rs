//! # graphmem-core
//!
//! Orchestration layer for a remotely managed knowledge graph: append
//! "episodes" of information (free text or structured records) and retrieve
//! entities/facts through several search strategies. Graph construction,
//! entity resolution, embedding, and ranking are owned by a remote graph
//! service reached over a generic tool-invocation protocol (MCP, JSON-RPC
//! 2.0); this crate owns everything between application callers and that
//! service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use graphmem_core::episode::EpisodeBuilder;
//! use graphmem_core::ingest::IngestPipeline;
//! use graphmem_core::mcp::GraphClient;
//! use graphmem_core::search::SearchOrchestrator;
//!
//! # async fn run() -> graphmem_core::Result<()> {
//! let client = Arc::new(GraphClient::over_http());
//! client.initialize("http://127.0.0.1:8000/mcp").await?;
//!
//! let pipeline = IngestPipeline::new(client.clone());
//! let episode = EpisodeBuilder::new().text(
//!     "张三是一名软件工程师，在北京科技公司工作。",
//!     "employee profile",
//!     None,
//! );
//! pipeline.add_single(episode).await?;
//!
//! let search = SearchOrchestrator::new(client.clone());
//! let hits = search.basic_search("软件工程师", 10).await?;
//! println!("{}", graphmem_core::presenter::format_node_results(&hits, "results"));
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`mcp`] | Session lifecycle + generic tool-invocation facade over JSON-RPC |
//! | [`episode`] | Normalizes raw content into canonical episode records |
//! | [`ingest`] | Single/batch episode submission with fail-fast batch semantics |
//! | [`search`] | Basic, node, center-node, and aggregate search compositions |
//! | [`presenter`] | Dual-shape result adapter and display formatting |
//! | [`service`] | Upstream boundary: request validation and response envelopes |
//! | [`config`] | Environment-driven connection settings |
//! | [`error`] | Error taxonomy with thiserror |
//!
//! The session is established lazily, exactly once, under concurrent callers
//! (single-flight on the session lock); the tool catalog is fetched at
//! handshake time and read-only afterwards. This layer performs no retries,
//! no caching of graph state, and no cross-episode transactions — callers
//! needing resilience wrap their own policy around the facade.

pub mod config;
pub mod episode;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod mcp;
pub mod presenter;
pub mod search;
pub mod service;

pub use config::GraphConfig;
pub use error::{GraphMemError, Result};
pub use mcp::GraphClient;
pub use service::GraphMemoryService;
