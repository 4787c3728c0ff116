//! MCP client for the remote knowledge-graph tool server.
//!
//! Provides JSON-RPC framing, a transport abstraction, and [`GraphClient`] —
//! the session lifecycle manager and generic tool-invocation facade the rest
//! of the crate is built on.

pub mod protocol;
pub mod transport;
pub mod types;

pub use transport::{HttpTransportFactory, Transport, TransportFactory};
pub use types::{RemoteToolDef, ServerInfo, ToolCallResult, ToolContent};

use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{GraphMemError, Result};
use protocol::{JsonRpcId, JsonRpcNotification, JsonRpcRequest};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Lifecycle of the one logical session a client owns.
enum SessionState {
    Uninitialized,
    Initializing,
    Ready(ReadySession),
    Closed,
}

impl SessionState {
    fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready(_) => "ready",
            SessionState::Closed => "closed",
        }
    }
}

/// Live connection plus the catalog cached at handshake time. The catalog is
/// read-only for the rest of the session's life.
struct ReadySession {
    transport: Box<dyn Transport>,
    server: ServerInfo,
    catalog: Vec<RemoteToolDef>,
}

/// Client for the remote graph service.
///
/// One `GraphClient` holds one logical session. Construct it once, share it
/// via `Arc`, and call [`initialize`](Self::initialize) before anything else;
/// concurrent initializers are single-flighted on the session lock and all
/// converge on the same connection and tool catalog.
pub struct GraphClient {
    factory: Box<dyn TransportFactory>,
    state: RwLock<SessionState>,
    next_id: AtomicI64,
}

impl GraphClient {
    pub fn new(factory: Box<dyn TransportFactory>) -> Self {
        Self {
            factory,
            state: RwLock::new(SessionState::Uninitialized),
            next_id: AtomicI64::new(1),
        }
    }

    /// Client connecting over streamable HTTP — the production configuration.
    pub fn over_http() -> Self {
        Self::new(Box::new(HttpTransportFactory::new()))
    }

    fn request_id(&self) -> JsonRpcId {
        JsonRpcId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Establish the session. Idempotent: if the session is already ready
    /// this returns immediately without reconnecting, and concurrent callers
    /// block on the session lock until the first one finishes, then observe
    /// the same ready state.
    ///
    /// On failure, any partially opened transport is closed (best effort) and
    /// the state returns to uninitialized so a later retry can succeed.
    pub async fn initialize(&self, server_url: &str) -> Result<()> {
        {
            let state = self.state.read().await;
            match &*state {
                SessionState::Ready(_) => {
                    debug!("session already initialized, skipping");
                    return Ok(());
                }
                SessionState::Closed => {
                    return Err(GraphMemError::Session(
                        "session is closed; re-initializing is not supported".into(),
                    ));
                }
                _ => {}
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have finished while we waited for the lock.
        match &*state {
            SessionState::Ready(_) => {
                debug!("session initialized by a concurrent caller");
                return Ok(());
            }
            SessionState::Closed => {
                return Err(GraphMemError::Session(
                    "session is closed; re-initializing is not supported".into(),
                ));
            }
            _ => {}
        }

        info!(server_url, "initializing session with tool server");
        *state = SessionState::Initializing;

        match self.establish(server_url).await {
            Ok(session) => {
                info!(
                    server = %session.server.name,
                    tools = session.catalog.len(),
                    "session ready, tool catalog cached"
                );
                *state = SessionState::Ready(session);
                Ok(())
            }
            Err(e) => {
                warn!(server_url, error = %e, "session initialization failed");
                *state = SessionState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Connect, perform the handshake, and fetch the tool catalog once.
    async fn establish(&self, server_url: &str) -> Result<ReadySession> {
        let transport = self.factory.connect(server_url).await?;

        match self.handshake(transport.as_ref()).await {
            Ok((server, catalog)) => Ok(ReadySession {
                transport,
                server,
                catalog,
            }),
            Err(e) => {
                // Release the partially opened connection before re-raising.
                if let Err(close_err) = transport.close().await {
                    warn!(error = %close_err, "cleanup of partial connection failed");
                }
                Err(e)
            }
        }
    }

    async fn handshake(
        &self,
        transport: &dyn Transport,
    ) -> Result<(ServerInfo, Vec<RemoteToolDef>)> {
        let req = JsonRpcRequest::new(self.request_id(), "initialize").with_params(
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {},
            }),
        );
        let resp = transport.send(req).await?;
        if let Some(err) = resp.error {
            return Err(GraphMemError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = resp.result.unwrap_or_default();
        let server: ServerInfo =
            serde_json::from_value(result.get("serverInfo").cloned().unwrap_or_default())
                .unwrap_or(ServerInfo {
                    name: "unknown".into(),
                    version: None,
                    capabilities: Default::default(),
                });

        transport
            .send_notification(JsonRpcNotification::new("notifications/initialized"))
            .await?;

        let req = JsonRpcRequest::new(self.request_id(), "tools/list");
        let resp = transport.send(req).await?;
        if let Some(err) = resp.error {
            return Err(GraphMemError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = resp.result.unwrap_or_default();
        let catalog: Vec<RemoteToolDef> =
            serde_json::from_value(result.get("tools").cloned().unwrap_or_default())
                .unwrap_or_default();

        Ok((server, catalog))
    }

    /// Invoke a remote tool by name with an argument mapping.
    ///
    /// Requires a ready session. The name is resolved against the cached
    /// catalog; protocol errors and tool-reported failures surface as
    /// [`GraphMemError::JsonRpc`] / [`GraphMemError::Remote`]. No retries, no
    /// timeout enforcement — each invocation is one independent remote call.
    pub async fn invoke(&self, tool_name: &str, args: serde_json::Value) -> Result<ToolCallResult> {
        let state = self.state.read().await;
        let session = match &*state {
            SessionState::Ready(session) => session,
            other => {
                debug!(tool_name, state = other.label(), "invoke refused");
                return Err(GraphMemError::NotInitialized);
            }
        };

        if !session.catalog.iter().any(|t| t.name == tool_name) {
            return Err(GraphMemError::ToolNotFound {
                name: tool_name.to_string(),
            });
        }

        debug!(tool_name, "invoking remote tool");
        let req = JsonRpcRequest::new(self.request_id(), "tools/call").with_params(
            serde_json::json!({
                "name": tool_name,
                "arguments": args,
            }),
        );
        let resp = session.transport.send(req).await?;
        if let Some(err) = resp.error {
            return Err(GraphMemError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }

        let result: ToolCallResult = serde_json::from_value(resp.result.unwrap_or_default())
            .map_err(|e| GraphMemError::Remote {
                tool: tool_name.to_string(),
                message: format!("failed to parse tool result: {e}"),
            })?;

        if result.is_error {
            return Err(GraphMemError::Remote {
                tool: tool_name.to_string(),
                message: result.text(),
            });
        }
        Ok(result)
    }

    /// Invoke a tool and parse its text payload as JSON.
    pub async fn invoke_json(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        Ok(self.invoke(tool_name, args).await?.to_json())
    }

    /// Names in the cached tool catalog; empty before initialization.
    pub async fn tool_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        match &*state {
            SessionState::Ready(session) => {
                session.catalog.iter().map(|t| t.name.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Identity of the connected server, if the session is ready.
    pub async fn server_info(&self) -> Option<ServerInfo> {
        let state = self.state.read().await;
        match &*state {
            SessionState::Ready(session) => Some(session.server.clone()),
            _ => None,
        }
    }

    /// Whether the session is ready for invocations.
    pub async fn is_ready(&self) -> bool {
        matches!(&*self.state.read().await, SessionState::Ready(_))
    }

    /// Tear the session down. Idempotent: closing a session that was never
    /// initialized, or one that is already closed, is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !matches!(&*state, SessionState::Ready(_)) {
            debug!(state = state.label(), "close() with no live session");
            return Ok(());
        }

        let prev = std::mem::replace(&mut *state, SessionState::Closed);
        if let SessionState::Ready(session) = prev {
            if let Err(e) = session.transport.close().await {
                warn!(error = %e, "transport close reported an error");
            }
        }
        info!("session closed");
        Ok(())
    }
}
