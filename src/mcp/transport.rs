//! Transport layer — carries JSON-RPC messages to the remote tool server.

use async_trait::async_trait;

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::error::{GraphMemError, Result};

/// Transport for sending JSON-RPC messages to the tool server.
///
/// Timeouts and retries are the transport's (or its caller's) business; the
/// client above it issues one request per call and awaits completion.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for a response.
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification (no response expected).
    async fn send_notification(&self, notification: JsonRpcNotification) -> Result<()>;

    /// Close the transport.
    async fn close(&self) -> Result<()>;
}

/// Opens a [`Transport`] to a server address. Injected into the client so the
/// connection is only established inside `initialize()`, under the session
/// lock.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, server_url: &str) -> Result<Box<dyn Transport>>;
}

/// Streamable-HTTP transport: one POST per JSON-RPC message, the
/// `Mcp-Session-Id` response header echoed on subsequent requests once the
/// server assigns it.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    session_id: std::sync::Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            session_id: std::sync::Mutex::new(None),
        }
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            session_id: std::sync::Mutex::new(None),
        }
    }

    fn post(&self, body: &impl serde::Serialize) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json, text/event-stream")
            .json(body);
        if let Some(sid) = self.session_id.lock().unwrap().as_deref() {
            builder = builder.header("Mcp-Session-Id", sid);
        }
        builder
    }

    fn capture_session_id(&self, response: &reqwest::Response) {
        if let Some(sid) = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().unwrap() = Some(sid.to_string());
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self.post(&request).send().await?;
        self.capture_session_id(&response);

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GraphMemError::Session(format!(
                "tool server returned HTTP {status}: {body}"
            )));
        }

        // Streamable HTTP may frame the response as a single SSE event.
        let payload = body
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap_or(body.as_str());
        Ok(serde_json::from_str(payload)?)
    }

    async fn send_notification(&self, notification: JsonRpcNotification) -> Result<()> {
        let response = self.post(&notification).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphMemError::Session(format!(
                "tool server rejected notification: HTTP {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Stateless over HTTP: dropping the session id is all there is to do.
        *self.session_id.lock().unwrap() = None;
        Ok(())
    }
}

/// Factory producing [`HttpTransport`] connections.
pub struct HttpTransportFactory {
    client: reqwest::Client,
}

impl HttpTransportFactory {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportFactory for HttpTransportFactory {
    async fn connect(&self, server_url: &str) -> Result<Box<dyn Transport>> {
        if server_url.is_empty() {
            return Err(GraphMemError::Configuration(
                "server URL is empty".into(),
            ));
        }
        Ok(Box::new(HttpTransport::with_client(
            self.client.clone(),
            server_url,
        )))
    }
}

/// Mock transport for testing — returns pre-configured responses.
#[cfg(test)]
pub mod mock {
    use super::super::protocol::{JsonRpcError, JsonRpcResponse};
    use super::*;
    use std::sync::Mutex;

    pub struct MockTransport {
        responses: Mutex<Vec<JsonRpcResponse>>,
        sent_requests: Mutex<Vec<JsonRpcRequest>>,
        sent_notifications: Mutex<Vec<JsonRpcNotification>>,
    }

    impl MockTransport {
        pub fn new(responses: Vec<JsonRpcResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                sent_requests: Mutex::new(Vec::new()),
                sent_notifications: Mutex::new(Vec::new()),
            }
        }

        pub fn sent_requests(&self) -> Vec<JsonRpcRequest> {
            self.sent_requests.lock().unwrap().clone()
        }

        pub fn sent_notifications(&self) -> Vec<JsonRpcNotification> {
            self.sent_notifications.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
            self.sent_requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError {
                        code: -32603,
                        message: "No more mock responses".into(),
                        data: None,
                    },
                ))
            } else {
                let mut resp = responses.remove(0);
                resp.id = request.id;
                Ok(resp)
            }
        }

        async fn send_notification(&self, notification: JsonRpcNotification) -> Result<()> {
            self.sent_notifications.lock().unwrap().push(notification);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Factory handing out queues of responses, one queue per connect call.
    pub struct MockFactory {
        queues: Mutex<Vec<Vec<JsonRpcResponse>>>,
        pub connects: std::sync::atomic::AtomicUsize,
    }

    impl MockFactory {
        pub fn new(queues: Vec<Vec<JsonRpcResponse>>) -> Self {
            Self {
                queues: Mutex::new(queues),
                connects: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransportFactory for MockFactory {
        async fn connect(&self, _server_url: &str) -> Result<Box<dyn Transport>> {
            self.connects
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut queues = self.queues.lock().unwrap();
            if queues.is_empty() {
                return Err(GraphMemError::Session("no mock connection left".into()));
            }
            Ok(Box::new(MockTransport::new(queues.remove(0))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::protocol::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};
    use super::mock::MockTransport;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_transport_returns_response() {
        let transport = MockTransport::new(vec![JsonRpcResponse::success(
            JsonRpcId::Number(0),
            json!({"tools": []}),
        )]);

        let req = JsonRpcRequest::new(1i64, "tools/list");
        let resp = transport.send(req).await.unwrap();
        assert!(!resp.is_error());
        assert_eq!(resp.id, JsonRpcId::Number(1));
    }

    #[tokio::test]
    async fn mock_transport_tracks_requests() {
        let transport = MockTransport::new(vec![JsonRpcResponse::success(
            JsonRpcId::Number(0),
            json!({}),
        )]);

        transport
            .send(JsonRpcRequest::new(1i64, "tools/call"))
            .await
            .unwrap();

        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, "tools/call");
    }

    #[tokio::test]
    async fn mock_transport_empty_returns_error_response() {
        let transport = MockTransport::new(vec![]);
        let resp = transport
            .send(JsonRpcRequest::new(1i64, "tools/list"))
            .await
            .unwrap();
        assert!(resp.is_error());
    }

    #[tokio::test]
    async fn http_factory_rejects_empty_url() {
        let factory = HttpTransportFactory::new();
        let err = factory.connect("").await.err().unwrap();
        assert!(matches!(err, GraphMemError::Configuration(_)));
    }
}
