use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use archive_domain::{CallError, EventSource};

/// Longest slice of an error body kept in an error message.
const BODY_EXCERPT: usize = 256;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 2.0 over HTTP POST.
pub struct JsonRpcClient {
    endpoint: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: Client::builder().timeout(timeout).build()?,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSource for JsonRpcClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params: &params,
        };
        debug!(id, method, %params, "rpc call");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| CallError::transport(err.status().map(|s| s.as_u16()), err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| CallError::transport(Some(status.as_u16()), err.to_string()))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let excerpt: String = text.chars().take(BODY_EXCERPT).collect();
            return Err(CallError::transport(
                Some(status.as_u16()),
                format!("http {}: {}", status, excerpt),
            ));
        }

        let envelope: RpcResponse = serde_json::from_slice(&body)
            .map_err(|err| CallError::Protocol(format!("invalid JSON-RPC response: {}", err)))?;
        if let Some(error) = envelope.error {
            return Err(CallError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| CallError::Protocol("response has neither result nor error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn respond_with(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> JsonRpcClient {
        JsonRpcClient::new(server.uri(), Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn posts_envelope_and_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "method": "sui_getEvents",
                "params": ["All", null]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"data": [], "nextCursor": null, "hasMore": false}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .call("sui_getEvents", json!(["All", null]))
            .await
            .expect("result");
        assert_eq!(result["hasMore"], json!(false));
    }

    #[tokio::test]
    async fn big_numbers_survive_the_round_trip() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_string(
                r#"{"jsonrpc":"2.0","id":1,"result":{"amount":340282366920938463463374607431768211455}}"#,
            ),
        )
        .await;

        let result = client(&server)
            .call("sui_getEvents", json!([]))
            .await
            .expect("result");
        assert_eq!(
            result["amount"].to_string(),
            "340282366920938463463374607431768211455"
        );
    }

    #[tokio::test]
    async fn http_status_is_kept_for_classification() {
        for code in [429, 503, 504, 500] {
            let server = MockServer::start().await;
            respond_with(&server, ResponseTemplate::new(code).set_body_string("slow down")).await;

            let err = client(&server)
                .call("sui_getEvents", json!([]))
                .await
                .expect_err("transport error");
            match err {
                CallError::Transport { status, message } => {
                    assert_eq!(status, Some(code));
                    assert!(message.contains("slow down"));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn rpc_errors_carry_their_code() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "Invalid params"}
            })),
        )
        .await;

        let err = client(&server)
            .call("sui_getEvents", json!([]))
            .await
            .expect_err("rpc error");
        assert!(err.is_no_more_data());
    }

    #[tokio::test]
    async fn malformed_bodies_are_protocol_errors() {
        let server = MockServer::start().await;
        respond_with(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;
        let err = client(&server)
            .call("sui_getEvents", json!([]))
            .await
            .expect_err("protocol error");
        assert!(matches!(err, CallError::Protocol(_)));

        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1})),
        )
        .await;
        let err = client(&server)
            .call("sui_getEvents", json!([]))
            .await
            .expect_err("protocol error");
        assert!(matches!(err, CallError::Protocol(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let uri = format!("http://{}", listener.local_addr().expect("addr"));
        drop(listener);

        let client = JsonRpcClient::new(uri, Duration::from_secs(5)).expect("client");
        let err = client
            .call("sui_getEvents", json!([]))
            .await
            .expect_err("transport error");
        assert!(matches!(err, CallError::Transport { status: None, .. }));
    }
}
