//! HTTP client for driving the service under test.
//!
//! Thin wrapper over reqwest that captures one exchange into an
//! [`ApiSnapshot`], the input for assertion chains and query helpers.

use crate::assertion::AssertionChain;
use crate::error::Result;
use crate::query::QueryHelper;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const LOGGED_BODY_LIMIT: usize = 200;

/// Client bound to one base URL, with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    inner: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            inner,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<ApiSnapshot> {
        self.send(Method::GET, path, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiSnapshot> {
        self.send(Method::DELETE, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiSnapshot> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiSnapshot> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<ApiSnapshot> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    /// Issue one request and capture the full exchange.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiSnapshot> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "sending request");
        if let Some(body) = body {
            debug!(body = %truncate(&body.to_string()), "request body");
        }

        let mut request = self.inner.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.bytes().await?;
        let elapsed = started.elapsed();

        let body = decode_payload(&bytes);
        debug!(
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            body = %truncate(&body.to_string()),
            "received response"
        );

        Ok(ApiSnapshot {
            status,
            headers,
            body,
            url,
            elapsed,
        })
    }
}

/// One captured HTTP exchange: status, headers, decoded body, target URL
/// and wall-clock round-trip time.
#[derive(Debug, Clone)]
pub struct ApiSnapshot {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub url: String,
    pub elapsed: Duration,
}

impl ApiSnapshot {
    /// True for 2xx/3xx responses.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Start a fluent assertion chain over this exchange.
    pub fn assert_chain(self) -> AssertionChain {
        AssertionChain::from_parts(self.status, self.headers, self.body, self.url, self.elapsed)
    }

    /// Query helper over the response body.
    pub fn query(&self) -> QueryHelper<'_> {
        QueryHelper::new(&self.body)
    }
}

/// Decode a response payload as JSON, wrapping non-JSON text the same way
/// the mock server wraps request bodies.
fn decode_payload(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => serde_json::json!({"raw": String::from_utf8_lossy(bytes)}),
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(LOGGED_BODY_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{MockResponse, MockRule};
    use crate::server::MockServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_captures_snapshot() {
        let mut server = MockServer::new("127.0.0.1", 0);
        server.stub(
            "GET",
            "/api/users",
            MockResponse::json(200, json!({"code": 0, "items": [{"id": 1}]})),
        );
        server.start().await.unwrap();

        let client = ApiClient::new(server.base_url()).unwrap();
        let snapshot = client.get("/api/users").await.unwrap();

        assert_eq!(snapshot.status, 200);
        assert!(snapshot.is_success());
        assert_eq!(
            snapshot.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(snapshot.elapsed > Duration::ZERO);
        assert_eq!(snapshot.query().count("$.items").unwrap(), 1);

        snapshot
            .assert_chain()
            .assert_status_code(200)
            .unwrap()
            .assert_json_path("$.code", json!(0))
            .unwrap();

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mut server = MockServer::new("127.0.0.1", 0);
        server.add_rule(
            MockRule::new("POST", "/api/users", MockResponse::json(201, json!({"id": 9})))
                .with_body_param("name", json!("Ada")),
        );
        server.start().await.unwrap();

        let client = ApiClient::new(server.base_url()).unwrap();
        let snapshot = client
            .post("/api/users", &json!({"name": "Ada", "role": "admin"}))
            .await
            .unwrap();
        assert_eq!(snapshot.status, 201);
        assert_eq!(snapshot.body["id"], 9);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_json_body_is_raw_wrapped() {
        let mut server = MockServer::new("127.0.0.1", 0);
        server.stub("GET", "/plain", MockResponse::text(200, "hello there"));
        server.start().await.unwrap();

        let client = ApiClient::new(server.base_url()).unwrap();
        let snapshot = client.get("/plain").await.unwrap();
        assert_eq!(snapshot.body, json!({"raw": "hello there"}));

        server.stop().await.unwrap();
    }
}
