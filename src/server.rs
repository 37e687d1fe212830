//! Embedded mock HTTP server.
//!
//! Stands in for real dependencies during tests: rules registered on the
//! server are matched first-match-wins against inbound requests and the
//! configured response is replayed. The listener runs on a background task
//! so test code keeps driving requests from the foreground.

use crate::error::{Error, Result};
use crate::rule::{MockResponse, MockRule, RuleSet};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cap for echoing non-JSON request bodies back into the match input.
const MAX_RAW_BODY_BYTES: usize = 8 * 1024;

/// Rule table shared between the server handle and the listener task.
#[derive(Default)]
struct ServerState {
    rules: RwLock<Vec<MockRule>>,
}

impl ServerState {
    // A poisoned lock means a scan panicked; the table itself is still
    // consistent, so recover the guard instead of propagating.
    fn read_rules(&self) -> RwLockReadGuard<'_, Vec<MockRule>> {
        self.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_rules(&self) -> RwLockWriteGuard<'_, Vec<MockRule>> {
        self.rules.write().unwrap_or_else(|e| e.into_inner())
    }

    /// First-match-wins scan in registration order. The winning rule's
    /// counter is incremented; a miss logs a warning and yields nothing.
    fn find_response(
        &self,
        method: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        request_body: &Value,
    ) -> Option<MockResponse> {
        for rule in self.read_rules().iter() {
            if rule.matches(method, path, query_params, request_body) {
                let count = rule.record_call();
                info!(method, path, count, "mock rule matched");
                return Some(rule.response.clone());
            }
        }
        warn!(method, path, "no mock rule matched");
        None
    }
}

struct ListenerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        // Dropping the shutdown sender resolves the graceful-shutdown
        // future; aborting covers a listener stuck mid-accept.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Embedded HTTP listener replaying configured [`MockRule`]s.
///
/// ```no_run
/// # use apiforge::{MockResponse, MockServer};
/// # use serde_json::json;
/// # async fn demo() -> apiforge::Result<()> {
/// let mut server = MockServer::new("127.0.0.1", 0);
/// server.stub("GET", "/api/users", MockResponse::json(200, json!({"items": []})));
/// server.start().await?;
/// // ... drive requests at server.base_url() ...
/// server.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct MockServer {
    host: String,
    port: u16,
    state: Arc<ServerState>,
    handle: Option<ListenerHandle>,
}

impl MockServer {
    /// Create a stopped server. Port 0 binds an ephemeral port on start.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: Arc::new(ServerState::default()),
            handle: None,
        }
    }

    /// Append a rule; rules match in registration order.
    pub fn add_rule(&self, rule: MockRule) -> &Self {
        info!(method = %rule.method, path = %rule.path, "mock rule registered");
        self.state.write_rules().push(rule);
        self
    }

    /// Shorthand for registering a method/path/response rule.
    pub fn stub(
        &self,
        method: impl Into<String>,
        path: impl Into<String>,
        response: MockResponse,
    ) -> &Self {
        self.add_rule(MockRule::new(method, path, response))
    }

    /// Append every rule from a loaded rule set.
    pub fn mount_rules(&self, set: RuleSet) -> &Self {
        for rule in set.rules {
            self.add_rule(rule);
        }
        self
    }

    /// Match one request against the registered rules, incrementing the
    /// winning rule's call counter.
    pub fn find_response(
        &self,
        method: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        request_body: &Value,
    ) -> Option<MockResponse> {
        self.state
            .find_response(method, path, query_params, request_body)
    }

    /// Clear all rules; running state is unaffected.
    pub fn reset_rules(&self) {
        self.state.write_rules().clear();
        info!("mock rules reset");
    }

    /// Invocation count for the first rule registered under
    /// (method, path); 0 when no such rule exists.
    pub fn get_call_count(&self, method: &str, path: &str) -> u32 {
        let method = method.to_ascii_uppercase();
        self.state
            .read_rules()
            .iter()
            .find(|rule| rule.method == method && rule.path == path)
            .map(MockRule::call_count)
            .unwrap_or(0)
    }

    pub fn rule_count(&self) -> usize {
        self.state.read_rules().len()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// The bound address while running.
    pub fn address(&self) -> Option<SocketAddr> {
        self.handle.as_ref().map(|h| h.addr)
    }

    /// Base URL clients should target. Reflects the actually bound port
    /// once the server is running.
    pub fn base_url(&self) -> String {
        match &self.handle {
            Some(handle) => format!("http://{}", handle.addr),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    /// Bind the listener and start serving on a background task.
    ///
    /// Binding an already-taken port surfaces the OS error; calling
    /// `start` twice on a running server is rejected before binding.
    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::Server("server is already running".to_string()));
        }

        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                Error::Server(format!("failed to bind {}:{}: {e}", self.host, self.port))
            })?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .fallback(handle_request)
            .with_state(self.state.clone());
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.await;
            };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%err, "mock listener terminated abnormally");
            }
        });

        info!(%addr, rules = self.rule_count(), "mock server listening");
        self.handle = Some(ListenerHandle {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        });
        Ok(())
    }

    /// Signal shutdown and wait for the listener task to finish.
    /// In-flight handlers (including delayed ones) are allowed to
    /// complete. Calling `stop` on a server that was never started is a
    /// caller error.
    pub async fn stop(&mut self) -> Result<()> {
        let mut handle = self.handle.take().ok_or_else(|| {
            Error::Server("stop called on a server that was never started".to_string())
        })?;

        if let Some(tx) = handle.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = handle.task.take() {
            task.await
                .map_err(|e| Error::Server(format!("listener task failed: {e}")))?;
        }
        info!("mock server stopped");
        Ok(())
    }
}

/// Single fallback handler: every method and path lands here. Faults are
/// converted to a 500 so one bad rule never tears down the listener.
async fn handle_request(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    match serve_request(&state, &method, &uri, &body).await {
        Ok(response) => response,
        Err(fault) => {
            error!(%fault, "mock request handling failed");
            error_envelope(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                &fault,
            )
        }
    }
}

async fn serve_request(
    state: &ServerState,
    method: &Method,
    uri: &Uri,
    raw_body: &[u8],
) -> std::result::Result<Response, String> {
    let path = uri.path();
    let query_params = parse_query_string(uri.query().unwrap_or(""));
    let request_body = decode_request_body(raw_body);

    match state.find_response(method.as_str(), path, &query_params, &request_body) {
        Some(response) => {
            let delay = response.delay.resolve();
            if !delay.is_zero() {
                debug!(?delay, "applying configured response delay");
                tokio::time::sleep(delay).await;
            }
            render_response(&response)
        }
        None => Ok(error_envelope(
            StatusCode::NOT_FOUND,
            "Not Found",
            &format!("No mock rule found for {} {}", method, path),
        )),
    }
}

fn render_response(response: &MockResponse) -> std::result::Result<Response, String> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| format!("invalid status code {}: {e}", response.status))?;

    let payload = match &response.body {
        Value::Null => Vec::new(),
        Value::String(text) => text.clone().into_bytes(),
        other => serde_json::to_vec(other)
            .map_err(|e| format!("response body serialization failed: {e}"))?,
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(payload))
        .map_err(|e| format!("invalid response header: {e}"))
}

/// Fixed two-key error envelope shared by the 404 and 500 paths. Callers
/// assert on this shape, so it never changes.
fn error_envelope(status: StatusCode, error: &str, message: &str) -> Response {
    let body = serde_json::json!({"error": error, "message": message});
    (status, Json(body)).into_response()
}

/// JSON-decode a request body, falling back to a capped raw-string
/// wrapper so non-JSON bodies still participate in matching.
fn decode_request_body(raw: &[u8]) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(_) => {
            let capped = &raw[..raw.len().min(MAX_RAW_BODY_BYTES)];
            serde_json::json!({"raw": String::from_utf8_lossy(capped)})
        }
    }
}

/// Parse a query string into key-value pairs; the first value wins for
/// duplicated keys.
fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        params
            .entry(percent_decode(key))
            .or_insert_with(|| percent_decode(value));
    }
    params
}

fn percent_decode(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => out.push(b' '),
            b'%' => match (bytes.next(), bytes.next()) {
                (Some(hi), Some(lo)) => match hex_digit(hi).zip(hex_digit(lo)) {
                    Some((h, l)) => out.push(h * 16 + l),
                    None => out.extend_from_slice(&[b'%', hi, lo]),
                },
                (Some(hi), None) => out.extend_from_slice(&[b'%', hi]),
                _ => out.push(b'%'),
            },
            other => out.push(other),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
