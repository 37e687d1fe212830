//! Mock rule definitions.
//!
//! A rule pairs a request matcher (method, exact path, optional parameter
//! and body predicates) with the canned response to replay. Rules can be
//! built in code or loaded from a YAML file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Methods the mock listener serves.
pub const SUPPORTED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Latency simulation: a fixed delay, or a random range when
/// `max_ms > min_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Delay {
    /// Fixed delay in milliseconds
    pub fixed_ms: u64,

    /// Minimum delay for random range (ms)
    pub min_ms: u64,

    /// Maximum delay for random range (ms)
    pub max_ms: u64,
}

impl Delay {
    pub fn fixed(duration: Duration) -> Self {
        Self {
            fixed_ms: duration.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn jitter(min: Duration, max: Duration) -> Self {
        Self {
            fixed_ms: 0,
            min_ms: min.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.fixed_ms == 0 && self.min_ms == 0 && self.max_ms == 0
    }

    /// Resolve the delay to apply to one request.
    pub fn resolve(&self) -> Duration {
        if self.fixed_ms > 0 {
            return Duration::from_millis(self.fixed_ms);
        }
        if self.max_ms > self.min_ms {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            return Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms));
        }
        Duration::from_millis(self.min_ms)
    }
}

/// Canned response replayed for a matching request. Immutable once built;
/// owned by the rule that carries it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MockResponse {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Response body; JSON values are serialized, strings are sent raw
    #[serde(default)]
    pub body: Value,

    /// Latency simulation
    #[serde(default)]
    pub delay: Delay,
}

fn default_status() -> u16 {
    200
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    headers
}

impl MockResponse {
    /// JSON response with the default content-type header.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: default_headers(),
            body,
            delay: Delay::default(),
        }
    }

    /// Plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        Self {
            status,
            headers,
            body: Value::String(body.into()),
            delay: Delay::default(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_delay(mut self, duration: Duration) -> Self {
        self.delay = Delay::fixed(duration);
        self
    }

    pub fn with_jitter(mut self, min: Duration, max: Duration) -> Self {
        self.delay = Delay::jitter(min, max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.status < 100 || self.status > 599 {
            return Err(Error::Config(format!("invalid status code: {}", self.status)));
        }
        Ok(())
    }
}

/// Matcher-plus-response pair with an invocation counter.
///
/// A rule matches iff method and path are exact matches AND every declared
/// query parameter is present with an equal value AND every declared body
/// key is present with an equal value. Undeclared keys are ignored, so
/// partial matching works.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockRule {
    /// HTTP method, stored uppercased
    pub method: String,

    /// Exact request path
    pub path: String,

    /// Response to replay
    pub response: MockResponse,

    /// Required query parameters (subset match)
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,

    /// Required request-body keys (subset match)
    #[serde(default)]
    pub body_params: BTreeMap<String, Value>,

    /// Times this rule has answered a request
    #[serde(skip)]
    calls: AtomicU32,
}

impl MockRule {
    pub fn new(method: impl Into<String>, path: impl Into<String>, response: MockResponse) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            response,
            query_params: BTreeMap::new(),
            body_params: BTreeMap::new(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn with_body_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body_params.insert(key.into(), value);
        self
    }

    /// Check one request against this rule.
    pub fn matches(
        &self,
        method: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        request_body: &Value,
    ) -> bool {
        if !self.method.eq_ignore_ascii_case(method) || self.path != path {
            return false;
        }

        for (key, expected) in &self.query_params {
            if query_params.get(key) != Some(expected) {
                return false;
            }
        }

        for (key, expected) in &self.body_params {
            let actual = request_body.as_object().and_then(|map| map.get(key));
            if actual != Some(expected) {
                return false;
            }
        }

        true
    }

    /// Record one served request; returns the new count.
    pub fn record_call(&self) -> u32 {
        self.calls.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::Config("rule path cannot be empty".to_string()));
        }
        if !SUPPORTED_METHODS.contains(&self.method.as_str()) {
            return Err(Error::Config(format!(
                "unsupported method `{}` (expected one of {:?})",
                self.method, SUPPORTED_METHODS
            )));
        }
        self.response.validate()
    }

    /// Uppercase the method after deserialization; rule files may spell
    /// methods in lowercase.
    fn normalize(&mut self) {
        self.method.make_ascii_uppercase();
    }
}

/// Declarative rule list, loadable from a YAML file.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<MockRule>,
}

impl RuleSet {
    /// Load and validate a rule file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut set: Self =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        for rule in &mut set.rules {
            rule.normalize();
        }
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()
                .map_err(|e| Error::Config(format!("rule {i}: {e}")))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
