//! Fluent response assertions.
//!
//! An [`AssertionChain`] holds one response snapshot; every method either
//! fails with [`Error::Assertion`] or hands the chain back, so checks
//! compose with `?` and fail fast.

use crate::error::{Error, Result};
use crate::query::{value_kind_name, QueryHelper};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

#[cfg(not(feature = "schema"))]
use tracing::warn;

/// JSON type expectation for [`AssertionChain::assert_path_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// Snapshot of one HTTP exchange, verified through chained assertions.
///
/// ```no_run
/// # use apiforge::AssertionChain;
/// # use serde_json::json;
/// # fn demo() -> apiforge::Result<()> {
/// AssertionChain::new(200, json!({"code": 0, "data": {"id": 7}}))
///     .assert_status_code(200)?
///     .assert_json_path("$.code", json!(0))?
///     .assert_path_exists("$.data.id")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AssertionChain {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Value,
    url: String,
    elapsed: Duration,
}

impl AssertionChain {
    /// Build a chain from just a status and body; headers, url and timing
    /// default to empty.
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
            url: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Build a chain from a full exchange snapshot.
    pub fn from_parts(
        status: u16,
        headers: BTreeMap<String, String>,
        body: Value,
        url: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            url: url.into(),
            elapsed,
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn query(&self) -> QueryHelper<'_> {
        QueryHelper::new(&self.body)
    }

    fn resolve(&self, expr: &str) -> Result<Option<Value>> {
        self.query().search(expr)
    }

    /// HTTP status code matches.
    pub fn assert_status_code(self, expected: u16) -> Result<Self> {
        if self.status != expected {
            return Err(Error::assertion(
                format!("status code for {}", self.url),
                expected,
                self.status,
            ));
        }
        info!(status = self.status, "assertion passed: status code");
        Ok(self)
    }

    /// Round-trip time is within the budget.
    pub fn assert_response_time(self, max: Duration) -> Result<Self> {
        if self.elapsed > max {
            return Err(Error::assertion(
                "response time",
                format!("<= {:?}", max),
                format!("{:?}", self.elapsed),
            ));
        }
        info!(elapsed = ?self.elapsed, max = ?max, "assertion passed: response time");
        Ok(self)
    }

    /// The value at `expr` equals `expected`.
    pub fn assert_json_path(self, expr: &str, expected: Value) -> Result<Self> {
        let actual = self.resolve(expr)?.unwrap_or(Value::Null);
        if actual != expected {
            return Err(Error::assertion(format!("value at `{expr}`"), expected, actual));
        }
        info!(expr, value = %actual, "assertion passed: json path");
        Ok(self)
    }

    /// The path resolves to a non-null value.
    pub fn assert_path_exists(self, expr: &str) -> Result<Self> {
        if !self.query().exists(expr)? {
            return Err(Error::assertion(
                format!("path `{expr}`"),
                "a value",
                "nothing",
            ));
        }
        info!(expr, "assertion passed: path exists");
        Ok(self)
    }

    /// The path resolves to nothing.
    pub fn assert_path_not_exists(self, expr: &str) -> Result<Self> {
        if let Some(actual) = self.resolve(expr)? {
            return Err(Error::assertion(
                format!("path `{expr}`"),
                "nothing",
                actual,
            ));
        }
        info!(expr, "assertion passed: path absent");
        Ok(self)
    }

    /// The value at `expr` contains `expected`: array element, object
    /// key (for string expectations), or substring.
    pub fn assert_path_contains(self, expr: &str, expected: Value) -> Result<Self> {
        let actual = self.resolve(expr)?.unwrap_or(Value::Null);
        if !contains(&actual, &expected) {
            return Err(Error::assertion(
                format!("value at `{expr}`"),
                format!("container holding {expected}"),
                actual,
            ));
        }
        info!(expr, "assertion passed: path contains");
        Ok(self)
    }

    /// The value at `expr` has the given length (array/object elements,
    /// string characters).
    pub fn assert_path_length(self, expr: &str, expected: usize) -> Result<Self> {
        let actual = match self.resolve(expr)? {
            None => {
                return Err(Error::assertion(
                    format!("length of `{expr}`"),
                    expected,
                    "nothing",
                ))
            }
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(Value::String(s)) => s.chars().count(),
            Some(other) => {
                return Err(Error::assertion(
                    format!("length of `{expr}`"),
                    "a sized value",
                    value_kind_name(&other),
                ))
            }
        };
        if actual != expected {
            return Err(Error::assertion(format!("length of `{expr}`"), expected, actual));
        }
        info!(expr, length = actual, "assertion passed: path length");
        Ok(self)
    }

    /// The value at `expr` has the given JSON type.
    pub fn assert_path_type(self, expr: &str, expected: ValueKind) -> Result<Self> {
        let actual = self.resolve(expr)?.unwrap_or(Value::Null);
        let kind = ValueKind::of(&actual);
        if kind != expected {
            return Err(Error::assertion(
                format!("type of `{expr}`"),
                expected.name(),
                kind.name(),
            ));
        }
        info!(expr, kind = kind.name(), "assertion passed: path type");
        Ok(self)
    }

    /// The response body contains `expected` (array element, object key,
    /// or substring).
    pub fn assert_contains(self, expected: Value) -> Result<Self> {
        if !contains(&self.body, &expected) {
            return Err(Error::assertion(
                "response body",
                format!("container holding {expected}"),
                &self.body,
            ));
        }
        info!("assertion passed: body contains");
        Ok(self)
    }

    /// The response body does not contain `value`.
    pub fn assert_not_contains(self, value: Value) -> Result<Self> {
        if contains(&self.body, &value) {
            return Err(Error::assertion(
                "response body",
                format!("no occurrence of {value}"),
                &self.body,
            ));
        }
        info!("assertion passed: body does not contain");
        Ok(self)
    }

    /// The body, rendered as text, matches the regex pattern.
    pub fn assert_regex_match(self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::assertion("regex pattern", "a valid pattern", e))?;
        let text = match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !regex.is_match(&text) {
            return Err(Error::assertion(
                "response body",
                format!("text matching /{pattern}/"),
                text,
            ));
        }
        info!(pattern, "assertion passed: regex match");
        Ok(self)
    }

    /// Validate the body against a JSON Schema.
    #[cfg(feature = "schema")]
    pub fn assert_schema(self, schema: &Value) -> Result<Self> {
        let compiled = jsonschema::JSONSchema::compile(schema)
            .map_err(|e| Error::Schema(e.to_string()))?;
        if let Err(errors) = compiled.validate(&self.body) {
            let details: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(Error::assertion(
                "response body schema",
                "a conforming document",
                details.join("; "),
            ));
        }
        info!("assertion passed: schema");
        Ok(self)
    }

    /// Schema validation support was not compiled in; the check is
    /// skipped with a warning rather than failing the test.
    #[cfg(not(feature = "schema"))]
    pub fn assert_schema(self, _schema: &Value) -> Result<Self> {
        warn!("schema validation not compiled in (`schema` feature), skipping assertion");
        Ok(self)
    }

    /// The body is a list of the given length.
    pub fn assert_list_length(self, expected: usize) -> Result<Self> {
        match self.body.as_array() {
            Some(items) if items.len() == expected => {
                info!(length = items.len(), "assertion passed: list length");
                Ok(self)
            }
            Some(items) => Err(Error::assertion("list length", expected, items.len())),
            None => Err(Error::assertion(
                "list length",
                "an array body",
                value_kind_name(&self.body),
            )),
        }
    }

    /// The body is an object carrying every named key.
    pub fn assert_dict_has_keys(self, expected_keys: &[&str]) -> Result<Self> {
        let map = self.body.as_object().ok_or_else(|| {
            Error::assertion("body keys", "an object body", value_kind_name(&self.body))
        })?;
        for &key in expected_keys {
            if !map.contains_key(key) {
                return Err(Error::assertion(
                    "body keys",
                    format!("key `{key}`"),
                    format!("keys {:?}", map.keys().collect::<Vec<_>>()),
                ));
            }
        }
        info!(?expected_keys, "assertion passed: dict keys");
        Ok(self)
    }

    /// The number at `expr` lies in `[min, max]`.
    pub fn assert_value_in_range(self, expr: &str, min: f64, max: f64) -> Result<Self> {
        let actual = self.resolve(expr)?.unwrap_or(Value::Null);
        let number = actual.as_f64().ok_or_else(|| {
            Error::assertion(
                format!("value at `{expr}`"),
                "a number",
                value_kind_name(&actual),
            )
        })?;
        if number < min || number > max {
            return Err(Error::assertion(
                format!("value at `{expr}`"),
                format!("{min} <= n <= {max}"),
                number,
            ));
        }
        info!(expr, value = number, "assertion passed: value in range");
        Ok(self)
    }
}

/// Containment over JSON values: arrays contain equal elements, objects
/// contain string keys, strings contain substrings.
fn contains(container: &Value, needle: &Value) -> bool {
    match container {
        Value::Array(items) => items.iter().any(|item| item == needle),
        Value::Object(map) => needle
            .as_str()
            .map(|key| map.contains_key(key))
            .unwrap_or(false),
        Value::String(text) => needle
            .as_str()
            .map(|sub| text.contains(sub))
            .unwrap_or(false),
        _ => false,
    }
}
