//! Path-query helper over JSON documents.
//!
//! Wraps the JSON path engine with typed, null-tolerant accessors so test
//! code never has to care whether a path resolved to nothing, a scalar, or
//! a collection.

use crate::error::{Error, Result};
use jsonpath_rust::JsonPath;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Returns the JSON type name of a value, for diagnostics.
pub fn value_kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed access into a borrowed JSON document via path-query expressions.
///
/// The helper holds a reference only; every call re-evaluates a fresh
/// query against the held document.
#[derive(Debug, Clone, Copy)]
pub struct QueryHelper<'a> {
    data: &'a Value,
}

impl<'a> QueryHelper<'a> {
    pub fn new(data: &'a Value) -> Self {
        Self { data }
    }

    /// The document this helper reads from.
    pub fn data(&self) -> &'a Value {
        self.data
    }

    /// Evaluate an expression against the held document.
    ///
    /// A syntactically invalid expression is an error; a path that
    /// resolves to nothing is `Ok(None)`. A single match unwraps to the
    /// matched value, multiple matches come back as an array.
    pub fn search(&self, expr: &str) -> Result<Option<Value>> {
        let path = JsonPath::try_from(expr).map_err(|e| Error::query(expr, e))?;
        let found = path.find(self.data);
        let result = normalize(found);
        debug!(expr, found = result.is_some(), "query evaluated");
        Ok(result)
    }

    /// True iff the expression resolves to a non-null value.
    pub fn exists(&self, expr: &str) -> Result<bool> {
        Ok(self.search(expr)?.is_some())
    }

    /// The resolved value, or `default` when the path resolves to nothing.
    pub fn get_value(&self, expr: &str, default: Value) -> Result<Value> {
        Ok(self.search(expr)?.unwrap_or(default))
    }

    /// The resolved value coerced to a list: nothing becomes an empty
    /// list, a scalar becomes a single-element list, an array is returned
    /// verbatim.
    pub fn get_list(&self, expr: &str) -> Result<Vec<Value>> {
        Ok(match self.search(expr)? {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(scalar) => vec![scalar],
        })
    }

    /// The resolved value as an object. Nothing becomes an empty map; a
    /// non-object result is a type mismatch.
    pub fn get_dict(&self, expr: &str) -> Result<Map<String, Value>> {
        match self.search(expr)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(Error::TypeMismatch {
                expr: expr.to_string(),
                expected: "object",
                actual: value_kind_name(&other),
            }),
        }
    }

    /// Result cardinality: 0 for nothing, element count for collections,
    /// character count for strings, 1 for any other scalar.
    pub fn count(&self, expr: &str) -> Result<usize> {
        Ok(match self.search(expr)? {
            None => 0,
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(Value::String(s)) => s.chars().count(),
            Some(_) => 1,
        })
    }

    /// Filter a list through an engine-native predicate, e.g.
    /// `filter_by("$.users", "@.status == 'active'")`.
    ///
    /// The predicate is embedded in the composed expression verbatim;
    /// values inside it must already be quoted for the engine.
    pub fn filter_by(&self, list_expr: &str, predicate: &str) -> Result<Vec<Value>> {
        self.get_list(&compose_filter(list_expr, predicate))
    }

    /// Resolve a list and sort it by a key field. Elements missing the
    /// key sort last; the sort is stable, so equal keys keep source order.
    pub fn sort_by(&self, list_expr: &str, key: &str, reverse: bool) -> Result<Vec<Value>> {
        let mut items = self.get_list(list_expr)?;
        items.sort_by(|a, b| {
            let ordering = match (field(a, key), field(b, key)) {
                (Some(x), Some(y)) => compare_values(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
        Ok(items)
    }

    /// Bucket list elements by the stringified value of `key`. Elements
    /// that are not objects or lack the key are skipped; source order is
    /// preserved inside each bucket.
    pub fn group_by(&self, list_expr: &str, key: &str) -> Result<BTreeMap<String, Vec<Value>>> {
        let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for item in self.get_list(list_expr)? {
            if let Some(value) = field(&item, key) {
                groups.entry(stringify(value)).or_default().push(item);
            }
        }
        Ok(groups)
    }

    /// Project named fields out of each list element. Absent fields come
    /// through as `null`, like an engine projection would emit them.
    pub fn extract_fields(&self, list_expr: &str, fields: &[&str]) -> Result<Vec<Value>> {
        let items = self.get_list(list_expr)?;
        let mut projected = Vec::with_capacity(items.len());
        for item in items {
            let mut record = Map::new();
            for &name in fields {
                record.insert(
                    name.to_string(),
                    field(&item, name).cloned().unwrap_or(Value::Null),
                );
            }
            projected.push(Value::Object(record));
        }
        Ok(projected)
    }

    /// First list element satisfying the predicate, or `None`.
    pub fn find_first(&self, list_expr: &str, predicate: &str) -> Result<Option<Value>> {
        Ok(self.filter_by(list_expr, predicate)?.into_iter().next())
    }

    /// Batch existence check over a set of required paths.
    pub fn validate_structure(&self, required_paths: &[&str]) -> Result<BTreeMap<String, bool>> {
        let mut results = BTreeMap::new();
        for &path in required_paths {
            results.insert(path.to_string(), self.exists(path)?);
        }
        Ok(results)
    }
}

fn compose_filter(list_expr: &str, predicate: &str) -> String {
    format!("{list_expr}[?({predicate})]")
}

/// Collapse the engine's result set: nothing (or only null) means the
/// path resolved to nothing, a single match unwraps, multiple matches
/// stay an array.
fn normalize(found: Value) -> Option<Value> {
    match found {
        Value::Null => None,
        Value::Array(mut items) => match items.len() {
            0 => None,
            1 => match items.pop() {
                Some(Value::Null) | None => None,
                Some(value) => Some(value),
            },
            _ => Some(Value::Array(items)),
        },
        other => Some(other),
    }
}

fn field<'v>(item: &'v Value, key: &str) -> Option<&'v Value> {
    item.as_object().and_then(|map| map.get(key))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total order over JSON values for sorting: numbers and strings compare
/// naturally, mixed kinds compare by kind rank so the sort never panics.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "code": 200,
            "message": "ok",
            "data": {
                "total": 3,
                "items": [
                    {"id": 1, "name": "alpha", "department": "A", "score": 75},
                    {"id": 2, "name": "beta", "department": "A", "score": 92},
                    {"id": 3, "name": "gamma", "department": "B", "score": 61}
                ]
            }
        })
    }

    #[test]
    fn test_search_scalar() {
        let data = sample();
        let q = QueryHelper::new(&data);
        assert_eq!(q.search("$.code").unwrap(), Some(json!(200)));
        assert_eq!(q.search("$.missing").unwrap(), None);
    }

    #[test]
    fn test_search_invalid_expression() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let err = q.search("$.data[?(").unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[test]
    fn test_exists_and_default() {
        let data = sample();
        let q = QueryHelper::new(&data);
        assert!(q.exists("$.data.total").unwrap());
        assert!(!q.exists("$.data.nope").unwrap());
        assert_eq!(
            q.get_value("$.data.nope", json!("fallback")).unwrap(),
            json!("fallback")
        );
    }

    #[test]
    fn test_get_list_coercion() {
        let data = sample();
        let q = QueryHelper::new(&data);
        // Nothing -> empty list
        assert!(q.get_list("$.data.nope").unwrap().is_empty());
        // Scalar -> single-element list
        assert_eq!(q.get_list("$.code").unwrap(), vec![json!(200)]);
        // Array -> verbatim
        assert_eq!(q.get_list("$.data.items").unwrap().len(), 3);
    }

    #[test]
    fn test_get_dict() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let map = q.get_dict("$.data").unwrap();
        assert_eq!(map.get("total"), Some(&json!(3)));
        assert!(q.get_dict("$.data.nope").unwrap().is_empty());
        let err = q.get_dict("$.code").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_count() {
        let data = sample();
        let q = QueryHelper::new(&data);
        assert_eq!(q.count("$.data.items").unwrap(), 3);
        assert_eq!(q.count("$.data.nope").unwrap(), 0);
        assert_eq!(q.count("$.code").unwrap(), 1);
        assert_eq!(q.count("$.message").unwrap(), 2);
    }

    #[test]
    fn test_filter_by() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let in_a = q.filter_by("$.data.items", "@.department == 'A'").unwrap();
        assert_eq!(in_a.len(), 2);
        assert_eq!(in_a[0]["name"], "alpha");
    }

    #[test]
    fn test_sort_by() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let sorted = q.sort_by("$.data.items", "score", false).unwrap();
        assert_eq!(sorted[0]["name"], "gamma");
        assert_eq!(sorted[2]["name"], "beta");

        let reversed = q.sort_by("$.data.items", "score", true).unwrap();
        assert_eq!(reversed[0]["name"], "beta");
    }

    #[test]
    fn test_group_by_preserves_source_order() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let groups = q.group_by("$.data.items", "department").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["A"].len(), 2);
        assert_eq!(groups["B"].len(), 1);
        assert_eq!(groups["A"][0]["name"], "alpha");
        assert_eq!(groups["A"][1]["name"], "beta");
    }

    #[test]
    fn test_group_by_skips_missing_key() {
        let data = json!({"items": [{"dept": "A"}, {"other": 1}, 42]});
        let q = QueryHelper::new(&data);
        let groups = q.group_by("$.items", "dept").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["A"].len(), 1);
    }

    #[test]
    fn test_extract_fields() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let projected = q.extract_fields("$.data.items", &["name", "rank"]).unwrap();
        assert_eq!(projected.len(), 3);
        assert_eq!(projected[0]["name"], "alpha");
        assert_eq!(projected[0]["rank"], Value::Null);
    }

    #[test]
    fn test_find_first() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let first = q.find_first("$.data.items", "@.score > 70").unwrap();
        assert_eq!(first.unwrap()["name"], "alpha");
        let none = q.find_first("$.data.items", "@.score > 1000").unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_validate_structure() {
        let data = sample();
        let q = QueryHelper::new(&data);
        let checks = q
            .validate_structure(&["$.code", "$.data.total", "$.data.nope"])
            .unwrap();
        assert_eq!(checks["$.code"], true);
        assert_eq!(checks["$.data.nope"], false);
    }
}
