//! # Filter Descriptors
//!
//! A filter is a JSON object mapping field paths to expected values or
//! operator objects, in the familiar document-store dialect:
//!
//! ```text
//! {"name": "a"}                              implicit equality
//! {"address.city": "Oslo"}                   dotted path
//! {"age": {"$gte": 18, "$lt": 65}}           comparison operators
//! {"role": {"$in": ["admin", "owner"]}}      set membership
//! {"$or": [{"name": "a"}, {"name": "b"}]}    logical combination
//! {}                                         matches every document
//! ```
//!
//! The repository never looks inside a filter; only storage drivers call
//! [`Filter::matches`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{DocumentId, RawDocument, DOC_ID};
use crate::error::{CoreError, CoreResult};

/// Opaque selection predicate over document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Value);

impl Filter {
    /// Wraps a JSON filter expression.
    pub fn new(expr: Value) -> Self {
        Filter(expr)
    }

    /// The empty filter, matching every document.
    pub fn all() -> Self {
        Filter(Value::Object(Map::new()))
    }

    /// Selects the document with the given identifier.
    pub fn by_id(id: &DocumentId) -> Self {
        let mut expr = Map::new();
        expr.insert(DOC_ID.to_string(), Value::String(id.as_str().to_string()));
        Filter(Value::Object(expr))
    }

    /// Returns the raw JSON expression.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Returns the identifier if this filter is exactly `{"_id": "<string>"}`
    /// (or `{"_id": {"$eq": "<string>"}}`).
    ///
    /// Drivers use this to answer id lookups without a scan.
    pub fn id_equality(&self) -> Option<&str> {
        let expr = self.0.as_object()?;
        if expr.len() != 1 {
            return None;
        }
        match expr.get(DOC_ID)? {
            Value::String(id) => Some(id),
            Value::Object(ops) if ops.len() == 1 => ops.get("$eq")?.as_str(),
            _ => None,
        }
    }

    /// Evaluates the filter against a raw document.
    ///
    /// ## Returns
    /// * `Ok(true)` - Document matches
    /// * `Ok(false)` - Document does not match
    /// * `Err(CoreError::InvalidFilter)` - Malformed filter
    pub fn matches(&self, doc: &RawDocument) -> CoreResult<bool> {
        match &self.0 {
            Value::Object(expr) => matches_expr(expr, doc),
            other => Err(CoreError::InvalidFilter(format!(
                "filter must be an object, found {}",
                crate::document::kind_of(other)
            ))),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::all()
    }
}

impl From<Value> for Filter {
    fn from(expr: Value) -> Self {
        Filter(expr)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Evaluation
// =============================================================================

fn matches_expr(expr: &Map<String, Value>, doc: &RawDocument) -> CoreResult<bool> {
    for (key, expected) in expr {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in logical_operands(key, expected)? {
                    if !matches_expr(sub, doc)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in logical_operands(key, expected)? {
                    if matches_expr(sub, doc)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for sub in logical_operands(key, expected)? {
                    if matches_expr(sub, doc)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(CoreError::InvalidFilter(format!(
                    "unknown top-level operator '{}'",
                    op
                )))
            }
            path => matches_field(doc.get_path(path), expected)?,
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical_operands<'a>(op: &str, value: &'a Value) -> CoreResult<Vec<&'a Map<String, Value>>> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| {
            CoreError::InvalidFilter(format!("'{}' expects a non-empty array of filters", op))
        })?;

    items
        .iter()
        .map(|item| {
            item.as_object().ok_or_else(|| {
                CoreError::InvalidFilter(format!("'{}' operands must be objects", op))
            })
        })
        .collect()
}

fn matches_field(actual: Option<&Value>, expected: &Value) -> CoreResult<bool> {
    let ops = match expected {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => ops,
        _ => return Ok(equals(actual, expected)),
    };

    if !ops.keys().all(|k| k.starts_with('$')) {
        return Err(CoreError::InvalidFilter(
            "cannot mix operators and literal fields in one condition".to_string(),
        ));
    }

    for (op, operand) in ops {
        if !apply_operator(op, actual, operand)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply_operator(op: &str, actual: Option<&Value>, operand: &Value) -> CoreResult<bool> {
    let result = match op {
        "$eq" => equals(actual, operand),
        "$ne" => !equals(actual, operand),
        "$gt" => compares(actual, operand, |o| o == Ordering::Greater),
        "$gte" => compares(actual, operand, |o| o != Ordering::Less),
        "$lt" => compares(actual, operand, |o| o == Ordering::Less),
        "$lte" => compares(actual, operand, |o| o != Ordering::Greater),
        "$in" => set_operand(op, operand)?
            .iter()
            .any(|candidate| equals(actual, candidate)),
        "$nin" => !set_operand(op, operand)?
            .iter()
            .any(|candidate| equals(actual, candidate)),
        "$exists" => {
            let wanted = operand.as_bool().ok_or_else(|| {
                CoreError::InvalidFilter("'$exists' expects a boolean".to_string())
            })?;
            actual.is_some() == wanted
        }
        other => {
            return Err(CoreError::InvalidFilter(format!(
                "unknown operator '{}'",
                other
            )))
        }
    };
    Ok(result)
}

fn set_operand<'a>(op: &str, operand: &'a Value) -> CoreResult<&'a Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| CoreError::InvalidFilter(format!("'{}' expects an array", op)))
}

/// Equality with array-contains semantics: `{"tags": "a"}` matches
/// `{"tags": ["a", "b"]}`. A missing field equals `null`.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compares(actual: Option<&Value>, operand: &Value, test: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare(item, operand).map_or(false, &test)),
        Some(value) => compare(value, operand).map_or(false, test),
    }
}

/// Orders numbers with numbers and strings with strings; anything else is
/// incomparable and never satisfies a range operator.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> RawDocument {
        RawDocument::try_from(json!({
            "_id": "u-1",
            "name": "alice",
            "age": 34,
            "score": 7.5,
            "tags": ["admin", "beta"],
            "address": {"city": "Oslo", "zip": "0150"},
            "nickname": null
        }))
        .unwrap()
    }

    fn check(filter: Value) -> bool {
        Filter::new(filter).matches(&doc()).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::all().matches(&doc()).unwrap());
    }

    #[test]
    fn test_implicit_equality() {
        assert!(check(json!({"name": "alice"})));
        assert!(!check(json!({"name": "bob"})));
        assert!(check(json!({"name": "alice", "age": 34})));
        assert!(!check(json!({"name": "alice", "age": 35})));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(check(json!({"age": 34.0})));
    }

    #[test]
    fn test_dotted_paths_and_nested_objects() {
        assert!(check(json!({"address.city": "Oslo"})));
        assert!(check(json!({"address": {"city": "Oslo", "zip": "0150"}})));
        assert!(!check(json!({"address": {"city": "Oslo"}})));
    }

    #[test]
    fn test_array_contains() {
        assert!(check(json!({"tags": "admin"})));
        assert!(!check(json!({"tags": "owner"})));
        assert!(check(json!({"tags": ["admin", "beta"]})));
    }

    #[test]
    fn test_missing_field_equals_null() {
        assert!(check(json!({"deleted_at": null})));
        assert!(check(json!({"nickname": null})));
        assert!(!check(json!({"name": null})));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(check(json!({"age": {"$gt": 30}})));
        assert!(check(json!({"age": {"$gte": 34, "$lte": 34}})));
        assert!(!check(json!({"age": {"$lt": 34}})));
        assert!(check(json!({"score": {"$lt": 8}})));
        assert!(check(json!({"name": {"$gt": "aaron"}})));
        // Mixed types never compare
        assert!(!check(json!({"name": {"$gt": 1}})));
        assert!(!check(json!({"missing": {"$lt": 100}})));
    }

    #[test]
    fn test_ne_in_nin_exists() {
        assert!(check(json!({"name": {"$ne": "bob"}})));
        assert!(check(json!({"name": {"$in": ["bob", "alice"]}})));
        assert!(!check(json!({"name": {"$nin": ["bob", "alice"]}})));
        assert!(check(json!({"tags": {"$in": ["owner", "beta"]}})));
        assert!(check(json!({"age": {"$exists": true}})));
        assert!(check(json!({"deleted_at": {"$exists": false}})));
    }

    #[test]
    fn test_logical_operators() {
        assert!(check(json!({"$or": [{"name": "bob"}, {"age": 34}]})));
        assert!(!check(json!({"$and": [{"name": "alice"}, {"age": 1}]})));
        assert!(check(json!({"$nor": [{"name": "bob"}, {"age": 1}]})));
    }

    #[test]
    fn test_malformed_filters_are_rejected() {
        let d = doc();
        for bad in [
            json!({"age": {"$between": [1, 2]}}),
            json!({"$or": {"name": "a"}}),
            json!({"$or": []}),
            json!({"name": {"$in": "alice"}}),
            json!({"age": {"$exists": "yes"}}),
            json!({"age": {"$gt": 1, "plain": 2}}),
            json!({"$where": "1"}),
            json!("name"),
        ] {
            let result = Filter::new(bad.clone()).matches(&d);
            assert!(
                matches!(result, Err(CoreError::InvalidFilter(_))),
                "expected InvalidFilter for {}",
                bad
            );
        }
    }

    #[test]
    fn test_id_equality_detection() {
        let id = DocumentId::new("u-1");
        assert_eq!(Filter::by_id(&id).id_equality(), Some("u-1"));
        assert_eq!(
            Filter::new(json!({"_id": {"$eq": "u-1"}})).id_equality(),
            Some("u-1")
        );
        assert_eq!(
            Filter::new(json!({"_id": "u-1", "name": "a"})).id_equality(),
            None
        );
        assert_eq!(Filter::new(json!({"_id": 7})).id_equality(), None);
    }

    #[test]
    fn test_display_is_compact_json() {
        let filter = Filter::new(json!({"name": "a"}));
        assert_eq!(filter.to_string(), r#"{"name":"a"}"#);
    }
}
