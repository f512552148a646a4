//! # Update Descriptors
//!
//! An update is a JSON object of field mutations:
//!
//! ```text
//! {"$set": {"name": "b", "address.city": "Bergen"}}
//! {"$unset": {"nickname": ""}}
//! {"$inc": {"logins": 1}}
//! {"name": "b"}                      no operators: same as {"$set": {...}}
//! ```
//!
//! `_id` and the storage metadata fields can never be written.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::document::{is_immutable_field, kind_of, RawDocument};
use crate::error::{CoreError, CoreResult};

/// Opaque set of field mutations applied atomically to one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Update(Value);

impl Update {
    /// Wraps a JSON update expression.
    pub fn new(expr: Value) -> Self {
        Update(expr)
    }

    /// Returns the raw JSON expression.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Applies the update to a copy of `doc`.
    ///
    /// The input is left untouched, so a failing update never leaves a
    /// half-applied document behind.
    ///
    /// ## Returns
    /// * `Ok(RawDocument)` - The post-update document
    /// * `Err(CoreError::InvalidUpdate)` - Malformed update or type mismatch
    /// * `Err(CoreError::ImmutableField)` - Update touches `_id` or metadata
    pub fn apply(&self, doc: &RawDocument) -> CoreResult<RawDocument> {
        let expr = match &self.0 {
            Value::Object(expr) if !expr.is_empty() => expr,
            Value::Object(_) => {
                return Err(CoreError::InvalidUpdate("update is empty".to_string()))
            }
            other => {
                return Err(CoreError::InvalidUpdate(format!(
                    "update must be an object, found {}",
                    kind_of(other)
                )))
            }
        };

        let operator_count = expr.keys().filter(|k| k.starts_with('$')).count();
        let mut updated = doc.clone();

        if operator_count == 0 {
            apply_set(&mut updated, expr)?;
            return Ok(updated);
        }
        if operator_count != expr.len() {
            return Err(CoreError::InvalidUpdate(
                "cannot mix update operators and plain fields".to_string(),
            ));
        }

        for (op, operand) in expr {
            let fields = operand.as_object().ok_or_else(|| {
                CoreError::InvalidUpdate(format!("'{}' expects an object of fields", op))
            })?;
            match op.as_str() {
                "$set" => apply_set(&mut updated, fields)?,
                "$unset" => apply_unset(&mut updated, fields)?,
                "$inc" => apply_inc(&mut updated, fields)?,
                other => {
                    return Err(CoreError::InvalidUpdate(format!(
                        "unknown update operator '{}'",
                        other
                    )))
                }
            }
        }
        Ok(updated)
    }
}

impl From<Value> for Update {
    fn from(expr: Value) -> Self {
        Update(expr)
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn ensure_writable(path: &str) -> CoreResult<()> {
    let root = path.split('.').next().unwrap_or(path);
    if is_immutable_field(root) {
        return Err(CoreError::ImmutableField(root.to_string()));
    }
    Ok(())
}

fn apply_set(doc: &mut RawDocument, fields: &Map<String, Value>) -> CoreResult<()> {
    for (path, value) in fields {
        ensure_writable(path)?;
        doc.set_path(path, value.clone())?;
    }
    Ok(())
}

fn apply_unset(doc: &mut RawDocument, fields: &Map<String, Value>) -> CoreResult<()> {
    for path in fields.keys() {
        ensure_writable(path)?;
        doc.remove_path(path);
    }
    Ok(())
}

fn apply_inc(doc: &mut RawDocument, fields: &Map<String, Value>) -> CoreResult<()> {
    for (path, delta) in fields {
        ensure_writable(path)?;
        let delta = match delta {
            Value::Number(delta) => delta,
            _ => {
                return Err(CoreError::InvalidUpdate(format!(
                    "'$inc' amount for '{}' must be a number",
                    path
                )))
            }
        };

        let next = match doc.get_path(path) {
            None => Value::Number(delta.clone()),
            Some(Value::Number(current)) => Value::Number(add_numbers(path, current, delta)?),
            Some(other) => {
                return Err(CoreError::InvalidUpdate(format!(
                    "cannot '$inc' '{}': field holds {}",
                    path,
                    kind_of(other)
                )))
            }
        };
        doc.set_path(path, next)?;
    }
    Ok(())
}

/// Integer addition when both sides are integers, float otherwise.
fn add_numbers(path: &str, a: &Number, b: &Number) -> CoreResult<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x
            .checked_add(y)
            .map(Number::from)
            .ok_or_else(|| CoreError::InvalidUpdate(format!("'$inc' overflow on '{}'", path)));
    }

    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .ok_or_else(|| CoreError::InvalidUpdate(format!("'$inc' on '{}' is not finite", path)))
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
            "logins": 2,
            "nickname": "al",
            "address": {"city": "Oslo"}
        }))
        .unwrap()
    }

    fn apply(update: Value) -> CoreResult<RawDocument> {
        Update::new(update).apply(&doc())
    }

    #[test]
    fn test_plain_fields_behave_as_set() {
        let updated = apply(json!({"name": "b"})).unwrap();
        assert_eq!(updated.get_path("name"), Some(&json!("b")));
        assert_eq!(updated.get_path("logins"), Some(&json!(2)));
        assert_eq!(updated.id(), Some("u-1"));
    }

    #[test]
    fn test_set_unset_inc() {
        let updated = apply(json!({
            "$set": {"address.city": "Bergen", "plan": "pro"},
            "$unset": {"nickname": ""},
            "$inc": {"logins": 3, "credits": 1.5}
        }))
        .unwrap();

        assert_eq!(updated.get_path("address.city"), Some(&json!("Bergen")));
        assert_eq!(updated.get_path("plan"), Some(&json!("pro")));
        assert_eq!(updated.get_path("nickname"), None);
        assert_eq!(updated.get_path("logins"), Some(&json!(5)));
        assert_eq!(updated.get_path("credits"), Some(&json!(1.5)));
    }

    #[test]
    fn test_input_document_is_untouched() {
        let original = doc();
        let _ = Update::new(json!({"name": "b"})).apply(&original).unwrap();
        assert_eq!(original.get_path("name"), Some(&json!("alice")));
    }

    #[test]
    fn test_identifier_and_metadata_are_immutable() {
        for update in [
            json!({"_id": "other"}),
            json!({"$set": {"_id": "other"}}),
            json!({"$unset": {"_revision": ""}}),
            json!({"$inc": {"_revision": 1}}),
        ] {
            assert!(
                matches!(apply(update.clone()), Err(CoreError::ImmutableField(_))),
                "expected ImmutableField for {}",
                update
            );
        }
    }

    #[test]
    fn test_malformed_updates_are_rejected() {
        for update in [
            json!({}),
            json!([1]),
            json!({"$set": {"a": 1}, "b": 2}),
            json!({"$rename": {"a": "b"}}),
            json!({"$set": 5}),
            json!({"$inc": {"name": 1}}),
            json!({"$inc": {"logins": "1"}}),
        ] {
            assert!(
                matches!(apply(update.clone()), Err(CoreError::InvalidUpdate(_))),
                "expected InvalidUpdate for {}",
                update
            );
        }
    }

    #[test]
    fn test_inc_overflow_is_an_error() {
        let start = RawDocument::try_from(json!({"n": i64::MAX})).unwrap();
        let result = Update::new(json!({"$inc": {"n": 1}})).apply(&start);
        assert!(matches!(result, Err(CoreError::InvalidUpdate(_))));
    }
}
