//! # Normalization
//!
//! Turns a raw, driver-hydrated document into a plain domain value.
//!
//! ```text
//! {"_id": "9f1c…", "name": "a", "_revision": 3, "_created": "…", "__v": 0}
//!        │
//!        ├── drop storage metadata (_revision, _created, _modified)
//!        ├── drop driver-private keys ("__" prefix)
//!        └── deserialize into T   (fields outside T's shape are ignored)
//!        ▼
//! User { id: "9f1c…", name: "a" }
//! ```

use serde::de::DeserializeOwned;

use crate::document::RawDocument;
use crate::error::{CoreError, CoreResult};

/// Prefix of keys a driver reserves for itself.
pub const DRIVER_PRIVATE_PREFIX: &str = "__";

/// Removes storage metadata and driver-private keys, leaving the public
/// field set of the stored record.
pub fn strip_storage_fields(mut raw: RawDocument) -> RawDocument {
    raw.strip_metadata();
    raw.as_map_mut()
        .retain(|key, _| !key.starts_with(DRIVER_PRIVATE_PREFIX));
    raw
}

/// Normalizes one raw document into `T`.
///
/// ## Returns
/// * `Ok(T)` - The plain domain value
/// * `Err(CoreError::Normalization)` - Stored fields do not fit `T`
pub fn normalize<T: DeserializeOwned>(raw: RawDocument) -> CoreResult<T> {
    let value = serde_json::Value::from(strip_storage_fields(raw));
    serde_json::from_value(value).map_err(|e| CoreError::Normalization(e.to_string()))
}

/// Normalizes every raw document, preserving order.
pub fn normalize_all<T: DeserializeOwned>(raws: Vec<RawDocument>) -> CoreResult<Vec<T>> {
    raws.into_iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentId, Metadata};
    use chrono::Utc;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        #[serde(rename = "_id")]
        id: DocumentId,
        name: String,
    }

    fn hydrated() -> RawDocument {
        let mut raw = RawDocument::try_from(json!({
            "_id": "u-1",
            "name": "a",
            "__v": 0,
            "legacy_flag": true
        }))
        .unwrap();
        raw.hydrate(&Metadata::created(Utc::now()));
        raw
    }

    #[test]
    fn test_strip_storage_fields() {
        let stripped = strip_storage_fields(hydrated());
        let keys: Vec<&str> = stripped.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&"_id"));
        assert!(keys.contains(&"name"));
        assert!(keys.contains(&"legacy_flag"));
    }

    #[test]
    fn test_normalize_projects_onto_declared_shape() {
        let user: User = normalize(hydrated()).unwrap();
        assert_eq!(
            user,
            User {
                id: DocumentId::new("u-1"),
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_reports_shape_mismatch() {
        let raw = RawDocument::try_from(json!({"_id": "u-1"})).unwrap();
        let result: CoreResult<User> = normalize(raw);
        assert!(matches!(result, Err(CoreError::Normalization(_))));
    }
}
