//! # Document Model
//!
//! The typed side (`Document`, `DocumentId`) and the storage side
//! (`RawDocument`, `Metadata`) of a persisted record.
//!
//! ## Two Shapes of One Record
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Typed vs Raw Documents                               │
//! │                                                                         │
//! │  Domain value (T: Document)          Raw document (driver side)        │
//! │  ─────────────────────────           ─────────────────────────────     │
//! │  User {                              {                                 │
//! │    id: "9f1c…",          ───────►      "_id": "9f1c…",                 │
//! │    name: "a",            insert        "name": "a",                    │
//! │  }                                     "_revision": 3,      ┐ storage  │
//! │                          ◄───────      "_created": "…",     │ metadata │
//! │                          normalize     "_modified": "…"     ┘          │
//! │                                      }                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Drivers stamp metadata on every read ("hydration"); the repository strips
//! it again with [`crate::normalize`] before handing values to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Reserved Field Names
// =============================================================================

/// Identifier key of every stored document.
pub const DOC_ID: &str = "_id";

/// Per-document revision counter, bumped on every write.
pub const DOC_REVISION: &str = "_revision";

/// Creation timestamp (RFC 3339).
pub const DOC_CREATED: &str = "_created";

/// Last modification timestamp (RFC 3339).
pub const DOC_MODIFIED: &str = "_modified";

/// Storage metadata keys a driver adds to raw documents.
pub const METADATA_FIELDS: [&str; 3] = [DOC_REVISION, DOC_CREATED, DOC_MODIFIED];

/// Returns true if `field` may never be written by an update.
pub fn is_immutable_field(field: &str) -> bool {
    field == DOC_ID || METADATA_FIELDS.contains(&field)
}

// =============================================================================
// Document Identifier
// =============================================================================

/// Collection-scoped document identifier.
///
/// Generated ids are UUID v4 strings; ids supplied by callers are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    /// Generates a fresh, globally unique identifier.
    pub fn generate() -> Self {
        DocumentId(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty identifier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        DocumentId(id)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        DocumentId(id.to_string())
    }
}

impl From<DocumentId> for Value {
    fn from(id: DocumentId) -> Self {
        Value::String(id.0)
    }
}

// =============================================================================
// Document Capability
// =============================================================================

/// A typed record stored in exactly one collection.
///
/// ## Implementing
/// ```rust
/// use docrepo_core::{Document, DocumentId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct User {
///     #[serde(rename = "_id")]
///     id: DocumentId,
///     email: String,
/// }
///
/// #[derive(Debug, Clone, Serialize)]
/// struct NewUser {
///     email: String,
/// }
///
/// impl Document for User {
///     const COLLECTION: &'static str = "users";
///     type Draft = NewUser;
///
///     fn id(&self) -> &DocumentId {
///         &self.id
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the collection holding this document type.
    const COLLECTION: &'static str;

    /// The document without its identifier, as accepted by `create`.
    type Draft: Serialize + Send + Sync;

    /// The document's identifier.
    fn id(&self) -> &DocumentId;
}

// =============================================================================
// Storage Metadata
// =============================================================================

/// Bookkeeping a driver keeps next to every document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Metadata {
    /// Metadata for a document written for the first time at `now`.
    pub fn created(now: DateTime<Utc>) -> Self {
        Metadata {
            revision: 1,
            created_at: now,
            modified_at: now,
        }
    }

    /// Metadata after one more write at `now`.
    pub fn bumped(&self, now: DateTime<Utc>) -> Self {
        Metadata {
            revision: self.revision + 1,
            created_at: self.created_at,
            modified_at: now,
        }
    }
}

// =============================================================================
// Raw Document
// =============================================================================

/// A document as a storage driver sees it: one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDocument(Map<String, Value>);

impl RawDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        RawDocument(Map::new())
    }

    /// Serializes a draft (or any serializable value) into a raw document.
    ///
    /// ## Returns
    /// * `Err(CoreError::NotAnObject)` - The value serializes to a non-object
    pub fn from_serialize<S: Serialize + ?Sized>(value: &S) -> CoreResult<Self> {
        let value =
            serde_json::to_value(value).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Self::try_from(value)
    }

    /// Parses a stored JSON body.
    pub fn from_json(body: &str) -> CoreResult<Self> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Self::try_from(value)
    }

    /// Renders the document as compact JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(&self.0).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Returns the `_id` value if it is a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get(DOC_ID).and_then(Value::as_str)
    }

    /// Returns true if the document carries a usable (non-null) `_id`.
    pub fn has_id(&self) -> bool {
        matches!(self.0.get(DOC_ID), Some(v) if !v.is_null())
    }

    /// Sets the `_id` field.
    pub fn set_id(&mut self, id: &DocumentId) {
        self.0
            .insert(DOC_ID.to_string(), Value::String(id.as_str().to_string()));
    }

    /// Looks up a dotted field path (`"address.city"`, `"tags.0"`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value` at a dotted path, creating intermediate objects.
    ///
    /// Fails if an intermediate segment holds a non-object value.
    pub fn set_path(&mut self, path: &str, value: Value) -> CoreResult<()> {
        let (parents, leaf) = split_path(path);
        let mut current = &mut self.0;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                other => {
                    return Err(CoreError::InvalidUpdate(format!(
                        "cannot set '{}': '{}' holds {}",
                        path,
                        segment,
                        kind_of(other)
                    )))
                }
            };
        }
        current.insert(leaf.to_string(), value);
        Ok(())
    }

    /// Removes the value at a dotted path, returning it if present.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let (parents, leaf) = split_path(path);
        let mut current = &mut self.0;
        for segment in parents {
            current = match current.get_mut(segment)? {
                Value::Object(map) => map,
                _ => return None,
            };
        }
        current.remove(leaf)
    }

    /// Copies `metadata` into the reserved metadata fields.
    pub fn hydrate(&mut self, metadata: &Metadata) {
        self.0
            .insert(DOC_REVISION.to_string(), Value::from(metadata.revision));
        self.0.insert(
            DOC_CREATED.to_string(),
            Value::String(metadata.created_at.to_rfc3339()),
        );
        self.0.insert(
            DOC_MODIFIED.to_string(),
            Value::String(metadata.modified_at.to_rfc3339()),
        );
    }

    /// Reads metadata back from the reserved fields, if all are present.
    pub fn metadata(&self) -> Option<Metadata> {
        let revision = self.0.get(DOC_REVISION)?.as_i64()?;
        let created_at = parse_timestamp(self.0.get(DOC_CREATED)?)?;
        let modified_at = parse_timestamp(self.0.get(DOC_MODIFIED)?)?;
        Some(Metadata {
            revision,
            created_at,
            modified_at,
        })
    }

    /// Removes every storage metadata field.
    pub fn strip_metadata(&mut self) {
        for field in METADATA_FIELDS {
            self.0.remove(field);
        }
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutably borrows the underlying JSON object.
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Consumes the document, returning the JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for RawDocument {
    fn from(map: Map<String, Value>) -> Self {
        RawDocument(map)
    }
}

impl TryFrom<Value> for RawDocument {
    type Error = CoreError;

    fn try_from(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(RawDocument(map)),
            other => Err(CoreError::not_an_object("document", &other)),
        }
    }
}

impl From<RawDocument> for Value {
    fn from(doc: RawDocument) -> Self {
        Value::Object(doc.0)
    }
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    // split always yields at least one segment
    let leaf = segments.pop().unwrap_or(path);
    (segments, leaf)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawDocument {
        RawDocument::try_from(value).unwrap()
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_document_id_serializes_as_plain_string() {
        let id = DocumentId::new("abc");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc"));
    }

    #[test]
    fn test_from_serialize_rejects_non_objects() {
        let err = RawDocument::from_serialize(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, CoreError::NotAnObject { .. }));
    }

    #[test]
    fn test_dotted_paths() {
        let mut doc = raw(json!({"address": {"city": "Oslo"}, "tags": ["a", "b"]}));

        assert_eq!(doc.get_path("address.city"), Some(&json!("Oslo")));
        assert_eq!(doc.get_path("tags.1"), Some(&json!("b")));
        assert_eq!(doc.get_path("address.zip"), None);

        doc.set_path("address.zip", json!("0150")).unwrap();
        doc.set_path("profile.nick", json!("z")).unwrap();
        assert_eq!(doc.get_path("address.zip"), Some(&json!("0150")));
        assert_eq!(doc.get_path("profile.nick"), Some(&json!("z")));

        assert_eq!(doc.remove_path("address.city"), Some(json!("Oslo")));
        assert_eq!(doc.get_path("address.city"), None);
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut doc = raw(json!({"name": "a"}));
        let err = doc.set_path("name.first", json!("b")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidUpdate(_)));
    }

    #[test]
    fn test_hydrate_and_strip_metadata() {
        let mut doc = raw(json!({"_id": "x", "name": "a"}));
        let meta = Metadata::created(Utc::now());

        doc.hydrate(&meta);
        assert_eq!(doc.metadata(), Some(meta));
        assert_eq!(doc.get_path(DOC_REVISION), Some(&json!(1)));

        doc.strip_metadata();
        assert_eq!(doc, raw(json!({"_id": "x", "name": "a"})));
    }

    #[test]
    fn test_bumped_metadata_keeps_creation_time() {
        let created = Metadata::created(Utc::now());
        let later = created.bumped(Utc::now());
        assert_eq!(later.revision, 2);
        assert_eq!(later.created_at, created.created_at);
    }

    #[test]
    fn test_immutable_fields() {
        assert!(is_immutable_field("_id"));
        assert!(is_immutable_field("_revision"));
        assert!(!is_immutable_field("name"));
    }
}
