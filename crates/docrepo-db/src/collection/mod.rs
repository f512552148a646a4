//! # Collection Drivers
//!
//! The storage collaborator surface the generic repository consumes.
//!
//! ## One Trait, Two Drivers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Collection Trait                                    │
//! │                                                                         │
//! │  Repository<T, C: Collection>                                          │
//! │       │                                                                 │
//! │       │  insert_one / find / find_one                                   │
//! │       │  find_one_and_update / find_one_and_delete                      │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────┐      ┌──────────────────────────┐        │
//! │  │ SqliteCollection         │      │ MemoryCollection         │        │
//! │  │ (sqlite.rs)              │      │ (memory.rs)              │        │
//! │  │                          │      │                          │        │
//! │  │ documents table          │      │ Vec behind tokio RwLock  │        │
//! │  │ IMMEDIATE tx for writes  │      │ write lock for writes    │        │
//! │  └──────────────────────────┘      └──────────────────────────┘        │
//! │                                                                         │
//! │  Both hydrate _revision / _created / _modified into every result.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Drivers own descriptor interpretation (`Filter::matches`,
//! `Update::apply`). Matching documents are visited in insertion order, so
//! "first match" means "earliest inserted match" on every driver.

use async_trait::async_trait;
use docrepo_core::{Filter, Metadata, RawDocument, Update};

use crate::error::{DbError, DbResult};

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryCollection, MemoryStore};
pub use sqlite::SqliteCollection;

/// Which state `find_one_and_update` hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    /// The document as it was before the update.
    Before,
    /// The document after the update was applied.
    #[default]
    After,
}

/// Handle to one named collection of raw documents.
///
/// Every method is a single request/response against the store. The
/// `find_one_and_*` methods are atomic for the one document they touch.
#[async_trait]
pub trait Collection: Send + Sync {
    /// The collection name.
    fn name(&self) -> &str;

    /// Persists a document that already carries a string `_id`.
    ///
    /// ## Returns
    /// * `Ok(RawDocument)` - The stored document, hydrated with metadata
    /// * `Err(DbError::UniqueViolation)` - `_id` already present
    async fn insert_one(&self, doc: RawDocument) -> DbResult<RawDocument>;

    /// Returns every matching document in insertion order.
    async fn find(&self, filter: &Filter) -> DbResult<Vec<RawDocument>>;

    /// Returns the first matching document, if any.
    async fn find_one(&self, filter: &Filter) -> DbResult<Option<RawDocument>>;

    /// Atomically updates the first matching document.
    ///
    /// Returns `Ok(None)` without writing anything when nothing matches.
    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
        returning: ReturnDocument,
    ) -> DbResult<Option<RawDocument>>;

    /// Atomically removes the first matching document, returning it.
    async fn find_one_and_delete(&self, filter: &Filter) -> DbResult<Option<RawDocument>>;
}

/// Extracts the string `_id` a driver keys documents by.
pub(crate) fn require_id(collection: &str, doc: &RawDocument) -> DbResult<String> {
    doc.id().map(str::to_string).ok_or_else(|| {
        DbError::QueryFailed(format!(
            "document inserted into '{}' has no string _id",
            collection
        ))
    })
}

/// Body plus metadata, rendered the way callers see it.
pub(crate) fn hydrated(mut body: RawDocument, metadata: &Metadata) -> RawDocument {
    body.hydrate(metadata);
    body
}
