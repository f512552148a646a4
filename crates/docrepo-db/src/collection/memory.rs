//! # In-Memory Driver
//!
//! Process-local collections for tests and embedded use.
//!
//! ```text
//! MemoryStore
//!   └── HashMap<name, MemoryCollection>
//!                       └── RwLock<Vec<StoredEntry>>   (insertion order)
//! ```
//!
//! Reads take the read lock. Every write (insert, update, delete) runs its
//! whole find-then-modify under the write lock, which makes the
//! `find_one_and_*` operations atomic per collection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use docrepo_core::{Document, Filter, Metadata, RawDocument, Update};
use tokio::sync::RwLock;
use tracing::debug;

use super::{hydrated, require_id, Collection, ReturnDocument};
use crate::error::{DbError, DbResult};
use crate::repository::Repository;

/// Body plus the metadata the driver tracks for it.
#[derive(Debug, Clone)]
struct StoredEntry {
    body: RawDocument,
    meta: Metadata,
}

impl StoredEntry {
    fn view(&self) -> RawDocument {
        hydrated(self.body.clone(), &self.meta)
    }
}

// =============================================================================
// Collection
// =============================================================================

/// One named in-memory collection. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: Arc<str>,
    entries: Arc<RwLock<Vec<StoredEntry>>>,
}

impl MemoryCollection {
    /// Creates an empty, unshared collection.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        MemoryCollection {
            name: name.into(),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the collection holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Index of the first entry whose hydrated view matches `filter`.
fn position_of(entries: &[StoredEntry], filter: &Filter) -> DbResult<Option<usize>> {
    for (index, entry) in entries.iter().enumerate() {
        if filter.matches(&entry.view())? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, mut doc: RawDocument) -> DbResult<RawDocument> {
        let id = require_id(&self.name, &doc)?;
        doc.strip_metadata();

        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.body.id() == Some(id.as_str())) {
            return Err(DbError::duplicate("_id", id));
        }

        let entry = StoredEntry {
            body: doc,
            meta: Metadata::created(Utc::now()),
        };
        let view = entry.view();
        entries.push(entry);

        debug!(collection = %self.name, id = %id, "Inserted document");
        Ok(view)
    }

    async fn find(&self, filter: &Filter) -> DbResult<Vec<RawDocument>> {
        let entries = self.entries.read().await;
        let mut found = Vec::new();
        for entry in entries.iter() {
            let view = entry.view();
            if filter.matches(&view)? {
                found.push(view);
            }
        }
        Ok(found)
    }

    async fn find_one(&self, filter: &Filter) -> DbResult<Option<RawDocument>> {
        let entries = self.entries.read().await;
        Ok(position_of(&entries, filter)?.map(|index| entries[index].view()))
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
        returning: ReturnDocument,
    ) -> DbResult<Option<RawDocument>> {
        let mut entries = self.entries.write().await;
        let Some(index) = position_of(&entries, filter)? else {
            return Ok(None);
        };

        let entry = &mut entries[index];
        let before = entry.view();
        let mut body = update.apply(&entry.body)?;
        body.strip_metadata();

        entry.body = body;
        entry.meta = entry.meta.bumped(Utc::now());

        debug!(
            collection = %self.name,
            revision = entry.meta.revision,
            "Updated document"
        );

        Ok(Some(match returning {
            ReturnDocument::Before => before,
            ReturnDocument::After => entry.view(),
        }))
    }

    async fn find_one_and_delete(&self, filter: &Filter) -> DbResult<Option<RawDocument>> {
        let mut entries = self.entries.write().await;
        let Some(index) = position_of(&entries, filter)? else {
            return Ok(None);
        };

        // remove (not swap_remove) keeps insertion order for later scans
        let entry = entries.remove(index);
        debug!(collection = %self.name, "Deleted document");
        Ok(Some(entry.view()))
    }
}

// =============================================================================
// Store
// =============================================================================

/// A set of named in-memory collections, created on first use.
///
/// ## Example
/// ```rust,ignore
/// let store = MemoryStore::new();
/// let users = store.repository::<User>().await;
/// let created = users.create(NewUser { .. }).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, creating it if needed.
    pub async fn collection(&self, name: &str) -> MemoryCollection {
        if let Some(existing) = self.collections.read().await.get(name) {
            return existing.clone();
        }

        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection::new(name))
            .clone()
    }

    /// Builds a repository over `T::COLLECTION`.
    pub async fn repository<T: Document>(&self) -> Repository<T, MemoryCollection> {
        Repository::new(self.collection(T::COLLECTION).await)
    }

    /// Names of every collection created so far, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawDocument {
        RawDocument::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_hydrates_metadata() {
        let users = MemoryCollection::new("users");
        let stored = users
            .insert_one(raw(json!({"_id": "u-1", "name": "Ada"})))
            .await
            .unwrap();

        let meta = stored.metadata().unwrap();
        assert_eq!(meta.revision, 1);
        assert_eq!(meta.created_at, meta.modified_at);
        assert_eq!(stored.id(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let users = MemoryCollection::new("users");
        users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap();

        let err = users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(users.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_without_id_rejected() {
        let users = MemoryCollection::new("users");
        let err = users.insert_one(raw(json!({"name": "Ada"}))).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_find_keeps_insertion_order() {
        let users = MemoryCollection::new("users");
        for (id, age) in [("c", 30), ("a", 40), ("b", 30)] {
            users
                .insert_one(raw(json!({"_id": id, "age": age})))
                .await
                .unwrap();
        }

        let found = users.find(&Filter::new(json!({"age": 30}))).await.unwrap();
        let ids: Vec<_> = found.iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let first = users
            .find_one(&Filter::new(json!({"age": 30})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id(), Some("c"));
    }

    #[tokio::test]
    async fn test_update_bumps_revision_and_returns_requested_state() {
        let users = MemoryCollection::new("users");
        users
            .insert_one(raw(json!({"_id": "u-1", "visits": 1})))
            .await
            .unwrap();

        let filter = Filter::new(json!({"_id": "u-1"}));
        let before = users
            .find_one_and_update(
                &filter,
                &Update::new(json!({"$inc": {"visits": 1}})),
                ReturnDocument::Before,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.get_path("visits"), Some(&json!(1)));

        let after = users
            .find_one_and_update(
                &filter,
                &Update::new(json!({"$inc": {"visits": 1}})),
                ReturnDocument::After,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.get_path("visits"), Some(&json!(3)));
        assert_eq!(after.metadata().unwrap().revision, 3);
    }

    #[tokio::test]
    async fn test_update_miss_writes_nothing() {
        let users = MemoryCollection::new("users");
        users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap();

        let result = users
            .find_one_and_update(
                &Filter::new(json!({"_id": "nope"})),
                &Update::new(json!({"$set": {"x": 1}})),
                ReturnDocument::After,
            )
            .await
            .unwrap();
        assert!(result.is_none());

        let untouched = users.find_one(&Filter::all()).await.unwrap().unwrap();
        assert_eq!(untouched.metadata().unwrap().revision, 1);
        assert!(untouched.get_path("x").is_none());
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_document_alone() {
        let users = MemoryCollection::new("users");
        users
            .insert_one(raw(json!({"_id": "u-1", "name": "Ada"})))
            .await
            .unwrap();

        let err = users
            .find_one_and_update(
                &Filter::all(),
                &Update::new(json!({"$set": {"_id": "u-2"}})),
                ReturnDocument::After,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query(_)));

        let doc = users.find_one(&Filter::all()).await.unwrap().unwrap();
        assert_eq!(doc.id(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_delete_removes_first_match_only() {
        let users = MemoryCollection::new("users");
        for id in ["a", "b"] {
            users
                .insert_one(raw(json!({"_id": id, "role": "admin"})))
                .await
                .unwrap();
        }

        let deleted = users
            .find_one_and_delete(&Filter::new(json!({"role": "admin"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(deleted.id(), Some("a"));
        assert_eq!(users.len().await, 1);

        let again = users
            .find_one_and_delete(&Filter::new(json!({"_id": "a"})))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_store_shares_collections_by_name() {
        let store = MemoryStore::new();
        let first = store.collection("users").await;
        first.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap();

        let second = store.collection("users").await;
        assert_eq!(second.len().await, 1);
        assert!(store.collection("orders").await.is_empty().await);
        assert_eq!(store.collection_names().await, vec!["orders", "users"]);
    }
}
