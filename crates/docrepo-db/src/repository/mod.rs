//! # Repository Module
//!
//! One generic repository serving every document type.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Generic Repository                                   │
//! │                                                                         │
//! │  Service code                                                           │
//! │       │                                                                 │
//! │       │  users.find_one(Filter::by_id(&id))                             │
//! │       ▼                                                                 │
//! │  Repository<User, C>                                                    │
//! │  ├── create(draft)              → User                                  │
//! │  ├── find_one(filter)           → User     (miss: warn + NotFound)      │
//! │  ├── find_one_and_update(f, u)  → User     (post-update state)          │
//! │  ├── find(filter)               → Vec<User> (miss: empty vec)           │
//! │  └── find_one_and_delete(f)     → User     (miss: warn + NotFound)      │
//! │       │                                                                 │
//! │       │  one Collection call per operation                              │
//! │       ▼                                                                 │
//! │  C: Collection (SqliteCollection | MemoryCollection)                    │
//! │       │                                                                 │
//! │       ▼  raw documents                                                  │
//! │  normalize::<User>()  strips _revision/_created/_modified, __*          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The repository holds no per-document state and takes no locks. Atomicity
//! of the `find_one_and_*` operations belongs to the driver.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use docrepo_core::{
    normalize, normalize_all, CoreError, Document, DocumentId, Filter, RawDocument, Update,
};
use thiserror::Error;
use tracing::debug;

use crate::collection::{Collection, ReturnDocument};
use crate::error::DbError;

mod log;

pub use log::{MissLogger, TracingMissLogger};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by [`Repository`] operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A singular operation matched no document.
    ///
    /// ## When This Occurs
    /// - `find_one`, `find_one_and_update` or `find_one_and_delete` with a
    ///   filter that matches nothing
    #[error("Document was not found")]
    NotFound,

    /// Anything the storage driver reported, unchanged.
    #[error(transparent)]
    Storage(#[from] DbError),

    /// The repository could not translate between `T` and a raw document.
    ///
    /// ## When This Occurs
    /// - The draft does not serialize to a JSON object
    /// - A stored document lacks a field `T` requires
    #[error("Document mapping failed: {0}")]
    Mapping(#[from] CoreError),
}

impl RepositoryError {
    /// Returns true for [`RepositoryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound)
    }
}

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepositoryError>;

// =============================================================================
// Repository
// =============================================================================

/// CRUD access to one collection of `T` documents.
///
/// ## Example
/// ```rust,ignore
/// let users: Repository<User, SqliteCollection> = db.repository();
///
/// let ada = users.create(NewUser { name: "Ada".into() }).await?;
/// let same = users.find_one(Filter::by_id(&ada.id)).await?;
/// ```
pub struct Repository<T, C> {
    collection: C,
    logger: Arc<dyn MissLogger>,
    _document: PhantomData<fn() -> T>,
}

impl<T, C: Clone> Clone for Repository<T, C> {
    fn clone(&self) -> Self {
        Repository {
            collection: self.collection.clone(),
            logger: Arc::clone(&self.logger),
            _document: PhantomData,
        }
    }
}

impl<T, C: Collection> fmt::Debug for Repository<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection.name())
            .finish_non_exhaustive()
    }
}

impl<T: Document, C: Collection> Repository<T, C> {
    /// Creates a repository that reports misses through `tracing`.
    pub fn new(collection: C) -> Self {
        Self::with_logger(collection, Arc::new(TracingMissLogger))
    }

    /// Creates a repository with an injected miss logger.
    pub fn with_logger(collection: C, logger: Arc<dyn MissLogger>) -> Self {
        Repository {
            collection,
            logger,
            _document: PhantomData,
        }
    }

    /// The underlying collection handle.
    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Persists a new document built from `draft`.
    ///
    /// A fresh UUID v4 identifier is assigned unless the draft already
    /// carries a non-null `_id`.
    ///
    /// ## Returns
    /// * `Ok(T)` - The persisted document, normalized
    /// * `Err(RepositoryError::Mapping)` - Draft is not a JSON object
    /// * `Err(RepositoryError::Storage)` - Insert failed (duplicate id, I/O)
    pub async fn create(&self, draft: T::Draft) -> RepoResult<T> {
        let mut raw = RawDocument::from_serialize(&draft)?;
        if !raw.has_id() {
            raw.set_id(&DocumentId::generate());
        }

        debug!(collection = %self.collection.name(), id = ?raw.id(), "Creating document");

        let stored = self.collection.insert_one(raw).await?;
        Ok(normalize(stored)?)
    }

    /// Returns the first document matching `filter`.
    ///
    /// ## Returns
    /// * `Ok(T)` - Earliest inserted match, normalized
    /// * `Err(RepositoryError::NotFound)` - No match (warning logged)
    /// * `Err(RepositoryError::Mapping)` - Match does not fit `T`
    pub async fn find_one(&self, filter: Filter) -> RepoResult<T> {
        debug!(collection = %self.collection.name(), filter = %filter, "find_one");

        match self.collection.find_one(&filter).await? {
            Some(raw) => Ok(normalize(raw)?),
            None => Err(self.missing("find_one", &filter)),
        }
    }

    /// Atomically applies `update` to the first match and returns the
    /// post-update document.
    ///
    /// ## Returns
    /// * `Ok(T)` - Updated document, normalized
    /// * `Err(RepositoryError::NotFound)` - No match, nothing written
    /// * `Err(RepositoryError::Storage)` - Rejected update or driver failure
    pub async fn find_one_and_update(&self, filter: Filter, update: Update) -> RepoResult<T> {
        debug!(
            collection = %self.collection.name(),
            filter = %filter,
            update = %update,
            "find_one_and_update"
        );

        let updated = self
            .collection
            .find_one_and_update(&filter, &update, ReturnDocument::After)
            .await?;

        match updated {
            Some(raw) => Ok(normalize(raw)?),
            None => Err(self.missing("find_one_and_update", &filter)),
        }
    }

    /// Returns every match in storage order. No match is an empty vec.
    pub async fn find(&self, filter: Filter) -> RepoResult<Vec<T>> {
        debug!(collection = %self.collection.name(), filter = %filter, "find");

        let raws = self.collection.find(&filter).await?;
        Ok(normalize_all(raws)?)
    }

    /// Atomically removes the first match and returns it as it was.
    ///
    /// ## Returns
    /// * `Ok(T)` - The deleted document, normalized
    /// * `Err(RepositoryError::NotFound)` - No match (warning logged)
    pub async fn find_one_and_delete(&self, filter: Filter) -> RepoResult<T> {
        debug!(collection = %self.collection.name(), filter = %filter, "find_one_and_delete");

        match self.collection.find_one_and_delete(&filter).await? {
            Some(raw) => Ok(normalize(raw)?),
            None => Err(self.missing("find_one_and_delete", &filter)),
        }
    }

    fn missing(&self, operation: &str, filter: &Filter) -> RepositoryError {
        self.logger
            .document_missing(self.collection.name(), operation, filter);
        RepositoryError::NotFound
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
