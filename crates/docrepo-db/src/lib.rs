//! # docrepo-db: Storage Layer and Generic Repository
//!
//! Persists [`docrepo_core::Document`] types through one generic
//! [`Repository`] over pluggable collection drivers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        docrepo Data Flow                                │
//! │                                                                         │
//! │  Service code (users.find_one(filter))                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   docrepo-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Repository   │    │  Collections  │    │  Database    │  │   │
//! │  │   │(repository/)  │───►│ (collection/) │◄───│  (pool.rs)   │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ NotFound +    │    │ SqliteColl.   │    │ SqlitePool   │  │   │
//! │  │   │ normalization │    │ MemoryColl.   │    │ migrations   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite `documents` table   or   process memory                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`repository`] - Generic repository, `RepositoryError`, miss logging
//! - [`collection`] - The `Collection` trait and its SQLite/memory drivers
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Store configuration (TOML file + `DOCREPO_*` env)
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docrepo_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/docs.db")).await?;
//!
//! let users = db.repository::<User>();
//! let ada = users.create(NewUser { name: "Ada".into() }).await?;
//! let found = users.find_one(Filter::by_id(&ada.id)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod collection;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use collection::{Collection, MemoryCollection, MemoryStore, ReturnDocument, SqliteCollection};
pub use config::{Backend, StoreConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{MissLogger, RepoResult, Repository, RepositoryError, TracingMissLogger};
