//! # docrepo-core: Pure Document Model
//!
//! Types shared by the repository and every storage driver, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        docrepo Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Service layer (out of scope)                     │   │
//! │  │      users.find_one(filter), orders.create(draft), ...          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               docrepo-db: Repository<T, C>                      │   │
//! │  │      not-found contract, normalization, miss logging            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ docrepo-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ document  │  │  filter   │  │  update   │  │ normalize │  │   │
//! │  │   │ Document  │  │  $eq $in  │  │ $set $inc │  │ strip     │  │   │
//! │  │   │ RawDoc    │  │  $or ...  │  │ $unset    │  │ metadata  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`document`] - `Document` capability, `DocumentId`, `RawDocument`, metadata
//! - [`query`] - `Filter` and `Update` descriptors and their evaluation
//! - [`normalize`] - Raw document → plain domain value
//! - [`error`] - `CoreError`
//!
//! ## Example Usage
//!
//! ```rust
//! use docrepo_core::{Filter, RawDocument, Update};
//! use serde_json::json;
//!
//! let doc = RawDocument::try_from(json!({"_id": "1", "name": "a"})).unwrap();
//!
//! assert!(Filter::new(json!({"name": "a"})).matches(&doc).unwrap());
//!
//! let updated = Update::new(json!({"name": "b"})).apply(&doc).unwrap();
//! assert_eq!(updated.get_path("name"), Some(&json!("b")));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod normalize;
pub mod query;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::{
    Document, DocumentId, Metadata, RawDocument, DOC_CREATED, DOC_ID, DOC_MODIFIED,
    DOC_REVISION, METADATA_FIELDS,
};
pub use error::{CoreError, CoreResult};
pub use normalize::{normalize, normalize_all};
pub use query::{Filter, Update};
