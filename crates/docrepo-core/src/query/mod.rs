//! # Query Descriptors
//!
//! Filter and update descriptors, plus the evaluator storage drivers use to
//! interpret them.
//!
//! ```text
//! Repository ──(Filter, Update)──► Collection driver ──► Filter::matches
//!  (forwards, never inspects)                            Update::apply
//! ```

pub mod filter;
pub mod update;

pub use filter::Filter;
pub use update::Update;
