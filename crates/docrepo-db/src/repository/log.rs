//! Miss reporting for singular repository lookups.

use docrepo_core::Filter;
use tracing::warn;

/// Receives a warning whenever a singular operation matches nothing.
///
/// The filter is reported here and never embedded in the returned error.
pub trait MissLogger: Send + Sync {
    /// Called once per miss, before `NotFound` is returned.
    ///
    /// ## Arguments
    /// * `collection` - Collection the lookup ran against
    /// * `operation` - Repository operation name (`"find_one"`, ...)
    /// * `filter` - The filter that matched no document
    fn document_missing(&self, collection: &str, operation: &str, filter: &Filter);
}

/// Default logger: one `tracing` warning per miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMissLogger;

impl MissLogger for TracingMissLogger {
    fn document_missing(&self, collection: &str, operation: &str, filter: &Filter) {
        warn!(
            collection = %collection,
            operation = %operation,
            filter = %filter,
            "Document was not found"
        );
    }
}
