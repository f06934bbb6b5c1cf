//! Append-only observation store.

pub mod auth;
pub mod sheets;

use async_trait::async_trait;
use damlog::SyncError;
use std::collections::HashSet;

pub use auth::TokenProvider;
pub use sheets::SheetsStore;

/// A timestamp-keyed log that can be read back and appended to.
#[async_trait]
pub trait Store: Send + Sync {
    /// Every observation timestamp already stored, in the store's text form.
    async fn query_existing_timestamps(&self) -> Result<HashSet<String>, SyncError>;
    /// Append rows after the last stored row.
    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SyncError>;
}
