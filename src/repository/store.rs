use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::repository::models::{Lease, NewObligation, Obligation};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The `(lease_id, due_date)` pair is already on file.
    #[error("obligation for lease {lease_id} due {due_date} already exists")]
    Duplicate { lease_id: String, due_date: NaiveDate },
    #[error("database error: {0}")]
    Database(String),
}

/// Read access to leases and their rent terms.
#[async_trait]
pub trait LeaseDirectory: Send + Sync {
    async fn get_lease(&self, lease_id: &str) -> Result<Option<Lease>, StoreError>;

    /// Leases with no end date or an end date on/after `today`, ordered by
    /// `lease_id` and starting strictly after `start_after`.
    async fn list_active_leases(
        &self,
        today: NaiveDate,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Lease>, StoreError>;
}

/// Persisted rent obligations.
///
/// `insert` must be an atomic insert-if-absent: a second writer for the same
/// `(lease_id, due_date)` gets `StoreError::Duplicate`, never a second row.
#[async_trait]
pub trait ObligationStore: Send + Sync {
    async fn exists(&self, lease_id: &str, due_date: NaiveDate) -> Result<bool, StoreError>;

    async fn max_due_date(&self, lease_id: &str) -> Result<Option<NaiveDate>, StoreError>;

    async fn insert(&self, obligation: NewObligation) -> Result<Obligation, StoreError>;
}
