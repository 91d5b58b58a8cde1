use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::repository::models::{Lease, NewObligation, Obligation, ObligationStatus};
use crate::repository::store::{LeaseDirectory, ObligationStore, StoreError};

/// In-process store used by the schedule tests. `insert` is atomic under the
/// mutex, mirroring the unique index in PostgreSQL.
#[derive(Default)]
pub struct MemoryScheduleStore {
    leases: Mutex<BTreeMap<String, Lease>>,
    obligations: Mutex<BTreeMap<(String, NaiveDate), Obligation>>,
    failing_leases: Mutex<BTreeSet<String>>,
    blind_exists: bool,
    insert_attempts: AtomicUsize,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `exists` always answers `false`, so every writer races
    /// straight into `insert`.
    pub fn with_blind_exists() -> Self {
        Self {
            blind_exists: true,
            ..Self::default()
        }
    }

    pub fn put_lease(&self, lease: Lease) {
        self.leases
            .lock()
            .expect("lease map poisoned")
            .insert(lease.lease_id.clone(), lease);
    }

    pub fn seed_obligation(&self, obligation: NewObligation) {
        let record = due_record(obligation);
        self.obligations
            .lock()
            .expect("obligation map poisoned")
            .insert((record.lease_id.clone(), record.due_date), record);
    }

    /// Every store call touching this lease fails with a database error.
    pub fn fail_lease(&self, lease_id: &str) {
        self.failing_leases
            .lock()
            .expect("failure set poisoned")
            .insert(lease_id.to_string());
    }

    pub fn due_dates(&self, lease_id: &str) -> Vec<NaiveDate> {
        self.obligations
            .lock()
            .expect("obligation map poisoned")
            .keys()
            .filter(|(id, _)| id == lease_id)
            .map(|(_, due_date)| *due_date)
            .collect()
    }

    pub fn obligations(&self, lease_id: &str) -> Vec<Obligation> {
        self.obligations
            .lock()
            .expect("obligation map poisoned")
            .values()
            .filter(|record| record.lease_id == lease_id)
            .cloned()
            .collect()
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    fn check_failure(&self, lease_id: &str) -> Result<(), StoreError> {
        if self
            .failing_leases
            .lock()
            .expect("failure set poisoned")
            .contains(lease_id)
        {
            return Err(StoreError::Database(format!(
                "simulated failure for {lease_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseDirectory for MemoryScheduleStore {
    async fn get_lease(&self, lease_id: &str) -> Result<Option<Lease>, StoreError> {
        Ok(self
            .leases
            .lock()
            .expect("lease map poisoned")
            .get(lease_id)
            .cloned())
    }

    async fn list_active_leases(
        &self,
        today: NaiveDate,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Lease>, StoreError> {
        Ok(self
            .leases
            .lock()
            .expect("lease map poisoned")
            .values()
            .filter(|lease| start_after.map_or(true, |cursor| lease.lease_id.as_str() > cursor))
            .filter(|lease| lease.is_active_on(today))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ObligationStore for MemoryScheduleStore {
    async fn exists(&self, lease_id: &str, due_date: NaiveDate) -> Result<bool, StoreError> {
        self.check_failure(lease_id)?;
        if self.blind_exists {
            return Ok(false);
        }
        Ok(self
            .obligations
            .lock()
            .expect("obligation map poisoned")
            .contains_key(&(lease_id.to_string(), due_date)))
    }

    async fn max_due_date(&self, lease_id: &str) -> Result<Option<NaiveDate>, StoreError> {
        self.check_failure(lease_id)?;
        Ok(self.due_dates(lease_id).into_iter().max())
    }

    async fn insert(&self, obligation: NewObligation) -> Result<Obligation, StoreError> {
        self.check_failure(&obligation.lease_id)?;
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        // Yield so concurrent generators interleave between check and insert.
        tokio::task::yield_now().await;

        let key = (obligation.lease_id.clone(), obligation.due_date);
        let mut obligations = self.obligations.lock().expect("obligation map poisoned");
        if obligations.contains_key(&key) {
            return Err(StoreError::Duplicate {
                lease_id: obligation.lease_id,
                due_date: obligation.due_date,
            });
        }
        let record = due_record(obligation);
        obligations.insert(key, record.clone());
        Ok(record)
    }
}

fn due_record(obligation: NewObligation) -> Obligation {
    Obligation {
        lease_id: obligation.lease_id,
        due_date: obligation.due_date,
        amount: obligation.amount,
        status: ObligationStatus::Due,
        paid_at: None,
        payment_method: None,
        note: None,
    }
}
