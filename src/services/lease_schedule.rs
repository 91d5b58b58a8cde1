use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DEFAULT_HORIZON_DAYS;
use crate::repository::models::{Lease, NewObligation};
use crate::repository::store::{LeaseDirectory, ObligationStore, StoreError};
use crate::services::billing_calendar::monthly_due_dates;
use crate::services::rent_resolver::{resolve_monthly_rent, AmountUnavailable};

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Fatal for the whole call; nothing is created for the lease.
    #[error("lease {lease_id} has neither a rent override nor a unit rent")]
    AmountUnavailable { lease_id: String },
    #[error("lease {0} not found")]
    LeaseNotFound(String),
    #[error("lease {0} has no start date")]
    MissingLeaseStart(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AmountUnavailable> for ScheduleError {
    fn from(error: AmountUnavailable) -> Self {
        Self::AmountUnavailable {
            lease_id: error.lease_id,
        }
    }
}

/// Date inputs for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRange {
    pub start_on: NaiveDate,
    /// `None` means `today + horizon_days`.
    pub end_on: Option<NaiveDate>,
    pub today: NaiveDate,
    pub horizon_days: i64,
    /// Day of month obligations fall on. `None` takes the day of `start_on`
    /// as given, before it is clamped to `today`.
    pub anchor_day: Option<u32>,
}

impl ScheduleRange {
    pub fn new(start_on: NaiveDate, end_on: Option<NaiveDate>, today: NaiveDate) -> Self {
        Self {
            start_on,
            end_on,
            today,
            horizon_days: DEFAULT_HORIZON_DAYS,
            anchor_day: None,
        }
    }

    /// Anchor on the lease's own start date rather than the range start.
    pub fn anchored_on(mut self, anchor: NaiveDate) -> Self {
        self.anchor_day = Some(anchor.day());
        self
    }

    pub fn anchor_day(&self) -> u32 {
        self.anchor_day.unwrap_or_else(|| self.start_on.day())
    }

    pub fn with_horizon_days(mut self, horizon_days: i64) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    /// Clamped `(start_on, end_on)`, or `None` when the range is empty.
    pub fn normalized(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start_on = self.start_on.max(self.today);
        let end_on = self
            .end_on
            .unwrap_or_else(|| horizon_end(self.today, self.horizon_days));
        if end_on < start_on {
            return None;
        }
        Some((start_on, end_on))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub created: u32,
    pub skipped: u32,
    /// Always zero: existing obligations are never rewritten.
    pub updated: u32,
}

pub fn horizon_end(today: NaiveDate, horizon_days: i64) -> NaiveDate {
    today
        .checked_add_signed(Duration::days(horizon_days))
        .unwrap_or(NaiveDate::MAX)
}

/// Load the lease and generate its missing monthly obligations.
pub async fn generate_schedule(
    directory: &dyn LeaseDirectory,
    store: &dyn ObligationStore,
    lease_id: &str,
    range: &ScheduleRange,
) -> Result<ScheduleOutcome, ScheduleError> {
    let lease = directory
        .get_lease(lease_id)
        .await?
        .ok_or_else(|| ScheduleError::LeaseNotFound(lease_id.to_string()))?;
    generate_for_lease(store, &lease, range).await
}

/// Create every monthly obligation in `range` that is not already on file.
///
/// Due dates fall on `range.anchor_day()`; dates before `range.today` are
/// never materialized. A concurrent writer
/// winning the insert race counts as `skipped`.
pub async fn generate_for_lease(
    store: &dyn ObligationStore,
    lease: &Lease,
    range: &ScheduleRange,
) -> Result<ScheduleOutcome, ScheduleError> {
    let mut outcome = ScheduleOutcome::default();
    let Some((start_on, end_on)) = range.normalized() else {
        debug!(
            lease_id = %lease.lease_id,
            start_on = %range.start_on,
            today = %range.today,
            "Schedule range is empty, nothing to generate"
        );
        return Ok(outcome);
    };

    let mut amount: Option<Decimal> = None;

    for due_date in monthly_due_dates(range.anchor_day(), start_on, end_on) {
        // Past due, or before the range start in its first month.
        if due_date < start_on {
            continue;
        }

        if store.exists(&lease.lease_id, due_date).await? {
            outcome.skipped += 1;
            continue;
        }

        let monthly_rent = match amount {
            Some(value) => value,
            None => {
                let value = resolve_monthly_rent(lease)?;
                amount = Some(value);
                value
            }
        };

        let obligation = NewObligation {
            lease_id: lease.lease_id.clone(),
            due_date,
            amount: monthly_rent,
        };
        match store.insert(obligation).await {
            Ok(_) => outcome.created += 1,
            Err(StoreError::Duplicate { .. }) => {
                debug!(
                    lease_id = %lease.lease_id,
                    %due_date,
                    "Obligation created concurrently, counting as skipped"
                );
                outcome.skipped += 1;
            }
            Err(error) => return Err(error.into()),
        }
    }

    if outcome.created > 0 {
        info!(
            lease_id = %lease.lease_id,
            %start_on,
            %end_on,
            created = outcome.created,
            skipped = outcome.skipped,
            "Lease schedule generated"
        );
    }

    Ok(outcome)
}
