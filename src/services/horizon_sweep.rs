use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::repository::models::Lease;
use crate::repository::store::{LeaseDirectory, ObligationStore};
use crate::services::billing_calendar::{first_day_of_month, next_month_start};
use crate::services::lease_schedule::{
    generate_for_lease, horizon_end, ScheduleError, ScheduleOutcome, ScheduleRange,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    pub today: NaiveDate,
    pub horizon_days: i64,
    /// Leases fetched per directory page.
    pub batch_size: usize,
    /// Upper bound on leases handled by one invocation.
    pub max_leases: usize,
}

/// Result of one bounded sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub leases_scanned: u32,
    pub leases_extended: u32,
    pub leases_skipped: u32,
    pub obligations_created: u32,
    pub obligations_skipped: u32,
    pub failures: u32,
    /// Resume point when the pass stopped before the last active lease.
    pub next_cursor: Option<String>,
    pub completed: bool,
}

enum LeaseSweepOutcome {
    Extended(ScheduleOutcome),
    Covered,
}

/// First month not yet generated for a lease.
///
/// With obligations on file this is the month after the latest due date;
/// otherwise the later of the lease's start month and the current month.
pub fn next_start_for(
    latest_due: Option<NaiveDate>,
    lease_start: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    match latest_due {
        Some(latest) => Some(next_month_start(latest)),
        None => lease_start.map(|start| first_day_of_month(start).max(first_day_of_month(today))),
    }
}

pub fn target_end_for(lease_end: Option<NaiveDate>, today: NaiveDate, horizon_days: i64) -> NaiveDate {
    let horizon = horizon_end(today, horizon_days);
    match lease_end {
        Some(end) => end.min(horizon),
        None => horizon,
    }
}

/// Top up every active lease so obligations exist through
/// `min(lease_end, today + horizon_days)`.
///
/// Leases are walked in `lease_id` order starting after `start_after`. A
/// failing lease is logged and counted; the pass moves on to the next one.
pub async fn run_horizon_sweep(
    directory: &dyn LeaseDirectory,
    store: &dyn ObligationStore,
    options: &SweepOptions,
    start_after: Option<String>,
) -> SweepSummary {
    let mut summary = SweepSummary::default();
    let mut cursor = start_after;
    let max_leases = options.max_leases.max(1);
    let batch_size = options.batch_size.max(1);
    let mut handled = 0_usize;

    loop {
        if handled >= max_leases {
            summary.next_cursor = cursor;
            break;
        }
        let limit = batch_size.min(max_leases - handled);

        let leases = match directory
            .list_active_leases(options.today, cursor.as_deref(), limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(cursor = ?cursor, "Failed to fetch active leases for horizon sweep: {e}");
                summary.failures += 1;
                summary.next_cursor = cursor;
                return summary;
            }
        };

        let fetched = leases.len();
        for lease in leases {
            handled += 1;
            summary.leases_scanned += 1;
            match sweep_lease(store, &lease, options).await {
                Ok(LeaseSweepOutcome::Extended(outcome)) => {
                    summary.leases_extended += 1;
                    summary.obligations_created += outcome.created;
                    summary.obligations_skipped += outcome.skipped;
                }
                Ok(LeaseSweepOutcome::Covered) => summary.leases_skipped += 1,
                Err(_) => summary.failures += 1,
            }
            cursor = Some(lease.lease_id);
        }

        if fetched < limit {
            summary.completed = true;
            break;
        }
    }

    info!(
        scanned = summary.leases_scanned,
        extended = summary.leases_extended,
        skipped = summary.leases_skipped,
        created = summary.obligations_created,
        failures = summary.failures,
        completed = summary.completed,
        "Horizon sweep finished"
    );

    summary
}

async fn sweep_lease(
    store: &dyn ObligationStore,
    lease: &Lease,
    options: &SweepOptions,
) -> Result<LeaseSweepOutcome, ScheduleError> {
    if !lease.is_active_on(options.today) {
        return Ok(LeaseSweepOutcome::Covered);
    }

    let latest_due = store.max_due_date(&lease.lease_id).await.inspect_err(|e| {
        warn!(lease_id = %lease.lease_id, "Horizon sweep could not read latest obligation: {e}");
    })?;

    let Some(next_start) = next_start_for(latest_due, lease.lease_start, options.today) else {
        return Ok(LeaseSweepOutcome::Covered);
    };
    let target_end = target_end_for(lease.lease_end, options.today, options.horizon_days);
    if target_end < next_start {
        return Ok(LeaseSweepOutcome::Covered);
    }

    // `next_start` is always a month start; the day comes from the lease.
    let anchor = lease.lease_start.or(latest_due).unwrap_or(next_start);
    let range = ScheduleRange::new(next_start, Some(target_end), options.today)
        .with_horizon_days(options.horizon_days)
        .anchored_on(anchor);
    generate_for_lease(store, lease, &range)
        .await
        .map(LeaseSweepOutcome::Extended)
        .inspect_err(|e| {
            warn!(
                lease_id = %lease.lease_id,
                start_on = %next_start,
                end_on = %target_end,
                "Horizon sweep failed for lease: {e}"
            );
        })
}
