use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::services::horizon_sweep::{run_horizon_sweep, SweepOptions, SweepSummary};
use crate::state::{AppState, ScheduleServices};

/// In-process stand-in for an external cron: runs the horizon sweep once per
/// calendar day at or after `SCHEDULE_SWEEP_HOUR_UTC`.
///
/// The sweep runs in its own `tokio::spawn` so a panic never takes the loop
/// down with it.
pub async fn run_background_scheduler(state: AppState) {
    tracing::info!("Background scheduler started");

    let services = match state.schedule.clone() {
        Some(services) => services,
        None => {
            tracing::warn!("Scheduler: no database pool configured, exiting");
            return;
        }
    };

    let mut last_daily_run: Option<NaiveDate> = None;

    loop {
        sleep(Duration::from_secs(60)).await;

        let now_utc = Utc::now();
        let today = now_utc.date_naive();
        if !daily_run_due(
            last_daily_run,
            today,
            now_utc.hour(),
            state.config.schedule_sweep_hour_utc,
        ) {
            continue;
        }

        last_daily_run = Some(today);
        tracing::info!("Scheduler: running horizon sweep for {today}");

        let services = services.clone();
        let options = sweep_options(&state.config, today);
        tokio::spawn(async move {
            let totals = run_sweep_to_completion(&services, &options).await;
            tracing::info!(
                passes = totals.passes,
                scanned = totals.leases_scanned,
                created = totals.obligations_created,
                failures = totals.failures,
                "Scheduler: horizon sweep completed"
            );
        });
    }
}

pub fn sweep_options(config: &AppConfig, today: NaiveDate) -> SweepOptions {
    SweepOptions {
        today,
        horizon_days: config.schedule_horizon_days,
        batch_size: config.schedule_sweep_batch_size,
        max_leases: config.schedule_sweep_max_leases,
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepTotals {
    pub passes: u32,
    pub leases_scanned: u32,
    pub obligations_created: u32,
    pub failures: u32,
}

/// Chain bounded passes through the resume cursor until every active lease
/// has been visited, or a pass stops making progress.
pub async fn run_sweep_to_completion(
    services: &ScheduleServices,
    options: &SweepOptions,
) -> SweepTotals {
    let mut totals = SweepTotals::default();
    let mut cursor: Option<String> = None;

    loop {
        let summary: SweepSummary = run_horizon_sweep(
            services.directory.as_ref(),
            services.store.as_ref(),
            options,
            cursor.clone(),
        )
        .await;
        totals.passes += 1;
        totals.leases_scanned += summary.leases_scanned;
        totals.obligations_created += summary.obligations_created;
        totals.failures += summary.failures;

        if summary.completed || summary.leases_scanned == 0 {
            break;
        }
        match summary.next_cursor {
            Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
            _ => break,
        }
    }

    totals
}

fn daily_run_due(
    last_run: Option<NaiveDate>,
    today: NaiveDate,
    hour_utc: u32,
    run_hour_utc: u32,
) -> bool {
    last_run != Some(today) && hour_utc >= run_hour_utc
}
