use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::{clamp_horizon_days, AppConfig},
    error::{AppError, AppResult},
    schemas::{validate_input, HorizonSweepInput, LeasePath, LeaseScheduleTriggerInput},
    services::{
        horizon_sweep::{run_horizon_sweep, SweepOptions},
        lease_events::handle_lease_event,
        schedule_worker::{EnqueueError, ScheduleJob},
        scheduler::sweep_options,
    },
    state::{AppState, ScheduleServices},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/internal/leases/{lease_id}/schedule",
            axum::routing::post(trigger_lease_schedule),
        )
        .route(
            "/internal/schedule/sweep",
            axum::routing::post(run_sweep),
        )
}

/// Lease create/update hook. Queues generation unless `wait` is set, in which
/// case errors such as a missing rent amount are returned to the caller.
async fn trigger_lease_schedule(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    headers: HeaderMap,
    Json(payload): Json<LeaseScheduleTriggerInput>,
) -> AppResult<impl IntoResponse> {
    require_internal_key(&state, &headers)?;
    let services = schedule_services(&state)?;

    let lease_id = path.lease_id.trim();
    if lease_id.is_empty() {
        return Err(AppError::BadRequest("lease_id is required.".to_string()));
    }

    if payload.wait {
        let outcome = handle_lease_event(
            services.directory.as_ref(),
            services.store.as_ref(),
            lease_id,
            &payload.event,
            Utc::now().date_naive(),
            services.horizon_days,
        )
        .await?;
        return Ok((
            StatusCode::OK,
            Json(json!({
                "lease_id": lease_id,
                "event": payload.event.as_str(),
                "created": outcome.created,
                "skipped": outcome.skipped,
                "updated": outcome.updated,
            })),
        ));
    }

    services
        .queue
        .enqueue(ScheduleJob {
            lease_id: lease_id.to_string(),
            event: payload.event.clone(),
        })
        .map_err(|error| match error {
            EnqueueError::Full => AppError::Dependency(
                "Schedule queue is full; retry shortly.".to_string(),
            ),
            EnqueueError::Closed => {
                AppError::Internal("Schedule worker is not running.".to_string())
            }
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "lease_id": lease_id,
            "event": payload.event.as_str(),
            "queued": true,
        })),
    ))
}

/// Cron hook: one bounded horizon sweep pass. Callers resume with
/// `start_after = next_cursor` until `completed` is true.
async fn run_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<HorizonSweepInput>,
) -> AppResult<impl IntoResponse> {
    require_internal_key(&state, &headers)?;
    let services = schedule_services(&state)?;

    validate_input(&payload)?;

    let today = payload.today.unwrap_or_else(|| Utc::now().date_naive());
    let (options, start_after) = sweep_request(&state.config, &payload, today)?;

    let summary = run_horizon_sweep(
        services.directory.as_ref(),
        services.store.as_ref(),
        &options,
        start_after,
    )
    .await;

    Ok(Json(summary))
}

/// Options for one HTTP pass. The body may shrink the configured pass bound
/// but never grow it past what fits in the request timeout.
fn sweep_request(
    config: &AppConfig,
    payload: &HorizonSweepInput,
    today: NaiveDate,
) -> AppResult<(SweepOptions, Option<String>)> {
    let mut options = sweep_options(config, today);
    if let Some(horizon_days) = payload.horizon_days {
        options.horizon_days = clamp_horizon_days(horizon_days);
    }
    if let Some(max_leases) = payload.max_leases {
        options.max_leases = max_leases.clamp(1, config.schedule_sweep_max_leases.max(1));
    }

    let start_after = match payload.start_after.as_deref().map(str::trim) {
        Some(cursor) if !cursor.is_empty() => {
            if Uuid::try_parse(cursor).is_err() {
                return Err(AppError::BadRequest(format!(
                    "start_after must be a lease id returned as next_cursor, got '{cursor}'."
                )));
            }
            Some(cursor.to_string())
        }
        _ => None,
    };

    Ok((options, start_after))
}

fn schedule_services(state: &AppState) -> AppResult<&ScheduleServices> {
    state.schedule.as_ref().ok_or_else(|| {
        AppError::Dependency(
            "Database is not configured. Set SUPABASE_DB_URL or DATABASE_URL.".to_string(),
        )
    })
}

fn require_internal_key(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    validate_internal_api_key(
        state.config.is_production(),
        state.config.internal_api_key.as_deref(),
        api_key,
    )
}

fn validate_internal_api_key(
    is_production: bool,
    expected_key: Option<&str>,
    provided_key: &str,
) -> AppResult<()> {
    let expected = expected_key.map(str::trim).unwrap_or_default();

    if is_production && expected.is_empty() {
        return Err(AppError::Dependency(
            "INTERNAL_API_KEY must be set in production to run schedule triggers.".to_string(),
        ));
    }

    if !expected.is_empty() && provided_key != expected {
        return Err(AppError::Unauthorized(
            "Invalid or missing API key.".to_string(),
        ));
    }

    Ok(())
}
