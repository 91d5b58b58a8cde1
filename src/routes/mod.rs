use axum::{routing::get, Router};

use crate::state::AppState;

pub mod health;
pub mod schedule;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(schedule::router())
}
