use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::repository::store::StoreError;
use crate::services::lease_schedule::ScheduleError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate { .. } => {
                AppError::Conflict("Duplicate value violates a unique constraint.".to_string())
            }
            StoreError::Database(_) => AppError::Dependency("Database operation failed.".to_string()),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::AmountUnavailable { lease_id } => AppError::UnprocessableEntity(format!(
                "Could not fully schedule payments for lease {lease_id}: no rent override or unit rent is set."
            )),
            ScheduleError::LeaseNotFound(lease_id) => {
                AppError::NotFound(format!("Lease {lease_id} not found."))
            }
            ScheduleError::MissingLeaseStart(lease_id) => AppError::UnprocessableEntity(format!(
                "Lease {lease_id} has no start date; payments cannot be scheduled."
            )),
            ScheduleError::Store(store_error) => store_error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;
    use crate::repository::store::StoreError;
    use crate::services::lease_schedule::ScheduleError;

    #[test]
    fn amount_unavailable_maps_to_unprocessable() {
        let error: AppError = ScheduleError::AmountUnavailable {
            lease_id: "lease-1".to_string(),
        }
        .into();
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error.to_string().contains("Could not fully schedule payments"));
    }

    #[test]
    fn storage_failures_map_to_dependency() {
        let error: AppError =
            ScheduleError::Store(StoreError::Database("connection reset".to_string())).into();
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!error.to_string().contains("connection reset"));
    }

    #[test]
    fn missing_lease_maps_to_not_found() {
        let error: AppError = ScheduleError::LeaseNotFound("lease-9".to_string()).into();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }
}
