use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::services::lease_events::LeaseEvent;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeasePath {
    pub lease_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaseScheduleTriggerInput {
    #[serde(flatten)]
    pub event: LeaseEvent,
    /// Run inline and report errors instead of queueing.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HorizonSweepInput {
    pub today: Option<NaiveDate>,
    #[validate(range(min = 1, max = 1100))]
    pub horizon_days: Option<i64>,
    #[validate(length(min = 1, max = 64))]
    pub start_after: Option<String>,
    #[validate(range(min = 1, max = 100000))]
    pub max_leases: Option<usize>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{validate_input, HorizonSweepInput, LeaseScheduleTriggerInput};
    use crate::services::lease_events::LeaseEvent;

    #[test]
    fn trigger_input_flattens_event() {
        let input: LeaseScheduleTriggerInput = serde_json::from_value(json!({
            "event": "updated",
            "changed_fields": ["rent_override"],
            "wait": true
        }))
        .expect("valid payload");
        assert!(input.wait);
        assert_eq!(
            input.event,
            LeaseEvent::Updated {
                changed_fields: vec!["rent_override".to_string()]
            }
        );
    }

    #[test]
    fn sweep_input_rejects_zero_horizon() {
        let input: HorizonSweepInput =
            serde_json::from_value(json!({ "horizon_days": 0 })).expect("parsed");
        assert!(validate_input(&input).is_err());

        let input: HorizonSweepInput =
            serde_json::from_value(json!({ "horizon_days": 90, "today": "2025-04-15" }))
                .expect("parsed");
        assert!(validate_input(&input).is_ok());
    }
}
