use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::repository::models::Lease;
use crate::repository::store::{LeaseDirectory, ObligationStore};
use crate::services::lease_schedule::{
    generate_for_lease, ScheduleError, ScheduleOutcome, ScheduleRange,
};

/// Lease fields whose change can make new months reachable.
const SCHEDULE_FIELDS: &[&str] = &[
    "lease_start",
    "starts_on",
    "lease_end",
    "ends_on",
    "unit_id",
    "rent_override",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LeaseEvent {
    Created,
    Updated {
        #[serde(default)]
        changed_fields: Vec<String>,
    },
}

impl LeaseEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated { .. } => "updated",
        }
    }
}

pub fn touches_schedule(changed_fields: &[String]) -> bool {
    changed_fields.iter().any(|field| {
        let normalized = field.trim().to_ascii_lowercase();
        SCHEDULE_FIELDS.contains(&normalized.as_str())
    })
}

/// Generation range for a lease event, or `None` when the event cannot add
/// any month.
pub fn range_for_event(
    lease: &Lease,
    event: &LeaseEvent,
    today: NaiveDate,
    horizon_days: i64,
) -> Result<Option<ScheduleRange>, ScheduleError> {
    if let LeaseEvent::Updated { changed_fields } = event {
        if !touches_schedule(changed_fields) {
            return Ok(None);
        }
    }

    let lease_start = lease
        .lease_start
        .ok_or_else(|| ScheduleError::MissingLeaseStart(lease.lease_id.clone()))?;
    let start_on = match event {
        LeaseEvent::Created => lease_start.max(today),
        LeaseEvent::Updated { .. } => lease_start,
    };

    Ok(Some(
        ScheduleRange::new(start_on, lease.lease_end, today)
            .with_horizon_days(horizon_days)
            .anchored_on(lease_start),
    ))
}

/// Run generation for a lease create/update. Existing obligations are never
/// revisited; only newly reachable months are added.
pub async fn handle_lease_event(
    directory: &dyn LeaseDirectory,
    store: &dyn ObligationStore,
    lease_id: &str,
    event: &LeaseEvent,
    today: NaiveDate,
    horizon_days: i64,
) -> Result<ScheduleOutcome, ScheduleError> {
    let lease = directory
        .get_lease(lease_id)
        .await?
        .ok_or_else(|| ScheduleError::LeaseNotFound(lease_id.to_string()))?;

    match range_for_event(&lease, event, today, horizon_days)? {
        Some(range) => generate_for_lease(store, &lease, &range).await,
        None => {
            tracing::debug!(
                lease_id,
                event = event.as_str(),
                "Lease update does not affect the schedule"
            );
            Ok(ScheduleOutcome::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{handle_lease_event, range_for_event, touches_schedule, LeaseEvent};
    use crate::repository::memory_store::MemoryScheduleStore;
    use crate::repository::models::{Lease, NewObligation};
    use crate::services::lease_schedule::ScheduleError;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn lease() -> Lease {
        Lease {
            lease_id: "lease-1".to_string(),
            lease_start: Some(date("2025-01-10")),
            lease_end: Some(date("2025-12-31")),
            rent_override: Some(Decimal::from_str("950.00").expect("decimal")),
            unit_rent: None,
        }
    }

    #[test]
    fn parses_event_payloads() {
        let created: LeaseEvent = serde_json::from_value(json!({"event": "created"})).expect("created");
        assert_eq!(created, LeaseEvent::Created);

        let updated: LeaseEvent = serde_json::from_value(json!({
            "event": "updated",
            "changed_fields": ["ends_on"]
        }))
        .expect("updated");
        assert_eq!(
            updated,
            LeaseEvent::Updated {
                changed_fields: vec!["ends_on".to_string()]
            }
        );
    }

    #[test]
    fn only_schedule_fields_trigger_regeneration() {
        assert!(touches_schedule(&["rent_override".to_string()]));
        assert!(touches_schedule(&["notes".to_string(), " Unit_Id ".to_string()]));
        assert!(!touches_schedule(&["tenant_full_name".to_string()]));
        assert!(!touches_schedule(&[]));
    }

    #[test]
    fn created_event_starts_no_earlier_than_today() {
        let range = range_for_event(&lease(), &LeaseEvent::Created, date("2025-03-05"), 90)
            .expect("range")
            .expect("some range");
        assert_eq!(range.start_on, date("2025-03-05"));
        assert_eq!(range.end_on, Some(date("2025-12-31")));
        assert_eq!(range.anchor_day(), 10);
    }

    #[test]
    fn updated_event_uses_lease_start() {
        let event = LeaseEvent::Updated {
            changed_fields: vec!["ends_on".to_string()],
        };
        let range = range_for_event(&lease(), &event, date("2025-03-05"), 90)
            .expect("range")
            .expect("some range");
        assert_eq!(range.start_on, date("2025-01-10"));
    }

    #[test]
    fn missing_start_is_an_error() {
        let mut no_start = lease();
        no_start.lease_start = None;
        let error = range_for_event(&no_start, &LeaseEvent::Created, date("2025-03-05"), 90)
            .expect_err("missing start");
        assert!(matches!(error, ScheduleError::MissingLeaseStart(_)));
    }

    #[tokio::test]
    async fn extended_lease_end_only_appends_months() {
        let store = MemoryScheduleStore::new();
        let mut record = lease();
        record.lease_end = Some(date("2025-04-30"));
        store.put_lease(record.clone());

        let created = handle_lease_event(
            &store,
            &store,
            "lease-1",
            &LeaseEvent::Created,
            date("2025-02-01"),
            90,
        )
        .await
        .expect("created");
        assert_eq!(created.created, 3);

        record.lease_end = Some(date("2025-06-30"));
        record.rent_override = Some(Decimal::from(1100));
        store.put_lease(record);

        let updated = handle_lease_event(
            &store,
            &store,
            "lease-1",
            &LeaseEvent::Updated {
                changed_fields: vec!["ends_on".to_string(), "rent_override".to_string()],
            },
            date("2025-02-01"),
            90,
        )
        .await
        .expect("updated");

        assert_eq!(updated.created, 2);
        assert_eq!(updated.skipped, 3);
        let amounts = store
            .obligations("lease-1")
            .into_iter()
            .map(|record| (record.due_date, record.amount))
            .collect::<Vec<_>>();
        assert_eq!(
            amounts,
            vec![
                (date("2025-02-10"), Decimal::from_str("950.00").expect("decimal")),
                (date("2025-03-10"), Decimal::from_str("950.00").expect("decimal")),
                (date("2025-04-10"), Decimal::from_str("950.00").expect("decimal")),
                (date("2025-05-10"), Decimal::from(1100)),
                (date("2025-06-10"), Decimal::from(1100)),
            ]
        );
    }

    #[tokio::test]
    async fn end_date_update_after_start_does_not_rebill_months() {
        let store = MemoryScheduleStore::new();
        let mut record = lease();
        record.lease_start = Some(date("2025-01-15"));
        record.lease_end = Some(date("2025-04-30"));
        store.put_lease(record.clone());

        handle_lease_event(&store, &store, "lease-1", &LeaseEvent::Created, date("2025-01-15"), 90)
            .await
            .expect("created");

        record.lease_end = Some(date("2025-05-31"));
        store.put_lease(record);
        let outcome = handle_lease_event(
            &store,
            &store,
            "lease-1",
            &LeaseEvent::Updated {
                changed_fields: vec!["ends_on".to_string()],
            },
            date("2025-02-03"),
            90,
        )
        .await
        .expect("updated");

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(
            store.due_dates("lease-1"),
            vec![
                date("2025-01-15"),
                date("2025-02-15"),
                date("2025-03-15"),
                date("2025-04-15"),
                date("2025-05-15"),
            ]
        );
    }

    #[tokio::test]
    async fn irrelevant_update_is_a_no_op() {
        let store = MemoryScheduleStore::new();
        store.put_lease(lease());
        store.seed_obligation(NewObligation {
            lease_id: "lease-1".to_string(),
            due_date: date("2025-03-10"),
            amount: Decimal::from(950),
        });

        let outcome = handle_lease_event(
            &store,
            &store,
            "lease-1",
            &LeaseEvent::Updated {
                changed_fields: vec!["tenant_phone_e164".to_string()],
            },
            date("2025-03-05"),
            90,
        )
        .await
        .expect("no-op");

        assert_eq!(outcome.created, 0);
        assert_eq!(store.insert_attempts(), 0);
    }
}
