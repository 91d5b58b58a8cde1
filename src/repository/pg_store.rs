use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::repository::models::{Lease, NewObligation, Obligation, ObligationStatus};
use crate::repository::store::{LeaseDirectory, ObligationStore, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

type LeaseRow = (
    String,
    Option<NaiveDate>,
    Option<NaiveDate>,
    Option<Decimal>,
    Option<Decimal>,
);

type ObligationRow = (
    String,
    NaiveDate,
    Decimal,
    String,
    Option<DateTime<Utc>>,
    Option<String>,
    Option<String>,
);

/// PostgreSQL-backed lease directory and obligation store.
///
/// Uniqueness of `(lease_id, due_date)` is owned by the
/// `lease_obligations_lease_id_due_date_key` index.
#[derive(Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseDirectory for PgScheduleStore {
    async fn get_lease(&self, lease_id: &str) -> Result<Option<Lease>, StoreError> {
        let Some(id) = parse_lease_uuid(lease_id) else {
            return Ok(None);
        };

        let mut query = lease_select();
        query.push(" WHERE l.id = ").push_bind(id).push(" LIMIT 1");

        let row = query
            .build_query_as::<LeaseRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(row.map(lease_from_row))
    }

    async fn list_active_leases(
        &self,
        today: NaiveDate,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Lease>, StoreError> {
        let mut query = lease_select();
        query
            .push(" WHERE (l.ends_on IS NULL OR l.ends_on >= ")
            .push_bind(today)
            .push(")");
        if let Some(raw) = start_after {
            let cursor = parse_lease_uuid(raw)
                .ok_or_else(|| StoreError::Database(format!("Invalid sweep cursor '{raw}'.")))?;
            query.push(" AND l.id > ").push_bind(cursor);
        }
        query
            .push(" ORDER BY l.id ASC LIMIT ")
            .push_bind(i64::try_from(limit.clamp(1, 1000)).unwrap_or(1000));

        let rows = query
            .build_query_as::<LeaseRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(rows.into_iter().map(lease_from_row).collect())
    }
}

#[async_trait]
impl ObligationStore for PgScheduleStore {
    async fn exists(&self, lease_id: &str, due_date: NaiveDate) -> Result<bool, StoreError> {
        let Some(id) = parse_lease_uuid(lease_id) else {
            return Ok(false);
        };

        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM lease_obligations WHERE lease_id = $1 AND due_date = $2
             )",
        )
        .bind(id)
        .bind(due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(found)
    }

    async fn max_due_date(&self, lease_id: &str) -> Result<Option<NaiveDate>, StoreError> {
        let Some(id) = parse_lease_uuid(lease_id) else {
            return Ok(None);
        };

        sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(due_date) FROM lease_obligations WHERE lease_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn insert(&self, obligation: NewObligation) -> Result<Obligation, StoreError> {
        let id = parse_lease_uuid(&obligation.lease_id).ok_or_else(|| {
            StoreError::Database(format!("Invalid lease id '{}'.", obligation.lease_id))
        })?;

        // ON CONFLICT keeps the racing loser out of the error path; a
        // missing RETURNING row means another writer got there first.
        let row = sqlx::query_as::<_, ObligationRow>(
            "INSERT INTO lease_obligations (lease_id, due_date, amount, status)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (lease_id, due_date) DO NOTHING
             RETURNING lease_id::text, due_date, amount, status, paid_at, payment_method, note",
        )
        .bind(id)
        .bind(obligation.due_date)
        .bind(obligation.amount)
        .bind(ObligationStatus::Due.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_insert_error(error, &obligation))?;

        match row {
            Some(row) => obligation_from_row(row),
            None => Err(StoreError::Duplicate {
                lease_id: obligation.lease_id,
                due_date: obligation.due_date,
            }),
        }
    }
}

fn lease_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        "SELECT l.id::text, l.starts_on, l.ends_on, l.rent_override, u.base_rent
         FROM leases l
         LEFT JOIN units u ON u.id = l.unit_id",
    )
}

fn lease_from_row(row: LeaseRow) -> Lease {
    let (lease_id, lease_start, lease_end, rent_override, unit_rent) = row;
    Lease {
        lease_id,
        lease_start,
        lease_end,
        rent_override,
        unit_rent,
    }
}

fn obligation_from_row(row: ObligationRow) -> Result<Obligation, StoreError> {
    let (lease_id, due_date, amount, status, paid_at, payment_method, note) = row;
    let status = ObligationStatus::parse(&status)
        .ok_or_else(|| StoreError::Database(format!("Unknown obligation status '{status}'.")))?;
    Ok(Obligation {
        lease_id,
        due_date,
        amount,
        status,
        paid_at,
        payment_method,
        note,
    })
}

fn parse_lease_uuid(lease_id: &str) -> Option<uuid::Uuid> {
    uuid::Uuid::try_parse(lease_id.trim()).ok()
}

fn map_insert_error(error: sqlx::Error, obligation: &NewObligation) -> StoreError {
    if is_unique_violation(&error) {
        return StoreError::Duplicate {
            lease_id: obligation.lease_id.clone(),
            due_date: obligation.due_date,
        };
    }
    map_db_error(error)
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => {
            db_error.code().as_deref() == Some(UNIQUE_VIOLATION)
                || is_unique_violation_message(db_error.message())
        }
        _ => false,
    }
}

fn is_unique_violation_message(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains("duplicate key value violates unique constraint")
}

fn map_db_error(error: sqlx::Error) -> StoreError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");
    StoreError::Database(message)
}
