use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A lease as seen by the schedule engine. Read-only here; the lease CRUD
/// lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: String,
    pub lease_start: Option<NaiveDate>,
    pub lease_end: Option<NaiveDate>,
    pub rent_override: Option<Decimal>,
    pub unit_rent: Option<Decimal>,
}

impl Lease {
    /// Active leases are open-ended or end today or later.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.lease_end.map_or(true, |end| end >= today)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Due,
    Paid,
}

impl ObligationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Paid => "paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "due" => Some(Self::Due),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// One monthly rent obligation. Unique per `(lease_id, due_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub lease_id: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub status: ObligationStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObligation {
    pub lease_id: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}
