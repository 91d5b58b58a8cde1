use rust_decimal::Decimal;

use crate::repository::models::Lease;

/// Neither a lease-level override nor a unit base rent is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountUnavailable {
    pub lease_id: String,
}

/// Monthly rent for a lease: the lease override wins over the unit's base
/// rent. Never falls back to zero.
pub fn resolve_monthly_rent(lease: &Lease) -> Result<Decimal, AmountUnavailable> {
    lease
        .rent_override
        .or(lease.unit_rent)
        .ok_or_else(|| AmountUnavailable {
            lease_id: lease.lease_id.clone(),
        })
}
