pub mod billing_calendar;
pub mod horizon_sweep;
pub mod lease_events;
pub mod lease_schedule;
pub mod rent_resolver;
pub mod schedule_worker;
pub mod scheduler;
