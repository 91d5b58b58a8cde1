use std::env;

pub const DEFAULT_HORIZON_DAYS: i64 = 90;

/// Leases per sweep pass. One HTTP pass must finish inside
/// `REQUEST_TIMEOUT_SECONDS`; callers chain passes through `next_cursor`.
pub const DEFAULT_SWEEP_MAX_LEASES: usize = 500;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub request_timeout_seconds: u64,
    pub internal_api_key: Option<String>,
    pub supabase_db_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub db_run_migrations: bool,
    pub schedule_horizon_days: i64,
    pub schedule_sweep_batch_size: usize,
    pub schedule_sweep_max_leases: usize,
    pub schedule_sweep_scheduler_enabled: bool,
    pub schedule_sweep_hour_utc: u32,
    pub schedule_worker_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Rent Schedule Service"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8010),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            request_timeout_seconds: env_parse_or("REQUEST_TIMEOUT_SECONDS", 30),
            internal_api_key: env_opt("INTERNAL_API_KEY"),
            supabase_db_url: env_opt("SUPABASE_DB_URL").or_else(|| env_opt("DATABASE_URL")),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            db_run_migrations: env_parse_bool_or("DB_RUN_MIGRATIONS", false),
            schedule_horizon_days: clamp_horizon_days(env_parse_or(
                "SCHEDULE_HORIZON_DAYS",
                DEFAULT_HORIZON_DAYS,
            )),
            schedule_sweep_batch_size: env_parse_or("SCHEDULE_SWEEP_BATCH_SIZE", 200_usize)
                .clamp(1, 1000),
            schedule_sweep_max_leases: env_parse_or("SCHEDULE_SWEEP_MAX_LEASES", DEFAULT_SWEEP_MAX_LEASES)
                .max(1),
            schedule_sweep_scheduler_enabled: env_parse_bool_or(
                "SCHEDULE_SWEEP_SCHEDULER_ENABLED",
                false,
            ),
            schedule_sweep_hour_utc: env_parse_or("SCHEDULE_SWEEP_HOUR_UTC", 5_u32).min(23),
            schedule_worker_queue_capacity: env_parse_or("SCHEDULE_WORKER_QUEUE_CAPACITY", 256_usize)
                .max(1),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }
}

/// Horizon must look at least one day ahead and at most ~3 years.
pub fn clamp_horizon_days(value: i64) -> i64 {
    value.clamp(1, 1100)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    parse_bool(env_opt(key).as_deref()).unwrap_or(default)
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => Some(true),
        Some("0" | "false" | "no" | "off") => Some(false),
        _ => None,
    }
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}
