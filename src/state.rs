use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::db::build_pool;
use crate::repository::pg_store::PgScheduleStore;
use crate::repository::store::{LeaseDirectory, ObligationStore};
use crate::services::schedule_worker::{ScheduleJob, ScheduleQueue, ScheduleWorker};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub schedule: Option<ScheduleServices>,
}

/// Storage handles and the job queue shared by routes and background tasks.
#[derive(Clone)]
pub struct ScheduleServices {
    pub directory: Arc<dyn LeaseDirectory>,
    pub store: Arc<dyn ObligationStore>,
    pub queue: ScheduleQueue,
    pub horizon_days: i64,
}

impl ScheduleServices {
    pub fn worker(&self) -> ScheduleWorker {
        ScheduleWorker {
            directory: self.directory.clone(),
            store: self.store.clone(),
            horizon_days: self.horizon_days,
        }
    }
}

impl AppState {
    /// Build shared state. The returned receiver feeds the schedule worker
    /// and is `None` when no database is configured.
    pub fn build(
        config: AppConfig,
    ) -> Result<(Self, Option<mpsc::Receiver<ScheduleJob>>), sqlx::Error> {
        let db_pool = build_pool(&config)?;

        let (schedule, receiver) = match db_pool.as_ref() {
            Some(pool) => {
                let pg_store = Arc::new(PgScheduleStore::new(pool.clone()));
                let (queue, receiver) =
                    ScheduleQueue::channel(config.schedule_worker_queue_capacity);
                let services = ScheduleServices {
                    directory: pg_store.clone(),
                    store: pg_store,
                    queue,
                    horizon_days: config.schedule_horizon_days,
                };
                (Some(services), Some(receiver))
            }
            None => (None, None),
        };

        Ok((
            Self {
                config: Arc::new(config),
                db_pool,
                schedule,
            },
            receiver,
        ))
    }
}
