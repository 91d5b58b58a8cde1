use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::repository::store::{LeaseDirectory, ObligationStore};
use crate::services::lease_events::{handle_lease_event, LeaseEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleJob {
    pub lease_id: String,
    pub event: LeaseEvent,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("schedule queue is full")]
    Full,
    #[error("schedule worker is not running")]
    Closed,
}

/// Producer side of the schedule worker. Trigger routes enqueue here so the
/// lease request never waits on generation.
#[derive(Clone)]
pub struct ScheduleQueue {
    sender: mpsc::Sender<ScheduleJob>,
}

impl ScheduleQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ScheduleJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, job: ScheduleJob) -> Result<(), EnqueueError> {
        self.sender.try_send(job).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

#[derive(Clone)]
pub struct ScheduleWorker {
    pub directory: Arc<dyn LeaseDirectory>,
    pub store: Arc<dyn ObligationStore>,
    pub horizon_days: i64,
}

impl ScheduleWorker {
    /// Drain jobs until every `ScheduleQueue` handle is dropped.
    pub async fn run(self, mut receiver: mpsc::Receiver<ScheduleJob>) {
        info!("Schedule worker started");
        while let Some(job) = receiver.recv().await {
            self.process(&job, Utc::now().date_naive()).await;
        }
        info!("Schedule worker stopped");
    }

    /// Failures are logged with the lease identity; the worker keeps going.
    pub async fn process(&self, job: &ScheduleJob, today: NaiveDate) -> bool {
        match handle_lease_event(
            self.directory.as_ref(),
            self.store.as_ref(),
            &job.lease_id,
            &job.event,
            today,
            self.horizon_days,
        )
        .await
        {
            Ok(outcome) => {
                info!(
                    lease_id = %job.lease_id,
                    event = job.event.as_str(),
                    created = outcome.created,
                    skipped = outcome.skipped,
                    "Schedule job processed"
                );
                true
            }
            Err(e) => {
                warn!(
                    lease_id = %job.lease_id,
                    event = job.event.as_str(),
                    "Schedule job failed: {e}"
                );
                false
            }
        }
    }
}
