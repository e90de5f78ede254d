use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::schedule_models::ScheduledNotification;
use super::schedule_repository::ScheduleStore;
use crate::error::{AppError, Result};
use crate::push::{DispatchReport, DispatchService, NotificationRequest};

/// What happened to a schedule request.
#[derive(Debug)]
pub enum ScheduleOutcome {
    /// The due time had already passed, so the notification went out right away.
    Dispatched(DispatchReport),
    /// The notification is queued; `delay_ms` is the time left until it is due.
    Scheduled {
        job: ScheduledNotification,
        delay_ms: i64,
    },
}

#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    dispatcher: DispatchService,
    clock: Arc<dyn Clock>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>, dispatcher: DispatchService, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            dispatcher,
            clock,
        }
    }

    pub async fn schedule(
        &self,
        notification: NotificationRequest,
        user_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduleOutcome> {
        let now = self.clock.now();
        let delay_ms = (scheduled_for - now).num_milliseconds();

        if delay_ms <= 0 {
            info!(%user_id, delay_ms, "Scheduled time already passed, dispatching now");
            let report = self.dispatcher.dispatch(&notification, user_id).await?;
            return Ok(ScheduleOutcome::Dispatched(report));
        }

        let job = ScheduledNotification::new(notification, user_id, scheduled_for, now);
        self.store.insert(&job).await?;

        info!(%user_id, job_id = %job.id, %scheduled_for, delay_ms, "Notification scheduled");
        Ok(ScheduleOutcome::Scheduled { job, delay_ms })
    }

    pub async fn get(&self, id: Uuid) -> Result<ScheduledNotification> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Scheduled notification not found".into()))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>> {
        self.store.find_by_user(user_id).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<ScheduledNotification> {
        if let Some(job) = self.store.cancel(id).await? {
            info!(job_id = %id, "Scheduled notification cancelled");
            return Ok(job);
        }

        let job = self.get(id).await?;
        let message = if job.status.is_terminal() {
            format!("Scheduled notification is already {}", job.status)
        } else {
            "Scheduled notification is being dispatched".to_string()
        };
        Err(AppError::Conflict(message))
    }

    /// Puts jobs interrupted by a previous shutdown back in the queue.
    pub async fn recover(&self) -> Result<u64> {
        let requeued = self.store.requeue_stalled().await?;
        if requeued > 0 {
            warn!(requeued, "Requeued scheduled notifications interrupted by shutdown");
        }
        Ok(requeued)
    }

    /// Dispatches every job due now, up to `batch_size`. Returns how many were processed.
    ///
    /// A job whose status cannot be recorded is left in `dispatching` and the
    /// rest of the batch still goes out; startup recovery requeues it.
    pub async fn run_due(&self, batch_size: i64) -> Result<usize> {
        let jobs = self.store.claim_due(self.clock.now(), batch_size).await?;

        for job in &jobs {
            match self.dispatcher.dispatch(&job.notification, job.user_id).await {
                Ok(report) => {
                    info!(
                        job_id = %job.id,
                        user_id = %job.user_id,
                        delivered = report.delivered(),
                        total = report.results.len(),
                        "Scheduled notification dispatched"
                    );
                    if let Err(e) = self.store.mark_dispatched(job.id, self.clock.now()).await {
                        error!(job_id = %job.id, error = %e, "Failed to mark scheduled notification dispatched");
                    }
                }
                Err(e) => {
                    error!(job_id = %job.id, user_id = %job.user_id, error = %e, "Scheduled dispatch failed");
                    if let Err(mark_err) = self.store.mark_failed(job.id, &e.to_string()).await {
                        error!(job_id = %job.id, error = %mark_err, "Failed to mark scheduled notification failed");
                    }
                }
            }
        }

        Ok(jobs.len())
    }
}

pub async fn start_scheduler(
    service: ScheduleService,
    cron: &str,
    batch_size: i64,
) -> std::result::Result<JobScheduler, Box<dyn std::error::Error>> {
    service.recover().await?;

    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _l| {
        let service = service.clone();

        Box::pin(async move {
            if let Err(e) = service.run_due(batch_size).await {
                error!("Error dispatching scheduled notifications: {:?}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!(cron, "Notification scheduler started");
    Ok(scheduler)
}
