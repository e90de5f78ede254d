use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::schedule_models::{ScheduleStatus, ScheduledNotification, ScheduledNotificationRow};
use crate::error::Result;

/// Durable queue of notifications waiting for their due time.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, job: &ScheduledNotification) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<ScheduledNotification>>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>>;

    /// Moves up to `limit` pending jobs due at `now` to `dispatching` and returns them.
    /// A job is handed out to exactly one caller.
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledNotification>>;

    async fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;

    /// Cancels a job that is still pending. Returns `None` if it is unknown or no longer pending.
    async fn cancel(&self, id: Uuid) -> Result<Option<ScheduledNotification>>;

    /// Returns jobs stuck in `dispatching` (left by a crash) to `pending`.
    async fn requeue_stalled(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct ScheduleRepository {
    pool: PgPool,
}

impl ScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_jobs(rows: Vec<ScheduledNotificationRow>) -> Result<Vec<ScheduledNotification>> {
    rows.into_iter()
        .map(|row| ScheduledNotification::try_from(row).map_err(Into::into))
        .collect()
}

#[async_trait]
impl ScheduleStore for ScheduleRepository {
    async fn insert(&self, job: &ScheduledNotification) -> Result<()> {
        sqlx::query(
            "INSERT INTO scheduled_notifications
                (id, user_id, notification, scheduled_for, status, attempts, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(sqlx::types::Json(&job.notification))
        .bind(job.scheduled_for)
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ScheduledNotification>> {
        let row = sqlx::query_as::<_, ScheduledNotificationRow>(
            "SELECT * FROM scheduled_notifications WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ScheduledNotification::try_from).transpose()?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query_as::<_, ScheduledNotificationRow>(
            "SELECT * FROM scheduled_notifications WHERE user_id = $1 ORDER BY scheduled_for ASC"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        into_jobs(rows)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query_as::<_, ScheduledNotificationRow>(
            "UPDATE scheduled_notifications
             SET status = 'dispatching', attempts = attempts + 1
             WHERE id IN (
                 SELECT id FROM scheduled_notifications
                 WHERE status = 'pending' AND scheduled_for <= $1
                 ORDER BY scheduled_for ASC
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *"
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = into_jobs(rows)?;
        jobs.sort_by_key(|job| job.scheduled_for);
        Ok(jobs)
    }

    async fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_notifications
             SET status = 'dispatched', dispatched_at = $2, last_error = NULL
             WHERE id = $1"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_notifications SET status = 'failed', last_error = $2 WHERE id = $1"
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<ScheduledNotification>> {
        let row = sqlx::query_as::<_, ScheduledNotificationRow>(
            "UPDATE scheduled_notifications SET status = 'cancelled'
             WHERE id = $1 AND status = 'pending'
             RETURNING *"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ScheduledNotification::try_from).transpose()?)
    }

    async fn requeue_stalled(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE scheduled_notifications SET status = 'pending' WHERE status = 'dispatching'"
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local queue used when no database is configured. Jobs do not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryScheduleStore {
    jobs: Arc<DashMap<Uuid, ScheduledNotification>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn insert(&self, job: &ScheduledNotification) -> Result<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ScheduledNotification>> {
        Ok(self.jobs.get(&id).map(|job| job.value().clone()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>> {
        let mut jobs: Vec<ScheduledNotification> = self
            .jobs
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.scheduled_for);
        Ok(jobs)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledNotification>> {
        let mut due: Vec<(DateTime<Utc>, Uuid)> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == ScheduleStatus::Pending && entry.scheduled_for <= now)
            .map(|entry| (entry.scheduled_for, entry.id))
            .collect();
        due.sort();

        let mut claimed = Vec::new();
        for (_, id) in due.into_iter().take(limit.max(0) as usize) {
            if let Some(mut job) = self.jobs.get_mut(&id) {
                if job.status != ScheduleStatus::Pending {
                    continue;
                }
                job.status = ScheduleStatus::Dispatching;
                job.attempts += 1;
                claimed.push(job.value().clone());
            }
        }

        Ok(claimed)
    }

    async fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = ScheduleStatus::Dispatched;
            job.dispatched_at = Some(at);
            job.last_error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = ScheduleStatus::Failed;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<ScheduledNotification>> {
        match self.jobs.get_mut(&id) {
            Some(mut job) if job.status == ScheduleStatus::Pending => {
                job.status = ScheduleStatus::Cancelled;
                Ok(Some(job.value().clone()))
            }
            _ => Ok(None),
        }
    }

    async fn requeue_stalled(&self) -> Result<u64> {
        let mut requeued = 0;
        for mut job in self.jobs.iter_mut() {
            if job.status == ScheduleStatus::Dispatching {
                job.status = ScheduleStatus::Pending;
                requeued += 1;
            }
        }
        Ok(requeued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::NotificationRequest;
    use chrono::Duration;

    fn job(user_id: Uuid, scheduled_for: DateTime<Utc>) -> ScheduledNotification {
        let notification: NotificationRequest =
            serde_json::from_value(serde_json::json!({ "title": "Water the monstera" })).unwrap();
        ScheduledNotification::new(notification, user_id, scheduled_for, Utc::now())
    }

    #[tokio::test]
    async fn test_claim_due_only_hands_out_due_pending_jobs_once() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();
        let user = Uuid::new_v4();

        let late = job(user, now - Duration::seconds(10));
        let early = job(user, now - Duration::seconds(60));
        let future = job(user, now + Duration::seconds(60));
        for j in [&late, &early, &future] {
            store.insert(j).await.unwrap();
        }

        let claimed = store.claim_due(now, 10).await.unwrap();
        let ids: Vec<Uuid> = claimed.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert!(claimed.iter().all(|j| j.status == ScheduleStatus::Dispatching && j.attempts == 1));

        assert!(store.claim_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_due_respects_limit() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();
        for offset in 1..=3 {
            store.insert(&job(Uuid::new_v4(), now - Duration::seconds(offset))).await.unwrap();
        }

        assert_eq!(store.claim_due(now, 2).await.unwrap().len(), 2);
        assert_eq!(store.claim_due(now, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();
        let pending = job(Uuid::new_v4(), now + Duration::seconds(60));
        let due = job(Uuid::new_v4(), now - Duration::seconds(1));
        store.insert(&pending).await.unwrap();
        store.insert(&due).await.unwrap();
        store.claim_due(now, 10).await.unwrap();

        let cancelled = store.cancel(pending.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, ScheduleStatus::Cancelled);
        assert!(store.cancel(pending.id).await.unwrap().is_none());
        assert!(store.cancel(due.id).await.unwrap().is_none());
        assert!(store.cancel(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requeue_stalled() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();
        let stalled = job(Uuid::new_v4(), now - Duration::seconds(1));
        store.insert(&stalled).await.unwrap();
        store.claim_due(now, 10).await.unwrap();

        assert_eq!(store.requeue_stalled().await.unwrap(), 1);
        let job = store.find(stalled.id).await.unwrap().unwrap();
        assert_eq!(job.status, ScheduleStatus::Pending);
        assert_eq!(store.claim_due(now, 10).await.unwrap()[0].attempts, 2);
    }
}
