use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::push::NotificationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Dispatching,
    Dispatched,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Dispatching => "dispatching",
            ScheduleStatus::Dispatched => "dispatched",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

impl ScheduleStatus {
    /// No further transition can happen from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScheduleStatus::Dispatched | ScheduleStatus::Failed | ScheduleStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "dispatching" => Ok(ScheduleStatus::Dispatching),
            "dispatched" => Ok(ScheduleStatus::Dispatched),
            "failed" => Ok(ScheduleStatus::Failed),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            other => Err(format!("unknown schedule status: {}", other)),
        }
    }
}

/// A notification waiting in the durable queue for its due time.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification: NotificationRequest,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl ScheduledNotification {
    pub fn new(
        notification: NotificationRequest,
        user_id: Uuid,
        scheduled_for: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification,
            scheduled_for,
            status: ScheduleStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at,
            dispatched_at: None,
        }
    }
}

/// Row shape of `scheduled_notifications`.
#[derive(Debug, FromRow)]
pub struct ScheduledNotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification: sqlx::types::Json<NotificationRequest>,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScheduledNotificationRow> for ScheduledNotification {
    type Error = sqlx::Error;

    fn try_from(row: ScheduledNotificationRow) -> Result<Self, Self::Error> {
        let status: ScheduleStatus = row.status.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "status".into(),
            source: e.into(),
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            notification: row.notification.0,
            scheduled_for: row.scheduled_for,
            status,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            dispatched_at: row.dispatched_at,
        })
    }
}
