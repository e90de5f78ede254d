use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::schedule_service::ScheduleOutcome;
use crate::error::{AppError, Result};
use crate::push::{push_dto::DispatchResponse, NotificationRequest};

/// Due time given either as an RFC 3339 string or as epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Rfc3339(DateTime<Utc>),
    EpochMillis(i64),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Result<DateTime<Utc>> {
        match self {
            Timestamp::Rfc3339(at) => Ok(*at),
            Timestamp::EpochMillis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| AppError::BadRequest("scheduledFor is out of range".to_string())),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub notification: Option<NotificationRequest>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub scheduled_for: Option<Timestamp>,
    pub user_id: Option<Uuid>,
}

impl ScheduleRequest {
    pub fn into_parts(self) -> Result<(NotificationRequest, DateTime<Utc>, Uuid)> {
        match (self.notification, self.scheduled_for, self.user_id) {
            (Some(notification), Some(scheduled_for), Some(user_id)) => {
                Ok((notification, scheduled_for.to_datetime()?, user_id))
            }
            _ => Err(AppError::BadRequest(
                "notification, scheduledFor and userId are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledAck {
    pub success: bool,
    pub message: String,
    pub id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    /// Milliseconds until the notification is due.
    pub delay: i64,
}

/// Either the relay's own response (due time already passed) or a queue acknowledgment.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScheduleResponse {
    Dispatched(DispatchResponse),
    Scheduled(ScheduledAck),
}

impl From<ScheduleOutcome> for ScheduleResponse {
    fn from(outcome: ScheduleOutcome) -> Self {
        match outcome {
            ScheduleOutcome::Dispatched(report) => ScheduleResponse::Dispatched(report.into()),
            ScheduleOutcome::Scheduled { job, delay_ms } => ScheduleResponse::Scheduled(ScheduledAck {
                success: true,
                message: "Notification scheduled".to_string(),
                id: job.id,
                scheduled_for: job.scheduled_for,
                delay: delay_ms,
            }),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scheduled_for_accepts_rfc3339_and_millis() {
        let rfc: ScheduleRequest = serde_json::from_value(json!({
            "notification": { "title": "T" },
            "scheduledFor": "2026-10-19T08:00:00Z",
            "userId": Uuid::nil()
        }))
        .unwrap();
        let millis: ScheduleRequest = serde_json::from_value(json!({
            "notification": { "title": "T" },
            "scheduledFor": 1_792_396_800_000i64,
            "userId": Uuid::nil()
        }))
        .unwrap();

        let (_, at, _) = rfc.into_parts().unwrap();
        assert_eq!(at.to_rfc3339(), "2026-10-19T08:00:00+00:00");
        let (_, at, _) = millis.into_parts().unwrap();
        assert_eq!(at.timestamp_millis(), 1_792_396_800_000);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let request: ScheduleRequest =
            serde_json::from_value(json!({ "notification": { "title": "T" } })).unwrap();

        assert!(matches!(request.into_parts(), Err(AppError::BadRequest(_))));
    }
}
