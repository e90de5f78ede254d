use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{
    schedule_dto::{ScheduleQuery, ScheduleRequest, ScheduleResponse, ScheduledAck},
    schedule_models::ScheduledNotification,
};
use crate::{error::Result, state::AppState};

/// Schedule a notification for later delivery
///
/// When `scheduledFor` is already in the past the notification is dispatched
/// immediately and the relay's response is returned instead of an acknowledgment.
#[utoipa::path(
    post,
    path = "/api/push/schedule",
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Notification queued, or dispatched when already due", body = ScheduledAck),
        (status = 400, description = "Missing notification, scheduledFor or userId"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "schedule"
)]
pub async fn schedule_notification(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<ScheduleResponse>> {
    let Json(payload) = payload?;
    let (notification, scheduled_for, user_id) = payload.into_parts()?;
    notification.validate()?;

    let outcome = state
        .schedule_service
        .schedule(notification, user_id, scheduled_for)
        .await?;

    Ok(Json(outcome.into()))
}

/// Get a scheduled notification
#[utoipa::path(
    get,
    path = "/api/push/scheduled/{id}",
    params(
        ("id" = Uuid, Path, description = "Scheduled notification ID")
    ),
    responses(
        (status = 200, description = "Scheduled notification", body = ScheduledNotification),
        (status = 404, description = "Scheduled notification not found")
    ),
    tag = "schedule"
)]
pub async fn get_scheduled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledNotification>> {
    let job = state.schedule_service.get(id).await?;
    Ok(Json(job))
}

/// List a user's scheduled notifications
#[utoipa::path(
    get,
    path = "/api/push/scheduled",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Scheduled notifications, soonest first", body = Vec<ScheduledNotification>)
    ),
    tag = "schedule"
)]
pub async fn list_scheduled(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduledNotification>>> {
    let jobs = state.schedule_service.list_for_user(query.user_id).await?;
    Ok(Json(jobs))
}

/// Cancel a pending scheduled notification
#[utoipa::path(
    delete,
    path = "/api/push/scheduled/{id}",
    params(
        ("id" = Uuid, Path, description = "Scheduled notification ID")
    ),
    responses(
        (status = 200, description = "Scheduled notification cancelled", body = ScheduledNotification),
        (status = 404, description = "Scheduled notification not found"),
        (status = 409, description = "Notification already dispatched, failed or cancelled")
    ),
    tag = "schedule"
)]
pub async fn cancel_scheduled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledNotification>> {
    let job = state.schedule_service.cancel(id).await?;
    Ok(Json(job))
}
