use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use super::push_dto::{DispatchRequest, DispatchResponse};
use crate::{error::Result, state::AppState};

/// Send a notification to every device registered for a user
#[utoipa::path(
    post,
    path = "/api/push/send",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Delivery attempted on every subscription", body = DispatchResponse),
        (status = 400, description = "Missing notification or userId"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Subscription store unavailable")
    ),
    tag = "push"
)]
pub async fn send_notification(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<DispatchResponse>> {
    let Json(payload) = payload?;
    let (notification, user_id) = payload.into_parts()?;
    notification.validate()?;

    let report = state.dispatch_service.dispatch(&notification, user_id).await?;

    Ok(Json(report.into()))
}
