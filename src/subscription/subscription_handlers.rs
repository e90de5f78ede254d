use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use super::{
    subscription_dto::{RegisterSubscriptionRequest, SubscriptionQuery, UnregisterSubscriptionRequest},
    subscription_models::{NewSubscription, PushSubscription},
};
use crate::{
    error::{AppError, Result},
    state::AppState,
};

/// Register a device's push subscription
#[utoipa::path(
    post,
    path = "/api/push/subscriptions",
    request_body = RegisterSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription registered", body = PushSubscription),
        (status = 400, description = "Invalid subscription")
    ),
    tag = "subscriptions"
)]
pub async fn register_subscription(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterSubscriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    payload.validate()?;

    let (p256dh, auth) = match payload.keys {
        Some(keys) => (Some(keys.p256dh), Some(keys.auth)),
        None => (None, None),
    };

    let subscription = state
        .subscription_store
        .upsert(NewSubscription {
            user_id: payload.user_id,
            endpoint: payload.endpoint,
            p256dh,
            auth,
            user_agent: payload.user_agent,
        })
        .await?;

    tracing::info!(
        user_id = %subscription.user_id,
        subscription_id = %subscription.id,
        "Registered push subscription"
    );

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// Remove a device's push subscription
#[utoipa::path(
    delete,
    path = "/api/push/subscriptions",
    request_body = UnregisterSubscriptionRequest,
    responses(
        (status = 204, description = "Subscription removed"),
        (status = 404, description = "Subscription not found")
    ),
    tag = "subscriptions"
)]
pub async fn unregister_subscription(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UnregisterSubscriptionRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(payload) = payload?;
    payload.validate()?;

    let rows_affected = state
        .subscription_store
        .delete_by_endpoint(&payload.endpoint)
        .await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound("Subscription not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// List the devices registered for a user
#[utoipa::path(
    get,
    path = "/api/push/subscriptions",
    params(SubscriptionQuery),
    responses(
        (status = 200, description = "Registered devices", body = Vec<PushSubscription>)
    ),
    tag = "subscriptions"
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Json<Vec<PushSubscription>>> {
    let subscriptions = state.subscription_store.find_by_user(query.user_id).await?;

    Ok(Json(subscriptions))
}
