use crate::{
    error::method_not_allowed,
    push::{
        push_dto::{DispatchRequest, DispatchResponse},
        push_handlers,
        push_models::{DeliveryResult, DeliveryStatus, NotificationAction, NotificationRequest, Priority, PushPayload},
    },
    schedule::{
        schedule_dto::{ScheduleRequest, ScheduledAck},
        schedule_handlers,
        schedule_models::{ScheduleStatus, ScheduledNotification},
    },
    state::AppState,
    subscription::{
        subscription_dto::{RegisterSubscriptionRequest, SubscriptionKeys, UnregisterSubscriptionRequest},
        subscription_handlers,
        subscription_models::PushSubscription,
    },
};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        push_handlers::send_notification,
        schedule_handlers::schedule_notification,
        schedule_handlers::get_scheduled,
        schedule_handlers::list_scheduled,
        schedule_handlers::cancel_scheduled,
        subscription_handlers::register_subscription,
        subscription_handlers::unregister_subscription,
        subscription_handlers::list_subscriptions,
    ),
    components(
        schemas(
            NotificationRequest,
            NotificationAction,
            Priority,
            PushPayload,
            DeliveryResult,
            DeliveryStatus,
            DispatchRequest,
            DispatchResponse,
            ScheduleRequest,
            ScheduledAck,
            ScheduledNotification,
            ScheduleStatus,
            RegisterSubscriptionRequest,
            SubscriptionKeys,
            UnregisterSubscriptionRequest,
            PushSubscription,
        )
    ),
    tags(
        (name = "push", description = "Immediate notification dispatch"),
        (name = "schedule", description = "Scheduled notifications"),
        (name = "subscriptions", description = "Device push subscriptions")
    )
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let push_routes = Router::new()
        .route(
            "/send",
            post(push_handlers::send_notification).fallback(method_not_allowed),
        )
        .route(
            "/schedule",
            post(schedule_handlers::schedule_notification).fallback(method_not_allowed),
        )
        .route("/scheduled", get(schedule_handlers::list_scheduled))
        .route(
            "/scheduled/:id",
            get(schedule_handlers::get_scheduled).delete(schedule_handlers::cancel_scheduled),
        )
        .route(
            "/subscriptions",
            get(subscription_handlers::list_subscriptions)
                .post(subscription_handlers::register_subscription)
                .delete(subscription_handlers::unregister_subscription),
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/push", push_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
