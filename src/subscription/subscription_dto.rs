use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSubscriptionRequest {
    pub user_id: Uuid,
    #[validate(url)]
    pub endpoint: String,
    pub keys: Option<SubscriptionKeys>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UnregisterSubscriptionRequest {
    #[validate(length(min = 1))]
    pub endpoint: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SubscriptionQuery {
    pub user_id: Uuid,
}
