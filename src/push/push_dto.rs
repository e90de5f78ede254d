use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    push_models::{DeliveryResult, NotificationRequest},
    push_service::DispatchReport,
};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub notification: Option<NotificationRequest>,
    pub user_id: Option<Uuid>,
}

impl DispatchRequest {
    pub fn into_parts(self) -> Result<(NotificationRequest, Uuid)> {
        match (self.notification, self.user_id) {
            (Some(notification), Some(user_id)) => Ok((notification, user_id)),
            _ => Err(AppError::BadRequest(
                "notification and userId are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<DeliveryResult>,
}

impl From<DispatchReport> for DispatchResponse {
    fn from(report: DispatchReport) -> Self {
        Self {
            success: true,
            message: report.message,
            results: report.results,
        }
    }
}
