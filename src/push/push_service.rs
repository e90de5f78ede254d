use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::push_models::{DeliveryResult, DeliveryStatus, NotificationRequest};
use super::push_transport::{PushMessage, PushTransport};
use crate::error::Result;
use crate::subscription::{PushSubscription, SubscriptionStore};

pub const NO_SUBSCRIPTIONS_MESSAGE: &str = "No push subscriptions found for user";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub ttl_seconds: u32,
    /// Upper bound on deliveries in flight for one dispatch.
    pub max_concurrency: usize,
    /// Delete subscriptions whose endpoint answers 404 or 410.
    pub prune_gone: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 86400,
            max_concurrency: 8,
            prune_gone: true,
        }
    }
}

/// Result of one dispatch: one entry per subscription, in subscription order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatchReport {
    pub message: String,
    pub results: Vec<DeliveryResult>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == DeliveryStatus::Success)
            .count()
    }
}

/// Fans a notification out to every device a user has registered.
#[derive(Clone)]
pub struct DispatchService {
    subscriptions: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn PushTransport>,
    settings: DispatchSettings,
}

impl DispatchService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn PushTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            subscriptions,
            transport,
            settings,
        }
    }

    /// Attempts delivery to every subscription of `user_id`.
    ///
    /// Only a failed subscription lookup fails the call. Individual delivery
    /// failures are reported in the returned results.
    pub async fn dispatch(
        &self,
        notification: &NotificationRequest,
        user_id: Uuid,
    ) -> Result<DispatchReport> {
        let subscriptions = self.subscriptions.find_by_user(user_id).await?;

        if subscriptions.is_empty() {
            info!(%user_id, "No push subscriptions, nothing to deliver");
            return Ok(DispatchReport {
                message: NO_SUBSCRIPTIONS_MESSAGE.to_string(),
                results: Vec::new(),
            });
        }

        let message = PushMessage {
            payload: notification.to_payload(),
            ttl_seconds: self.settings.ttl_seconds,
            urgency: notification.priority.urgency(),
        };

        let message = &message;
        let results: Vec<DeliveryResult> = stream::iter(subscriptions)
            .map(|subscription| async move { self.deliver_one(&subscription, message).await })
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let report = DispatchReport {
            message: String::new(),
            results,
        };
        let delivered = report.delivered();
        let total = report.results.len();
        info!(%user_id, delivered, total, title = %notification.title, priority = %notification.priority, "Dispatched push notification");

        Ok(DispatchReport {
            message: format!("Notification sent to {} of {} devices", delivered, total),
            ..report
        })
    }

    async fn deliver_one(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> DeliveryResult {
        match self.transport.deliver(&subscription.endpoint, message).await {
            Ok(status) if (200..300).contains(&status) => {
                debug!(subscription_id = %subscription.id, status, "Push delivered");
                DeliveryResult {
                    subscription_id: subscription.id,
                    status: DeliveryStatus::Success,
                    status_code: Some(status),
                    error: None,
                }
            }
            Ok(status) => {
                warn!(subscription_id = %subscription.id, status, "Push service rejected delivery");
                if self.settings.prune_gone && matches!(status, 404 | 410) {
                    self.prune(subscription).await;
                }
                DeliveryResult {
                    subscription_id: subscription.id,
                    status: DeliveryStatus::Failed,
                    status_code: Some(status),
                    error: Some(format!("Push service responded with HTTP {}", status)),
                }
            }
            Err(e) => {
                warn!(subscription_id = %subscription.id, error = %e, "Push delivery errored");
                DeliveryResult {
                    subscription_id: subscription.id,
                    status: DeliveryStatus::Error,
                    status_code: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn prune(&self, subscription: &PushSubscription) {
        match self.subscriptions.delete(subscription.id).await {
            Ok(_) => info!(subscription_id = %subscription.id, "Removed expired push subscription"),
            Err(e) => warn!(subscription_id = %subscription.id, error = %e, "Failed to remove expired push subscription"),
        }
    }
}
