use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::worker_models::{
    fallback_notification, ClientMessage, DisplayedNotification, IncomingPayload, LifecycleState,
    WorkerEvent,
};
use crate::push::push_models::OPEN_ACTION;

pub const APP_ROOT: &str = "/";

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("platform call failed: {0}")]
    Platform(String),

    #[error("cannot handle {event} while {state:?}")]
    InvalidState {
        event: &'static str,
        state: LifecycleState,
    },
}

/// Host binding of the worker: the calls a browser service-worker global exposes.
#[async_trait]
pub trait WorkerPlatform: Send + Sync {
    /// Activate without waiting for existing clients to close.
    async fn skip_waiting(&self) -> Result<(), WorkerError>;

    /// Take control of every open in-scope client.
    async fn claim_clients(&self) -> Result<(), WorkerError>;

    async fn show_notification(&self, notification: &DisplayedNotification) -> Result<(), WorkerError>;

    async fn close_notification(&self, tag: &str) -> Result<(), WorkerError>;

    async fn open_window(&self, url: &str) -> Result<(), WorkerError>;
}

/// Push receiver. Events are handled one at a time; `handle` resolves only once
/// the platform work it started has completed.
pub struct ServiceWorker<P> {
    platform: P,
    state: LifecycleState,
}

impl<P: WorkerPlatform> ServiceWorker<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            state: LifecycleState::Parsed,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub async fn handle(&mut self, event: WorkerEvent) -> Result<(), WorkerError> {
        let name = event.name();
        match event {
            WorkerEvent::Install => self.on_install().await,
            WorkerEvent::Activate => self.on_activate().await,
            WorkerEvent::Message(message) => self.on_message(message).await,
            WorkerEvent::Push { data } => {
                self.require_active(name)?;
                self.on_push(data).await
            }
            WorkerEvent::NotificationClick {
                action,
                notification,
            } => {
                self.require_active(name)?;
                self.on_notification_click(action, notification).await
            }
            WorkerEvent::NotificationClose { notification } => {
                self.require_active(name)?;
                debug!(tag = %notification.options.tag, "Notification closed");
                Ok(())
            }
        }
    }

    fn require_active(&self, event: &'static str) -> Result<(), WorkerError> {
        if self.state == LifecycleState::Activated {
            Ok(())
        } else {
            Err(WorkerError::InvalidState {
                event,
                state: self.state,
            })
        }
    }

    async fn on_install(&mut self) -> Result<(), WorkerError> {
        if self.state != LifecycleState::Parsed {
            return Err(WorkerError::InvalidState {
                event: "install",
                state: self.state,
            });
        }

        self.state = LifecycleState::Installing;
        match self.platform.skip_waiting().await {
            Ok(()) => {
                self.state = LifecycleState::Installed;
                info!("Service worker installed");
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Redundant;
                warn!(error = %e, "Service worker install failed");
                Err(e)
            }
        }
    }

    async fn on_activate(&mut self) -> Result<(), WorkerError> {
        if self.state != LifecycleState::Installed {
            return Err(WorkerError::InvalidState {
                event: "activate",
                state: self.state,
            });
        }

        self.state = LifecycleState::Activating;
        if let Err(e) = self.platform.claim_clients().await {
            warn!(error = %e, "Failed to claim clients, activating anyway");
        }
        self.state = LifecycleState::Activated;
        info!("Service worker activated");
        Ok(())
    }

    async fn on_push(&self, data: Option<Vec<u8>>) -> Result<(), WorkerError> {
        let notification = match data {
            Some(bytes) => match serde_json::from_slice::<IncomingPayload>(&bytes) {
                Ok(payload) => payload.apply_defaults(),
                Err(e) => {
                    warn!(error = %e, "Malformed push payload, showing fallback notification");
                    fallback_notification()
                }
            },
            None => fallback_notification(),
        };

        debug!(title = %notification.title, tag = %notification.options.tag, "Showing push notification");
        self.platform.show_notification(&notification).await
    }

    async fn on_notification_click(
        &self,
        action: Option<String>,
        notification: DisplayedNotification,
    ) -> Result<(), WorkerError> {
        if let Err(e) = self.platform.close_notification(&notification.options.tag).await {
            warn!(error = %e, tag = %notification.options.tag, "Failed to close clicked notification");
        }

        // Only the "open" action honours actionUrl; a click on the body always goes home.
        let target = match action.as_deref().filter(|a| !a.is_empty()) {
            None => Some(APP_ROOT),
            Some(OPEN_ACTION) => Some(notification.action_url().unwrap_or(APP_ROOT)),
            Some(other) => {
                debug!(action = other, "Notification action without navigation");
                None
            }
        };

        match target {
            Some(url) => {
                debug!(url, "Opening window for notification click");
                self.platform.open_window(url).await
            }
            None => Ok(()),
        }
    }

    async fn on_message(&self, message: serde_json::Value) -> Result<(), WorkerError> {
        match serde_json::from_value::<ClientMessage>(message) {
            Ok(ClientMessage::SkipWaiting) => {
                info!("Skip waiting requested by client");
                self.platform.skip_waiting().await
            }
            Err(_) => {
                debug!("Ignoring unrecognised client message");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        SkipWaiting,
        ClaimClients,
        Show(DisplayedNotification),
        Close(String),
        Open(String),
    }

    #[derive(Default)]
    struct RecordingPlatform {
        calls: Mutex<Vec<Call>>,
        fail_skip_waiting: bool,
        fail_claim: bool,
        fail_close: bool,
    }

    impl RecordingPlatform {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl WorkerPlatform for RecordingPlatform {
        async fn skip_waiting(&self) -> Result<(), WorkerError> {
            if self.fail_skip_waiting {
                return Err(WorkerError::Platform("skipWaiting rejected".into()));
            }
            self.record(Call::SkipWaiting);
            Ok(())
        }

        async fn claim_clients(&self) -> Result<(), WorkerError> {
            if self.fail_claim {
                return Err(WorkerError::Platform("claim rejected".into()));
            }
            self.record(Call::ClaimClients);
            Ok(())
        }

        async fn show_notification(&self, notification: &DisplayedNotification) -> Result<(), WorkerError> {
            self.record(Call::Show(notification.clone()));
            Ok(())
        }

        async fn close_notification(&self, tag: &str) -> Result<(), WorkerError> {
            if self.fail_close {
                return Err(WorkerError::Platform("close rejected".into()));
            }
            self.record(Call::Close(tag.to_string()));
            Ok(())
        }

        async fn open_window(&self, url: &str) -> Result<(), WorkerError> {
            self.record(Call::Open(url.to_string()));
            Ok(())
        }
    }

    async fn active_worker() -> ServiceWorker<RecordingPlatform> {
        let mut worker = ServiceWorker::new(RecordingPlatform::default());
        worker.handle(WorkerEvent::Install).await.unwrap();
        worker.handle(WorkerEvent::Activate).await.unwrap();
        worker.platform().calls.lock().unwrap().clear();
        worker
    }

    fn shown(worker: &ServiceWorker<RecordingPlatform>) -> DisplayedNotification {
        match worker.platform().calls().as_slice() {
            [Call::Show(notification)] => notification.clone(),
            other => panic!("expected one notification, got {:?}", other),
        }
    }

    fn with_action_url(url: &str) -> DisplayedNotification {
        serde_json::from_value::<IncomingPayload>(json!({
            "title": "Budget alert",
            "data": { "actionUrl": url }
        }))
        .unwrap()
        .apply_defaults()
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let mut worker = ServiceWorker::new(RecordingPlatform::default());
        assert_eq!(worker.state(), LifecycleState::Parsed);

        worker.handle(WorkerEvent::Install).await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Installed);

        worker.handle(WorkerEvent::Activate).await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Activated);
        assert_eq!(worker.platform().calls(), vec![Call::SkipWaiting, Call::ClaimClients]);
    }

    #[tokio::test]
    async fn test_failed_install_makes_worker_redundant() {
        let mut worker = ServiceWorker::new(RecordingPlatform {
            fail_skip_waiting: true,
            ..Default::default()
        });

        assert!(worker.handle(WorkerEvent::Install).await.is_err());
        assert_eq!(worker.state(), LifecycleState::Redundant);
        assert!(matches!(
            worker.handle(WorkerEvent::Activate).await,
            Err(WorkerError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_claim_still_activates() {
        let mut worker = ServiceWorker::new(RecordingPlatform {
            fail_claim: true,
            ..Default::default()
        });
        worker.handle(WorkerEvent::Install).await.unwrap();

        worker.handle(WorkerEvent::Activate).await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Activated);

        worker.handle(WorkerEvent::Push { data: None }).await.unwrap();
        assert_eq!(
            worker.platform().calls(),
            vec![Call::SkipWaiting, Call::Show(fallback_notification())]
        );
    }

    #[tokio::test]
    async fn test_push_before_activation_is_rejected() {
        let mut worker = ServiceWorker::new(RecordingPlatform::default());

        let result = worker.handle(WorkerEvent::Push { data: None }).await;
        assert!(matches!(
            result,
            Err(WorkerError::InvalidState { event: "push", state: LifecycleState::Parsed })
        ));
        assert!(worker.platform().calls().is_empty());
    }

    #[tokio::test]
    async fn test_push_with_partial_payload_uses_defaults() {
        let mut worker = active_worker().await;

        let data = br#"{"title":"T","body":"B"}"#.to_vec();
        worker.handle(WorkerEvent::Push { data: Some(data) }).await.unwrap();

        let notification = shown(&worker);
        assert_eq!(notification.title, "T");
        assert_eq!(notification.options.body, "B");
        assert_eq!(notification.options.icon, "/logo.png");
        assert_eq!(notification.options.badge, "/logo.png");
        assert_eq!(notification.options.tag, "bolulife-notification");
    }

    #[tokio::test]
    async fn test_push_without_payload_shows_fallback() {
        let mut worker = active_worker().await;

        worker.handle(WorkerEvent::Push { data: None }).await.unwrap();

        assert_eq!(shown(&worker), fallback_notification());
    }

    #[tokio::test]
    async fn test_malformed_payload_shows_fallback() {
        let mut worker = active_worker().await;

        let result = worker
            .handle(WorkerEvent::Push { data: Some(b"{not json".to_vec()) })
            .await;

        assert!(result.is_ok());
        assert_eq!(shown(&worker), fallback_notification());
    }

    #[tokio::test]
    async fn test_open_action_navigates_to_action_url() {
        let mut worker = active_worker().await;

        worker
            .handle(WorkerEvent::NotificationClick {
                action: Some("open".into()),
                notification: with_action_url("/finance"),
            })
            .await
            .unwrap();

        assert_eq!(
            worker.platform().calls(),
            vec![
                Call::Close("bolulife-notification".into()),
                Call::Open("/finance".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_click_navigates_even_if_close_fails() {
        let mut worker = ServiceWorker::new(RecordingPlatform {
            fail_close: true,
            ..Default::default()
        });
        worker.handle(WorkerEvent::Install).await.unwrap();
        worker.handle(WorkerEvent::Activate).await.unwrap();

        worker
            .handle(WorkerEvent::NotificationClick {
                action: Some("open".into()),
                notification: with_action_url("/finance"),
            })
            .await
            .unwrap();

        assert_eq!(worker.platform().calls().last(), Some(&Call::Open("/finance".into())));
    }

    #[tokio::test]
    async fn test_open_action_without_url_goes_home() {
        let mut worker = active_worker().await;

        worker
            .handle(WorkerEvent::NotificationClick {
                action: Some("open".into()),
                notification: fallback_notification(),
            })
            .await
            .unwrap();

        assert_eq!(worker.platform().calls()[1], Call::Open("/".into()));
    }

    #[tokio::test]
    async fn test_body_click_ignores_action_url() {
        let mut worker = active_worker().await;

        for action in [None, Some(String::new())] {
            worker
                .handle(WorkerEvent::NotificationClick {
                    action,
                    notification: with_action_url("/plants"),
                })
                .await
                .unwrap();
        }

        let opened: Vec<Call> = worker
            .platform()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Open(_)))
            .collect();
        assert_eq!(opened, vec![Call::Open("/".into()), Call::Open("/".into())]);
    }

    #[tokio::test]
    async fn test_dismiss_action_only_closes() {
        let mut worker = active_worker().await;

        worker
            .handle(WorkerEvent::NotificationClick {
                action: Some("dismiss".into()),
                notification: with_action_url("/finance"),
            })
            .await
            .unwrap();

        assert_eq!(worker.platform().calls(), vec![Call::Close("bolulife-notification".into())]);
    }

    #[tokio::test]
    async fn test_close_has_no_side_effect() {
        let mut worker = active_worker().await;

        worker
            .handle(WorkerEvent::NotificationClose {
                notification: fallback_notification(),
            })
            .await
            .unwrap();

        assert!(worker.platform().calls().is_empty());
    }

    #[tokio::test]
    async fn test_skip_waiting_message() {
        let mut worker = ServiceWorker::new(RecordingPlatform::default());

        worker
            .handle(WorkerEvent::Message(json!({ "type": "SKIP_WAITING" })))
            .await
            .unwrap();
        worker
            .handle(WorkerEvent::Message(json!({ "type": "REFRESH" })))
            .await
            .unwrap();
        worker.handle(WorkerEvent::Message(json!("hello"))).await.unwrap();

        assert_eq!(worker.platform().calls(), vec![Call::SkipWaiting]);
    }
}
