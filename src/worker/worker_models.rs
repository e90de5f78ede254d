use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::push::push_models::{
    NotificationAction, APP_NAME, DEFAULT_BADGE, DEFAULT_BODY, DEFAULT_ICON, DEFAULT_TAG,
};

/// Lifecycle of a worker instance, as driven by install/activate events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Push payload as it arrives; every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub require_interaction: Option<bool>,
    pub silent: Option<bool>,
    pub data: Option<Map<String, Value>>,
    pub actions: Option<Vec<NotificationAction>>,
}

/// Options handed to the platform's notification renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub silent: bool,
    pub data: Map<String, Value>,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedNotification {
    pub title: String,
    pub options: NotificationOptions,
}

impl DisplayedNotification {
    /// `data.actionUrl` when it is a string.
    pub fn action_url(&self) -> Option<&str> {
        self.options.data.get("actionUrl").and_then(Value::as_str)
    }
}

impl IncomingPayload {
    /// Resolves every missing field to its default.
    pub fn apply_defaults(self) -> DisplayedNotification {
        DisplayedNotification {
            title: self.title.unwrap_or_else(|| APP_NAME.to_string()),
            options: NotificationOptions {
                body: self.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
                icon: self.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
                badge: self.badge.unwrap_or_else(|| DEFAULT_BADGE.to_string()),
                tag: self.tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
                require_interaction: self.require_interaction.unwrap_or(false),
                silent: self.silent.unwrap_or(false),
                data: self.data.unwrap_or_default(),
                actions: self.actions.unwrap_or_default(),
            },
        }
    }
}

/// Shown when a push arrives without a usable payload.
pub fn fallback_notification() -> DisplayedNotification {
    IncomingPayload::default().apply_defaults()
}

/// Events the host platform delivers to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Push {
        data: Option<Vec<u8>>,
    },
    NotificationClick {
        /// Named action the user picked, `None` (or empty) for a click on the body.
        action: Option<String>,
        notification: DisplayedNotification,
    },
    NotificationClose {
        notification: DisplayedNotification,
    },
    Message(Value),
}

impl WorkerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Push { .. } => "push",
            WorkerEvent::NotificationClick { .. } => "notificationclick",
            WorkerEvent::NotificationClose { .. } => "notificationclose",
            WorkerEvent::Message(_) => "message",
        }
    }
}

/// Messages a page may post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SkipWaiting,
}
