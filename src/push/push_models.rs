use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const APP_NAME: &str = "BoluLife";
pub const DEFAULT_BODY: &str = "You have a new notification";
pub const DEFAULT_ICON: &str = "/logo.png";
pub const DEFAULT_BADGE: &str = "/logo.png";
pub const DEFAULT_TAG: &str = "bolulife-notification";

/// Action id the receiver treats as "navigate to the action URL".
pub const OPEN_ACTION: &str = "open";
pub const DISMISS_ACTION: &str = "dismiss";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    #[serde(alias = "medium")]
    Normal,
    High,
}

impl Priority {
    pub fn urgency(self) -> Urgency {
        match self {
            Priority::High => Urgency::High,
            Priority::Low | Priority::Normal => Urgency::Normal,
        }
    }

    /// High priority notifications stay on screen until dismissed.
    pub fn requires_interaction(self) -> bool {
        self == Priority::High
    }

    pub fn is_silent(self) -> bool {
        self == Priority::Low
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Value of the `Urgency` header sent to the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

/// Notification as submitted to the relay or the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub tag: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Extra metadata forwarded to the client untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// JSON body carried by every push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub silent: bool,
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
    pub actions: Vec<NotificationAction>,
}

impl NotificationRequest {
    /// Builds the wire payload, applying every default in one place.
    pub fn to_payload(&self) -> PushPayload {
        // Caller-supplied data wins over the named fields.
        let mut data = Map::new();
        if let Some(url) = &self.action_url {
            data.insert("actionUrl".into(), Value::String(url.clone()));
        }
        if let Some(kind) = &self.kind {
            data.insert("type".into(), Value::String(kind.clone()));
        }
        if let Some(category) = &self.category {
            data.insert("category".into(), Value::String(category.clone()));
        }
        data.extend(self.data.clone());

        let actions = if self.action_url.is_some() {
            vec![
                NotificationAction {
                    action: OPEN_ACTION.into(),
                    title: "Open".into(),
                },
                NotificationAction {
                    action: DISMISS_ACTION.into(),
                    title: "Dismiss".into(),
                },
            ]
        } else {
            Vec::new()
        };

        PushPayload {
            title: self.title.clone(),
            body: self.body.clone().unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: self.icon.clone().unwrap_or_else(|| DEFAULT_ICON.to_string()),
            badge: self.badge.clone().unwrap_or_else(|| DEFAULT_BADGE.to_string()),
            tag: self.tag.clone().unwrap_or_else(|| DEFAULT_TAG.to_string()),
            require_interaction: self.priority.requires_interaction(),
            silent: self.priority.is_silent(),
            data,
            actions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
    Error,
}

/// Outcome of one delivery attempt within a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub subscription_id: Uuid,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
