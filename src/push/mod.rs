pub mod push_dto;
pub mod push_handlers;
pub mod push_models;
pub mod push_service;
pub mod push_transport;

pub use push_models::{DeliveryResult, DeliveryStatus, NotificationRequest, Priority, PushPayload};
pub use push_service::{DispatchReport, DispatchService, DispatchSettings};
pub use push_transport::{HttpPushTransport, PushError, PushMessage, PushTransport};
