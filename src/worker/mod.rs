pub mod worker_models;
pub mod worker_service;

pub use worker_models::{
    fallback_notification, ClientMessage, DisplayedNotification, IncomingPayload, LifecycleState,
    NotificationOptions, WorkerEvent,
};
pub use worker_service::{ServiceWorker, WorkerError, WorkerPlatform};
