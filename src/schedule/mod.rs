pub mod clock;
pub mod schedule_dto;
pub mod schedule_handlers;
pub mod schedule_models;
pub mod schedule_repository;
pub mod schedule_service;

pub use clock::{Clock, SystemClock};
pub use schedule_models::{ScheduleStatus, ScheduledNotification};
pub use schedule_repository::{MemoryScheduleStore, ScheduleRepository, ScheduleStore};
pub use schedule_service::{start_scheduler, ScheduleOutcome, ScheduleService};
