pub mod db;
pub mod error;
pub mod push;
pub mod routes;
pub mod schedule;
pub mod state;
pub mod subscription;
pub mod worker;

pub use state::{AppState, Config};
