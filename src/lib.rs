// region:    --- Modules
pub mod auth;
pub mod buyers;
pub mod claim;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod message_broker;
pub mod notify;
pub mod offers;
pub mod sales;
pub mod scheduler;
pub mod sellers;
pub mod store;
pub mod telemetry;
// endregion: --- Modules

pub use error::{AppError, ClaimError, Result};
pub use handlers::{router, AppState};
