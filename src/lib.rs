//! SquadCircle - group scheduling and voting backend
//!
//! Groups propose events with candidate time slots, members respond, and the
//! lifecycle engine picks the winning slot once voting closes, then follows
//! the event through its slot until it is over.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod service;
pub mod state;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
