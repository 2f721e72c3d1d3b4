//! Core module - infrastructural pieces of the application
//!
//! - Error type shared by the HTTP and WebSocket surfaces
//! - Environment-driven configuration
//! - Shared application state

pub mod error;
pub mod state;

pub use error::AppError;
pub use state::AppState;
