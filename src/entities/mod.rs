//! Entities module - rows of the durable stores
//!
//! Each entity maps one-to-one onto a table created by `migrations/`.

pub mod message;
pub mod room;
pub mod user;

pub use message::Message;
pub use room::{LastMessage, Room};
pub use user::User;
