//! Repositories module - thin data-access layer over the SQLite pool
//!
//! One repository per store: messages (append-only), rooms (including the
//! cached last-message summary) and users (identity resolution plus the
//! read-only membership lists). Queries use the runtime-checked sqlx API so
//! the crate builds without a live database.

pub mod message;
pub mod room;
pub mod user;

pub use message::MessageRepository;
pub use room::RoomRepository;
pub use user::UserRepository;
