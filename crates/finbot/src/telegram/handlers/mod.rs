//! Telegram handler tree
//!
//! The same schema runs in production and can be driven from tests.

mod callbacks;
mod commands;
mod messages;
mod schema;
mod types;

pub use schema::schema;
pub use types::{ensure_user_exists, identity_of, profile_of, HandlerDeps, HandlerError};
