//! fincore - finance request intake without Telegram
//!
//! Everything the bot needs except the Telegram transport: the intake state
//! machine and its session store, SQLite-backed tickets, templates and roles,
//! best-effort notification fan-out, the analytics client, client account
//! lookups and the dashboard API.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, metrics, domain types, validation, dashboard API
//! - `storage`: SQLite pool, migrations and repository implementations
//! - `intake`: Sessions, the intake state machine and its collaborator traits
//! - `notify`: The `Notifier` seam and concurrent fan-out
//! - `analytics`: Usage events posted to an external collector
//! - `clients`: Client accounts and receivables aging read from spreadsheets

pub mod analytics;
pub mod clients;
pub mod core;
pub mod intake;
pub mod notify;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult, Identity, Role, TicketStatus};
pub use intake::{IntakeError, IntakeMachine};
pub use notify::{Notification, Notifier};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
