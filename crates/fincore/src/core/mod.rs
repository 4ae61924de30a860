//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod types;
pub mod validation;
pub mod web_server;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
pub use models::{
    Comment, NewTemplate, NewTicket, RequestData, TelegramUser, Template, TemplatePatch, Ticket, TicketFilter,
    TicketPatch, TicketStats,
};
pub use types::{Category, Identity, Priority, Role, TicketStatus};
