use thiserror::Error;

use crate::core::types::TicketStatus;

/// Centralized infrastructure error type
///
/// Storage, HTTP and configuration failures are converted to this enum.
/// Domain-level refusals (unknown ticket, missing role, ...) live in
/// [`crate::intake::IntakeError`], which wraps this type for fatal cases.
///
/// # Example
///
/// ```no_run
/// use fincore::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(String),

    /// HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status code errors
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ticket lifecycle rule violation
    #[error("Ticket cannot move from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
