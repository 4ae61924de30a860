use std::fmt;
use thiserror::Error;

use crate::core::error::AppError;
use crate::core::types::TicketStatus;
use crate::core::validation::ValidationError;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Template,
    Ticket,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Template => f.write_str("Template"),
            Entity::Ticket => f.write_str("Ticket"),
        }
    }
}

/// Errors returned by intake operations.
///
/// Everything except `Storage` is a refusal that leaves state untouched and
/// maps to a specific user-facing message. `Storage` means the repository
/// failed; the boundary shows a generic failure and the session survives.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("Not allowed for this user")]
    Forbidden,

    #[error("No completion in progress")]
    NoPendingCompletion,

    #[error("Invalid input: {0}")]
    ValidationFailed(String),

    #[error("Ticket cannot move from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    #[error("Storage failure: {0}")]
    Storage(AppError),
}

impl IntakeError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, IntakeError::Storage(_))
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            IntakeError::NotFound(_) => "not_found",
            IntakeError::Forbidden => "forbidden",
            IntakeError::NoPendingCompletion => "no_pending_completion",
            IntakeError::ValidationFailed(_) => "validation_failed",
            IntakeError::InvalidTransition { .. } => "invalid_transition",
            IntakeError::Storage(_) => "storage",
        }
    }
}

impl From<AppError> for IntakeError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidTransition { from, to } => IntakeError::InvalidTransition { from, to },
            AppError::Validation(message) => IntakeError::ValidationFailed(message),
            other => IntakeError::Storage(other),
        }
    }
}

impl From<ValidationError> for IntakeError {
    fn from(err: ValidationError) -> Self {
        IntakeError::ValidationFailed(err.to_string())
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;
