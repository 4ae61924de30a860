//! Collaborator seams of the intake state machine.
//!
//! The machine only talks to storage through these traits, so tests can swap
//! the SQLite implementations in `crate::storage` for in-memory doubles.
//! All methods are synchronous: the SQLite calls are short and run on the
//! calling task, the same way the bot handlers use a pooled connection.

use crate::core::error::AppResult;
use crate::core::models::{Comment, NewTicket, Template, Ticket, TicketFilter, TicketPatch, TicketStats};
use crate::core::types::{Identity, Role};

/// Durable ticket storage.
///
/// The repository owns ticket ids and timestamps. `update` must leave absent
/// patch fields untouched and must stamp `completed_at` at most once.
pub trait TicketRepository: Send + Sync {
    /// Stores a new ticket with status `pending` and a fresh id.
    fn create(&self, ticket: NewTicket) -> AppResult<Ticket>;

    fn get(&self, id: i64) -> AppResult<Option<Ticket>>;

    /// Applies a partial update. `Ok(None)` when the ticket does not exist.
    fn update(&self, id: i64, patch: &TicketPatch) -> AppResult<Option<Ticket>>;

    /// Tickets matching every set predicate, newest first.
    fn list_filtered(&self, filter: &TicketFilter) -> AppResult<Vec<Ticket>>;

    fn list_by_requester(&self, requester: &Identity) -> AppResult<Vec<Ticket>> {
        self.list_filtered(&TicketFilter {
            requester_id: Some(requester.clone()),
            ..TicketFilter::default()
        })
    }

    fn list_by_assignee(&self, assignee: &Identity) -> AppResult<Vec<Ticket>> {
        self.list_filtered(&TicketFilter {
            assignee_id: Some(assignee.clone()),
            ..TicketFilter::default()
        })
    }

    fn add_comment(&self, ticket_id: i64, author: &Identity, text: &str, internal: bool) -> AppResult<Comment>;

    /// Comments oldest first; internal ones only when `include_internal`.
    fn list_comments(&self, ticket_id: i64, include_internal: bool) -> AppResult<Vec<Comment>>;

    fn stats(&self) -> AppResult<TicketStats>;
}

/// Read access to request templates.
pub trait TemplateCatalog: Send + Sync {
    /// Active templates ordered by name.
    fn active_templates(&self) -> AppResult<Vec<Template>>;

    /// Any template by id, active or not.
    fn get(&self, id: i64) -> AppResult<Option<Template>>;
}

/// Role membership lookups.
///
/// Every reviewer-gated operation goes through `has_role`.
pub trait RoleDirectory: Send + Sync {
    fn has_role(&self, identity: &Identity, role: Role) -> AppResult<bool>;

    /// Active members of a role.
    fn members(&self, role: Role) -> AppResult<Vec<Identity>>;
}
