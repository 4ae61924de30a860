//! Records persisted by the storage layer and exchanged with the dashboard API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{Category, Identity, Priority, Role, TicketStatus};

/// Free-form captured form values, keyed by field name.
pub type RequestData = BTreeMap<String, String>;

/// A predefined request template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub estimated_time_hours: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub estimated_time_hours: Option<i64>,
}

/// Partial template update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub estimated_time_hours: Option<i64>,
    pub is_active: Option<bool>,
}

/// A durable finance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub template_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub status: TicketStatus,
    pub requester_id: Identity,
    pub assignee_id: Option<Identity>,
    pub request_data: RequestData,
    pub response: Option<String>,
    pub estimated_time_hours: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields proposed for a new ticket. Identity, status and timestamps are
/// assigned by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub template_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub requester_id: Identity,
    pub request_data: RequestData,
    pub estimated_time_hours: Option<i64>,
}

/// Partial ticket update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TicketStatus>,
    pub assignee_id: Option<Identity>,
    pub response: Option<String>,
}

impl TicketPatch {
    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Dashboard edit of a Telegram user; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Ticket query predicates, AND-combined. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    #[serde(alias = "assignee")]
    pub assignee_id: Option<Identity>,
    #[serde(alias = "requester")]
    pub requester_id: Option<Identity>,
}

/// An append-only note on a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub ticket_id: i64,
    pub author_id: Identity,
    pub text: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

/// A registered Telegram user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramUser {
    pub telegram_id: Identity,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TelegramUser {
    /// "First Last", falling back to @username and then the raw id.
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.telegram_id.to_string(),
        }
    }
}
