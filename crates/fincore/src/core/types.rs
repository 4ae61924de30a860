use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a requester or reviewer.
///
/// For Telegram users this is the numeric user id rendered as decimal text,
/// which is also what the `telegram_users.telegram_id` column stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric chat id, when the identity came from Telegram.
    pub fn chat_id(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl rusqlite::types::FromSql for Identity {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        value.as_str().map(Identity::from)
    }
}

impl rusqlite::types::ToSql for Identity {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
            self.0.as_bytes(),
        )))
    }
}

/// Implements text-column storage for an enum that already has `as_str` and `FromStr`.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::from_str(s)
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::other(e))))
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
                    self.as_str().as_bytes(),
                )))
            }
        }
    };
}

/// Request category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Payment,
    Invoice,
    Budget,
    Expense,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Payment,
        Category::Invoice,
        Category::Budget,
        Category::Expense,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Payment => "payment",
            Category::Invoice => "invoice",
            Category::Budget => "budget",
            Category::Expense => "expense",
            Category::Other => "other",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Category::Payment => "💳",
            Category::Invoice => "📄",
            Category::Budget => "💰",
            Category::Expense => "📊",
            Category::Other => "📋",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(Category::Payment),
            "invoice" => Ok(Category::Invoice),
            "budget" => Ok(Category::Budget),
            "expense" => Ok(Category::Expense),
            "other" => Ok(Category::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

sql_text_enum!(Category);

/// Ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Priority::Low => "🟢",
            Priority::Medium => "🟡",
            Priority::High => "🟠",
            Priority::Urgent => "🔴",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

sql_text_enum!(Priority);

/// Ticket lifecycle status
///
/// Allowed transitions: `pending → in_progress → completed`, and any
/// non-terminal status → `cancelled`. `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Pending,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "⏳",
            TicketStatus::InProgress => "🔄",
            TicketStatus::Completed => "✅",
            TicketStatus::Cancelled => "❌",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }

    /// Whether a ticket in this status may move to `next`.
    ///
    /// Re-specifying the current status is accepted and treated as a no-op.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        if *self == next {
            return true;
        }
        match (self, next) {
            (TicketStatus::Pending, TicketStatus::InProgress) => true,
            (TicketStatus::InProgress, TicketStatus::Completed) => true,
            (from, TicketStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "in_progress" => Ok(TicketStatus::InProgress),
            "completed" => Ok(TicketStatus::Completed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

sql_text_enum!(TicketStatus);

/// Role of a Telegram user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Requester,
    FinanceTeam,
    Manager,
}

impl Role {
    /// The role allowed to accept and complete tickets.
    pub const REVIEWER: Role = Role::FinanceTeam;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::FinanceTeam => "finance_team",
            Role::Manager => "manager",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Requester => "Requester",
            Role::FinanceTeam => "Finance team",
            Role::Manager => "Manager",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requester" => Ok(Role::Requester),
            "finance_team" | "finance" => Ok(Role::FinanceTeam),
            "manager" => Ok(Role::Manager),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

sql_text_enum!(Role);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forward_transitions() {
        assert!(TicketStatus::Pending.can_transition_to(TicketStatus::InProgress));
        assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Completed));
        assert!(!TicketStatus::Pending.can_transition_to(TicketStatus::Completed));
        assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::Pending));
    }

    #[test]
    fn test_status_cancel_only_from_non_terminal() {
        assert!(TicketStatus::Pending.can_transition_to(TicketStatus::Cancelled));
        assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Cancelled));
        assert!(!TicketStatus::Completed.can_transition_to(TicketStatus::Cancelled));
        assert!(!TicketStatus::Cancelled.can_transition_to(TicketStatus::Pending));
    }

    #[test]
    fn test_completed_is_frozen() {
        for next in TicketStatus::ALL {
            let allowed = TicketStatus::Completed.can_transition_to(next);
            assert_eq!(allowed, next == TicketStatus::Completed, "completed -> {}", next);
        }
    }

    #[test]
    fn test_enum_text_round_trip() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>(), Ok(category));
        }
        assert!("archived".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_role_accepts_legacy_finance_alias() {
        assert_eq!("finance".parse::<Role>(), Ok(Role::FinanceTeam));
        assert_eq!(Role::REVIEWER.as_str(), "finance_team");
    }

    #[test]
    fn test_identity_chat_id() {
        assert_eq!(Identity::from(42_i64).chat_id(), Some(42));
        assert_eq!(Identity::from("web:alice").chat_id(), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
