//! Handler types, dependencies and user registration helpers

use std::sync::Arc;

use teloxide::types::User;

use fincore::clients::ClientDirectory;
use fincore::core::models::TelegramUser;
use fincore::core::types::Identity;
use fincore::intake::IntakeMachine;
use fincore::storage::message_log::{log_message, MessageKind};
use fincore::storage::{get_connection, DbPool, SqliteRoleDirectory, SqliteTemplateCatalog, UserProfile};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub machine: Arc<IntakeMachine>,
    pub templates: Arc<SqliteTemplateCatalog>,
    pub roles: Arc<SqliteRoleDirectory>,
    pub clients: Arc<dyn ClientDirectory>,
}

impl HandlerDeps {
    pub fn new(
        db_pool: Arc<DbPool>,
        machine: Arc<IntakeMachine>,
        templates: Arc<SqliteTemplateCatalog>,
        roles: Arc<SqliteRoleDirectory>,
        clients: Arc<dyn ClientDirectory>,
    ) -> Self {
        Self {
            db_pool,
            machine,
            templates,
            roles,
            clients,
        }
    }

    /// Reviewer check for display decisions; lookup failures count as "no".
    pub fn is_reviewer(&self, identity: &Identity) -> bool {
        self.machine.is_reviewer(identity).unwrap_or_else(|e| {
            log::error!("Role lookup failed for {}: {}", identity, e);
            false
        })
    }

    /// Writes a message-log row. Failures are logged and otherwise ignored.
    pub fn record_message(&self, telegram_id: &Identity, ticket_id: i64, kind: MessageKind, content: &str) {
        let result = get_connection(&self.db_pool)
            .and_then(|conn| log_message(&conn, telegram_id, Some(ticket_id), kind, content));
        if let Err(e) = result {
            log::error!("Failed to log {} message for ticket #{}: {}", kind.as_str(), ticket_id, e);
        }
    }
}

/// Identity of a Telegram user.
pub fn identity_of(user: &User) -> Identity {
    Identity::new(user.id.0.to_string())
}

pub fn profile_of(user: &User) -> UserProfile {
    UserProfile {
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

/// Registers the user on first contact and refreshes their profile otherwise.
pub fn ensure_user_exists(deps: &HandlerDeps, user: &User) -> Option<TelegramUser> {
    match deps.roles.ensure_user(&identity_of(user), &profile_of(user)) {
        Ok(registered) => Some(registered),
        Err(e) => {
            log::error!("Failed to register user {}: {}", user.id, e);
            None
        }
    }
}
