//! SQLite persistence: pool, migrations and the repository implementations

pub mod db;
pub mod message_log;
pub mod migrations;
pub mod templates;
pub mod tickets;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use templates::SqliteTemplateCatalog;
pub use tickets::SqliteTicketRepository;
pub use users::{SqliteRoleDirectory, UserProfile};
