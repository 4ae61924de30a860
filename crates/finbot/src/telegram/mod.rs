pub mod bot;
pub mod format;
pub mod handlers;
pub mod keyboards;
pub mod notifier;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use notifier::TelegramNotifier;
pub use teloxide::Bot;
