//! finbot - Telegram front end for finance requests
//!
//! Wires the `fincore` intake machine to Telegram: commands, inline buttons,
//! free-text routing and message delivery.
//!
//! # Module Structure
//!
//! - `cli`: Command-line interface
//! - `telegram`: Bot creation, dispatcher schema, handlers and the Telegram notifier

pub mod cli;
pub mod telegram;

pub use telegram::{create_bot, schema, HandlerDeps, TelegramNotifier};
