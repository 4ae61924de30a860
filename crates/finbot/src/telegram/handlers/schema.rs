//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChatKind, Message};

use super::callbacks::handle_callback;
use super::commands::handle_command;
use super::messages::handle_text;
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;

/// Creates the dispatcher schema for the bot.
///
/// Commands are matched first, then free text in private chats, then
/// inline button callbacks.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

/// Handler for bot commands (/start, /request, /pending, ...)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);
                handle_command(&bot, &msg, cmd, &deps).await
            }
        },
    ))
}

/// Handler for free text in private chats
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| matches!(msg.chat.kind, ChatKind::Private(_)))
        .filter_map(|msg: Message| msg.text().map(str::to_owned))
        .endpoint(move |bot: Bot, msg: Message, text: String| {
            let deps = deps.clone();
            async move {
                if text.starts_with('/') {
                    bot.send_message(msg.chat.id, "Unknown command. Use /help to see what I can do.")
                        .await?;
                    return Ok(());
                }
                handle_text(&bot, &msg, &text, &deps).await
            }
        })
}

/// Handler for inline keyboard callbacks
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_callback(&bot, &q, &deps).await }
    })
}
