//! Free-text routing: completion responses and intake form answers

use teloxide::prelude::*;
use teloxide::types::Message;

use fincore::intake::Progress;
use fincore::storage::message_log::MessageKind;

use super::types::{identity_of, HandlerDeps, HandlerError};
use crate::telegram::format::intake_error_message;

/// A reviewer with a pending completion intent is answering that ticket;
/// everybody else is filling in their form. Text without a session is dropped.
pub(super) async fn handle_text(bot: &Bot, msg: &Message, text: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let actor = identity_of(user);

    if deps.machine.pending_completion(&actor).is_some() {
        let reply = match deps.machine.complete_ticket(&actor, text).await {
            Ok(outcome) => {
                let ticket = &outcome.value;
                deps.record_message(&ticket.requester_id, ticket.id, MessageKind::TicketCompleted, text);
                format!("✅ Request #{} completed, the requester has been notified.", ticket.id)
            }
            Err(e) => intake_error_message(&e),
        };
        bot.send_message(msg.chat.id, reply).await?;
        return Ok(());
    }

    match deps.machine.submit_text(&actor, text).await {
        Ok(outcome) => match outcome.value {
            Progress::Ignored | Progress::AwaitingDescription => {}
            Progress::Created(ticket) => {
                deps.record_message(&actor, ticket.id, MessageKind::TicketCreated, &ticket.title);
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "📨 Request #{} submitted. The finance team has been notified.\nUse /status to follow it.",
                        ticket.id
                    ),
                )
                .await?;
            }
        },
        Err(e) => {
            bot.send_message(msg.chat.id, intake_error_message(&e)).await?;
        }
    }
    Ok(())
}
