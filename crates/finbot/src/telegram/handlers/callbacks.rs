//! Inline button callbacks

use teloxide::prelude::*;
use teloxide::types::ChatId;

use fincore::core::types::Identity;
use fincore::intake::{Entity, IntakeError};
use fincore::notify::Action;
use fincore::storage::message_log::MessageKind;

use super::types::{identity_of, HandlerDeps, HandlerError};
use crate::telegram::format::{intake_error_message, ticket_details};
use crate::telegram::keyboards::{actions_keyboard, ticket_actions, CallbackAction};

pub(super) async fn handle_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    // Stops the client spinner whatever happens next.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let action = match data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            log::warn!("Ignoring callback from {}: {}", q.from.id, e);
            return Ok(());
        }
    };

    let actor = identity_of(&q.from);
    // Replies go to the private chat with the user who pressed the button.
    let chat = ChatId::from(q.from.id);
    log::debug!("Callback {} from {}", action, actor);

    let reply = match action {
        CallbackAction::SelectTemplate(template_id) => match deps.machine.select_template(&actor, template_id).await {
            // The machine sends the first prompt itself.
            Ok(_) => None,
            Err(e) => Some(intake_error_message(&e)),
        },
        CallbackAction::Ticket(Action::Accept(ticket_id)) => match deps.machine.accept_ticket(&actor, ticket_id).await {
            Ok(outcome) => {
                deps.record_message(&outcome.value.requester_id, ticket_id, MessageKind::TicketAccepted, &outcome.value.title);
                bot.send_message(chat, format!("🔄 You accepted request #{}.", ticket_id))
                    .reply_markup(actions_keyboard(&[Action::Complete(ticket_id), Action::View(ticket_id)]))
                    .await?;
                None
            }
            Err(e) => Some(intake_error_message(&e)),
        },
        CallbackAction::Ticket(Action::Complete(ticket_id)) => {
            match deps.machine.begin_completion(&actor, ticket_id).await {
                Ok(_) => None,
                Err(e) => Some(intake_error_message(&e)),
            }
        }
        CallbackAction::Ticket(Action::Cancel(ticket_id)) => match deps.machine.cancel_ticket(&actor, ticket_id).await {
            Ok(outcome) => {
                deps.record_message(&outcome.value.requester_id, ticket_id, MessageKind::TicketCancelled, &outcome.value.title);
                Some(format!("❌ Request #{} cancelled.", ticket_id))
            }
            Err(e) => Some(intake_error_message(&e)),
        },
        CallbackAction::Ticket(Action::View(ticket_id)) => {
            show_ticket(bot, chat, &actor, ticket_id, deps).await?;
            None
        }
    };

    if let Some(text) = reply {
        bot.send_message(chat, text).await?;
    }
    Ok(())
}

/// Ticket card with the actions the viewer may take. Internal comments only
/// for reviewers.
async fn show_ticket(
    bot: &Bot,
    chat: ChatId,
    viewer: &Identity,
    ticket_id: i64,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let is_reviewer = deps.is_reviewer(viewer);
    let loaded = deps.machine.tickets().get(ticket_id).map_err(IntakeError::from).and_then(|ticket| {
        let ticket = ticket.ok_or(IntakeError::NotFound(Entity::Ticket))?;
        if !is_reviewer && &ticket.requester_id != viewer {
            return Err(IntakeError::Forbidden);
        }
        let comments = deps.machine.tickets().list_comments(ticket_id, is_reviewer)?;
        Ok((ticket, comments))
    });

    match loaded {
        Ok((ticket, comments)) => {
            let actions = ticket_actions(&ticket, viewer, is_reviewer);
            let request = bot.send_message(chat, ticket_details(&ticket, &comments));
            if actions.is_empty() {
                request.await?;
            } else {
                request.reply_markup(actions_keyboard(&actions)).await?;
            }
        }
        Err(e) => {
            bot.send_message(chat, intake_error_message(&e)).await?;
        }
    }
    Ok(())
}
