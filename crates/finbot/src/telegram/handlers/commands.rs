//! Command handler implementations

use chrono::Utc;
use indoc::indoc;
use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use fincore::analytics::publish_in_background;
use fincore::clients::{account_statement_event, client_lookup_event};
use fincore::core::config;
use fincore::core::models::TicketFilter;
use fincore::core::types::{Identity, Role, TicketStatus};
use fincore::core::validation::{format_rut, validate_client_identifier, validate_rut};
use fincore::intake::IntakeError;
use fincore::notify::Action;
use fincore::storage::message_log::MessageKind;

use super::types::{ensure_user_exists, identity_of, HandlerDeps, HandlerError};
use crate::telegram::bot::{parse_ticket_args, Command};
use crate::telegram::format::{
    account_statement, client_card, identifier_check, intake_error_message, ticket_line, ticket_list,
    MAX_LISTED_TICKETS,
};
use crate::telegram::keyboards::{actions_keyboard, templates_keyboard};

pub(super) async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let actor = identity_of(user);

    match cmd {
        Command::Start => handle_start(bot, msg, deps).await,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
            Ok(())
        }
        Command::Request => handle_request(bot, msg, deps).await,
        Command::Status => handle_status(bot, msg, &actor, deps).await,
        Command::Cancel => {
            let cancelled = deps.machine.cancel(&actor).await;
            let text = if cancelled.anything() {
                "Cancelled. Nothing was submitted."
            } else {
                "There is nothing to cancel."
            };
            bot.send_message(msg.chat.id, text).await?;
            Ok(())
        }
        Command::Pending => handle_pending(bot, msg, &actor, deps).await,
        Command::Assigned => handle_assigned(bot, msg, &actor, deps).await,
        Command::Comment(args) => handle_comment(bot, msg, &actor, &args, false, deps).await,
        Command::Note(args) => handle_comment(bot, msg, &actor, &args, true, deps).await,
        Command::CheckId(value) => {
            bot.send_message(msg.chat.id, identifier_check(&value)).await?;
            Ok(())
        }
        Command::Client(identifier) => handle_client(bot, msg, &actor, &identifier, deps).await,
        Command::Statement(rut) => handle_statement(bot, msg, &actor, &rut, deps).await,
        Command::SetRole(args) => handle_set_role(bot, msg, &args, deps).await,
    }
}

async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let role = msg
        .from
        .as_ref()
        .and_then(|user| ensure_user_exists(deps, user))
        .map(|user| user.role)
        .unwrap_or_default();

    let mut text = String::from(indoc! {"
        👋 Welcome to the finance requests bot.

        Use /request to submit a request and /status to follow it."});
    if role == Role::REVIEWER {
        text.push_str(indoc! {"


            You are on the finance team: /pending lists new requests, /assigned lists yours.
            /client and /statement look up client accounts."});
    }
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_request(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let templates = match deps.machine.templates().active_templates() {
        Ok(templates) => templates,
        Err(e) => {
            log::error!("Failed to load templates: {}", e);
            bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Storage(e))).await?;
            return Ok(());
        }
    };

    if templates.is_empty() {
        bot.send_message(msg.chat.id, "No request types are available right now.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "What kind of request is it?")
        .reply_markup(templates_keyboard(&templates))
        .await?;
    Ok(())
}

async fn handle_status(bot: &Bot, msg: &Message, actor: &Identity, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let text = match deps.machine.tickets().list_by_requester(actor) {
        Ok(tickets) => ticket_list("📋 Your requests:", &tickets, "You have no requests yet. Use /request to create one."),
        Err(e) => intake_error_message(&IntakeError::Storage(e)),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Sends one message per ticket so each carries its own buttons.
async fn send_ticket_cards(
    bot: &Bot,
    msg: &Message,
    tickets: &[fincore::core::models::Ticket],
    action: fn(i64) -> Action,
) -> Result<(), HandlerError> {
    for ticket in tickets.iter().take(MAX_LISTED_TICKETS) {
        bot.send_message(msg.chat.id, ticket_line(ticket))
            .reply_markup(actions_keyboard(&[action(ticket.id), Action::View(ticket.id)]))
            .await?;
    }
    Ok(())
}

async fn require_reviewer(bot: &Bot, msg: &Message, actor: &Identity, deps: &HandlerDeps) -> Result<bool, HandlerError> {
    if deps.is_reviewer(actor) {
        return Ok(true);
    }
    bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Forbidden)).await?;
    Ok(false)
}

async fn handle_pending(bot: &Bot, msg: &Message, actor: &Identity, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_reviewer(bot, msg, actor, deps).await? {
        return Ok(());
    }

    let filter = TicketFilter {
        status: Some(TicketStatus::Pending),
        ..TicketFilter::default()
    };
    match deps.machine.tickets().list_filtered(&filter) {
        Ok(tickets) if tickets.is_empty() => {
            bot.send_message(msg.chat.id, "🎉 No pending requests.").await?;
        }
        Ok(tickets) => {
            bot.send_message(msg.chat.id, format!("⏳ Pending requests: {}", tickets.len())).await?;
            send_ticket_cards(bot, msg, &tickets, Action::Accept).await?;
        }
        Err(e) => {
            bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Storage(e))).await?;
        }
    }
    Ok(())
}

async fn handle_assigned(bot: &Bot, msg: &Message, actor: &Identity, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_reviewer(bot, msg, actor, deps).await? {
        return Ok(());
    }

    let filter = TicketFilter {
        status: Some(TicketStatus::InProgress),
        assignee_id: Some(actor.clone()),
        ..TicketFilter::default()
    };
    match deps.machine.tickets().list_filtered(&filter) {
        Ok(tickets) if tickets.is_empty() => {
            bot.send_message(msg.chat.id, "You have no requests in progress.").await?;
        }
        Ok(tickets) => {
            bot.send_message(msg.chat.id, format!("🔄 Assigned to you: {}", tickets.len())).await?;
            send_ticket_cards(bot, msg, &tickets, Action::Complete).await?;
        }
        Err(e) => {
            bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Storage(e))).await?;
        }
    }
    Ok(())
}

async fn handle_comment(
    bot: &Bot,
    msg: &Message,
    actor: &Identity,
    args: &str,
    internal: bool,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let usage = if internal { "Usage: /note <id> <text>" } else { "Usage: /comment <id> <text>" };
    let Some((ticket_id, text)) = parse_ticket_args(args) else {
        bot.send_message(msg.chat.id, usage).await?;
        return Ok(());
    };

    let is_reviewer = deps.is_reviewer(actor);
    let allowed = match deps.machine.tickets().get(ticket_id) {
        Ok(Some(ticket)) => is_reviewer || (!internal && &ticket.requester_id == actor),
        // Unknown ids fall through so the machine reports them.
        Ok(None) => true,
        Err(e) => {
            bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Storage(e))).await?;
            return Ok(());
        }
    };
    if !allowed {
        bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Forbidden)).await?;
        return Ok(());
    }

    let reply = match deps.machine.add_comment(ticket_id, actor, text, internal).await {
        Ok(comment) => {
            deps.record_message(actor, ticket_id, MessageKind::Comment, &comment.text);
            format!("💬 Comment added to request #{}.", ticket_id)
        }
        Err(e) => intake_error_message(&e),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Finance-team gate shared by the client lookups. Replies and returns `false` when refused.
async fn client_lookup_allowed(bot: &Bot, msg: &Message, actor: &Identity, deps: &HandlerDeps) -> Result<bool, HandlerError> {
    if !require_reviewer(bot, msg, actor, deps).await? {
        return Ok(false);
    }
    if !deps.clients.is_enabled() {
        bot.send_message(msg.chat.id, "Client lookup is not configured.").await?;
        return Ok(false);
    }
    Ok(true)
}

async fn handle_client(
    bot: &Bot,
    msg: &Message,
    actor: &Identity,
    identifier: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /client <RUT or name>").await?;
        return Ok(());
    }
    if let Err(e) = validate_client_identifier(identifier) {
        bot.send_message(msg.chat.id, format!("❌ {}", e)).await?;
        return Ok(());
    }
    if !client_lookup_allowed(bot, msg, actor, deps).await? {
        return Ok(());
    }

    bot.send_message(msg.chat.id, "🔍 Looking up the client...").await?;
    let reply = match deps.clients.find_client(identifier).await {
        Ok(Some(client)) => {
            drop(publish_in_background(
                deps.machine.events(),
                client_lookup_event(actor, identifier, &client),
            ));
            client_card(&client)
        }
        Ok(None) => format!("❌ No client found for: {}", identifier),
        Err(e) => {
            log::error!("Client lookup for {:?} failed: {}", identifier, e);
            "❌ Could not read the client list, please try again later.".to_string()
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_statement(
    bot: &Bot,
    msg: &Message,
    actor: &Identity,
    rut: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let rut = rut.trim();
    if rut.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /statement <RUT>").await?;
        return Ok(());
    }
    if !validate_rut(rut) {
        bot.send_message(msg.chat.id, "❌ That RUT is not valid. Example: /statement 12.345.678-5")
            .await?;
        return Ok(());
    }
    if !client_lookup_allowed(bot, msg, actor, deps).await? {
        return Ok(());
    }

    bot.send_message(msg.chat.id, "📊 Preparing the account statement...").await?;
    let reply = match deps.clients.aging_report(rut).await {
        Ok(Some(report)) => {
            drop(publish_in_background(
                deps.machine.events(),
                account_statement_event(actor, &report),
            ));
            account_statement(&report, Utc::now().date_naive())
        }
        Ok(None) => format!("❌ No open invoices for RUT {}", format_rut(rut)),
        Err(e) => {
            log::error!("Account statement for {} failed: {}", rut, e);
            "❌ Could not read the receivables sheet, please try again later.".to_string()
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_set_role(bot: &Bot, msg: &Message, args: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let caller = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0);
    if !config::admin::is_admin(caller) {
        bot.send_message(msg.chat.id, intake_error_message(&IntakeError::Forbidden)).await?;
        return Ok(());
    }

    let reply = match parse_role_args(args) {
        Some((telegram_id, role)) => match deps.roles.set_role(&Identity::from(telegram_id), role) {
            Ok(()) => {
                log::info!("Admin {} set role of {} to {}", caller, telegram_id, role);
                format!("✅ {} is now {}.", telegram_id, role.display_name())
            }
            Err(e) => intake_error_message(&IntakeError::Storage(e)),
        },
        None => "Usage: /setrole <telegram_id> <requester|finance_team|manager>".to_string(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

fn parse_role_args(args: &str) -> Option<(i64, Role)> {
    let mut parts = args.split_whitespace();
    let telegram_id = parts.next()?.parse().ok()?;
    let role = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((telegram_id, role))
}
