//! Inline keyboards and their callback data
//!
//! Callback data is `tpl:<id>` for template selection and
//! `tk:<accept|view|complete|cancel>:<id>` for ticket actions.

use std::fmt;
use std::str::FromStr;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use fincore::core::models::{Template, Ticket};
use fincore::core::types::{Identity, TicketStatus};
use fincore::notify::Action;

/// Decoded callback button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    SelectTemplate(i64),
    Ticket(Action),
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::SelectTemplate(id) => write!(f, "tpl:{}", id),
            CallbackAction::Ticket(action) => {
                let verb = match action {
                    Action::Accept(_) => "accept",
                    Action::View(_) => "view",
                    Action::Complete(_) => "complete",
                    Action::Cancel(_) => "cancel",
                };
                write!(f, "tk:{}:{}", verb, action.ticket_id())
            }
        }
    }
}

impl FromStr for CallbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_id = |raw: &str| raw.parse::<i64>().map_err(|_| format!("Bad id in callback data: {}", s));

        match s.split(':').collect::<Vec<_>>().as_slice() {
            ["tpl", id] => Ok(CallbackAction::SelectTemplate(parse_id(id)?)),
            ["tk", verb, id] => {
                let id = parse_id(id)?;
                let action = match *verb {
                    "accept" => Action::Accept(id),
                    "view" => Action::View(id),
                    "complete" => Action::Complete(id),
                    "cancel" => Action::Cancel(id),
                    other => return Err(format!("Unknown ticket action: {}", other)),
                };
                Ok(CallbackAction::Ticket(action))
            }
            _ => Err(format!("Unknown callback data: {}", s)),
        }
    }
}

/// One button per template, one per row.
pub fn templates_keyboard(templates: &[Template]) -> InlineKeyboardMarkup {
    let rows = templates
        .iter()
        .map(|template| {
            vec![InlineKeyboardButton::callback(
                format!("{} {}", template.category.emoji(), template.name),
                CallbackAction::SelectTemplate(template.id).to_string(),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// All actions on a single row.
pub fn actions_keyboard(actions: &[Action]) -> InlineKeyboardMarkup {
    let row = actions
        .iter()
        .map(|action| InlineKeyboardButton::callback(action.label(), CallbackAction::Ticket(*action).to_string()))
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

/// Actions the viewer may take on a ticket in its current status.
pub fn ticket_actions(ticket: &Ticket, viewer: &Identity, is_reviewer: bool) -> Vec<Action> {
    let mut actions = Vec::new();
    if is_reviewer {
        match ticket.status {
            TicketStatus::Pending => actions.push(Action::Accept(ticket.id)),
            TicketStatus::InProgress => actions.push(Action::Complete(ticket.id)),
            _ => {}
        }
    }
    if !ticket.status.is_terminal() && (is_reviewer || &ticket.requester_id == viewer) {
        actions.push(Action::Cancel(ticket.id));
    }
    actions
}
