//! Audit log of bot messages tied to tickets

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::core::error::AppResult;
use crate::core::types::Identity;

/// Kind of a logged bot message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TicketCreated,
    TicketAccepted,
    TicketCompleted,
    TicketCancelled,
    Comment,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::TicketCreated => "ticket_created",
            MessageKind::TicketAccepted => "ticket_accepted",
            MessageKind::TicketCompleted => "ticket_completed",
            MessageKind::TicketCancelled => "ticket_cancelled",
            MessageKind::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedMessage {
    pub id: i64,
    pub telegram_id: Identity,
    pub ticket_id: Option<i64>,
    pub message_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub fn log_message(
    conn: &Connection,
    telegram_id: &Identity,
    ticket_id: Option<i64>,
    kind: MessageKind,
    content: &str,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO message_log (telegram_id, ticket_id, message_type, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![telegram_id, ticket_id, kind.as_str(), content, Utc::now()],
    )?;
    Ok(())
}

pub fn messages_for_ticket(conn: &Connection, ticket_id: i64) -> AppResult<Vec<LoggedMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, telegram_id, ticket_id, message_type, content, created_at FROM message_log \
         WHERE ticket_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![ticket_id], |row| {
        Ok(LoggedMessage {
            id: row.get(0)?,
            telegram_id: row.get(1)?,
            ticket_id: row.get(2)?,
            message_type: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}
