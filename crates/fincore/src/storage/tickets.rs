//! Ticket and comment persistence

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::core::error::{AppError, AppResult};
use crate::core::models::{Comment, NewTicket, RequestData, Ticket, TicketFilter, TicketPatch, TicketStats};
use crate::core::types::{Identity, TicketStatus};
use crate::intake::traits::TicketRepository;
use crate::storage::db::{get_connection, DbPool};

const TICKET_COLUMNS: &str = "id, template_id, title, description, category, priority, status, requester_id, \
     assignee_id, request_data, response, estimated_time_hours, created_at, updated_at, completed_at";

const COMMENT_COLUMNS: &str = "id, ticket_id, author_id, text, is_internal, created_at";

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let raw_data: String = row.get(9)?;
    let request_data: RequestData = serde_json::from_str(&raw_data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    Ok(Ticket {
        id: row.get(0)?,
        template_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        requester_id: row.get(7)?,
        assignee_id: row.get(8)?,
        request_data,
        response: row.get(10)?,
        estimated_time_hours: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        completed_at: row.get(14)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        author_id: row.get(2)?,
        text: row.get(3)?,
        is_internal: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Inserts a ticket with status `pending` and returns the stored row.
pub fn create_ticket(conn: &Connection, ticket: &NewTicket) -> AppResult<Ticket> {
    let now = Utc::now();
    let request_data = serde_json::to_string(&ticket.request_data)?;

    conn.execute(
        "INSERT INTO tickets (template_id, title, description, category, priority, status, requester_id, \
         request_data, estimated_time_hours, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            ticket.template_id,
            ticket.title,
            ticket.description,
            ticket.category,
            ticket.priority,
            TicketStatus::Pending,
            ticket.requester_id,
            request_data,
            ticket.estimated_time_hours,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_ticket(conn, id)?.ok_or(AppError::Database(rusqlite::Error::QueryReturnedNoRows))
}

pub fn get_ticket(conn: &Connection, id: i64) -> AppResult<Option<Ticket>> {
    let sql = format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS);
    Ok(conn.query_row(&sql, params![id], ticket_from_row).optional()?)
}

/// Applies a partial update inside one immediate transaction.
///
/// A status change must satisfy [`TicketStatus::can_transition_to`]. The
/// completion timestamp is written only while it is still NULL.
pub fn update_ticket(conn: &mut Connection, id: i64, patch: &TicketPatch) -> AppResult<Option<Ticket>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(current) = get_ticket(&tx, id)? else {
        return Ok(None);
    };

    if let Some(next) = patch.status {
        if !current.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
    }

    let now = Utc::now();
    let completed_at = match (current.completed_at, patch.status) {
        (None, Some(TicketStatus::Completed)) => Some(now),
        (existing, _) => existing,
    };

    tx.execute(
        "UPDATE tickets SET \
             title = COALESCE(?1, title), \
             description = COALESCE(?2, description), \
             priority = COALESCE(?3, priority), \
             status = COALESCE(?4, status), \
             assignee_id = COALESCE(?5, assignee_id), \
             response = COALESCE(?6, response), \
             updated_at = ?7, \
             completed_at = ?8 \
         WHERE id = ?9",
        params![
            patch.title,
            patch.description,
            patch.priority,
            patch.status,
            patch.assignee_id,
            patch.response,
            now,
            completed_at,
            id,
        ],
    )?;

    let updated = get_ticket(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

/// Lists tickets matching all set predicates, newest first.
pub fn list_tickets(conn: &Connection, filter: &TicketFilter) -> AppResult<Vec<Ticket>> {
    let sql = format!(
        "SELECT {} FROM tickets \
         WHERE (?1 IS NULL OR status = ?1) \
           AND (?2 IS NULL OR priority = ?2) \
           AND (?3 IS NULL OR category = ?3) \
           AND (?4 IS NULL OR assignee_id = ?4) \
           AND (?5 IS NULL OR requester_id = ?5) \
         ORDER BY created_at DESC, id DESC",
        TICKET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            filter.status,
            filter.priority,
            filter.category,
            filter.assignee_id,
            filter.requester_id,
        ],
        ticket_from_row,
    )?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row?);
    }
    Ok(tickets)
}

pub fn add_comment(conn: &Connection, ticket_id: i64, author: &Identity, text: &str, internal: bool) -> AppResult<Comment> {
    conn.execute(
        "INSERT INTO ticket_comments (ticket_id, author_id, text, is_internal, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![ticket_id, author, text, internal, Utc::now()],
    )?;

    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {} FROM ticket_comments WHERE id = ?1", COMMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], comment_from_row)?)
}

pub fn list_comments(conn: &Connection, ticket_id: i64, include_internal: bool) -> AppResult<Vec<Comment>> {
    let sql = format!(
        "SELECT {} FROM ticket_comments WHERE ticket_id = ?1 AND (?2 OR is_internal = 0) ORDER BY created_at, id",
        COMMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![ticket_id, include_internal], comment_from_row)?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

fn grouped_counts(conn: &Connection, column: &str) -> AppResult<Vec<(String, u64)>> {
    let sql = format!("SELECT {0}, COUNT(*) FROM tickets GROUP BY {0}", column);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        let (key, count) = row?;
        counts.push((key, u64::try_from(count).unwrap_or_default()));
    }
    Ok(counts)
}

/// Aggregate counters over all tickets.
pub fn ticket_stats(conn: &Connection) -> AppResult<TicketStats> {
    let mut stats = TicketStats::default();

    for (status, count) in grouped_counts(conn, "status")? {
        stats.total += count;
        match status.parse::<TicketStatus>() {
            Ok(TicketStatus::Pending) => stats.pending = count,
            Ok(TicketStatus::InProgress) => stats.in_progress = count,
            Ok(TicketStatus::Completed) => stats.completed = count,
            Ok(TicketStatus::Cancelled) => stats.cancelled = count,
            Err(e) => log::warn!("Skipping unknown status in stats: {}", e),
        }
    }

    stats.by_category = grouped_counts(conn, "category")?.into_iter().collect();
    stats.by_priority = grouped_counts(conn, "priority")?.into_iter().collect();
    Ok(stats)
}

/// [`TicketRepository`] over the shared SQLite pool.
#[derive(Clone)]
pub struct SqliteTicketRepository {
    pool: DbPool,
}

impl SqliteTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl TicketRepository for SqliteTicketRepository {
    fn create(&self, ticket: NewTicket) -> AppResult<Ticket> {
        let conn = get_connection(&self.pool)?;
        create_ticket(&conn, &ticket)
    }

    fn get(&self, id: i64) -> AppResult<Option<Ticket>> {
        let conn = get_connection(&self.pool)?;
        get_ticket(&conn, id)
    }

    fn update(&self, id: i64, patch: &TicketPatch) -> AppResult<Option<Ticket>> {
        let mut conn = get_connection(&self.pool)?;
        update_ticket(&mut conn, id, patch)
    }

    fn list_filtered(&self, filter: &TicketFilter) -> AppResult<Vec<Ticket>> {
        let conn = get_connection(&self.pool)?;
        list_tickets(&conn, filter)
    }

    fn add_comment(&self, ticket_id: i64, author: &Identity, text: &str, internal: bool) -> AppResult<Comment> {
        let conn = get_connection(&self.pool)?;
        add_comment(&conn, ticket_id, author, text, internal)
    }

    fn list_comments(&self, ticket_id: i64, include_internal: bool) -> AppResult<Vec<Comment>> {
        let conn = get_connection(&self.pool)?;
        list_comments(&conn, ticket_id, include_internal)
    }

    fn stats(&self) -> AppResult<TicketStats> {
        let conn = get_connection(&self.pool)?;
        ticket_stats(&conn)
    }
}
