//! Telegram users and their roles

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::AppResult;
use crate::core::models::{TelegramUser, UserPatch};
use crate::core::types::{Identity, Role};
use crate::intake::traits::RoleDirectory;
use crate::storage::db::{get_connection, DbPool};

const USER_COLUMNS: &str = "telegram_id, username, first_name, last_name, role, is_active, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<TelegramUser> {
    Ok(TelegramUser {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        role: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Profile fields refreshed every time a user talks to the bot.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Registers a user as a requester, or refreshes the profile of a known one.
///
/// The stored role is never changed here.
pub fn ensure_user(conn: &Connection, telegram_id: &Identity, profile: &UserProfile) -> AppResult<TelegramUser> {
    conn.execute(
        "INSERT INTO telegram_users (telegram_id, username, first_name, last_name, role, is_active, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6) \
         ON CONFLICT(telegram_id) DO UPDATE SET \
             username = excluded.username, \
             first_name = excluded.first_name, \
             last_name = excluded.last_name",
        params![
            telegram_id,
            profile.username,
            profile.first_name,
            profile.last_name,
            Role::default(),
            Utc::now(),
        ],
    )?;

    let sql = format!("SELECT {} FROM telegram_users WHERE telegram_id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, params![telegram_id], user_from_row)?)
}

pub fn get_user(conn: &Connection, telegram_id: &Identity) -> AppResult<Option<TelegramUser>> {
    let sql = format!("SELECT {} FROM telegram_users WHERE telegram_id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, params![telegram_id], user_from_row).optional()?)
}

/// Sets a user's role, creating a bare record for ids that never wrote to the bot.
pub fn set_role(conn: &Connection, telegram_id: &Identity, role: Role) -> AppResult<()> {
    conn.execute(
        "INSERT INTO telegram_users (telegram_id, role, is_active, created_at) VALUES (?1, ?2, 1, ?3) \
         ON CONFLICT(telegram_id) DO UPDATE SET role = excluded.role",
        params![telegram_id, role, Utc::now()],
    )?;
    log::info!("Role of user {} set to {}", telegram_id, role);
    Ok(())
}

pub fn set_active(conn: &Connection, telegram_id: &Identity, active: bool) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE telegram_users SET is_active = ?1 WHERE telegram_id = ?2",
        params![active, telegram_id],
    )?;
    Ok(changed > 0)
}

/// Applies a dashboard edit. `Ok(None)` for unknown ids; no record is created.
pub fn update_user(conn: &Connection, telegram_id: &Identity, patch: &UserPatch) -> AppResult<Option<TelegramUser>> {
    let Some(user) = get_user(conn, telegram_id)? else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE telegram_users SET role = ?1, is_active = ?2 WHERE telegram_id = ?3",
        params![
            patch.role.unwrap_or(user.role),
            patch.is_active.unwrap_or(user.is_active),
            telegram_id
        ],
    )?;
    get_user(conn, telegram_id)
}

pub fn users_with_role(conn: &Connection, role: Role) -> AppResult<Vec<TelegramUser>> {
    let sql = format!(
        "SELECT {} FROM telegram_users WHERE role = ?1 AND is_active = 1 ORDER BY created_at, telegram_id",
        USER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![role], user_from_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Every known user, inactive ones included, oldest first.
pub fn all_users(conn: &Connection) -> AppResult<Vec<TelegramUser>> {
    let sql = format!("SELECT {} FROM telegram_users ORDER BY created_at, telegram_id", USER_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], user_from_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// [`RoleDirectory`] backed by `telegram_users`.
#[derive(Clone)]
pub struct SqliteRoleDirectory {
    pool: DbPool,
}

impl SqliteRoleDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn ensure_user(&self, telegram_id: &Identity, profile: &UserProfile) -> AppResult<TelegramUser> {
        let conn = get_connection(&self.pool)?;
        ensure_user(&conn, telegram_id, profile)
    }

    pub fn get_user(&self, telegram_id: &Identity) -> AppResult<Option<TelegramUser>> {
        let conn = get_connection(&self.pool)?;
        get_user(&conn, telegram_id)
    }

    pub fn set_role(&self, telegram_id: &Identity, role: Role) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        set_role(&conn, telegram_id, role)
    }

    pub fn update_user(&self, telegram_id: &Identity, patch: &UserPatch) -> AppResult<Option<TelegramUser>> {
        let conn = get_connection(&self.pool)?;
        update_user(&conn, telegram_id, patch)
    }

    pub fn all_users(&self) -> AppResult<Vec<TelegramUser>> {
        let conn = get_connection(&self.pool)?;
        all_users(&conn)
    }

    /// Grants `role` to every id in the list.
    pub fn grant_all(&self, ids: &[i64], role: Role) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        for id in ids {
            set_role(&conn, &Identity::from(*id), role)?;
        }
        Ok(ids.len())
    }
}

impl RoleDirectory for SqliteRoleDirectory {
    fn has_role(&self, identity: &Identity, role: Role) -> AppResult<bool> {
        let conn = get_connection(&self.pool)?;
        Ok(get_user(&conn, identity)?.is_some_and(|user| user.is_active && user.role == role))
    }

    fn members(&self, role: Role) -> AppResult<Vec<Identity>> {
        let conn = get_connection(&self.pool)?;
        Ok(users_with_role(&conn, role)?
            .into_iter()
            .map(|user| user.telegram_id)
            .collect())
    }
}
