use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};

use crate::core::config::database;

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies pending embedded migrations.
///
/// Runs are serialized per process; refinery wraps each migration in its own
/// transaction, so a failed migration leaves earlier ones applied.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    conn.busy_timeout(database::busy_timeout())
        .context("set SQLite busy timeout")?;

    let report = embedded::migrations::runner().run(conn).context("apply migrations")?;
    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(())
}
