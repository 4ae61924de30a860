use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::core::config::database;
use crate::core::error::{AppError, AppResult};
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Every pooled connection enables foreign keys and waits on a locked database
/// instead of failing immediately. Schema migrations run once on the first
/// connection before the pool is handed out.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use fincore::storage::db;
///
/// let pool = db::create_pool("finance.sqlite")?;
/// # Ok::<(), fincore::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(database::busy_timeout())?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    let pool = Pool::builder().max_size(database::MAX_POOL_SIZE).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn).map_err(|e| AppError::Migration(format!("{:#}", e)))?;

    log::info!("Database ready at {}", database_path);
    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> AppResult<DbConnection> {
    Ok(pool.get()?)
}
