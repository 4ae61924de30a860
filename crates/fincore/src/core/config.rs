use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: finance.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "finance.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: finbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "finbot.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (local telegram-bot-api)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok().filter(|s| !s.is_empty()));

/// Dashboard API port
/// Read from WEB_PORT environment variable, 0 disables the server
/// Default: 3000
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEB_PORT")
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(3000)
});

/// Splits a comma/space separated list of numeric Telegram ids.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split([',', ' ', '\n', '\t'])
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// Administrator configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    /// Admins may change user roles with /setrole
    pub static ADMIN_IDS: Lazy<Vec<i64>> =
        Lazy::new(|| env::var("ADMIN_IDS").map(|raw| super::parse_id_list(&raw)).unwrap_or_default());

    /// Telegram ids granted the reviewer role at startup
    /// Read from REVIEWER_IDS environment variable
    pub static REVIEWER_IDS: Lazy<Vec<i64>> =
        Lazy::new(|| env::var("REVIEWER_IDS").map(|raw| super::parse_id_list(&raw)).unwrap_or_default());

    pub fn is_admin(user_id: i64) -> bool {
        ADMIN_IDS.contains(&user_id)
    }
}

/// Analytics event endpoint configuration
pub mod analytics {
    use once_cell::sync::Lazy;
    use std::env;

    /// Base URL of the event collector, `/events` is appended
    /// Read from ANALYTICS_API_URL environment variable
    pub static API_URL: Lazy<Option<String>> =
        Lazy::new(|| env::var("ANALYTICS_API_URL").ok().filter(|s| !s.is_empty()));

    /// Bearer token for the event collector
    /// Read from ANALYTICS_API_KEY environment variable
    pub static API_KEY: Lazy<Option<String>> =
        Lazy::new(|| env::var("ANALYTICS_API_KEY").ok().filter(|s| !s.is_empty()));

    /// Value of the `source` field on every published event
    pub const EVENT_SOURCE: &str = "finance_request_bot";
}

/// Client and receivables spreadsheets
pub mod sheets {
    use once_cell::sync::Lazy;
    use std::env;

    /// Google Sheets API base URL
    /// Read from SHEETS_API_URL environment variable
    /// Default: https://sheets.googleapis.com/
    pub static API_URL: Lazy<String> = Lazy::new(|| {
        env::var("SHEETS_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "https://sheets.googleapis.com/".to_string())
    });

    /// API key with read access to both sheets
    /// Read from SHEETS_API_KEY environment variable
    pub static API_KEY: Lazy<Option<String>> =
        Lazy::new(|| env::var("SHEETS_API_KEY").ok().filter(|s| !s.is_empty()));

    /// Spreadsheet with one row per client
    /// Read from CLIENT_SHEET_ID environment variable
    pub static CLIENT_SHEET_ID: Lazy<Option<String>> =
        Lazy::new(|| env::var("CLIENT_SHEET_ID").ok().filter(|s| !s.is_empty()));

    /// Spreadsheet with one row per open invoice
    /// Read from AGING_SHEET_ID environment variable
    pub static AGING_SHEET_ID: Lazy<Option<String>> =
        Lazy::new(|| env::var("AGING_SHEET_ID").ok().filter(|s| !s.is_empty()));

    /// RUT, name, email, phone, address, contact, credit limit, payment terms, status
    pub const CLIENT_RANGE: &str = "Clientes!A:I";

    /// RUT, name, invoice, issued, due, amount, balance, days overdue, status
    pub const AGING_RANGE: &str = "Aging!A:J";
}

/// Intake form limits
pub mod form {
    /// Maximum title length in characters
    pub const MAX_TITLE_CHARS: usize = 200;

    /// Maximum description length in characters
    pub const MAX_DESCRIPTION_CHARS: usize = 4000;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for outbound HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Database pool configuration
pub mod database {
    use super::Duration;

    /// Maximum number of pooled SQLite connections
    pub const MAX_POOL_SIZE: u32 = 10;

    /// How long a writer waits on a locked database (in seconds)
    pub const BUSY_TIMEOUT_SECS: u64 = 5;

    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}
