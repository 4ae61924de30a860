use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

use finbot::cli::{Cli, Commands};
use finbot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramNotifier};
use fincore::analytics::sink_from_env;
use fincore::clients::directory_from_env;
use fincore::core::web_server::{start_web_server, WebState};
use fincore::core::{config, init_logger, log_startup_configuration};
use fincore::intake::{InMemorySessionStore, IntakeMachine};
use fincore::storage::{create_pool, DbPool, SqliteRoleDirectory, SqliteTemplateCatalog, SqliteTicketRepository};
use fincore::Role;

/// Main entry point
///
/// Parses CLI arguments and dispatches to the matching subcommand; no
/// subcommand runs the bot.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load .env before any config static is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command.unwrap_or(Commands::Run { no_web: false }) {
        Commands::Run { no_web } => run_bot(no_web).await,
        Commands::SeedTemplates => seed_templates(),
        Commands::GrantRole { telegram_id, role } => grant_role(telegram_id, &role),
    }
}

fn open_database() -> Result<DbPool> {
    create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))
}

fn seed_templates() -> Result<()> {
    let catalog = SqliteTemplateCatalog::new(open_database()?);
    let inserted = catalog.seed_default_templates()?;
    if inserted == 0 {
        log::info!("Template catalog already populated, nothing seeded");
    } else {
        log::info!("Seeded {} default templates", inserted);
    }
    Ok(())
}

fn grant_role(telegram_id: i64, role: &str) -> Result<()> {
    let role: Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let roles = SqliteRoleDirectory::new(open_database()?);
    roles.grant_all(&[telegram_id], role)?;
    log::info!("User {} is now {}", telegram_id, role);
    Ok(())
}

async fn run_bot(no_web: bool) -> Result<()> {
    log::info!("Starting finbot...");
    log_startup_configuration();

    let db_pool = open_database()?;

    let templates = Arc::new(SqliteTemplateCatalog::new(db_pool.clone()));
    let seeded = templates.seed_default_templates()?;
    if seeded > 0 {
        log::info!("Seeded {} default templates", seeded);
    }

    let roles = Arc::new(SqliteRoleDirectory::new(db_pool.clone()));
    if !config::admin::REVIEWER_IDS.is_empty() {
        let granted = roles.grant_all(&config::admin::REVIEWER_IDS, Role::REVIEWER)?;
        log::info!("Granted the reviewer role to {} users from REVIEWER_IDS", granted);
    }

    let tickets = Arc::new(SqliteTicketRepository::new(db_pool.clone()));

    let bot = create_bot()?;
    let me = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let machine = Arc::new(
        IntakeMachine::new(
            Arc::new(InMemorySessionStore::new()),
            tickets,
            templates.clone(),
            roles.clone(),
            Arc::new(TelegramNotifier::new(bot.clone())),
        )
        .with_event_sink(sink_from_env()),
    );

    let port = *config::WEB_PORT;
    if no_web || port == 0 {
        log::info!("Dashboard API disabled");
    } else {
        let state = WebState {
            machine: machine.clone(),
            templates: templates.clone(),
            users: roles.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = start_web_server(port, state).await {
                log::error!("Dashboard API stopped: {}", e);
            }
        });
    }

    let deps = HandlerDeps::new(Arc::new(db_pool), machine, templates, roles, directory_from_env());

    log::info!("📡 Ready to receive updates (long polling)");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .default_handler(|update| async move {
            log::debug!("Unhandled update: {:?}", update.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("An error has occurred in the dispatcher"))
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
