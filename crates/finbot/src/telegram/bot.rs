//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use fincore::core::config;

/// Bot commands with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Finance requests bot. Available commands:")]
pub enum Command {
    #[command(description = "register and show what you can do")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "submit a new finance request")]
    Request,
    #[command(description = "show your recent requests")]
    Status,
    #[command(description = "cancel the form or response you are filling in")]
    Cancel,
    #[command(description = "pending requests (finance team)")]
    Pending,
    #[command(description = "requests assigned to you (finance team)")]
    Assigned,
    #[command(description = "comment on a request: /comment <id> <text>")]
    Comment(String),
    #[command(description = "internal note (finance team): /note <id> <text>")]
    Note(String),
    #[command(description = "check a RUT or client name: /checkid <value>")]
    CheckId(String),
    #[command(description = "client account details (finance team): /client <RUT or name>")]
    Client(String),
    #[command(description = "receivables aging of a client (finance team): /statement <RUT>")]
    Statement(String),
    #[command(description = "change a user's role (admins): /setrole <telegram_id> <role>")]
    SetRole(String),
}

/// Creates a Bot with the configured token and optional custom API URL
///
/// # Returns
/// * `Ok(Bot)` - Bot ready to use
/// * `Err(anyhow::Error)` - Missing token, invalid BOT_API_URL or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = match config::BOT_API_URL.as_deref() {
        Some(raw) => {
            log::info!("Using custom Bot API URL: {}", raw);
            let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Publishes the command list shown in the Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Splits `"<id> <text>"` command arguments.
pub fn parse_ticket_args(args: &str) -> Option<(i64, &str)> {
    let args = args.trim();
    let (id, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let id = id.trim_start_matches('#').parse().ok()?;
    Some((id, rest.trim()))
}
