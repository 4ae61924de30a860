use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "finbot")]
#[command(author, version, about = "Telegram bot for submitting and triaging finance requests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot (default)
    Run {
        /// Do not start the dashboard API
        #[arg(long)]
        no_web: bool,
    },

    /// Insert the default request templates if the catalog is empty
    SeedTemplates,

    /// Set the role of a Telegram user
    GrantRole {
        /// Numeric Telegram user id
        telegram_id: i64,

        /// requester, finance_team or manager
        role: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
