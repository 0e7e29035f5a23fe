//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use gatectl_core::config::Config;
use gatectl_core::{interrupt, logging};

mod commands;
mod console;
mod prompt;

use console::Console;

#[derive(Parser)]
#[command(name = "gatectl")]
#[command(version)]
#[command(about = "Gateway admin console for the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging to stderr (also enabled by GATECTL_DEBUG=true)
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    #[command(flatten)]
    Session(SessionCommands),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that run against a live session.
#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Sign in to the gateway
    Login {
        /// Username (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,

        /// Read the password from stdin instead of prompting
        #[arg(long)]
        password_stdin: bool,

        /// Sign in again even if a session is active
        #[arg(long)]
        force: bool,
    },

    /// Sign out and erase stored credentials
    Logout,

    /// Show the signed-in user and gateway
    Status,

    /// Exchange the refresh token for a new token pair
    Refresh,

    /// Browse the plugin catalogue
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Keep the session alive until Ctrl+C
    Watch,
}

#[derive(clap::Subcommand)]
enum PluginCommands {
    /// Lists available plugins
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Shows one plugin
    Show {
        /// Plugin id or name
        #[arg(value_name = "ID")]
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("load config")?;

    let _log_guard = match logging::init(cli.debug || config.app.debug) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli.command, config).await })
}

async fn dispatch(command: Commands, config: Config) -> Result<()> {
    let command = match command {
        Commands::Config { command } => {
            return match command {
                ConfigCommands::Path => {
                    commands::config::path();
                    Ok(())
                }
                ConfigCommands::Init => commands::config::init(),
                ConfigCommands::Generate => commands::config::generate(),
            };
        }
        Commands::Session(command) => command,
    };

    let console = Console::open(config)?;

    match command {
        SessionCommands::Login {
            username,
            password_stdin,
            force,
        } => commands::auth::login(&console, username, password_stdin, force).await,
        SessionCommands::Logout => commands::auth::logout(&console).await,
        SessionCommands::Status => commands::status::run(&console).await,
        SessionCommands::Refresh => commands::auth::refresh(&console).await,
        SessionCommands::Plugins { command } => match command {
            PluginCommands::List { json } => commands::plugins::list(&console, json).await,
            PluginCommands::Show { id, json } => {
                commands::plugins::show(&console, &id, json).await
            }
        },
        SessionCommands::Watch => commands::watch::run(&console).await,
    }
}
