use std::path::PathBuf;

use anyhow::{Context, Result};
use chatvars_cli::cli::protocol::TargetArgs;
use chatvars_cli::cli::runner::{update_settings, SettingsUpdate};
use chatvars_cli::cli::{run_command, CliCommand, CliConfig};
use chatvars_cli::tracing_setup::init_tracing;
use chatvars_core::commands::help;
use chatvars_core::constants::commands;
use chatvars_core::SettingsStorage;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatvars")]
#[command(about = "Message-bound chat variables")]
struct Cli {
    /// Chat file (JSONL: header line, then one message per line)
    #[arg(long)]
    chat: Option<PathBuf>,

    /// Settings file (defaults to the user's config directory)
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,

    /// Path to JSON config file (contains chatPath, settingsPath, pretty)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct Target {
    /// Message index; negative counts from the end
    #[arg(long, allow_negative_numbers = true)]
    mes: Option<i64>,

    /// Only count messages matching this expression, e.g. `is_user && name == "Alice"`
    #[arg(long)]
    filter: Option<String>,
}

impl From<Target> for TargetArgs {
    fn from(target: Target) -> Self {
        TargetArgs {
            mes: target.mes,
            filter: target.filter,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = commands::SET, about = help(commands::SET))]
    Set {
        #[arg(long)]
        key: Option<String>,
        /// Index into a JSON list or dictionary stored in the variable
        #[arg(long)]
        index: Option<String>,
        /// Parse VALUE as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        target: Target,
        value: String,
    },

    #[command(name = commands::GET, about = help(commands::GET))]
    Get {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        index: Option<String>,
        #[command(flatten)]
        target: Target,
        /// Key, when --key is not given
        unnamed: Option<String>,
    },

    #[command(name = commands::GET_ALL, about = help(commands::GET_ALL))]
    GetAll {
        #[command(flatten)]
        target: Target,
        /// Message index, when --mes is not given
        #[arg(allow_negative_numbers = true)]
        unnamed: Option<String>,
    },

    #[command(name = commands::DELETE, about = help(commands::DELETE))]
    Delete {
        #[arg(long)]
        key: Option<String>,
        #[command(flatten)]
        target: Target,
        /// Key, when --key is not given
        unnamed: Option<String>,
    },

    /// Keep chat metadata mirrored to the newest message's variables until Ctrl-C
    Watch,

    /// Show the stored settings, updating any that are given
    Settings {
        /// Mirror the newest message's variables into chat metadata
        #[arg(long)]
        mirror: Option<bool>,
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        #[arg(long)]
        save_debounce_ms: Option<u64>,
    },
}

/// What a parsed command line asks for
enum Invocation {
    Chat(CliCommand),
    Settings(SettingsUpdate),
}

impl From<Commands> for Invocation {
    fn from(command: Commands) -> Self {
        Invocation::Chat(match command {
            Commands::Set {
                key,
                index,
                json,
                target,
                value,
            } => CliCommand::Set {
                key,
                value,
                index,
                json,
                target: target.into(),
            },
            Commands::Get {
                key,
                index,
                target,
                unnamed,
            } => CliCommand::Get {
                key,
                index,
                target: target.into(),
                unnamed,
            },
            Commands::GetAll { target, unnamed } => CliCommand::GetAll {
                target: target.into(),
                unnamed,
            },
            Commands::Delete {
                key,
                target,
                unnamed,
            } => CliCommand::Delete {
                key,
                target: target.into(),
                unnamed,
            },
            Commands::Watch => CliCommand::Watch,
            Commands::Settings {
                mirror,
                poll_interval_ms,
                save_debounce_ms,
            } => {
                return Invocation::Settings(SettingsUpdate {
                    mirror,
                    poll_interval_ms,
                    save_debounce_ms,
                })
            }
        })
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    // Priority: flags > --config file > default config file
    let config = match cli.config {
        Some(ref path) => CliConfig::load(path)?,
        None => CliConfig::load_default()?,
    };

    let pretty = cli.pretty || config.pretty;
    let settings_path = cli
        .settings
        .or(config.settings_path)
        .or_else(SettingsStorage::default_path)
        .context("No settings path; pass --settings")?;
    let storage = SettingsStorage::load(&settings_path);

    let command = match Invocation::from(cli.command) {
        Invocation::Settings(update) => return update_settings(&storage, update, pretty),
        Invocation::Chat(command) => command,
    };

    let chat_path = cli
        .chat
        .or(config.chat_path)
        .context("No chat file given; pass --chat or set chatPath in the config")?;

    run_command(command, &chat_path, storage.settings(), pretty).await
}
