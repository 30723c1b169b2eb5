use clap::{Parser, Subcommand};
use std::sync::Arc;

use twitch_chat_bot::application::errors::BotError;
use twitch_chat_bot::application::events::{BotEvent, EventBus};
use twitch_chat_bot::application::services::{AutoMessageUpdate, BotService};
use twitch_chat_bot::domain::entities::{ConnectionConfig, ConnectionState};
use twitch_chat_bot::infrastructure::adapters::console::ConsoleAdapter;
use twitch_chat_bot::infrastructure::adapters::twitch::ConnectionManager;
use twitch_chat_bot::infrastructure::config::Config;
use twitch_chat_bot::infrastructure::storage::JsonStore;

#[derive(Parser)]
#[command(name = "twitch-chat-bot")]
#[command(about = "Twitch chat commands and timed messages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the channel and answer commands
    Run {
        /// OAuth token (overrides the saved one)
        #[arg(short, long)]
        token: Option<String>,
        /// Channel to join (overrides the saved one)
        #[arg(long)]
        channel: Option<String>,
        /// Start broadcasting auto-messages once connected
        #[arg(short, long)]
        auto_messages: bool,
    },
    /// Save the connection settings
    Login {
        #[arg(short, long)]
        token: String,
        #[arg(long)]
        channel: String,
    },
    /// Manage chat commands
    #[command(subcommand)]
    Command(CommandAction),
    /// Manage auto-messages
    #[command(subcommand)]
    Auto(AutoAction),
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

#[derive(Subcommand)]
enum CommandAction {
    /// Add a command or replace its response
    Add { name: String, response: Vec<String> },
    /// Remove a command
    Remove { name: String },
    /// List commands with usage counters
    List,
}

#[derive(Subcommand)]
enum AutoAction {
    /// Add an auto-message
    Add {
        text: Vec<String>,
        /// Minutes between broadcasts
        #[arg(short, long, default_value_t = 5)]
        interval: u32,
        /// Create it disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Edit an auto-message, keeping its id and statistics
    Edit {
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(short, long)]
        interval: Option<u32>,
    },
    /// Enable or disable an auto-message
    Toggle { id: String },
    /// Remove an auto-message
    Remove { id: String },
    /// List auto-messages
    List,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("twitch-chat-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
        command => {
            let config = match load_config(&cli.config) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(execute(command, config)) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// A missing file means defaults plus environment; a broken one is fatal.
fn load_config(path: &str) -> Result<Config, BotError> {
    if std::path::Path::new(path).exists() {
        Ok(Config::load(path)?)
    } else {
        tracing::info!("No config at {}, using defaults", path);
        Ok(Config::load_env())
    }
}

async fn execute(command: Commands, config: Config) -> Result<(), BotError> {
    let store = Arc::new(JsonStore::new(&config.bot.data_dir));
    if let Err(e) = store.init().await {
        tracing::warn!("Data directory {} unavailable: {}", config.bot.data_dir.display(), e);
    }

    let events = EventBus::default();
    let relay = Arc::new(ConnectionManager::new(config.relay_endpoint(), events.clone()));
    let bot = BotService::new(relay, store, events, config.poll_interval()).await;

    match command {
        Commands::Run { token, channel, auto_messages } => {
            tracing::info!("Starting {}", config.bot.name);
            run_bot(&bot, token, channel, auto_messages).await
        }
        Commands::Login { token, channel } => {
            bot.save_connection_config(&ConnectionConfig::new(token, channel)).await?;
            println!("Connection settings saved.");
            Ok(())
        }
        Commands::Command(action) => command_action(&bot, action).await,
        Commands::Auto(action) => auto_action(&bot, action).await,
        Commands::Version | Commands::InitConfig => Ok(()),
    }
}

async fn run_bot(
    bot: &BotService<ConnectionManager>,
    token: Option<String>,
    channel: Option<String>,
    auto_messages: bool,
) -> Result<(), BotError> {
    let mut settings = bot.connection_config().await;
    if let Some(token) = token {
        settings.token = token;
    }
    if let Some(channel) = channel {
        settings.channel = channel;
    }

    let console = ConsoleAdapter::new(bot.events().clone()).spawn();
    let mut status = bot.events().subscribe();

    bot.connect(Some(settings)).await?;
    if auto_messages {
        if let Err(e) = bot.start_auto_messages().await {
            tracing::warn!("Auto-messages not started: {}", e);
        }
    }

    // Run until Ctrl-C or until the relay drops the session
    let dropped = async {
        loop {
            match status.recv().await {
                Ok(BotEvent::ConnectionChanged { state: ConnectionState::Disconnected }) => break,
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
        _ = dropped => tracing::warn!("Connection lost"),
    }

    bot.disconnect().await;
    console.abort();
    Ok(())
}

async fn command_action(bot: &BotService<ConnectionManager>, action: CommandAction) -> Result<(), BotError> {
    let commands = bot.commands();
    match action {
        CommandAction::Add { name, response } => {
            let command = commands.upsert(&name, &response.join(" ")).await?;
            println!("!{} -> {}", command.name, command.response);
        }
        CommandAction::Remove { name } => {
            let command = commands.remove(&name).await?;
            println!("Removed !{}", command.name);
        }
        CommandAction::List => {
            for command in commands.all().await {
                let marker = if command.is_default { " (built-in)" } else { "" };
                println!(
                    "!{:<20} used {:>5}x  {}{}",
                    command.name, command.usage_count, command.response, marker
                );
            }
        }
    }
    Ok(())
}

async fn auto_action(bot: &BotService<ConnectionManager>, action: AutoAction) -> Result<(), BotError> {
    let messages = bot.auto_messages();
    match action {
        AutoAction::Add { text, interval, disabled } => {
            let message = messages.add(&text.join(" "), interval, !disabled).await?;
            println!("Added {} (every {} min)", message.id, message.interval_minutes);
        }
        AutoAction::Edit { id, text, interval } => {
            let update = AutoMessageUpdate {
                text,
                interval_minutes: interval,
                enabled: None,
            };
            let message = messages.edit(&id, update).await?;
            println!("Updated {}", message.id);
        }
        AutoAction::Toggle { id } => {
            let current = messages
                .get(&id)
                .await
                .ok_or_else(|| BotError::NotFound(format!("auto-message {}", id)))?;
            let message = messages.set_enabled(&id, !current.enabled).await?;
            println!("{} is now {}", message.id, if message.enabled { "enabled" } else { "disabled" });
        }
        AutoAction::Remove { id } => {
            messages.remove(&id).await?;
            println!("Removed {}", id);
        }
        AutoAction::List => {
            for message in messages.all().await {
                println!(
                    "{}  every {:>3} min  {:<8} sent {:>4}x  {}",
                    message.id,
                    message.interval_minutes,
                    if message.enabled { "enabled" } else { "disabled" },
                    message.sent_count,
                    message.text
                );
            }
        }
    }
    Ok(())
}

fn init_config() {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => eprintln!("Failed to render config: {}", e),
    }
}
