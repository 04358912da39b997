mod api;
mod auth;
mod channels;
mod chat;
mod config;
mod credentials;
mod discord;
mod error;
mod logging;
mod platform;
mod prompt;
mod realtime;
mod session;
#[cfg(test)]
mod testing;
mod transcript;
mod tui;

use std::io;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::auth::TokenCache;
use crate::chat::ChatSession;
use crate::config::Config;
use crate::credentials::TerminalPrompt;
use crate::discord::DiscordAuthenticator;
use crate::error::ChordError;
use crate::platform::Platform;
use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "chord",
    version,
    about = "Terminal client for direct messages",
    after_help = "Examples:\n  chord configure --email you@example.com\n  chord list-channels\n  chord chat\n  chord chat --channel 2\n  chord --token <TOKEN> chat -c 0"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true, help = "Account email used to log in")]
    email: Option<String>,

    #[arg(short, long, global = true, help = "Account password used to log in")]
    password: Option<String>,

    #[arg(short, long, global = true, help = "Session token, skips the login")]
    token: Option<String>,

    #[arg(short, long, global = true, help = "Log at debug level")]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(visible_alias = "config", about = "Log in and save the session token")]
    Configure,
    #[command(visible_alias = "ls", about = "List direct-message channels")]
    ListChannels,
    #[command(visible_alias = "tui", about = "Open the chat view for one channel")]
    Chat {
        #[arg(short, long, help = "Index of the channel as shown by list-channels")]
        channel: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ChordError> {
    let cli = Cli::parse();
    let config = Config::load();
    let fullscreen = matches!(cli.command, Command::Chat { .. });
    let log_target = logging::target(config.log_path.as_deref(), fullscreen);
    logging::init(cli.debug, &log_target)
        .map_err(|error| ChordError::Config(format!("failed to set up logging: {error}")))?;

    let cache = TokenCache::new(config.token_path.clone());
    let cached_token = match cli.command {
        Command::Configure => None,
        _ => cache.load_token()?,
    };
    let credential = credentials::resolve(
        cli.email.as_deref(),
        cli.password.as_deref(),
        cli.token.as_deref(),
        cached_token,
        &TerminalPrompt,
    )?;
    debug!(?credential, "resolved credential");

    let authenticator = DiscordAuthenticator::new(&config);
    let mut session = session::open(&credential, &authenticator, &cache).await?;

    run_command(&cli.command, &mut session, &cache).await
}

/// Runs one command and then closes the session, whatever the outcome.
async fn run_command<P: Platform>(
    command: &Command,
    session: &mut Session<P>,
    cache: &TokenCache,
) -> Result<(), ChordError> {
    let outcome = execute(command, session, cache).await;
    finish(&mut session.platform, outcome).await
}

async fn finish<P: Platform>(platform: &mut P, outcome: Result<(), ChordError>) -> Result<(), ChordError> {
    if let Err(error) = platform.close().await {
        warn!(%error, "failed to close session");
    }
    outcome
}

async fn execute<P: Platform>(
    command: &Command,
    session: &mut Session<P>,
    cache: &TokenCache,
) -> Result<(), ChordError> {
    let self_id = session.user.id.clone();

    match command {
        Command::Configure => {
            cache.store_token(session.platform.token())?;
            println!(
                "Logged in as {}. Token saved to {}",
                session.user.display_name(),
                cache.path().display()
            );
        }
        Command::ListChannels => {
            let channels = channels::list(&session.platform).await?;
            channels::write_channels(&mut io::stdout().lock(), &channels, Some(&self_id))?;
        }
        Command::Chat { channel } => {
            let channels = channels::list(&session.platform).await?;
            let selected = channels::resolve(&channels, *channel, Some(&self_id))?;
            let title = format!("DM to {}", selected.recipient_names(Some(&self_id)));

            // Subscribe before loading history; the transcript drops the overlap.
            let mut inbound = session
                .platform
                .open()
                .await
                .map_err(ChordError::platform("failed to open gateway"))?;
            let mut chat = ChatSession::new(&session.platform);
            chat.select(selected).await?;
            tui::run(&mut chat, &mut inbound, title).await?;
        }
    }
    Ok(())
}
