//! Radiochat terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local server
//! radiochat --name Alice
//!
//! # Another server, verbose logs
//! CHAT_URL=ws://radio.example:3000/chat radiochat --log-level debug
//! ```
//!
//! Chat output goes to stdout and logs to stderr.

mod input;
mod startup;
mod store;

use std::{fmt::Display, io::Write, path::PathBuf};

use clap::Parser;
use radiochat_app::{
    ChatConfig, ChatHandle, ChatService, ChatState, DEFAULT_SERVER_URL, Delivery, Message, Profile,
    SendRequest, Signal,
};
use radiochat_client::{SystemEnv, WebSocketConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    input::{HELP, Input},
    store::JsonFileStore,
};

/// Radiochat terminal client
#[derive(Parser, Debug)]
#[command(name = "radiochat")]
#[command(about = "Realtime chat for the radio stream")]
#[command(version)]
struct Args {
    /// Chat server URL
    #[arg(short, long, env = "CHAT_URL", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Display name (saved to the profile)
    #[arg(short, long)]
    name: Option<String>,

    /// Profile file
    #[arg(long, default_value = ".radiochat-profile.json")]
    profile: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let env = SystemEnv::new();
    let store = JsonFileStore::open(&args.profile)?;
    let mut profile = Profile::load(&store, &env);
    tracing::debug!(path = %store.path().display(), color = profile.color(), "profile loaded");

    let config = ChatConfig::with_server_url(args.server);
    let connector = WebSocketConnector::new(config.server_url.clone())
        .with_connect_timeout(config.connection.connect_timeout);
    tracing::info!(url = %config.server_url, "connecting");
    let wait = config.connection.connect_timeout;
    let handle = ChatService::new(config, connector, env).start();

    if let Some(name) = &args.name
        && let Err(error) = startup::claim_name(&handle, &mut profile, &store, name, wait).await
    {
        say(error);
    }

    tokio::spawn(print_signals(handle.clone()));

    match profile.name() {
        Some(name) => say(format_args!("chatting as {name}; /help for commands")),
        None => say("set a display name with /name <name> before chatting"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Empty => {},
            Input::Say(content) => {
                let Some(name) = profile.name() else {
                    say("set a display name with /name <name> first");
                    continue;
                };
                let request = SendRequest::new(content, name).with_avatar(profile.color());
                tokio::spawn(send(handle.clone(), request));
            },
            Input::Name(name) => match profile.set_name(&store, &name, &handle.state()) {
                Ok(()) => say(format_args!("you are now {}", profile.name().unwrap_or_default())),
                Err(error) => say(error),
            },
            Input::Reconnect => handle.reconnect().await,
            Input::Clear => handle.clear().await,
            Input::Help => say(HELP),
            Input::Quit => break,
            Input::Unknown(command) => say(format_args!("unknown command /{command}; try /help")),
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn send(handle: ChatHandle, request: SendRequest) {
    match handle.send(request).await {
        Ok(Delivery::Assumed) => tracing::debug!("no acknowledgment, assuming delivered"),
        Ok(_) => {},
        Err(error) => say(format_args!("! {error}")),
    }
}

/// Print messages and connection changes until the service stops.
async fn print_signals(handle: ChatHandle) {
    let mut signals = handle.subscribe();
    let mut shown = ChatState::default();

    while let Some(signal) = signals.recv().await {
        match signal {
            Signal::MessageAdmitted(message) => say(line(&message)),
            Signal::SnapshotReplaced { count } => {
                say(format_args!("-- {count} recent messages --"));
                for message in &handle.state().messages {
                    say(line(message));
                }
            },
            Signal::StateChanged => {
                let state = handle.state();
                if state.connected != shown.connected {
                    match state.connected {
                        Some(true) => say("* connected"),
                        Some(false) => say("* disconnected"),
                        None => {},
                    }
                }
                if state.error != shown.error
                    && let Some(error) = &state.error
                {
                    say(format_args!("! {error}"));
                }
                shown = state;
            },
        }
    }
}

fn line(message: &Message) -> String {
    format!(
        "[{}] ({}) {}: {}",
        message.time_label(),
        message.initial(),
        message.author.name,
        message.content
    )
}

fn say(text: impl Display) {
    let mut out = std::io::stdout().lock();
    // A closed stdout leaves nothing to report to.
    let _ = writeln!(out, "{text}");
}
