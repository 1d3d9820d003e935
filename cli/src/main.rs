//! `vla-agent` binary: runs the gateway supervisor (`serve`) or drives an
//! already-running one over HTTP (every other subcommand), matching the
//! teacher's "do real work in `run()`, map errors to codes only at the
//! outermost layer" split.
//!
//! Exit codes (§6): 0 normal, 1 config error, 2 port in use, 3 another
//! instance running, >=10 reserved.

mod client;
mod lockfile;
mod logging;

use clap::{Parser, Subcommand};
use client::GatewayClient;
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use vla_core::{Actuator, NullActuator};

const DEFAULT_REMOTE_URL: &str = "http://127.0.0.1:8765";

#[derive(Parser, Debug)]
#[command(name = "vla-agent")]
#[command(about = "Vision-language desktop agent: gateway supervisor and client")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Root directory for config/secrets/logs (persisted-state layout, §6).
    #[arg(long, env = "VLA_ROOT", default_value = "./vla-data")]
    root: PathBuf,

    /// Base URL of a running gateway, for client subcommands.
    #[arg(long, env = "VLA_REMOTE_URL", default_value = DEFAULT_REMOTE_URL)]
    remote_url: String,

    /// Bearer token for client subcommands; defaults to reading
    /// `<root>/config/secrets/api_key`.
    #[arg(long, env = "VLA_API_KEY")]
    api_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway supervisor in the foreground.
    Serve {
        #[arg(long, env = "HOST")]
        host: Option<String>,
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// Virtual screen size for the built-in null actuator (no real
        /// display driver ships with this crate, §1 non-goals).
        #[arg(long, default_value_t = 1920)]
        screen_width: u32,
        #[arg(long, default_value_t = 1080)]
        screen_height: u32,
    },
    /// `GET /health`
    Health,
    /// `GET /state`
    State,
    /// `POST /task`
    Task { command: String },
    /// `POST /steer`
    Steer { context: String },
    Stop,
    Pause,
    Resume,
    #[command(subcommand)]
    Chat(ChatCommand),
    #[command(subcommand)]
    Stream(StreamCommand),
    /// `GET /frame/latest`
    Frame,
    /// `GET /config`
    Config,
    #[command(subcommand)]
    Model(ModelCommand),
    #[command(subcommand)]
    Agent(AgentCommand),
    #[command(subcommand)]
    WakeWord(WakeWordCommand),
    /// Subscribe to the event socket and print events as NDJSON until interrupted.
    Watch,
}

#[derive(Subcommand, Debug)]
enum ChatCommand {
    History,
    Send { message: String },
}

#[derive(Subcommand, Debug)]
enum StreamCommand {
    Start,
    Stop,
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    List,
    Active,
    Switch { model_id: String },
}

#[derive(Subcommand, Debug)]
enum AgentCommand {
    Status,
    Start,
    Stop,
    Restart,
}

#[derive(Subcommand, Debug)]
enum WakeWordCommand {
    Enable,
    Disable,
    Status,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = run(args).await;
    std::process::exit(code);
}

async fn run(args: Args) -> i32 {
    match args.cmd {
        Command::Serve {
            host,
            port,
            screen_width,
            screen_height,
        } => run_serve(args.root, host, port, screen_width, screen_height).await,
        other => run_client(&args.root, &args.remote_url, args.api_key.as_deref(), other).await,
    }
}

async fn run_serve(
    root: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    screen_width: u32,
    screen_height: u32,
) -> i32 {
    let _log_guard = logging::init(&root);

    let lock = match lockfile::acquire(&lockfile::lock_path(&root)) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            eprintln!("vla-agent: another instance is already running against {root:?}");
            return 3;
        }
        Err(e) => {
            eprintln!("vla-agent: config error acquiring instance lock: {e}");
            return 1;
        }
    };

    let host = host.unwrap_or_else(|| "127.0.0.1".to_string());
    let port = port.unwrap_or(8765);
    let addr = format!("{host}:{port}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            eprintln!("vla-agent: {addr} is already in use");
            return 2;
        }
        Err(e) => {
            eprintln!("vla-agent: failed to bind {addr}: {e}");
            return 10;
        }
    };

    let actuator: Arc<dyn Actuator> = Arc::new(NullActuator::new(screen_width, screen_height));
    tracing::info!(%addr, "vla-agent serve starting");
    let result = vla_gateway::run_gateway_on_listener(listener, root, actuator).await;
    drop(lock);

    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(%e, "gateway exited with a config error");
            eprintln!("vla-agent: config error: {e}");
            1
        }
    }
}

async fn run_client(root: &std::path::Path, base_url: &str, api_key: Option<&str>, cmd: Command) -> i32 {
    let api_key = match api_key {
        Some(key) => key.to_string(),
        None => match std::fs::read_to_string(root.join("config").join("secrets").join("api_key")) {
            Ok(key) => key.trim().to_string(),
            Err(e) => {
                eprintln!("vla-agent: no --api-key given and could not read the persisted key: {e}");
                return 1;
            }
        },
    };

    if matches!(cmd, Command::Watch) {
        return run_watch(base_url, &api_key).await;
    }

    let client = GatewayClient::new(base_url, api_key);
    let result = dispatch(&client, cmd).await;
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap());
            0
        }
        Err(e) => {
            eprintln!("vla-agent: {e}");
            10
        }
    }
}

/// Connects to `/ws`, authenticates, and prints every subsequent event as a
/// line of JSON, mirroring the teacher's `RemoteBackend::connect` + auth
/// handshake over a persistent read loop instead of a single request/reply.
async fn run_watch(base_url: &str, api_key: &str) -> i32 {
    let ws_url = base_url.replacen("http://", "ws://", 1).replacen("https://", "wss://", 1) + "/ws";
    let (ws, _) = match tokio_tungstenite::connect_async(&ws_url).await {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("vla-agent: failed to connect to {ws_url}: {e}");
            return 10;
        }
    };
    let (mut write, mut read) = ws.split();

    let auth = serde_json::json!({ "auth": api_key }).to_string();
    if let Err(e) = write.send(Message::Text(auth)).await {
        eprintln!("vla-agent: failed to send auth frame: {e}");
        return 10;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => println!("{text}"),
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    0
}

async fn dispatch(client: &GatewayClient, cmd: Command) -> Result<serde_json::Value, client::ClientError> {
    match cmd {
        Command::Serve { .. } => unreachable!("handled in run()"),
        Command::Watch => unreachable!("handled in run_client"),
        Command::Health => client.health().await,
        Command::State => client.state().await,
        Command::Task { command } => client.submit_task(&command).await,
        Command::Steer { context } => client.steer(&context).await,
        Command::Stop => client.stop().await,
        Command::Pause => client.pause().await,
        Command::Resume => client.resume().await,
        Command::Chat(ChatCommand::History) => client.chat_history().await,
        Command::Chat(ChatCommand::Send { message }) => client.chat_send(&message).await,
        Command::Stream(StreamCommand::Start) => client.stream_start().await,
        Command::Stream(StreamCommand::Stop) => client.stream_stop().await,
        Command::Frame => client.frame_latest().await,
        Command::Config => client.config().await,
        Command::Model(ModelCommand::List) => client.models().await,
        Command::Model(ModelCommand::Active) => client.model_active().await,
        Command::Model(ModelCommand::Switch { model_id }) => client.model_switch(&model_id).await,
        Command::Agent(AgentCommand::Status) => client.agent_status().await,
        Command::Agent(AgentCommand::Start) => client.agent_start().await,
        Command::Agent(AgentCommand::Stop) => client.agent_stop().await,
        Command::Agent(AgentCommand::Restart) => client.agent_restart().await,
        Command::WakeWord(WakeWordCommand::Enable) => client.wake_word_enable().await,
        Command::WakeWord(WakeWordCommand::Disable) => client.wake_word_disable().await,
        Command::WakeWord(WakeWordCommand::Status) => client.wake_word_status().await,
    }
}
