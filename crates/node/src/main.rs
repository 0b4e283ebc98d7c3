//! Paxos Node
//!
//! Main entry point for a single-decree Paxos node.
//! Runs the proposer and acceptor roles behind one HTTP server, or acts as a
//! client submitting a value to (or inspecting) a running node.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use paxos_consensus::{Acceptor, FanOut};
use paxos_rpc::{HttpNodeServer, HttpTransport, NodeClient, NodeContext, RpcError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::NodeConfig;

/// Node mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Serve mode - run proposer and acceptor until Ctrl+C
    Serve,
    /// Submit mode - ask a running node to get a value chosen
    Submit,
    /// Inspect mode - print a running node's acceptor state
    Inspect,
}

/// Single-decree Paxos node
#[derive(Parser, Debug)]
#[command(name = "paxos-node")]
#[command(about = "Single-decree Paxos node over HTTP+JSON", long_about = None)]
struct Args {
    /// Node mode
    #[arg(long, value_enum, default_value = "serve")]
    mode: Mode,

    /// JSON config file (flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP bind address (serve mode)
    #[arg(long, env = "PAXOS_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Comma-separated peer base urls, in node-set order (serve mode)
    #[arg(long, env = "PAXOS_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Per peer call timeout in milliseconds (serve mode)
    #[arg(long)]
    rpc_timeout_ms: Option<u64>,

    /// Fan-out mode: concurrent or sequential (serve mode)
    #[arg(long)]
    fan_out: Option<FanOut>,

    /// Node to talk to (submit and inspect modes)
    #[arg(long, default_value = "http://127.0.0.1:3001")]
    target: String,

    /// Value to submit (submit mode)
    #[arg(long)]
    value: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Defaults, then the config file, then flags
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };

        if let Some(addr) = &self.listen_addr {
            config.listen_addr = addr.clone();
        }
        if !self.peers.is_empty() {
            config.peers = self.peers.clone();
        }
        if self.rpc_timeout_ms.is_some() {
            config.rpc_timeout_ms = self.rpc_timeout_ms;
        }
        if let Some(fan_out) = self.fan_out {
            config.fan_out = fan_out;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.mode {
        Mode::Serve => run_serve(args).await,
        Mode::Submit => run_submit(args).await,
        Mode::Inspect => run_inspect(args).await,
    }
}

/// Run the node until Ctrl+C
async fn run_serve(args: Args) -> Result<()> {
    let config = args.node_config()?;

    tracing::info!("Starting Paxos node");
    tracing::info!("  HTTP: {}", config.listen_addr);
    tracing::info!("  Node set: {}", config.peers.join(", "));
    tracing::info!("  Fan-out: {:?}", config.fan_out);
    match config.rpc_timeout_ms {
        Some(ms) => tracing::info!("  Peer call timeout: {}ms", ms),
        None => tracing::info!("  Peer call timeout: none"),
    }

    let transport = HttpTransport::new(&config.peers).context("invalid node set")?;
    let context = Arc::new(NodeContext::new(
        Acceptor::shared(),
        transport,
        config.proposer_config(),
    ));

    let http_addr = config.listen_addr.clone();
    let mut http_server = tokio::spawn(async move {
        let server = HttpNodeServer::new(context);
        if let Err(e) = server.run(&http_addr).await {
            tracing::error!("HTTP node server error: {}", e);
        }
    });
    let http_abort = http_server.abort_handle();

    tracing::info!("Paxos node running. Press Ctrl+C to stop.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down...");
            http_abort.abort();
        }
        _ = &mut http_server => {
            anyhow::bail!("HTTP node server exited");
        }
    }

    tracing::info!("Node stopped");

    Ok(())
}

/// Submit one value to a running node
async fn run_submit(args: Args) -> Result<()> {
    let value = args
        .value
        .as_deref()
        .context("--value is required in submit mode")?;
    let client = NodeClient::new(&args.target).context("invalid --target")?;

    tracing::info!("Submitting {:?} to {}", value, client.base());
    match client.submit(value).await {
        Ok(()) => {
            tracing::info!("Value {:?} accepted", value);
            Ok(())
        }
        Err(RpcError::Rejected(e)) => {
            tracing::warn!("Value {:?} not chosen: {}", value, e);
            Err(e.into())
        }
        Err(e) => Err(e).context("submitting value"),
    }
}

/// Print a running node's acceptor state as JSON
async fn run_inspect(args: Args) -> Result<()> {
    let client = NodeClient::new(&args.target).context("invalid --target")?;
    let state = client
        .acceptor_state()
        .await
        .context("reading acceptor state")?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
