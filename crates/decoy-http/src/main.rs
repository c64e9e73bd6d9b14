use anyhow::Context;
use clap::Parser;
use decoy_http::{DecoyServer, JournalMode, ServerConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "decoy", version, about = "HTTP mock server with declarative stubs")]
struct Args {
    /// Interface to bind
    #[arg(long, env = "DECOY_HOST")]
    host: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(short, long, env = "DECOY_PORT")]
    port: Option<u16>,

    /// Stub file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log match details for every request
    #[arg(short, long)]
    verbose: bool,

    /// Request journal mode: lean or full
    #[arg(long)]
    journal: Option<JournalMode>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DECOY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.verbose {
        config = config.with_verbose(true);
    }
    if let Some(mode) = args.journal {
        config = config.with_journal_mode(mode);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;
    let timeouts = config.shutdown;

    let mut server = DecoyServer::start(config)
        .await
        .context("Failed to start server")?;
    info!("Decoy listening on {}", server.base_url());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let unexpected = server.find_all_unexpected_requests();
    if !unexpected.is_empty() {
        let listing = unexpected
            .iter()
            .map(|request| request.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        warn!("{} unexpected requests:\n{}", unexpected.len(), listing);
    }

    server
        .shutdown_millis(timeouts.grace_period_ms, timeouts.timeout_ms)
        .await
        .context("Failed to shut down")?;
    Ok(())
}
