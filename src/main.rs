use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use logagg::config::Config;

#[derive(Parser)]
#[command(name = "logagg", about = "Bounded-queue log aggregator with an HTTP view")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/logagg/config.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address for the HTTP view, e.g. 127.0.0.1:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Number of storage workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Also append every record to this JSON Lines file.
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Do not start the simulated producer.
    #[arg(long)]
    no_simulator: bool,

    /// Write debug logs to /tmp/logagg-debug.log (tail -f to inspect).
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(workers) = cli.workers {
        config.aggregator.workers = workers;
    }
    if let Some(path) = cli.jsonl {
        config.storage.jsonl_path = Some(path);
    }
    if cli.no_simulator {
        config.simulator.enabled = false;
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let summary = logagg::run(config, listener, shutdown).await?;
    tracing::info!(
        submitted = summary.stats.submitted,
        stored = summary.stats.stored,
        dropped = summary.stats.dropped,
        records = summary.stored_records,
        "logagg exited"
    );
    Ok(())
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/logagg-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("logagg debug log started, tail -f /tmp/logagg-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
    Ok(())
}
