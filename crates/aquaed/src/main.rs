//! aquaed — Aquae federation node daemon.
//!
//! Takes one positional argument, the configuration-file path. Exit codes:
//! 0 on clean shutdown, 1 on argument misuse, 2 on fatal startup errors.

mod handler;
mod listener;
mod worker;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use handler::{FrameHandler, LogHandler};
use listener::Listener;

#[tokio::main]
async fn main() {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug aquaed aquae.conf
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = match (args.next(), args.next()) {
        (Some(path), None) => path,
        _ => {
            eprintln!("usage: aquaed <config-file>");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(Path::new(&config_path)).await {
        tracing::error!(error = %e, "fatal startup error");
        eprintln!("aquaed: {e:#}");
        std::process::exit(2);
    }
}

async fn run(config_path: &Path) -> Result<()> {
    eprintln!("aquaed starting ({})", config_path.display());

    let bindings = aquae_node::config::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if bindings.is_empty() {
        tracing::warn!("configuration declares no listeners");
    }

    let handler: Arc<dyn FrameHandler> = Arc::new(LogHandler);
    let (shutdown_tx, _) = broadcast::channel(1);

    // Bind every port before accepting anywhere, so a bad binding aborts
    // startup instead of leaving a half-open daemon.
    let mut listeners = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let binding = Arc::new(binding);
        listeners.push(Listener::bind(binding, handler.clone(), shutdown_tx.subscribe()).await?);
    }

    let mut tasks = Vec::with_capacity(listeners.len());
    for l in listeners {
        tasks.push(tokio::spawn(l.run()));
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(());
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
