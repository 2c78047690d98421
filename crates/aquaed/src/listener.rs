//! Per-binding accept loop.
//!
//! One listener owns one TCP socket and one federation snapshot. Every
//! accepted connection is handed to a freshly spawned worker that owns it
//! until close; the listener itself never touches session state.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use aquae_node::ListenerBinding;

use crate::handler::FrameHandler;
use crate::worker;

pub struct Listener {
    socket: TcpListener,
    binding: Arc<ListenerBinding>,
    handler: Arc<dyn FrameHandler>,
    shutdown: broadcast::Receiver<()>,
}

impl Listener {
    /// Bind the socket and emit the readiness line. Bind failures are
    /// fatal startup errors; nothing is accepted yet.
    pub async fn bind(
        binding: Arc<ListenerBinding>,
        handler: Arc<dyn FrameHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self> {
        let socket = TcpListener::bind(("0.0.0.0", binding.port))
            .await
            .with_context(|| format!("failed to bind port {}", binding.port))?;

        // The binding's node name resolved during config load.
        if let Some(node) = binding.federation.node(&binding.node_name) {
            eprintln!("{}", aquae_core::wire::endpoint_uri(&node.hostname, binding.port));
        }
        tracing::info!(
            listener = %binding.node_name,
            port = binding.port,
            queries = binding.queries.len(),
            "listener ready"
        );

        Ok(Self {
            socket,
            binding,
            handler,
            shutdown,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(listener = %self.binding.node_name, "listener shutting down");
                    return Ok(());
                }

                accepted = self.socket.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(a) => a,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let binding = self.binding.clone();
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        worker::run(stream, peer, binding, handler).await;
                    });
                }
            }
        }
    }
}
