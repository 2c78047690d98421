//! Per-connection worker — owns one transport session for its lifetime.
//!
//! Workers share nothing mutable: each holds a private session, an `Arc`
//! to the read-only snapshot, and the shared stateless handler. Any peer
//! or I/O error closes this session and touches nothing else.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use aquae_core::MessageType;
use aquae_node::transport::{Session, SessionError};
use aquae_node::ListenerBinding;

use crate::handler::FrameHandler;

pub async fn run<S>(
    stream: S,
    peer: SocketAddr,
    binding: Arc<ListenerBinding>,
    handler: Arc<dyn FrameHandler>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(stream);
    tracing::debug!(%peer, listener = %binding.node_name, "session open");

    loop {
        let message_type = match session.read_frame().await {
            Ok(Some(t)) => t,
            Ok(None) => {
                tracing::debug!(%peer, "peer closed the session");
                break;
            }
            Err(e) => {
                log_and_close(peer, &e);
                break;
            }
        };

        match dispatch(&mut session, message_type, &binding, handler.as_ref()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(%peer, "finish received, closing session");
                break;
            }
            Err(e) => {
                log_and_close(peer, &e);
                break;
            }
        }
    }
}

/// Read the pending body and hand it to the domain layer. `Ok(false)`
/// means the peer asked to finish the session.
async fn dispatch<S>(
    session: &mut Session<S>,
    message_type: MessageType,
    binding: &ListenerBinding,
    handler: &dyn FrameHandler,
) -> Result<bool, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let federation = binding.federation.as_ref();
    match message_type {
        MessageType::IdentitySignRequest => {
            let request = session.read_identity_sign_request().await?;
            if let Err(e) = handler.on_identity_sign_request(federation, &request) {
                tracing::warn!(error = %e, "handler rejected identity sign request");
            }
            Ok(true)
        }
        MessageType::SignedQuery => {
            let body = session.read_signed_query().await?;
            if let Err(e) = handler.on_signed_query(federation, &body) {
                tracing::warn!(error = %e, "handler rejected signed query");
            }
            Ok(true)
        }
        MessageType::Finish => {
            let _ = session.read_body(MessageType::Finish).await?;
            Ok(false)
        }
        reserved => {
            let body = session.read_body(reserved).await?;
            if let Err(e) = handler.on_reserved(federation, reserved, &body) {
                tracing::warn!(error = %e, ?reserved, "handler rejected reserved message");
            }
            Ok(true)
        }
    }
}

fn log_and_close(peer: SocketAddr, error: &SessionError) {
    match error {
        SessionError::Peer(e) => tracing::warn!(%peer, error = %e, "peer protocol error, closing session"),
        SessionError::Io(e) => tracing::warn!(%peer, error = %e, "stream error, closing session"),
        other => tracing::warn!(%peer, error = %other, "session error, closing session"),
    }
}
