//! Frame dispatch seam — routes decoded frames to the domain layer.
//!
//! The query planner and consent machinery live above this daemon; until
//! they land, [`LogHandler`] resolves what it can against the snapshot and
//! logs the rest.

use anyhow::Result;

use aquae_core::schema::IdentitySignRequest;
use aquae_core::MessageType;
use aquae_node::model::Federation;

/// Domain-layer hook invoked by workers for each decoded frame. Handlers
/// are shared across workers and must not hold per-session state.
pub trait FrameHandler: Send + Sync {
    fn on_identity_sign_request(
        &self,
        federation: &Federation,
        request: &IdentitySignRequest,
    ) -> Result<()>;

    fn on_signed_query(&self, federation: &Federation, body: &[u8]) -> Result<()>;

    fn on_reserved(&self, federation: &Federation, message_type: MessageType, body: &[u8])
        -> Result<()>;
}

pub struct LogHandler;

impl FrameHandler for LogHandler {
    fn on_identity_sign_request(
        &self,
        federation: &Federation,
        request: &IdentitySignRequest,
    ) -> Result<()> {
        for name in &request.identity_set {
            match federation.node(name) {
                Some(node) => tracing::debug!(
                    node = %node.name,
                    endpoint = %node.endpoint(),
                    certificate = %hex::encode(&node.certificate[..8.min(node.certificate.len())]),
                    "identity-set node resolved"
                ),
                None => tracing::warn!(node = %name, "identity-set node is not in the federation"),
            }
        }
        Ok(())
    }

    fn on_signed_query(&self, _federation: &Federation, body: &[u8]) -> Result<()> {
        tracing::info!(bytes = body.len(), "signed query received, deferred to the planning layer");
        Ok(())
    }

    fn on_reserved(
        &self,
        _federation: &Federation,
        message_type: MessageType,
        body: &[u8],
    ) -> Result<()> {
        tracing::debug!(?message_type, bytes = body.len(), "reserved message type received");
        Ok(())
    }
}
