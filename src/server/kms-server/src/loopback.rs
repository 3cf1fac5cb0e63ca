//! In-process transport.

use std::sync::Arc;

use async_trait::async_trait;

use kms_protocol::{Request, Response, Transport, TransportError};

use crate::handler::handle;
use crate::node::Node;

/// Identity recorded as creator when none is configured.
pub const DEFAULT_IDENTITY: &str = "root";

/// Delivers requests straight to a [`Node`] in the same process.
///
/// Bodies still go through the full encode/decode path, so a client over
/// this transport behaves as it would over the network.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    node: Arc<Node>,
    identity: String,
}

impl LoopbackTransport {
    /// Creates a transport acting as [`DEFAULT_IDENTITY`].
    pub fn new(node: Arc<Node>) -> Self {
        Self::with_identity(node, DEFAULT_IDENTITY)
    }

    /// Creates a transport acting as `identity`.
    pub fn with_identity(node: Arc<Node>, identity: impl Into<String>) -> Self {
        Self {
            node,
            identity: identity.into(),
        }
    }

    /// Returns the node requests are delivered to.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        Ok(handle(&self.node, &self.identity, request).await)
    }
}
