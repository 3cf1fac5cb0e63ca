//! # KMS Server
//!
//! Reference KMS node. A [`Node`] owns a key ring engine and the cluster
//! state it reports; [`handler::handle`] serves encoded requests against
//! it with content negotiation, and [`LoopbackTransport`] plugs it into a
//! [`kms_protocol::Client`] without a network.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handler;
pub mod loopback;
pub mod node;

pub use config::NodeConfig;
pub use loopback::LoopbackTransport;
pub use node::Node;
