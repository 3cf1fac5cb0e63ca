//! Node configuration.

use std::collections::HashMap;

use chrono::TimeDelta;

use kms_keyring::EngineConfig;
use kms_protocol::status::recommended_election_timeout;
use kms_protocol::NodeId;

/// Default heartbeat interval in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: i64 = 500;

/// API version this node serves.
pub const API_VERSION: &str = "v1";

/// Configuration of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Own node ID.
    pub id: NodeId,
    /// Address the node is reachable at.
    pub endpoint: String,
    /// Other cluster members, ID to address.
    pub peers: HashMap<NodeId, String>,
    /// Interval between leader heartbeats.
    pub heartbeat_interval: TimeDelta,
    /// Time without heartbeat after which a follower starts an election.
    pub election_timeout: TimeDelta,
    /// Server version reported in status.
    pub version: String,
    /// API version reported in status.
    pub api_version: String,
    /// HSMs backing the node.
    pub hsms: Vec<String>,
    /// Key ring engine limits.
    pub engine: EngineConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let heartbeat_interval = TimeDelta::milliseconds(DEFAULT_HEARTBEAT_INTERVAL_MS);
        Self {
            id: 0,
            endpoint: "127.0.0.1:7373".to_string(),
            peers: HashMap::new(),
            heartbeat_interval,
            election_timeout: recommended_election_timeout(heartbeat_interval),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: API_VERSION.to_string(),
            hsms: Vec::new(),
            engine: EngineConfig::default(),
        }
    }
}
