//! A KMS node: key ring engine plus the cluster state it reports.
//!
//! The node does not run an election. Its role, leader and heartbeat are
//! whatever was last recorded through [`Node::set_role`] and
//! [`Node::record_heartbeat`], and are reported as-is.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::TimeDelta;
use tokio::sync::RwLock;
use tracing::{info, warn};

use kms_keyring::KeyringEngine;
use kms_protocol::{ClusterStatus, EditClusterRequest, NodeId, NodeStatus, Role};

use crate::config::NodeConfig;

#[derive(Debug)]
struct Consensus {
    role: Role,
    leader: Option<NodeId>,
    last_heartbeat: Instant,
}

#[derive(Debug)]
struct Membership {
    peers: HashMap<NodeId, String>,
    reports: HashMap<NodeId, NodeStatus>,
}

/// A single KMS node.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    engine: KeyringEngine,
    started: Instant,
    commit: AtomicU64,
    consensus: RwLock<Consensus>,
    membership: RwLock<Membership>,
}

impl Node {
    /// Creates a node.
    ///
    /// A node without peers leads itself; otherwise it starts as a follower
    /// with no known leader.
    pub fn new(config: NodeConfig) -> Self {
        // The peer table may list every member, this node included.
        let mut peers = config.peers.clone();
        peers.remove(&config.id);

        let now = Instant::now();
        let consensus = if peers.is_empty() {
            Consensus {
                role: Role::Leader,
                leader: Some(config.id),
                last_heartbeat: now,
            }
        } else {
            Consensus {
                role: Role::Follower,
                leader: None,
                last_heartbeat: now,
            }
        };

        info!(
            id = config.id,
            endpoint = %config.endpoint,
            peers = peers.len(),
            role = %consensus.role,
            "Node started"
        );

        Self {
            engine: KeyringEngine::new(config.engine.clone()),
            membership: RwLock::new(Membership {
                peers,
                reports: HashMap::new(),
            }),
            consensus: RwLock::new(consensus),
            commit: AtomicU64::new(0),
            started: now,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Returns the key ring engine.
    pub fn engine(&self) -> &KeyringEngine {
        &self.engine
    }

    /// Number of committed state changes.
    pub fn commit_count(&self) -> u64 {
        self.commit.load(Ordering::SeqCst)
    }

    /// Records a committed state change.
    pub fn commit(&self) -> u64 {
        self.commit.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ========================================================================
    // Consensus State
    // ========================================================================

    /// Records the role and leader an external consensus layer reports.
    pub async fn set_role(&self, role: Role, leader: Option<NodeId>) {
        let mut consensus = self.consensus.write().await;
        if consensus.role != role || consensus.leader != leader {
            info!(id = self.config.id, role = %role, leader = ?leader, "Role changed");
        }
        consensus.role = role;
        consensus.leader = leader;
    }

    /// Records a heartbeat from the leader.
    pub async fn record_heartbeat(&self) {
        self.consensus.write().await.last_heartbeat = Instant::now();
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Records the last status a peer reported. The peer then counts as up.
    pub async fn record_peer_status(&self, status: NodeStatus) {
        let mut membership = self.membership.write().await;
        if status.id == self.config.id {
            return;
        }
        membership.peers.insert(status.id, status.endpoint.clone());
        membership.reports.insert(status.id, status);
    }

    /// Marks a peer unreachable. Its address is kept.
    pub async fn mark_peer_down(&self, id: NodeId) {
        if self.membership.write().await.reports.remove(&id).is_some() {
            warn!(id = self.config.id, peer = id, "Peer unreachable");
        }
    }

    /// Removes peers from the membership.
    pub async fn edit_cluster(&self, request: &EditClusterRequest) {
        let mut membership = self.membership.write().await;
        let mut removed = 0usize;
        for id in &request.remove_ids {
            membership.reports.remove(id);
            if membership.peers.remove(id).is_some() {
                removed += 1;
            }
        }
        drop(membership);

        if removed > 0 {
            self.commit();
        }
        warn!(
            id = self.config.id,
            requested = ?request.remove_ids,
            removed,
            "Cluster membership edited"
        );
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Builds this node's own status report.
    pub async fn node_status(&self) -> NodeStatus {
        let (role, leader, last_heartbeat) = {
            let consensus = self.consensus.read().await;
            let since = if consensus.role == Role::Leader {
                TimeDelta::zero()
            } else {
                to_time_delta(consensus.last_heartbeat.elapsed())
            };
            (consensus.role, consensus.leader, since)
        };

        let mut nodes = self.membership.read().await.peers.clone();
        nodes.insert(self.config.id, self.config.endpoint.clone());

        let cpus = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        NodeStatus {
            version: self.config.version.clone(),
            api_version: self.config.api_version.clone(),
            endpoint: self.config.endpoint.clone(),
            role,
            commit: self.commit_count(),
            nodes,
            id: self.config.id,
            leader,
            last_heartbeat,
            heartbeat_interval: self.config.heartbeat_interval,
            election_timeout: self.config.election_timeout,
            uptime: to_time_delta(self.started.elapsed()),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus,
            usable_cpus: cpus,
            heap_mem_in_use: 0,
            stack_mem_in_use: 0,
            hsms: self.config.hsms.clone(),
        }
    }

    /// Builds this node's view of the cluster: itself and every peer with a
    /// recorded status are up, every other peer is down.
    pub async fn cluster_status(&self) -> ClusterStatus {
        let own = self.node_status().await;
        let membership = self.membership.read().await;

        let mut status = ClusterStatus::default();
        for (id, addr) in &membership.peers {
            match membership.reports.get(id) {
                Some(report) => {
                    status.nodes_up.insert(*id, report.clone());
                },
                None => {
                    status.nodes_down.insert(*id, addr.clone());
                },
            }
        }
        status.nodes_up.insert(self.config.id, own);
        status
    }
}

fn to_time_delta(elapsed: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(elapsed).unwrap_or_else(|_| TimeDelta::zero())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use kms_protocol::WireMapping;

    use super::*;

    fn three_node_config() -> NodeConfig {
        NodeConfig {
            id: 0,
            peers: HashMap::from([
                (1, "10.0.0.2:7373".to_string()),
                (2, "10.0.0.3:7373".to_string()),
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_single_node_leads_itself() {
        let node = Node::new(NodeConfig::default());

        let status = node.node_status().await;
        assert_eq!(status.role, Role::Leader);
        assert_eq!(status.leader, Some(0));
        assert_eq!(status.leader_id(), 0);
        assert!(status.heartbeat_healthy());
        assert!(status.timing_balanced());
        assert!(status.cpus >= 1);
    }

    #[tokio::test]
    async fn test_follower_without_leader() {
        let node = Node::new(three_node_config());

        let status = node.node_status().await;
        assert_eq!(status.role, Role::Follower);
        assert_eq!(status.leader_id(), -1);
        assert_eq!(status.nodes.len(), 3);
    }

    #[tokio::test]
    async fn test_cluster_partition() {
        let node = Node::new(three_node_config());
        let mut peer = node.node_status().await;
        peer.id = 1;
        peer.endpoint = "10.0.0.2:7373".to_string();
        node.record_peer_status(peer).await;

        let cluster = node.cluster_status().await;
        assert!(cluster.is_up(0));
        assert!(cluster.is_up(1));
        assert!(cluster.is_down(2));
        assert_eq!(cluster.members().len(), 3);
        assert!(cluster.quorum_reachable());

        node.mark_peer_down(1).await;
        let cluster = node.cluster_status().await;
        assert!(cluster.is_down(1));
        assert!(!cluster.quorum_reachable());
    }

    #[tokio::test]
    async fn test_own_id_in_peers_reported_up_only() {
        let mut config = three_node_config();
        config.peers.insert(0, config.endpoint.clone());
        let node = Node::new(config);

        let status = node.node_status().await;
        assert_eq!(status.role, Role::Follower);
        assert_eq!(status.nodes.len(), 3);

        let cluster = node.cluster_status().await;
        assert!(cluster.is_up(0));
        assert!(!cluster.is_down(0));
        assert_eq!(cluster.members().len(), 3);
        assert!(cluster.to_wire().is_ok());
    }

    #[tokio::test]
    async fn test_single_member_peer_table_leads_itself() {
        let mut config = NodeConfig::default();
        config.peers.insert(0, config.endpoint.clone());
        let node = Node::new(config);

        let cluster = node.cluster_status().await;
        assert_eq!(cluster.leader(), Some(0));
        assert!(cluster.nodes_down.is_empty());
    }

    #[tokio::test]
    async fn test_edit_cluster_removes_peers() {
        let node = Node::new(three_node_config());

        node.edit_cluster(&EditClusterRequest {
            remove_ids: vec![2, 9],
        })
        .await;

        let cluster = node.cluster_status().await;
        assert_eq!(cluster.members().into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(node.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_set_role() {
        let node = Node::new(three_node_config());

        node.set_role(Role::Follower, Some(1)).await;
        node.record_heartbeat().await;

        let status = node.node_status().await;
        assert_eq!(status.leader, Some(1));
        assert!(status.heartbeat_healthy());

        node.set_role(Role::Candidate, None).await;
        assert!(!node.node_status().await.has_leader());
    }
}
