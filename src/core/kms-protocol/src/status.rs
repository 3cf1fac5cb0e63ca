//! Cluster status model.
//!
//! A node reports its own view of the cluster: its consensus role, the
//! leader it follows, heartbeat timing and commit count. Querying one node
//! yields that node's local view only; [`ClusterStatus::leader`] helps a
//! caller reconcile the reports of several nodes.
//!
//! Roles are reports, not commands. Nothing here drives an election.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;

use crate::error::WireError;
use crate::wire::{messages, Duration, WireMapping};

/// Cluster node identifier. `0` is a valid ID.
pub type NodeId = u32;

/// Consensus role a node reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepts writes and sends heartbeats.
    Leader,
    /// Replicates the leader.
    Follower,
    /// Running for leader after an election timeout.
    Candidate,
}

impl Role {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "Leader",
            Self::Follower => "Follower",
            Self::Candidate => "Candidate",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Leader" => Ok(Self::Leader),
            "Follower" => Ok(Self::Follower),
            "Candidate" => Ok(Self::Candidate),
            other => Err(WireError::UnknownRole(other.to_string())),
        }
    }
}

/// Election timeout recommended for a heartbeat interval.
///
/// Three heartbeats may be missed before a follower starts an election.
pub fn recommended_election_timeout(heartbeat_interval: TimeDelta) -> TimeDelta {
    heartbeat_interval * 3
}

/// Self-reported state of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// Server version.
    pub version: String,
    /// API version.
    pub api_version: String,
    /// Endpoint address.
    pub endpoint: String,
    /// Consensus role.
    pub role: Role,
    /// Number of applied state changes.
    pub commit: u64,
    /// Known cluster members, ID to address.
    pub nodes: HashMap<NodeId, String>,
    /// Own ID.
    pub id: NodeId,
    /// Leader this node follows, if any.
    pub leader: Option<NodeId>,
    /// Time since the last heartbeat.
    pub last_heartbeat: TimeDelta,
    /// Configured heartbeat interval.
    pub heartbeat_interval: TimeDelta,
    /// Configured election timeout.
    pub election_timeout: TimeDelta,
    /// Process uptime.
    pub uptime: TimeDelta,
    /// Operating system.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Number of CPUs.
    pub cpus: usize,
    /// Number of CPUs the process may use.
    pub usable_cpus: usize,
    /// Heap memory in use, bytes.
    pub heap_mem_in_use: u64,
    /// Stack memory in use, bytes.
    pub stack_mem_in_use: u64,
    /// HSMs backing the node.
    pub hsms: Vec<String>,
}

impl NodeStatus {
    /// Leader ID as reported on the wire: `-1` when there is no leader.
    pub fn leader_id(&self) -> i64 {
        self.leader.map_or(-1, i64::from)
    }

    /// Returns true if the node knows a leader.
    pub fn has_leader(&self) -> bool {
        self.leader.is_some()
    }

    /// Returns true if the node reports itself as leader.
    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// Returns true if a leader exists and its heartbeat is recent enough
    /// that no election is due.
    pub fn heartbeat_healthy(&self) -> bool {
        self.has_leader() && self.last_heartbeat < self.election_timeout
    }

    /// Returns true if the election timeout allows for at least three
    /// missed heartbeats.
    pub fn timing_balanced(&self) -> bool {
        self.election_timeout >= recommended_election_timeout(self.heartbeat_interval)
    }
}

impl WireMapping for NodeStatus {
    type Wire = messages::NodeStatusResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::NodeStatusResponse {
            version: self.version.clone(),
            api_version: self.api_version.clone(),
            addr: self.endpoint.clone(),
            role: self.role.as_str().to_string(),
            commit: self.commit,
            nodes: self.nodes.clone(),
            id: self.id,
            leader_id: self.leader_id(),
            last_heartbeat: Some(Duration::from_time_delta(self.last_heartbeat)?),
            heartbeat_interval: Some(Duration::from_time_delta(self.heartbeat_interval)?),
            election_timeout: Some(Duration::from_time_delta(self.election_timeout)?),
            up_time: Some(Duration::from_time_delta(self.uptime)?),
            os: self.os.clone(),
            arch: self.arch.clone(),
            cpus: narrow_cpus("cpus", self.cpus)?,
            usable_cpus: narrow_cpus("usable_cpus", self.usable_cpus)?,
            heap_mem_in_use: self.heap_mem_in_use,
            stack_mem_in_use: self.stack_mem_in_use,
            hsms: self.hsms.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        let leader = if wire.leader_id < 0 {
            None
        } else {
            Some(
                NodeId::try_from(wire.leader_id).map_err(|_| WireError::OutOfRange {
                    field: "leader_id",
                    value: wire.leader_id.to_string(),
                })?,
            )
        };

        Ok(Self {
            version: wire.version,
            api_version: wire.api_version,
            endpoint: wire.addr,
            role: wire.role.parse()?,
            commit: wire.commit,
            nodes: wire.nodes,
            id: wire.id,
            leader,
            last_heartbeat: duration_from_wire(wire.last_heartbeat)?,
            heartbeat_interval: duration_from_wire(wire.heartbeat_interval)?,
            election_timeout: duration_from_wire(wire.election_timeout)?,
            uptime: duration_from_wire(wire.up_time)?,
            os: wire.os,
            arch: wire.arch,
            cpus: widen_cpus("cpus", wire.cpus)?,
            usable_cpus: widen_cpus("usable_cpus", wire.usable_cpus)?,
            heap_mem_in_use: wire.heap_mem_in_use,
            stack_mem_in_use: wire.stack_mem_in_use,
            hsms: wire.hsms,
        })
    }
}

fn narrow_cpus(field: &'static str, value: usize) -> Result<u32, WireError> {
    u32::try_from(value).map_err(|_| WireError::OutOfRange {
        field,
        value: value.to_string(),
    })
}

fn widen_cpus(field: &'static str, value: u32) -> Result<usize, WireError> {
    usize::try_from(value).map_err(|_| WireError::OutOfRange {
        field,
        value: value.to_string(),
    })
}

fn duration_from_wire(value: Option<Duration>) -> Result<TimeDelta, WireError> {
    value.map_or(Ok(TimeDelta::zero()), Duration::to_time_delta)
}

/// One node's view of the cluster: reachable nodes with their reports and
/// unreachable nodes with their last-known address.
///
/// No node ID appears in both maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatus {
    /// Reachable nodes.
    pub nodes_up: HashMap<NodeId, NodeStatus>,
    /// Unreachable nodes.
    pub nodes_down: HashMap<NodeId, String>,
}

impl ClusterStatus {
    /// All member IDs, up or down, in ascending order.
    pub fn members(&self) -> BTreeSet<NodeId> {
        self.nodes_up
            .keys()
            .chain(self.nodes_down.keys())
            .copied()
            .collect()
    }

    /// Returns true if the node is reachable.
    pub fn is_up(&self, id: NodeId) -> bool {
        self.nodes_up.contains_key(&id)
    }

    /// Returns true if the node is unreachable.
    pub fn is_down(&self, id: NodeId) -> bool {
        self.nodes_down.contains_key(&id)
    }

    /// Returns true if strictly more than half of the members are up.
    pub fn quorum_reachable(&self) -> bool {
        let members = self.members().len();
        members > 0 && self.nodes_up.len() * 2 > members
    }

    /// The leader most reachable nodes agree on.
    ///
    /// Returns `None` if no reachable node reports a leader or if the
    /// reports tie.
    pub fn leader(&self) -> Option<NodeId> {
        let mut votes: HashMap<NodeId, usize> = HashMap::new();
        for status in self.nodes_up.values() {
            if let Some(leader) = status.leader {
                *votes.entry(leader).or_default() += 1;
            }
        }

        let max = votes.values().copied().max()?;
        let mut winners = votes.into_iter().filter(|(_, n)| *n == max);
        match (winners.next(), winners.next()) {
            (Some((leader, _)), None) => Some(leader),
            _ => None,
        }
    }

    fn check_partition(&self) -> Result<(), WireError> {
        match self.nodes_up.keys().find(|id| self.nodes_down.contains_key(id)) {
            Some(id) => Err(WireError::DuplicateNode(*id)),
            None => Ok(()),
        }
    }
}

impl WireMapping for ClusterStatus {
    type Wire = messages::StatusResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        self.check_partition()?;

        let nodes_up = self
            .nodes_up
            .iter()
            .map(|(id, status)| Ok((*id, status.to_wire()?)))
            .collect::<Result<_, WireError>>()?;

        Ok(messages::StatusResponse {
            nodes_up,
            nodes_down: self.nodes_down.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        let nodes_up = wire
            .nodes_up
            .into_iter()
            .map(|(id, status)| Ok((id, NodeStatus::from_wire(status)?)))
            .collect::<Result<_, WireError>>()?;

        let status = Self {
            nodes_up,
            nodes_down: wire.nodes_down,
        };
        status.check_partition()?;
        Ok(status)
    }
}

/// Removes members from the receiving node's cluster view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditClusterRequest {
    /// Node IDs to remove.
    pub remove_ids: Vec<NodeId>,
}

impl WireMapping for EditClusterRequest {
    type Wire = messages::EditClusterRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::EditClusterRequest {
            remove_ids: self.remove_ids.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            remove_ids: wire.remove_ids,
        })
    }
}
