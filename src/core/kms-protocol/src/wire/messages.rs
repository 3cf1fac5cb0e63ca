//! Canonical wire messages.
//!
//! Protobuf tags and JSON labels are part of the protocol; do not renumber
//! or rename fields. Original proto field names are accepted as aliases
//! when decoding JSON.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{base64_bytes, quoted, Duration, Timestamp};

/// Removes nodes from the receiving node's cluster membership.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EditClusterRequest {
    /// IDs of the nodes to remove.
    #[prost(uint32, repeated, tag = "1")]
    #[serde(rename = "remove", alias = "RemoveIDs")]
    pub remove_ids: Vec<u32>,
}

/// Creates a key with a single version.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateKeyRequest {
    /// Key type; the server picks one if absent.
    #[prost(string, optional, tag = "1")]
    #[serde(rename = "type", alias = "Type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Adds a new version to an existing key ring.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct AddKeyVersionRequest {
    /// Key type; the server picks one if absent.
    #[prost(string, optional, tag = "1")]
    #[serde(rename = "type", alias = "Type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Removes one version from a key ring.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveKeyVersionRequest {
    /// Version to remove, 0 for the latest.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
}

/// Describes one version of a key.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribeKeyRequest {
    /// Version to describe, 0 for the latest.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
}

/// Key description.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStatusResponse {
    /// Key name.
    #[prost(string, tag = "1")]
    #[serde(rename = "name", alias = "Name")]
    pub name: String,
    /// Described version.
    #[prost(uint32, tag = "2")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// Key type of the version.
    #[prost(string, tag = "3")]
    #[serde(rename = "type", alias = "Type")]
    pub r#type: String,
    /// Creation time of the version.
    #[prost(message, optional, tag = "4")]
    #[serde(rename = "created_at", alias = "CreatedAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Identity that created the version.
    #[prost(string, tag = "5")]
    #[serde(rename = "created_by", alias = "CreatedBy")]
    pub created_by: String,
}

/// Encrypts a plaintext with a key version.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptRequest {
    /// Key version, 0 for the latest.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// Plaintext to encrypt.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "plaintext", alias = "Plaintext", with = "base64_bytes")]
    pub plaintext: Vec<u8>,
    /// Associated data bound to the ciphertext.
    #[prost(bytes = "vec", tag = "3")]
    #[serde(rename = "associated_data", alias = "AssociatedData", with = "base64_bytes")]
    pub associated_data: Vec<u8>,
}

/// Ciphertext produced by Encrypt.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptResponse {
    /// Version that produced the ciphertext.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// The ciphertext.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "ciphertext", alias = "Ciphertext", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Decrypts a ciphertext with the exact version that produced it.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptRequest {
    /// Key version. Must not be 0.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// Ciphertext to decrypt.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "ciphertext", alias = "Ciphertext", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Associated data used at encryption.
    #[prost(bytes = "vec", tag = "3")]
    #[serde(rename = "associated_data", alias = "AssociatedData", with = "base64_bytes")]
    pub associated_data: Vec<u8>,
}

/// Plaintext recovered by Decrypt.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptResponse {
    /// The plaintext.
    #[prost(bytes = "vec", tag = "1")]
    #[serde(rename = "plaintext", alias = "Plaintext", with = "base64_bytes")]
    pub plaintext: Vec<u8>,
}

/// Generates a fresh data encryption key.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateKeyRequest {
    /// Key version, 0 for the latest.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// Associated data bound to the encrypted key.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "associated_data", alias = "AssociatedData", with = "base64_bytes")]
    pub associated_data: Vec<u8>,
    /// Key length in bytes; absent for the default.
    #[prost(uint32, optional, tag = "3")]
    #[serde(rename = "length", alias = "Length", skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

/// A generated data encryption key.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateKeyResponse {
    /// Version that encrypted the key.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// Plaintext key.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "plaintext", alias = "Plaintext", with = "base64_bytes")]
    pub plaintext: Vec<u8>,
    /// Encrypted key.
    #[prost(bytes = "vec", tag = "3")]
    #[serde(rename = "ciphertext", alias = "Ciphertext", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Computes a message authentication code.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MacRequest {
    /// Key version, 0 for the latest.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// Message to authenticate.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "message", alias = "Message", with = "base64_bytes")]
    pub message: Vec<u8>,
}

/// A message authentication code.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MacResponse {
    /// Version that computed the tag.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: u32,
    /// The tag.
    #[prost(bytes = "vec", tag = "2")]
    #[serde(rename = "mac", alias = "MAC", with = "base64_bytes")]
    pub mac: Vec<u8>,
}

/// Lists names matching a prefix.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    /// Name prefix.
    #[prost(string, tag = "1")]
    #[serde(rename = "prefix", alias = "Prefix")]
    pub prefix: String,
    /// Resume strictly after this name.
    #[prost(string, tag = "2")]
    #[serde(rename = "continue_at", alias = "ContinueAt")]
    pub continue_at: String,
    /// Maximum number of results; 0 or less for the server default.
    #[prost(int32, tag = "3")]
    #[serde(rename = "limit", alias = "Limit", deserialize_with = "quoted::deserialize")]
    pub limit: i32,
}

/// One page of names.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ListResponse {
    /// Matching names, sorted.
    #[prost(string, repeated, tag = "1")]
    #[serde(rename = "items", alias = "Items")]
    pub items: Vec<String>,
    /// Cursor for the next page, empty when done.
    #[prost(string, tag = "2")]
    #[serde(rename = "continue_at", alias = "ContinueAt")]
    pub continue_at: String,
}

/// Status report of a single node.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatusResponse {
    /// Server version.
    #[prost(string, tag = "1")]
    #[serde(rename = "version", alias = "Version")]
    pub version: String,
    /// API version.
    #[prost(string, tag = "2")]
    #[serde(rename = "api_version", alias = "APIVersion")]
    pub api_version: String,
    /// Endpoint address.
    #[prost(string, tag = "3")]
    #[serde(rename = "addr", alias = "Addr")]
    pub addr: String,
    /// Consensus role.
    #[prost(string, tag = "4")]
    #[serde(rename = "role", alias = "Role")]
    pub role: String,
    /// Committed state changes.
    #[prost(uint64, tag = "5")]
    #[serde(rename = "commit", alias = "Commit", with = "quoted")]
    pub commit: u64,
    /// Cluster membership, ID to address.
    #[prost(map = "uint32, string", tag = "6")]
    #[serde(rename = "nodes", alias = "Nodes")]
    pub nodes: HashMap<u32, String>,
    /// Own node ID.
    #[prost(uint32, tag = "7")]
    #[serde(rename = "id", alias = "ID")]
    pub id: u32,
    /// Leader node ID, negative when unknown.
    #[prost(int64, tag = "8")]
    #[serde(rename = "leader_id", alias = "LeaderID", with = "quoted")]
    pub leader_id: i64,
    /// Time since the last leader heartbeat.
    #[prost(message, optional, tag = "9")]
    #[serde(rename = "last_heartbeat", alias = "LastHeartbeat", skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<Duration>,
    /// Heartbeat interval.
    #[prost(message, optional, tag = "10")]
    #[serde(rename = "heartbeat_interval", alias = "HeartbeatInterval", skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<Duration>,
    /// Election timeout.
    #[prost(message, optional, tag = "11")]
    #[serde(rename = "election_timeout", alias = "ElectionTimeout", skip_serializing_if = "Option::is_none")]
    pub election_timeout: Option<Duration>,
    /// Process uptime.
    #[prost(message, optional, tag = "12")]
    #[serde(rename = "uptime", alias = "UpTime", skip_serializing_if = "Option::is_none")]
    pub up_time: Option<Duration>,
    /// Operating system.
    #[prost(string, tag = "13")]
    #[serde(rename = "os", alias = "OS")]
    pub os: String,
    /// CPU architecture.
    #[prost(string, tag = "14")]
    #[serde(rename = "arch", alias = "Arch")]
    pub arch: String,
    /// Number of CPUs.
    #[prost(uint32, tag = "15")]
    #[serde(rename = "cpus", alias = "CPUs")]
    pub cpus: u32,
    /// Number of CPUs the process may use.
    #[prost(uint32, tag = "16")]
    #[serde(rename = "usable_cpus", alias = "UsableCPUs")]
    pub usable_cpus: u32,
    /// Heap memory in use, bytes.
    #[prost(uint64, tag = "17")]
    #[serde(rename = "heap_mem_in_use", alias = "HeapMemInUse", with = "quoted")]
    pub heap_mem_in_use: u64,
    /// Stack memory in use, bytes.
    #[prost(uint64, tag = "18")]
    #[serde(rename = "stack_mem_in_use", alias = "StackMemInUse", with = "quoted")]
    pub stack_mem_in_use: u64,
    /// HSMs backing the node.
    #[prost(string, repeated, tag = "19")]
    #[serde(rename = "hsms", alias = "HSMs")]
    pub hsms: Vec<String>,
}

/// Node-local view of the cluster.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    /// Reachable nodes and their reports.
    #[prost(map = "uint32, message", tag = "1")]
    #[serde(rename = "nodes_up", alias = "NodesUp")]
    pub nodes_up: HashMap<u32, NodeStatusResponse>,
    /// Unreachable nodes and their last-known address.
    #[prost(map = "uint32, string", tag = "2")]
    #[serde(rename = "nodes_down", alias = "NodesDown")]
    pub nodes_down: HashMap<u32, String>,
}

/// Error reported by a server.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorResponse {
    /// Status code.
    #[prost(uint32, tag = "1")]
    #[serde(rename = "code", alias = "Code")]
    pub code: u32,
    /// Error message.
    #[prost(string, tag = "2")]
    #[serde(rename = "message", alias = "Message")]
    pub message: String,
}
