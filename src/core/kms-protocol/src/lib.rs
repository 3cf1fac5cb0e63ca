//! # KMS Protocol
//!
//! Client side of the KMS protocol: envelope encryption against named,
//! versioned master keys held by a replicated server cluster, and the
//! status model nodes use to report their consensus role and liveness.
//!
//! ## Layers
//!
//! - [`key`], [`status`], [`list`]: typed requests and responses
//! - [`wire`]: canonical wire messages and the [`WireMapping`] conversions
//! - [`codec`]: binary (protobuf) and JSON encodings of wire messages
//! - [`transport`]: the [`Transport`] trait the client sends through
//! - [`client`]: the [`Client`]
//!
//! ## Key versions
//!
//! A key is a ring of versions numbered from 1. Encrypt, GenerateKey and
//! MAC accept [`VersionRef::Latest`] (wire value `0`); Decrypt always names
//! the exact [`Version`] that produced the ciphertext.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod associated_data;
pub mod client;
pub mod codec;
pub mod error;
pub mod key;
pub mod list;
pub mod name;
pub mod status;
pub mod transport;
pub mod version;
pub mod wire;

pub use associated_data::AssociatedData;
pub use client::{Client, ClientConfig};
pub use codec::Encoding;
pub use error::{ErrorKind, KmsError, WireError};
pub use key::{
    AddKeyVersionRequest, CreateKeyRequest, DecryptRequest, DecryptResponse, DescribeKeyRequest,
    EncryptRequest, EncryptResponse, Envelope, GenerateKeyRequest, GenerateKeyResponse, KeyStatus,
    KeyType, MacRequest, MacResponse, RemoveKeyVersionRequest,
};
pub use list::{ListRequest, ListResponse};
pub use status::{ClusterStatus, EditClusterRequest, NodeId, NodeStatus, Role};
pub use transport::{Api, Request, Response, Transport, TransportError};
pub use version::{Version, VersionRef};
pub use wire::WireMapping;
