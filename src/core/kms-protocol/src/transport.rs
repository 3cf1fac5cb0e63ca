//! Transport abstraction.
//!
//! The client hands encoded requests to a [`Transport`] and gets encoded
//! responses back. Connections, timeouts, TLS and retries all belong to the
//! transport; the protocol layer never retries.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::KmsError;

/// Protocol operations and their HTTP routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    /// Cluster status of the receiving node.
    Status,
    /// Removes cluster members.
    EditCluster,
    /// Creates an enclave.
    CreateEnclave,
    /// Deletes an enclave and its keys.
    DeleteEnclave,
    /// Lists enclaves.
    ListEnclaves,
    /// Creates a key.
    CreateKey,
    /// Adds a key version.
    AddKeyVersion,
    /// Removes a key version.
    RemoveKeyVersion,
    /// Deletes a key.
    DeleteKey,
    /// Describes a key version.
    DescribeKey,
    /// Lists keys.
    ListKeys,
    /// Encrypts.
    Encrypt,
    /// Decrypts.
    Decrypt,
    /// Generates a data key.
    GenerateKey,
    /// Computes a MAC.
    Mac,
}

impl Api {
    /// HTTP method.
    pub fn method(self) -> &'static str {
        match self {
            Self::Status | Self::ListEnclaves | Self::DescribeKey | Self::ListKeys => "GET",
            Self::EditCluster => "PATCH",
            Self::CreateEnclave | Self::CreateKey | Self::AddKeyVersion => "PUT",
            Self::DeleteEnclave | Self::RemoveKeyVersion | Self::DeleteKey => "DELETE",
            Self::Encrypt | Self::Decrypt | Self::GenerateKey | Self::Mac => "POST",
        }
    }

    fn route(self) -> &'static str {
        match self {
            Self::Status => "/v1/status",
            Self::EditCluster => "/v1/cluster/edit",
            Self::CreateEnclave => "/v1/enclave/create/",
            Self::DeleteEnclave => "/v1/enclave/delete/",
            Self::ListEnclaves => "/v1/enclave/list",
            Self::CreateKey => "/v1/key/create/",
            Self::AddKeyVersion => "/v1/key/add-version/",
            Self::RemoveKeyVersion => "/v1/key/remove-version/",
            Self::DeleteKey => "/v1/key/delete/",
            Self::DescribeKey => "/v1/key/describe/",
            Self::ListKeys => "/v1/key/list",
            Self::Encrypt => "/v1/key/encrypt/",
            Self::Decrypt => "/v1/key/decrypt/",
            Self::GenerateKey => "/v1/key/generate/",
            Self::Mac => "/v1/key/mac/",
        }
    }

    /// Returns true if the route ends with an enclave or key name.
    pub fn takes_name(self) -> bool {
        self.route().ends_with('/')
    }

    /// Returns true if the operation acts inside an enclave.
    pub fn enclave_scoped(self) -> bool {
        !matches!(
            self,
            Self::Status
                | Self::EditCluster
                | Self::CreateEnclave
                | Self::DeleteEnclave
                | Self::ListEnclaves
        )
    }

    /// URL path, with `name` appended where the route takes one.
    pub fn path(self, name: &str) -> String {
        let route = self.route();
        if self.takes_name() {
            format!("{route}{name}")
        } else {
            route.to_string()
        }
    }
}

/// An encoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Operation.
    pub api: Api,
    /// Target enclave; ignored by operations outside enclaves.
    pub enclave: String,
    /// Enclave or key name; empty for operations without one.
    pub name: String,
    /// Encoding of `body`.
    pub content_type: String,
    /// Encoding the caller wants the response in.
    pub accept: String,
    /// Encoded request message.
    pub body: Vec<u8>,
}

impl Request {
    /// URL path.
    pub fn path(&self) -> String {
        self.api.path(&self.name)
    }
}

/// An encoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Encoding of `body`.
    pub content_type: String,
    /// Declared body length; negative when unknown.
    pub content_length: i64,
    /// Encoded response message.
    pub body: Vec<u8>,
}

impl Response {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No valid response was received.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<TransportError> for KmsError {
    fn from(err: TransportError) -> Self {
        KmsError::Transport(err.0)
    }
}

/// Delivers requests to a KMS node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the response.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}
