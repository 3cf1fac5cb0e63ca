//! Protocol error types.

use thiserror::Error;

/// Coarse classification of a [`KmsError`].
///
/// Callers branch on the kind: `InvalidRequest` means "fix your request",
/// `NotFound` means "the referenced object does not exist", `Integrity`
/// means a ciphertext did not authenticate and `Transport` means no valid
/// response was received at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, detected before any cryptographic or network work.
    InvalidRequest,
    /// Unknown enclave, key or key version.
    NotFound,
    /// An enclave or key with that name already exists.
    AlreadyExists,
    /// Decryption failed to authenticate the ciphertext.
    Integrity,
    /// The server failed for a reason not caused by the request.
    Internal,
    /// No valid response was received.
    Transport,
}

impl ErrorKind {
    /// Maps a response status code to an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            409 => Self::AlreadyExists,
            422 => Self::Integrity,
            400..=499 => Self::InvalidRequest,
            _ => Self::Internal,
        }
    }
}

/// Errors returned by protocol operations.
#[derive(Debug, Error)]
pub enum KmsError {
    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A data key length outside `0..=1024` was requested.
    #[error("invalid key length: {0} (max {max})", max = crate::key::MAX_DATA_KEY_LENGTH)]
    InvalidKeyLength(u32),

    /// A message declared a negative content length.
    #[error("content length is negative")]
    LengthRequired,

    /// A payload exceeds the server size limit.
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Enclave not found.
    #[error("enclave not found: {0}")]
    EnclaveNotFound(String),

    /// Key not found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key version not found.
    #[error("key version not found: {name} v{version}")]
    VersionNotFound {
        /// Key name.
        name: String,
        /// Version number, 0 if the ring has no versions left.
        version: u32,
    },

    /// Enclave already exists.
    #[error("enclave already exists: {0}")]
    EnclaveExists(String),

    /// Key already exists.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// Ciphertext did not authenticate.
    #[error("ciphertext is not authentic")]
    NotAuthentic,

    /// Server-side failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wire mapping failure.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Error reported by a server, classified by its status code.
    #[error("server error ({status}): {message}")]
    Server {
        /// Response status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },

    /// No valid response was received.
    #[error("transport error: {0}")]
    Transport(String),
}

impl KmsError {
    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidKeyLength(_)
            | Self::LengthRequired
            | Self::PayloadTooLarge { .. }
            | Self::Wire(_) => ErrorKind::InvalidRequest,
            Self::EnclaveNotFound(_) | Self::KeyNotFound(_) | Self::VersionNotFound { .. } => {
                ErrorKind::NotFound
            },
            Self::EnclaveExists(_) | Self::KeyExists(_) => ErrorKind::AlreadyExists,
            Self::NotAuthentic => ErrorKind::Integrity,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Server { status, .. } => ErrorKind::from_status(*status),
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Returns the status code a server reports this error with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::LengthRequired => 411,
            Self::PayloadTooLarge { .. } => 413,
            Self::Server { status, .. } => *status,
            _ => match self.kind() {
                ErrorKind::InvalidRequest => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::AlreadyExists => 409,
                ErrorKind::Integrity => 422,
                ErrorKind::Internal | ErrorKind::Transport => 500,
            },
        }
    }
}

/// Errors converting between wire messages and domain types.
#[derive(Debug, Error)]
pub enum WireError {
    /// Bytes could not be decoded in the declared encoding.
    #[error("malformed message: {0}")]
    Decode(String),

    /// A value could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// A numeric field does not fit the target type.
    #[error("field {field} out of range: {value}")]
    OutOfRange {
        /// Field label.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// A field that must reference an exact key version was zero.
    #[error("field {0} must not be zero")]
    ZeroVersion(&'static str),

    /// Unknown cluster role.
    #[error("unknown node role: {0:?}")]
    UnknownRole(String),

    /// Unknown key type.
    #[error("unknown key type: {0:?}")]
    UnknownKeyType(String),

    /// Malformed duration.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// Malformed timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A node is reported both up and down.
    #[error("node {0} is reported both up and down")]
    DuplicateNode(u32),
}
