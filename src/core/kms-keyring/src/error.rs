//! Key ring error types.

use kms_crypto::CryptoError;
use kms_protocol::KmsError;
use thiserror::Error;

/// Errors that can occur in the key ring engine.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// Enclave not found.
    #[error("enclave not found: {0}")]
    EnclaveNotFound(String),

    /// Enclave already exists.
    #[error("enclave already exists: {0}")]
    EnclaveExists(String),

    /// Key not found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key already exists.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// Key version not found.
    #[error("key version not found: {name} v{version}")]
    VersionNotFound {
        /// Key name.
        name: String,
        /// Requested version, 0 for the latest.
        version: u32,
    },

    /// Key ring has used up its version numbers.
    #[error("key {0} has no version numbers left")]
    VersionsExhausted(String),

    /// Plaintext exceeds the configured limit.
    #[error("plaintext too large: {len} bytes (max {max})")]
    PlaintextTooLarge {
        /// Plaintext length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// Ciphertext did not authenticate.
    #[error("ciphertext is not authentic")]
    NotAuthentic,

    /// Request rejected by protocol validation.
    #[error(transparent)]
    Protocol(#[from] KmsError),

    /// Cryptographic error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<KeyringError> for KmsError {
    fn from(err: KeyringError) -> Self {
        match err {
            KeyringError::EnclaveNotFound(name) => KmsError::EnclaveNotFound(name),
            KeyringError::EnclaveExists(name) => KmsError::EnclaveExists(name),
            KeyringError::KeyNotFound(name) => KmsError::KeyNotFound(name),
            KeyringError::KeyExists(name) => KmsError::KeyExists(name),
            KeyringError::VersionNotFound { name, version } => {
                KmsError::VersionNotFound { name, version }
            },
            KeyringError::PlaintextTooLarge { len, max } => KmsError::PayloadTooLarge { len, max },
            KeyringError::NotAuthentic | KeyringError::Crypto(CryptoError::DecryptionFailed) => {
                KmsError::NotAuthentic
            },
            KeyringError::Protocol(err) => err,
            err @ (KeyringError::VersionsExhausted(_) | KeyringError::Crypto(_)) => {
                KmsError::Internal(err.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use kms_protocol::ErrorKind;

    use super::*;

    #[test]
    fn test_kinds() {
        let cases = [
            (KeyringError::EnclaveNotFound("e".into()), ErrorKind::NotFound),
            (KeyringError::KeyExists("k".into()), ErrorKind::AlreadyExists),
            (
                KeyringError::VersionNotFound {
                    name: "k".into(),
                    version: 4,
                },
                ErrorKind::NotFound,
            ),
            (KeyringError::NotAuthentic, ErrorKind::Integrity),
            (
                KeyringError::Crypto(CryptoError::DecryptionFailed),
                ErrorKind::Integrity,
            ),
            (
                KeyringError::Crypto(CryptoError::EncryptionFailed("rng".into())),
                ErrorKind::Internal,
            ),
            (
                KeyringError::PlaintextTooLarge { len: 2, max: 1 },
                ErrorKind::InvalidRequest,
            ),
            (
                KeyringError::Protocol(KmsError::InvalidKeyLength(2048)),
                ErrorKind::InvalidRequest,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(KmsError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_too_large_status() {
        let err: KmsError = KeyringError::PlaintextTooLarge { len: 2, max: 1 }.into();
        assert_eq!(err.status_code(), 413);
    }
}
