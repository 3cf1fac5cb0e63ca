//! Envelope-encryption and key-lifecycle messages.
//!
//! These are the host representations. Every type maps onto one wire
//! message in [`crate::wire::messages`] through [`WireMapping`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::associated_data::AssociatedData;
use crate::error::{KmsError, WireError};
use crate::version::{exact_from_wire, Version, VersionRef};
use crate::wire::{messages, Timestamp, WireMapping};

/// Data key length used when a request omits it or asks for 0.
pub const DEFAULT_DATA_KEY_LENGTH: u32 = 32;

/// Largest data key a server generates.
pub const MAX_DATA_KEY_LENGTH: u32 = 1024;

/// Algorithm of a key version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyType {
    /// AES-256-GCM.
    #[default]
    Aes256,
    /// ChaCha20-Poly1305.
    ChaCha20,
}

impl KeyType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
            Self::ChaCha20 => "ChaCha20",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES256" => Ok(Self::Aes256),
            "ChaCha20" => Ok(Self::ChaCha20),
            other => Err(WireError::UnknownKeyType(other.to_string())),
        }
    }
}

fn key_type_from_wire(value: Option<String>) -> Result<Option<KeyType>, WireError> {
    value.map(|s| s.parse()).transpose()
}

// ============================================================================
// Encrypt
// ============================================================================

/// Encrypts a plaintext under a key version.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct EncryptRequest {
    /// Key version to use.
    pub version: VersionRef,
    /// Plaintext to encrypt.
    pub plaintext: Vec<u8>,
    /// Context that must be replayed at decryption.
    pub associated_data: AssociatedData,
}

impl fmt::Debug for EncryptRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptRequest")
            .field("version", &self.version)
            .field("plaintext", &"[REDACTED]")
            .field("associated_data", &self.associated_data)
            .finish()
    }
}

impl WireMapping for EncryptRequest {
    type Wire = messages::EncryptRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::EncryptRequest {
            version: self.version.to_wire(),
            plaintext: self.plaintext.clone(),
            associated_data: self.associated_data.as_bytes().to_vec(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: VersionRef::from_wire(wire.version),
            plaintext: wire.plaintext,
            associated_data: wire.associated_data.into(),
        })
    }
}

/// A ciphertext together with the key version that produced it.
///
/// The associated data is not part of the envelope; the caller keeps it
/// and replays it at decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Key version used for encryption.
    pub version: Version,
    /// The ciphertext.
    pub ciphertext: Vec<u8>,
}

/// Result of Encrypt.
pub type EncryptResponse = Envelope;

impl WireMapping for Envelope {
    type Wire = messages::EncryptResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::EncryptResponse {
            version: self.version.get(),
            ciphertext: self.ciphertext.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: exact_from_wire("version", wire.version)?,
            ciphertext: wire.ciphertext,
        })
    }
}

// ============================================================================
// Decrypt
// ============================================================================

/// Decrypts a ciphertext with the exact version that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    /// Key version recorded with the ciphertext.
    pub version: Version,
    /// Ciphertext to decrypt.
    pub ciphertext: Vec<u8>,
    /// Associated data used at encryption.
    pub associated_data: AssociatedData,
}

impl DecryptRequest {
    /// Builds a request from an envelope, using the version it records.
    pub fn from_envelope(envelope: &Envelope, associated_data: impl Into<AssociatedData>) -> Self {
        Self {
            version: envelope.version,
            ciphertext: envelope.ciphertext.clone(),
            associated_data: associated_data.into(),
        }
    }
}

impl WireMapping for DecryptRequest {
    type Wire = messages::DecryptRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::DecryptRequest {
            version: self.version.get(),
            ciphertext: self.ciphertext.clone(),
            associated_data: self.associated_data.as_bytes().to_vec(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: exact_from_wire("version", wire.version)?,
            ciphertext: wire.ciphertext,
            associated_data: wire.associated_data.into(),
        })
    }
}

/// Result of Decrypt.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptResponse {
    /// The recovered plaintext.
    pub plaintext: Vec<u8>,
}

impl fmt::Debug for DecryptResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptResponse")
            .field("plaintext", &"[REDACTED]")
            .finish()
    }
}

impl WireMapping for DecryptResponse {
    type Wire = messages::DecryptResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::DecryptResponse {
            plaintext: self.plaintext.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            plaintext: wire.plaintext,
        })
    }
}

// ============================================================================
// GenerateKey
// ============================================================================

/// Generates a fresh data encryption key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerateKeyRequest {
    /// Key version that encrypts the data key.
    pub version: VersionRef,
    /// Context bound to the encrypted data key.
    pub associated_data: AssociatedData,
    /// Data key length in bytes. `None` and `Some(0)` mean the default.
    pub length: Option<u32>,
}

impl GenerateKeyRequest {
    /// Returns the effective data key length.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidKeyLength`] if the length exceeds
    /// [`MAX_DATA_KEY_LENGTH`].
    pub fn data_key_length(&self) -> Result<usize, KmsError> {
        match self.length {
            None | Some(0) => Ok(DEFAULT_DATA_KEY_LENGTH as usize),
            Some(len) if len > MAX_DATA_KEY_LENGTH => Err(KmsError::InvalidKeyLength(len)),
            Some(len) => Ok(len as usize),
        }
    }
}

impl WireMapping for GenerateKeyRequest {
    type Wire = messages::GenerateKeyRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::GenerateKeyRequest {
            version: self.version.to_wire(),
            associated_data: self.associated_data.as_bytes().to_vec(),
            length: self.length,
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: VersionRef::from_wire(wire.version),
            associated_data: wire.associated_data.into(),
            length: wire.length,
        })
    }
}

/// A generated data encryption key.
///
/// The plaintext is meant for immediate use and should not be stored;
/// store [`GenerateKeyResponse::envelope`] instead.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerateKeyResponse {
    /// Key version that encrypted the data key.
    pub version: Version,
    /// Plaintext data key.
    pub plaintext: Vec<u8>,
    /// Data key encrypted under `version`.
    pub ciphertext: Vec<u8>,
}

impl GenerateKeyResponse {
    /// Returns the storable part: the encrypted key and its version.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            version: self.version,
            ciphertext: self.ciphertext.clone(),
        }
    }
}

impl fmt::Debug for GenerateKeyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateKeyResponse")
            .field("version", &self.version)
            .field("plaintext", &"[REDACTED]")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

impl WireMapping for GenerateKeyResponse {
    type Wire = messages::GenerateKeyResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::GenerateKeyResponse {
            version: self.version.get(),
            plaintext: self.plaintext.clone(),
            ciphertext: self.ciphertext.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: exact_from_wire("version", wire.version)?,
            plaintext: wire.plaintext,
            ciphertext: wire.ciphertext,
        })
    }
}

// ============================================================================
// MAC
// ============================================================================

/// Computes a MAC over a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacRequest {
    /// Key version to use.
    pub version: VersionRef,
    /// Message to authenticate.
    pub message: Vec<u8>,
}

impl WireMapping for MacRequest {
    type Wire = messages::MacRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::MacRequest {
            version: self.version.to_wire(),
            message: self.message.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: VersionRef::from_wire(wire.version),
            message: wire.message,
        })
    }
}

/// A MAC tag and the version that computed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacResponse {
    /// Key version used.
    pub version: Version,
    /// The tag.
    pub mac: Vec<u8>,
}

impl WireMapping for MacResponse {
    type Wire = messages::MacResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::MacResponse {
            version: self.version.get(),
            mac: self.mac.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: exact_from_wire("version", wire.version)?,
            mac: wire.mac,
        })
    }
}

// ============================================================================
// Key lifecycle
// ============================================================================

/// Creates a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateKeyRequest {
    /// Algorithm; the server default when `None`.
    pub key_type: Option<KeyType>,
}

impl WireMapping for CreateKeyRequest {
    type Wire = messages::CreateKeyRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::CreateKeyRequest {
            r#type: self.key_type.map(|t| t.as_str().to_string()),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            key_type: key_type_from_wire(wire.r#type)?,
        })
    }
}

/// Adds a version to a key ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddKeyVersionRequest {
    /// Algorithm; the server default when `None`.
    pub key_type: Option<KeyType>,
}

impl WireMapping for AddKeyVersionRequest {
    type Wire = messages::AddKeyVersionRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::AddKeyVersionRequest {
            r#type: self.key_type.map(|t| t.as_str().to_string()),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            key_type: key_type_from_wire(wire.r#type)?,
        })
    }
}

/// Removes a single version from a key ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveKeyVersionRequest {
    /// Version to remove.
    pub version: VersionRef,
}

impl WireMapping for RemoveKeyVersionRequest {
    type Wire = messages::RemoveKeyVersionRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::RemoveKeyVersionRequest {
            version: self.version.to_wire(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: VersionRef::from_wire(wire.version),
        })
    }
}

/// Describes one version of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescribeKeyRequest {
    /// Version to describe.
    pub version: VersionRef,
}

impl WireMapping for DescribeKeyRequest {
    type Wire = messages::DescribeKeyRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::DescribeKeyRequest {
            version: self.version.to_wire(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            version: VersionRef::from_wire(wire.version),
        })
    }
}

/// Description of one key version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    /// Key name.
    pub name: String,
    /// Described version.
    pub version: Version,
    /// Algorithm of the version.
    pub key_type: KeyType,
    /// When the version was created.
    pub created_at: DateTime<Utc>,
    /// Who created the version.
    pub created_by: String,
}

impl WireMapping for KeyStatus {
    type Wire = messages::KeyStatusResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::KeyStatusResponse {
            name: self.name.clone(),
            version: self.version.get(),
            r#type: self.key_type.as_str().to_string(),
            created_at: Some(Timestamp::from_date_time(self.created_at)),
            created_by: self.created_by.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        let created_at = wire
            .created_at
            .ok_or_else(|| WireError::InvalidTimestamp("created_at is missing".to_string()))?
            .to_date_time()?;

        Ok(Self {
            name: wire.name,
            version: exact_from_wire("version", wire.version)?,
            key_type: wire.r#type.parse()?,
            created_at,
            created_by: wire.created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn v(n: u32) -> Version {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_key_type_names() {
        assert_eq!(KeyType::Aes256.to_string(), "AES256");
        assert_eq!("ChaCha20".parse::<KeyType>().unwrap(), KeyType::ChaCha20);
        assert!(matches!(
            "aes256".parse::<KeyType>(),
            Err(WireError::UnknownKeyType(_))
        ));
    }

    #[test]
    fn test_data_key_length_defaults() {
        let mut req = GenerateKeyRequest::default();
        assert_eq!(req.data_key_length().unwrap(), 32);

        req.length = Some(0);
        assert_eq!(req.data_key_length().unwrap(), 32);

        req.length = Some(1);
        assert_eq!(req.data_key_length().unwrap(), 1);

        req.length = Some(MAX_DATA_KEY_LENGTH);
        assert_eq!(req.data_key_length().unwrap(), 1024);
    }

    #[test]
    fn test_data_key_length_too_large() {
        let req = GenerateKeyRequest {
            length: Some(MAX_DATA_KEY_LENGTH + 1),
            ..Default::default()
        };
        assert!(matches!(
            req.data_key_length(),
            Err(KmsError::InvalidKeyLength(1025))
        ));
    }

    #[test]
    fn test_decrypt_rejects_version_zero() {
        let wire = messages::DecryptRequest {
            version: 0,
            ciphertext: vec![1, 2, 3],
            associated_data: vec![],
        };
        assert!(matches!(
            DecryptRequest::from_wire(wire),
            Err(WireError::ZeroVersion("version"))
        ));
    }

    #[test]
    fn test_decrypt_from_envelope_uses_recorded_version() {
        let envelope = Envelope {
            version: v(5),
            ciphertext: vec![9; 40],
        };
        let req = DecryptRequest::from_envelope(&envelope, "ctx");

        assert_eq!(req.version, v(5));
        assert_eq!(req.ciphertext, envelope.ciphertext);
        assert_eq!(req.associated_data, AssociatedData::from("ctx"));
    }

    #[test]
    fn test_encrypt_latest_maps_to_zero() {
        let req = EncryptRequest {
            plaintext: b"hello".to_vec(),
            ..Default::default()
        };
        assert_eq!(req.to_wire().unwrap().version, 0);
    }

    #[test]
    fn test_create_key_type_preserved() {
        let absent = CreateKeyRequest::default().to_wire().unwrap();
        assert_eq!(absent.r#type, None);

        let req = CreateKeyRequest {
            key_type: Some(KeyType::ChaCha20),
        };
        let back = CreateKeyRequest::from_wire(req.to_wire().unwrap()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_unknown_key_type_rejected() {
        let wire = messages::AddKeyVersionRequest {
            r#type: Some("RSA".to_string()),
        };
        assert!(matches!(
            AddKeyVersionRequest::from_wire(wire),
            Err(WireError::UnknownKeyType(_))
        ));
    }

    #[test]
    fn test_key_status_requires_created_at() {
        let wire = messages::KeyStatusResponse {
            name: "k".to_string(),
            version: 1,
            r#type: "AES256".to_string(),
            created_at: None,
            created_by: "admin".to_string(),
        };
        assert!(matches!(
            KeyStatus::from_wire(wire),
            Err(WireError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_debug_redacts_plaintext() {
        let resp = GenerateKeyResponse {
            version: v(1),
            plaintext: vec![0x42; 32],
            ciphertext: vec![0; 60],
        };
        let debug = format!("{:?}", resp);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("66"));
    }
}
