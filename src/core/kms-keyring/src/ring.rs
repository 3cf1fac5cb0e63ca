//! Key rings and version resolution.
//!
//! A key ring holds the versions of one key. Numbers are assigned from a
//! counter that only moves forward, so a removed version number is never
//! handed out again.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use kms_crypto::{Cipher, CryptoError, KeyMaterial};
use kms_protocol::{KeyType, Version, VersionRef};

/// One version of a key.
#[derive(Debug)]
pub struct KeyVersion {
    version: Version,
    key_type: KeyType,
    created_at: DateTime<Utc>,
    created_by: String,
    material: KeyMaterial,
}

impl KeyVersion {
    fn generate(version: Version, key_type: KeyType, created_by: &str) -> Self {
        Self {
            version,
            key_type,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            material: KeyMaterial::generate(),
        }
    }

    /// Version number.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Algorithm.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Creator identity.
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    fn cipher(&self) -> Cipher {
        match self.key_type {
            KeyType::Aes256 => Cipher::Aes256Gcm,
            KeyType::ChaCha20 => Cipher::ChaCha20Poly1305,
        }
    }

    /// Encrypts `plaintext`, authenticating `binding`.
    pub fn encrypt(&self, plaintext: &[u8], binding: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.material.encrypt(self.cipher(), plaintext, binding)
    }

    /// Decrypts `ciphertext`, authenticating `binding`.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        binding: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.material.decrypt(self.cipher(), ciphertext, binding)
    }

    /// Computes a MAC over `message`.
    pub fn mac(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.material.mac(message)
    }
}

/// The versions of one key.
#[derive(Debug)]
pub struct KeyRing {
    versions: BTreeMap<Version, KeyVersion>,
    next_version: Option<Version>,
}

impl KeyRing {
    /// Creates a ring holding version 1.
    pub fn new(key_type: KeyType, created_by: &str) -> Self {
        let first = NonZeroU32::MIN;
        Self {
            versions: BTreeMap::from([(first, KeyVersion::generate(first, key_type, created_by))]),
            next_version: first.checked_add(1),
        }
    }

    /// Adds a version and returns its number, or `None` if the ring has
    /// used up all version numbers.
    pub fn add_version(&mut self, key_type: KeyType, created_by: &str) -> Option<Version> {
        let version = self.next_version?;
        self.next_version = version.checked_add(1);
        self.versions
            .insert(version, KeyVersion::generate(version, key_type, created_by));
        Some(version)
    }

    /// Removes a version and returns its number.
    pub fn remove_version(&mut self, version: VersionRef) -> Option<Version> {
        let version = self.resolve(version)?.version();
        self.versions.remove(&version);
        Some(version)
    }

    /// Resolves a version reference: the newest version for
    /// [`VersionRef::Latest`], otherwise an exact match.
    pub fn resolve(&self, version: VersionRef) -> Option<&KeyVersion> {
        match version {
            VersionRef::Latest => self.latest(),
            VersionRef::Exact(v) => self.versions.get(&v),
        }
    }

    /// The newest version.
    pub fn latest(&self) -> Option<&KeyVersion> {
        self.versions.values().next_back()
    }

    /// Versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &KeyVersion> {
        self.versions.values()
    }

    /// Number of versions.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns true if every version was removed.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
