//! Key ring engine.
//!
//! Holds enclaves of key rings in memory and serves the envelope operations
//! against them. Cryptographic operations take the read lock; lifecycle
//! operations take the write lock.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use kms_crypto::random;
use kms_protocol::associated_data::binding;
use kms_protocol::client::DEFAULT_ENCLAVE;
use kms_protocol::list::DEFAULT_LIST_LIMIT;
use kms_protocol::name::validate_name;
use kms_protocol::{
    AddKeyVersionRequest, CreateKeyRequest, DecryptRequest, DecryptResponse, DescribeKeyRequest,
    EncryptRequest, EncryptResponse, Envelope, GenerateKeyRequest, GenerateKeyResponse, KeyStatus,
    ListRequest, ListResponse, MacRequest, MacResponse, RemoveKeyVersionRequest, Version,
    VersionRef,
};

use crate::error::KeyringError;
use crate::ring::{KeyRing, KeyVersion};

/// Largest plaintext Encrypt accepts by default (1 MiB).
pub const DEFAULT_MAX_PLAINTEXT_LEN: usize = 1 << 20;

/// Engine limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest plaintext Encrypt accepts.
    pub max_plaintext_len: usize,
    /// Page size of list requests without a limit.
    pub default_list_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_plaintext_len: DEFAULT_MAX_PLAINTEXT_LEN,
            default_list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

#[derive(Debug, Default)]
struct Enclave {
    keys: BTreeMap<String, KeyRing>,
}

/// In-memory key ring engine.
///
/// The `default` enclave exists from the start.
#[derive(Debug)]
pub struct KeyringEngine {
    config: EngineConfig,
    enclaves: RwLock<BTreeMap<String, Enclave>>,
}

impl Default for KeyringEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl KeyringEngine {
    /// Creates an engine holding only the default enclave.
    pub fn new(config: EngineConfig) -> Self {
        let mut enclaves = BTreeMap::new();
        enclaves.insert(DEFAULT_ENCLAVE.to_string(), Enclave::default());

        info!(
            max_plaintext_len = config.max_plaintext_len,
            default_list_limit = config.default_list_limit,
            "Keyring engine initialized"
        );

        Self {
            config,
            enclaves: RwLock::new(enclaves),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Lookup Helpers
    // ========================================================================

    fn enclave<'a>(
        enclaves: &'a BTreeMap<String, Enclave>,
        enclave: &str,
    ) -> Result<&'a Enclave, KeyringError> {
        enclaves
            .get(enclave)
            .ok_or_else(|| KeyringError::EnclaveNotFound(enclave.to_string()))
    }

    fn enclave_mut<'a>(
        enclaves: &'a mut BTreeMap<String, Enclave>,
        enclave: &str,
    ) -> Result<&'a mut Enclave, KeyringError> {
        enclaves
            .get_mut(enclave)
            .ok_or_else(|| KeyringError::EnclaveNotFound(enclave.to_string()))
    }

    fn ring_mut<'a>(
        enclaves: &'a mut BTreeMap<String, Enclave>,
        enclave: &str,
        name: &str,
    ) -> Result<&'a mut KeyRing, KeyringError> {
        Self::enclave_mut(enclaves, enclave)?
            .keys
            .get_mut(name)
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))
    }

    fn key_version<'a>(
        enclaves: &'a BTreeMap<String, Enclave>,
        enclave: &str,
        name: &str,
        version: VersionRef,
    ) -> Result<&'a KeyVersion, KeyringError> {
        let ring = Self::enclave(enclaves, enclave)?
            .keys
            .get(name)
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))?;

        ring.resolve(version)
            .ok_or_else(|| KeyringError::VersionNotFound {
                name: name.to_string(),
                version: version.to_wire(),
            })
    }

    // ========================================================================
    // Enclave Operations
    // ========================================================================

    /// Creates an empty enclave.
    pub async fn create_enclave(&self, name: &str) -> Result<(), KeyringError> {
        validate_name(name)?;

        let mut enclaves = self.enclaves.write().await;
        if enclaves.contains_key(name) {
            return Err(KeyringError::EnclaveExists(name.to_string()));
        }
        enclaves.insert(name.to_string(), Enclave::default());

        info!(enclave = name, "Enclave created");
        Ok(())
    }

    /// Deletes an enclave and all its keys.
    pub async fn delete_enclave(&self, name: &str) -> Result<(), KeyringError> {
        let removed = self
            .enclaves
            .write()
            .await
            .remove(name)
            .ok_or_else(|| KeyringError::EnclaveNotFound(name.to_string()))?;

        warn!(enclave = name, keys = removed.keys.len(), "Enclave deleted");
        Ok(())
    }

    /// Lists enclave names.
    pub async fn list_enclaves(&self, request: &ListRequest) -> ListResponse {
        let enclaves = self.enclaves.read().await;
        request.page(
            enclaves.keys().map(String::as_str),
            self.config.default_list_limit,
        )
    }

    // ========================================================================
    // Key Lifecycle
    // ========================================================================

    /// Creates a key with version 1.
    pub async fn create_key(
        &self,
        enclave: &str,
        name: &str,
        request: &CreateKeyRequest,
        created_by: &str,
    ) -> Result<(), KeyringError> {
        validate_name(name)?;
        let key_type = request.key_type.unwrap_or_default();

        let mut enclaves = self.enclaves.write().await;
        let keys = &mut Self::enclave_mut(&mut enclaves, enclave)?.keys;
        if keys.contains_key(name) {
            return Err(KeyringError::KeyExists(name.to_string()));
        }
        keys.insert(name.to_string(), KeyRing::new(key_type, created_by));

        info!(enclave = enclave, name = name, key_type = %key_type, "Key created");
        Ok(())
    }

    /// Adds a version to a key ring and returns its number.
    pub async fn add_key_version(
        &self,
        enclave: &str,
        name: &str,
        request: &AddKeyVersionRequest,
        created_by: &str,
    ) -> Result<Version, KeyringError> {
        let key_type = request.key_type.unwrap_or_default();

        let mut enclaves = self.enclaves.write().await;
        let version = Self::ring_mut(&mut enclaves, enclave, name)?
            .add_version(key_type, created_by)
            .ok_or_else(|| KeyringError::VersionsExhausted(name.to_string()))?;

        info!(
            enclave = enclave,
            name = name,
            version = version.get(),
            key_type = %key_type,
            "Key version added"
        );
        Ok(version)
    }

    /// Removes one version from a key ring and returns its number.
    ///
    /// Removing the only version leaves an empty ring.
    pub async fn remove_key_version(
        &self,
        enclave: &str,
        name: &str,
        request: &RemoveKeyVersionRequest,
    ) -> Result<Version, KeyringError> {
        let mut enclaves = self.enclaves.write().await;
        let version = Self::ring_mut(&mut enclaves, enclave, name)?
            .remove_version(request.version)
            .ok_or_else(|| KeyringError::VersionNotFound {
                name: name.to_string(),
                version: request.version.to_wire(),
            })?;

        warn!(
            enclave = enclave,
            name = name,
            version = version.get(),
            "Key version removed"
        );
        Ok(version)
    }

    /// Deletes a key and all its versions.
    pub async fn delete_key(&self, enclave: &str, name: &str) -> Result<(), KeyringError> {
        let mut enclaves = self.enclaves.write().await;
        let ring = Self::enclave_mut(&mut enclaves, enclave)?
            .keys
            .remove(name)
            .ok_or_else(|| KeyringError::KeyNotFound(name.to_string()))?;

        warn!(
            enclave = enclave,
            name = name,
            versions = ring.len(),
            "Key deleted"
        );
        Ok(())
    }

    /// Describes one version of a key.
    pub async fn describe_key(
        &self,
        enclave: &str,
        name: &str,
        request: &DescribeKeyRequest,
    ) -> Result<KeyStatus, KeyringError> {
        let enclaves = self.enclaves.read().await;
        let key = Self::key_version(&enclaves, enclave, name, request.version)?;

        Ok(KeyStatus {
            name: name.to_string(),
            version: key.version(),
            key_type: key.key_type(),
            created_at: key.created_at(),
            created_by: key.created_by().to_string(),
        })
    }

    /// Lists key names in an enclave.
    pub async fn list_keys(
        &self,
        enclave: &str,
        request: &ListRequest,
    ) -> Result<ListResponse, KeyringError> {
        let enclaves = self.enclaves.read().await;
        let keys = &Self::enclave(&enclaves, enclave)?.keys;

        Ok(request.page(
            keys.keys().map(String::as_str),
            self.config.default_list_limit,
        ))
    }

    // ========================================================================
    // Envelope Operations
    // ========================================================================

    /// Encrypts a plaintext.
    pub async fn encrypt(
        &self,
        enclave: &str,
        name: &str,
        request: &EncryptRequest,
    ) -> Result<EncryptResponse, KeyringError> {
        if request.plaintext.len() > self.config.max_plaintext_len {
            return Err(KeyringError::PlaintextTooLarge {
                len: request.plaintext.len(),
                max: self.config.max_plaintext_len,
            });
        }

        let enclaves = self.enclaves.read().await;
        let key = Self::key_version(&enclaves, enclave, name, request.version)?;
        let aad = binding(enclave, name, key.version(), &request.associated_data);
        let ciphertext = key.encrypt(&request.plaintext, &aad)?;

        debug!(
            enclave = enclave,
            name = name,
            version = key.version().get(),
            "Encrypted"
        );

        Ok(Envelope {
            version: key.version(),
            ciphertext,
        })
    }

    /// Decrypts a ciphertext with the exact version that produced it.
    ///
    /// Every authentication failure yields [`KeyringError::NotAuthentic`],
    /// whatever the cause.
    pub async fn decrypt(
        &self,
        enclave: &str,
        name: &str,
        request: &DecryptRequest,
    ) -> Result<DecryptResponse, KeyringError> {
        let enclaves = self.enclaves.read().await;
        let key = Self::key_version(&enclaves, enclave, name, VersionRef::Exact(request.version))?;
        let aad = binding(enclave, name, key.version(), &request.associated_data);
        let plaintext = key
            .decrypt(&request.ciphertext, &aad)
            .map_err(|_| KeyringError::NotAuthentic)?;

        debug!(
            enclave = enclave,
            name = name,
            version = key.version().get(),
            "Decrypted"
        );

        Ok(DecryptResponse {
            plaintext: plaintext.to_vec(),
        })
    }

    /// Generates a data key and returns it in plaintext and encrypted.
    ///
    /// The length is checked before any key is looked up.
    pub async fn generate_key(
        &self,
        enclave: &str,
        name: &str,
        request: &GenerateKeyRequest,
    ) -> Result<GenerateKeyResponse, KeyringError> {
        let length = request.data_key_length()?;

        let enclaves = self.enclaves.read().await;
        let key = Self::key_version(&enclaves, enclave, name, request.version)?;
        let data_key = random::data_key(length);
        let aad = binding(enclave, name, key.version(), &request.associated_data);
        let ciphertext = key.encrypt(&data_key, &aad)?;

        debug!(
            enclave = enclave,
            name = name,
            version = key.version().get(),
            length,
            "Data key generated"
        );

        Ok(GenerateKeyResponse {
            version: key.version(),
            plaintext: data_key.to_vec(),
            ciphertext,
        })
    }

    /// Computes a MAC over a message.
    pub async fn mac(
        &self,
        enclave: &str,
        name: &str,
        request: &MacRequest,
    ) -> Result<MacResponse, KeyringError> {
        let enclaves = self.enclaves.read().await;
        let key = Self::key_version(&enclaves, enclave, name, request.version)?;
        let mac = key.mac(&request.message)?;

        Ok(MacResponse {
            version: key.version(),
            mac,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
