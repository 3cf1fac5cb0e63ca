//! Key version material with automatic memory zeroization.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::aead::{self, Cipher, KEY_SIZE};
use crate::error::CryptoError;
use crate::kdf::derive_subkey;
use crate::mac;
use crate::random;

const ENCRYPTION_LABEL: &[u8] = b"kms-key-version-v1:encrypt";
const MAC_LABEL: &[u8] = b"kms-key-version-v1:mac";

/// The 256-bit secret of one key version.
///
/// Encryption and MAC keys are derived from it on use and never stored,
/// so the same version can serve both purposes without key reuse.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl KeyMaterial {
    /// Generates new random key material.
    pub fn generate() -> Self {
        let key = random::key_material();
        Self { bytes: *key }
    }

    /// Encrypts `plaintext` under the derived encryption key.
    pub fn encrypt(
        &self,
        cipher: Cipher,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let key = derive_subkey(&self.bytes, ENCRYPTION_LABEL)?;
        aead::encrypt(cipher, &*key, plaintext, associated_data)
    }

    /// Decrypts `ciphertext` under the derived encryption key.
    pub fn decrypt(
        &self,
        cipher: Cipher,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let key = derive_subkey(&self.bytes, ENCRYPTION_LABEL)?;
        aead::decrypt(cipher, &*key, ciphertext, associated_data)
    }

    /// Computes an HMAC-SHA256 tag under the derived MAC key.
    pub fn mac(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = derive_subkey(&self.bytes, MAC_LABEL)?;
        mac::sign(&*key, message)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
