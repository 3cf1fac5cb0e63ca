//! Randomness for key material, nonces and data keys.
//!
//! Everything is drawn from the operating system CSPRNG. Secret outputs are
//! wrapped in `Zeroizing`.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::aead::{KEY_SIZE, NONCE_SIZE};

/// Fresh secret for a new key version.
pub fn key_material() -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(key.as_mut_slice());
    key
}

/// Fresh AEAD nonce.
pub fn nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Data encryption key of `len` bytes.
pub fn data_key(len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    OsRng.fill_bytes(key.as_mut_slice());
    key
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_key_material_unique() {
        assert_ne!(*key_material(), *key_material());
    }

    #[test]
    fn test_nonces_unique() {
        assert_ne!(nonce(), nonce());
    }

    #[test]
    fn test_data_key_length() {
        for len in [0, 1, 16, 32, 1024] {
            assert_eq!(data_key(len).len(), len);
        }
    }
}
