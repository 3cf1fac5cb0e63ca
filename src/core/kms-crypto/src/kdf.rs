//! HKDF-SHA256 (RFC 5869).
//!
//! A key version holds one secret. Its encryption key and MAC key are
//! expanded from that secret under distinct info labels.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::aead::KEY_SIZE;
use crate::error::CryptoError;

/// Longest output HKDF-SHA256 can expand to (255 hash blocks).
pub const MAX_OUTPUT_LEN: usize = 255 * 32;

/// Expands `ikm` into `length` bytes of key material bound to `info`.
pub fn derive_key(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if !(1..=MAX_OUTPUT_LEN).contains(&length) {
        return Err(CryptoError::InvalidInput(format!(
            "HKDF output length must be 1..={}, got {}",
            MAX_OUTPUT_LEN, length
        )));
    }

    let mut okm = Zeroizing::new(vec![0u8; length]);
    Hkdf::<Sha256>::new(salt, ikm)
        .expand(info, okm.as_mut_slice())
        .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?;

    Ok(okm)
}

/// Derives the 256-bit key a key version uses for one purpose.
pub fn derive_subkey(
    secret: &[u8],
    label: &[u8],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
    let derived = derive_key(secret, None, label, KEY_SIZE)?;

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&derived);

    Ok(key)
}
