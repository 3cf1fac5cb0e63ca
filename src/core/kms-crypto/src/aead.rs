//! Authenticated encryption with associated data.
//!
//! Key rings support two AEAD ciphers, AES-256-GCM and ChaCha20-Poly1305.
//! Both use 32-byte keys, 12-byte nonces and 16-byte tags, so the ciphertext
//! layout is shared:
//!
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`

use aes_gcm::{
    aead::{Aead, KeyInit, Nonce, Payload},
    Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::random;

/// Size of a cipher key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of a nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of an authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// AEAD cipher selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cipher {
    /// AES-256 in Galois/Counter mode.
    Aes256Gcm,
    /// ChaCha20 stream cipher with Poly1305 authenticator.
    ChaCha20Poly1305,
}

/// Encrypts `plaintext` and binds `associated_data` to the result.
///
/// A fresh random nonce is generated and prepended to the ciphertext.
/// Empty associated data is valid and distinct from any non-empty value.
pub fn encrypt(
    cipher: Cipher,
    key: &[u8],
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;

    let nonce_bytes = random::nonce();
    let payload = Payload {
        msg: plaintext,
        aad: associated_data,
    };

    let ciphertext = match cipher {
        Cipher::Aes256Gcm => seal::<Aes256Gcm>(key, &nonce_bytes, payload)?,
        Cipher::ChaCha20Poly1305 => seal::<ChaCha20Poly1305>(key, &nonce_bytes, payload)?,
    };

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypts a ciphertext produced by [`encrypt`].
///
/// Every failure after the key check (short input, tag mismatch, wrong
/// associated data) returns [`CryptoError::DecryptionFailed`].
pub fn decrypt(
    cipher: Cipher,
    key: &[u8],
    ciphertext: &[u8],
    associated_data: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    check_key(key)?;

    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce, encrypted) = ciphertext.split_at(NONCE_SIZE);
    let payload = Payload {
        msg: encrypted,
        aad: associated_data,
    };

    let plaintext = match cipher {
        Cipher::Aes256Gcm => open::<Aes256Gcm>(key, nonce, payload)?,
        Cipher::ChaCha20Poly1305 => open::<ChaCha20Poly1305>(key, nonce, payload)?,
    };

    Ok(Zeroizing::new(plaintext))
}

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            key.len()
        )));
    }
    Ok(())
}

fn seal<C: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8; NONCE_SIZE],
    payload: Payload<'_, '_>,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = C::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    cipher
        .encrypt(Nonce::<C>::from_slice(nonce), payload)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

fn open<C: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    payload: Payload<'_, '_>,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = C::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), payload)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::random::key_material;

    const CIPHERS: [Cipher; 2] = [Cipher::Aes256Gcm, Cipher::ChaCha20Poly1305];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        for cipher in CIPHERS {
            let key = key_material();
            let plaintext = b"Hello, KMS!";

            let ciphertext = encrypt(cipher, &*key, plaintext, b"").unwrap();
            let decrypted = decrypt(cipher, &*key, &ciphertext, b"").unwrap();

            assert_eq!(&*decrypted, plaintext);
        }
    }

    #[test]
    fn test_encrypt_decrypt_with_aad() {
        for cipher in CIPHERS {
            let key = key_material();
            let aad = b"additional authenticated data";

            let ciphertext = encrypt(cipher, &*key, b"secret data", aad).unwrap();
            let decrypted = decrypt(cipher, &*key, &ciphertext, aad).unwrap();

            assert_eq!(&*decrypted, b"secret data");
        }
    }

    #[test]
    fn test_decrypt_wrong_aad_fails() {
        for cipher in CIPHERS {
            let key = key_material();

            let ciphertext = encrypt(cipher, &*key, b"secret data", b"correct aad").unwrap();
            let result = decrypt(cipher, &*key, &ciphertext, b"wrong aad");

            assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
        }
    }

    #[test]
    fn test_empty_aad_differs_from_nonempty() {
        let key = key_material();

        let ciphertext = encrypt(Cipher::Aes256Gcm, &*key, b"data", b"").unwrap();
        let result = decrypt(Cipher::Aes256Gcm, &*key, &ciphertext, b"\0");

        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = key_material();
        let key2 = key_material();

        let ciphertext = encrypt(Cipher::Aes256Gcm, &*key1, b"secret data", b"").unwrap();
        let result = decrypt(Cipher::Aes256Gcm, &*key2, &ciphertext, b"");

        assert!(result.is_err());
    }

    #[test]
    fn test_decrypt_wrong_cipher_fails() {
        let key = key_material();

        let ciphertext = encrypt(Cipher::Aes256Gcm, &*key, b"secret data", b"").unwrap();
        let result = decrypt(Cipher::ChaCha20Poly1305, &*key, &ciphertext, b"");

        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_invalid_key_size() {
        let short_key = vec![0u8; 16];

        let result = encrypt(Cipher::Aes256Gcm, &short_key, b"test", b"");
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_ciphertext_format() {
        for cipher in CIPHERS {
            let key = key_material();
            let plaintext = b"test";

            let ciphertext = encrypt(cipher, &*key, plaintext, b"").unwrap();

            assert_eq!(ciphertext.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
        }
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = key_material();

        let ciphertext = encrypt(Cipher::Aes256Gcm, &*key, b"secret", b"").unwrap();

        for len in [0, NONCE_SIZE, NONCE_SIZE + TAG_SIZE - 1, ciphertext.len() - 1] {
            let result = decrypt(Cipher::Aes256Gcm, &*key, &ciphertext[..len], b"");
            assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = key_material();

        let mut ciphertext = encrypt(Cipher::ChaCha20Poly1305, &*key, b"secret", b"").unwrap();
        ciphertext[NONCE_SIZE] ^= 0xFF;

        let result = decrypt(Cipher::ChaCha20Poly1305, &*key, &ciphertext, b"");
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }
}
