//! HMAC-SHA256 message authentication.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Size of an HMAC-SHA256 tag in bytes.
pub const TAG_SIZE: usize = 32;

/// Computes the HMAC-SHA256 tag of `message`.
///
/// Deterministic: the same key and message always produce the same tag.
pub fn sign(key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_test_case_2() {
        let tag = sign(b"Jefe", b"what do ya want for nothing?").unwrap();

        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap();
        assert_eq!(tag, expected);
    }

    #[test]
    fn test_sign_deterministic() {
        let key = [0x42u8; 32];

        let tag1 = sign(&key, b"message").unwrap();
        let tag2 = sign(&key, b"message").unwrap();

        assert_eq!(tag1, tag2);
        assert_eq!(tag1.len(), TAG_SIZE);
    }
}
