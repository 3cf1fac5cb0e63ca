//! Associated data: context that is authenticated but not encrypted.
//!
//! Associated data supplied to Encrypt or GenerateKey must be replayed
//! byte-for-byte to Decrypt. An absent value is the empty byte sequence;
//! there is no separate "no associated data" mode, so a caller that sent
//! nothing at encryption time must send nothing (or empty) at decryption.

use std::num::NonZeroU32;

/// Caller-supplied associated data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AssociatedData(Vec<u8>);

impl AssociatedData {
    /// Empty associated data.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the value and returns the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns true if no associated data is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for AssociatedData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for AssociatedData {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for AssociatedData {
    fn from(bytes: &[u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for AssociatedData {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Option<Vec<u8>>> for AssociatedData {
    fn from(bytes: Option<Vec<u8>>) -> Self {
        Self(bytes.unwrap_or_default())
    }
}

const BINDING_TAG: &[u8] = b"kms-binding-v1";

/// Builds the bytes a server authenticates alongside a ciphertext.
///
/// The encoding is injective: each variable-length component is prefixed
/// with its 32-bit big-endian length, so no two distinct
/// `(enclave, key, version, associated data)` tuples produce the same
/// output. A ciphertext therefore cannot be replayed under another enclave,
/// key or version, nor with different caller associated data.
pub fn binding(
    enclave: &str,
    key: &str,
    version: NonZeroU32,
    associated_data: &AssociatedData,
) -> Vec<u8> {
    let ad = associated_data.as_bytes();
    let mut out =
        Vec::with_capacity(BINDING_TAG.len() + 16 + enclave.len() + key.len() + ad.len());
    out.extend_from_slice(BINDING_TAG);
    push_prefixed(&mut out, enclave.as_bytes());
    push_prefixed(&mut out, key.as_bytes());
    out.extend_from_slice(&version.get().to_be_bytes());
    push_prefixed(&mut out, ad);
    out
}

fn push_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    // Lengths are bounded by the transport; anything past u32::MAX would
    // already have been rejected as too large.
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
}
