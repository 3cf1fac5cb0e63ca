//! # KMS Crypto
//!
//! Cryptographic primitives used by KMS key rings.
//!
//! This crate provides the low-level operations behind the envelope
//! encryption protocol:
//! - Authenticated encryption (AES-256-GCM, ChaCha20-Poly1305)
//! - Key derivation (HKDF-SHA256)
//! - Message authentication (HMAC-SHA256)
//! - Secure random generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod mac;
pub mod random;

pub use aead::Cipher;
pub use error::CryptoError;
pub use keys::KeyMaterial;
