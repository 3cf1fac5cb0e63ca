//! # KMS Keyring
//!
//! Server side of the envelope-encryption protocol: enclaves of named key
//! rings held in memory, and the Encrypt, Decrypt, GenerateKey and MAC
//! operations served from them.
//!
//! ## Ciphertext Binding
//!
//! Every ciphertext authenticates the enclave, key name and key version
//! that produced it together with the caller's associated data, so it
//! only decrypts under that exact combination.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod ring;

pub use engine::{EngineConfig, KeyringEngine};
pub use error::KeyringError;
pub use ring::{KeyRing, KeyVersion};
