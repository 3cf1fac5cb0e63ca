//! Key-version addressing.
//!
//! On the wire a key version is a `uint32` where `0` means "the latest
//! version of the key ring". Real versions start at 1 and are never reused.

use std::fmt;
use std::num::NonZeroU32;

use crate::error::WireError;

/// A concrete key version. Never zero.
pub type Version = NonZeroU32;

/// Reference to a key version: the ring's latest or an exact one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VersionRef {
    /// The most recently created version in the ring.
    #[default]
    Latest,
    /// This exact version; resolving fails if it does not exist.
    Exact(Version),
}

impl VersionRef {
    /// Interprets a wire version number (`0` = latest).
    pub fn from_wire(version: u32) -> Self {
        match NonZeroU32::new(version) {
            Some(v) => Self::Exact(v),
            None => Self::Latest,
        }
    }

    /// Returns the wire version number (`0` = latest).
    pub fn to_wire(self) -> u32 {
        match self {
            Self::Latest => 0,
            Self::Exact(v) => v.get(),
        }
    }

    /// Creates an exact reference, or `Latest` for zero.
    pub fn exact(version: u32) -> Self {
        Self::from_wire(version)
    }
}

impl From<Version> for VersionRef {
    fn from(version: Version) -> Self {
        Self::Exact(version)
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Exact(v) => write!(f, "v{}", v),
        }
    }
}

/// Interprets a wire version that must name an exact version.
///
/// Used where "latest" has no meaning, e.g. decryption: the ciphertext was
/// produced by one specific version and only that version can open it.
pub fn exact_from_wire(field: &'static str, version: u32) -> Result<Version, WireError> {
    NonZeroU32::new(version).ok_or(WireError::ZeroVersion(field))
}
