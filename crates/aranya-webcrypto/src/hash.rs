//! Hash algorithm identifiers.

use core::{fmt, str::FromStr};

use buggy::{Bug, bug};
use serde::{Deserialize, Serialize};

/// A hash algorithm supported by the backend.
///
/// The set is closed. Every value maps to exactly one backend
/// identifier string and back.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[repr(u8)]
pub enum HashAlgorithm {
    /// SHA-1.
    ///
    /// Only use this for interoperability with legacy systems.
    #[serde(rename = "SHA-1")]
    Sha1 = 0,
    /// SHA-256.
    #[serde(rename = "SHA-256")]
    Sha256 = 1,
    /// SHA-384.
    #[serde(rename = "SHA-384")]
    Sha384 = 2,
    /// SHA-512.
    #[serde(rename = "SHA-512")]
    Sha512 = 3,
}

impl HashAlgorithm {
    /// Every supported hash algorithm.
    pub const ALL: [Self; 4] = [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Returns the backend identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Returns the size in bytes of the digest.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns the size in bytes of the hash's internal block.
    ///
    /// This is also the default HMAC key length.
    pub const fn block_len(self) -> usize {
        match self {
            Self::Sha1 | Self::Sha256 => 64,
            Self::Sha384 | Self::Sha512 => 128,
        }
    }

    /// Converts a raw discriminant back into a
    /// [`HashAlgorithm`].
    ///
    /// A discriminant outside of the closed set means that the
    /// caller and this enum have drifted apart, which is a bug.
    #[track_caller]
    pub fn from_repr(repr: u8) -> Result<Self, Bug> {
        let alg = match repr {
            0 => Self::Sha1,
            1 => Self::Sha256,
            2 => Self::Sha384,
            3 => Self::Sha512,
            _ => bug!("hash algorithm discriminant out of range"),
        };
        Ok(alg)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnknownHashAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or(UnknownHashAlgorithm(()))
    }
}

/// Returned by [`HashAlgorithm::from_str`] when the identifier
/// is not recognized.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown hash algorithm")]
pub struct UnknownHashAlgorithm(());
