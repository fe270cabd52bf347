//! Key usages.
//!
//! Converting a [`KeyUsage`] to its label is total. Converting
//! a label to a [`KeyUsage`] is partial: unknown labels are
//! dropped, not rejected, so that keys described by newer
//! backends can still be used with the usages we do know about.

use core::{fmt, iter::FusedIterator};

use buggy::{Bug, bug};
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeSeq as _};
use tracing::debug;

/// An operation that a key is allowed to perform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum KeyUsage {
    /// Encrypt data.
    Encrypt = 0,
    /// Decrypt data.
    Decrypt = 1,
    /// Create signatures and MACs.
    Sign = 2,
    /// Verify signatures and MACs.
    Verify = 3,
    /// Derive other keys.
    DeriveKey = 4,
    /// Derive raw bits.
    DeriveBits = 5,
    /// Wrap (encrypt) other keys.
    WrapKey = 6,
    /// Unwrap (decrypt) other keys.
    UnwrapKey = 7,
}

impl KeyUsage {
    /// Every key usage.
    pub const ALL: [Self; 8] = [
        Self::Encrypt,
        Self::Decrypt,
        Self::Sign,
        Self::Verify,
        Self::DeriveKey,
        Self::DeriveBits,
        Self::WrapKey,
        Self::UnwrapKey,
    ];

    /// Returns the backend label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
        }
    }

    /// Parses a backend label.
    ///
    /// Returns `None` if the label is not recognized.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.label() == label)
    }

    /// Converts a raw discriminant back into a [`KeyUsage`].
    ///
    /// A discriminant outside of the closed set is a bug.
    #[track_caller]
    pub fn from_repr(repr: u8) -> Result<Self, Bug> {
        let usage = match repr {
            0 => Self::Encrypt,
            1 => Self::Decrypt,
            2 => Self::Sign,
            3 => Self::Verify,
            4 => Self::DeriveKey,
            5 => Self::DeriveBits,
            6 => Self::WrapKey,
            7 => Self::UnwrapKey,
            _ => bug!("key usage discriminant out of range"),
        };
        Ok(usage)
    }

    #[allow(clippy::arithmetic_side_effects)] // discriminants are < 8
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A set of [`KeyUsage`]s.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct KeyUsages(u8);

impl KeyUsages {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Creates a set from a list of usages.
    pub const fn from_slice(usages: &[KeyUsage]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < usages.len() {
            bits |= usages[i].bit();
            // Cannot overflow since `i < usages.len()`.
            #[allow(clippy::arithmetic_side_effects)]
            {
                i += 1;
            }
        }
        Self(bits)
    }

    /// Creates a set from untrusted backend labels.
    ///
    /// Unrecognized labels are skipped.
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut set = Self::EMPTY;
        for label in labels {
            let label = label.as_ref();
            match KeyUsage::from_label(label) {
                Some(usage) => set.insert(usage),
                None => debug!(label, "dropping unknown key usage"),
            }
        }
        set
    }

    /// Reports whether the set contains `usage`.
    pub const fn contains(self, usage: KeyUsage) -> bool {
        self.0 & usage.bit() != 0
    }

    /// Adds `usage` to the set.
    pub fn insert(&mut self, usage: KeyUsage) {
        self.0 |= usage.bit();
    }

    /// Returns the usages in both `self` and `other`.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns the usages in `self` that are not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Reports whether every usage in `self` is also in `other`.
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Reports whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of usages in the set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns an iterator over the usages, in discriminant
    /// order.
    pub const fn iter(self) -> Iter {
        Iter { bits: self.0 }
    }

    /// Returns the backend labels for the set.
    pub fn labels(self) -> Vec<&'static str> {
        self.iter().map(KeyUsage::label).collect()
    }
}

impl fmt::Debug for KeyUsages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<KeyUsage> for KeyUsages {
    fn from(usage: KeyUsage) -> Self {
        Self(usage.bit())
    }
}

impl<const N: usize> From<[KeyUsage; N]> for KeyUsages {
    fn from(usages: [KeyUsage; N]) -> Self {
        Self::from_slice(&usages)
    }
}

impl FromIterator<KeyUsage> for KeyUsages {
    fn from_iter<I: IntoIterator<Item = KeyUsage>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for usage in iter {
            set.insert(usage);
        }
        set
    }
}

impl IntoIterator for KeyUsages {
    type Item = KeyUsage;
    type IntoIter = Iter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over [`KeyUsages`].
#[derive(Clone, Debug)]
pub struct Iter {
    bits: u8,
}

impl Iterator for Iter {
    type Item = KeyUsage;

    fn next(&mut self) -> Option<Self::Item> {
        let usage = KeyUsage::ALL
            .into_iter()
            .find(|u| self.bits & u.bit() != 0)?;
        self.bits &= !usage.bit();
        Some(usage)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter {}

impl FusedIterator for Iter {}

impl Serialize for KeyUsages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for usage in self.iter() {
            seq.serialize_element(usage.label())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for KeyUsages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let labels = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_labels(labels))
    }
}
