//! Opaque key handles.

use std::{fmt, sync::Arc};

use derive_where::derive_where;
use serde::{Deserialize, Serialize};

use crate::{algorithm::AlgorithmName, usage::KeyUsages};

/// The type of a key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyType {
    /// The private half of an asymmetric key pair.
    Private,
    /// The public half of an asymmetric key pair.
    Public,
    /// A symmetric key.
    Secret,
}

impl KeyType {
    /// Returns the backend label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::Secret => "secret",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key import/export format.
///
/// Formats are not validated beyond what the backend rejects.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyFormat {
    /// Raw bytes.
    Raw,
    /// PKCS #8 `PrivateKeyInfo`.
    Pkcs8,
    /// X.509 `SubjectPublicKeyInfo`.
    Spki,
    /// JSON Web Key.
    Jwk,
}

impl KeyFormat {
    /// Returns the backend label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Pkcs8 => "pkcs8",
            Self::Spki => "spki",
            Self::Jwk => "jwk",
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about a [`KeyHandle`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct KeyMeta {
    /// The key's type.
    pub key_type: KeyType,
    /// Whether the key may be exported.
    pub extractable: bool,
    /// What the key may be used for.
    pub usages: KeyUsages,
    /// The algorithm the key was created for.
    pub algorithm: AlgorithmName,
}

/// An opaque reference to backend key material.
///
/// Handles are immutable and cheap to clone. The key material
/// is released when the last clone is dropped.
#[derive_where(Clone)]
pub struct KeyHandle<K> {
    inner: Arc<Inner<K>>,
}

struct Inner<K> {
    native: K,
    meta: KeyMeta,
}

impl<K> KeyHandle<K> {
    pub(crate) fn new(native: K, meta: KeyMeta) -> Self {
        Self {
            inner: Arc::new(Inner { native, meta }),
        }
    }

    /// Returns the backend's key.
    pub(crate) fn native(&self) -> &K {
        &self.inner.native
    }

    /// Returns the key's metadata.
    pub fn meta(&self) -> &KeyMeta {
        &self.inner.meta
    }

    /// Returns the key's type.
    pub fn key_type(&self) -> KeyType {
        self.inner.meta.key_type
    }

    /// Reports whether the key may be exported.
    pub fn extractable(&self) -> bool {
        self.inner.meta.extractable
    }

    /// Returns the key's allowed usages.
    pub fn usages(&self) -> KeyUsages {
        self.inner.meta.usages
    }

    /// Returns the algorithm the key was created for.
    pub fn algorithm(&self) -> AlgorithmName {
        self.inner.meta.algorithm
    }

    /// Reports whether `self` and `other` refer to the same key.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K> fmt::Debug for KeyHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("meta", &self.inner.meta)
            .finish_non_exhaustive()
    }
}

/// An asymmetric key pair.
///
/// Each half owns its key material independently.
#[derive_where(Clone, Debug)]
pub struct KeyPair<K> {
    /// The private key.
    pub private_key: KeyHandle<K>,
    /// The public key.
    pub public_key: KeyHandle<K>,
}

impl<K> KeyPair<K> {
    /// Splits the pair into `(private, public)`.
    pub fn into_parts(self) -> (KeyHandle<K>, KeyHandle<K>) {
        (self.private_key, self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::usage::KeyUsage;

    struct Tracked<'a>(&'a AtomicUsize);

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn meta(key_type: KeyType) -> KeyMeta {
        KeyMeta {
            key_type,
            extractable: false,
            usages: KeyUsage::Sign.into(),
            algorithm: AlgorithmName::Ecdsa,
        }
    }

    #[test]
    fn test_released_on_last_drop() {
        let drops = AtomicUsize::new(0);
        let a = KeyHandle::new(Tracked(&drops), meta(KeyType::Private));
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pair_halves_are_independent() {
        let drops = AtomicUsize::new(0);
        let pair = KeyPair {
            private_key: KeyHandle::new(Tracked(&drops), meta(KeyType::Private)),
            public_key: KeyHandle::new(Tracked(&drops), meta(KeyType::Public)),
        };
        let (private, public) = pair.into_parts();
        drop(private);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(public.key_type(), KeyType::Public);
        assert_eq!(public.native().0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = KeyHandle::new([0x42u8; 4], meta(KeyType::Secret));
        let got = format!("{key:?}");
        assert!(got.contains("Secret"), "{got}");
        assert!(!got.contains("66"), "{got}");
    }
}
