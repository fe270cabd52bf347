//! Algorithm descriptors.
//!
//! An [`Algorithm`] names an algorithm family and carries the
//! parameters for that family, and only that family. Each
//! family has its own builder type, so it is not possible to
//! (for example) hand an IV to HMAC.
//!
//! Descriptors are flattened into [`Params`] exactly once, by
//! [`SubtleCrypto`][crate::SubtleCrypto], right before the
//! backend is called.

mod params;

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize, Serializer};

pub use self::params::Params;
use crate::{error::Error, hash::HashAlgorithm};

/// An algorithm family.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AlgorithmName {
    /// RSA-OAEP.
    RsaOaep,
    /// RSA-PSS.
    RsaPss,
    /// RSASSA-PKCS1-v1_5.
    RsassaPkcs1v15,
    /// ECDSA.
    Ecdsa,
    /// ECDH.
    Ecdh,
    /// AES-CBC.
    AesCbc,
    /// AES-CTR.
    AesCtr,
    /// AES-GCM.
    AesGcm,
    /// HMAC.
    Hmac,
    /// HKDF.
    Hkdf,
    /// PBKDF2.
    Pbkdf2,
    /// A plain SHA digest.
    Sha(HashAlgorithm),
}

impl AlgorithmName {
    /// Returns the backend identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RsaOaep => "RSA-OAEP",
            Self::RsaPss => "RSA-PSS",
            Self::RsassaPkcs1v15 => "RSASSA-PKCS1-v1_5",
            Self::Ecdsa => "ECDSA",
            Self::Ecdh => "ECDH",
            Self::AesCbc => "AES-CBC",
            Self::AesCtr => "AES-CTR",
            Self::AesGcm => "AES-GCM",
            Self::Hmac => "HMAC",
            Self::Hkdf => "HKDF",
            Self::Pbkdf2 => "PBKDF2",
            Self::Sha(h) => h.as_str(),
        }
    }

    /// Reports whether keys for this family come in
    /// public/private pairs.
    pub const fn is_asymmetric(self) -> bool {
        matches!(
            self,
            Self::RsaOaep | Self::RsaPss | Self::RsassaPkcs1v15 | Self::Ecdsa | Self::Ecdh
        )
    }
}

impl fmt::Display for AlgorithmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AlgorithmName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A named elliptic curve.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NamedCurve {
    /// NIST P-256.
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384.
    #[serde(rename = "P-384")]
    P384,
    /// NIST P-521.
    #[serde(rename = "P-521")]
    P521,
}

impl NamedCurve {
    /// Returns the backend identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }
}

/// The length of an AES key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AesLength {
    /// AES-128.
    Aes128,
    /// AES-192.
    Aes192,
    /// AES-256.
    Aes256,
}

impl AesLength {
    /// Returns the key length in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Aes128 => 128,
            Self::Aes192 => 192,
            Self::Aes256 => 256,
        }
    }
}

/// The length of an AES-GCM authentication tag.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TagLength {
    /// 32 bits.
    Bits32,
    /// 64 bits.
    Bits64,
    /// 96 bits.
    Bits96,
    /// 104 bits.
    Bits104,
    /// 112 bits.
    Bits112,
    /// 120 bits.
    Bits120,
    /// 128 bits.
    #[default]
    Bits128,
}

impl TagLength {
    /// Returns the tag length in bits.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
            Self::Bits96 => 96,
            Self::Bits104 => 104,
            Self::Bits112 => 112,
            Self::Bits120 => 120,
            Self::Bits128 => 128,
        }
    }
}

/// Encodes an RSA public exponent as an unsigned big-endian
/// integer.
///
/// Only F4 (65537) is currently supported. Every other value is
/// rejected with [`Error::Unimplemented`] rather than encoded
/// incorrectly.
pub fn encode_public_exponent(value: u64) -> Result<Vec<u8>, Error> {
    match value {
        65537 => Ok(vec![0x01, 0x00, 0x01]),
        _ => Err(Error::Unimplemented("RSA public exponents other than 65537")),
    }
}

/// An RSA public exponent.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PublicExponent(Cow<'static, [u8]>);

impl PublicExponent {
    /// 65537.
    pub const F4: Self = Self(Cow::Borrowed(&[0x01, 0x00, 0x01]));

    /// Creates a public exponent from an integer.
    ///
    /// See [`encode_public_exponent`].
    pub fn new(value: u64) -> Result<Self, Error> {
        encode_public_exponent(value).map(|v| Self(Cow::Owned(v)))
    }

    /// Returns the big-endian encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for PublicExponent {
    fn default() -> Self {
        Self::F4
    }
}

/// Parameters for generating an RSA key pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RsaKeyGen {
    /// The modulus length in bits.
    pub modulus_length: u32,
    /// The public exponent.
    pub public_exponent: PublicExponent,
}

impl RsaKeyGen {
    /// Creates RSA key generation parameters with the F4
    /// public exponent.
    pub fn new(modulus_length: u32) -> Self {
        Self {
            modulus_length,
            public_exponent: PublicExponent::F4,
        }
    }
}

/// RSA-OAEP.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RsaOaep {
    pub(crate) hash: HashAlgorithm,
    pub(crate) key_gen: Option<RsaKeyGen>,
    pub(crate) label: Option<Vec<u8>>,
}

impl RsaOaep {
    /// Creates an RSA-OAEP descriptor.
    pub const fn new(hash: HashAlgorithm) -> Self {
        Self {
            hash,
            key_gen: None,
            label: None,
        }
    }

    /// Sets the key generation parameters.
    #[must_use]
    pub fn with_key_gen(mut self, key_gen: RsaKeyGen) -> Self {
        self.key_gen = Some(key_gen);
        self
    }

    /// Sets the optional OAEP label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Vec<u8>>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// RSA-PSS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RsaPss {
    pub(crate) hash: HashAlgorithm,
    pub(crate) key_gen: Option<RsaKeyGen>,
    pub(crate) salt_length: Option<u32>,
}

impl RsaPss {
    /// Creates an RSA-PSS descriptor.
    pub const fn new(hash: HashAlgorithm) -> Self {
        Self {
            hash,
            key_gen: None,
            salt_length: None,
        }
    }

    /// Sets the key generation parameters.
    #[must_use]
    pub fn with_key_gen(mut self, key_gen: RsaKeyGen) -> Self {
        self.key_gen = Some(key_gen);
        self
    }

    /// Sets the salt length in bytes.
    #[must_use]
    pub fn with_salt_length(mut self, salt_length: u32) -> Self {
        self.salt_length = Some(salt_length);
        self
    }
}

/// RSASSA-PKCS1-v1_5.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RsassaPkcs1v15 {
    pub(crate) hash: HashAlgorithm,
    pub(crate) key_gen: Option<RsaKeyGen>,
}

impl RsassaPkcs1v15 {
    /// Creates an RSASSA-PKCS1-v1_5 descriptor.
    pub const fn new(hash: HashAlgorithm) -> Self {
        Self {
            hash,
            key_gen: None,
        }
    }

    /// Sets the key generation parameters.
    #[must_use]
    pub fn with_key_gen(mut self, key_gen: RsaKeyGen) -> Self {
        self.key_gen = Some(key_gen);
        self
    }
}

/// ECDSA.
///
/// Key generation and import need a curve. Signing and
/// verification need a hash.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Ecdsa {
    pub(crate) named_curve: Option<NamedCurve>,
    pub(crate) hash: Option<HashAlgorithm>,
}

impl Ecdsa {
    /// Creates an empty ECDSA descriptor.
    pub const fn new() -> Self {
        Self {
            named_curve: None,
            hash: None,
        }
    }

    /// Sets the curve.
    #[must_use]
    pub const fn with_curve(mut self, curve: NamedCurve) -> Self {
        self.named_curve = Some(curve);
        self
    }

    /// Sets the hash.
    #[must_use]
    pub const fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// ECDH.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Ecdh {
    pub(crate) named_curve: Option<NamedCurve>,
}

impl Ecdh {
    /// Creates an empty ECDH descriptor.
    pub const fn new() -> Self {
        Self { named_curve: None }
    }

    /// Sets the curve.
    #[must_use]
    pub const fn with_curve(mut self, curve: NamedCurve) -> Self {
        self.named_curve = Some(curve);
        self
    }
}

/// AES-CBC.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AesCbc {
    pub(crate) length: Option<AesLength>,
    pub(crate) iv: Option<[u8; 16]>,
}

impl AesCbc {
    /// Creates an empty AES-CBC descriptor.
    pub const fn new() -> Self {
        Self {
            length: None,
            iv: None,
        }
    }

    /// Sets the key length.
    #[must_use]
    pub const fn with_length(mut self, length: AesLength) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the IV.
    #[must_use]
    pub const fn with_iv(mut self, iv: [u8; 16]) -> Self {
        self.iv = Some(iv);
        self
    }
}

/// AES-CTR.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AesCtr {
    pub(crate) length: Option<AesLength>,
    pub(crate) counter: Option<[u8; 16]>,
    pub(crate) counter_length: Option<u8>,
}

impl AesCtr {
    /// Creates an empty AES-CTR descriptor.
    pub const fn new() -> Self {
        Self {
            length: None,
            counter: None,
            counter_length: None,
        }
    }

    /// Sets the key length.
    #[must_use]
    pub const fn with_length(mut self, length: AesLength) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the initial counter block and the number of its
    /// rightmost bits used as the counter.
    #[must_use]
    pub const fn with_counter(mut self, counter: [u8; 16], counter_length: u8) -> Self {
        self.counter = Some(counter);
        self.counter_length = Some(counter_length);
        self
    }
}

/// AES-GCM.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AesGcm {
    pub(crate) length: Option<AesLength>,
    pub(crate) iv: Option<Vec<u8>>,
    pub(crate) additional_data: Option<Vec<u8>>,
    pub(crate) tag_length: Option<TagLength>,
}

impl AesGcm {
    /// Creates an empty AES-GCM descriptor.
    pub const fn new() -> Self {
        Self {
            length: None,
            iv: None,
            additional_data: None,
            tag_length: None,
        }
    }

    /// Sets the key length.
    #[must_use]
    pub fn with_length(mut self, length: AesLength) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the IV.
    #[must_use]
    pub fn with_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.iv = Some(iv.into());
        self
    }

    /// Sets the additional authenticated data.
    #[must_use]
    pub fn with_additional_data(mut self, ad: impl Into<Vec<u8>>) -> Self {
        self.additional_data = Some(ad.into());
        self
    }

    /// Sets the tag length.
    #[must_use]
    pub fn with_tag_length(mut self, tag_length: TagLength) -> Self {
        self.tag_length = Some(tag_length);
        self
    }
}

/// HMAC.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hmac {
    pub(crate) hash: HashAlgorithm,
    pub(crate) length: Option<u32>,
}

impl Hmac {
    /// Creates an HMAC descriptor.
    pub const fn new(hash: HashAlgorithm) -> Self {
        Self { hash, length: None }
    }

    /// Sets the key length in bits.
    #[must_use]
    pub const fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }
}

/// HKDF.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Hkdf {
    pub(crate) hash: Option<HashAlgorithm>,
    pub(crate) salt: Option<Vec<u8>>,
    pub(crate) info: Option<Vec<u8>>,
}

impl Hkdf {
    /// Creates an empty HKDF descriptor, suitable for key
    /// import.
    pub const fn new() -> Self {
        Self {
            hash: None,
            salt: None,
            info: None,
        }
    }

    /// Sets the hash.
    #[must_use]
    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Sets the salt.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Sets the context info.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<Vec<u8>>) -> Self {
        self.info = Some(info.into());
        self
    }
}

/// PBKDF2.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Pbkdf2 {
    pub(crate) hash: Option<HashAlgorithm>,
    pub(crate) salt: Option<Vec<u8>>,
    pub(crate) iterations: Option<u32>,
}

impl Pbkdf2 {
    /// Creates an empty PBKDF2 descriptor, suitable for key
    /// import.
    pub const fn new() -> Self {
        Self {
            hash: None,
            salt: None,
            iterations: None,
        }
    }

    /// Sets the hash.
    #[must_use]
    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Sets the salt.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Sets the iteration count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }
}

/// An algorithm descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Algorithm {
    /// See [`RsaOaep`].
    RsaOaep(RsaOaep),
    /// See [`RsaPss`].
    RsaPss(RsaPss),
    /// See [`RsassaPkcs1v15`].
    RsassaPkcs1v15(RsassaPkcs1v15),
    /// See [`Ecdsa`].
    Ecdsa(Ecdsa),
    /// See [`Ecdh`].
    Ecdh(Ecdh),
    /// See [`AesCbc`].
    AesCbc(AesCbc),
    /// See [`AesCtr`].
    AesCtr(AesCtr),
    /// See [`AesGcm`].
    AesGcm(AesGcm),
    /// See [`Hmac`].
    Hmac(Hmac),
    /// See [`Hkdf`].
    Hkdf(Hkdf),
    /// See [`Pbkdf2`].
    Pbkdf2(Pbkdf2),
    /// A plain digest.
    Sha(HashAlgorithm),
}

impl Algorithm {
    /// Returns the algorithm family.
    pub const fn name(&self) -> AlgorithmName {
        match self {
            Self::RsaOaep(_) => AlgorithmName::RsaOaep,
            Self::RsaPss(_) => AlgorithmName::RsaPss,
            Self::RsassaPkcs1v15(_) => AlgorithmName::RsassaPkcs1v15,
            Self::Ecdsa(_) => AlgorithmName::Ecdsa,
            Self::Ecdh(_) => AlgorithmName::Ecdh,
            Self::AesCbc(_) => AlgorithmName::AesCbc,
            Self::AesCtr(_) => AlgorithmName::AesCtr,
            Self::AesGcm(_) => AlgorithmName::AesGcm,
            Self::Hmac(_) => AlgorithmName::Hmac,
            Self::Hkdf(_) => AlgorithmName::Hkdf,
            Self::Pbkdf2(_) => AlgorithmName::Pbkdf2,
            Self::Sha(h) => AlgorithmName::Sha(*h),
        }
    }

    /// Returns the hash carried by the descriptor, if any.
    pub const fn hash(&self) -> Option<HashAlgorithm> {
        match self {
            Self::RsaOaep(v) => Some(v.hash),
            Self::RsaPss(v) => Some(v.hash),
            Self::RsassaPkcs1v15(v) => Some(v.hash),
            Self::Ecdsa(v) => v.hash,
            Self::Hmac(v) => Some(v.hash),
            Self::Hkdf(v) => v.hash,
            Self::Pbkdf2(v) => v.hash,
            Self::Sha(h) => Some(*h),
            Self::Ecdh(_) | Self::AesCbc(_) | Self::AesCtr(_) | Self::AesGcm(_) => None,
        }
    }
}

macro_rules! impl_from_family {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for Algorithm {
                #[inline]
                fn from(v: $name) -> Self {
                    Self::$name(v)
                }
            }
        )*
    };
}
impl_from_family! {
    RsaOaep,
    RsaPss,
    RsassaPkcs1v15,
    Ecdsa,
    Ecdh,
    AesCbc,
    AesCtr,
    AesGcm,
    Hmac,
    Hkdf,
    Pbkdf2,
}

impl From<HashAlgorithm> for Algorithm {
    #[inline]
    fn from(hash: HashAlgorithm) -> Self {
        Self::Sha(hash)
    }
}
