use serde::Serialize;

use super::{Algorithm, AlgorithmName, NamedCurve, RsaKeyGen};
use crate::hash::HashAlgorithm;

/// The flattened form of an [`Algorithm`], as handed to a
/// [`Backend`][crate::Backend].
///
/// Fields that do not apply to the algorithm are `None` and are
/// omitted when serialized. They are never sent as nulls.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    /// The algorithm family.
    pub name: AlgorithmName,
    /// The hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashAlgorithm>,
    /// The RSA modulus length in bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modulus_length: Option<u32>,
    /// The RSA public exponent, big-endian.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_exponent: Option<Vec<u8>>,
    /// The RSA-OAEP label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Vec<u8>>,
    /// The RSA-PSS salt length in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt_length: Option<u32>,
    /// The elliptic curve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_curve: Option<NamedCurve>,
    /// The key length in bits, for AES and HMAC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// The AES-CBC or AES-GCM IV.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<Vec<u8>>,
    /// The AES-CTR initial counter block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<Vec<u8>>,
    /// The number of AES-CTR counter bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_length: Option<u8>,
    /// The AES-GCM additional authenticated data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<Vec<u8>>,
    /// The AES-GCM tag length in bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_length: Option<u8>,
    /// The HKDF or PBKDF2 salt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,
    /// The HKDF context info.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Vec<u8>>,
    /// The PBKDF2 iteration count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
}

impl Params {
    /// Creates `Params` with only the name set.
    pub const fn new(name: AlgorithmName) -> Self {
        Self {
            name,
            hash: None,
            modulus_length: None,
            public_exponent: None,
            label: None,
            salt_length: None,
            named_curve: None,
            length: None,
            iv: None,
            counter: None,
            counter_length: None,
            additional_data: None,
            tag_length: None,
            salt: None,
            info: None,
            iterations: None,
        }
    }

    fn with_key_gen(mut self, key_gen: Option<&RsaKeyGen>) -> Self {
        if let Some(kg) = key_gen {
            self.modulus_length = Some(kg.modulus_length);
            self.public_exponent = Some(kg.public_exponent.as_bytes().to_vec());
        }
        self
    }
}

impl Algorithm {
    /// Flattens the descriptor.
    pub fn to_params(&self) -> Params {
        let p = Params::new(self.name());
        match self {
            Self::RsaOaep(v) => Params {
                hash: Some(v.hash),
                label: v.label.clone(),
                ..p.with_key_gen(v.key_gen.as_ref())
            },
            Self::RsaPss(v) => Params {
                hash: Some(v.hash),
                salt_length: v.salt_length,
                ..p.with_key_gen(v.key_gen.as_ref())
            },
            Self::RsassaPkcs1v15(v) => Params {
                hash: Some(v.hash),
                ..p.with_key_gen(v.key_gen.as_ref())
            },
            Self::Ecdsa(v) => Params {
                named_curve: v.named_curve,
                hash: v.hash,
                ..p
            },
            Self::Ecdh(v) => Params {
                named_curve: v.named_curve,
                ..p
            },
            Self::AesCbc(v) => Params {
                length: v.length.map(|l| l.bits()),
                iv: v.iv.map(|iv| iv.to_vec()),
                ..p
            },
            Self::AesCtr(v) => Params {
                length: v.length.map(|l| l.bits()),
                counter: v.counter.map(|c| c.to_vec()),
                counter_length: v.counter_length,
                ..p
            },
            Self::AesGcm(v) => Params {
                length: v.length.map(|l| l.bits()),
                iv: v.iv.clone(),
                additional_data: v.additional_data.clone(),
                tag_length: v.tag_length.map(|t| t.bits()),
                ..p
            },
            Self::Hmac(v) => Params {
                hash: Some(v.hash),
                length: v.length,
                ..p
            },
            Self::Hkdf(v) => Params {
                hash: v.hash,
                salt: v.salt.clone(),
                info: v.info.clone(),
                ..p
            },
            Self::Pbkdf2(v) => Params {
                hash: v.hash,
                salt: v.salt.clone(),
                iterations: v.iterations,
                ..p
            },
            Self::Sha(_) => p,
        }
    }
}
