//! The algorithm/usage/key-type compatibility matrix.
//!
//! Every check here is synchronous and runs before the backend
//! is called.

use core::fmt;

use serde::{Deserialize, de::IgnoredAny};
use tracing::debug;

use crate::{
    algorithm::{Algorithm, AlgorithmName},
    error::Error,
    key::{KeyFormat, KeyMeta, KeyType},
    usage::{KeyUsage, KeyUsages},
};

/// An operation that can be dispatched.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// Hash data.
    Digest,
    /// Encrypt data.
    Encrypt,
    /// Decrypt data.
    Decrypt,
    /// Sign data.
    Sign,
    /// Verify a signature.
    Verify,
    /// Derive raw bits.
    DeriveBits,
    /// Derive a key.
    DeriveKey,
    /// Wrap a key.
    WrapKey,
    /// Unwrap a key.
    UnwrapKey,
    /// Generate a key or key pair.
    GenerateKey,
    /// Import a key.
    ImportKey,
    /// Export a key.
    ExportKey,
}

impl Operation {
    /// Returns the operation's name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Digest => "digest",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::DeriveBits => "deriveBits",
            Self::DeriveKey => "deriveKey",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
            Self::GenerateKey => "generateKey",
            Self::ImportKey => "importKey",
            Self::ExportKey => "exportKey",
        }
    }

    /// Returns the usage a key must have for the operation.
    pub const fn required_usage(self) -> Option<KeyUsage> {
        match self {
            Self::Encrypt => Some(KeyUsage::Encrypt),
            Self::Decrypt => Some(KeyUsage::Decrypt),
            Self::Sign => Some(KeyUsage::Sign),
            Self::Verify => Some(KeyUsage::Verify),
            Self::DeriveBits => Some(KeyUsage::DeriveBits),
            Self::DeriveKey => Some(KeyUsage::DeriveKey),
            Self::WrapKey => Some(KeyUsage::WrapKey),
            Self::UnwrapKey => Some(KeyUsage::UnwrapKey),
            Self::Digest | Self::GenerateKey | Self::ImportKey | Self::ExportKey => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reports whether `alg` supports `op`.
pub const fn supports(alg: AlgorithmName, op: Operation) -> bool {
    use AlgorithmName as A;
    use Operation as Op;

    match alg {
        A::RsaOaep | A::AesCbc | A::AesCtr | A::AesGcm => matches!(
            op,
            Op::Encrypt
                | Op::Decrypt
                | Op::WrapKey
                | Op::UnwrapKey
                | Op::GenerateKey
                | Op::ImportKey
                | Op::ExportKey
        ),
        A::RsaPss | A::RsassaPkcs1v15 | A::Ecdsa | A::Hmac => matches!(
            op,
            Op::Sign | Op::Verify | Op::GenerateKey | Op::ImportKey | Op::ExportKey
        ),
        A::Ecdh => matches!(
            op,
            Op::DeriveBits | Op::DeriveKey | Op::GenerateKey | Op::ImportKey | Op::ExportKey
        ),
        A::Hkdf | A::Pbkdf2 => matches!(op, Op::DeriveBits | Op::DeriveKey | Op::ImportKey),
        A::Sha(_) => matches!(op, Op::Digest),
    }
}

/// Reports whether a key of type `key_type` can be used for
/// `op`.
pub const fn key_type_allows(key_type: KeyType, op: Operation) -> bool {
    use KeyType as T;
    use Operation as Op;

    match op {
        Op::Sign | Op::Decrypt | Op::UnwrapKey | Op::DeriveBits | Op::DeriveKey => {
            matches!(key_type, T::Private | T::Secret)
        }
        Op::Verify | Op::Encrypt | Op::WrapKey => matches!(key_type, T::Public | T::Secret),
        Op::Digest | Op::GenerateKey | Op::ImportKey | Op::ExportKey => true,
    }
}

/// Returns the usages a key for `alg` may ever have.
pub const fn permitted_usages(alg: AlgorithmName) -> KeyUsages {
    use AlgorithmName as A;
    use KeyUsage as U;

    match alg {
        A::RsaOaep | A::AesCbc | A::AesCtr | A::AesGcm => {
            KeyUsages::from_slice(&[U::Encrypt, U::Decrypt, U::WrapKey, U::UnwrapKey])
        }
        A::RsaPss | A::RsassaPkcs1v15 | A::Ecdsa | A::Hmac => {
            KeyUsages::from_slice(&[U::Sign, U::Verify])
        }
        A::Ecdh | A::Hkdf | A::Pbkdf2 => KeyUsages::from_slice(&[U::DeriveKey, U::DeriveBits]),
        A::Sha(_) => KeyUsages::EMPTY,
    }
}

const PRIVATE_USAGES: KeyUsages = KeyUsages::from_slice(&[
    KeyUsage::Decrypt,
    KeyUsage::Sign,
    KeyUsage::UnwrapKey,
    KeyUsage::DeriveKey,
    KeyUsage::DeriveBits,
]);

const PUBLIC_USAGES: KeyUsages =
    KeyUsages::from_slice(&[KeyUsage::Encrypt, KeyUsage::Verify, KeyUsage::WrapKey]);

/// Splits the usages requested for a key pair into
/// `(private, public)` usages.
pub const fn split_pair_usages(usages: KeyUsages) -> (KeyUsages, KeyUsages) {
    (
        usages.intersection(PRIVATE_USAGES),
        usages.intersection(PUBLIC_USAGES),
    )
}

/// Returns the type of a key imported as `format` for `alg`.
///
/// A `jwk` key for an asymmetric algorithm is private if it
/// carries a `d` member and public otherwise. A JWK that does
/// not parse is treated as public and left for the backend to
/// reject.
pub fn imported_key_type(alg: AlgorithmName, format: KeyFormat, data: &[u8]) -> KeyType {
    match format {
        KeyFormat::Spki => KeyType::Public,
        KeyFormat::Pkcs8 => KeyType::Private,
        KeyFormat::Raw => match alg {
            AlgorithmName::Ecdsa | AlgorithmName::Ecdh => KeyType::Public,
            _ => KeyType::Secret,
        },
        KeyFormat::Jwk if !alg.is_asymmetric() => KeyType::Secret,
        KeyFormat::Jwk if jwk_is_private(data) => KeyType::Private,
        KeyFormat::Jwk => KeyType::Public,
    }
}

/// The JWK members that decide a key's type.
#[derive(Deserialize)]
struct JwkMembers {
    d: Option<IgnoredAny>,
}

/// Reports whether `data` is a JWK with a private `d` member.
pub fn jwk_is_private(data: &[u8]) -> bool {
    serde_json::from_slice::<JwkMembers>(data).is_ok_and(|jwk| jwk.d.is_some())
}

/// Checks that `alg` supports `op`.
pub fn check_supported(alg: AlgorithmName, op: Operation) -> Result<(), Error> {
    if supports(alg, op) {
        Ok(())
    } else {
        debug!(%op, %alg, "operation not supported by algorithm");
        Err(Error::InvalidParameter("operation not supported by algorithm"))
    }
}

/// Checks that a key may be used with `alg` for `op`.
pub fn check_key(alg: AlgorithmName, op: Operation, key: &KeyMeta) -> Result<(), Error> {
    if key.algorithm != alg {
        debug!(%op, expected = %alg, got = %key.algorithm, "key algorithm mismatch");
        return Err(Error::KeyAlgorithmMismatch {
            expected: alg,
            got: key.algorithm,
        });
    }
    if let Some(usage) = op.required_usage() {
        if !key.usages.contains(usage) {
            debug!(%op, %usage, usages = ?key.usages, "usage not permitted");
            return Err(Error::UsageNotPermitted {
                operation: op,
                usage,
            });
        }
    }
    if !key_type_allows(key.key_type, op) {
        debug!(%op, key_type = %key.key_type, "wrong key type");
        return Err(Error::WrongKeyType {
            operation: op,
            got: key.key_type,
        });
    }
    Ok(())
}

/// Checks the usages requested for a key created by `op`.
pub fn check_new_key_usages(
    alg: AlgorithmName,
    op: Operation,
    usages: KeyUsages,
) -> Result<(), Error> {
    let permitted = permitted_usages(alg);
    if let Some(usage) = usages.difference(permitted).iter().next() {
        debug!(%op, %alg, %usage, "usage not permitted for algorithm");
        return Err(Error::UsageNotPermitted {
            operation: op,
            usage,
        });
    }
    Ok(())
}

/// Checks that `usages` fit a new key of type `key_type`.
///
/// Public keys may only encrypt, verify, or wrap. Private keys
/// may only decrypt, sign, unwrap, or derive, and, like secret
/// keys, need at least one usage.
pub fn check_key_type_usages(
    key_type: KeyType,
    op: Operation,
    usages: KeyUsages,
) -> Result<(), Error> {
    let allowed = match key_type {
        KeyType::Public => PUBLIC_USAGES,
        KeyType::Private => PRIVATE_USAGES,
        KeyType::Secret => usages,
    };
    if let Some(usage) = usages.difference(allowed).iter().next() {
        debug!(%op, %key_type, %usage, "usage not permitted for key type");
        return Err(Error::UsageNotPermitted {
            operation: op,
            usage,
        });
    }
    if key_type != KeyType::Public && usages.is_empty() {
        debug!(%op, %key_type, "key has no usages");
        return Err(Error::InvalidParameter("usages must not be empty"));
    }
    Ok(())
}

/// Checks that the descriptor carries every field `op` needs.
pub fn check_params(alg: &Algorithm, op: Operation) -> Result<(), Error> {
    use Operation as Op;

    let res = match (alg, op) {
        (Algorithm::RsaOaep(v), Op::GenerateKey) if v.key_gen.is_none() => {
            Err("missing RSA key generation parameters")
        }
        (Algorithm::RsaPss(v), Op::GenerateKey) if v.key_gen.is_none() => {
            Err("missing RSA key generation parameters")
        }
        (Algorithm::RsassaPkcs1v15(v), Op::GenerateKey) if v.key_gen.is_none() => {
            Err("missing RSA key generation parameters")
        }
        (Algorithm::RsaPss(v), Op::Sign | Op::Verify) if v.salt_length.is_none() => {
            Err("missing RSA-PSS salt length")
        }
        (Algorithm::Ecdsa(v), Op::GenerateKey | Op::ImportKey) if v.named_curve.is_none() => {
            Err("missing named curve")
        }
        (Algorithm::Ecdsa(v), Op::Sign | Op::Verify) if v.hash.is_none() => {
            Err("missing ECDSA hash")
        }
        (Algorithm::Ecdh(v), Op::GenerateKey | Op::ImportKey) if v.named_curve.is_none() => {
            Err("missing named curve")
        }
        (Algorithm::AesCbc(v), Op::GenerateKey) if v.length.is_none() => {
            Err("missing AES key length")
        }
        (Algorithm::AesCtr(v), Op::GenerateKey) if v.length.is_none() => {
            Err("missing AES key length")
        }
        (Algorithm::AesGcm(v), Op::GenerateKey) if v.length.is_none() => {
            Err("missing AES key length")
        }
        (Algorithm::AesCbc(v), Op::Encrypt | Op::Decrypt) if v.iv.is_none() => {
            Err("missing AES-CBC IV")
        }
        (Algorithm::AesCtr(v), Op::Encrypt | Op::Decrypt) => match v.counter_length {
            None => Err("missing AES-CTR counter"),
            Some(0) | Some(129..) => Err("AES-CTR counter length must be in 1..=128"),
            Some(_) => Ok(()),
        },
        (Algorithm::AesGcm(v), Op::Encrypt | Op::Decrypt) => match &v.iv {
            Some(iv) if !iv.is_empty() => Ok(()),
            _ => Err("missing AES-GCM IV"),
        },
        (Algorithm::Hmac(v), _) if v.length == Some(0) => Err("HMAC key length must be non-zero"),
        (Algorithm::Hkdf(v), Op::DeriveBits | Op::DeriveKey)
            if v.hash.is_none() || v.salt.is_none() || v.info.is_none() =>
        {
            Err("HKDF requires a hash, salt, and info")
        }
        (Algorithm::Pbkdf2(v), Op::DeriveBits | Op::DeriveKey) => match v.iterations {
            _ if v.hash.is_none() || v.salt.is_none() => Err("PBKDF2 requires a hash and salt"),
            None | Some(0) => Err("PBKDF2 iterations must be non-zero"),
            Some(_) => Ok(()),
        },
        _ => Ok(()),
    };
    res.map_err(|msg| {
        debug!(%op, alg = %alg.name(), msg, "invalid parameter");
        Error::InvalidParameter(msg)
    })
}
