//! A [RustCrypto] [`Backend`].
//!
//! Every primitive runs on tokio's blocking pool, so a tokio
//! runtime must be running. Results are handed back through
//! [`bridge`][crate::bridge].
//!
//! Supported:
//!
//! - digest with SHA-1, SHA-256, SHA-384, and SHA-512
//! - AES-GCM with 128- or 256-bit keys, 96-bit IVs, and
//!   128-bit tags
//! - HMAC with any of the above hashes
//! - ECDSA over P-256 with SHA-256
//! - ECDH over P-256
//! - HKDF and PBKDF2
//! - `raw` import and export of secret keys and P-256 public
//!   keys
//! - `jwk` import of P-256 private and public keys
//!
//! Everything else fails with [`BackendErrorKind::NotSupported`].
//!
//! [RustCrypto]: https://github.com/RustCrypto

#![cfg(feature = "rust")]
#![cfg_attr(docsrs, doc(cfg(feature = "rust")))]

use core::{fmt, str::FromStr};

use aes_gcm::{
    Aes128Gcm, Aes256Gcm,
    aead::{Aead, KeyInit, Payload, consts::U12},
};
use hmac::{Hmac, Mac};
use p256::{
    PublicKey, SecretKey,
    ecdsa::{
        Signature, SigningKey, VerifyingKey,
        signature::{Signer, Verifier},
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::{RngCore, rngs::OsRng};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    algorithm::{AlgorithmName, NamedCurve, Params},
    backend::Backend,
    bridge::{self, Completion},
    error::{BackendError, BackendErrorKind},
    hash::HashAlgorithm,
    policy,
};

/// Runs `$body` with `$d` bound to the RustCrypto type for
/// `$hash`.
macro_rules! with_hash {
    ($hash:expr, $d:ident => $body:expr) => {
        match $hash {
            HashAlgorithm::Sha1 => {
                type $d = Sha1;
                $body
            }
            HashAlgorithm::Sha256 => {
                type $d = Sha256;
                $body
            }
            HashAlgorithm::Sha384 => {
                type $d = Sha384;
                $body
            }
            HashAlgorithm::Sha512 => {
                type $d = Sha512;
                $body
            }
        }
    };
}

/// The RustCrypto backend.
#[derive(Copy, Clone, Debug, Default)]
pub struct RustBackend;

/// A key held by [`RustBackend`].
#[derive(Clone)]
pub struct RustKey {
    material: Material,
    extractable: bool,
}

#[derive(Clone)]
enum Material {
    Secret(Zeroizing<Vec<u8>>),
    EcPrivate(SecretKey),
    EcPublic(PublicKey),
}

impl RustKey {
    /// Reports whether the backend will export the key.
    pub fn extractable(&self) -> bool {
        self.extractable
    }

    fn secret(&self) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        match &self.material {
            Material::Secret(key) => Ok(key.clone()),
            _ => Err(wrong_key()),
        }
    }

    fn ec_private(&self) -> Result<SecretKey, BackendError> {
        match &self.material {
            Material::EcPrivate(sk) => Ok(sk.clone()),
            _ => Err(wrong_key()),
        }
    }

    fn ec_public(&self) -> Result<PublicKey, BackendError> {
        match &self.material {
            Material::EcPublic(pk) => Ok(*pk),
            _ => Err(wrong_key()),
        }
    }
}

impl fmt::Debug for RustKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.material {
            Material::Secret(_) => "secret",
            Material::EcPrivate(_) => "P-256 private",
            Material::EcPublic(_) => "P-256 public",
        };
        f.debug_struct("RustKey")
            .field("kind", &kind)
            .field("extractable", &self.extractable)
            .finish_non_exhaustive()
    }
}

impl Backend for RustBackend {
    type Key = RustKey;

    async fn get_random_values(&self, buf: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        blocking(move || {
            let mut buf = buf;
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|err| BackendError::new(BackendErrorKind::Operation, err))?;
            Ok(buf)
        })
        .await
    }

    async fn digest(&self, hash: &'static str, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        let hash = HashAlgorithm::from_str(hash)
            .map_err(|err| BackendError::new(BackendErrorKind::NotSupported, err))?;
        let data = data.to_vec();
        blocking(move || Ok(with_hash!(hash, D => D::digest(&data).to_vec()))).await
    }

    async fn encrypt(
        &self,
        params: &Params,
        key: &RustKey,
        data: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        let (iv, ad) = aes_gcm_params(params)?;
        let key = key.secret()?;
        let data = data.to_vec();
        blocking(move || aes_gcm(&key, &iv, &ad, &data, Mode::Seal)).await
    }

    async fn decrypt(
        &self,
        params: &Params,
        key: &RustKey,
        data: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        let (iv, ad) = aes_gcm_params(params)?;
        let key = key.secret()?;
        let data = data.to_vec();
        blocking(move || aes_gcm(&key, &iv, &ad, &data, Mode::Open)).await
    }

    async fn sign(
        &self,
        params: &Params,
        key: &RustKey,
        data: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        let data = data.to_vec();
        match params.name {
            AlgorithmName::Hmac => {
                let hash = required(params.hash, "HMAC requires a hash")?;
                let key = key.secret()?;
                blocking(move || hmac_sign(hash, &key, &data)).await
            }
            AlgorithmName::Ecdsa => {
                ecdsa_hash(params)?;
                let sk = SigningKey::from(key.ec_private()?);
                blocking(move || {
                    let sig: Signature = sk
                        .try_sign(&data)
                        .map_err(|err| BackendError::new(BackendErrorKind::Operation, err))?;
                    Ok(sig.to_bytes().to_vec())
                })
                .await
            }
            name => Err(unsupported(name, "sign")),
        }
    }

    async fn verify(
        &self,
        params: &Params,
        key: &RustKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool, BackendError> {
        let signature = signature.to_vec();
        let data = data.to_vec();
        match params.name {
            AlgorithmName::Hmac => {
                let hash = required(params.hash, "HMAC requires a hash")?;
                let key = key.secret()?;
                blocking(move || hmac_verify(hash, &key, &signature, &data)).await
            }
            AlgorithmName::Ecdsa => {
                ecdsa_hash(params)?;
                let vk = VerifyingKey::from(key.ec_public()?);
                blocking(move || {
                    let Ok(sig) = Signature::from_slice(&signature) else {
                        return Ok(false);
                    };
                    Ok(vk.verify(&data, &sig).is_ok())
                })
                .await
            }
            name => Err(unsupported(name, "verify")),
        }
    }

    async fn derive_bits(
        &self,
        params: &Params,
        key: &RustKey,
        peer: Option<&RustKey>,
        length: u32,
    ) -> Result<Vec<u8>, BackendError> {
        let len = usize::try_from(length / 8)
            .map_err(|err| BackendError::new(BackendErrorKind::Operation, err))?;
        match params.name {
            AlgorithmName::Ecdh => {
                let sk = key.ec_private()?;
                let pk = peer
                    .ok_or_else(|| {
                        BackendError::msg(BackendErrorKind::Operation, "missing ECDH peer key")
                    })?
                    .ec_public()?;
                blocking(move || {
                    let shared = p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                    let bytes = shared.raw_secret_bytes();
                    bytes.get(..len).map(<[u8]>::to_vec).ok_or_else(|| {
                        BackendError::msg(
                            BackendErrorKind::Operation,
                            "ECDH P-256 yields at most 256 bits",
                        )
                    })
                })
                .await
            }
            AlgorithmName::Hkdf => {
                let hash = required(params.hash, "HKDF requires a hash")?;
                let salt = params.salt.clone().unwrap_or_default();
                let info = params.info.clone().unwrap_or_default();
                let ikm = key.secret()?;
                if hash.digest_len().checked_mul(255).is_none_or(|max| len > max) {
                    return Err(BackendError::msg(
                        BackendErrorKind::Operation,
                        "HKDF output too long",
                    ));
                }
                blocking(move || {
                    let mut okm = vec![0; len];
                    with_hash!(hash, D => {
                        hkdf::Hkdf::<D>::new(Some(salt.as_slice()), &ikm).expand(&info, &mut okm)
                    })
                    .map_err(|_| {
                        BackendError::msg(BackendErrorKind::Operation, "HKDF output too long")
                    })?;
                    Ok(okm)
                })
                .await
            }
            AlgorithmName::Pbkdf2 => {
                let hash = required(params.hash, "PBKDF2 requires a hash")?;
                let salt = params.salt.clone().unwrap_or_default();
                let iterations = required(params.iterations, "PBKDF2 requires an iteration count")?;
                let password = key.secret()?;
                blocking(move || {
                    let mut out = vec![0; len];
                    with_hash!(hash, D => {
                        pbkdf2::pbkdf2_hmac::<D>(&password, &salt, iterations, &mut out)
                    });
                    Ok(out)
                })
                .await
            }
            name => Err(unsupported(name, "deriveBits")),
        }
    }

    async fn generate_key(
        &self,
        params: &Params,
        extractable: bool,
        _usages: &[&'static str],
    ) -> Result<RustKey, BackendError> {
        let len = match params.name {
            AlgorithmName::AesGcm => match params.length {
                Some(128) => 16,
                Some(256) => 32,
                _ => return Err(not_supported("AES-GCM keys must be 128 or 256 bits")),
            },
            AlgorithmName::Hmac => {
                let hash = required(params.hash, "HMAC requires a hash")?;
                match params.length {
                    None => hash.block_len(),
                    Some(bits) if bits % 8 == 0 => usize::try_from(bits / 8)
                        .map_err(|err| BackendError::new(BackendErrorKind::Operation, err))?,
                    Some(_) => {
                        return Err(not_supported("HMAC key length must be a multiple of 8"));
                    }
                }
            }
            name => return Err(unsupported(name, "generateKey")),
        };
        blocking(move || {
            let mut key = Zeroizing::new(vec![0; len]);
            OsRng
                .try_fill_bytes(&mut key)
                .map_err(|err| BackendError::new(BackendErrorKind::Operation, err))?;
            Ok(RustKey {
                material: Material::Secret(key),
                extractable,
            })
        })
        .await
    }

    async fn generate_key_pair(
        &self,
        params: &Params,
        extractable: bool,
        _usages: &[&'static str],
    ) -> Result<(RustKey, RustKey), BackendError> {
        match params.name {
            AlgorithmName::Ecdsa | AlgorithmName::Ecdh => p256_curve(params)?,
            name => return Err(unsupported(name, "generateKey")),
        }
        blocking(move || {
            let sk = SecretKey::random(&mut OsRng);
            let pk = sk.public_key();
            Ok((
                RustKey {
                    material: Material::EcPrivate(sk),
                    extractable,
                },
                RustKey {
                    material: Material::EcPublic(pk),
                    extractable: true,
                },
            ))
        })
        .await
    }

    async fn import_key(
        &self,
        format: &'static str,
        data: &[u8],
        params: &Params,
        extractable: bool,
        _usages: &[&'static str],
    ) -> Result<RustKey, BackendError> {
        match format {
            "raw" => {}
            "jwk" if matches!(params.name, AlgorithmName::Ecdsa | AlgorithmName::Ecdh) => {
                p256_curve(params)?;
                return import_p256_jwk(data, extractable).await;
            }
            _ => {
                debug!(format, "unsupported import format");
                return Err(not_supported(
                    "only `raw` keys and P-256 `jwk` keys can be imported",
                ));
            }
        }
        let data = Zeroizing::new(data.to_vec());
        match params.name {
            AlgorithmName::Ecdsa | AlgorithmName::Ecdh => {
                p256_curve(params)?;
                blocking(move || {
                    let pk = PublicKey::from_sec1_bytes(&data).map_err(|_| {
                        BackendError::msg(BackendErrorKind::Operation, "invalid SEC1 point")
                    })?;
                    Ok(RustKey {
                        material: Material::EcPublic(pk),
                        extractable,
                    })
                })
                .await
            }
            AlgorithmName::AesGcm if !matches!(data.len(), 16 | 32) => {
                Err(not_supported("AES-GCM keys must be 128 or 256 bits"))
            }
            AlgorithmName::Hmac
                if data.is_empty()
                    || params.length.is_some_and(|bits| {
                        bits % 8 != 0 || usize::try_from(bits / 8).ok() != Some(data.len())
                    }) =>
            {
                Err(BackendError::msg(
                    BackendErrorKind::Operation,
                    "HMAC key does not match the requested length",
                ))
            }
            AlgorithmName::AesGcm
            | AlgorithmName::Hmac
            | AlgorithmName::Hkdf
            | AlgorithmName::Pbkdf2 => {
                blocking(move || {
                    Ok(RustKey {
                        material: Material::Secret(data),
                        extractable,
                    })
                })
                .await
            }
            name => Err(unsupported(name, "importKey")),
        }
    }

    async fn export_key(
        &self,
        format: &'static str,
        key: &RustKey,
    ) -> Result<Vec<u8>, BackendError> {
        if !key.extractable {
            return Err(BackendError::msg(
                BackendErrorKind::NotExtractable,
                "key is not extractable",
            ));
        }
        if format != "raw" {
            debug!(format, "unsupported export format");
            return Err(not_supported("only `raw` keys can be exported"));
        }
        let key = key.clone();
        blocking(move || match key.material {
            Material::Secret(key) => Ok(key.to_vec()),
            Material::EcPublic(pk) => Ok(pk.to_encoded_point(false).as_bytes().to_vec()),
            Material::EcPrivate(_) => {
                Err(not_supported("private keys cannot be exported as `raw`"))
            }
        })
        .await
    }
}

/// Imports a P-256 JWK. It is a private key if it has a `d`
/// member.
async fn import_p256_jwk(data: &[u8], extractable: bool) -> Result<RustKey, BackendError> {
    let private = policy::jwk_is_private(data);
    let jwk = core::str::from_utf8(data).map_err(|_| invalid_jwk())?;
    let jwk = Zeroizing::new(jwk.to_owned());
    blocking(move || {
        let material = if private {
            Material::EcPrivate(SecretKey::from_jwk_str(&jwk).map_err(|_| invalid_jwk())?)
        } else {
            Material::EcPublic(PublicKey::from_jwk_str(&jwk).map_err(|_| invalid_jwk())?)
        };
        Ok(RustKey {
            material,
            extractable,
        })
    })
    .await
}

/// Runs `f` on the blocking pool.
///
/// If `f` panics the completion is abandoned.
fn blocking<T, F>(f: F) -> Completion<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
{
    let (completer, completion) = bridge::pending();
    tokio::task::spawn_blocking(move || completer.complete(f()));
    completion
}

#[derive(Copy, Clone, Debug)]
enum Mode {
    Seal,
    Open,
}

fn aes_gcm_params(params: &Params) -> Result<(Vec<u8>, Vec<u8>), BackendError> {
    if params.name != AlgorithmName::AesGcm {
        return Err(unsupported(params.name, "encrypt"));
    }
    let iv = params.iv.clone().unwrap_or_default();
    if iv.len() != 12 {
        return Err(not_supported("AES-GCM IVs must be 96 bits"));
    }
    if params.tag_length.is_some_and(|bits| bits != 128) {
        return Err(not_supported("AES-GCM tags must be 128 bits"));
    }
    Ok((iv, params.additional_data.clone().unwrap_or_default()))
}

fn aes_gcm(
    key: &[u8],
    iv: &[u8],
    ad: &[u8],
    data: &[u8],
    mode: Mode,
) -> Result<Vec<u8>, BackendError> {
    match key.len() {
        16 => aes_gcm_with::<Aes128Gcm>(key, iv, ad, data, mode),
        32 => aes_gcm_with::<Aes256Gcm>(key, iv, ad, data, mode),
        _ => Err(not_supported("AES-GCM keys must be 128 or 256 bits")),
    }
}

fn aes_gcm_with<C>(
    key: &[u8],
    iv: &[u8],
    ad: &[u8],
    data: &[u8],
    mode: Mode,
) -> Result<Vec<u8>, BackendError>
where
    C: Aead<NonceSize = U12> + KeyInit,
{
    let cipher = <C as KeyInit>::new_from_slice(key)
        .map_err(|_| BackendError::msg(BackendErrorKind::Operation, "invalid AES-GCM key"))?;
    let iv = <[u8; 12]>::try_from(iv).map_err(|_| not_supported("AES-GCM IVs must be 96 bits"))?;
    let nonce = aes_gcm::Nonce::<U12>::from(iv);
    let payload = Payload { msg: data, aad: ad };
    match mode {
        Mode::Seal => cipher
            .encrypt(&nonce, payload)
            .map_err(|_| BackendError::msg(BackendErrorKind::Operation, "encryption failed")),
        Mode::Open => cipher
            .decrypt(&nonce, payload)
            .map_err(|_| BackendError::msg(BackendErrorKind::Operation, "authentication failed")),
    }
}

fn hmac_sign(hash: HashAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>, BackendError> {
    with_hash!(hash, D => {
        let mut mac = <Hmac<D> as Mac>::new_from_slice(key).map_err(|_| invalid_hmac_key())?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    })
}

fn hmac_verify(
    hash: HashAlgorithm,
    key: &[u8],
    tag: &[u8],
    data: &[u8],
) -> Result<bool, BackendError> {
    with_hash!(hash, D => {
        let mut mac = <Hmac<D> as Mac>::new_from_slice(key).map_err(|_| invalid_hmac_key())?;
        mac.update(data);
        Ok(mac.verify_slice(tag).is_ok())
    })
}

fn invalid_hmac_key() -> BackendError {
    BackendError::msg(BackendErrorKind::Operation, "invalid HMAC key")
}

fn ecdsa_hash(params: &Params) -> Result<(), BackendError> {
    match params.hash {
        Some(HashAlgorithm::Sha256) => Ok(()),
        _ => Err(not_supported("ECDSA P-256 requires SHA-256")),
    }
}

fn p256_curve(params: &Params) -> Result<(), BackendError> {
    match params.named_curve {
        Some(NamedCurve::P256) => Ok(()),
        _ => Err(not_supported("only P-256 is supported")),
    }
}

fn required<T>(v: Option<T>, msg: &'static str) -> Result<T, BackendError> {
    v.ok_or_else(|| BackendError::msg(BackendErrorKind::Operation, msg))
}

fn invalid_jwk() -> BackendError {
    BackendError::msg(BackendErrorKind::Operation, "invalid P-256 JWK")
}

fn wrong_key() -> BackendError {
    BackendError::msg(
        BackendErrorKind::Operation,
        "key material does not fit the operation",
    )
}

fn not_supported(msg: &'static str) -> BackendError {
    BackendError::msg(BackendErrorKind::NotSupported, msg)
}

fn unsupported(name: AlgorithmName, op: &'static str) -> BackendError {
    debug!(%name, op, "unsupported by the RustCrypto backend");
    not_supported("algorithm is not supported by this backend")
}
