//! The operation dispatcher.

use tracing::{debug, instrument, warn};

use crate::{
    algorithm::{Algorithm, AlgorithmName, Params},
    backend::Backend,
    error::{BackendError, BackendErrorKind, Error},
    hash::HashAlgorithm,
    key::{KeyFormat, KeyHandle, KeyMeta, KeyPair, KeyType},
    policy::{self, Operation},
    usage::KeyUsages,
};

/// The largest buffer [`SubtleCrypto::get_random_values`] will
/// fill.
pub const MAX_RANDOM_BYTES: usize = 65536;

/// Validates requests and dispatches them to a [`Backend`].
///
/// Every request is checked against the compatibility matrix in
/// [`policy`] before the backend sees it. Requests that fail
/// validation never reach the backend.
///
/// `SubtleCrypto` holds no mutable state. It can be shared
/// between tasks (e.g., with an [`Arc`][std::sync::Arc]) and
/// any number of calls may be in flight at once. Calls cannot
/// be cancelled: dropping the future stops waiting for the
/// result, not the backend.
#[derive(Clone, Debug, Default)]
pub struct SubtleCrypto<B> {
    backend: B,
}

impl<B> SubtleCrypto<B> {
    /// Creates a dispatcher for `backend`.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend, consuming the dispatcher.
    pub fn into_inner(self) -> B {
        self.backend
    }
}

impl<B: Backend> SubtleCrypto<B> {
    /// Hashes `data`.
    #[instrument(skip_all, fields(alg = %hash))]
    pub async fn digest(&self, hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, Error> {
        let op = Operation::Digest;
        policy::check_supported(AlgorithmName::Sha(hash), op)?;
        self.backend
            .digest(hash.as_str(), data)
            .await
            .map_err(failed(op.as_str()))
    }

    /// Fills `buf` with random bytes.
    ///
    /// `buf` must be at most [`MAX_RANDOM_BYTES`] long.
    #[instrument(skip_all, fields(len = buf.len()))]
    pub async fn get_random_values(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() > MAX_RANDOM_BYTES {
            debug!("random buffer exceeds quota");
            return Err(Error::InvalidParameter(
                "random buffer is longer than 65536 bytes",
            ));
        }
        let got = self
            .backend
            .get_random_values(vec![0; buf.len()])
            .await
            .map_err(failed("getRandomValues"))?;
        if got.len() != buf.len() {
            warn!(got = got.len(), "backend returned a short random buffer");
            return Err(Error::Backend(BackendError::msg(
                BackendErrorKind::Operation,
                "backend returned the wrong number of random bytes",
            )));
        }
        buf.copy_from_slice(&got);
        Ok(())
    }

    /// Encrypts `data`.
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn encrypt(
        &self,
        alg: &Algorithm,
        key: &KeyHandle<B::Key>,
        data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let op = Operation::Encrypt;
        let params = prepare(alg, op, key.meta())?;
        self.backend
            .encrypt(&params, key.native(), data)
            .await
            .map_err(failed(op.as_str()))
    }

    /// Decrypts `data`.
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn decrypt(
        &self,
        alg: &Algorithm,
        key: &KeyHandle<B::Key>,
        data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let op = Operation::Decrypt;
        let params = prepare(alg, op, key.meta())?;
        self.backend
            .decrypt(&params, key.native(), data)
            .await
            .map_err(failed(op.as_str()))
    }

    /// Signs `data`.
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn sign(
        &self,
        alg: &Algorithm,
        key: &KeyHandle<B::Key>,
        data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let op = Operation::Sign;
        let params = prepare(alg, op, key.meta())?;
        self.backend
            .sign(&params, key.native(), data)
            .await
            .map_err(failed(op.as_str()))
    }

    /// Reports whether `signature` is a valid signature over
    /// `data`.
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn verify(
        &self,
        alg: &Algorithm,
        key: &KeyHandle<B::Key>,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool, Error> {
        let op = Operation::Verify;
        let params = prepare(alg, op, key.meta())?;
        self.backend
            .verify(&params, key.native(), signature, data)
            .await
            .map_err(failed(op.as_str()))
    }

    /// Derives `length_bits` bits from `key`.
    ///
    /// ECDH requires `peer`, the other party's public key. Other
    /// algorithms must not be given one.
    #[instrument(skip_all, fields(alg = %alg.name(), length_bits = length_bits))]
    pub async fn derive_bits(
        &self,
        alg: &Algorithm,
        key: &KeyHandle<B::Key>,
        peer: Option<&KeyHandle<B::Key>>,
        length_bits: u32,
    ) -> Result<Vec<u8>, Error> {
        let op = Operation::DeriveBits;
        let params = prepare(alg, op, key.meta())?;
        if length_bits == 0 || length_bits % 8 != 0 {
            debug!("invalid derived length");
            return Err(Error::InvalidParameter(
                "length must be a non-zero multiple of 8",
            ));
        }
        let peer = check_peer(alg.name(), peer)?;
        self.backend
            .derive_bits(&params, key.native(), peer.map(KeyHandle::native), length_bits)
            .await
            .map_err(failed(op.as_str()))
    }

    /// Derives a key for `derived` from `base_key`.
    ///
    /// The request is validated, but no backend primitive is
    /// wired up, so this always fails with
    /// [`Error::Unimplemented`].
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn derive_key(
        &self,
        alg: &Algorithm,
        base_key: &KeyHandle<B::Key>,
        derived: &Algorithm,
        extractable: bool,
        usages: KeyUsages,
    ) -> Result<KeyHandle<B::Key>, Error> {
        let op = Operation::DeriveKey;
        prepare(alg, op, base_key.meta())?;
        policy::check_new_key_usages(derived.name(), op, usages)?;
        debug!(derived = %derived.name(), extractable, "deriveKey is unimplemented");
        Err(Error::Unimplemented("deriveKey"))
    }

    /// Exports `key` and encrypts it with `wrapping_key`.
    ///
    /// The request is validated, but no backend primitive is
    /// wired up, so this always fails with
    /// [`Error::Unimplemented`].
    #[instrument(skip_all, fields(alg = %wrap_alg.name()))]
    pub async fn wrap_key(
        &self,
        format: KeyFormat,
        key: &KeyHandle<B::Key>,
        wrapping_key: &KeyHandle<B::Key>,
        wrap_alg: &Algorithm,
    ) -> Result<Vec<u8>, Error> {
        let op = Operation::WrapKey;
        prepare(wrap_alg, op, wrapping_key.meta())?;
        if !key.extractable() {
            debug!("wrapped key is not extractable");
            return Err(Error::NotExtractable(None));
        }
        debug!(%format, "wrapKey is unimplemented");
        Err(Error::Unimplemented("wrapKey"))
    }

    /// Decrypts `wrapped` with `unwrapping_key` and imports the
    /// result.
    ///
    /// The request is validated, but no backend primitive is
    /// wired up, so this always fails with
    /// [`Error::Unimplemented`].
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(alg = %unwrap_alg.name()))]
    pub async fn unwrap_key(
        &self,
        format: KeyFormat,
        wrapped: &[u8],
        unwrapping_key: &KeyHandle<B::Key>,
        unwrap_alg: &Algorithm,
        unwrapped: &Algorithm,
        extractable: bool,
        usages: KeyUsages,
    ) -> Result<KeyHandle<B::Key>, Error> {
        let op = Operation::UnwrapKey;
        prepare(unwrap_alg, op, unwrapping_key.meta())?;
        policy::check_supported(unwrapped.name(), Operation::ImportKey)?;
        policy::check_new_key_usages(unwrapped.name(), op, usages)?;
        debug!(
            %format,
            len = wrapped.len(),
            unwrapped = %unwrapped.name(),
            extractable,
            "unwrapKey is unimplemented"
        );
        Err(Error::Unimplemented("unwrapKey"))
    }

    /// Generates a secret key.
    ///
    /// Use [`generate_key_pair`][Self::generate_key_pair] for
    /// asymmetric algorithms.
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn generate_key(
        &self,
        alg: &Algorithm,
        extractable: bool,
        usages: KeyUsages,
    ) -> Result<KeyHandle<B::Key>, Error> {
        let op = Operation::GenerateKey;
        let name = alg.name();
        policy::check_supported(name, op)?;
        if name.is_asymmetric() {
            debug!("asymmetric algorithm passed to generate_key");
            return Err(Error::InvalidParameter(
                "asymmetric algorithms generate key pairs",
            ));
        }
        policy::check_new_key_usages(name, op, usages)?;
        policy::check_key_type_usages(KeyType::Secret, op, usages)?;
        policy::check_params(alg, op)?;

        let params = alg.to_params();
        let native = self
            .backend
            .generate_key(&params, extractable, &usages.labels())
            .await
            .map_err(failed(op.as_str()))?;
        Ok(KeyHandle::new(
            native,
            KeyMeta {
                key_type: KeyType::Secret,
                extractable,
                usages,
                algorithm: name,
            },
        ))
    }

    /// Generates an asymmetric key pair.
    ///
    /// `usages` are split between the two halves. The private
    /// key gets the usages that need a private key and the
    /// public key gets the rest. The public key is always
    /// extractable.
    #[instrument(skip_all, fields(alg = %alg.name()))]
    pub async fn generate_key_pair(
        &self,
        alg: &Algorithm,
        extractable: bool,
        usages: KeyUsages,
    ) -> Result<KeyPair<B::Key>, Error> {
        let op = Operation::GenerateKey;
        let name = alg.name();
        policy::check_supported(name, op)?;
        if !name.is_asymmetric() {
            debug!("symmetric algorithm passed to generate_key_pair");
            return Err(Error::InvalidParameter(
                "symmetric algorithms do not have key pairs",
            ));
        }
        policy::check_new_key_usages(name, op, usages)?;
        let (private_usages, public_usages) = policy::split_pair_usages(usages);
        policy::check_key_type_usages(KeyType::Private, op, private_usages)?;
        policy::check_params(alg, op)?;

        let params = alg.to_params();
        let (private, public) = self
            .backend
            .generate_key_pair(&params, extractable, &usages.labels())
            .await
            .map_err(failed(op.as_str()))?;
        Ok(KeyPair {
            private_key: KeyHandle::new(
                private,
                KeyMeta {
                    key_type: KeyType::Private,
                    extractable,
                    usages: private_usages,
                    algorithm: name,
                },
            ),
            public_key: KeyHandle::new(
                public,
                KeyMeta {
                    key_type: KeyType::Public,
                    extractable: true,
                    usages: public_usages,
                    algorithm: name,
                },
            ),
        })
    }

    /// Imports a key.
    ///
    /// The key's type follows from `format`, and for `jwk` from
    /// whether the key has a private member. See
    /// [`policy::imported_key_type`].
    #[instrument(skip_all, fields(alg = %alg.name(), format = %format))]
    pub async fn import_key(
        &self,
        format: KeyFormat,
        data: &[u8],
        alg: &Algorithm,
        extractable: bool,
        usages: KeyUsages,
    ) -> Result<KeyHandle<B::Key>, Error> {
        let op = Operation::ImportKey;
        let name = alg.name();
        policy::check_supported(name, op)?;
        policy::check_new_key_usages(name, op, usages)?;
        let key_type = policy::imported_key_type(name, format, data);
        policy::check_key_type_usages(key_type, op, usages)?;
        policy::check_params(alg, op)?;

        let params = alg.to_params();
        let native = self
            .backend
            .import_key(format.as_str(), data, &params, extractable, &usages.labels())
            .await
            .map_err(failed(op.as_str()))?;
        Ok(KeyHandle::new(
            native,
            KeyMeta {
                key_type,
                extractable,
                usages,
                algorithm: name,
            },
        ))
    }

    /// Exports `key`.
    ///
    /// Non-extractable keys are rejected without calling the
    /// backend.
    #[instrument(skip_all, fields(alg = %key.algorithm(), format = %format))]
    pub async fn export_key(
        &self,
        format: KeyFormat,
        key: &KeyHandle<B::Key>,
    ) -> Result<Vec<u8>, Error> {
        let op = Operation::ExportKey;
        policy::check_supported(key.algorithm(), op)?;
        if !key.extractable() {
            debug!("key is not extractable");
            return Err(Error::NotExtractable(None));
        }
        self.backend
            .export_key(format.as_str(), key.native())
            .await
            .map_err(failed(op.as_str()))
    }
}

/// Runs every check for an operation on an existing key and
/// flattens the descriptor.
fn prepare(alg: &Algorithm, op: Operation, key: &KeyMeta) -> Result<Params, Error> {
    let name = alg.name();
    policy::check_supported(name, op)?;
    policy::check_key(name, op, key)?;
    policy::check_params(alg, op)?;
    Ok(alg.to_params())
}

fn check_peer<K>(
    alg: AlgorithmName,
    peer: Option<&KeyHandle<K>>,
) -> Result<Option<&KeyHandle<K>>, Error> {
    match (alg, peer) {
        (AlgorithmName::Ecdh, None) => {
            debug!("missing ECDH peer key");
            Err(Error::InvalidParameter("ECDH requires a peer public key"))
        }
        (AlgorithmName::Ecdh, Some(peer)) => {
            if peer.algorithm() != alg {
                debug!(got = %peer.algorithm(), "peer key algorithm mismatch");
                return Err(Error::KeyAlgorithmMismatch {
                    expected: alg,
                    got: peer.algorithm(),
                });
            }
            if peer.key_type() != KeyType::Public {
                debug!(key_type = %peer.key_type(), "peer key is not public");
                return Err(Error::WrongKeyType {
                    operation: Operation::DeriveBits,
                    got: peer.key_type(),
                });
            }
            Ok(Some(peer))
        }
        (_, Some(_)) => {
            debug!("unexpected peer key");
            Err(Error::InvalidParameter(
                "only key agreement algorithms take a peer key",
            ))
        }
        (_, None) => Ok(None),
    }
}

fn failed(op: &'static str) -> impl FnOnce(BackendError) -> Error {
    move |err| {
        warn!(op, %err, "backend failure");
        Error::from(err)
    }
}
