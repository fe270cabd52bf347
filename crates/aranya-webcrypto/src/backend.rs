//! The native cryptography provider.

use core::future::Future;

use crate::{algorithm::Params, error::BackendError};

/// A native cryptography provider.
///
/// A `Backend` performs the actual cryptography. It is trusted
/// to do so correctly, but every call is asynchronous and may
/// fail.
///
/// Requests are validated by [`SubtleCrypto`][crate::SubtleCrypto]
/// before they reach the backend, and descriptors arrive already
/// flattened into [`Params`]. Usages, formats, and hashes are
/// passed as their string labels.
///
/// Backends may complete calls in any order.
pub trait Backend: Send + Sync {
    /// The backend's key material.
    type Key: Send + Sync + 'static;

    /// Fills `buf` with cryptographically secure random bytes
    /// and returns it.
    fn get_random_values(
        &self,
        buf: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Hashes `data` with `hash`, which is one of `SHA-1`,
    /// `SHA-256`, `SHA-384`, or `SHA-512`.
    fn digest(
        &self,
        hash: &'static str,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Encrypts `data`.
    fn encrypt(
        &self,
        params: &Params,
        key: &Self::Key,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Decrypts `data`.
    fn decrypt(
        &self,
        params: &Params,
        key: &Self::Key,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Signs `data`.
    fn sign(
        &self,
        params: &Params,
        key: &Self::Key,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Reports whether `signature` is a valid signature over
    /// `data`.
    ///
    /// An invalid signature is `Ok(false)`, not an error.
    fn verify(
        &self,
        params: &Params,
        key: &Self::Key,
        signature: &[u8],
        data: &[u8],
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Derives `length` bits from `key`.
    ///
    /// `peer` is the other party's public key for key agreement
    /// algorithms.
    fn derive_bits(
        &self,
        params: &Params,
        key: &Self::Key,
        peer: Option<&Self::Key>,
        length: u32,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Generates a secret key.
    fn generate_key(
        &self,
        params: &Params,
        extractable: bool,
        usages: &[&'static str],
    ) -> impl Future<Output = Result<Self::Key, BackendError>> + Send;

    /// Generates a key pair, returning `(private, public)`.
    ///
    /// `extractable` applies to the private key. The public key
    /// is always extractable.
    fn generate_key_pair(
        &self,
        params: &Params,
        extractable: bool,
        usages: &[&'static str],
    ) -> impl Future<Output = Result<(Self::Key, Self::Key), BackendError>> + Send;

    /// Imports a key from `data`, which is encoded per `format`.
    fn import_key(
        &self,
        format: &'static str,
        data: &[u8],
        params: &Params,
        extractable: bool,
        usages: &[&'static str],
    ) -> impl Future<Output = Result<Self::Key, BackendError>> + Send;

    /// Exports `key` per `format`.
    ///
    /// The backend must refuse to export non-extractable keys
    /// with [`BackendErrorKind::NotExtractable`][crate::BackendErrorKind::NotExtractable].
    fn export_key(
        &self,
        format: &'static str,
        key: &Self::Key,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;
}
