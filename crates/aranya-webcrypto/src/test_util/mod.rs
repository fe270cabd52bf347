//! Utilities for testing [`SubtleCrypto`][crate::SubtleCrypto]
//! and [`Backend`] implementations.

#![cfg(any(test, feature = "test_util"))]
#![cfg_attr(docsrs, doc(cfg(feature = "test_util")))]
#![forbid(unsafe_code)]

use core::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{algorithm::Params, backend::Backend, error::BackendError};

/// A [`Backend`] that counts how many times it was called.
///
/// Calls are counted when the backend method is invoked, not
/// when the returned future completes.
#[derive(Debug, Default)]
pub struct CountingBackend<B> {
    inner: B,
    calls: AtomicUsize,
}

impl<B> CountingBackend<B> {
    /// Wraps `inner`.
    pub const fn new(inner: B) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of backend calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Resets the call count to zero, returning the old count.
    pub fn reset(&self) -> usize {
        self.calls.swap(0, Ordering::SeqCst)
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn record(&self) -> &B {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.inner
    }
}

impl<B: Backend> Backend for CountingBackend<B> {
    type Key = B::Key;

    fn get_random_values(
        &self,
        buf: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().get_random_values(buf)
    }

    fn digest(
        &self,
        hash: &'static str,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().digest(hash, data)
    }

    fn encrypt(
        &self,
        params: &Params,
        key: &Self::Key,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().encrypt(params, key, data)
    }

    fn decrypt(
        &self,
        params: &Params,
        key: &Self::Key,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().decrypt(params, key, data)
    }

    fn sign(
        &self,
        params: &Params,
        key: &Self::Key,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().sign(params, key, data)
    }

    fn verify(
        &self,
        params: &Params,
        key: &Self::Key,
        signature: &[u8],
        data: &[u8],
    ) -> impl Future<Output = Result<bool, BackendError>> + Send {
        self.record().verify(params, key, signature, data)
    }

    fn derive_bits(
        &self,
        params: &Params,
        key: &Self::Key,
        peer: Option<&Self::Key>,
        length: u32,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().derive_bits(params, key, peer, length)
    }

    fn generate_key(
        &self,
        params: &Params,
        extractable: bool,
        usages: &[&'static str],
    ) -> impl Future<Output = Result<Self::Key, BackendError>> + Send {
        self.record().generate_key(params, extractable, usages)
    }

    fn generate_key_pair(
        &self,
        params: &Params,
        extractable: bool,
        usages: &[&'static str],
    ) -> impl Future<Output = Result<(Self::Key, Self::Key), BackendError>> + Send {
        self.record().generate_key_pair(params, extractable, usages)
    }

    fn import_key(
        &self,
        format: &'static str,
        data: &[u8],
        params: &Params,
        extractable: bool,
        usages: &[&'static str],
    ) -> impl Future<Output = Result<Self::Key, BackendError>> + Send {
        self.record().import_key(format, data, params, extractable, usages)
    }

    fn export_key(
        &self,
        format: &'static str,
        key: &Self::Key,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send {
        self.record().export_key(format, key)
    }
}

#[cfg(all(test, feature = "rust"))]
mod tests {
    use super::*;
    use crate::rust::RustBackend;

    #[tokio::test]
    async fn test_counts_calls() {
        let backend = CountingBackend::new(RustBackend);
        assert_eq!(backend.calls(), 0);

        let fut = backend.digest("SHA-256", b"abc");
        // Counted before the future is polled.
        assert_eq!(backend.calls(), 1);
        fut.await.expect("should digest");

        backend
            .get_random_values(vec![0; 8])
            .await
            .expect("should fill");
        assert_eq!(backend.reset(), 2);
        assert_eq!(backend.calls(), 0);
    }
}
