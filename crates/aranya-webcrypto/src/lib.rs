//! A provider-agnostic, WebCrypto-style cryptography layer.
//!
//! # Overview
//!
//! This crate does not implement any cryptography. Instead, it
//! sits between callers and a native cryptography provider (a
//! [`Backend`]) and makes sure that every request the backend
//! sees is well-formed:
//!
//! - Algorithms are described by [`Algorithm`], a closed set of
//!   per-family descriptors. A descriptor only carries the
//!   fields that make sense for its family.
//! - Keys are opaque [`KeyHandle`]s that carry their type, their
//!   allowed [`KeyUsages`], and whether they may be exported.
//! - [`SubtleCrypto`] checks each request against the
//!   algorithm/usage/key-type matrix in [`policy`], flattens the
//!   descriptor into [`Params`], and only then calls the
//!   backend.
//!
//! Requests that fail validation never reach the backend.
//! Failures reported by the backend are returned as
//! [`Error::Backend`] with the backend's own error preserved.
//!
//! # Features
//!
//! - `rust`: [`rust::RustBackend`], an in-process backend built
//!   on [RustCrypto]. Requires a tokio runtime.
//! - `test_util`: [`test_util`], helpers for testing backends
//!   and dispatchers.
//!
//! [RustCrypto]: https://github.com/RustCrypto

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod backend;
pub mod bridge;
mod error;
pub mod hash;
pub mod key;
pub mod policy;
pub mod rust;
pub mod subtle;
pub mod test_util;
pub mod usage;

pub use algorithm::{
    AesCbc, AesCtr, AesGcm, AesLength, Algorithm, AlgorithmName, Ecdh, Ecdsa, Hkdf, Hmac,
    NamedCurve, Params, Pbkdf2, PublicExponent, RsaKeyGen, RsaOaep, RsaPss, RsassaPkcs1v15,
    TagLength, encode_public_exponent,
};
pub use backend::Backend;
pub use buggy;
pub use error::*;
pub use hash::HashAlgorithm;
pub use key::{KeyFormat, KeyHandle, KeyMeta, KeyPair, KeyType};
pub use policy::Operation;
pub use subtle::SubtleCrypto;
pub use usage::{KeyUsage, KeyUsages};
