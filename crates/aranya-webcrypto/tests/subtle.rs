use std::sync::Arc;

use anyhow::Result;
use aranya_webcrypto::{
    AesGcm, AesLength, Algorithm, BackendErrorKind, Ecdh, Ecdsa, Error, ErrorKind,
    HashAlgorithm, Hkdf, Hmac, KeyFormat, KeyType, KeyUsage, KeyUsages, NamedCurve, SubtleCrypto,
    rust::RustBackend, subtle::MAX_RANDOM_BYTES, test_util::CountingBackend,
};

type Subtle = SubtleCrypto<CountingBackend<RustBackend>>;

fn subtle() -> Subtle {
    SubtleCrypto::new(CountingBackend::new(RustBackend))
}

fn ecdsa() -> Algorithm {
    Ecdsa::new()
        .with_curve(NamedCurve::P256)
        .with_hash(HashAlgorithm::Sha256)
        .into()
}

fn sign_verify() -> KeyUsages {
    [KeyUsage::Sign, KeyUsage::Verify].into()
}

#[test_log::test(tokio::test)]
async fn test_sign_with_public_key_never_reaches_backend() -> Result<()> {
    let subtle = subtle();
    let pair = subtle.generate_key_pair(&ecdsa(), false, sign_verify()).await?;
    assert_eq!(pair.public_key.key_type(), KeyType::Public);
    assert_eq!(pair.public_key.usages(), KeyUsages::from(KeyUsage::Verify));
    subtle.backend().reset();

    let err = subtle
        .sign(&ecdsa(), &pair.public_key, b"hello")
        .await
        .expect_err("public keys cannot sign");
    assert!(
        matches!(
            err.kind(),
            ErrorKind::UsageNotPermitted | ErrorKind::WrongKeyType
        ),
        "{err}"
    );
    assert!(err.is_validation());
    assert_eq!(subtle.backend().calls(), 0);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_export_non_extractable_never_reaches_backend() -> Result<()> {
    let subtle = subtle();
    let alg = Algorithm::from(AesGcm::new().with_length(AesLength::Aes256));
    let usages = KeyUsages::from([KeyUsage::Encrypt, KeyUsage::Decrypt]);

    let key = subtle.generate_key(&alg, false, usages).await?;
    subtle.backend().reset();
    let err = subtle
        .export_key(KeyFormat::Raw, &key)
        .await
        .expect_err("key is not extractable");
    assert!(matches!(err, Error::NotExtractable(None)), "{err}");
    assert_eq!(subtle.backend().calls(), 0);

    let key = subtle.generate_key(&alg, true, usages).await?;
    let raw = subtle.export_key(KeyFormat::Raw, &key).await?;
    assert_eq!(raw.len(), 32);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_public_key_outlives_private_key() -> Result<()> {
    let subtle = subtle();
    let (private, public) = subtle
        .generate_key_pair(&ecdsa(), false, sign_verify())
        .await?
        .into_parts();
    let sig = subtle.sign(&ecdsa(), &private, b"hello").await?;
    drop(private);

    assert!(subtle.verify(&ecdsa(), &public, &sig, b"hello").await?);
    assert!(!subtle.verify(&ecdsa(), &public, &sig, b"goodbye").await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_public_key_is_always_extractable() -> Result<()> {
    let subtle = subtle();
    let pair = subtle
        .generate_key_pair(&ecdsa(), false, sign_verify())
        .await?;
    assert!(!pair.private_key.extractable());
    assert!(pair.public_key.extractable());

    let raw = subtle.export_key(KeyFormat::Raw, &pair.public_key).await?;
    let imported = subtle
        .import_key(
            KeyFormat::Raw,
            &raw,
            &ecdsa(),
            true,
            KeyUsage::Verify.into(),
        )
        .await?;
    assert_eq!(imported.key_type(), KeyType::Public);

    let sig = subtle.sign(&ecdsa(), &pair.private_key, b"msg").await?;
    assert!(subtle.verify(&ecdsa(), &imported, &sig, b"msg").await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_digest_is_deterministic() -> Result<()> {
    let subtle = subtle();
    for hash in HashAlgorithm::ALL {
        let a = subtle.digest(hash, b"the quick brown fox").await?;
        let b = subtle.digest(hash, b"the quick brown fox").await?;
        assert_eq!(a, b, "{hash}");
        assert_eq!(a.len(), hash.digest_len(), "{hash}");
    }
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_concurrent_signs_on_shared_key() -> Result<()> {
    const N: usize = 32;

    let subtle = Arc::new(SubtleCrypto::new(RustBackend));
    let pair = subtle
        .generate_key_pair(&ecdsa(), false, sign_verify())
        .await?;

    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let subtle = Arc::clone(&subtle);
        let key = pair.private_key.clone();
        handles.push(tokio::spawn(async move {
            let msg = i.to_be_bytes();
            let sig = subtle.sign(&ecdsa(), &key, &msg).await?;
            Ok::<_, Error>((msg, sig))
        }));
    }
    for handle in handles {
        let (msg, sig) = handle.await??;
        assert!(
            subtle
                .verify(&ecdsa(), &pair.public_key, &sig, &msg)
                .await?
        );
    }
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unimplemented_operations() -> Result<()> {
    let subtle = subtle();

    let base = subtle
        .import_key(
            KeyFormat::Raw,
            &[7; 32],
            &Hkdf::new().into(),
            false,
            KeyUsage::DeriveKey.into(),
        )
        .await?;
    let aes = subtle
        .generate_key(
            &AesGcm::new().with_length(AesLength::Aes128).into(),
            true,
            [KeyUsage::WrapKey, KeyUsage::UnwrapKey].into(),
        )
        .await?;
    subtle.backend().reset();

    let hkdf = Algorithm::from(
        Hkdf::new()
            .with_hash(HashAlgorithm::Sha256)
            .with_salt(*b"salt")
            .with_info(*b"info"),
    );
    let err = subtle
        .derive_key(
            &hkdf,
            &base,
            &AesGcm::new().with_length(AesLength::Aes256).into(),
            false,
            KeyUsage::Encrypt.into(),
        )
        .await
        .expect_err("deriveKey is unimplemented");
    assert!(matches!(err, Error::Unimplemented("deriveKey")), "{err}");

    let wrap = Algorithm::from(AesGcm::new().with_iv([0u8; 12]));
    let err = subtle
        .wrap_key(KeyFormat::Raw, &aes, &aes, &wrap)
        .await
        .expect_err("wrapKey is unimplemented");
    assert!(matches!(err, Error::Unimplemented("wrapKey")), "{err}");

    let err = subtle
        .unwrap_key(
            KeyFormat::Raw,
            &[0; 48],
            &aes,
            &wrap,
            &Hmac::new(HashAlgorithm::Sha256).into(),
            false,
            KeyUsage::Sign.into(),
        )
        .await
        .expect_err("unwrapKey is unimplemented");
    assert!(matches!(err, Error::Unimplemented("unwrapKey")), "{err}");
    assert!(!err.is_validation());

    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unimplemented_operations_still_validate() -> Result<()> {
    let subtle = subtle();
    let aes = subtle
        .generate_key(
            &AesGcm::new().with_length(AesLength::Aes128).into(),
            true,
            KeyUsage::Encrypt.into(),
        )
        .await?;

    let wrap = Algorithm::from(AesGcm::new().with_iv([0u8; 12]));
    let err = subtle
        .wrap_key(KeyFormat::Raw, &aes, &aes, &wrap)
        .await
        .expect_err("key lacks the wrapKey usage");
    assert_eq!(err.kind(), ErrorKind::UsageNotPermitted);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_aes_gcm_round_trip() -> Result<()> {
    let subtle = subtle();
    let key = subtle
        .generate_key(
            &AesGcm::new().with_length(AesLength::Aes128).into(),
            false,
            [KeyUsage::Encrypt, KeyUsage::Decrypt].into(),
        )
        .await?;
    let alg = Algorithm::from(
        AesGcm::new()
            .with_iv([9u8; 12])
            .with_additional_data(*b"ad"),
    );

    let ciphertext = subtle.encrypt(&alg, &key, b"attack at dawn").await?;
    let plaintext = subtle.decrypt(&alg, &key, &ciphertext).await?;
    assert_eq!(plaintext, b"attack at dawn");

    let mut tampered = ciphertext;
    if let Some(b) = tampered.last_mut() {
        *b ^= 0xff;
    }
    let err = subtle
        .decrypt(&alg, &key, &tampered)
        .await
        .expect_err("tag should not verify");
    match err {
        Error::Backend(err) => assert_eq!(err.kind(), BackendErrorKind::Operation),
        err => anyhow::bail!("expected `Error::Backend`, got {err:?}"),
    }
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_missing_iv_is_invalid_parameter() -> Result<()> {
    let subtle = subtle();
    let key = subtle
        .generate_key(
            &AesGcm::new().with_length(AesLength::Aes128).into(),
            false,
            KeyUsage::Encrypt.into(),
        )
        .await?;
    subtle.backend().reset();

    let err = subtle
        .encrypt(&AesGcm::new().into(), &key, b"data")
        .await
        .expect_err("AES-GCM needs an IV");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_key_algorithm_mismatch() -> Result<()> {
    let subtle = subtle();
    let key = subtle
        .generate_key(
            &Hmac::new(HashAlgorithm::Sha256).into(),
            false,
            sign_verify(),
        )
        .await?;
    subtle.backend().reset();

    let err = subtle
        .sign(&ecdsa(), &key, b"data")
        .await
        .expect_err("HMAC key used for ECDSA");
    assert_eq!(err.kind(), ErrorKind::KeyAlgorithmMismatch);
    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_hmac_sign_verify() -> Result<()> {
    let subtle = subtle();
    let alg = Algorithm::from(Hmac::new(HashAlgorithm::Sha384));
    let key = subtle.generate_key(&alg, false, sign_verify()).await?;
    assert_eq!(key.key_type(), KeyType::Secret);

    let tag = subtle.sign(&alg, &key, b"data").await?;
    assert_eq!(tag.len(), HashAlgorithm::Sha384.digest_len());
    assert!(subtle.verify(&alg, &key, &tag, b"data").await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_ecdh_derive_bits() -> Result<()> {
    let subtle = subtle();
    let alg = Algorithm::from(Ecdh::new().with_curve(NamedCurve::P256));
    let usages = KeyUsages::from(KeyUsage::DeriveBits);
    let a = subtle.generate_key_pair(&alg, false, usages).await?;
    let b = subtle.generate_key_pair(&alg, false, usages).await?;
    assert!(a.public_key.usages().is_empty());

    let ab = subtle
        .derive_bits(&alg, &a.private_key, Some(&b.public_key), 128)
        .await?;
    let ba = subtle
        .derive_bits(&alg, &b.private_key, Some(&a.public_key), 128)
        .await?;
    assert_eq!(ab, ba);
    assert_eq!(ab.len(), 16);

    subtle.backend().reset();
    let err = subtle
        .derive_bits(&alg, &a.private_key, None, 128)
        .await
        .expect_err("ECDH needs a peer");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let err = subtle
        .derive_bits(&alg, &a.private_key, Some(&b.private_key), 128)
        .await
        .expect_err("peer must be public");
    assert_eq!(err.kind(), ErrorKind::WrongKeyType);

    for length in [0, 7, 129] {
        let err = subtle
            .derive_bits(&alg, &a.private_key, Some(&b.public_key), length)
            .await
            .expect_err("length must be a non-zero multiple of 8");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter, "{length}");
    }
    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_hkdf_derive_bits() -> Result<()> {
    let subtle = subtle();
    let ikm = subtle
        .import_key(
            KeyFormat::Raw,
            b"input keying material",
            &Hkdf::new().into(),
            false,
            KeyUsage::DeriveBits.into(),
        )
        .await?;
    let alg = Algorithm::from(
        Hkdf::new()
            .with_hash(HashAlgorithm::Sha512)
            .with_salt(*b"salt")
            .with_info(*b"context"),
    );
    let a = subtle.derive_bits(&alg, &ikm, None, 256).await?;
    let b = subtle.derive_bits(&alg, &ikm, None, 256).await?;
    assert_eq!(a, b);
    assert_eq!(a.len(), 32);

    let err = subtle
        .export_key(KeyFormat::Raw, &ikm)
        .await
        .expect_err("HKDF keys cannot be exported");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_get_random_values() -> Result<()> {
    let subtle = subtle();

    let mut buf = [0u8; 32];
    subtle.get_random_values(&mut buf).await?;
    assert_ne!(buf, [0; 32]);

    let mut buf = vec![0u8; MAX_RANDOM_BYTES];
    subtle.get_random_values(&mut buf).await?;

    subtle.backend().reset();
    let mut buf = vec![0u8; MAX_RANDOM_BYTES + 1];
    let err = subtle
        .get_random_values(&mut buf)
        .await
        .expect_err("over quota");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_key_pair_without_private_usages() -> Result<()> {
    let subtle = subtle();
    let err = subtle
        .generate_key_pair(&ecdsa(), false, KeyUsage::Verify.into())
        .await
        .expect_err("private key would have no usages");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_generate_key_validation() -> Result<()> {
    let subtle = subtle();
    let aes = Algorithm::from(AesGcm::new().with_length(AesLength::Aes256));

    let err = subtle
        .generate_key(&ecdsa(), false, sign_verify())
        .await
        .expect_err("ECDSA keys come in pairs");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let err = subtle
        .generate_key_pair(&aes, false, KeyUsage::Encrypt.into())
        .await
        .expect_err("AES keys do not come in pairs");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let err = subtle
        .generate_key(&aes, false, KeyUsage::Sign.into())
        .await
        .expect_err("AES keys cannot sign");
    assert_eq!(err.kind(), ErrorKind::UsageNotPermitted);

    let err = subtle
        .generate_key(&aes, false, KeyUsages::EMPTY)
        .await
        .expect_err("secret keys need a usage");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let err = subtle
        .generate_key(&AesGcm::new().into(), false, KeyUsage::Encrypt.into())
        .await
        .expect_err("AES keys need a length");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_import_public_key_usages() -> Result<()> {
    let subtle = subtle();
    let pair = subtle
        .generate_key_pair(&ecdsa(), false, sign_verify())
        .await?;
    let raw = subtle.export_key(KeyFormat::Raw, &pair.public_key).await?;
    subtle.backend().reset();

    let err = subtle
        .import_key(KeyFormat::Raw, &raw, &ecdsa(), true, sign_verify())
        .await
        .expect_err("raw EC keys are public and cannot sign");
    assert_eq!(err.kind(), ErrorKind::UsageNotPermitted);
    assert_eq!(subtle.backend().calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_backend_rejection_is_surfaced() -> Result<()> {
    let subtle = subtle();
    let err = subtle
        .import_key(
            KeyFormat::Spki,
            b"not a key",
            &ecdsa(),
            true,
            KeyUsage::Verify.into(),
        )
        .await
        .expect_err("the RustCrypto backend does not import SPKI keys");
    match err {
        Error::Backend(err) => assert_eq!(err.kind(), BackendErrorKind::NotSupported),
        err => anyhow::bail!("expected `Error::Backend`, got {err:?}"),
    }
    assert_eq!(subtle.backend().calls(), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_jwk_key_type_follows_private_member() -> Result<()> {
    let subtle = subtle();

    // A private JWK may sign, so validation passes and the
    // backend decides the key is malformed.
    let err = subtle
        .import_key(
            KeyFormat::Jwk,
            br#"{"kty":"EC","crv":"P-256","x":"AA","y":"AA","d":"AA"}"#,
            &ecdsa(),
            false,
            KeyUsage::Sign.into(),
        )
        .await
        .expect_err("the JWK is malformed");
    match err {
        Error::Backend(err) => assert_eq!(err.kind(), BackendErrorKind::Operation),
        err => anyhow::bail!("expected `Error::Backend`, got {err:?}"),
    }
    assert_eq!(subtle.backend().calls(), 1);

    // A public JWK may not.
    subtle.backend().reset();
    let err = subtle
        .import_key(
            KeyFormat::Jwk,
            br#"{"kty":"EC","crv":"P-256","x":"AA","y":"AA"}"#,
            &ecdsa(),
            false,
            KeyUsage::Sign.into(),
        )
        .await
        .expect_err("public keys cannot sign");
    assert_eq!(err.kind(), ErrorKind::UsageNotPermitted);
    assert_eq!(subtle.backend().calls(), 0);

    Ok(())
}
