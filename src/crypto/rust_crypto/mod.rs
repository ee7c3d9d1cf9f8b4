//! RustCrypto cryptographic provider implementation for emtls.
//!
//! This module provides a pure Rust cryptographic backend using crates from
//! the [RustCrypto](https://github.com/RustCrypto) organization.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use emtls::{Config, Role, Session};
//! use emtls::crypto::rust_crypto;
//!
//! let config = Arc::new(
//!     Config::builder()
//!         .with_crypto_provider(rust_crypto::no_ecc_provider())
//!         .build()
//!         .unwrap()
//! );
//! let session = Session::new(Role::Client, config);
//! ```

mod cipher;
mod cipher_suite;
mod hash;
mod hmac;
mod kx_group;
mod prf;
mod random;
mod rsa;
mod sign;
mod x509;

use crate::crypto::provider::CryptoProvider;

fn provider_with(
    cipher_suites: &'static [crate::ciphersuite::CipherSuiteInfo],
    x509_signatures: &'static [crate::ciphersuite::X509SignatureInfo],
    curves: &'static [&'static dyn crate::crypto::provider::CurveMethod],
) -> CryptoProvider {
    CryptoProvider {
        cipher_suites,
        x509_signatures,
        curves,
        hashes: hash::ALL_HASHES,
        md5: &hash::MD5,
        sha1: &hash::SHA1,
        sha256: &hash::SHA256,
        prf_1: &prf::PRF_TLS10,
        hmac_sha256: &hmac::HMAC_SHA256,
        rsa: &rsa::RSA,
        key_provider: &sign::KEY_PROVIDER,
        certificate_parser: &x509::CERTIFICATE_PARSER,
        secure_random: &random::SECURE_RANDOM,
    }
}

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Cipher Suites
///
/// ECDHE-ECDSA, ECDHE-RSA, ECDH-ECDSA and ECDH-RSA with AES-CBC and
/// AES-128-GCM, followed by everything in [`no_ecc_provider`].
///
/// # Supported Curves
///
/// - `secp256r1` (P-256)
/// - `secp384r1` (P-384)
///
/// # Key Formats
///
/// The key provider supports loading private keys in:
/// - PKCS#8 DER format (RSA and EC)
/// - PKCS#1 DER format (RSA)
/// - SEC1 DER format (OpenSSL EC private key format)
/// - PEM encoded versions of the above
///
/// # Random Number Generation
///
/// Uses `OsRng` from the `rand` crate.
pub fn default_provider() -> CryptoProvider {
    provider_with(
        cipher_suite::ECC_CIPHER_SUITES,
        cipher_suite::ECC_X509_SIGNATURES,
        kx_group::ALL_CURVES,
    )
}

/// A provider whose tables leave out every elliptic curve suite.
///
/// RSA and PSK key exchange with AES-CBC, AES-128-GCM and the NULL ciphers.
/// Certificates must be RSA signed.
pub fn no_ecc_provider() -> CryptoProvider {
    provider_with(
        cipher_suite::NO_ECC_CIPHER_SUITES,
        cipher_suite::NO_ECC_X509_SIGNATURES,
        &[],
    )
}
