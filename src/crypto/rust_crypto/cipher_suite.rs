//! Ciphersuite and X.509 signature tables for the RustCrypto backend.

use crate::ciphersuite::Authentication as Auth;
use crate::ciphersuite::CipherSuite as CS;
use crate::ciphersuite::KeyExchange as Kx;
use crate::ciphersuite::{CipherSuiteInfo, X509SignatureAlgorithm as X509, X509SignatureInfo};
use crate::types::{HashAlgorithm, SignatureAlgorithm};

use super::cipher::{AES_128_CBC, AES_128_GCM, AES_256_CBC, NULL_CIPHER};
use super::hmac::{HMAC_MD5, HMAC_SHA1, HMAC_SHA256, NULL_MAC};
use super::prf::PRF_SHA256;

macro_rules! suite {
    ($suite:ident, $kx:ident, $auth:ident, $cipher:ident, $mac:ident) => {
        CipherSuiteInfo::new(CS::$suite, Kx::$kx, Auth::$auth, &$cipher, &$mac, &PRF_SHA256)
    };
}

/// Suites without elliptic curves, in preference order.
pub(super) static NO_ECC_CIPHER_SUITES: &[CipherSuiteInfo] = &[
    suite!(RSA_WITH_AES_256_CBC_SHA256, Rsa, Rsa, AES_256_CBC, HMAC_SHA256),
    suite!(RSA_WITH_AES_256_CBC_SHA, Rsa, Rsa, AES_256_CBC, HMAC_SHA1),
    suite!(RSA_WITH_AES_128_CBC_SHA256, Rsa, Rsa, AES_128_CBC, HMAC_SHA256),
    suite!(RSA_WITH_AES_128_CBC_SHA, Rsa, Rsa, AES_128_CBC, HMAC_SHA1),
    suite!(RSA_WITH_AES_128_GCM_SHA256, Rsa, Rsa, AES_128_GCM, NULL_MAC),
    suite!(PSK_WITH_AES_128_CBC_SHA, Psk, Psk, AES_128_CBC, HMAC_SHA1),
    suite!(PSK_WITH_AES_256_CBC_SHA, Psk, Psk, AES_256_CBC, HMAC_SHA1),
    suite!(PSK_WITH_AES_128_CBC_SHA256, Psk, Psk, AES_128_CBC, HMAC_SHA256),
    suite!(PSK_WITH_AES_128_GCM_SHA256, Psk, Psk, AES_128_GCM, NULL_MAC),
    suite!(RSA_WITH_NULL_SHA, Rsa, Rsa, NULL_CIPHER, HMAC_SHA1),
    suite!(RSA_WITH_NULL_MD5, Rsa, Rsa, NULL_CIPHER, HMAC_MD5),
];

/// All suites, elliptic curve ones first.
pub(super) static ECC_CIPHER_SUITES: &[CipherSuiteInfo] = &[
    suite!(ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, Ecdhe, Ecdsa, AES_128_GCM, NULL_MAC),
    suite!(ECDHE_RSA_WITH_AES_128_GCM_SHA256, Ecdhe, Rsa, AES_128_GCM, NULL_MAC),
    suite!(ECDHE_ECDSA_WITH_AES_128_CBC_SHA256, Ecdhe, Ecdsa, AES_128_CBC, HMAC_SHA256),
    suite!(ECDHE_RSA_WITH_AES_128_CBC_SHA256, Ecdhe, Rsa, AES_128_CBC, HMAC_SHA256),
    suite!(ECDHE_ECDSA_WITH_AES_256_CBC_SHA, Ecdhe, Ecdsa, AES_256_CBC, HMAC_SHA1),
    suite!(ECDHE_RSA_WITH_AES_256_CBC_SHA, Ecdhe, Rsa, AES_256_CBC, HMAC_SHA1),
    suite!(ECDHE_ECDSA_WITH_AES_128_CBC_SHA, Ecdhe, Ecdsa, AES_128_CBC, HMAC_SHA1),
    suite!(ECDHE_RSA_WITH_AES_128_CBC_SHA, Ecdhe, Rsa, AES_128_CBC, HMAC_SHA1),
    suite!(ECDH_ECDSA_WITH_AES_128_CBC_SHA256, Ecdh, Ecdsa, AES_128_CBC, HMAC_SHA256),
    suite!(ECDH_RSA_WITH_AES_128_CBC_SHA256, Ecdh, Ecdsa, AES_128_CBC, HMAC_SHA256),
    suite!(ECDH_ECDSA_WITH_AES_256_CBC_SHA, Ecdh, Ecdsa, AES_256_CBC, HMAC_SHA1),
    suite!(ECDH_RSA_WITH_AES_256_CBC_SHA, Ecdh, Ecdsa, AES_256_CBC, HMAC_SHA1),
    suite!(ECDH_ECDSA_WITH_AES_128_CBC_SHA, Ecdh, Ecdsa, AES_128_CBC, HMAC_SHA1),
    suite!(ECDH_RSA_WITH_AES_128_CBC_SHA, Ecdh, Ecdsa, AES_128_CBC, HMAC_SHA1),
    suite!(RSA_WITH_AES_256_CBC_SHA256, Rsa, Rsa, AES_256_CBC, HMAC_SHA256),
    suite!(RSA_WITH_AES_256_CBC_SHA, Rsa, Rsa, AES_256_CBC, HMAC_SHA1),
    suite!(RSA_WITH_AES_128_CBC_SHA256, Rsa, Rsa, AES_128_CBC, HMAC_SHA256),
    suite!(RSA_WITH_AES_128_CBC_SHA, Rsa, Rsa, AES_128_CBC, HMAC_SHA1),
    suite!(RSA_WITH_AES_128_GCM_SHA256, Rsa, Rsa, AES_128_GCM, NULL_MAC),
    suite!(PSK_WITH_AES_128_CBC_SHA, Psk, Psk, AES_128_CBC, HMAC_SHA1),
    suite!(PSK_WITH_AES_256_CBC_SHA, Psk, Psk, AES_256_CBC, HMAC_SHA1),
    suite!(PSK_WITH_AES_128_CBC_SHA256, Psk, Psk, AES_128_CBC, HMAC_SHA256),
    suite!(PSK_WITH_AES_128_GCM_SHA256, Psk, Psk, AES_128_GCM, NULL_MAC),
    suite!(RSA_WITH_NULL_SHA, Rsa, Rsa, NULL_CIPHER, HMAC_SHA1),
    suite!(RSA_WITH_NULL_MD5, Rsa, Rsa, NULL_CIPHER, HMAC_MD5),
];

/// Certificate signature algorithms without ECDSA.
pub(super) static NO_ECC_X509_SIGNATURES: &[X509SignatureInfo] = &[
    X509SignatureInfo::new(X509::RsaMd5, SignatureAlgorithm::RSA, HashAlgorithm::MD5),
    X509SignatureInfo::new(X509::RsaSha1, SignatureAlgorithm::RSA, HashAlgorithm::SHA1),
    X509SignatureInfo::new(X509::RsaSha224, SignatureAlgorithm::RSA, HashAlgorithm::SHA224),
    X509SignatureInfo::new(X509::RsaSha256, SignatureAlgorithm::RSA, HashAlgorithm::SHA256),
    X509SignatureInfo::new(X509::RsaSha384, SignatureAlgorithm::RSA, HashAlgorithm::SHA384),
    X509SignatureInfo::new(X509::RsaSha512, SignatureAlgorithm::RSA, HashAlgorithm::SHA512),
];

/// All certificate signature algorithms.
pub(super) static ECC_X509_SIGNATURES: &[X509SignatureInfo] = &[
    X509SignatureInfo::new(X509::RsaMd5, SignatureAlgorithm::RSA, HashAlgorithm::MD5),
    X509SignatureInfo::new(X509::RsaSha1, SignatureAlgorithm::RSA, HashAlgorithm::SHA1),
    X509SignatureInfo::new(X509::RsaSha224, SignatureAlgorithm::RSA, HashAlgorithm::SHA224),
    X509SignatureInfo::new(X509::RsaSha256, SignatureAlgorithm::RSA, HashAlgorithm::SHA256),
    X509SignatureInfo::new(X509::RsaSha384, SignatureAlgorithm::RSA, HashAlgorithm::SHA384),
    X509SignatureInfo::new(X509::RsaSha512, SignatureAlgorithm::RSA, HashAlgorithm::SHA512),
    X509SignatureInfo::new(X509::EcdsaSha1, SignatureAlgorithm::ECDSA, HashAlgorithm::SHA1),
    X509SignatureInfo::new(X509::EcdsaSha224, SignatureAlgorithm::ECDSA, HashAlgorithm::SHA224),
    X509SignatureInfo::new(X509::EcdsaSha256, SignatureAlgorithm::ECDSA, HashAlgorithm::SHA256),
    X509SignatureInfo::new(X509::EcdsaSha384, SignatureAlgorithm::ECDSA, HashAlgorithm::SHA384),
    X509SignatureInfo::new(X509::EcdsaSha512, SignatureAlgorithm::ECDSA, HashAlgorithm::SHA512),
];
