//! Private key loading and use with RustCrypto.

use std::str;

use der::Encode;
use pkcs8::DecodePrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey};
use signature::hazmat::PrehashSigner;
use spki::ObjectIdentifier;

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, PrivateKey};
use crate::types::{NamedGroup, SignatureAlgorithm};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// A private key loaded from DER or PEM.
enum RustCryptoPrivateKey {
    Rsa(Box<RsaPrivateKey>),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for RustCryptoPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RustCryptoPrivateKey::Rsa(_) => f.debug_tuple("PrivateKey::Rsa").finish(),
            RustCryptoPrivateKey::P256(_) => f.debug_tuple("PrivateKey::P256").finish(),
            RustCryptoPrivateKey::P384(_) => f.debug_tuple("PrivateKey::P384").finish(),
        }
    }
}

impl PrivateKey for RustCryptoPrivateKey {
    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            RustCryptoPrivateKey::Rsa(_) => SignatureAlgorithm::RSA,
            _ => SignatureAlgorithm::ECDSA,
        }
    }

    fn group(&self) -> Option<NamedGroup> {
        match self {
            RustCryptoPrivateKey::Rsa(_) => None,
            RustCryptoPrivateKey::P256(_) => Some(NamedGroup::Secp256r1),
            RustCryptoPrivateKey::P384(_) => Some(NamedGroup::Secp384r1),
        }
    }

    fn sign(&self, data: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match self {
            RustCryptoPrivateKey::Rsa(key) => {
                // The caller has already built the DigestInfo (or MD5 + SHA-1).
                let sig = key
                    .sign(Pkcs1v15Sign::new_unprefixed(), data)
                    .map_err(|e| format!("RSA signing failed: {e}"))?;
                out.extend_from_slice(&sig);
            }
            RustCryptoPrivateKey::P256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(data)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            RustCryptoPrivateKey::P384(key) => {
                let signature: p384::ecdsa::Signature = key
                    .sign_prehash(data)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
        }
        Ok(())
    }

    fn decrypt(&self, ciphertext: &[u8], out: &mut Buf) -> Result<(), String> {
        let RustCryptoPrivateKey::Rsa(key) = self else {
            return Err("Decryption needs an RSA key".to_string());
        };
        let plain = key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| "RSA decryption failed".to_string())?;
        out.clear();
        out.extend_from_slice(&plain);
        Ok(())
    }

    fn agree(&self, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match self {
            RustCryptoPrivateKey::Rsa(_) => return Err("Key agreement needs an EC key".to_string()),
            RustCryptoPrivateKey::P256(key) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = p256::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
            RustCryptoPrivateKey::P384(key) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = p384::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
        }
        Ok(())
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl RustCryptoKeyProvider {
    /// Wrap a SEC1 EC key into PKCS#8 so the curve crates can load it.
    fn sec1_to_pkcs8(key_der: &[u8]) -> Option<(ObjectIdentifier, Vec<u8>)> {
        let ec_key = sec1::EcPrivateKey::try_from(key_der).ok()?;
        let private_key_len = ec_key.private_key.len();

        let curve_oid = match &ec_key.parameters {
            Some(sec1::EcParameters::NamedCurve(oid)) => *oid,
            None if private_key_len == 32 => OID_P256,
            None if private_key_len == 48 => OID_P384,
            None => return None,
        };

        let curve_params_der = curve_oid.to_der().ok()?;
        let curve_params_any = der::asn1::AnyRef::try_from(curve_params_der.as_slice()).ok()?;

        let pkcs8 = pkcs8::PrivateKeyInfo {
            algorithm: spki::AlgorithmIdentifierRef {
                oid: OID_EC_PUBLIC_KEY,
                parameters: Some(curve_params_any),
            },
            private_key: key_der,
            public_key: None,
        };

        Some((curve_oid, pkcs8.to_der().ok()?))
    }
}

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn PrivateKey>, String> {
        // Try PKCS#8 DER format first (most common)
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoPrivateKey::Rsa(Box::new(key))));
        }
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoPrivateKey::P256(key)));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoPrivateKey::P384(key)));
        }

        // PKCS#1 RSAPrivateKey
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Box::new(RustCryptoPrivateKey::Rsa(Box::new(key))));
        }

        // SEC1 DER format (OpenSSL EC private key format)
        if let Some((curve_oid, pkcs8_der)) = Self::sec1_to_pkcs8(key_der) {
            if curve_oid == OID_P256 {
                if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(&pkcs8_der) {
                    return Ok(Box::new(RustCryptoPrivateKey::P256(key)));
                }
            }
            if curve_oid == OID_P384 {
                if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(&pkcs8_der) {
                    return Ok(Box::new(RustCryptoPrivateKey::P384(key)));
                }
            }
        }

        // Check if it's a PEM encoded key
        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;
