//! Certificate generation for tests and quick setups.
//!
//! Produces DER certificates with PKCS#8 private keys that load straight
//! into a [`Session`](crate::Session): self signed identities, or a small
//! CA issuing leaf certificates.

use std::fmt;

use rcgen::{
    BasicConstraints, Certificate as RcgenCertificate, CertificateParams, DistinguishedName,
    DnType, IsCa, KeyPair, SignatureAlgorithm, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::Error;

/// Key type of a generated certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    EcdsaP256,
    EcdsaP384,
}

impl KeyType {
    fn algorithm(&self) -> &'static SignatureAlgorithm {
        match self {
            KeyType::EcdsaP256 => &PKCS_ECDSA_P256_SHA256,
            KeyType::EcdsaP384 => &PKCS_ECDSA_P384_SHA384,
        }
    }
}

/// Certificate and private key pair
#[derive(Clone)]
pub struct GeneratedCertificate {
    /// Certificate in DER format
    pub certificate: Vec<u8>,
    /// PKCS#8 private key in DER format
    pub private_key: Zeroizing<Vec<u8>>,
}

fn generation_failed(e: rcgen::RcgenError) -> Error {
    Error::CryptoError(format!("certificate generation failed: {}", e))
}

fn params(common_name: &str, key: KeyType, ca: bool) -> Result<CertificateParams, Error> {
    let key_pair = KeyPair::generate(key.algorithm()).map_err(generation_failed)?;

    let mut params = CertificateParams::new(vec![common_name.to_string()]);
    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, common_name.to_string());
    params.distinguished_name = distinguished_name;
    params.alg = key.algorithm();
    params.key_pair = Some(key_pair);
    params.is_ca = if ca {
        IsCa::Ca(BasicConstraints::Unconstrained)
    } else {
        IsCa::NoCa
    };

    // A day of slack for peers with a clock behind ours.
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::days(1);
    params.not_after = now + time::Duration::days(365);

    Ok(params)
}

/// Generate a self signed certificate for `common_name`.
pub fn generate_self_signed(common_name: &str, key: KeyType) -> Result<GeneratedCertificate, Error> {
    let cert = RcgenCertificate::from_params(params(common_name, key, false)?)
        .map_err(generation_failed)?;

    Ok(GeneratedCertificate {
        certificate: cert.serialize_der().map_err(generation_failed)?,
        private_key: Zeroizing::new(cert.serialize_private_key_der()),
    })
}

/// A CA that signs leaf certificates. Its own certificate goes in the
/// peer's trusted list.
pub struct CertificateAuthority {
    cert: RcgenCertificate,
    der: Vec<u8>,
}

impl CertificateAuthority {
    pub fn new(common_name: &str, key: KeyType) -> Result<Self, Error> {
        let cert = RcgenCertificate::from_params(params(common_name, key, true)?)
            .map_err(generation_failed)?;
        let der = cert.serialize_der().map_err(generation_failed)?;
        Ok(CertificateAuthority { cert, der })
    }

    /// The CA certificate in DER format.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Issue a leaf certificate for `common_name`.
    pub fn issue(&self, common_name: &str, key: KeyType) -> Result<GeneratedCertificate, Error> {
        let leaf = RcgenCertificate::from_params(params(common_name, key, false)?)
            .map_err(generation_failed)?;

        Ok(GeneratedCertificate {
            certificate: leaf
                .serialize_der_with_signer(&self.cert)
                .map_err(generation_failed)?,
            private_key: Zeroizing::new(leaf.serialize_private_key_der()),
        })
    }
}

/// SHA-256 over the DER certificate.
pub fn calculate_fingerprint(cert_der: &[u8]) -> [u8; 32] {
    Sha256::digest(cert_der).into()
}

/// Colon separated hex, "AF:12:F6:..."
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

impl GeneratedCertificate {
    pub fn fingerprint(&self) -> [u8; 32] {
        calculate_fingerprint(&self.certificate)
    }

    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

impl fmt::Debug for GeneratedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCertificate")
            .field("certificate", &self.certificate.len())
            .field("fingerprint", &self.fingerprint_str())
            .finish()
    }
}
