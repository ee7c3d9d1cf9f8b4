//! X.509 field extraction using `x509-cert`.

use der::{Decode, Encode};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use crate::ciphersuite::X509SignatureAlgorithm;
use crate::crypto::provider::{CertificateParser, ParsedCertificate, PublicKey};
use crate::types::NamedGroup;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

const OID_MD5_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
const OID_SHA1_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const OID_SHA256_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_SHA384_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const OID_SHA512_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const OID_SHA224_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.14");
const OID_ECDSA_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const OID_ECDSA_SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
const OID_ECDSA_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_ECDSA_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const OID_ECDSA_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

fn signature_algorithm(oid: ObjectIdentifier) -> X509SignatureAlgorithm {
    use X509SignatureAlgorithm::*;
    match oid {
        OID_MD5_RSA => RsaMd5,
        OID_SHA1_RSA => RsaSha1,
        OID_SHA224_RSA => RsaSha224,
        OID_SHA256_RSA => RsaSha256,
        OID_SHA384_RSA => RsaSha384,
        OID_SHA512_RSA => RsaSha512,
        OID_ECDSA_SHA1 => EcdsaSha1,
        OID_ECDSA_SHA224 => EcdsaSha224,
        OID_ECDSA_SHA256 => EcdsaSha256,
        OID_ECDSA_SHA384 => EcdsaSha384,
        OID_ECDSA_SHA512 => EcdsaSha512,
        _ => Unknown,
    }
}

#[derive(Debug)]
pub(super) struct RustCryptoCertificateParser;

impl CertificateParser for RustCryptoCertificateParser {
    fn parse(&self, der: &[u8]) -> Result<ParsedCertificate, String> {
        let cert = X509Certificate::from_der(der)
            .map_err(|e| format!("Failed to parse certificate: {e}"))?;
        let tbs = &cert.tbs_certificate;
        let spki = &tbs.subject_public_key_info;

        let key_bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?;

        let public_key = if spki.algorithm.oid == OID_RSA_ENCRYPTION {
            let rsa = rsa::pkcs1::RsaPublicKey::from_der(key_bytes)
                .map_err(|e| format!("Invalid RSA public key: {e}"))?;
            PublicKey::Rsa {
                modulus: rsa.modulus.as_bytes().to_vec(),
                exponent: rsa.public_exponent.as_bytes().to_vec(),
            }
        } else if spki.algorithm.oid == OID_EC_PUBLIC_KEY {
            let curve_oid: ObjectIdentifier = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or("Missing EC curve parameter in certificate")?
                .decode_as()
                .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;

            let group = match curve_oid {
                OID_P256 => NamedGroup::Secp256r1,
                OID_P384 => NamedGroup::Secp384r1,
                _ => NamedGroup::Unknown(0),
            };
            PublicKey::Ec {
                group,
                point: key_bytes.to_vec(),
            }
        } else {
            PublicKey::Unsupported
        };

        let encode = |e: der::Error| format!("Failed to encode certificate field: {e}");

        Ok(ParsedCertificate {
            subject: tbs.subject.to_der().map_err(encode)?,
            issuer: tbs.issuer.to_der().map_err(encode)?,
            public_key,
            signature_algorithm: signature_algorithm(cert.signature_algorithm.oid),
            tbs: tbs.to_der().map_err(encode)?,
            signature: cert.signature.raw_bytes().to_vec(),
            not_before: tbs.validity.not_before.to_unix_duration().as_secs(),
            not_after: tbs.validity.not_after.to_unix_duration().as_secs(),
        })
    }
}

pub(super) static CERTIFICATE_PARSER: RustCryptoCertificateParser = RustCryptoCertificateParser;
