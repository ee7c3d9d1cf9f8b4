//! Certificate and signature bridge.
//!
//! Drives the provider for the three places TLS 1.0 to 1.2 signs something:
//! ServerKeyExchange, CertificateVerify and the certificates themselves.
//!
//! RSA verification is done by hand on top of [`RsaMethod::public_raw`]:
//! the recovered block must be `00 01 FF.. 00` followed by a DigestInfo and
//! the hash (TLS 1.2, certificates) or by the bare MD5 + SHA-1 concatenation
//! (TLS 1.0/1.1). ECDSA goes straight to the curve with the digest.

use subtle::ConstantTimeEq;

use crate::buffer::Buf;
use crate::ciphersuite::lookup_x509;
use crate::crypto::provider::{
    CryptoProvider, ParsedCertificate, PrivateKey, PublicKey, RsaMethod,
};
use crate::transcript::Transcript;
use crate::types::{HashAlgorithm, ProtocolVersion, SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::Error;

/// Smallest PKCS#1 type 1 overhead: `00 01`, eight `FF` and the `00` separator.
const PKCS1_MIN_PADDING: usize = 11;

const DIGEST_INFO_MD5: &[u8] = &[
    0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05, 0x05,
    0x00, 0x04, 0x10,
];
const DIGEST_INFO_SHA1: &[u8] = &[
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];
const DIGEST_INFO_SHA224: &[u8] = &[
    0x30, 0x2d, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x04,
    0x05, 0x00, 0x04, 0x1c,
];
const DIGEST_INFO_SHA256: &[u8] = &[
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];
const DIGEST_INFO_SHA384: &[u8] = &[
    0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02,
    0x05, 0x00, 0x04, 0x30,
];
const DIGEST_INFO_SHA512: &[u8] = &[
    0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
    0x05, 0x00, 0x04, 0x40,
];

/// DER DigestInfo prefix for `hash`.
pub fn digest_info_prefix(hash: HashAlgorithm) -> Option<&'static [u8]> {
    match hash {
        HashAlgorithm::MD5 => Some(DIGEST_INFO_MD5),
        HashAlgorithm::SHA1 => Some(DIGEST_INFO_SHA1),
        HashAlgorithm::SHA224 => Some(DIGEST_INFO_SHA224),
        HashAlgorithm::SHA256 => Some(DIGEST_INFO_SHA256),
        HashAlgorithm::SHA384 => Some(DIGEST_INFO_SHA384),
        HashAlgorithm::SHA512 => Some(DIGEST_INFO_SHA512),
        _ => None,
    }
}

/// The hash a handshake signature is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedHash {
    /// TLS 1.2, or ECDSA before it (SHA-1).
    Single(HashAlgorithm),
    /// RSA before TLS 1.2: MD5 and SHA-1 concatenated, no DigestInfo.
    Md5Sha1,
}

impl SignedHash {
    /// Work out the hash for a signature made with a `key` type key.
    ///
    /// In TLS 1.2 the digitally-signed struct names the algorithm, which must
    /// match the key. Earlier versions have it implied by the key type.
    pub fn for_version(
        version: ProtocolVersion,
        algorithm: Option<SignatureAndHashAlgorithm>,
        key: SignatureAlgorithm,
        provider: &CryptoProvider,
    ) -> Result<SignedHash, Error> {
        if version.is_tls12() {
            let alg = algorithm.ok_or(Error::UnsupportedSignatureAlgorithm)?;
            if alg.signature != key {
                return Err(Error::UnsupportedSignatureAlgorithm);
            }
            if provider.hash(alg.hash).is_none() || digest_info_prefix(alg.hash).is_none() {
                return Err(Error::UnsupportedSignatureAlgorithm);
            }
            return Ok(SignedHash::Single(alg.hash));
        }

        match key {
            SignatureAlgorithm::RSA => Ok(SignedHash::Md5Sha1),
            SignatureAlgorithm::ECDSA => Ok(SignedHash::Single(HashAlgorithm::SHA1)),
            _ => Err(Error::UnsupportedSignatureAlgorithm),
        }
    }

    /// Digest `data` in one go.
    pub fn digest(&self, data: &[u8], provider: &CryptoProvider, out: &mut Buf) -> Result<(), Error> {
        out.clear();
        match self {
            SignedHash::Md5Sha1 => {
                let mut tmp = Buf::new();
                provider.md5.digest(data, &mut tmp);
                out.extend_from_slice(&tmp);
                provider.sha1.digest(data, &mut tmp);
                out.extend_from_slice(&tmp);
            }
            SignedHash::Single(hash) => {
                let method = provider
                    .hash(*hash)
                    .ok_or(Error::UnsupportedSignatureAlgorithm)?;
                method.digest(data, out);
            }
        }
        Ok(())
    }

    /// Digest of the handshake so far, leaving the transcript running.
    pub fn digest_transcript(&self, transcript: &Transcript, out: &mut Buf) -> Result<(), Error> {
        match self {
            SignedHash::Md5Sha1 => {
                transcript.md5_sha1(out);
                Ok(())
            }
            SignedHash::Single(hash) => transcript.snapshot(*hash, out),
        }
    }

    /// The payload inside the RSA padding for `digest`.
    fn rsa_payload(&self, digest: &[u8], out: &mut Buf) -> Result<(), Error> {
        out.clear();
        if let SignedHash::Single(hash) = self {
            let prefix = digest_info_prefix(*hash).ok_or(Error::UnsupportedSignatureAlgorithm)?;
            out.extend_from_slice(prefix);
        }
        out.extend_from_slice(digest);
        Ok(())
    }
}

/// Pick the (hash, signature) pair for a TLS 1.2 signature with `key`.
///
/// Local preference order wins among what the peer offered. A peer that sent
/// no signature_algorithms gets SHA-1, as RFC 5246 section 7.4.1.4.1 says.
pub fn choose_signature_algorithm(
    key: SignatureAlgorithm,
    local: &[SignatureAndHashAlgorithm],
    peer: &[SignatureAndHashAlgorithm],
) -> Result<SignatureAndHashAlgorithm, Error> {
    if peer.is_empty() {
        return Ok(SignatureAndHashAlgorithm::new(HashAlgorithm::SHA1, key));
    }
    local
        .iter()
        .copied()
        .filter(|a| a.signature == key)
        .find(|a| peer.contains(a))
        .ok_or(Error::UnsupportedSignatureAlgorithm)
}

/// Sign `digest` with `key`.
pub fn sign(
    key: &dyn PrivateKey,
    hash: SignedHash,
    digest: &[u8],
    out: &mut Buf,
) -> Result<(), Error> {
    match key.algorithm() {
        SignatureAlgorithm::RSA => {
            let mut payload = Buf::new();
            hash.rsa_payload(digest, &mut payload)?;
            key.sign(&payload, out).map_err(Error::CryptoError)
        }
        SignatureAlgorithm::ECDSA => key.sign(digest, out).map_err(Error::CryptoError),
        _ => Err(Error::UnsupportedSignatureAlgorithm),
    }
}

/// Check a handshake signature over `digest` against a certificate key.
///
/// Mismatches are [`Error::SignatureVerificationError`]. A key too small to
/// hold the expected payload is [`Error::InvalidCertificate`].
pub fn verify(
    key: &PublicKey,
    hash: SignedHash,
    digest: &[u8],
    signature: &[u8],
    provider: &CryptoProvider,
) -> Result<(), Error> {
    match key {
        PublicKey::Rsa { modulus, exponent } => {
            let mut payload = Buf::new();
            hash.rsa_payload(digest, &mut payload)?;
            verify_pkcs1(provider.rsa, modulus, exponent, &payload, signature)
        }
        PublicKey::Ec { group, point } => {
            if hash == SignedHash::Md5Sha1 {
                return Err(Error::UnsupportedSignatureAlgorithm);
            }
            let curve = provider.curve(*group).ok_or(Error::UnsupportedEccCurve)?;
            curve
                .verify_prehash(point, digest, signature)
                .map_err(|_| Error::SignatureVerificationError)
        }
        PublicKey::Unsupported => Err(Error::UnsupportedCertificate),
    }
}

/// PKCS#1 v1.5 type 1 check of `signature` against the expected `payload`.
pub fn verify_pkcs1(
    rsa: &dyn RsaMethod,
    modulus: &[u8],
    exponent: &[u8],
    payload: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    let key_size = modulus.iter().skip_while(|b| **b == 0).count();

    // Would underflow the padding length.
    if payload.len() + PKCS1_MIN_PADDING > key_size || signature.len() > key_size {
        return Err(Error::InvalidCertificate);
    }

    let mut block = Buf::new();
    rsa.public_raw(modulus, exponent, signature, &mut block)
        .map_err(|_| Error::SignatureVerificationError)?;
    if block.len() != key_size {
        return Err(Error::SignatureVerificationError);
    }

    let sep = key_size - payload.len() - 1;
    let header_ok = block[0] == 0x00 && block[1] == 0x01 && block[sep] == 0x00;
    let padding_ok = block[2..sep].iter().all(|b| *b == 0xFF);
    let payload_ok: bool = block[sep + 1..].ct_eq(payload).into();

    if header_ok && padding_ok && payload_ok {
        Ok(())
    } else {
        Err(Error::SignatureVerificationError)
    }
}

/// Check that `cert` was signed by the holder of `issuer_key`.
pub fn verify_certificate(
    cert: &ParsedCertificate,
    issuer_key: &PublicKey,
    provider: &CryptoProvider,
) -> Result<(), Error> {
    let info = lookup_x509(provider.x509_signatures, cert.signature_algorithm)?;
    if info.public_cipher != issuer_key.algorithm() {
        return Err(Error::CertificateSigCheckFailed);
    }
    let method = provider
        .hash(info.hash)
        .ok_or(Error::UnknownCertSigAlgorithm)?;

    let mut digest = Buf::new();
    method.digest(&cert.tbs, &mut digest);

    verify(
        issuer_key,
        SignedHash::Single(info.hash),
        &digest,
        &cert.signature,
        provider,
    )
    .map_err(|e| match e {
        Error::SignatureVerificationError => Error::CertificateSigCheckFailed,
        e => e,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto;

    const RSA_CERT: &[u8] = include_bytes!("../tests/fixtures/server_rsa.der");
    const RSA_KEY: &[u8] = include_bytes!("../tests/fixtures/server_rsa.key");
    const EC_CERT: &[u8] = include_bytes!("../tests/fixtures/server_ec.der");
    const EC_KEY: &[u8] = include_bytes!("../tests/fixtures/server_ec.key");
    const CA_RSA: &[u8] = include_bytes!("../tests/fixtures/ca_rsa.der");
    const CA_EC: &[u8] = include_bytes!("../tests/fixtures/ca_ec.der");
    const SERVER_RSA_AS_ISSUER: &[u8] = include_bytes!("../tests/fixtures/client_rsa.der");

    fn sign_and_verify(cert: &[u8], key: &[u8], version: ProtocolVersion) {
        let provider = rust_crypto::default_provider();
        let parsed = provider.certificate_parser.parse(cert).unwrap();
        let key = provider.key_provider.load_private_key(key).unwrap();

        let alg = SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, key.algorithm());
        let hash = SignedHash::for_version(version, Some(alg), key.algorithm(), &provider).unwrap();

        let mut digest = Buf::new();
        hash.digest(b"client_random server_random params", &provider, &mut digest)
            .unwrap();

        let mut sig = Buf::new();
        sign(key.as_ref(), hash, &digest, &mut sig).unwrap();
        verify(&parsed.public_key, hash, &digest, &sig, &provider).unwrap();

        let mut other = Buf::new();
        hash.digest(b"something else", &provider, &mut other).unwrap();
        assert!(matches!(
            verify(&parsed.public_key, hash, &other, &sig, &provider),
            Err(Error::SignatureVerificationError)
        ));
    }

    #[test]
    fn rsa_tls12() {
        sign_and_verify(RSA_CERT, RSA_KEY, ProtocolVersion::TLS1_2);
    }

    #[test]
    fn rsa_legacy_md5_sha1() {
        sign_and_verify(RSA_CERT, RSA_KEY, ProtocolVersion::TLS1_0);
    }

    #[test]
    fn ecdsa_tls12_and_legacy() {
        sign_and_verify(EC_CERT, EC_KEY, ProtocolVersion::TLS1_2);
        sign_and_verify(EC_CERT, EC_KEY, ProtocolVersion::TLS1_1);
    }

    #[test]
    fn legacy_hash_choice() {
        let provider = rust_crypto::default_provider();
        let rsa = SignedHash::for_version(
            ProtocolVersion::TLS1_1,
            None,
            SignatureAlgorithm::RSA,
            &provider,
        )
        .unwrap();
        assert_eq!(rsa, SignedHash::Md5Sha1);

        let mut digest = Buf::new();
        rsa.digest(b"abc", &provider, &mut digest).unwrap();
        assert_eq!(digest.len(), 36);
    }

    #[test]
    fn tls12_algorithm_must_match_key() {
        let provider = rust_crypto::default_provider();
        assert!(matches!(
            SignedHash::for_version(
                ProtocolVersion::TLS1_2,
                Some(SignatureAndHashAlgorithm::ECDSA_SHA256),
                SignatureAlgorithm::RSA,
                &provider,
            ),
            Err(Error::UnsupportedSignatureAlgorithm)
        ));
    }

    #[test]
    fn payload_larger_than_key_is_invalid_certificate() {
        let provider = rust_crypto::default_provider();
        // 64 bit modulus cannot carry a SHA-256 DigestInfo.
        let modulus = [0xC3, 0x5A, 0x21, 0x0F, 0x9B, 0x44, 0x71, 0x05];
        let mut payload = Buf::new();
        SignedHash::Single(HashAlgorithm::SHA256)
            .rsa_payload(&[0; 32], &mut payload)
            .unwrap();
        assert!(matches!(
            verify_pkcs1(provider.rsa, &modulus, &[3], &payload, &[1; 8]),
            Err(Error::InvalidCertificate)
        ));
    }

    #[test]
    fn leaf_signed_by_ca() {
        let provider = rust_crypto::default_provider();
        for (leaf, ca) in [(RSA_CERT, CA_RSA), (EC_CERT, CA_EC), (CA_RSA, CA_RSA)] {
            let leaf = provider.certificate_parser.parse(leaf).unwrap();
            let ca = provider.certificate_parser.parse(ca).unwrap();
            verify_certificate(&leaf, &ca.public_key, &provider).unwrap();
        }
    }

    #[test]
    fn wrong_issuer_key_fails() {
        let provider = rust_crypto::default_provider();
        let leaf = provider.certificate_parser.parse(RSA_CERT).unwrap();
        let other = provider.certificate_parser.parse(SERVER_RSA_AS_ISSUER).unwrap();
        assert!(matches!(
            verify_certificate(&leaf, &other.public_key, &provider),
            Err(Error::CertificateSigCheckFailed)
        ));
    }

    #[test]
    fn choose_prefers_local_order() {
        let local = [
            SignatureAndHashAlgorithm::ECDSA_SHA256,
            SignatureAndHashAlgorithm::RSA_SHA256,
            SignatureAndHashAlgorithm::RSA_SHA1,
        ];
        let peer = [
            SignatureAndHashAlgorithm::RSA_SHA1,
            SignatureAndHashAlgorithm::RSA_SHA256,
        ];
        assert_eq!(
            choose_signature_algorithm(SignatureAlgorithm::RSA, &local, &peer).unwrap(),
            SignatureAndHashAlgorithm::RSA_SHA256
        );
        assert_eq!(
            choose_signature_algorithm(SignatureAlgorithm::ECDSA, &local, &[]).unwrap(),
            SignatureAndHashAlgorithm::ECDSA_SHA1
        );
        assert!(choose_signature_algorithm(SignatureAlgorithm::ECDSA, &local, &peer).is_err());
    }
}
