//! Validation for crypto providers.
//!
//! [`Config::build`](crate::ConfigBuilder::build) runs these checks so a
//! misassembled provider fails at configuration time rather than mid handshake.

use crate::buffer::Buf;
use crate::crypto::provider::CryptoProvider;
use crate::Error;

impl CryptoProvider {
    /// Check if the provider has any elliptic curve suites.
    pub fn has_ecc(&self) -> bool {
        self.cipher_suites.iter().any(|cs| cs.uses_ecc())
    }

    /// Validates the provider configuration.
    ///
    /// - At least one cipher suite
    /// - ECC cipher suites have curves to run on
    /// - Transcript hashes, PRFs and HMAC-SHA256 reproduce known answers
    /// - Every X.509 signature hash is available
    ///
    /// Returns `Error::ConfigError` if validation fails.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_cipher_suites()?;
        self.validate_curves()?;
        self.validate_hashes()?;
        self.validate_prfs()?;
        self.validate_hmac()?;
        self.validate_x509_hashes()?;
        Ok(())
    }

    fn validate_cipher_suites(&self) -> Result<(), Error> {
        if self.cipher_suites.is_empty() {
            return Err(Error::ConfigError(
                "CryptoProvider has no cipher suites.".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_curves(&self) -> Result<(), Error> {
        if self.has_ecc() && self.curves.is_empty() {
            return Err(Error::ConfigError(
                "CryptoProvider has ECC cipher suites but no curves.".to_string(),
            ));
        }
        Ok(())
    }

    /// The transcript hashes over the empty input.
    fn validate_hashes(&self) -> Result<(), Error> {
        for (method, expected) in [
            (self.md5, MD5_EMPTY),
            (self.sha1, SHA1_EMPTY),
            (self.sha256, SHA256_EMPTY),
        ] {
            let mut result = Buf::new();
            method.digest(&[], &mut result);
            if result.as_ref() != expected {
                return Err(Error::ConfigError(format!(
                    "Hash provider {:?} produced incorrect result",
                    method.algorithm()
                )));
            }
        }
        Ok(())
    }

    fn validate_prfs(&self) -> Result<(), Error> {
        let mut prfs = vec![(self.prf_1, PRF_TLS10_TEST_VECTOR)];
        for cs in self.cipher_suites {
            prfs.push((cs.prf, PRF_TLS12_TEST_VECTOR));
        }

        for (prf, expected) in prfs {
            let mut result = [0u8; 32];
            let mut scratch = Buf::new();
            prf.prf(b"test_secret", "test label", b"test_seed", &mut result, &mut scratch)
                .map_err(|e| Error::ConfigError(format!("PRF provider failed: {}", e)))?;

            if result != expected {
                return Err(Error::ConfigError(
                    "PRF provider produced incorrect result".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// HMAC-SHA256 is required for DTLS cookies.
    fn validate_hmac(&self) -> Result<(), Error> {
        let mut result = Buf::new();
        self.hmac_sha256
            .compute(
                b"key",
                &[b"The quick brown fox jumps over the lazy dog"],
                &mut result,
            )
            .map_err(|e| Error::ConfigError(format!("HMAC provider failed: {}", e)))?;

        if result.as_ref() != HMAC_SHA256_TEST_VECTOR {
            return Err(Error::ConfigError(
                "HMAC provider produced incorrect result for HMAC-SHA256".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_x509_hashes(&self) -> Result<(), Error> {
        for info in self.x509_signatures {
            if self.hash(info.hash).is_none() {
                return Err(Error::ConfigError(format!(
                    "No hash for certificate signature algorithm {:?}",
                    info.algorithm
                )));
            }
        }
        Ok(())
    }
}

const MD5_EMPTY: &[u8] = &[
    0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8, 0x42, 0x7e,
];

const SHA1_EMPTY: &[u8] = &[
    0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60, 0x18, 0x90,
    0xaf, 0xd8, 0x07, 0x09,
];

const SHA256_EMPTY: &[u8] = &[
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
];

// PRF(secret="test_secret", label="test label", seed="test_seed"), 32 bytes
const PRF_TLS12_TEST_VECTOR: [u8; 32] = [
    0xc7, 0x49, 0xce, 0xdf, 0xad, 0xaf, 0x3d, 0xf1, 0x18, 0x2c, 0xa2, 0x25, 0xab, 0xe9, 0x4e, 0x0c,
    0x19, 0xc3, 0x81, 0x49, 0x57, 0xbd, 0xdc, 0x28, 0x55, 0x78, 0x73, 0xdb, 0xb7, 0x9f, 0xce, 0x29,
];

const PRF_TLS10_TEST_VECTOR: [u8; 32] = [
    0x2a, 0x90, 0x7b, 0x93, 0x51, 0xa6, 0x7a, 0xff, 0x96, 0x8b, 0xf7, 0x36, 0x92, 0x7b, 0xc5, 0x65,
    0x54, 0x34, 0xcd, 0x74, 0xd2, 0xa7, 0xab, 0x8d, 0x88, 0xc1, 0x4a, 0xe3, 0x43, 0xc7, 0x95, 0x3a,
];

// HMAC-SHA256(key="key", data="The quick brown fox jumps over the lazy dog")
const HMAC_SHA256_TEST_VECTOR: &[u8] = &[
    0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f, 0xb1, 0x43,
    0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc, 0x2d, 0x1a, 0x3c, 0xd8,
];
