//! Ciphersuite registry.
//!
//! A registry is a static table of [`CipherSuiteInfo`] entries, each binding a
//! wire id to the key exchange, authentication, record cipher, MAC and PRF it
//! needs. Tables live on the [`CryptoProvider`], so a backend decides which
//! suites exist. Named curves resolve through [`EccState`], a pair of lists
//! kept in lock step.

use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::crypto::provider::{CipherMethod, CipherMode, CryptoProvider, CurveMethod};
use crate::crypto::provider::{MacMethod, PrfMethod};
use crate::types::{HashAlgorithm, NamedGroup, ProtocolVersion, SignatureAlgorithm};
use crate::Error;

/// Ciphersuite wire identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    RSA_WITH_NULL_MD5,                       // 0x0001
    RSA_WITH_NULL_SHA,                       // 0x0002
    RSA_WITH_AES_128_CBC_SHA,                // 0x002F
    RSA_WITH_AES_256_CBC_SHA,                // 0x0035
    RSA_WITH_AES_128_CBC_SHA256,             // 0x003C
    RSA_WITH_AES_256_CBC_SHA256,             // 0x003D
    PSK_WITH_AES_128_CBC_SHA,                // 0x008C
    PSK_WITH_AES_256_CBC_SHA,                // 0x008D
    RSA_WITH_AES_128_GCM_SHA256,             // 0x009C
    PSK_WITH_AES_128_GCM_SHA256,             // 0x00A8
    PSK_WITH_AES_128_CBC_SHA256,             // 0x00AE
    ECDH_ECDSA_WITH_AES_128_CBC_SHA,         // 0xC004
    ECDH_ECDSA_WITH_AES_256_CBC_SHA,         // 0xC005
    ECDHE_ECDSA_WITH_AES_128_CBC_SHA,        // 0xC009
    ECDHE_ECDSA_WITH_AES_256_CBC_SHA,        // 0xC00A
    ECDH_RSA_WITH_AES_128_CBC_SHA,           // 0xC00E
    ECDH_RSA_WITH_AES_256_CBC_SHA,           // 0xC00F
    ECDHE_RSA_WITH_AES_128_CBC_SHA,          // 0xC013
    ECDHE_RSA_WITH_AES_256_CBC_SHA,          // 0xC014
    ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,     // 0xC023
    ECDH_ECDSA_WITH_AES_128_CBC_SHA256,      // 0xC025
    ECDHE_RSA_WITH_AES_128_CBC_SHA256,       // 0xC027
    ECDH_RSA_WITH_AES_128_CBC_SHA256,        // 0xC029
    ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,     // 0xC02B
    ECDHE_RSA_WITH_AES_128_GCM_SHA256,       // 0xC02F
    /// RFC 5746 signalling value, never negotiated.
    EMPTY_RENEGOTIATION_INFO_SCSV, // 0x00FF
    /// RFC 7507 signalling value, never negotiated.
    FALLBACK_SCSV, // 0x5600
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        use CipherSuite::*;
        match value {
            0x0001 => RSA_WITH_NULL_MD5,
            0x0002 => RSA_WITH_NULL_SHA,
            0x002F => RSA_WITH_AES_128_CBC_SHA,
            0x0035 => RSA_WITH_AES_256_CBC_SHA,
            0x003C => RSA_WITH_AES_128_CBC_SHA256,
            0x003D => RSA_WITH_AES_256_CBC_SHA256,
            0x008C => PSK_WITH_AES_128_CBC_SHA,
            0x008D => PSK_WITH_AES_256_CBC_SHA,
            0x009C => RSA_WITH_AES_128_GCM_SHA256,
            0x00A8 => PSK_WITH_AES_128_GCM_SHA256,
            0x00AE => PSK_WITH_AES_128_CBC_SHA256,
            0xC004 => ECDH_ECDSA_WITH_AES_128_CBC_SHA,
            0xC005 => ECDH_ECDSA_WITH_AES_256_CBC_SHA,
            0xC009 => ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
            0xC00A => ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
            0xC00E => ECDH_RSA_WITH_AES_128_CBC_SHA,
            0xC00F => ECDH_RSA_WITH_AES_256_CBC_SHA,
            0xC013 => ECDHE_RSA_WITH_AES_128_CBC_SHA,
            0xC014 => ECDHE_RSA_WITH_AES_256_CBC_SHA,
            0xC023 => ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
            0xC025 => ECDH_ECDSA_WITH_AES_128_CBC_SHA256,
            0xC027 => ECDHE_RSA_WITH_AES_128_CBC_SHA256,
            0xC029 => ECDH_RSA_WITH_AES_128_CBC_SHA256,
            0xC02B => ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            0xC02F => ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            0x00FF => EMPTY_RENEGOTIATION_INFO_SCSV,
            0x5600 => FALLBACK_SCSV,
            _ => Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        use CipherSuite::*;
        match self {
            RSA_WITH_NULL_MD5 => 0x0001,
            RSA_WITH_NULL_SHA => 0x0002,
            RSA_WITH_AES_128_CBC_SHA => 0x002F,
            RSA_WITH_AES_256_CBC_SHA => 0x0035,
            RSA_WITH_AES_128_CBC_SHA256 => 0x003C,
            RSA_WITH_AES_256_CBC_SHA256 => 0x003D,
            PSK_WITH_AES_128_CBC_SHA => 0x008C,
            PSK_WITH_AES_256_CBC_SHA => 0x008D,
            RSA_WITH_AES_128_GCM_SHA256 => 0x009C,
            PSK_WITH_AES_128_GCM_SHA256 => 0x00A8,
            PSK_WITH_AES_128_CBC_SHA256 => 0x00AE,
            ECDH_ECDSA_WITH_AES_128_CBC_SHA => 0xC004,
            ECDH_ECDSA_WITH_AES_256_CBC_SHA => 0xC005,
            ECDHE_ECDSA_WITH_AES_128_CBC_SHA => 0xC009,
            ECDHE_ECDSA_WITH_AES_256_CBC_SHA => 0xC00A,
            ECDH_RSA_WITH_AES_128_CBC_SHA => 0xC00E,
            ECDH_RSA_WITH_AES_256_CBC_SHA => 0xC00F,
            ECDHE_RSA_WITH_AES_128_CBC_SHA => 0xC013,
            ECDHE_RSA_WITH_AES_256_CBC_SHA => 0xC014,
            ECDHE_ECDSA_WITH_AES_128_CBC_SHA256 => 0xC023,
            ECDH_ECDSA_WITH_AES_128_CBC_SHA256 => 0xC025,
            ECDHE_RSA_WITH_AES_128_CBC_SHA256 => 0xC027,
            ECDH_RSA_WITH_AES_128_CBC_SHA256 => 0xC029,
            ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => 0xC02B,
            ECDHE_RSA_WITH_AES_128_GCM_SHA256 => 0xC02F,
            EMPTY_RENEGOTIATION_INFO_SCSV => 0x00FF,
            FALLBACK_SCSV => 0x5600,
            Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push_u16(self.as_u16());
    }

    /// Signalling values carry meaning in a ClientHello but are never selected.
    pub fn is_signalling(&self) -> bool {
        matches!(
            self,
            CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV | CipherSuite::FALLBACK_SCSV
        )
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:04X})", self, self.as_u16())
    }
}

/// How the pre-master secret is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchange {
    /// Client encrypts a random pre-master to the server's RSA key.
    Rsa,
    /// Pre-master derived from a shared key, RFC 4279.
    Psk,
    /// ECDH against the static key of the server's EC certificate.
    Ecdh,
    /// Ephemeral ECDH, signed by the server in ServerKeyExchange.
    Ecdhe,
}

/// What proves the server's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    /// An RSA certificate.
    Rsa,
    /// An EC certificate. Static ECDH_* suites only need the key to be EC.
    Ecdsa,
    /// Knowledge of the pre-shared key.
    Psk,
}

impl Authentication {
    /// The certificate key type this authentication needs, if any.
    pub fn certificate_key(&self) -> Option<SignatureAlgorithm> {
        match self {
            Authentication::Rsa => Some(SignatureAlgorithm::RSA),
            Authentication::Ecdsa => Some(SignatureAlgorithm::ECDSA),
            Authentication::Psk => None,
        }
    }
}

/// A registry entry.
#[derive(Debug, Clone, Copy)]
pub struct CipherSuiteInfo {
    pub suite: CipherSuite,
    pub key_exchange: KeyExchange,
    pub authentication: Authentication,
    pub cipher: &'static dyn CipherMethod,
    pub mac: &'static dyn MacMethod,
    /// The TLS 1.2 PRF. TLS 1.0 and 1.1 always use the provider's MD5 + SHA-1 PRF.
    pub prf: &'static dyn PrfMethod,
}

impl CipherSuiteInfo {
    pub const fn new(
        suite: CipherSuite,
        key_exchange: KeyExchange,
        authentication: Authentication,
        cipher: &'static dyn CipherMethod,
        mac: &'static dyn MacMethod,
        prf: &'static dyn PrfMethod,
    ) -> Self {
        CipherSuiteInfo {
            suite,
            key_exchange,
            authentication,
            cipher,
            mac,
            prf,
        }
    }

    /// Length of the record MAC and of each MAC secret.
    pub fn hash_size(&self) -> usize {
        self.mac.mac_len()
    }

    pub fn key_size(&self) -> usize {
        self.cipher.key_len()
    }

    pub fn iv_size(&self) -> usize {
        self.cipher.iv_len()
    }

    /// Bytes of key block consumed: two MAC secrets, two keys, two IVs.
    pub fn key_block_len(&self) -> usize {
        2 * (self.hash_size() + self.key_size() + self.iv_size())
    }

    /// AEAD and SHA-256 MAC suites are TLS 1.2 only.
    pub fn min_version(&self) -> ProtocolVersion {
        if self.cipher.mode() == CipherMode::Aead || self.mac.algorithm() == HashAlgorithm::SHA256
        {
            ProtocolVersion::TLS1_2
        } else {
            ProtocolVersion::TLS1_0
        }
    }

    /// Whether this suite can be used at the given (TLS equivalent) version.
    pub fn usable_at(&self, version: ProtocolVersion) -> bool {
        version.tls_equivalent().as_u16() >= self.min_version().as_u16()
    }

    pub fn uses_ecc(&self) -> bool {
        matches!(self.key_exchange, KeyExchange::Ecdh | KeyExchange::Ecdhe)
    }
}

/// Look up a wire id in a registry table.
pub fn lookup(
    table: &'static [CipherSuiteInfo],
    suite: CipherSuite,
) -> Result<&'static CipherSuiteInfo, Error> {
    table
        .iter()
        .find(|info| info.suite == suite)
        .ok_or(Error::UnknownCipherSuite)
}

/// Per-session curve configuration: supported group ids and the curve
/// methods implementing them, index for index.
#[derive(Debug, Clone, Default)]
pub struct EccState {
    supported_groups: Vec<NamedGroup>,
    curves: Vec<&'static dyn CurveMethod>,
}

impl EccState {
    /// Build the state for `groups`, resolving each through the provider.
    /// Groups the provider does not implement are an error.
    pub fn new(groups: &[NamedGroup], provider: &CryptoProvider) -> Result<Self, Error> {
        let mut state = EccState::default();
        for group in groups {
            let curve = provider.curve(*group).ok_or(Error::MissingCurve)?;
            state.supported_groups.push(*group);
            state.curves.push(curve);
        }
        Ok(state)
    }

    pub fn supported_groups(&self) -> &[NamedGroup] {
        &self.supported_groups
    }

    /// First match in list order.
    pub fn find_curve(&self, group: NamedGroup) -> Result<&'static dyn CurveMethod, Error> {
        self.supported_groups
            .iter()
            .position(|g| *g == group)
            .map(|i| self.curves[i])
            .ok_or(Error::MissingCurve)
    }
}

/// Signature algorithms that can appear on X.509 certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X509SignatureAlgorithm {
    RsaMd5,
    RsaSha1,
    RsaSha224,
    RsaSha256,
    RsaSha384,
    RsaSha512,
    EcdsaSha1,
    EcdsaSha224,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
    Unknown,
}

/// X.509 signature table entry: the public key algorithm and hash that
/// check a certificate signature.
#[derive(Debug, Clone, Copy)]
pub struct X509SignatureInfo {
    pub algorithm: X509SignatureAlgorithm,
    pub public_cipher: SignatureAlgorithm,
    pub hash: HashAlgorithm,
}

impl X509SignatureInfo {
    pub const fn new(
        algorithm: X509SignatureAlgorithm,
        public_cipher: SignatureAlgorithm,
        hash: HashAlgorithm,
    ) -> Self {
        X509SignatureInfo {
            algorithm,
            public_cipher,
            hash,
        }
    }
}

/// Look up a certificate signature algorithm.
pub fn lookup_x509(
    table: &'static [X509SignatureInfo],
    algorithm: X509SignatureAlgorithm,
) -> Result<&'static X509SignatureInfo, Error> {
    table
        .iter()
        .find(|info| info.algorithm == algorithm)
        .ok_or(Error::UnknownCertSigAlgorithm)
}
