//! Wire-level enums shared by the record layer, the message codecs and
//! the crypto provider.
//!
//! Every enum keeps an `Unknown` variant so that values we do not recognise
//! survive a parse and can be skipped or reported instead of failing hard.

use std::fmt;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;

// ============================================================================
// Protocol Version
// ============================================================================

/// Protocol versions understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ProtocolVersion {
    /// SSL 3.0. Known so it can be rejected as "disabled" rather than "unknown".
    SSL3_0,
    TLS1_0,
    TLS1_1,
    TLS1_2,
    /// DTLS 1.0, the datagram sibling of TLS 1.1.
    DTLS1_0,
    /// DTLS 1.2, the datagram sibling of TLS 1.2.
    DTLS1_2,
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0300 => ProtocolVersion::SSL3_0,
            0x0301 => ProtocolVersion::TLS1_0,
            0x0302 => ProtocolVersion::TLS1_1,
            0x0303 => ProtocolVersion::TLS1_2,
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::SSL3_0 => 0x0300,
            ProtocolVersion::TLS1_0 => 0x0301,
            ProtocolVersion::TLS1_1 => 0x0302,
            ProtocolVersion::TLS1_2 => 0x0303,
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    pub fn is_dtls(&self) -> bool {
        matches!(self, ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2)
    }

    /// The TLS version whose record and key schedule rules apply.
    pub fn tls_equivalent(&self) -> ProtocolVersion {
        match self {
            ProtocolVersion::DTLS1_0 => ProtocolVersion::TLS1_1,
            ProtocolVersion::DTLS1_2 => ProtocolVersion::TLS1_2,
            v => *v,
        }
    }

    /// TLS 1.1 and later carry an explicit IV in every CBC record.
    pub fn has_explicit_iv(&self) -> bool {
        matches!(
            self.tls_equivalent(),
            ProtocolVersion::TLS1_1 | ProtocolVersion::TLS1_2
        )
    }

    /// TLS 1.2 uses the ciphersuite PRF and signature_algorithms.
    pub fn is_tls12(&self) -> bool {
        self.tls_equivalent() == ProtocolVersion::TLS1_2
    }

    /// TLS 1.0 and 1.1 use the combined MD5 + SHA-1 PRF.
    pub fn is_legacy_prf(&self) -> bool {
        matches!(
            self.tls_equivalent(),
            ProtocolVersion::TLS1_0 | ProtocolVersion::TLS1_1
        )
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::SSL3_0 => write!(f, "SSLv3"),
            ProtocolVersion::TLS1_0 => write!(f, "TLSv1.0"),
            ProtocolVersion::TLS1_1 => write!(f, "TLSv1.1"),
            ProtocolVersion::TLS1_2 => write!(f, "TLSv1.2"),
            ProtocolVersion::DTLS1_0 => write!(f, "DTLSv1.0"),
            ProtocolVersion::DTLS1_2 => write!(f, "DTLSv1.2"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
        }
    }
}

// ============================================================================
// Content Type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

// ============================================================================
// Hash Algorithms
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum HashAlgorithm {
    None,
    MD5,
    SHA1,
    SHA224,
    SHA256,
    SHA384,
    SHA512,
    Unknown(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            1 => HashAlgorithm::MD5,
            2 => HashAlgorithm::SHA1,
            3 => HashAlgorithm::SHA224,
            4 => HashAlgorithm::SHA256,
            5 => HashAlgorithm::SHA384,
            6 => HashAlgorithm::SHA512,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::MD5 => 1,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA224 => 3,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::SHA384 => 5,
            HashAlgorithm::SHA512 => 6,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HashAlgorithm> {
        let (input, value) = be_u8(input)?;
        Ok((input, HashAlgorithm::from_u8(value)))
    }

    /// Digest length in bytes. Zero for `None` and unknown values.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            _ => 0,
        }
    }
}

// ============================================================================
// Signature Algorithms
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SignatureAlgorithm {
    Anonymous,
    RSA,
    DSA,
    ECDSA,
    Unknown(u8),
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SignatureAlgorithm::Anonymous,
            1 => SignatureAlgorithm::RSA,
            2 => SignatureAlgorithm::DSA,
            3 => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::Anonymous => 0,
            SignatureAlgorithm::RSA => 1,
            SignatureAlgorithm::DSA => 2,
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAlgorithm> {
        let (input, value) = be_u8(input)?;
        Ok((input, SignatureAlgorithm::from_u8(value)))
    }
}

/// A (hash, signature) pair as carried by signature_algorithms and
/// TLS 1.2 digitally-signed structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const RSA_SHA256: Self = Self::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA);
    pub const ECDSA_SHA256: Self = Self::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA);
    pub const RSA_SHA1: Self = Self::new(HashAlgorithm::SHA1, SignatureAlgorithm::RSA);
    pub const ECDSA_SHA1: Self = Self::new(HashAlgorithm::SHA1, SignatureAlgorithm::ECDSA);

    pub const fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, hash) = HashAlgorithm::parse(input)?;
        let (input, signature) = SignatureAlgorithm::parse(input)?;
        Ok((input, SignatureAndHashAlgorithm { hash, signature }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.hash.as_u8());
        output.push(self.signature.as_u8());
    }
}

// ============================================================================
// Named Groups
// ============================================================================

/// Elliptic curves (RFC 4492 / RFC 8422).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedGroup {
    Secp192r1,
    Secp224r1,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X25519,
    Unknown(u16),
}

impl Default for NamedGroup {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            19 => NamedGroup::Secp192r1,
            21 => NamedGroup::Secp224r1,
            23 => NamedGroup::Secp256r1,
            24 => NamedGroup::Secp384r1,
            25 => NamedGroup::Secp521r1,
            29 => NamedGroup::X25519,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp192r1 => 19,
            NamedGroup::Secp224r1 => 21,
            NamedGroup::Secp256r1 => 23,
            NamedGroup::Secp384r1 => 24,
            NamedGroup::Secp521r1 => 25,
            NamedGroup::X25519 => 29,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }
}

// ============================================================================
// EC point formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcPointFormat {
    Uncompressed,
    AnsiX962CompressedPrime,
    AnsiX962CompressedChar2,
    Unknown(u8),
}

impl Default for EcPointFormat {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl EcPointFormat {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => EcPointFormat::Uncompressed,
            1 => EcPointFormat::AnsiX962CompressedPrime,
            2 => EcPointFormat::AnsiX962CompressedChar2,
            _ => EcPointFormat::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            EcPointFormat::Uncompressed => 0,
            EcPointFormat::AnsiX962CompressedPrime => 1,
            EcPointFormat::AnsiX962CompressedChar2 => 2,
            EcPointFormat::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], EcPointFormat> {
        let (input, value) = be_u8(input)?;
        Ok((input, EcPointFormat::from_u8(value)))
    }
}

// ============================================================================
// Compression
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Deflate,
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            0x01 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Deflate => 0x01,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

// ============================================================================
// Client certificate types (CertificateRequest)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCertificateType {
    RsaSign,
    DssSign,
    EcdsaSign,
    RsaFixedEcdh,
    EcdsaFixedEcdh,
    Unknown(u8),
}

impl Default for ClientCertificateType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientCertificateType::RsaSign,
            2 => ClientCertificateType::DssSign,
            64 => ClientCertificateType::EcdsaSign,
            65 => ClientCertificateType::RsaFixedEcdh,
            66 => ClientCertificateType::EcdsaFixedEcdh,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::RsaSign => 1,
            ClientCertificateType::DssSign => 2,
            ClientCertificateType::EcdsaSign => 64,
            ClientCertificateType::RsaFixedEcdh => 65,
            ClientCertificateType::EcdsaFixedEcdh => 66,
            ClientCertificateType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientCertificateType> {
        let (input, value) = be_u8(input)?;
        Ok((input, ClientCertificateType::from_u8(value)))
    }
}
