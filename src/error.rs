use std::io;

use thiserror::Error;

use crate::alert::{AlertDescription, AlertLevel};

/// Errors produced by the engine.
///
/// The variants form a flat taxonomy. [`Error::class`] groups them, and
/// [`map_error_to_alert`](crate::alert::map_error_to_alert) decides what the
/// peer is told.
#[derive(Debug, Error)]
pub enum Error {
    // Protocol violations
    #[error("Incorrect message length")]
    IncorrectMessageLength,
    #[error("Unexpected message")]
    UnexpectedMessage,
    #[error("Unrecognized message type {0}")]
    UnrecognizedMessageType(u8),
    #[error("Operation invalid in current state")]
    InvalidState,
    #[error("Bad ChangeCipherSpec")]
    BadCipherSpec,
    #[error("Bad compression method")]
    BadCompressionMethod,
    #[error("Unknown cipher suite")]
    UnknownCipherSuite,
    #[error("No supported cipher suites")]
    NoSupportedCiphers,
    #[error("Unsupported TLS version")]
    UnsupportedTlsVersion,
    #[error("Unknown TLS version")]
    UnknownTlsVersion,
    #[error("Protocol version changed during session")]
    ProtocolVersionChanged,
    #[error("Inappropriate fallback")]
    InappropriateFallback,
    #[error("Handshake failure")]
    HandshakeFailure,
    #[error("Unsupported feature")]
    UnsupportedFeature,
    #[error("Unsupported ECC curve")]
    UnsupportedEccCurve,
    #[error("Unsupported ECC point format")]
    UnsupportedEccFormat,
    #[error("Empty supported groups extension")]
    EmptyEcGroup,
    #[error("Empty EC point formats extension")]
    EmptyEcPointFormat,
    #[error("Unsupported signature algorithm")]
    UnsupportedSignatureAlgorithm,
    #[error("Invalid server name indication")]
    SniInvalid,
    #[error("Renegotiation failure")]
    RenegotiationFailure,
    #[error("Renegotiation extension error")]
    RenegotiationExtensionError,
    #[error("Renegotiation attempted on an inactive session")]
    RenegotiationSessionInactive,
    #[error("Renegotiation refused")]
    NoRenegotiation,
    #[error("Alert received: {0:?} {1:?}")]
    AlertReceived(AlertLevel, AlertDescription),
    #[error("Connection closed by peer")]
    ConnectionClosed,

    // Cryptographic failures
    #[error("Record MAC verification failed")]
    HashMacVerifyFailure,
    #[error("Padding check failed")]
    PaddingCheckFailed,
    #[error("AEAD decryption failed")]
    AeadDecryptFailure,
    #[error("Finished hash mismatch")]
    FinishedHashFailure,
    #[error("Signature verification error")]
    SignatureVerificationError,
    #[error("CertificateVerify signature check failed")]
    CertificateVerifyFailure,
    #[error("Certificate signature check failed")]
    CertificateSigCheckFailed,
    #[error("Unknown certificate signature algorithm")]
    UnknownCertSigAlgorithm,
    #[error("Crypto error: {0}")]
    CryptoError(String),

    // Credentials
    #[error("Invalid certificate")]
    InvalidCertificate,
    #[error("Certificate not found")]
    CertificateNotFound,
    #[error("Issuer certificate not found")]
    IssuerCertificateNotFound,
    #[error("Certificate expired or not yet valid")]
    CertificateExpired,
    #[error("Unsupported certificate")]
    UnsupportedCertificate,
    #[error("Certificate id must be non-zero")]
    CertificateIdInvalid,
    #[error("Certificate id already in use")]
    CertificateIdDuplicate,
    #[error("Certificate with the same subject already in the list")]
    DuplicateCertificate,
    #[error("No matching PSK")]
    NoMatchingPsk,
    #[error("No more PSK space")]
    NoMorePskSpace,

    // Resource exhaustion
    #[error("Key material does not fit the key buffer")]
    CryptoKeysTooLarge,
    #[error("Record too large: {0}")]
    RecordTooLarge(usize),
    #[error("Buffer too small")]
    BufferTooSmall,
    #[error("Curve missing from supported groups")]
    MissingCurve,

    // Transport
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    // Internal
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Invalid session handle")]
    InvalidSessionHandle,
}

/// Coarse grouping of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed, out of order or unacceptable peer input.
    Protocol,
    /// MAC, padding or signature failures.
    Crypto,
    /// A buffer or table is too small for the operation.
    Resource,
    /// The underlying stream failed.
    Transport,
    /// Configuration or state bugs.
    Internal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        use Error::*;
        match self {
            HashMacVerifyFailure
            | PaddingCheckFailed
            | AeadDecryptFailure
            | FinishedHashFailure
            | SignatureVerificationError
            | CertificateVerifyFailure
            | CertificateSigCheckFailed
            | UnknownCertSigAlgorithm
            | CryptoError(_) => ErrorClass::Crypto,

            CryptoKeysTooLarge | RecordTooLarge(_) | BufferTooSmall | NoMorePskSpace => {
                ErrorClass::Resource
            }

            Transport(_) => ErrorClass::Transport,

            ConfigError(_) | InvalidSessionHandle | MissingCurve | CertificateIdInvalid
            | CertificateIdDuplicate | DuplicateCertificate => ErrorClass::Internal,

            _ => ErrorClass::Protocol,
        }
    }

    /// Errors after which the session must not continue.
    ///
    /// Only a refused renegotiation leaves the existing session usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::NoRenegotiation | Error::AlertReceived(AlertLevel::Warning, _)
        )
    }

    pub(crate) fn crypto(e: impl std::fmt::Display) -> Error {
        Error::CryptoError(e.to_string())
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(_: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        Error::IncorrectMessageLength
    }
}
