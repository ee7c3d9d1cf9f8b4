//! Alert records and the error to alert mapping.

use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl Default for AlertLevel {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

/// Alert descriptions (RFC 5246 section 7.2 plus later additions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    DecryptionFailed,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    NoCertificate,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ExportRestriction,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    NoRenegotiation,
    UnsupportedExtension,
    UnrecognizedName,
    UnknownPskIdentity,
    Unknown(u8),
}

impl Default for AlertDescription {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl AlertDescription {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => AlertDescription::CloseNotify,
            10 => AlertDescription::UnexpectedMessage,
            20 => AlertDescription::BadRecordMac,
            21 => AlertDescription::DecryptionFailed,
            22 => AlertDescription::RecordOverflow,
            30 => AlertDescription::DecompressionFailure,
            40 => AlertDescription::HandshakeFailure,
            41 => AlertDescription::NoCertificate,
            42 => AlertDescription::BadCertificate,
            43 => AlertDescription::UnsupportedCertificate,
            44 => AlertDescription::CertificateRevoked,
            45 => AlertDescription::CertificateExpired,
            46 => AlertDescription::CertificateUnknown,
            47 => AlertDescription::IllegalParameter,
            48 => AlertDescription::UnknownCa,
            49 => AlertDescription::AccessDenied,
            50 => AlertDescription::DecodeError,
            51 => AlertDescription::DecryptError,
            60 => AlertDescription::ExportRestriction,
            70 => AlertDescription::ProtocolVersion,
            71 => AlertDescription::InsufficientSecurity,
            80 => AlertDescription::InternalError,
            86 => AlertDescription::InappropriateFallback,
            90 => AlertDescription::UserCanceled,
            100 => AlertDescription::NoRenegotiation,
            110 => AlertDescription::UnsupportedExtension,
            112 => AlertDescription::UnrecognizedName,
            115 => AlertDescription::UnknownPskIdentity,
            _ => AlertDescription::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertDescription::CloseNotify => 0,
            AlertDescription::UnexpectedMessage => 10,
            AlertDescription::BadRecordMac => 20,
            AlertDescription::DecryptionFailed => 21,
            AlertDescription::RecordOverflow => 22,
            AlertDescription::DecompressionFailure => 30,
            AlertDescription::HandshakeFailure => 40,
            AlertDescription::NoCertificate => 41,
            AlertDescription::BadCertificate => 42,
            AlertDescription::UnsupportedCertificate => 43,
            AlertDescription::CertificateRevoked => 44,
            AlertDescription::CertificateExpired => 45,
            AlertDescription::CertificateUnknown => 46,
            AlertDescription::IllegalParameter => 47,
            AlertDescription::UnknownCa => 48,
            AlertDescription::AccessDenied => 49,
            AlertDescription::DecodeError => 50,
            AlertDescription::DecryptError => 51,
            AlertDescription::ExportRestriction => 60,
            AlertDescription::ProtocolVersion => 70,
            AlertDescription::InsufficientSecurity => 71,
            AlertDescription::InternalError => 80,
            AlertDescription::InappropriateFallback => 86,
            AlertDescription::UserCanceled => 90,
            AlertDescription::NoRenegotiation => 100,
            AlertDescription::UnsupportedExtension => 110,
            AlertDescription::UnrecognizedName => 112,
            AlertDescription::UnknownPskIdentity => 115,
            AlertDescription::Unknown(value) => *value,
        }
    }
}

/// An alert record body: level followed by description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub const CLOSE_NOTIFY: Alert = Alert::new(AlertLevel::Warning, AlertDescription::CloseNotify);

    pub const fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Alert { level, description }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = be_u8(input)?;
        let (input, description) = be_u8(input)?;
        Ok((
            input,
            Alert {
                level: AlertLevel::from_u8(level),
                description: AlertDescription::from_u8(description),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}

/// Decide which alert tells the peer about `error`.
///
/// Cryptographic failures deliberately collapse onto a handful of generic
/// descriptions so the alert does not reveal which check failed.
pub fn map_error_to_alert(error: &Error) -> Alert {
    use AlertDescription as D;

    let description = match error {
        Error::UnrecognizedMessageType(_)
        | Error::AlertReceived(..)
        | Error::BadCipherSpec
        | Error::UnexpectedMessage => D::UnexpectedMessage,

        Error::HashMacVerifyFailure | Error::AeadDecryptFailure | Error::PaddingCheckFailed => {
            D::BadRecordMac
        }

        Error::RecordTooLarge(_) => D::RecordOverflow,

        Error::UnknownCipherSuite
        | Error::HandshakeFailure
        | Error::NoSupportedCiphers
        | Error::UnsupportedFeature
        | Error::UnsupportedEccCurve
        | Error::UnsupportedEccFormat
        | Error::MissingCurve
        | Error::SniInvalid
        | Error::EmptyEcGroup
        | Error::EmptyEcPointFormat
        | Error::UnsupportedSignatureAlgorithm => D::HandshakeFailure,

        Error::InvalidCertificate
        | Error::CertificateNotFound
        | Error::CertificateSigCheckFailed
        | Error::CertificateVerifyFailure => D::BadCertificate,

        Error::UnsupportedCertificate => D::UnsupportedCertificate,
        Error::CertificateExpired => D::CertificateExpired,
        Error::UnknownCertSigAlgorithm => D::CertificateUnknown,

        Error::BadCompressionMethod => D::IllegalParameter,

        Error::IssuerCertificateNotFound => D::UnknownCa,

        Error::IncorrectMessageLength => D::DecodeError,

        Error::FinishedHashFailure | Error::SignatureVerificationError => D::DecryptError,

        Error::ProtocolVersionChanged
        | Error::UnknownTlsVersion
        | Error::UnsupportedTlsVersion => D::ProtocolVersion,

        Error::InappropriateFallback => D::InappropriateFallback,

        Error::NoRenegotiation
        | Error::RenegotiationSessionInactive
        | Error::RenegotiationFailure => D::NoRenegotiation,

        Error::NoMatchingPsk => D::UnknownPskIdentity,

        _ => D::InternalError,
    };

    let level = match description {
        D::NoRenegotiation => AlertLevel::Warning,
        _ => AlertLevel::Fatal,
    };

    Alert::new(level, description)
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x02, // AlertLevel::Fatal
        0x28, // AlertDescription::HandshakeFailure
    ];

    #[test]
    fn roundtrip() {
        let (rest, alert) = Alert::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            alert,
            Alert::new(AlertLevel::Fatal, AlertDescription::HandshakeFailure)
        );

        let mut out = Buf::new();
        alert.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    fn alert_for(e: Error) -> (AlertLevel, u8) {
        let a = map_error_to_alert(&e);
        (a.level, a.description.as_u8())
    }

    #[test]
    fn mapping_table() {
        use AlertLevel::*;

        assert_eq!(alert_for(Error::UnexpectedMessage), (Fatal, 10));
        assert_eq!(alert_for(Error::BadCipherSpec), (Fatal, 10));
        assert_eq!(alert_for(Error::UnrecognizedMessageType(99)), (Fatal, 10));
        assert_eq!(alert_for(Error::HashMacVerifyFailure), (Fatal, 20));
        assert_eq!(alert_for(Error::PaddingCheckFailed), (Fatal, 20));
        assert_eq!(alert_for(Error::AeadDecryptFailure), (Fatal, 20));
        assert_eq!(alert_for(Error::NoSupportedCiphers), (Fatal, 40));
        assert_eq!(alert_for(Error::UnsupportedEccCurve), (Fatal, 40));
        assert_eq!(alert_for(Error::SniInvalid), (Fatal, 40));
        assert_eq!(alert_for(Error::InvalidCertificate), (Fatal, 42));
        assert_eq!(alert_for(Error::UnsupportedCertificate), (Fatal, 43));
        assert_eq!(alert_for(Error::CertificateExpired), (Fatal, 45));
        assert_eq!(alert_for(Error::UnknownCertSigAlgorithm), (Fatal, 46));
        assert_eq!(alert_for(Error::BadCompressionMethod), (Fatal, 47));
        assert_eq!(alert_for(Error::IssuerCertificateNotFound), (Fatal, 48));
        assert_eq!(alert_for(Error::IncorrectMessageLength), (Fatal, 50));
        assert_eq!(alert_for(Error::FinishedHashFailure), (Fatal, 51));
        assert_eq!(alert_for(Error::SignatureVerificationError), (Fatal, 51));
        assert_eq!(alert_for(Error::ProtocolVersionChanged), (Fatal, 70));
        assert_eq!(alert_for(Error::UnknownTlsVersion), (Fatal, 70));
        assert_eq!(alert_for(Error::UnsupportedTlsVersion), (Fatal, 70));
        assert_eq!(alert_for(Error::InappropriateFallback), (Fatal, 86));
        assert_eq!(alert_for(Error::NoRenegotiation), (Warning, 100));
        assert_eq!(alert_for(Error::RenegotiationFailure), (Warning, 100));
        assert_eq!(alert_for(Error::RenegotiationSessionInactive), (Warning, 100));
        assert_eq!(alert_for(Error::NoMatchingPsk), (Fatal, 115));
        assert_eq!(alert_for(Error::CryptoKeysTooLarge), (Fatal, 80));
        assert_eq!(alert_for(Error::ConfigError("x".into())), (Fatal, 80));
        assert_eq!(alert_for(Error::InvalidState), (Fatal, 80));
        assert_eq!(alert_for(Error::RenegotiationExtensionError), (Fatal, 80));
    }

    #[test]
    fn padding_and_mac_failures_look_the_same() {
        assert_eq!(
            map_error_to_alert(&Error::PaddingCheckFailed),
            map_error_to_alert(&Error::HashMacVerifyFailure)
        );
    }
}
