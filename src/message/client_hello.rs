use nom::IResult;
use tinyvec::ArrayVec;

use super::extension::{find_extension, parse_extensions, serialize_extensions};
use super::{Cookie, Extension, ExtensionType, Extensions, Random, SessionId};
use crate::buffer::Buf;
use crate::ciphersuite::CipherSuite;
use crate::types::{CompressionMethod, ProtocolVersion};
use crate::util::{all_consumed, length_u16, length_u8, many1};

/// Shortest ClientHello body a server looks at: version, random and the
/// session id, suite list and compression list length fields.
pub const CLIENT_HELLO_MIN_LEN: usize = 2 + 32 + 1 + 2 + 1;

pub type CipherSuites = ArrayVec<[CipherSuite; 128]>;

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    /// DTLS only.
    pub cookie: Option<Cookie>,
    pub cipher_suites: CipherSuites,
    pub compression_methods: ArrayVec<[CompressionMethod; 16]>,
    pub extensions: Extensions<'a>,
}

impl<'a> ClientHello<'a> {
    pub fn new(
        client_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cookie: Option<Cookie>,
        cipher_suites: CipherSuites,
    ) -> Self {
        let mut compression_methods = ArrayVec::new();
        compression_methods.push(CompressionMethod::Null);

        ClientHello {
            client_version,
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
            extensions: ArrayVec::new(),
        }
    }

    pub fn parse(
        input: &'a [u8],
        dtls: bool,
        max_extensions: usize,
    ) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;

        let (input, cookie) = if dtls {
            let (input, cookie) = Cookie::parse(input)?;
            (input, Some(cookie))
        } else {
            (input, None)
        };

        let (input, suites) = length_u16(input)?;
        let (rest, cipher_suites) = many1(CipherSuite::parse)(suites)?;
        all_consumed(rest)?;

        let (input, compression) = length_u8(input)?;
        let (rest, compression_methods) = many1(CompressionMethod::parse)(compression)?;
        all_consumed(rest)?;

        let (input, extensions) = parse_extensions(input, max_extensions)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn extension(&self, extension_type: ExtensionType) -> Option<&'a [u8]> {
        find_extension(&self.extensions, extension_type)
    }

    pub fn offers(&self, suite: CipherSuite) -> bool {
        self.cipher_suites.contains(&suite)
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        if let Some(cookie) = &self.cookie {
            cookie.serialize(output);
        }
        output.push_u16((self.cipher_suites.len() * 2) as u16);
        for suite in &self.cipher_suites {
            suite.serialize(output);
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        serialize_extensions(&self.extensions, output);
    }

    pub fn push_extension(&mut self, extension: Extension<'a>) {
        self.extensions.push(extension);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // TLS 1.2
        // Random
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E,
        0x1F, 0x20, //
        0x01, // SessionId length
        0xAA, // SessionId
        0x00, 0x06, // CipherSuites length
        0x00, 0x3C, // RSA_WITH_AES_128_CBC_SHA256
        0x00, 0x2F, // RSA_WITH_AES_128_CBC_SHA
        0x00, 0xFF, // EMPTY_RENEGOTIATION_INFO_SCSV
        0x01, // CompressionMethods length
        0x00, // CompressionMethod::Null
        0x00, 0x05, // Extensions length
        0xFF, 0x01, // renegotiation_info
        0x00, 0x01, // length
        0x00, // empty
    ];

    #[test]
    fn roundtrip() {
        let random = Random::parse(&MESSAGE[2..34]).unwrap().1;
        let session_id = SessionId::try_new(&[0xAA]).unwrap();
        let mut cipher_suites = CipherSuites::new();
        cipher_suites.push(CipherSuite::RSA_WITH_AES_128_CBC_SHA256);
        cipher_suites.push(CipherSuite::RSA_WITH_AES_128_CBC_SHA);
        cipher_suites.push(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV);

        let mut client_hello = ClientHello::new(
            ProtocolVersion::TLS1_2,
            random,
            session_id,
            None,
            cipher_suites,
        );
        client_hello.push_extension(Extension::new(ExtensionType::RenegotiationInfo, &[0x00]));

        let mut serialized = Buf::new();
        client_hello.serialize(&mut serialized);
        assert_eq!(&*serialized, MESSAGE);

        let (rest, parsed) = ClientHello::parse(&serialized, false, 12).unwrap();
        assert_eq!(parsed, client_hello);
        assert!(rest.is_empty());
        assert!(parsed.offers(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV));
        assert_eq!(parsed.extension(ExtensionType::RenegotiationInfo), Some(&[0u8][..]));
    }

    #[test]
    fn without_extensions() {
        let len = MESSAGE.len() - 7;
        let (rest, parsed) = ClientHello::parse(&MESSAGE[..len], false, 12).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.extensions.is_empty());
        assert!(len >= CLIENT_HELLO_MIN_LEN);
    }

    #[test]
    fn dtls_cookie() {
        let random = Random::parse(&MESSAGE[2..34]).unwrap().1;
        let mut suites = CipherSuites::new();
        suites.push(CipherSuite::RSA_WITH_AES_128_CBC_SHA);
        let hello = ClientHello::new(
            ProtocolVersion::DTLS1_2,
            random,
            SessionId::empty(),
            Some(Cookie::try_new(&[9; 20]).unwrap()),
            suites,
        );
        let mut out = Buf::new();
        hello.serialize(&mut out);
        let (_, parsed) = ClientHello::parse(&out, true, 12).unwrap();
        assert_eq!(&*parsed.cookie.unwrap(), &[9; 20]);
    }

    #[test]
    fn session_id_too_long() {
        let mut message = MESSAGE.to_vec();
        message[34] = 0x21; // SessionId length 33

        assert!(ClientHello::parse(&message, false, 12).is_err());
    }

    #[test]
    fn odd_cipher_suite_length() {
        let mut message = MESSAGE.to_vec();
        message[37] = 0x05;
        assert!(ClientHello::parse(&message, false, 12).is_err());
    }

    #[test]
    fn extension_past_end() {
        let mut message = MESSAGE.to_vec();
        let n = message.len();
        message[n - 2] = 0x05;
        assert!(ClientHello::parse(&message, false, 12).is_err());
    }
}
