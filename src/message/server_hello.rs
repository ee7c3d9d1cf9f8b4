use nom::IResult;

use super::extension::{find_extension, parse_extensions, serialize_extensions};
use super::{Extension, ExtensionType, Extensions, Random, SessionId};
use crate::buffer::Buf;
use crate::ciphersuite::CipherSuite;
use crate::types::{CompressionMethod, ProtocolVersion};

/// ```text
/// version(2) random(32) session_id<0..32> cipher_suite(2) compression(1) [extensions]
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: Extensions<'a>,
}

impl<'a> ServerHello<'a> {
    pub fn new(
        server_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suite: CipherSuite,
    ) -> Self {
        ServerHello {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method: CompressionMethod::Null,
            extensions: Extensions::new(),
        }
    }

    pub fn parse(input: &'a [u8], max_extensions: usize) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = parse_extensions(input, max_extensions)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn extension(&self, extension_type: ExtensionType) -> Option<&'a [u8]> {
        find_extension(&self.extensions, extension_type)
    }

    pub fn push_extension(&mut self, extension: Extension<'a>) {
        self.extensions.push(extension);
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cipher_suite.serialize(output);
        output.push(self.compression_method.as_u8());
        serialize_extensions(&self.extensions, output);
    }
}
