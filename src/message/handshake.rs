use nom::number::complete::{be_u24, be_u8};
use nom::IResult;

use crate::buffer::Buf;

/// Handshake message types of TLS 1.0 - 1.2 and DTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    #[default]
    Unknown,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => return None,
        })
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown => 255,
        }
    }
}

/// ```text
/// struct {
///     HandshakeType msg_type;
///     uint24 length;
///     ...
/// } Handshake;
/// ```
///
/// `msg_type` is kept raw so the engine can report unrecognized types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub msg_type: u8,
    pub length: u32,
}

impl HandshakeHeader {
    pub const LEN: usize = 4;

    pub fn new(msg_type: MessageType, length: usize) -> Self {
        HandshakeHeader {
            msg_type: msg_type.as_u8(),
            length: length as u32,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeHeader> {
        let (input, msg_type) = be_u8(input)?;
        let (input, length) = be_u24(input)?;
        Ok((input, HandshakeHeader { msg_type, length }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.msg_type);
        output.push_u24(self.length);
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.msg_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x02, // ServerHello
        0x00, 0x01, 0x02, // length
    ];

    #[test]
    fn roundtrip() {
        let (rest, header) = HandshakeHeader::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(header.message_type(), Some(MessageType::ServerHello));
        assert_eq!(header.length, 0x0102);

        let mut out = Buf::new();
        header.serialize(&mut out);
        assert_eq!(&*out, MESSAGE);
    }

    #[test]
    fn unrecognized_type() {
        let (_, header) = HandshakeHeader::parse(&[0x04, 0, 0, 0]).unwrap();
        assert_eq!(header.message_type(), None);
        assert_eq!(header.msg_type, 4);
    }

    #[test]
    fn wire_values() {
        for v in [0u8, 1, 2, 3, 11, 12, 13, 14, 15, 16, 20] {
            assert_eq!(MessageType::from_u8(v).unwrap().as_u8(), v);
        }
    }
}
