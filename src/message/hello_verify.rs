use nom::IResult;

use super::Cookie;
use crate::buffer::Buf;
use crate::types::ProtocolVersion;

/// DTLS HelloVerifyRequest (RFC 6347, 4.2.1). The client repeats its
/// ClientHello with `cookie` filled in.
#[derive(Debug, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(server_version: ProtocolVersion, cookie: Cookie) -> Self {
        HelloVerifyRequest {
            server_version,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;
        Ok((input, HelloVerifyRequest::new(server_version, cookie)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cookie_from_server() {
        let message = [
            0xFE, 0xFF, // DTLS 1.0
            0x03, // cookie length
            0x0A, 0x0B, 0x0C,
        ];

        let (rest, hvr) = HelloVerifyRequest::parse(&message).unwrap();
        assert!(rest.is_empty());
        assert_eq!(hvr.server_version, ProtocolVersion::DTLS1_0);
        assert_eq!(&hvr.cookie[..], &[0x0A, 0x0B, 0x0C]);

        let mut out = Buf::new();
        hvr.serialize(&mut out);
        assert_eq!(&*out, &message);
    }

    #[test]
    fn cookie_cut_short() {
        assert!(HelloVerifyRequest::parse(&[0xFE, 0xFD, 0x04, 0x01]).is_err());
    }
}
