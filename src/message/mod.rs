//! Handshake message codecs.
//!
//! Messages borrow from the handshake body they were parsed from and
//! serialize into a [`Buf`](crate::buffer::Buf). Parsers are nom
//! combinators; [`parse_all`] turns one into a `Result` for a complete body.

mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod extension;
pub mod extensions;
mod finished;
mod handshake;
mod hello_verify;
mod id;
mod random;
mod server_hello;
mod server_key_exchange;
mod wrapped;

pub use certificate::{Certificate, MAX_CHAIN_LEN};
pub use certificate_request::CertificateRequest;
pub use certificate_verify::CertificateVerify;
pub use client_hello::{CipherSuites, ClientHello, CLIENT_HELLO_MIN_LEN};
pub use client_key_exchange::ClientKeyExchange;
pub use digitally_signed::DigitallySigned;
pub use extension::{find_extension, Extension, ExtensionType, Extensions, MAX_EXTENSIONS};
pub use finished::Finished;
pub use handshake::{HandshakeHeader, MessageType};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, SessionId};
pub use random::Random;
pub use server_hello::ServerHello;
pub use server_key_exchange::{ServerKeyExchange, ServerKeyExchangeParams, NAMED_CURVE};
pub use wrapped::{Asn1Cert, DistinguishedName};

use nom::IResult;

use crate::Error;

/// Run `parser` over a complete message body. Bytes left over are
/// [`Error::IncorrectMessageLength`], as is any parse failure.
pub fn parse_all<'a, T>(
    body: &'a [u8],
    parser: impl FnOnce(&'a [u8]) -> IResult<&'a [u8], T>,
) -> Result<T, Error> {
    let (rest, value) = parser(body)?;
    if !rest.is_empty() {
        return Err(Error::IncorrectMessageLength);
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_all_rejects_trailing_bytes() {
        let body = [0u8; 13];
        assert!(matches!(
            parse_all(&body, Finished::parse),
            Err(Error::IncorrectMessageLength)
        ));
        assert!(parse_all(&body[..12], Finished::parse).is_ok());
        assert!(matches!(
            parse_all(&body[..5], Finished::parse),
            Err(Error::IncorrectMessageLength)
        ));
    }
}
