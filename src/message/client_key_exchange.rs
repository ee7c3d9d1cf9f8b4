use nom::IResult;

use crate::buffer::Buf;
use crate::ciphersuite::KeyExchange;
use crate::util::{length_u16, length_u8};

/// ClientKeyExchange body, shaped by the negotiated key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKeyExchange<'a> {
    /// PKCS#1 v1.5 encrypted pre-master secret.
    Rsa { encrypted_pre_master: &'a [u8] },
    /// The PSK identity the client picked.
    Psk { identity: &'a [u8] },
    /// Uncompressed EC point, ephemeral or static.
    Ecdh { public: &'a [u8] },
}

impl<'a> ClientKeyExchange<'a> {
    pub fn parse(
        input: &'a [u8],
        key_exchange: KeyExchange,
    ) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        match key_exchange {
            KeyExchange::Rsa => {
                let (input, encrypted_pre_master) = length_u16(input)?;
                Ok((
                    input,
                    ClientKeyExchange::Rsa {
                        encrypted_pre_master,
                    },
                ))
            }
            KeyExchange::Psk => {
                let (input, identity) = length_u16(input)?;
                Ok((input, ClientKeyExchange::Psk { identity }))
            }
            KeyExchange::Ecdh | KeyExchange::Ecdhe => {
                let (input, public) = length_u8(input)?;
                Ok((input, ClientKeyExchange::Ecdh { public }))
            }
        }
    }

    pub fn serialize(&self, output: &mut Buf) {
        match self {
            ClientKeyExchange::Rsa {
                encrypted_pre_master,
            } => {
                output.push_u16(encrypted_pre_master.len() as u16);
                output.extend_from_slice(encrypted_pre_master);
            }
            ClientKeyExchange::Psk { identity } => {
                output.push_u16(identity.len() as u16);
                output.extend_from_slice(identity);
            }
            ClientKeyExchange::Ecdh { public } => {
                output.push(public.len() as u8);
                output.extend_from_slice(public);
            }
        }
    }
}
