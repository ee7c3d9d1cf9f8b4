use nom::number::complete::be_u8;
use nom::IResult;

use super::DigitallySigned;
use crate::buffer::Buf;
use crate::ciphersuite::KeyExchange;
use crate::types::NamedGroup;
use crate::util::{length_u16, length_u8};

/// ECCurveType named_curve, the only form accepted.
pub const NAMED_CURVE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKeyExchangeParams<'a> {
    /// ServerECDHParams, RFC 4492 section 5.4.
    Ecdhe {
        curve_type: u8,
        group: NamedGroup,
        public: &'a [u8],
    },
    /// RFC 4279 identity hint.
    Psk { identity_hint: &'a [u8] },
}

impl<'a> ServerKeyExchangeParams<'a> {
    /// The params as they appear on the wire; this is what the signature
    /// covers after the two hello randoms.
    pub fn serialize(&self, output: &mut Buf) {
        match self {
            ServerKeyExchangeParams::Ecdhe {
                curve_type,
                group,
                public,
            } => {
                output.push(*curve_type);
                output.push_u16(group.as_u16());
                output.push(public.len() as u8);
                output.extend_from_slice(public);
            }
            ServerKeyExchangeParams::Psk { identity_hint } => {
                output.push_u16(identity_hint.len() as u16);
                output.extend_from_slice(identity_hint);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub params: ServerKeyExchangeParams<'a>,
    /// Present for ECDHE, absent for PSK.
    pub signature: Option<DigitallySigned<'a>>,
}

impl<'a> ServerKeyExchange<'a> {
    pub fn new(
        params: ServerKeyExchangeParams<'a>,
        signature: Option<DigitallySigned<'a>>,
    ) -> Self {
        ServerKeyExchange { params, signature }
    }

    pub fn parse(
        input: &'a [u8],
        key_exchange: KeyExchange,
        tls12: bool,
    ) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        match key_exchange {
            KeyExchange::Ecdhe => {
                let (input, curve_type) = be_u8(input)?;
                let (input, group) = NamedGroup::parse(input)?;
                let (input, public) = length_u8(input)?;
                let (input, signature) = DigitallySigned::parse(input, tls12)?;
                let params = ServerKeyExchangeParams::Ecdhe {
                    curve_type,
                    group,
                    public,
                };
                Ok((
                    input,
                    ServerKeyExchange {
                        params,
                        signature: Some(signature),
                    },
                ))
            }
            KeyExchange::Psk => {
                let (input, identity_hint) = length_u16(input)?;
                let params = ServerKeyExchangeParams::Psk { identity_hint };
                Ok((
                    input,
                    ServerKeyExchange {
                        params,
                        signature: None,
                    },
                ))
            }
            // RSA and static ECDH never send one.
            KeyExchange::Rsa | KeyExchange::Ecdh => Err(nom::Err::Failure(
                nom::error::Error::new(input, nom::error::ErrorKind::Tag),
            )),
        }
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.params.serialize(output);
        if let Some(signature) = &self.signature {
            signature.serialize(output);
        }
    }
}
