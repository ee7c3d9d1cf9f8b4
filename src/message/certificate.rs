use nom::IResult;
use tinyvec::ArrayVec;

use super::Asn1Cert;
use crate::buffer::Buf;
use crate::util::{all_consumed, length_u24, many0};

/// Longest chain accepted from a peer.
pub const MAX_CHAIN_LEN: usize = 16;

/// Certificate message: a u24 list of u24 prefixed DER certificates,
/// leaf first.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub certificate_list: ArrayVec<[Asn1Cert<'a>; MAX_CHAIN_LEN]>,
}

impl<'a> Certificate<'a> {
    pub fn new(certificates: &[&'a [u8]]) -> Self {
        let mut certificate_list = ArrayVec::new();
        for c in certificates.iter().take(MAX_CHAIN_LEN) {
            certificate_list.push(Asn1Cert(c));
        }
        Certificate { certificate_list }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, list) = length_u24(input)?;
        let (rest, certificate_list) = many0(Asn1Cert::parse)(list)?;
        all_consumed(rest)?;

        Ok((input, Certificate { certificate_list }))
    }

    pub fn is_empty(&self) -> bool {
        self.certificate_list.is_empty()
    }

    pub fn leaf(&self) -> Option<&'a [u8]> {
        self.certificate_list.first().map(|c| c.0)
    }

    pub fn serialize(&self, output: &mut Buf) {
        let total: usize = self.certificate_list.iter().map(|c| c.encoded_len()).sum();
        output.push_u24(total as u32);

        for cert in &self.certificate_list {
            cert.serialize(output);
        }
    }
}
