use nom::IResult;
use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::types::SignatureAndHashAlgorithm;
use crate::util::{all_consumed, length_u16, many0};
use crate::Error;

pub type SignatureAlgorithms = ArrayVec<[SignatureAndHashAlgorithm; 16]>;

/// signature_algorithms extension, RFC 5246 section 7.4.1.4.1
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureAlgorithmsExtension {
    pub supported_signature_algorithms: SignatureAlgorithms,
}

impl SignatureAlgorithmsExtension {
    pub fn new(algorithms: &[SignatureAndHashAlgorithm]) -> Self {
        let mut list = ArrayVec::new();
        for a in algorithms.iter().take(16) {
            list.push(*a);
        }
        SignatureAlgorithmsExtension {
            supported_signature_algorithms: list,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAlgorithmsExtension> {
        let (rest, list) = parse_list(input)?;
        Ok((
            rest,
            SignatureAlgorithmsExtension {
                supported_signature_algorithms: list,
            },
        ))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let (rest, ext) = Self::parse(data)?;
        all_consumed(rest)?;
        Ok(ext)
    }

    pub fn serialize(&self, output: &mut Buf) {
        serialize_list(&self.supported_signature_algorithms, output);
    }
}

/// `SignatureAndHashAlgorithm supported_signature_algorithms<2..2^16-2>`,
/// shared with CertificateRequest.
pub fn parse_list(input: &[u8]) -> IResult<&[u8], SignatureAlgorithms> {
    let (rest, list) = length_u16(input)?;
    let (list_rest, algorithms) = many0(SignatureAndHashAlgorithm::parse)(list)?;
    all_consumed(list_rest)?;
    Ok((rest, algorithms))
}

pub fn serialize_list(algorithms: &[SignatureAndHashAlgorithm], output: &mut Buf) {
    output.push_u16((algorithms.len() * 2) as u16);
    for alg in algorithms {
        alg.serialize(output);
    }
}
