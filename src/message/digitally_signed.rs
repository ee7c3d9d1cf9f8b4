use nom::IResult;

use crate::buffer::Buf;
use crate::types::SignatureAndHashAlgorithm;
use crate::util::length_u16;

/// A signature as carried in ServerKeyExchange and CertificateVerify.
///
/// TLS 1.2 prefixes the signature with the (hash, signature) pair used;
/// earlier versions carry only the u16 prefixed signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitallySigned<'a> {
    pub algorithm: Option<SignatureAndHashAlgorithm>,
    pub signature: &'a [u8],
}

impl<'a> DigitallySigned<'a> {
    pub fn new(algorithm: Option<SignatureAndHashAlgorithm>, signature: &'a [u8]) -> Self {
        DigitallySigned {
            algorithm,
            signature,
        }
    }

    pub fn parse(input: &'a [u8], tls12: bool) -> IResult<&'a [u8], DigitallySigned<'a>> {
        let (input, algorithm) = if tls12 {
            let (input, alg) = SignatureAndHashAlgorithm::parse(input)?;
            (input, Some(alg))
        } else {
            (input, None)
        };
        let (input, signature) = length_u16(input)?;

        Ok((
            input,
            DigitallySigned {
                algorithm,
                signature,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        if let Some(alg) = &self.algorithm {
            alg.serialize(output);
        }
        output.push_u16(self.signature.len() as u16);
        output.extend_from_slice(self.signature);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x04, 0x01, // SignatureAndHashAlgorithm (SHA256 + RSA)
        0x00, 0x04, // Signature length
        0x01, 0x02, 0x03, 0x04, // Signature data
    ];

    #[test]
    fn roundtrip() {
        let ds = DigitallySigned::new(
            Some(SignatureAndHashAlgorithm::RSA_SHA256),
            &MESSAGE[4..8],
        );

        let mut serialized = Buf::new();
        ds.serialize(&mut serialized);
        assert_eq!(&*serialized, MESSAGE);

        let (rest, parsed) = DigitallySigned::parse(&serialized, true).unwrap();
        assert_eq!(parsed, ds);
        assert!(rest.is_empty());
    }

    #[test]
    fn legacy_has_no_algorithm() {
        let (rest, parsed) = DigitallySigned::parse(&MESSAGE[2..], false).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.algorithm, None);
        assert_eq!(parsed.signature, &[1, 2, 3, 4]);
    }
}
