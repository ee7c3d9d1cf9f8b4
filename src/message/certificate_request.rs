use nom::IResult;
use tinyvec::ArrayVec;

use super::extensions::signature_algorithms::{parse_list, serialize_list, SignatureAlgorithms};
use super::DistinguishedName;
use crate::buffer::Buf;
use crate::types::ClientCertificateType;
use crate::util::{all_consumed, length_u16, length_u8, many0, many1};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    /// Empty before TLS 1.2, where the field does not exist.
    pub supported_signature_algorithms: SignatureAlgorithms,
    pub certificate_authorities: ArrayVec<[DistinguishedName<'a>; 32]>,
}

impl<'a> CertificateRequest<'a> {
    pub fn new(
        certificate_types: &[ClientCertificateType],
        supported_signature_algorithms: SignatureAlgorithms,
        certificate_authorities: &[&'a [u8]],
    ) -> Self {
        let mut req = CertificateRequest {
            supported_signature_algorithms,
            ..Default::default()
        };
        for t in certificate_types.iter().take(8) {
            req.certificate_types.push(*t);
        }
        for name in certificate_authorities.iter().take(32) {
            req.certificate_authorities.push(DistinguishedName(name));
        }
        req
    }

    pub fn parse(input: &'a [u8], tls12: bool) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, types) = length_u8(input)?;
        let (rest, certificate_types) = many1(ClientCertificateType::parse)(types)?;
        all_consumed(rest)?;

        let (input, supported_signature_algorithms) = if tls12 {
            parse_list(input)?
        } else {
            (input, SignatureAlgorithms::new())
        };

        let (input, names) = length_u16(input)?;
        let (rest, certificate_authorities) = many0(DistinguishedName::parse)(names)?;
        all_consumed(rest)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf, tls12: bool) {
        output.push(self.certificate_types.len() as u8);
        for cert_type in &self.certificate_types {
            output.push(cert_type.as_u8());
        }

        if tls12 {
            serialize_list(&self.supported_signature_algorithms, output);
        }

        let names_len: usize = self
            .certificate_authorities
            .iter()
            .map(|name| name.encoded_len())
            .sum();
        output.push_u16(names_len as u16);
        for name in &self.certificate_authorities {
            name.serialize(output);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::SignatureAndHashAlgorithm;

    const MESSAGE: &[u8] = &[
        0x02, // Certificate types length
        0x01, 0x40, // rsa_sign, ecdsa_sign
        0x00, 0x04, // Signature algorithms length
        0x04, 0x01, 0x04, 0x03, // SHA256+RSA, SHA256+ECDSA
        0x00, 0x0C, // Certificate authorities length
        0x00, 0x04, // Distinguished name 1 length
        0x01, 0x02, 0x03, 0x04, // Distinguished name 1 data
        0x00, 0x04, // Distinguished name 2 length
        0x05, 0x06, 0x07, 0x08, // Distinguished name 2 data
    ];

    #[test]
    fn roundtrip() {
        let mut sigs = SignatureAlgorithms::new();
        sigs.push(SignatureAndHashAlgorithm::RSA_SHA256);
        sigs.push(SignatureAndHashAlgorithm::ECDSA_SHA256);

        let request = CertificateRequest::new(
            &[ClientCertificateType::RsaSign, ClientCertificateType::EcdsaSign],
            sigs,
            &[&MESSAGE[13..17], &MESSAGE[19..23]],
        );

        let mut serialized = Buf::new();
        request.serialize(&mut serialized, true);
        assert_eq!(&*serialized, MESSAGE);

        let (rest, parsed) = CertificateRequest::parse(&serialized, true).unwrap();
        assert_eq!(parsed, request);
        assert!(rest.is_empty());
    }

    #[test]
    fn parse_rfc5246_request() {
        let msg = [
            0x01, // Certificate types length
            0x40, // ecdsa_sign
            0x00, 0x02, // Signature algorithms length
            0x04, 0x03, // SHA256+ECDSA
            0x00, 0x00, // no authorities
        ];
        let (rest, parsed) = CertificateRequest::parse(&msg, true).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            &parsed.certificate_types[..],
            &[ClientCertificateType::EcdsaSign]
        );
        assert_eq!(
            &parsed.supported_signature_algorithms[..],
            &[SignatureAndHashAlgorithm::ECDSA_SHA256]
        );
        assert!(parsed.certificate_authorities.is_empty());
    }

    #[test]
    fn legacy_has_no_signature_algorithms() {
        let msg = [
            0x01, // Certificate types length
            0x01, // rsa_sign
            0x00, 0x00, // no authorities
        ];
        let (rest, parsed) = CertificateRequest::parse(&msg, false).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.supported_signature_algorithms.is_empty());
        assert!(parsed.certificate_authorities.is_empty());

        let mut out = Buf::new();
        parsed.serialize(&mut out, false);
        assert_eq!(&*out, &msg);
    }

    #[test]
    fn empty_types_rejected() {
        assert!(CertificateRequest::parse(&[0x00, 0x00, 0x00, 0x00, 0x00], true).is_err());
    }
}
