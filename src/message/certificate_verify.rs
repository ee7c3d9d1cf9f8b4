use nom::IResult;

use super::DigitallySigned;
use crate::buffer::Buf;

/// CertificateVerify: a signature over the handshake messages so far.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateVerify<'a> {
    pub signed: DigitallySigned<'a>,
}

impl<'a> CertificateVerify<'a> {
    pub fn new(signed: DigitallySigned<'a>) -> Self {
        CertificateVerify { signed }
    }

    pub fn parse(input: &'a [u8], tls12: bool) -> IResult<&'a [u8], CertificateVerify<'a>> {
        let (input, signed) = DigitallySigned::parse(input, tls12)?;
        Ok((input, CertificateVerify { signed }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.signed.serialize(output);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn legacy_roundtrip() {
        let msg = [
            0x00, 0x03, // signature length
            0x01, 0x02, 0x03, // signature
        ];
        let (rest, cv) = CertificateVerify::parse(&msg, false).unwrap();
        assert!(rest.is_empty());
        assert_eq!(cv.signed.signature, &[1, 2, 3]);

        let mut out = Buf::new();
        cv.serialize(&mut out);
        assert_eq!(&*out, &msg);
    }
}
