use nom::IResult;
use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::types::EcPointFormat;
use crate::util::{all_consumed, length_u8, many0};
use crate::Error;

/// ECPointFormats extension, RFC 4492 section 5.1.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ECPointFormatsExtension {
    pub formats: ArrayVec<[EcPointFormat; 8]>,
}

impl Default for ECPointFormatsExtension {
    /// Uncompressed only, which is all anyone implements.
    fn default() -> Self {
        let mut formats = ArrayVec::new();
        formats.push(EcPointFormat::Uncompressed);
        ECPointFormatsExtension { formats }
    }
}

impl ECPointFormatsExtension {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ECPointFormatsExtension> {
        let (rest, list) = length_u8(input)?;
        let (list_rest, formats) = many0(EcPointFormat::parse)(list)?;
        all_consumed(list_rest)?;
        Ok((rest, ECPointFormatsExtension { formats }))
    }

    /// Parse and require the uncompressed format.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let (rest, ext) = Self::parse(data)?;
        all_consumed(rest)?;
        if ext.formats.is_empty() {
            return Err(Error::EmptyEcPointFormat);
        }
        if !ext.supports_uncompressed() {
            return Err(Error::UnsupportedEccFormat);
        }
        Ok(ext)
    }

    pub fn supports_uncompressed(&self) -> bool {
        self.formats.contains(&EcPointFormat::Uncompressed)
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.formats.len() as u8);
        for format in &self.formats {
            output.push(format.as_u8());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roundtrip() {
        let ext = ECPointFormatsExtension::default();
        let mut out = Buf::new();
        ext.serialize(&mut out);
        assert_eq!(&*out, &[0x01, 0x00]);

        assert_eq!(ECPointFormatsExtension::decode(&out).unwrap(), ext);
    }

    #[test]
    fn empty_and_compressed_only() {
        assert!(matches!(
            ECPointFormatsExtension::decode(&[0x00]),
            Err(Error::EmptyEcPointFormat)
        ));
        assert!(matches!(
            ECPointFormatsExtension::decode(&[0x01, 0x01]),
            Err(Error::UnsupportedEccFormat)
        ));
    }

    #[test]
    fn list_past_end() {
        assert!(ECPointFormatsExtension::decode(&[0x03, 0x00]).is_err());
    }
}
