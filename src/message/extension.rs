use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;
use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::util::all_consumed;

/// Capacity of the per-hello extension array.
pub const MAX_EXTENSIONS: usize = 32;

pub type Extensions<'a> = ArrayVec<[Extension<'a>; MAX_EXTENSIONS]>;

/// One `{type, length, data}` entry of a hello extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub extension_data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn new(extension_type: ExtensionType, extension_data: &'a [u8]) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((
            input,
            Extension {
                extension_type,
                extension_data,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push_u16(self.extension_type.as_u16());
        output.push_u16(self.extension_data.len() as u16);
        output.extend_from_slice(self.extension_data);
    }
}

/// Parse the optional extension block at the end of a hello.
///
/// Every entry must fit inside the block and the block inside the message.
/// At most `max` entries are kept, the rest are bounds checked and dropped.
pub fn parse_extensions(input: &[u8], max: usize) -> IResult<&[u8], Extensions<'_>> {
    let mut extensions = Extensions::new();

    if input.is_empty() {
        return Ok((input, extensions));
    }

    let (rest, extensions_len) = be_u16(input)?;
    let (rest, mut block) = take(extensions_len)(rest)?;

    let max = max.min(MAX_EXTENSIONS);
    while !block.is_empty() {
        let (next, extension) = Extension::parse(block)?;
        if extensions.len() < max {
            extensions.push(extension);
        } else {
            trace!("Dropping extension beyond limit: {:?}", extension.extension_type);
        }
        block = next;
    }

    all_consumed(rest)?;

    Ok((rest, extensions))
}

/// Write an extension block. Nothing is written for an empty list.
pub fn serialize_extensions(extensions: &[Extension<'_>], output: &mut Buf) {
    if extensions.is_empty() {
        return;
    }
    let len: usize = extensions
        .iter()
        .map(|e| 4 + e.extension_data.len())
        .sum();
    output.push_u16(len as u16);
    for ext in extensions {
        ext.serialize(output);
    }
}

pub fn find_extension<'a>(
    extensions: &[Extension<'a>],
    extension_type: ExtensionType,
) -> Option<&'a [u8]> {
    extensions
        .iter()
        .find(|e| e.extension_type == extension_type)
        .map(|e| e.extension_data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    Heartbeat,
    ApplicationLayerProtocolNegotiation,
    Padding,
    EncryptThenMac,
    ExtendedMasterSecret,
    SessionTicket,
    RenegotiationInfo,
    Unknown(u16),
}

impl Default for ExtensionType {
    fn default() -> Self {
        Self::Unknown(0xFFFF)
    }
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x0001 => ExtensionType::MaxFragmentLength,
            0x0005 => ExtensionType::StatusRequest,
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x000F => ExtensionType::Heartbeat,
            0x0010 => ExtensionType::ApplicationLayerProtocolNegotiation,
            0x0015 => ExtensionType::Padding,
            0x0016 => ExtensionType::EncryptThenMac,
            0x0017 => ExtensionType::ExtendedMasterSecret,
            0x0023 => ExtensionType::SessionTicket,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::MaxFragmentLength => 0x0001,
            ExtensionType::StatusRequest => 0x0005,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::Heartbeat => 0x000F,
            ExtensionType::ApplicationLayerProtocolNegotiation => 0x0010,
            ExtensionType::Padding => 0x0015,
            ExtensionType::EncryptThenMac => 0x0016,
            ExtensionType::ExtendedMasterSecret => 0x0017,
            ExtensionType::SessionTicket => 0x0023,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x0A, // ExtensionType::SupportedGroups
        0x00, 0x08, // Extension length
        0x00, 0x06, 0x00, 0x17, 0x00, 0x18, 0x00, 0x19, // Extension data
    ];

    #[test]
    fn roundtrip() {
        let extension_data = &MESSAGE[4..];
        let extension = Extension::new(ExtensionType::SupportedGroups, extension_data);

        let mut serialized = Buf::new();
        extension.serialize(&mut serialized);
        assert_eq!(&*serialized, MESSAGE);

        let (rest, parsed) = Extension::parse(&serialized).unwrap();
        assert_eq!(parsed, extension);

        assert!(rest.is_empty());
    }

    const BLOCK: &[u8] = &[
        0x00, 0x0F, // block length
        0xFF, 0x01, // renegotiation_info
        0x00, 0x01, // length
        0x00, // empty renegotiated_connection
        0x12, 0x34, // unknown
        0x00, 0x02, // length
        0xAB, 0xCD, // data
        0x00, 0x17, // extended_master_secret
        0x00, 0x00, // length
    ];

    #[test]
    fn block_with_unknown() {
        let (rest, exts) = parse_extensions(BLOCK, 12).unwrap();
        assert!(rest.is_empty());
        assert_eq!(exts.len(), 3);
        assert_eq!(exts[1].extension_type, ExtensionType::Unknown(0x1234));
        assert_eq!(
            find_extension(&exts, ExtensionType::RenegotiationInfo),
            Some(&[0x00][..])
        );

        let mut out = Buf::new();
        serialize_extensions(&exts, &mut out);
        assert_eq!(&*out, BLOCK);
    }

    #[test]
    fn bounded_count() {
        let (_, exts) = parse_extensions(BLOCK, 2).unwrap();
        assert_eq!(exts.len(), 2);
    }

    #[test]
    fn entry_past_block_end() {
        let mut block = BLOCK.to_vec();
        block[10] = 0x09; // unknown extension claims 9 bytes
        assert!(parse_extensions(&block, 12).is_err());
    }

    #[test]
    fn block_past_message_end() {
        let mut block = BLOCK.to_vec();
        block[1] = 0x20;
        assert!(parse_extensions(&block, 12).is_err());
    }

    #[test]
    fn trailing_bytes() {
        let mut block = BLOCK.to_vec();
        block.push(0);
        assert!(parse_extensions(&block, 12).is_err());
    }

    #[test]
    fn empty() {
        let (_, exts) = parse_extensions(&[], 12).unwrap();
        assert!(exts.is_empty());
    }
}
