//! TLS record layer: header codec, sequence numbers and record protection.

mod protection;

pub use protection::RecordProtection;

use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ContentType, ProtocolVersion};

/// Largest plaintext fragment, 2^14.
pub const MAX_PLAINTEXT: usize = 16384;

/// Largest protected fragment, 2^14 + 2048.
pub const MAX_CIPHERTEXT: usize = MAX_PLAINTEXT + 2048;

/// A record header.
///
/// ```text
/// struct {
///     ContentType type;
///     ProtocolVersion version;
///     uint16 length;
/// } TLSPlaintext;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub length: u16,
}

impl RecordHeader {
    pub const LEN: usize = 5;

    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.push_u16(self.length);
    }

    /// Bytes needed for the complete record, header included.
    pub fn record_len(&self) -> usize {
        Self::LEN + self.length as usize
    }
}

/// 64 bit record sequence number kept as two 32 bit halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber {
    pub hi: u32,
    pub lo: u32,
}

impl SequenceNumber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one, carrying into the high word when the low word wraps.
    pub fn increment(&mut self) {
        self.lo = self.lo.wrapping_add(1);
        if self.lo == 0 {
            self.hi = self.hi.wrapping_add(1);
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.hi.to_be_bytes());
        out[4..].copy_from_slice(&self.lo.to_be_bytes());
        out
    }

    pub fn as_u64(self) -> u64 {
        ((self.hi as u64) << 32) | self.lo as u64
    }
}
