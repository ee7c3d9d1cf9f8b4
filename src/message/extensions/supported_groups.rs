use nom::IResult;
use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::types::NamedGroup;
use crate::util::{all_consumed, length_u16, many0};
use crate::Error;

/// Supported Groups (previously elliptic_curves) extension.
/// RFC 4492 section 5.1.1
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportedGroupsExtension {
    pub groups: ArrayVec<[NamedGroup; 16]>,
}

impl SupportedGroupsExtension {
    pub fn new(groups: &[NamedGroup]) -> Self {
        let mut list = ArrayVec::new();
        for g in groups.iter().take(16) {
            list.push(*g);
        }
        SupportedGroupsExtension { groups: list }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SupportedGroupsExtension> {
        let (rest, list) = length_u16(input)?;
        let (list_rest, groups) = many0(NamedGroup::parse)(list)?;
        all_consumed(list_rest)?;
        Ok((rest, SupportedGroupsExtension { groups }))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let (rest, ext) = Self::parse(data)?;
        all_consumed(rest)?;
        if ext.groups.is_empty() {
            return Err(Error::EmptyEcGroup);
        }
        Ok(ext)
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push_u16((self.groups.len() * 2) as u16);
        for group in &self.groups {
            output.push_u16(group.as_u16());
        }
    }
}
