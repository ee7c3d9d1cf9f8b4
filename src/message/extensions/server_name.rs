use nom::number::complete::be_u8;
use nom::IResult;

use crate::buffer::Buf;
use crate::util::{all_consumed, length_u16};
use crate::Error;

const HOST_NAME: u8 = 0;

/// server_name extension (RFC 6066 section 3), host_name entries only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerNameExtension {
    pub host_name: String,
}

impl ServerNameExtension {
    pub fn new(host_name: &str) -> Self {
        ServerNameExtension {
            host_name: host_name.to_string(),
        }
    }

    /// Parse a ClientHello server_name_list. Any malformed list is
    /// [`Error::SniInvalid`].
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let host = parse_list(data)
            .map_err(|_| Error::SniInvalid)?
            .ok_or(Error::SniInvalid)?;

        if host.is_empty() || host.len() > 255 || host.contains(&0) {
            return Err(Error::SniInvalid);
        }
        let host_name = std::str::from_utf8(host).map_err(|_| Error::SniInvalid)?;
        if !host_name.is_ascii() || host_name.ends_with('.') {
            return Err(Error::SniInvalid);
        }

        Ok(ServerNameExtension {
            host_name: host_name.to_string(),
        })
    }

    pub fn serialize(&self, output: &mut Buf) {
        let name = self.host_name.as_bytes();
        // list length, then one entry of type + u16 length + name
        output.push_u16((1 + 2 + name.len()) as u16);
        output.push(HOST_NAME);
        output.push_u16(name.len() as u16);
        output.extend_from_slice(name);
    }
}

/// Returns the first host_name entry. Entries of other types are skipped.
fn parse_list(data: &[u8]) -> Result<Option<&[u8]>, nom::Err<nom::error::Error<&[u8]>>> {
    let (rest, mut list) = length_u16(data)?;
    all_consumed(rest)?;

    let mut host = None;
    while !list.is_empty() {
        let (next, (name_type, name)) = parse_entry(list)?;
        if name_type == HOST_NAME && host.is_none() {
            host = Some(name);
        }
        list = next;
    }
    Ok(host)
}

fn parse_entry(input: &[u8]) -> IResult<&[u8], (u8, &[u8])> {
    let (input, name_type) = be_u8(input)?;
    let (input, name) = length_u16(input)?;
    Ok((input, (name_type, name)))
}
