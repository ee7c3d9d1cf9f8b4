use nom::IResult;
use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::util::{all_consumed, length_u8};
use crate::Error;

/// renegotiation_info extension (RFC 5746 section 3.2).
///
/// Empty on an initial handshake. In a renegotiation the client sends its
/// previous verify_data, the server both sides' previous verify_data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenegotiationInfoExtension {
    pub renegotiated_connection: ArrayVec<[u8; 32]>,
}

impl RenegotiationInfoExtension {
    pub fn new(parts: &[&[u8]]) -> Self {
        let mut renegotiated_connection = ArrayVec::new();
        for part in parts {
            renegotiated_connection.extend_from_slice(part);
        }
        RenegotiationInfoExtension {
            renegotiated_connection,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], RenegotiationInfoExtension> {
        let (rest, data) = length_u8(input)?;
        let mut renegotiated_connection = ArrayVec::new();
        if data.len() > renegotiated_connection.capacity() {
            return Err(nom::Err::Failure(nom::error::Error::new(
                data,
                nom::error::ErrorKind::LengthValue,
            )));
        }
        renegotiated_connection.extend_from_slice(data);
        Ok((
            rest,
            RenegotiationInfoExtension {
                renegotiated_connection,
            },
        ))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let (rest, ext) = Self::parse(data).map_err(|_| Error::RenegotiationExtensionError)?;
        all_consumed(rest).map_err(|_| Error::RenegotiationExtensionError)?;
        Ok(ext)
    }

    pub fn is_empty(&self) -> bool {
        self.renegotiated_connection.is_empty()
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.renegotiated_connection.len() as u8);
        output.extend_from_slice(&self.renegotiated_connection);
    }
}
