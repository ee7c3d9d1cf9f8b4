//! Length prefixed opaque values inside handshake messages.

use std::ops::Deref;

use nom::IResult;

use crate::buffer::Buf;
use crate::util::{length_u16, length_u24};

macro_rules! opaque {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $read:ident, $write:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name<'a>(pub &'a [u8]);

        impl<'a> $name<'a> {
            pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], $name<'a>> {
                let (input, value) = $read(input)?;
                Ok((input, $name(value)))
            }

            /// Serialized size, prefix included.
            pub fn encoded_len(&self) -> usize {
                $prefix + self.0.len()
            }

            pub fn serialize(&self, output: &mut Buf) {
                output.$write(self.0.len() as _);
                output.extend_from_slice(self.0);
            }
        }

        impl<'a> Deref for $name<'a> {
            type Target = [u8];

            fn deref(&self) -> &Self::Target {
                self.0
            }
        }
    };
}

opaque!(
    /// One DER certificate of a Certificate message.
    Asn1Cert, 3, length_u24, push_u24
);

opaque!(
    /// DER subject of an acceptable CA in a CertificateRequest.
    DistinguishedName, 2, length_u16, push_u16
);
