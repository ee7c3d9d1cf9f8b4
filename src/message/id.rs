use std::fmt;
use std::ops::Deref;

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use crate::buffer::Buf;
use crate::crypto::SecureRandom;

/// A byte string with a `u8` length prefix and a bounded size.
macro_rules! var_array {
    ($name:ident, $max:expr) => {
        #[derive(Clone, Copy)]
        pub struct $name([u8; $max], usize);

        impl Default for $name {
            fn default() -> Self {
                $name([0; $max], 0)
            }
        }

        impl $name {
            pub const MAX_LEN: usize = $max;

            pub fn empty() -> Self {
                Self::default()
            }

            /// `None` if `data` is longer than the maximum.
            pub fn try_new(data: &[u8]) -> Option<Self> {
                if data.len() > $max {
                    return None;
                }
                let mut array = [0; $max];
                array[..data.len()].copy_from_slice(data);
                Some($name(array, data.len()))
            }

            pub fn random(len: usize, rng: &dyn SecureRandom) -> Result<Self, crate::Error> {
                let len = len.min($max);
                let mut array = [0; $max];
                rng.fill(&mut array[..len]).map_err(crate::Error::CryptoError)?;
                Ok($name(array, len))
            }

            pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
                let (input, len) = be_u8(input)?;
                if len as usize > $max {
                    return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
                }
                let (input, data) = take(len as usize)(input)?;
                let mut array = [0; $max];
                array[..data.len()].copy_from_slice(data);
                Ok((input, $name(array, data.len())))
            }

            pub fn serialize(&self, output: &mut Buf) {
                output.push(self.1 as u8);
                output.extend_from_slice(&self.0[..self.1]);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:02x?})", stringify!($name), &self.0[..self.1])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.deref() == other.deref()
            }
        }

        impl Eq for $name {}

        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &Self::Target {
                &self.0[..self.1]
            }
        }
    };
}

var_array!(SessionId, 32);
var_array!(Cookie, 255);
