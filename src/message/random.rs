use nom::bytes::complete::take;
use nom::number::complete::be_u32;
use nom::IResult;

use crate::buffer::Buf;
use crate::crypto::SecureRandom;
use crate::Error;

/// Hello random: a 32 bit timestamp and 28 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random {
    pub gmt_unix_time: u32,
    pub random_bytes: [u8; 28],
}

impl Random {
    pub fn new(unix_time: u64, rng: &dyn SecureRandom) -> Result<Self, Error> {
        let mut random_bytes = [0u8; 28];
        rng.fill(&mut random_bytes).map_err(Error::CryptoError)?;

        Ok(Self {
            // Wraps in 2106.
            gmt_unix_time: unix_time as u32,
            random_bytes,
        })
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, gmt_unix_time) = be_u32(input)?;
        let (input, input_rand) = take(28_usize)(input)?;
        let mut random_bytes = [0u8; 28];
        random_bytes.copy_from_slice(input_rand);

        Ok((
            input,
            Random {
                gmt_unix_time,
                random_bytes,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.gmt_unix_time.to_be_bytes());
        output.extend_from_slice(&self.random_bytes);
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..4].copy_from_slice(&self.gmt_unix_time.to_be_bytes());
        out[4..].copy_from_slice(&self.random_bytes);
        out
    }
}
