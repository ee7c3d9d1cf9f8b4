use nom::bytes::complete::take;
use nom::IResult;

use crate::buffer::Buf;
use crate::key_schedule::VERIFY_DATA_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: [u8; VERIFY_DATA_LEN],
}

impl Finished {
    pub fn new(verify_data: [u8; VERIFY_DATA_LEN]) -> Self {
        Finished { verify_data }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        let (input, data) = take(VERIFY_DATA_LEN)(input)?;
        let mut verify_data = [0; VERIFY_DATA_LEN];
        verify_data.copy_from_slice(data);
        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.verify_data);
    }
}
