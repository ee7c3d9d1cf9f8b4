use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind, ParseError};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult, InputLength, Parser};
use tinyvec::{Array, ArrayVec};

/// Like `nom::multi::many0` but collects into a fixed capacity array.
///
/// Items beyond the capacity are parsed and dropped, so a peer cannot make
/// the collection overflow.
#[inline(always)]
pub fn many0<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| {
        let mut acc = ArrayVec::default();
        loop {
            let len = i.input_len();
            match f.parse(i.clone()) {
                Err(Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
                Ok((i1, o)) => {
                    // infinite loop check: the parser must always consume
                    if i1.input_len() == len {
                        return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many0)));
                    }

                    i = i1;
                    let _ = acc.try_push(o);
                }
            }
        }
    }
}

/// Like [`many0`] but requires at least one item.
#[inline(always)]
pub fn many1<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| match f.parse(i.clone()) {
        Err(Err::Error(err)) => Err(Err::Error(E::append(i, ErrorKind::Many1, err))),
        Err(e) => Err(e),
        Ok((i1, o)) => {
            let mut acc = ArrayVec::default();
            acc.push(o);
            i = i1;

            loop {
                let len = i.input_len();
                match f.parse(i.clone()) {
                    Err(Err::Error(_)) => return Ok((i, acc)),
                    Err(e) => return Err(e),
                    Ok((i1, o)) => {
                        // infinite loop check: the parser must always consume
                        if i1.input_len() == len {
                            return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
                        }

                        i = i1;
                        let _ = acc.try_push(o);
                    }
                }
            }
        }
    }
}

/// Read a `u8` length prefix followed by that many bytes.
pub fn length_u8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len)(input)
}

/// Read a `u16` length prefix followed by that many bytes.
pub fn length_u16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len)(input)
}

/// Read a `u24` length prefix followed by that many bytes.
pub fn length_u24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len)(input)
}

/// Fail unless the parser consumed everything it was given.
pub fn all_consumed(rest: &[u8]) -> Result<(), Err<Error<&[u8]>>> {
    if !rest.is_empty() {
        return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
    }
    Ok(())
}
