//! Parser for the comma-separated address list in `X-Forwarded-For`.
//!
//! The list is tokenized loosely: any run of commas and whitespace
//! separates entries, and entries are not validated as addresses.

use nom::bytes::complete::{take_while, take_while1};
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::{Finish, IResult, InputLength};

const fn is_delimiter(c: u8) -> bool {
    c == b',' || c == b' ' || c == b'\t'
}

const fn is_address(c: u8) -> bool {
    !is_delimiter(c)
}

/// Split an `X-Forwarded-For` value into its address tokens.
pub(crate) fn address_list(value: &[u8]) -> Result<Vec<&[u8]>, nom::error::Error<&[u8]>> {
    delimited(
        take_while(is_delimiter),
        separated_list0(take_while1(is_delimiter), take_while1(is_address)),
        take_while(is_delimiter),
    )(value)
    .no_tail()
}

pub(crate) trait NoTail<O, E> {
    fn no_tail(self) -> Result<O, E>;
}

impl<I, O> NoTail<O, nom::error::Error<I>> for IResult<I, O>
where
    I: InputLength,
{
    fn no_tail(self) -> Result<O, nom::error::Error<I>> {
        match self.finish() {
            Ok((i, o)) if i.input_len() == 0 => Ok(o),
            Ok((i, _)) => Err(nom::error::Error::new(i, nom::error::ErrorKind::Eof)),
            Err(e) => Err(e),
        }
    }
}
