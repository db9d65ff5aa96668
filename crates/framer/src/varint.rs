//! LEB128-style varints, used for frame lengths.
use bytes::{Buf, BufMut};

/// Number of bytes needed to encode any u64.
pub(crate) const MAX_BYTES: usize = 10;

#[derive(Debug, Eq, PartialEq, thiserror::Error, derive_more::Display)]
#[non_exhaustive]
pub enum VarintError {
    /// The input buffer was empty.
    NoData,

    /// The varint doesn't fit in a u64.
    TooLong,

    /// The varint isn't complete yet.  Contains the partial value.
    Incomplete(u64),
}

/// Write `input` 7 bits at a time, least significant group first.
pub(crate) fn encode_varint(mut input: u64, dest: &mut impl BufMut) {
    while input >= 0x80 {
        dest.put_u8((input as u8 & 0x7f) | 0x80);
        input >>= 7;
    }
    dest.put_u8(input as u8);
}

/// Read a varint written by [encode_varint], advancing `input` past it.
pub(crate) fn decode_varint(input: &mut impl Buf) -> Result<u64, VarintError> {
    if !input.has_remaining() {
        return Err(VarintError::NoData);
    }

    let mut res: u64 = 0;
    for i in 0..MAX_BYTES {
        if !input.has_remaining() {
            return Err(VarintError::Incomplete(res));
        }

        let byte = input.get_u8();
        let group = (byte & 0x7f) as u64;
        let shift = 7 * i as u32;

        // The last byte only has room for the top bit of a u64.
        if i == MAX_BYTES - 1 && group > 1 {
            return Err(VarintError::TooLong);
        }
        res |= group << shift;

        if byte & 0x80 == 0 {
            return Ok(res);
        }
    }

    Err(VarintError::TooLong)
}

/// Encoded length of `input`.
pub(crate) fn varint_len(input: u64) -> usize {
    let bits = 64 - input.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
