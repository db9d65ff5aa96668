//! Frame headers.
//!
//! On the wire this is the sub-channel id as a u8 and then the channel slot as a big-endian u16.
use bytes::{Buf, BufMut};

use crate::addressing::SubChannelId;

/// Size of the header, excluding the length.
pub const HEADER_SIZE: u64 = 3;

#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Debug)]
pub(crate) struct Header {
    pub(crate) sub_channel: SubChannelId,
    pub(crate) channel: u16,
}

#[derive(Debug, Eq, PartialEq, derive_more::Display, thiserror::Error)]
#[non_exhaustive]
pub enum HeaderDecodingError {
    NotEnoughData,
    InvalidSubChannel(u8),
}

impl Header {
    pub(crate) fn encode(&self, dest: &mut impl BufMut) {
        dest.put_u8(self.sub_channel.as_u8());
        dest.put_u16(self.channel);
    }

    pub(crate) fn decode(source: &mut impl Buf) -> Result<Header, HeaderDecodingError> {
        if (source.remaining() as u64) < HEADER_SIZE {
            return Err(HeaderDecodingError::NotEnoughData);
        }

        let raw = source.get_u8();
        let sub_channel =
            SubChannelId::from_raw(raw).ok_or(HeaderDecodingError::InvalidSubChannel(raw))?;
        let channel = source.get_u16();

        Ok(Header {
            sub_channel,
            channel,
        })
    }
}
