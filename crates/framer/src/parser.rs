use std::borrow::Cow;

use crate::frame::Frame;
use crate::header::{self, HEADER_SIZE};
use crate::varint::{self, VarintError};

/// A parser parses frames.
///
/// Call [Parser::feed] with some data, then alternate [Parser::read_frame] and [Parser::roll_forward] until
/// `read_frame` asks for more data.
///
/// It is fine to feed partial frames or several frames at once; leftovers are kept for the next call.
pub struct Parser {
    length_limit: Option<u64>,
    cap_limit: usize,
    buffer: Vec<u8>,
}

pub enum ParserOutcome<'a> {
    Frame(Frame<'a>),

    /// More data is required.  Contains a lower bound on how much, or 0 if even the length isn't known yet.
    MoreDataRequired(u64),
}

#[derive(Debug, derive_more::Display, thiserror::Error)]
#[non_exhaustive]
pub enum ParserError {
    FrameTooLong,

    /// A frame claims to contain less data than a header.
    FrameTooShort,

    /// [Parser::roll_forward] was called without a complete frame in the buffer.
    NoFrame,

    HeaderDecodingError(#[from] header::HeaderDecodingError),

    VarintError(#[from] VarintError),
}

impl Parser {
    /// Create a parser.
    ///
    /// `length_limit` is an optional limit on the length of frames.  `cap_limit` is a limit on the size of the internal
    /// buffer when it's empty (individual frames can be longer).
    pub fn new(length_limit: Option<u64>, cap_limit: usize) -> Parser {
        Parser {
            length_limit,
            cap_limit,
            buffer: Vec::with_capacity(cap_limit),
        }
    }

    /// Feed the parser with some bytes.
    ///
    /// Fails early if the frame at the front of the buffer is already known to be over the length limit.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), ParserError> {
        self.buffer.extend_from_slice(bytes);

        if let Some(limit) = self.length_limit {
            let length_so_far = match varint::decode_varint(&mut &self.buffer[..]) {
                Ok(l) | Err(VarintError::Incomplete(l)) => l,
                Err(VarintError::NoData) => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            if length_so_far > limit {
                return Err(ParserError::FrameTooLong);
            }
        }

        Ok(())
    }

    /// Try to read a frame.  The frame borrows from the parser.
    pub fn read_frame(&self) -> Result<ParserOutcome, ParserError> {
        let mut buf = &self.buffer[..];
        let length = match varint::decode_varint(&mut buf) {
            Ok(l) => l,
            // Varints carry no length of their own, so we can't say how much more we need.
            Err(VarintError::NoData) | Err(VarintError::Incomplete(_)) => {
                return Ok(ParserOutcome::MoreDataRequired(0))
            }
            Err(e) => return Err(e.into()),
        };

        if length < HEADER_SIZE {
            return Err(ParserError::FrameTooShort);
        }

        if matches!(self.length_limit, Some(l) if length > l) {
            return Err(ParserError::FrameTooLong);
        }

        if (buf.len() as u64) < length {
            return Ok(ParserOutcome::MoreDataRequired(length - buf.len() as u64));
        }

        let header = header::Header::decode(&mut buf)?;
        let data_len = (length - HEADER_SIZE) as usize;
        Ok(ParserOutcome::Frame(Frame {
            channel: header.channel,
            sub_channel: header.sub_channel,
            data: Cow::Borrowed(&buf[..data_len]),
        }))
    }

    /// Roll forward past the first frame in this parser.  Should only be called after read_frame returns a frame.
    pub fn roll_forward(&mut self) -> Result<(), ParserError> {
        let mut buf = &self.buffer[..];
        let length = varint::decode_varint(&mut buf).map_err(|_| ParserError::NoFrame)?;
        let var_len = self.buffer.len() - buf.len();
        let total_len = var_len + length as usize;
        if total_len > self.buffer.len() {
            return Err(ParserError::NoFrame);
        }

        self.buffer.drain(..total_len);
        self.buffer.shrink_to(self.cap_limit);
        Ok(())
    }

    /// Number of bytes waiting in this parser.
    ///
    /// Decreases when [Parser::roll_forward] is called.
    pub fn contained_bytes(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_limit() {
        let mut parser = Parser::new(Some(10), 1024);

        // 11 bytes claimed: a to-initiator header for slot 0, then zeroes.
        let data = vec![11, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = parser.feed(&data[..]).err().expect("should be error");
        assert!(matches!(err, ParserError::FrameTooLong));
    }

    #[test]
    fn test_too_short() {
        let mut parser = Parser::new(None, 1024);
        parser.feed(&[2, 0, 0]).unwrap();
        assert!(matches!(
            parser.read_frame(),
            Err(ParserError::FrameTooShort)
        ));
    }

    #[test]
    fn test_partial_frame() {
        let mut parser = Parser::new(None, 1024);
        parser.feed(&[5, 1, 0]).unwrap();
        assert!(matches!(
            parser.read_frame(),
            Ok(ParserOutcome::MoreDataRequired(3))
        ));
        assert!(matches!(parser.roll_forward(), Err(ParserError::NoFrame)));

        parser.feed(&[7, 0xaa, 0xbb]).unwrap();
        match parser.read_frame().unwrap() {
            ParserOutcome::Frame(f) => {
                assert_eq!(f.channel, 7);
                assert_eq!(f.sub_channel, crate::SubChannelId::TO_RESPONDER);
                assert_eq!(&f.data[..], &[0xaa, 0xbb]);
            }
            ParserOutcome::MoreDataRequired(_) => panic!("Should have a frame"),
        }
        parser.roll_forward().unwrap();
        assert_eq!(parser.contained_bytes(), 0);
    }

    #[test]
    fn test_bad_sub_channel() {
        let mut parser = Parser::new(None, 1024);
        parser.feed(&[3, 9, 0, 0]).unwrap();
        assert!(matches!(
            parser.read_frame(),
            Err(ParserError::HeaderDecodingError(_))
        ));
    }
}
