use bytes::BufMut;

use crate::frame::Frame;
use crate::header::{Header, HEADER_SIZE};
use crate::varint;

/// A framer writes frames to an internal buffer, then hands them out on request.
///
/// Call [Framer::add_frame] for each frame in a batch, read the bytes with [Framer::get_data] and send them, then
/// [Framer::clear] before the next batch.
pub struct Framer {
    cap_limit: usize,
    buffer: Vec<u8>,
}

impl Framer {
    /// Create a framer.
    ///
    /// `cap_limit` is the capacity the internal buffer shrinks back to after clearing, so that one huge batch doesn't
    /// pin memory forever.
    pub fn new(cap_limit: usize) -> Framer {
        Framer {
            cap_limit,
            buffer: Vec::with_capacity(cap_limit),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.buffer.shrink_to(self.cap_limit);
    }

    pub fn add_frame(&mut self, frame: &Frame) {
        let header = Header {
            sub_channel: frame.sub_channel,
            channel: frame.channel,
        };

        let length = HEADER_SIZE + frame.data.len() as u64;
        self.buffer
            .reserve(varint::varint_len(length) + length as usize);
        varint::encode_varint(length, &mut self.buffer);
        header.encode(&mut self.buffer);
        self.buffer.put_slice(&frame.data);
    }

    pub fn get_data(&self) -> &[u8] {
        &self.buffer[..]
    }
}
