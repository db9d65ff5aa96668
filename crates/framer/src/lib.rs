//! Wire formats for courier.
//!
//! There are two layers here, and it is important not to conflate them:
//!
//! - The envelope: a single [MessageId] byte followed by a serialized payload.  This is the protocol proper, and the
//!   id byte is the only self-describing part of it.  What the payload looks like is implied entirely by which message
//!   type the id resolves to, so there is no length prefix.
//! - The frame: what the in-memory transport uses to carry envelopes over a byte stream.  A frame is a varint length,
//!   a header naming the channel and the [SubChannelId], and then the envelope.  Real transports bring their own
//!   framing; this one exists so that the envelope layer can be exercised against actual message boundaries.
//!
//! Addressing is therefore two-level: (channel, sub-channel id in `{0, 1}`) at the transport, then the message id in
//! `0..=255` inside the envelope.
mod addressing;
mod envelope;
mod frame;
mod framer;
mod header;
mod parser;
mod varint;

pub use addressing::*;
pub use envelope::*;
pub use frame::*;
pub use framer::*;
pub use header::{HeaderDecodingError, HEADER_SIZE};
pub use parser::*;
pub use varint::VarintError;
