//! The envelope: one id byte, then the payload.
use std::borrow::Cow;

use bytes::BufMut;

use crate::addressing::MessageId;

#[derive(Debug, Eq, PartialEq, derive_more::Display, thiserror::Error)]
#[non_exhaustive]
pub enum EnvelopeError {
    /// There wasn't even an id byte.
    Empty,
}

/// An envelope on the wire.
///
/// The payload is opaque at this layer.  Decoding it requires resolving [Envelope::id] against the message registry
/// for the channel and direction the envelope arrived on.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Envelope<'a> {
    pub id: MessageId,
    pub payload: Cow<'a, [u8]>,
}

impl<'a> Envelope<'a> {
    pub fn new(id: MessageId, payload: Cow<'a, [u8]>) -> Envelope<'a> {
        Envelope { id, payload }
    }

    pub fn encode(&self, dest: &mut impl BufMut) {
        dest.put_u8(self.id.0);
        dest.put_slice(&self.payload);
    }

    /// Split raw bytes into the id and the payload.  Borrows from the source.
    pub fn decode(source: &'a [u8]) -> Result<Envelope<'a>, EnvelopeError> {
        let (id, payload) = source.split_first().ok_or(EnvelopeError::Empty)?;
        Ok(Envelope {
            id: MessageId(*id),
            payload: Cow::Borrowed(payload),
        })
    }

    /// Length on the wire.
    pub fn len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Envelopes always carry an id, so are never empty on the wire.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn into_static(self) -> Envelope<'static> {
        Envelope {
            id: self.id,
            payload: Cow::Owned(self.payload.into_owned()),
        }
    }
}

/// Write an envelope whose payload is produced by a serializer, without an intermediate buffer.
///
/// If `write_payload` fails, `dest` is truncated back to where it was.
pub fn encode_envelope_with<E>(
    id: MessageId,
    dest: &mut Vec<u8>,
    write_payload: impl FnOnce(&mut Vec<u8>) -> Result<(), E>,
) -> Result<(), E> {
    let start = dest.len();
    dest.put_u8(id.0);
    if let Err(e) = write_payload(dest) {
        dest.truncate(start);
        return Err(e);
    }
    Ok(())
}
