use derive_more::Display;

/// Identity of a connected initiator, as seen by the responder.
///
/// Assigned by the transport.  Courier never interprets it; it is handed to responder-side handlers so they can reply
/// to, or act on behalf of, whoever sent the message.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display(fmt = "peer {}", _0)]
pub struct PeerId(pub u64);
