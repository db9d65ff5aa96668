//! The message registry.
//!
//! Every message type is registered once, at startup, against a named channel.  Registration assigns it an id which is
//! dense per channel and direction, in registration order, so both endpoints must register the same types in the same
//! order: there is no negotiation beyond the transport's compatibility token.  Registration happens on a
//! [RegistryBuilder]; [RegistryBuilder::build] seals it into a [Registry] which is shared read-only for the life of the
//! process.
//!
//! Decoding never downcasts.  Each registered type captures a decoder producing a boxed [ToResponder] or
//! [ToInitiator], and whoever receives it just calls `handle`.
mod errors;
mod message_registry;
mod peer;
mod protocol;
mod registry;
mod serializer;
#[cfg(test)]
mod tests;

pub use errors::*;
pub use message_registry::*;
pub use peer::*;
pub use protocol::*;
pub use registry::*;
pub use serializer::*;

pub use courier_framer::{Direction, MessageId, Role};
