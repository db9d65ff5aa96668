use std::fmt::Debug;

use crate::PeerId;

/// Binds together the state handlers get to see on each side.
///
/// An application implements this on a marker type and registers all its messages against it.
pub trait Protocol: 'static {
    /// Handed to messages arriving at the initiator, typically the local session.
    type InitiatorContext: 'static;

    /// Handed to messages arriving at the responder, typically the simulation.
    type ResponderContext: 'static;
}

/// A message sent by initiators and handled by the responder.
pub trait ToResponder<P: Protocol>: Debug + Send + 'static {
    /// Handle this message on the responder's main context.
    ///
    /// `sender` is the initiator the message came from.
    fn handle(self: Box<Self>, ctx: &mut P::ResponderContext, sender: PeerId) -> anyhow::Result<()>;
}

/// A message sent by the responder and handled by initiators.
pub trait ToInitiator<P: Protocol>: Debug + Send + 'static {
    /// Handle this message on the initiator's main context.
    fn handle(self: Box<Self>, ctx: &mut P::InitiatorContext) -> anyhow::Result<()>;
}
