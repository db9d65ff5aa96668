//! The transport boundary.
//!
//! Courier hands transports finished envelopes and a [SubChannelId]; transports hand courier raw envelope bytes.
//! Everything about connections, reliability, and target resolution is theirs.
use std::sync::Arc;

use courier_framer::SubChannelId;
use courier_registry::PeerId;

use crate::{DispatchError, Target, TransportError};

/// Something which can open named channels.
pub trait Transport: Send + Sync + 'static {
    type Channel: TransportChannel;

    /// Open a channel.
    ///
    /// The transport must compare `compatibility_token` literally with the peer's and refuse the channel with
    /// [TransportError::Incompatible] on any difference.
    fn open_channel(
        &self,
        name: &str,
        compatibility_token: &str,
    ) -> Result<Self::Channel, TransportError>;
}

/// One open channel.
pub trait TransportChannel: Send + Sync + 'static {
    /// Route envelopes arriving on `sub_channel` to `sink`.  Each sub-channel may be bound once.
    fn bind(&self, sub_channel: SubChannelId, sink: Arc<dyn InboundSink>)
        -> Result<(), TransportError>;

    /// Drop whatever is bound to `sub_channel`, if anything.
    fn unbind(&self, sub_channel: SubChannelId);

    /// Responder only.
    fn send_to_target(
        &self,
        sub_channel: SubChannelId,
        target: &Target,
        envelope: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Responder only: every connected initiator.
    fn send_to_all(&self, sub_channel: SubChannelId, envelope: Vec<u8>)
        -> Result<(), TransportError>;

    /// Initiator only.
    fn send_to_responder(
        &self,
        sub_channel: SubChannelId,
        envelope: Vec<u8>,
    ) -> Result<(), TransportError>;
}

/// Receives the envelopes of one sub-channel.
///
/// Called on whatever thread the transport does I/O on.  An error means the envelope was dropped; the transport should
/// log it and may treat the sender as suspect.
pub trait InboundSink: Send + Sync + 'static {
    /// `sender` is the initiator the envelope came from, when the responder is receiving.
    fn receive(&self, sender: Option<PeerId>, envelope: &[u8]) -> Result<(), DispatchError>;
}
