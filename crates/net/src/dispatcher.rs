//! Inbound dispatch.
//!
//! Each envelope goes through the same steps: the id is split off, resolved to a type for the channel and direction it
//! arrived on, and the payload decoded, all on the transport's thread since the registry is immutable.  The decoded
//! message is then queued, and handlers run only when the application pumps the dispatcher from its main loop.
//! Handlers are therefore never reentrant with respect to application state.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::*;

use courier_framer::{Direction, Role};
use courier_registry::{PeerId, Protocol, Registry, ToInitiator, ToResponder};

use crate::{DispatchError, InboundSink};

struct ForResponder<P: Protocol> {
    sender: PeerId,
    type_name: &'static str,
    message: Box<dyn ToResponder<P>>,
}

struct ForInitiator<P: Protocol> {
    type_name: &'static str,
    message: Box<dyn ToInitiator<P>>,
}

pub struct Dispatcher<P: Protocol> {
    registry: Arc<Registry<P>>,
    role: Role,
    responder_tx: Sender<ForResponder<P>>,
    responder_rx: Receiver<ForResponder<P>>,
    initiator_tx: Sender<ForInitiator<P>>,
    initiator_rx: Receiver<ForInitiator<P>>,

    /// Envelopes dropped because they could not be decoded.
    desyncs: AtomicU64,
}

impl<P: Protocol> Dispatcher<P> {
    pub fn new(registry: Arc<Registry<P>>, role: Role) -> Dispatcher<P> {
        let (responder_tx, responder_rx) = unbounded();
        let (initiator_tx, initiator_rx) = unbounded();
        Dispatcher {
            registry,
            role,
            responder_tx,
            responder_rx,
            initiator_tx,
            initiator_rx,
            desyncs: AtomicU64::new(0),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Decode one envelope and queue it for handling.
    ///
    /// Any error means the envelope was dropped.  Desynchronization is logged here; the transport decides what else
    /// to do about the peer.
    pub fn dispatch(
        &self,
        channel: &str,
        direction: Direction,
        sender: Option<PeerId>,
        envelope: &[u8],
    ) -> Result<(), DispatchError> {
        let res = self.dispatch_inner(channel, direction, sender, envelope);
        if let Err(e) = &res {
            if matches!(e, DispatchError::Desync(_)) {
                self.desyncs.fetch_add(1, Ordering::Relaxed);
            }
            error!(
                "Dropping {} envelope of {} bytes on channel {} from {}: {}",
                direction,
                envelope.len(),
                channel,
                sender.map_or_else(|| "the responder".to_string(), |s| s.to_string()),
                e
            );
        }
        res
    }

    fn dispatch_inner(
        &self,
        channel: &str,
        direction: Direction,
        sender: Option<PeerId>,
        envelope: &[u8],
    ) -> Result<(), DispatchError> {
        if direction.receiver() != self.role {
            return Err(DispatchError::WrongRole {
                channel: channel.to_string(),
                direction,
                role: self.role,
            });
        }

        match direction {
            Direction::ToResponder => {
                let sender = sender
                    .ok_or_else(|| DispatchError::MissingSender(direction, channel.to_string()))?;
                let decoded = self.registry.decode_to_responder(channel, envelope)?;
                trace!(
                    "Queueing {} ({}) from {} on channel {}",
                    decoded.message_type.name(),
                    decoded.message_type.id(),
                    sender,
                    channel
                );
                // The receiver lives in self, so this can't fail.
                let _ = self.responder_tx.send(ForResponder {
                    sender,
                    type_name: decoded.message_type.name(),
                    message: decoded.message,
                });
                Ok(())
            }
            Direction::ToInitiator => {
                let decoded = self.registry.decode_to_initiator(channel, envelope)?;
                trace!(
                    "Queueing {} ({}) on channel {}",
                    decoded.message_type.name(),
                    decoded.message_type.id(),
                    channel
                );
                // The receiver lives in self, so this can't fail.
                let _ = self.initiator_tx.send(ForInitiator {
                    type_name: decoded.message_type.name(),
                    message: decoded.message,
                });
                Ok(())
            }
        }
    }

    /// Run the handlers of every responder-bound message queued so far.  Returns how many ran.
    ///
    /// Messages arriving while this runs wait for the next call, so a busy transport can't starve the caller.  Handler
    /// failures are logged and don't stop the others.
    pub fn run_responder_handlers(&self, ctx: &mut P::ResponderContext) -> usize {
        let pending = self.responder_rx.len();
        let mut ran = 0;
        for m in self.responder_rx.try_iter().take(pending) {
            if let Err(e) = m.message.handle(ctx, m.sender) {
                error!("Handler for {} from {} failed: {:?}", m.type_name, m.sender, e);
            }
            ran += 1;
        }
        ran
    }

    /// Run the handlers of every initiator-bound message queued so far.  Returns how many ran.
    pub fn run_initiator_handlers(&self, ctx: &mut P::InitiatorContext) -> usize {
        let pending = self.initiator_rx.len();
        let mut ran = 0;
        for m in self.initiator_rx.try_iter().take(pending) {
            if let Err(e) = m.message.handle(ctx) {
                error!("Handler for {} failed: {:?}", m.type_name, e);
            }
            ran += 1;
        }
        ran
    }

    /// Number of messages waiting for a handler.
    pub fn pending(&self) -> usize {
        self.responder_rx.len() + self.initiator_rx.len()
    }

    /// Number of envelopes dropped because they didn't match the registry.
    ///
    /// Anything above zero means the peers disagree about the protocol.
    pub fn desync_count(&self) -> u64 {
        self.desyncs.load(Ordering::Relaxed)
    }
}

/// Binds one sub-channel of one channel to a dispatcher.
pub(crate) struct SubChannelSink<P: Protocol> {
    pub(crate) dispatcher: Arc<Dispatcher<P>>,
    pub(crate) channel: Arc<str>,
    pub(crate) direction: Direction,
}

impl<P: Protocol> InboundSink for SubChannelSink<P> {
    fn receive(&self, sender: Option<PeerId>, envelope: &[u8]) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(&self.channel, self.direction, sender, envelope)
    }
}
