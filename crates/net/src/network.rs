use std::sync::Arc;

use log::*;

use courier_framer::{Direction, SubChannelId};
use courier_registry::{PeerId, Protocol, Registry, ToInitiator, ToResponder};

use crate::{
    AreaId, ChannelManager, Dispatcher, NetworkConfig, Point, RegionId, Result, SendError, Target,
    Transport, TransportChannel,
};

/// One endpoint of the protocol.
///
/// Build the [Registry] first, then the network, then open channels.  After that, sends can come from anywhere and
/// the main loop pumps [Network::dispatcher].
pub struct Network<P: Protocol, T: Transport> {
    config: NetworkConfig,
    registry: Arc<Registry<P>>,
    dispatcher: Arc<Dispatcher<P>>,
    channels: ChannelManager<P, T>,
}

impl<P: Protocol, T: Transport> Network<P, T> {
    /// Logs the registry's full id table, so that both peers' logs can be compared when they desynchronize.
    pub fn new(config: NetworkConfig, registry: Arc<Registry<P>>, transport: T) -> Self {
        info!(
            "Starting the {} endpoint with compatibility token {:?}",
            config.role(),
            config.compatibility_token()
        );
        registry.messages().log_summary();

        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), config.role()));
        let channels = ChannelManager::new(
            transport,
            registry.clone(),
            dispatcher.clone(),
            config.compatibility_token().to_string(),
        );
        Network {
            config,
            registry,
            dispatcher,
            channels,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry<P>> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<P>> {
        &self.dispatcher
    }

    pub fn channels(&self) -> &ChannelManager<P, T> {
        &self.channels
    }

    pub fn open_channel(&mut self, name: &str) -> Result<&T::Channel> {
        self.channels.open_channel(name)
    }

    pub fn open_all(&mut self) -> Result<()> {
        self.channels.open_all()
    }

    /// Check that this endpoint may send `M` as a `direction` message, and build its envelope.
    fn prepare<M: 'static>(
        &self,
        message: &M,
        direction: Direction,
    ) -> Result<(&T::Channel, SubChannelId, Vec<u8>)> {
        let message_type = self.registry.messages().resolve_id::<M>()?;
        if message_type.direction() != direction {
            return Err(SendError::WrongDirection {
                message_type: message_type.name(),
                registered: message_type.direction(),
            }
            .into());
        }

        if direction.sender() != self.config.role() {
            return Err(SendError::WrongRole {
                message_type: message_type.name(),
                role: self.config.role(),
            }
            .into());
        }

        let channel = self
            .channels
            .channel(message_type.channel())
            .ok_or_else(|| SendError::ChannelNotOpen(message_type.channel().to_string()))?;

        let mut envelope = vec![];
        self.registry.encode(message, &mut envelope)?;
        if envelope.len() > self.config.max_envelope_size() {
            return Err(SendError::EnvelopeTooLarge {
                size: envelope.len(),
                max: self.config.max_envelope_size(),
            }
            .into());
        }

        trace!(
            "Sending {} ({}, {} bytes) on channel {}",
            message_type.name(),
            message_type.id(),
            envelope.len(),
            message_type.channel()
        );
        Ok((channel, direction.sub_channel(), envelope))
    }

    /// Initiator only.
    pub fn send_to_responder<M: ToResponder<P>>(&self, message: &M) -> Result<()> {
        let (channel, sub, envelope) = self.prepare(message, Direction::ToResponder)?;
        channel.send_to_responder(sub, envelope)?;
        Ok(())
    }

    fn send_to_initiators<M: ToInitiator<P>>(&self, message: &M, target: &Target) -> Result<()> {
        let (channel, sub, envelope) = self.prepare(message, Direction::ToInitiator)?;
        channel.send_to_target(sub, target, envelope)?;
        Ok(())
    }

    /// Responder only.
    pub fn send_to_peer<M: ToInitiator<P>>(&self, message: &M, peer: PeerId) -> Result<()> {
        self.send_to_initiators(message, &Target::Peer(peer))
    }

    /// Responder only.
    pub fn send_to_all<M: ToInitiator<P>>(&self, message: &M) -> Result<()> {
        let (channel, sub, envelope) = self.prepare(message, Direction::ToInitiator)?;
        channel.send_to_all(sub, envelope)?;
        Ok(())
    }

    /// Responder only.
    pub fn send_to_all_around<M: ToInitiator<P>>(
        &self,
        message: &M,
        point: Point,
        radius: f64,
        region: RegionId,
    ) -> Result<()> {
        self.send_to_initiators(
            message,
            &Target::Near {
                point,
                radius,
                region,
            },
        )
    }

    /// Responder only.
    pub fn send_to_region<M: ToInitiator<P>>(&self, message: &M, region: RegionId) -> Result<()> {
        self.send_to_initiators(message, &Target::Region(region))
    }

    /// Responder only.
    pub fn send_to_tracking_area<M: ToInitiator<P>>(&self, message: &M, area: AreaId) -> Result<()> {
        self.send_to_initiators(message, &Target::TrackingArea(area))
    }

    /// Shorthand for [Dispatcher::run_responder_handlers].
    pub fn run_responder_handlers(&self, ctx: &mut P::ResponderContext) -> usize {
        self.dispatcher.run_responder_handlers(ctx)
    }

    /// Shorthand for [Dispatcher::run_initiator_handlers].
    pub fn run_initiator_handlers(&self, ctx: &mut P::InitiatorContext) -> usize {
        self.dispatcher.run_initiator_handlers(ctx)
    }
}
