use std::collections::HashMap;
use std::sync::Arc;

use log::*;

use courier_framer::Direction;
use courier_registry::{ConfigError, Protocol, Registry};

use crate::dispatcher::SubChannelSink;
use crate::{Dispatcher, Result, Transport, TransportChannel};

/// Owns one transport binding per open channel.
///
/// Opening a channel binds both of its sub-channels to the dispatcher.  Channels are opened during startup and stay
/// open for the life of the manager.
pub struct ChannelManager<P: Protocol, T: Transport> {
    transport: T,
    registry: Arc<Registry<P>>,
    dispatcher: Arc<Dispatcher<P>>,
    compatibility_token: String,
    open: HashMap<Arc<str>, T::Channel>,
}

impl<P: Protocol, T: Transport> ChannelManager<P, T> {
    pub fn new(
        transport: T,
        registry: Arc<Registry<P>>,
        dispatcher: Arc<Dispatcher<P>>,
        compatibility_token: String,
    ) -> Self {
        ChannelManager {
            transport,
            registry,
            dispatcher,
            compatibility_token,
            open: Default::default(),
        }
    }

    /// Open a channel declared in the registry.
    ///
    /// Opening an already-open channel returns the existing binding without asking the transport for a second one.
    pub fn open_channel(&mut self, name: &str) -> Result<&T::Channel> {
        if !self.registry.messages().has_channel(name) {
            return Err(ConfigError::UnknownChannel(name.to_string()).into());
        }

        if self.open.contains_key(name) {
            warn!("Channel {} is already open; keeping the existing binding", name);
            return Ok(&self.open[name]);
        }

        info!(
            "Opening channel {} as the {} with compatibility token {:?}",
            name,
            self.dispatcher.role(),
            self.compatibility_token
        );
        let channel = self
            .transport
            .open_channel(name, &self.compatibility_token)?;

        let name: Arc<str> = Arc::from(name);
        for (bound, direction) in Direction::ALL.into_iter().enumerate() {
            let sink = SubChannelSink {
                dispatcher: self.dispatcher.clone(),
                channel: name.clone(),
                direction,
            };
            if let Err(e) = channel.bind(direction.sub_channel(), Arc::new(sink)) {
                // Leave nothing half-bound, so the open can be retried.
                for earlier in &Direction::ALL[..bound] {
                    channel.unbind(earlier.sub_channel());
                }
                return Err(e.into());
            }
        }

        self.open.insert(name.clone(), channel);
        Ok(&self.open[&*name])
    }

    /// Open every channel in the registry, in declaration order.
    pub fn open_all(&mut self) -> Result<()> {
        let names = self
            .registry
            .messages()
            .iter_channels()
            .map(|c| c.to_string())
            .collect::<Vec<_>>();
        for name in names {
            self.open_channel(&name)?;
        }
        Ok(())
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.open.contains_key(name)
    }

    pub fn channel(&self, name: &str) -> Option<&T::Channel> {
        self.open.get(name)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
