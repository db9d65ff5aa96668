use std::sync::Arc;

use courier_framer::{encode_envelope_with, MessageId};
use log::*;

use crate::{
    ConfigError, Decoded, DesyncError, Error, MessageRegistry, MessageType, Protocol, Result,
    Serializer, SerializerRegistry, ToInitiator, ToResponder,
};

/// Collects channels, serializers, and message types during startup.
///
/// Every method fails on configuration mistakes; callers should treat any error as fatal and not carry on with a
/// partially built registry.  [RegistryBuilder::build] seals the result.
pub struct RegistryBuilder<P: Protocol> {
    messages: MessageRegistry<P>,
    serializers: SerializerRegistry,
}

/// The sealed registry.
///
/// Immutable, `Send + Sync`, and typically shared via `Arc` between the channel manager and every transport thread
/// decoding traffic.
pub struct Registry<P: Protocol> {
    messages: MessageRegistry<P>,
    serializers: SerializerRegistry,
}

impl<P: Protocol> Default for RegistryBuilder<P> {
    fn default() -> Self {
        RegistryBuilder {
            messages: Default::default(),
            serializers: Default::default(),
        }
    }
}

impl<P: Protocol> RegistryBuilder<P> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn declare_channel(&mut self, name: &str) -> Result<(), ConfigError> {
        self.messages.declare_channel(name)
    }

    pub fn bind_serializer<M: 'static>(
        &mut self,
        serializer: impl Serializer<M>,
    ) -> Result<(), ConfigError> {
        self.serializers.bind(serializer)
    }

    /// Register a message type handled by the responder, using its already-bound serializer.
    ///
    /// Returns the assigned id: the number of to-responder types registered on this channel before it.
    pub fn register_to_responder<M: ToResponder<P>>(
        &mut self,
        channel: &str,
    ) -> Result<MessageId, ConfigError> {
        let serializer = self.serializers.get::<M>()?;
        self.messages.register_to_responder(channel, serializer)
    }

    /// Register a message type handled by initiators, using its already-bound serializer.
    pub fn register_to_initiator<M: ToInitiator<P>>(
        &mut self,
        channel: &str,
    ) -> Result<MessageId, ConfigError> {
        let serializer = self.serializers.get::<M>()?;
        self.messages.register_to_initiator(channel, serializer)
    }

    /// Bind a serializer and register in one go.
    pub fn register_to_responder_with<M: ToResponder<P>>(
        &mut self,
        channel: &str,
        serializer: impl Serializer<M>,
    ) -> Result<MessageId, ConfigError> {
        self.ensure_unregistered::<M>()?;
        self.bind_serializer(serializer)?;
        self.register_to_responder::<M>(channel)
    }

    /// Bind a serializer and register in one go.
    pub fn register_to_initiator_with<M: ToInitiator<P>>(
        &mut self,
        channel: &str,
        serializer: impl Serializer<M>,
    ) -> Result<MessageId, ConfigError> {
        self.ensure_unregistered::<M>()?;
        self.bind_serializer(serializer)?;
        self.register_to_initiator::<M>(channel)
    }

    fn ensure_unregistered<M: 'static>(&self) -> Result<(), ConfigError> {
        match self.messages.resolve_id::<M>() {
            Ok(mt) => Err(ConfigError::DuplicateMessageType(mt.name())),
            Err(_) => Ok(()),
        }
    }

    /// Seal the registry.  No registration can happen after this.
    pub fn build(self) -> Registry<P> {
        for name in self.serializers.iter_names() {
            if self.messages.resolve_id_by_name(name).is_none() {
                warn!("Serializer for {} is bound but the type was never registered", name);
            }
        }

        Registry {
            messages: self.messages,
            serializers: self.serializers,
        }
    }

    /// Seal the registry into an `Arc`, which is how everything downstream wants it.
    pub fn build_shared(self) -> Arc<Registry<P>> {
        Arc::new(self.build())
    }
}

impl<P: Protocol> Registry<P> {
    pub fn messages(&self) -> &MessageRegistry<P> {
        &self.messages
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Append the envelope for `message` to `dest`, returning the type it was sent as.
    ///
    /// On failure `dest` is left as it was.
    pub fn encode<M: 'static>(&self, message: &M, dest: &mut Vec<u8>) -> Result<&MessageType> {
        let message_type = self.messages.resolve_id::<M>()?;
        let serializer = self.serializers.get::<M>()?;
        encode_envelope_with(message_type.id(), dest, |d| serializer.encode(message, d)).map_err(
            |source| Error::Encode {
                message_type: message_type.name(),
                source,
            },
        )?;
        Ok(message_type)
    }

    pub fn decode_to_responder(
        &self,
        channel: &str,
        bytes: &[u8],
    ) -> Result<Decoded<Box<dyn ToResponder<P>>>, DesyncError> {
        self.messages.decode_to_responder(channel, bytes)
    }

    pub fn decode_to_initiator(
        &self,
        channel: &str,
        bytes: &[u8],
    ) -> Result<Decoded<Box<dyn ToInitiator<P>>>, DesyncError> {
        self.messages.decode_to_initiator(channel, bytes)
    }
}
