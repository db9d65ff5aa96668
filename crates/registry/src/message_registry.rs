//! Ids for message types, per channel and direction.
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use courier_framer::{Direction, Envelope, MessageId};
use log::*;

use crate::{
    ConfigError, DesyncError, Protocol, Serializer, SerializerError, ToInitiator, ToResponder,
};

/// A registered message type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageType {
    name: &'static str,
    type_id: TypeId,
    channel: Arc<str>,
    direction: Direction,
    id: MessageId,
}

impl MessageType {
    /// Fully-qualified type name.  This is the stable identity of the type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn id(&self) -> MessageId {
        self.id
    }
}

type Decoder<T> = Box<dyn Fn(&mut &[u8]) -> Result<T, SerializerError> + Send + Sync>;

struct Registration<T> {
    message_type: MessageType,
    decode: Decoder<T>,
}

struct ChannelTable<P: Protocol> {
    name: Arc<str>,

    /// Indexed by id.
    to_initiator: Vec<Registration<Box<dyn ToInitiator<P>>>>,

    /// Indexed by id.
    to_responder: Vec<Registration<Box<dyn ToResponder<P>>>>,
}

impl<P: Protocol> ChannelTable<P> {
    fn len(&self, direction: Direction) -> usize {
        match direction {
            Direction::ToInitiator => self.to_initiator.len(),
            Direction::ToResponder => self.to_responder.len(),
        }
    }

    fn message_type(&self, direction: Direction, id: MessageId) -> Option<&MessageType> {
        match direction {
            Direction::ToInitiator => self.to_initiator.get(id.index()).map(|r| &r.message_type),
            Direction::ToResponder => self.to_responder.get(id.index()).map(|r| &r.message_type),
        }
    }

    fn message_types(&self, direction: Direction) -> Vec<&MessageType> {
        match direction {
            Direction::ToInitiator => self.to_initiator.iter().map(|r| &r.message_type).collect(),
            Direction::ToResponder => self.to_responder.iter().map(|r| &r.message_type).collect(),
        }
    }
}

/// A decoded envelope.
pub struct Decoded<'r, T> {
    pub message_type: &'r MessageType,
    pub message: T,
}

/// Maps message types to (channel, id) and back.
///
/// Populated by a [crate::RegistryBuilder] and read-only afterwards.
pub struct MessageRegistry<P: Protocol> {
    /// In declaration order.
    channels: Vec<ChannelTable<P>>,
    channel_index: HashMap<Arc<str>, usize>,
    by_type: HashMap<TypeId, MessageType>,
    by_name: HashMap<&'static str, TypeId>,
}

impl<P: Protocol> Default for MessageRegistry<P> {
    fn default() -> Self {
        MessageRegistry {
            channels: vec![],
            channel_index: Default::default(),
            by_type: Default::default(),
            by_name: Default::default(),
        }
    }
}

impl<P: Protocol> MessageRegistry<P> {
    pub(crate) fn declare_channel(&mut self, name: &str) -> Result<(), ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyChannelName);
        }

        if self.channel_index.contains_key(name) {
            return Err(ConfigError::DuplicateChannel(name.to_string()));
        }

        let name: Arc<str> = Arc::from(name);
        self.channel_index
            .insert(name.clone(), self.channels.len());
        self.channels.push(ChannelTable {
            name,
            to_initiator: vec![],
            to_responder: vec![],
        });
        Ok(())
    }

    /// Work out the descriptor the next registration of `M` would get, without registering it.
    fn next_message_type<M: 'static>(
        &self,
        channel: &str,
        direction: Direction,
    ) -> Result<(usize, MessageType), ConfigError> {
        let name = type_name::<M>();
        if self.by_type.contains_key(&TypeId::of::<M>()) {
            return Err(ConfigError::DuplicateMessageType(name));
        }

        let index = *self
            .channel_index
            .get(channel)
            .ok_or_else(|| ConfigError::UnknownChannel(channel.to_string()))?;
        let table = &self.channels[index];
        let id = MessageId::from_index(table.len(direction)).ok_or_else(|| {
            ConfigError::IdSpaceExhausted {
                channel: channel.to_string(),
                direction,
            }
        })?;

        Ok((
            index,
            MessageType {
                name,
                type_id: TypeId::of::<M>(),
                channel: table.name.clone(),
                direction,
                id,
            },
        ))
    }

    fn record(&mut self, message_type: &MessageType) {
        debug!(
            "Registered {} as {} on channel {} ({})",
            message_type.name, message_type.id, message_type.channel, message_type.direction
        );
        self.by_name
            .insert(message_type.name, message_type.type_id);
        self.by_type
            .insert(message_type.type_id, message_type.clone());
    }

    pub(crate) fn register_to_responder<M: ToResponder<P>>(
        &mut self,
        channel: &str,
        serializer: Arc<dyn Serializer<M>>,
    ) -> Result<MessageId, ConfigError> {
        let (index, message_type) = self.next_message_type::<M>(channel, Direction::ToResponder)?;
        let decode: Decoder<Box<dyn ToResponder<P>>> = Box::new(move |source: &mut &[u8]| {
            let message = serializer.decode(source)?;
            Ok(Box::new(message) as Box<dyn ToResponder<P>>)
        });

        self.record(&message_type);
        let id = message_type.id;
        self.channels[index].to_responder.push(Registration {
            message_type,
            decode,
        });
        Ok(id)
    }

    pub(crate) fn register_to_initiator<M: ToInitiator<P>>(
        &mut self,
        channel: &str,
        serializer: Arc<dyn Serializer<M>>,
    ) -> Result<MessageId, ConfigError> {
        let (index, message_type) = self.next_message_type::<M>(channel, Direction::ToInitiator)?;
        let decode: Decoder<Box<dyn ToInitiator<P>>> = Box::new(move |source: &mut &[u8]| {
            let message = serializer.decode(source)?;
            Ok(Box::new(message) as Box<dyn ToInitiator<P>>)
        });

        self.record(&message_type);
        let id = message_type.id;
        self.channels[index].to_initiator.push(Registration {
            message_type,
            decode,
        });
        Ok(id)
    }

    fn table(&self, channel: &str) -> Option<&ChannelTable<P>> {
        self.channel_index
            .get(channel)
            .map(|i| &self.channels[*i])
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.channel_index.contains_key(channel)
    }

    /// Channel names, in declaration order.
    pub fn iter_channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| &*c.name)
    }

    /// The types registered on a channel for a direction, in id order.
    pub fn message_types(
        &self,
        channel: &str,
        direction: Direction,
    ) -> Result<Vec<&MessageType>, ConfigError> {
        self.table(channel)
            .map(|t| t.message_types(direction))
            .ok_or_else(|| ConfigError::UnknownChannel(channel.to_string()))
    }

    /// Find the type an id refers to.
    ///
    /// Failure means the peers disagree about the registry.
    pub fn resolve_type(
        &self,
        channel: &str,
        direction: Direction,
        id: MessageId,
    ) -> Result<&MessageType, DesyncError> {
        let table = self
            .table(channel)
            .ok_or_else(|| DesyncError::UnknownChannel(channel.to_string()))?;
        table
            .message_type(direction, id)
            .ok_or_else(|| DesyncError::UnknownMessageId {
                channel: channel.to_string(),
                direction,
                id,
            })
    }

    /// Find the channel and id of a type, for sending.
    pub fn resolve_id<M: 'static>(&self) -> Result<&MessageType, ConfigError> {
        self.by_type
            .get(&TypeId::of::<M>())
            .ok_or_else(|| ConfigError::UnregisteredMessageType(type_name::<M>()))
    }

    /// Like [MessageRegistry::resolve_id], but by fully-qualified type name.
    pub fn resolve_id_by_name(&self, name: &str) -> Option<&MessageType> {
        self.by_name
            .get(name)
            .and_then(|t| self.by_type.get(t))
    }

    pub fn decode_to_responder(
        &self,
        channel: &str,
        bytes: &[u8],
    ) -> Result<Decoded<Box<dyn ToResponder<P>>>, DesyncError> {
        let table = self
            .table(channel)
            .ok_or_else(|| DesyncError::UnknownChannel(channel.to_string()))?;
        decode_envelope(&table.name, Direction::ToResponder, &table.to_responder, bytes)
    }

    pub fn decode_to_initiator(
        &self,
        channel: &str,
        bytes: &[u8],
    ) -> Result<Decoded<Box<dyn ToInitiator<P>>>, DesyncError> {
        let table = self
            .table(channel)
            .ok_or_else(|| DesyncError::UnknownChannel(channel.to_string()))?;
        decode_envelope(&table.name, Direction::ToInitiator, &table.to_initiator, bytes)
    }

    /// Log every channel and id at info.
    ///
    /// When a peer reports desynchronization, diffing this output from both sides finds the mismatch.
    pub fn log_summary(&self) {
        for table in self.channels.iter() {
            for direction in Direction::ALL {
                for mt in table.message_types(direction) {
                    info!(
                        "channel={} direction={} id={} type={}",
                        table.name, direction, mt.id, mt.name
                    );
                }
            }
        }
    }
}

/// Split the id off, resolve it, and decode the rest.
fn decode_envelope<'r, T>(
    channel: &str,
    direction: Direction,
    registrations: &'r [Registration<T>],
    bytes: &[u8],
) -> Result<Decoded<'r, T>, DesyncError> {
    let envelope = Envelope::decode(bytes).map_err(|_| DesyncError::EmptyEnvelope {
        channel: channel.to_string(),
        direction,
    })?;

    let registration =
        registrations
            .get(envelope.id.index())
            .ok_or_else(|| DesyncError::UnknownMessageId {
                channel: channel.to_string(),
                direction,
                id: envelope.id,
            })?;

    let message_type = &registration.message_type;
    let mut payload = &envelope.payload[..];
    let message = (registration.decode)(&mut payload).map_err(|source| DesyncError::Payload {
        message_type: message_type.name,
        source,
    })?;

    if !payload.is_empty() {
        return Err(DesyncError::TrailingBytes {
            message_type: message_type.name,
            remaining: payload.len(),
        });
    }

    Ok(Decoded {
        message_type,
        message,
    })
}
