use courier_framer::{Direction, MessageId};

use crate::SerializerError;

/// Mistakes made while registering.  All of them should abort startup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Channel names may not be empty")]
    EmptyChannelName,

    #[error("Channel {0} was declared twice")]
    DuplicateChannel(String),

    #[error("Channel {0} was never declared")]
    UnknownChannel(String),

    #[error("Message type {0} was registered twice")]
    DuplicateMessageType(&'static str),

    #[error("Message type {0} was never registered")]
    UnregisteredMessageType(&'static str),

    #[error("A second serializer was bound for {0}")]
    DuplicateSerializer(&'static str),

    #[error("No serializer is bound for {0}")]
    MissingSerializer(&'static str),

    #[error("Channel {channel} has no ids left for {direction} messages")]
    IdSpaceExhausted {
        channel: String,
        direction: Direction,
    },
}

/// An envelope that can't be made sense of.
///
/// This means the peers disagree about the registry, and nothing else from that peer on that channel can be trusted
/// either.  Never retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DesyncError {
    #[error("Empty envelope on channel {channel} ({direction})")]
    EmptyEnvelope {
        channel: String,
        direction: Direction,
    },

    #[error("Envelope arrived on undeclared channel {0}")]
    UnknownChannel(String),

    #[error("No message type has id {id} on channel {channel} ({direction})")]
    UnknownMessageId {
        channel: String,
        direction: Direction,
        id: MessageId,
    },

    #[error("Payload of {message_type} failed to decode: {source}")]
    Payload {
        message_type: &'static str,
        source: SerializerError,
    },

    #[error("{remaining} bytes left over after decoding {message_type}")]
    TrailingBytes {
        message_type: &'static str,
        remaining: usize,
    },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Configuration error: {}", _0)]
    Config(#[from] ConfigError),

    #[error("Protocol desynchronization: {}", _0)]
    Desync(#[from] DesyncError),

    #[error("Could not encode {message_type}: {source}")]
    Encode {
        message_type: &'static str,
        source: SerializerError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
