use courier_framer::{Direction, Role, SubChannelId};
use courier_registry::{ConfigError, DesyncError, PeerId};

/// Failures reported by a transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("Channel {channel} refused: compatibility token {ours:?} does not match the peer's {theirs:?}")]
    Incompatible {
        channel: String,
        ours: String,
        theirs: String,
    },

    #[error("The peer does not offer channel {0}")]
    NotOffered(String),

    #[error("{1} of channel {0} is already bound")]
    AlreadyBound(String, SubChannelId),

    #[error("{0} is not connected")]
    UnknownPeer(PeerId),

    #[error("The {role} can't {operation}")]
    Unsupported {
        role: Role,
        operation: &'static str,
    },

    #[error("Transport error: {0}")]
    Other(String),
}

/// Why an inbound envelope was dropped.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("{direction} envelope on channel {channel} arrived at the {role}")]
    WrongRole {
        channel: String,
        direction: Direction,
        role: Role,
    },

    #[error("{0} envelope on channel {1} has no sender")]
    MissingSender(Direction, String),

    #[error("{}", _0)]
    Desync(#[from] DesyncError),
}

/// Why a message wasn't sent.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SendError {
    #[error("The {role} may not send {message_type}")]
    WrongRole {
        message_type: &'static str,
        role: Role,
    },

    #[error("{message_type} is registered as a {registered} message")]
    WrongDirection {
        message_type: &'static str,
        registered: Direction,
    },

    #[error("Envelope of {size} bytes exceeds the limit of {max}")]
    EnvelopeTooLarge { size: usize, max: usize },

    #[error("Channel {0} is not open")]
    ChannelNotOpen(String),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Registry error: {}", _0)]
    Registry(#[from] courier_registry::Error),

    #[error("Transport error: {}", _0)]
    Transport(#[from] TransportError),

    #[error("Send error: {}", _0)]
    Send(#[from] SendError),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Registry(e.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
