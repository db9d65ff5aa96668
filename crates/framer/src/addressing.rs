use derive_more::Display;

/// The two protocol roles.
///
/// The initiator is the client-like side which connects; the responder is the server-like side which many initiators
/// connect to.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Role {
    #[display(fmt = "initiator")]
    Initiator,
    #[display(fmt = "responder")]
    Responder,
}

/// Which way a message travels, relative to the roles.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Direction {
    /// Responder to initiator.
    #[display(fmt = "to-initiator")]
    ToInitiator,

    /// Initiator to responder.
    #[display(fmt = "to-responder")]
    ToResponder,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::ToInitiator, Direction::ToResponder];

    /// The transport sub-channel which carries envelopes going this way.
    pub fn sub_channel(self) -> SubChannelId {
        match self {
            Direction::ToInitiator => SubChannelId::TO_INITIATOR,
            Direction::ToResponder => SubChannelId::TO_RESPONDER,
        }
    }

    /// The role which sends messages going this way.
    pub fn sender(self) -> Role {
        match self {
            Direction::ToInitiator => Role::Responder,
            Direction::ToResponder => Role::Initiator,
        }
    }

    /// The role which receives, and handles, messages going this way.
    pub fn receiver(self) -> Role {
        match self {
            Direction::ToInitiator => Role::Initiator,
            Direction::ToResponder => Role::Responder,
        }
    }
}

/// Transport-level id of one of the two envelope kinds under a channel.
///
/// Every channel reserves exactly two of these: 0 for responder to initiator traffic and 1 for initiator to responder
/// traffic.  This is not the same id space as [MessageId], which lives inside the envelope.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display(fmt = "sub-channel {}", _0)]
pub struct SubChannelId(u8);

impl SubChannelId {
    pub const TO_INITIATOR: SubChannelId = SubChannelId(0);
    pub const TO_RESPONDER: SubChannelId = SubChannelId(1);

    /// Validate a raw sub-channel id read off the wire.
    pub fn from_raw(raw: u8) -> Option<SubChannelId> {
        match raw {
            0 => Some(Self::TO_INITIATOR),
            1 => Some(Self::TO_RESPONDER),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    pub fn direction(self) -> Direction {
        if self == Self::TO_INITIATOR {
            Direction::ToInitiator
        } else {
            Direction::ToResponder
        }
    }
}

/// Id of a message type inside an envelope, scoped to one channel and one direction.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, derive_more::From)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[display(fmt = "#{}", _0)]
pub struct MessageId(pub u8);

impl MessageId {
    /// How many message types fit in one channel and direction.
    pub const SPACE: usize = u8::MAX as usize + 1;

    /// Convert the index of a registration to an id, if it fits.
    pub fn from_index(index: usize) -> Option<MessageId> {
        u8::try_from(index).ok().map(MessageId)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}
