use std::borrow::Cow;

use crate::addressing::SubChannelId;

/// One unit of traffic on a stream transport: an envelope addressed to a channel slot and sub-channel.
///
/// Channel slots are small integers a transport assigns to channel names when they are opened; both ends of a link
/// agree on them as part of opening the channel.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Frame<'a> {
    pub channel: u16,
    pub sub_channel: SubChannelId,
    pub data: Cow<'a, [u8]>,
}

impl<'a> Frame<'a> {
    pub fn new(channel: u16, sub_channel: SubChannelId, data: Cow<'a, [u8]>) -> Frame<'a> {
        Frame {
            channel,
            sub_channel,
            data,
        }
    }

    /// Extend the lifetime of this frame to 'static by cloning the data.
    pub fn clone_static(&self) -> Frame<'static> {
        Frame {
            channel: self.channel,
            sub_channel: self.sub_channel,
            data: Cow::Owned(self.data.to_vec()),
        }
    }
}
