//! Channels, dispatch, and sending.
//!
//! A [Network] is one endpoint's view of the protocol.  It owns a [ChannelManager], which binds every registered
//! channel to the transport, and a [Dispatcher], which decodes whatever the transport hands it and queues the result
//! for the application's main loop.  The transport itself is external: anything implementing [Transport] will do, and
//! [memory] provides an in-process one for tests and tools.
mod channel_manager;
mod config;
mod dispatcher;
mod errors;
pub mod memory;
mod network;
mod target;
mod transport;

pub use channel_manager::*;
pub use config::*;
pub use dispatcher::*;
pub use errors::*;
pub use network::*;
pub use target::*;
pub use transport::*;

pub use courier_framer::{Direction, Role, SubChannelId};
pub use courier_registry::PeerId;
