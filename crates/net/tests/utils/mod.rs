//! A small game protocol shared by the integration tests.
use std::sync::Arc;

use anyhow::Result;

use courier_net::memory::{MemoryHub, MemoryTransport};
use courier_net::*;
use courier_registry::{BincodeSerializer, PeerId, Protocol, Registry, RegistryBuilder, ToInitiator, ToResponder};

pub struct Game;

#[derive(Debug, Default)]
pub struct ServerState {
    pub pings: Vec<(PeerId, u32)>,
}

#[derive(Debug, Default)]
pub struct ClientState {
    pub pongs: Vec<u32>,
    pub announcements: Vec<String>,
    pub echoes: Vec<u8>,
}

impl Protocol for Game {
    type InitiatorContext = ClientState;
    type ResponderContext = ServerState;
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ping {
    pub nonce: u32,
}

impl ToResponder<Game> for Ping {
    fn handle(self: Box<Self>, ctx: &mut ServerState, sender: PeerId) -> Result<()> {
        ctx.pings.push((sender, self.nonce));
        Ok(())
    }
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pong {
    pub nonce: u32,
}

impl ToInitiator<Game> for Pong {
    fn handle(self: Box<Self>, ctx: &mut ClientState) -> Result<()> {
        ctx.pongs.push(self.nonce);
        Ok(())
    }
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Announce(pub String);

impl ToInitiator<Game> for Announce {
    fn handle(self: Box<Self>, ctx: &mut ClientState) -> Result<()> {
        ctx.announcements.push(self.0);
        Ok(())
    }
}

/// Could go either way, but is only registered as a to-initiator message.
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Echo(pub u8);

impl ToInitiator<Game> for Echo {
    fn handle(self: Box<Self>, ctx: &mut ClientState) -> Result<()> {
        ctx.echoes.push(self.0);
        Ok(())
    }
}

impl ToResponder<Game> for Echo {
    fn handle(self: Box<Self>, _ctx: &mut ServerState, _sender: PeerId) -> Result<()> {
        anyhow::bail!("Echo is never sent to the responder")
    }
}

pub fn registry() -> Arc<Registry<Game>> {
    let mut builder = RegistryBuilder::<Game>::new();
    builder.declare_channel("game").unwrap();
    builder.declare_channel("chat").unwrap();
    builder
        .register_to_responder_with("game", BincodeSerializer::<Ping>::default())
        .unwrap();
    builder
        .register_to_initiator_with("game", BincodeSerializer::<Pong>::default())
        .unwrap();
    builder
        .register_to_initiator_with("chat", BincodeSerializer::<Announce>::default())
        .unwrap();
    builder
        .register_to_initiator_with("chat", BincodeSerializer::<Echo>::default())
        .unwrap();
    builder.build_shared()
}

pub fn config(role: Role, token: &str) -> NetworkConfig {
    NetworkConfigBuilder::default()
        .role(role)
        .compatibility_token(token)
        .build()
        .unwrap()
}

pub type GameNetwork = Network<Game, MemoryTransport>;

pub fn responder(hub: &MemoryHub, registry: &Arc<Registry<Game>>) -> GameNetwork {
    Network::new(config(Role::Responder, "0"), registry.clone(), hub.responder())
}

pub fn initiator(hub: &MemoryHub, registry: &Arc<Registry<Game>>) -> GameNetwork {
    Network::new(config(Role::Initiator, "0"), registry.clone(), hub.connect())
}

pub fn peer_of(network: &GameNetwork) -> PeerId {
    network.channels().transport().peer_id().unwrap()
}
