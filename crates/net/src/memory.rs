//! An in-process transport.
//!
//! A [MemoryHub] plays the network: one responder and any number of initiators, all in the same process.  Envelopes
//! cross it as frames on a byte stream (framed by a [Framer], split back apart by each receiver's [Parser]), and are
//! delivered synchronously on the sending thread.
//!
//! Target resolution is as simple as it can be: tests place peers with [MemoryHub::set_peer_location] and
//! [MemoryHub::track_area].
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::*;

use courier_framer::{
    Frame, Framer, Parser, ParserError, ParserOutcome, Role, SubChannelId, HEADER_SIZE,
};
use courier_registry::PeerId;

use crate::{
    AreaId, InboundSink, Point, RegionId, Target, Transport, TransportChannel, TransportError,
};

/// Largest frame a hub will carry unless told otherwise.
pub const DEFAULT_MAX_FRAME: u64 = 1 << 24;

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
enum EndpointKey {
    Responder,
    Initiator(PeerId),
}

impl EndpointKey {
    fn role(self) -> Role {
        match self {
            EndpointKey::Responder => Role::Responder,
            EndpointKey::Initiator(_) => Role::Initiator,
        }
    }
}

struct Endpoint {
    sinks: HashMap<(u16, SubChannelId), Arc<dyn InboundSink>>,
    parser: Parser,

    /// How many times each channel was opened here.
    opens: HashMap<String, usize>,
}

impl Endpoint {
    fn new(max_frame: u64) -> Endpoint {
        Endpoint {
            sinks: Default::default(),
            parser: Parser::new(Some(max_frame), 4096),
            opens: Default::default(),
        }
    }
}

struct Peer {
    endpoint: Endpoint,
    location: Option<(Point, RegionId)>,
    areas: HashSet<AreaId>,
}

/// A channel the responder has opened, and so offers to initiators.
struct Offered {
    name: String,
    token: String,
}

struct Delivery {
    sink: Arc<dyn InboundSink>,
    sender: Option<PeerId>,
    envelope: Vec<u8>,
}

struct HubState {
    max_frame: u64,
    framer: Framer,

    /// Indexed by channel slot.
    offered: Vec<Offered>,
    responder: Endpoint,
    peers: BTreeMap<PeerId, Peer>,
    next_peer: u64,
}

fn link_error(e: ParserError) -> TransportError {
    TransportError::Other(format!("Frame parsing failed: {}", e))
}

impl HubState {
    fn endpoint_mut(&mut self, key: EndpointKey) -> Result<&mut Endpoint, TransportError> {
        match key {
            EndpointKey::Responder => Ok(&mut self.responder),
            EndpointKey::Initiator(p) => self
                .peers
                .get_mut(&p)
                .map(|p| &mut p.endpoint)
                .ok_or(TransportError::UnknownPeer(p)),
        }
    }

    fn peer_mut(&mut self, peer: PeerId) -> Result<&mut Peer, TransportError> {
        self.peers
            .get_mut(&peer)
            .ok_or(TransportError::UnknownPeer(peer))
    }

    fn open(&mut self, key: EndpointKey, name: &str, token: &str) -> Result<u16, TransportError> {
        let existing = self.offered.iter().position(|o| o.name == name);
        let slot = match (key, existing) {
            (_, Some(slot)) => {
                let theirs = &self.offered[slot].token;
                if theirs != token {
                    return Err(TransportError::Incompatible {
                        channel: name.to_string(),
                        ours: token.to_string(),
                        theirs: theirs.clone(),
                    });
                }
                slot
            }
            (EndpointKey::Responder, None) => {
                self.offered.push(Offered {
                    name: name.to_string(),
                    token: token.to_string(),
                });
                self.offered.len() - 1
            }
            (EndpointKey::Initiator(_), None) => {
                return Err(TransportError::NotOffered(name.to_string()))
            }
        };

        let slot = u16::try_from(slot)
            .map_err(|_| TransportError::Other("Too many channels for one hub".to_string()))?;
        *self
            .endpoint_mut(key)?
            .opens
            .entry(name.to_string())
            .or_default() += 1;
        Ok(slot)
    }

    fn resolve(&self, target: &Target) -> Result<Vec<PeerId>, TransportError> {
        let matching = |f: &dyn Fn(&Peer) -> bool| {
            self.peers
                .iter()
                .filter(|(_, p)| f(p))
                .map(|(id, _)| *id)
                .collect::<Vec<_>>()
        };

        Ok(match target {
            Target::Peer(p) => {
                if !self.peers.contains_key(p) {
                    return Err(TransportError::UnknownPeer(*p));
                }
                vec![*p]
            }
            Target::Near {
                point,
                radius,
                region,
            } => matching(&|p| {
                matches!(p.location, Some((at, r)) if r == *region && at.distance_squared(point) <= radius * radius)
            }),
            Target::Region(region) => {
                matching(&|p| matches!(p.location, Some((_, r)) if r == *region))
            }
            Target::TrackingArea(area) => matching(&|p| p.areas.contains(area)),
        })
    }

    /// Push one envelope through the framer and the receiver's parser, collecting whatever the receiver has bound.
    fn route(
        &mut self,
        from: EndpointKey,
        to: EndpointKey,
        slot: u16,
        sub_channel: SubChannelId,
        envelope: &[u8],
        deliveries: &mut Vec<Delivery>,
    ) -> Result<(), TransportError> {
        let sender = match from {
            EndpointKey::Responder => None,
            EndpointKey::Initiator(p) => Some(p),
        };

        let length = HEADER_SIZE + envelope.len() as u64;
        if length > self.max_frame {
            return Err(TransportError::Other(format!(
                "Frame of {} bytes exceeds the hub's limit of {}",
                length, self.max_frame
            )));
        }

        self.framer.clear();
        self.framer
            .add_frame(&Frame::new(slot, sub_channel, Cow::Borrowed(envelope)));
        let bytes = self.framer.get_data().to_vec();

        let receiver = self.endpoint_mut(to)?;
        receiver.parser.feed(&bytes).map_err(link_error)?;
        loop {
            let (slot, sub_channel, envelope) = match receiver.parser.read_frame().map_err(link_error)? {
                ParserOutcome::Frame(f) => (f.channel, f.sub_channel, f.data.to_vec()),
                ParserOutcome::MoreDataRequired(_) => break,
            };
            receiver.parser.roll_forward().map_err(link_error)?;

            match receiver.sinks.get(&(slot, sub_channel)) {
                Some(sink) => deliveries.push(Delivery {
                    sink: sink.clone(),
                    sender,
                    envelope,
                }),
                None => warn!(
                    "{:?} has nothing bound to {} of channel slot {}; dropping {} bytes",
                    to,
                    sub_channel,
                    slot,
                    envelope.len()
                ),
            }
        }

        Ok(())
    }
}

/// The shared in-memory network.  Cheap to clone.
#[derive(Clone)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
    rejected: Arc<AtomicU64>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        MemoryHub::new(DEFAULT_MAX_FRAME)
    }
}

impl MemoryHub {
    pub fn new(max_frame: u64) -> MemoryHub {
        MemoryHub {
            state: Arc::new(Mutex::new(HubState {
                max_frame,
                framer: Framer::new(4096),
                offered: vec![],
                responder: Endpoint::new(max_frame),
                peers: Default::default(),
                next_peer: 1,
            })),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Nothing in here can be left half-updated by a panic, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The responder's transport.  There is only one responder, so every call returns a handle to the same endpoint.
    pub fn responder(&self) -> MemoryTransport {
        MemoryTransport {
            hub: self.clone(),
            key: EndpointKey::Responder,
        }
    }

    /// Connect a new initiator.
    pub fn connect(&self) -> MemoryTransport {
        let mut state = self.lock();
        let peer = PeerId(state.next_peer);
        state.next_peer += 1;
        let endpoint = Endpoint::new(state.max_frame);
        state.peers.insert(
            peer,
            Peer {
                endpoint,
                location: None,
                areas: Default::default(),
            },
        );
        info!("{} connected", peer);

        MemoryTransport {
            hub: self.clone(),
            key: EndpointKey::Initiator(peer),
        }
    }

    pub fn set_peer_location(
        &self,
        peer: PeerId,
        point: Point,
        region: RegionId,
    ) -> Result<(), TransportError> {
        self.lock().peer_mut(peer)?.location = Some((point, region));
        Ok(())
    }

    pub fn track_area(&self, peer: PeerId, area: AreaId) -> Result<(), TransportError> {
        self.lock().peer_mut(peer)?.areas.insert(area);
        Ok(())
    }

    pub fn untrack_area(&self, peer: PeerId, area: AreaId) -> Result<(), TransportError> {
        self.lock().peer_mut(peer)?.areas.remove(&area);
        Ok(())
    }

    /// Number of envelopes a receiver refused.
    pub fn rejected_envelopes(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Hand envelopes to their sinks.  Must be called without the lock held, since sinks are arbitrary code.
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for d in deliveries {
            if let Err(e) = d.sink.receive(d.sender, &d.envelope) {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Envelope from {} was refused and the link should be considered suspect: {}",
                    d.sender
                        .map_or_else(|| "the responder".to_string(), |p| p.to_string()),
                    e
                );
            }
        }
    }
}

/// One endpoint's view of a [MemoryHub].
pub struct MemoryTransport {
    hub: MemoryHub,
    key: EndpointKey,
}

impl MemoryTransport {
    /// This endpoint's identity, if it is an initiator.
    pub fn peer_id(&self) -> Option<PeerId> {
        match self.key {
            EndpointKey::Responder => None,
            EndpointKey::Initiator(p) => Some(p),
        }
    }

    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }

    /// How many times this endpoint has opened `name` at the transport level.
    pub fn open_calls(&self, name: &str) -> usize {
        self.hub
            .lock()
            .endpoint_mut(self.key)
            .ok()
            .and_then(|e| e.opens.get(name).copied())
            .unwrap_or(0)
    }
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    fn open_channel(
        &self,
        name: &str,
        compatibility_token: &str,
    ) -> Result<MemoryChannel, TransportError> {
        let slot = self.hub.lock().open(self.key, name, compatibility_token)?;
        debug!("{:?} opened channel {} in slot {}", self.key, name, slot);
        Ok(MemoryChannel {
            hub: self.hub.clone(),
            key: self.key,
            name: name.to_string(),
            slot,
        })
    }
}

pub struct MemoryChannel {
    hub: MemoryHub,
    key: EndpointKey,
    name: String,
    slot: u16,
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("name", &self.name)
            .field("slot", &self.slot)
            .field("key", &self.key)
            .finish()
    }
}

impl MemoryChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn require(&self, role: Role, operation: &'static str) -> Result<(), TransportError> {
        if self.key.role() != role {
            return Err(TransportError::Unsupported {
                role: self.key.role(),
                operation,
            });
        }
        Ok(())
    }

    fn send_to_peers(
        &self,
        sub_channel: SubChannelId,
        peers: impl FnOnce(&HubState) -> Result<Vec<PeerId>, TransportError>,
        envelope: &[u8],
    ) -> Result<(), TransportError> {
        let mut deliveries = vec![];
        {
            let mut state = self.hub.lock();
            for peer in peers(&*state)? {
                state.route(
                    self.key,
                    EndpointKey::Initiator(peer),
                    self.slot,
                    sub_channel,
                    envelope,
                    &mut deliveries,
                )?;
            }
        }
        self.hub.deliver(deliveries);
        Ok(())
    }
}

impl TransportChannel for MemoryChannel {
    fn bind(
        &self,
        sub_channel: SubChannelId,
        sink: Arc<dyn InboundSink>,
    ) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        let endpoint = state.endpoint_mut(self.key)?;
        if endpoint.sinks.contains_key(&(self.slot, sub_channel)) {
            return Err(TransportError::AlreadyBound(self.name.clone(), sub_channel));
        }
        endpoint.sinks.insert((self.slot, sub_channel), sink);
        Ok(())
    }

    fn unbind(&self, sub_channel: SubChannelId) {
        if let Ok(endpoint) = self.hub.lock().endpoint_mut(self.key) {
            endpoint.sinks.remove(&(self.slot, sub_channel));
        }
    }

    fn send_to_target(
        &self,
        sub_channel: SubChannelId,
        target: &Target,
        envelope: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.require(Role::Responder, "send to initiators")?;
        self.send_to_peers(sub_channel, |s| s.resolve(target), &envelope)
    }

    fn send_to_all(
        &self,
        sub_channel: SubChannelId,
        envelope: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.require(Role::Responder, "send to initiators")?;
        self.send_to_peers(
            sub_channel,
            |s| Ok(s.peers.keys().copied().collect()),
            &envelope,
        )
    }

    fn send_to_responder(
        &self,
        sub_channel: SubChannelId,
        envelope: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.require(Role::Initiator, "send to the responder")?;
        let mut deliveries = vec![];
        self.hub.lock().route(
            self.key,
            EndpointKey::Responder,
            self.slot,
            sub_channel,
            &envelope,
            &mut deliveries,
        )?;
        self.hub.deliver(deliveries);
        Ok(())
    }
}
