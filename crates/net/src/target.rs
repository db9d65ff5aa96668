//! Delivery targets.
//!
//! Courier doesn't know what any of these mean beyond [Target::Peer]; they're forwarded to the transport as-is.
use derive_more::Display;

use courier_registry::PeerId;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Point {
        Point { x, y, z }
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }
}

/// A world, dimension, or shard: whatever the transport's notion of a disjoint space is.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display(fmt = "region {}", _0)]
pub struct RegionId(pub u32);

/// Some area peers can be observing, for example a loaded chunk.
#[derive(Copy, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display(fmt = "area {}/{}", region, key)]
pub struct AreaId {
    pub region: RegionId,
    pub key: u64,
}

/// Who a responder-side send goes to.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// One initiator.
    Peer(PeerId),

    /// Every initiator within `radius` of `point` in `region`.
    Near {
        point: Point,
        radius: f64,
        region: RegionId,
    },

    /// Every initiator in a region.
    Region(RegionId),

    /// Every initiator observing an area.
    TrackingArea(AreaId),
}
