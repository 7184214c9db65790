//! Stations as seen by the distribution engine.
//!
//! The simulation owns the real stations; the engine keeps what it needs of
//! them: the position, and per cargo the hub mirroring the station and the
//! flow-share table routing consumers read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::FlowStatMap;
use crate::types::{CargoId, GraphId, NodeId, Position, StationId, INVALID_NODE};

/// Per-cargo state of a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsEntry {
    pub(crate) graph: Option<GraphId>,
    pub(crate) node: NodeId,
    pub(crate) acceptance: u32,
    pub(crate) flows: FlowStatMap,
}

impl Default for GoodsEntry {
    fn default() -> Self {
        Self {
            graph: None,
            node: INVALID_NODE,
            acceptance: 0,
            flows: FlowStatMap::new(),
        }
    }
}

impl GoodsEntry {
    /// Graph the station's hub for this cargo lives in.
    #[must_use]
    pub const fn graph(&self) -> Option<GraphId> {
        self.graph
    }

    /// Index of the station's hub in [`graph`](Self::graph).
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Acceptance reported by the simulation; becomes the hub's demand.
    #[must_use]
    pub const fn acceptance(&self) -> u32 {
        self.acceptance
    }

    /// Flow-share table used to route waiting cargo.
    #[must_use]
    pub const fn flows(&self) -> &FlowStatMap {
        &self.flows
    }

    /// Returns true if this entry points at hub `node` of graph `graph`.
    #[must_use]
    pub fn is_hub(&self, graph: GraphId, node: NodeId) -> bool {
        self.graph == Some(graph) && self.node == node
    }
}

/// A station known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    id: StationId,
    xy: Position,
    goods: BTreeMap<CargoId, GoodsEntry>,
}

impl Station {
    /// Creates a station without any cargo state.
    #[must_use]
    pub fn new(id: StationId, xy: Position) -> Self {
        Self {
            id,
            xy,
            goods: BTreeMap::new(),
        }
    }

    /// Station identity.
    #[must_use]
    pub const fn id(&self) -> StationId {
        self.id
    }

    /// Position.
    #[must_use]
    pub const fn xy(&self) -> Position {
        self.xy
    }

    pub(crate) fn set_xy(&mut self, xy: Position) {
        self.xy = xy;
    }

    /// State for `cargo`, if the station ever handled it.
    #[must_use]
    pub fn goods(&self, cargo: CargoId) -> Option<&GoodsEntry> {
        self.goods.get(&cargo)
    }

    /// State for `cargo`, created on first use.
    pub fn goods_mut(&mut self, cargo: CargoId) -> &mut GoodsEntry {
        self.goods.entry(cargo).or_default()
    }

    /// Cargo types with state at this station.
    pub fn cargoes(&self) -> impl Iterator<Item = CargoId> + '_ {
        self.goods.keys().copied()
    }

    pub(crate) fn goods_entries_mut(&mut self) -> impl Iterator<Item = (CargoId, &mut GoodsEntry)> {
        self.goods.iter_mut().map(|(&c, g)| (c, g))
    }

    /// Returns true if the station's hub for `cargo` is hub `node` of `graph`.
    #[must_use]
    pub fn is_hub(&self, cargo: CargoId, graph: GraphId, node: NodeId) -> bool {
        self.goods(cargo).is_some_and(|ge| ge.is_hub(graph, node))
    }
}

/// All stations known to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationRegistry {
    stations: BTreeMap<StationId, Station>,
}

impl StationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Returns true if there are no stations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Adds or replaces a station.
    pub fn insert(&mut self, station: Station) -> Option<Station> {
        self.stations.insert(station.id(), station)
    }

    /// Removes a station.
    pub fn remove(&mut self, id: StationId) -> Option<Station> {
        self.stations.remove(&id)
    }

    /// Returns true if `id` is known.
    #[must_use]
    pub fn contains(&self, id: StationId) -> bool {
        self.stations.contains_key(&id)
    }

    /// Station `id`.
    #[must_use]
    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    /// Station `id`, mutably.
    pub fn get_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.stations.get_mut(&id)
    }

    /// State of station `id` for `cargo`.
    #[must_use]
    pub fn goods(&self, id: StationId, cargo: CargoId) -> Option<&GoodsEntry> {
        self.get(id)?.goods(cargo)
    }

    /// Stations in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// Stations in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Station> {
        self.stations.values_mut()
    }
}

/// Asks the simulation to reroute cargo waiting at `station`.
///
/// Emitted when flows via `avoid` were deleted. Cargo planned to go via
/// `avoid` must pick another next hop; `avoid2` must not be picked either
/// (usually the station itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RerouteRequest {
    /// Station holding the cargo.
    pub station: StationId,
    /// Cargo type.
    pub cargo: CargoId,
    /// Next hop that is no longer served.
    pub avoid: StationId,
    /// Second station to avoid.
    pub avoid2: StationId,
}
