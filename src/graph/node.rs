//! Hub-nodes and the read/write views handed out by a [`GraphStore`].

use serde::{Deserialize, Serialize};

use super::edge::{Edge, EdgeUpdateMode, Restriction};
use super::store::GraphStore;
use crate::time::Date;
use crate::types::{NodeId, Position, StationId};

/// A hub in a link graph, mirroring one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubNode {
    pub(crate) supply: u32,
    pub(crate) demand: u32,
    pub(crate) station: StationId,
    pub(crate) xy: Position,
    pub(crate) last_update: Date,
}

impl HubNode {
    pub(crate) const fn new(station: StationId, xy: Position, demand: u32) -> Self {
        Self {
            supply: 0,
            demand,
            station,
            xy,
            last_update: Date::INVALID,
        }
    }
}

/// Iterator over the present edges leaving one hub.
///
/// Follows the `next_edge` chain, so it costs O(out-degree) and never visits
/// zero-capacity cells.
pub struct EdgeIter<'a> {
    row: &'a [Edge],
    current: Option<NodeId>,
}

impl<'a> EdgeIter<'a> {
    pub(crate) fn new(row: &'a [Edge], from: NodeId) -> Self {
        Self {
            row,
            current: row[usize::from(from)].next_edge,
        }
    }
}

impl<'a> Iterator for EdgeIter<'a> {
    type Item = (NodeId, &'a Edge);

    fn next(&mut self) -> Option<Self::Item> {
        let to = self.current?;
        let edge = &self.row[usize::from(to)];
        self.current = edge.next_edge;
        Some((to, edge))
    }
}

/// Read-only view of a hub.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pub(crate) node: &'a HubNode,
    pub(crate) row: &'a [Edge],
    pub(crate) index: NodeId,
}

impl<'a> NodeRef<'a> {
    /// Index of the hub in its graph.
    #[must_use]
    pub const fn index(&self) -> NodeId {
        self.index
    }

    /// Produced-but-undelivered units.
    #[must_use]
    pub const fn supply(&self) -> u32 {
        self.node.supply
    }

    /// Acceptance capacity.
    #[must_use]
    pub const fn demand(&self) -> u32 {
        self.node.demand
    }

    /// Station mirrored by this hub.
    #[must_use]
    pub const fn station(&self) -> StationId {
        self.node.station
    }

    /// Position of the station.
    #[must_use]
    pub const fn xy(&self) -> Position {
        self.node.xy
    }

    /// Last supply update.
    #[must_use]
    pub const fn last_update(&self) -> Date {
        self.node.last_update
    }

    /// Edge from this hub to `to`, present or not.
    #[must_use]
    pub fn edge(&self, to: NodeId) -> &'a Edge {
        &self.row[usize::from(to)]
    }

    /// Present edges leaving this hub.
    #[must_use]
    pub fn edges(&self) -> EdgeIter<'a> {
        EdgeIter::new(self.row, self.index)
    }
}

/// Read/write view of a hub.
pub struct NodeMut<'a> {
    pub(crate) node: &'a mut HubNode,
    pub(crate) row: &'a mut [Edge],
    pub(crate) index: NodeId,
}

impl NodeMut<'_> {
    /// Index of the hub in its graph.
    #[must_use]
    pub const fn index(&self) -> NodeId {
        self.index
    }

    /// Produced-but-undelivered units.
    #[must_use]
    pub const fn supply(&self) -> u32 {
        self.node.supply
    }

    /// Acceptance capacity.
    #[must_use]
    pub const fn demand(&self) -> u32 {
        self.node.demand
    }

    /// Station mirrored by this hub.
    #[must_use]
    pub const fn station(&self) -> StationId {
        self.node.station
    }

    /// Last supply update.
    #[must_use]
    pub const fn last_update(&self) -> Date {
        self.node.last_update
    }

    /// Edge from this hub to `to`, present or not.
    #[must_use]
    pub fn edge(&self, to: NodeId) -> &Edge {
        &self.row[usize::from(to)]
    }

    /// Present edges leaving this hub.
    #[must_use]
    pub fn edges(&self) -> EdgeIter<'_> {
        EdgeIter::new(self.row, self.index)
    }

    /// Adds freshly produced supply.
    pub fn update_supply(&mut self, supply: u32, now: Date) {
        self.node.supply = self.node.supply.saturating_add(supply);
        self.node.last_update = now;
    }

    /// Sets the acceptance capacity.
    pub fn set_demand(&mut self, demand: u32) {
        self.node.demand = demand;
    }

    /// Moves the hub.
    pub fn update_location(&mut self, xy: Position) {
        self.node.xy = xy;
    }

    /// Creates the edge to `to` and splices it into the present-edge list.
    ///
    /// # Panics
    ///
    /// Panics if `to` is this hub; the self-edge is the list head.
    pub fn add_edge(&mut self, to: NodeId, capacity: u32, usage: u32, mode: EdgeUpdateMode, now: Date) {
        assert_ne!(self.index, to, "the self-edge cannot carry traffic");
        debug_assert_eq!(self.row[usize::from(to)].capacity, 0, "edge to {to} already present");
        let from = usize::from(self.index);
        let head = self.row[from].next_edge;
        let edge = &mut self.row[usize::from(to)];
        edge.capacity = capacity;
        edge.usage = usage;
        edge.next_edge = head;
        edge.stamp(mode.restriction, now);
        self.row[from].next_edge = Some(to);
    }

    /// Records a capacity/usage measurement on the edge to `to`, creating it
    /// if it is absent.
    pub fn update_edge(&mut self, to: NodeId, capacity: u32, usage: u32, mode: EdgeUpdateMode, now: Date) {
        debug_assert!(capacity > 0, "capacity updates must be positive");
        debug_assert!(usage <= capacity, "usage {usage} exceeds capacity {capacity}");
        if capacity == 0 || to == self.index {
            return;
        }
        if self.row[usize::from(to)].capacity == 0 {
            self.add_edge(to, capacity, usage, mode, now);
        } else {
            self.row[usize::from(to)].update(capacity, usage, mode, now);
        }
    }

    /// Zeroes the edge to `to` and unlinks it. No-op for the self-edge.
    pub fn remove_edge(&mut self, to: NodeId) {
        if to == self.index {
            return;
        }
        let t = usize::from(to);
        self.row[t].capacity = 0;
        self.row[t].usage = 0;
        self.row[t].last_unrestricted_update = Date::INVALID;
        self.row[t].last_restricted_update = Date::INVALID;

        let mut prev = usize::from(self.index);
        let mut next = self.row[prev].next_edge;
        while let Some(n) = next {
            let n = usize::from(n);
            if n == t {
                self.row[prev].next_edge = self.row[n].next_edge;
                self.row[n].next_edge = None;
                break;
            }
            prev = n;
            next = self.row[n].next_edge;
        }
    }

    /// Stops automatic routing over the edge to `to`.
    pub fn restrict_edge(&mut self, to: NodeId) {
        self.row[usize::from(to)].restrict();
    }

    /// Drops the restricted part of the edge to `to`.
    pub fn release_edge(&mut self, to: NodeId) {
        self.row[usize::from(to)].release();
    }

    /// Stamps the edge to `to` without changing its values.
    pub fn touch_edge(&mut self, to: NodeId, restriction: Restriction, now: Date) {
        if self.row[usize::from(to)].capacity > 0 {
            self.row[usize::from(to)].stamp(restriction, now);
        }
    }
}

impl GraphStore {
    /// Read-only view of hub `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        let i = usize::from(id);
        NodeRef {
            node: &self.nodes[i],
            row: &self.edges[i],
            index: id,
        }
    }

    /// Read/write view of hub `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn node_mut(&mut self, id: NodeId) -> NodeMut<'_> {
        let i = usize::from(id);
        NodeMut {
            node: &mut self.nodes[i],
            row: &mut self.edges[i],
            index: id,
        }
    }
}
