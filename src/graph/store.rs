//! The persistent link graph of one connected region.

use serde::{Deserialize, Serialize};

use super::edge::Edge;
use super::node::HubNode;
use crate::time::Date;
use crate::types::{CargoId, GraphId, NodeId, Position, StationId, INVALID_NODE};

/// Days after which a graph's statistics are halved.
pub const COMPRESSION_INTERVAL: i32 = 256;

/// Minimum days a link may go unserviced before it is considered stale.
/// The Manhattan distance between both stations divided by 8 is added.
pub const MIN_TIMEOUT_DISTANCE: u32 = 32;

/// Hub indices are 16-bit; the maximum value is reserved as "no hub".
pub const MAX_HUBS: usize = INVALID_NODE as usize;

/// Tells the owner of a station that its hub now lives somewhere else.
///
/// Emitted by [`GraphStore::remove_node`] (the last hub was swapped into the
/// freed slot) and [`GraphStore::merge`] (every hub of the absorbed graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRelocated {
    /// Station whose hub moved.
    pub station: StationId,
    /// Graph the hub lives in now.
    pub graph: GraphId,
    /// New index of the hub.
    pub node: NodeId,
}

/// A weighted directed graph of hubs for one cargo type.
///
/// Edges are held in a dense matrix so `(from, to)` lookup is O(1); each row
/// additionally chains its present edges through `next_edge`, starting at
/// the row's self-edge, so iterating the links of a hub is O(out-degree).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStore {
    pub(crate) id: GraphId,
    pub(crate) cargo: CargoId,
    pub(crate) last_compression: Date,
    pub(crate) nodes: Vec<HubNode>,
    pub(crate) edges: Vec<Vec<Edge>>,
}

/// Scales `val` from an age of `orig_age` to one of `target_age`. Non-zero
/// values never scale down to zero.
#[must_use]
pub fn scale(val: u32, target_age: u32, orig_age: u32) -> u32 {
    if val == 0 {
        return 0;
    }
    let scaled = u64::from(val) * u64::from(target_age) / u64::from(orig_age.max(1));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

impl GraphStore {
    /// Creates an empty graph. `now` counts as the last compression.
    #[must_use]
    pub fn new(id: GraphId, cargo: CargoId, now: Date) -> Self {
        Self {
            id,
            cargo,
            last_compression: now,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Graph identity.
    #[must_use]
    pub const fn id(&self) -> GraphId {
        self.id
    }

    /// Cargo type routed through this graph.
    #[must_use]
    pub const fn cargo(&self) -> CargoId {
        self.cargo
    }

    /// Number of hubs.
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no hubs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Date of the last compression.
    #[must_use]
    pub const fn last_compression(&self) -> Date {
        self.last_compression
    }

    /// Edge from `from` to `to`, present or not.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn edge(&self, from: NodeId, to: NodeId) -> &Edge {
        &self.edges[usize::from(from)][usize::from(to)]
    }

    /// Hub indices in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        // size() < MAX_HUBS, so every index fits.
        (0..self.nodes.len()).map(|i| i as NodeId)
    }

    /// Appends a hub for `station` and grows the edge matrix.
    ///
    /// The new self-edge starts an empty present-edge list and every existing
    /// hub gets a zero-capacity cell towards and from the new one.
    ///
    /// # Panics
    ///
    /// Panics if the graph already holds [`MAX_HUBS`] hubs. The identifier
    /// width is fixed; running out is not recoverable.
    pub fn add_node(&mut self, station: StationId, xy: Position, demand: u32) -> NodeId {
        let new_node = self.nodes.len();
        assert!(new_node < MAX_HUBS, "{}: hub id space exhausted ({MAX_HUBS} hubs)", self.id);
        self.nodes.push(HubNode::new(station, xy, demand));
        for row in &mut self.edges {
            row.push(Edge::EMPTY);
        }
        self.edges.push(vec![Edge::EMPTY; new_node + 1]);
        new_node as NodeId
    }

    /// Removes hub `id` by moving the last hub into its slot.
    ///
    /// Every edge to `id` is removed first, then all present-edge chains
    /// pointing at the last hub are relinked to `id`. Returns the relocation
    /// of the moved hub, or `None` if `id` was the last hub or is out of
    /// range.
    pub fn remove_node(&mut self, id: NodeId) -> Option<NodeRelocated> {
        let size = self.nodes.len();
        let removed = usize::from(id);
        if removed >= size {
            return None;
        }
        let last = size - 1;

        for i in self.node_ids().collect::<Vec<_>>() {
            self.node_mut(i).remove_edge(id);
        }
        for (i, row) in self.edges.iter_mut().enumerate() {
            let mut prev = i;
            let mut next = row[i].next_edge;
            while let Some(n) = next {
                let n = usize::from(n);
                if n == last {
                    row[prev].next_edge = Some(id);
                    break;
                }
                prev = n;
                next = row[n].next_edge;
            }
            row[removed] = row[last];
        }

        self.edges.swap_remove(removed);
        for row in &mut self.edges {
            row.pop();
        }
        self.nodes.swap_remove(removed);

        (removed != last).then(|| NodeRelocated {
            station: self.nodes[removed].station,
            graph: self.id,
            node: id,
        })
    }

    /// Absorbs `other`, appending its hubs and edges.
    ///
    /// Supply, capacity and usage of the absorbed hubs are rescaled by the
    /// ratio of both graphs' ages since their last compression, so the older
    /// graph's accumulated numbers don't swamp the younger one's. Returns the
    /// new location of every absorbed hub.
    pub fn merge(&mut self, other: GraphStore, now: Date) -> Vec<NodeRelocated> {
        let age = age_since(now, self.last_compression);
        let other_age = age_since(now, other.last_compression);
        let first = self.nodes.len();
        let offset = |next: Option<NodeId>| next.map(|n| (usize::from(n) + first) as NodeId);

        let mut relocated = Vec::with_capacity(other.nodes.len());
        for (node1, src) in other.nodes.iter().enumerate() {
            let new_node = self.add_node(src.station, src.xy, src.demand);
            let n = usize::from(new_node);
            self.nodes[n].supply = scale(src.supply, age, other_age);
            self.nodes[n].last_update = src.last_update;
            relocated.push(NodeRelocated {
                station: src.station,
                graph: self.id,
                node: new_node,
            });

            for node2 in 0..node1 {
                let mut forward = other.edges[node1][node2];
                let mut backward = other.edges[node2][node1];
                for edge in [&mut forward, &mut backward] {
                    edge.capacity = scale(edge.capacity, age, other_age);
                    edge.usage = scale(edge.usage, age, other_age);
                    edge.next_edge = offset(edge.next_edge);
                }
                self.edges[n][first + node2] = forward;
                self.edges[first + node2][n] = backward;
            }
            let mut start = other.edges[node1][node1];
            start.next_edge = offset(start.next_edge);
            self.edges[n][n] = start;
        }
        relocated
    }

    /// Halves supply, capacity and usage.
    ///
    /// Capacity rounds up so a link that was alive stays alive. The last
    /// compression moves to the midpoint between `now` and its old value.
    pub fn compress(&mut self, now: Date) {
        self.last_compression = now.midpoint(self.last_compression);
        for node in &mut self.nodes {
            node.supply /= 2;
        }
        for edge in self.edges.iter_mut().flatten() {
            edge.compress();
        }
    }

    /// Shifts every valid date by `interval` days.
    pub fn shift_dates(&mut self, interval: i32) {
        self.last_compression += interval;
        for node in &mut self.nodes {
            node.last_update = node.last_update.shifted(interval);
        }
        for edge in self.edges.iter_mut().flatten() {
            edge.shift_dates(interval);
        }
    }
}

fn age_since(now: Date, since: Date) -> u32 {
    u32::try_from(now - since + 1).unwrap_or(1).max(1)
}
