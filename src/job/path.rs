//! Path legs built by flow solvers.
//!
//! Paths form trees: each leg points at the leg it was forked from, up to a
//! source leg sitting at the origin hub. Legs live in a per-job arena and are
//! addressed by [`PathId`].

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Index of a leg in a job's path arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub(crate) u32);

impl PathId {
    /// The sentinel leg returned for lookup misses. Never carries flow.
    pub const INVALID: Self = Self(0);

    /// Returns true unless this is the sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

const CAP_MULTIPLIER: i64 = 16;
const CAP_MIN_FREE: i32 = (i32::MIN + 1) / 16;
const CAP_MAX_FREE: i32 = (i32::MAX - 1) / 16;

/// One leg of a candidate route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowPath {
    pub(crate) distance: u32,
    pub(crate) capacity: u32,
    pub(crate) free_capacity: i32,
    pub(crate) flow: u32,
    pub(crate) node: NodeId,
    pub(crate) origin: NodeId,
    pub(crate) num_children: u32,
    pub(crate) parent: Option<PathId>,
}

impl FlowPath {
    /// Creates an unattached leg at `node`.
    ///
    /// A source leg starts with zero distance and unlimited capacity; any
    /// other leg starts unreachable until it is forked onto a parent.
    #[must_use]
    pub const fn new(node: NodeId, source: bool) -> Self {
        Self {
            distance: if source { 0 } else { u32::MAX },
            capacity: if source { u32::MAX } else { 0 },
            free_capacity: if source { i32::MAX } else { i32::MIN },
            flow: 0,
            node,
            origin: node,
            num_children: 0,
            parent: None,
        }
    }

    /// Hub this leg passes.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Hub the whole path starts at.
    #[must_use]
    pub const fn origin(&self) -> NodeId {
        self.origin
    }

    /// Leg this one was forked from.
    #[must_use]
    pub const fn parent(&self) -> Option<PathId> {
        self.parent
    }

    /// Minimum capacity of all legs up to this one.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Minimum remaining capacity of all legs up to this one. Negative when
    /// some leg is overloaded.
    #[must_use]
    pub const fn free_capacity(&self) -> i32 {
        self.free_capacity
    }

    /// Sum of the leg distances up to this one.
    #[must_use]
    pub const fn distance(&self) -> u32 {
        self.distance
    }

    /// Flow on this leg.
    #[must_use]
    pub const fn flow(&self) -> u32 {
        self.flow
    }

    /// Number of legs forked from this one.
    #[must_use]
    pub const fn num_children(&self) -> u32 {
        self.num_children
    }

    /// Free capacity relative to total capacity, times 16.
    #[must_use]
    pub fn capacity_ratio(&self) -> i32 {
        Self::ratio(self.free_capacity, self.capacity)
    }

    /// `clamp(free) * 16 / max(total, 1)`. Clamping keeps the product in range.
    #[must_use]
    pub fn ratio(free: i32, total: u32) -> i32 {
        let free = i64::from(free.clamp(CAP_MIN_FREE, CAP_MAX_FREE));
        let ratio = free * CAP_MULTIPLIER / i64::from(total.max(1));
        // |free * 16| < i32::MAX and the divisor is positive.
        ratio as i32
    }

    /// Adds to the flow of this leg only.
    pub fn add_leg_flow(&mut self, flow: u32) {
        self.flow += flow;
    }

    /// Removes from the flow of this leg only.
    pub fn reduce_flow(&mut self, flow: u32) {
        debug_assert!(flow <= self.flow);
        self.flow -= flow;
    }
}

/// Arena of legs for one job. Slot 0 holds the sentinel.
#[derive(Debug, Clone)]
pub(crate) struct PathArena {
    legs: Vec<FlowPath>,
    free: Vec<PathId>,
}

impl Default for PathArena {
    fn default() -> Self {
        Self {
            legs: vec![FlowPath::new(crate::types::INVALID_NODE, false)],
            free: Vec::new(),
        }
    }
}

impl PathArena {
    pub(crate) fn alloc(&mut self, path: FlowPath) -> PathId {
        if let Some(id) = self.free.pop() {
            self.legs[id.0 as usize] = path;
            return id;
        }
        let id = PathId(u32::try_from(self.legs.len()).unwrap_or(u32::MAX));
        self.legs.push(path);
        id
    }

    pub(crate) fn get(&self, id: PathId) -> &FlowPath {
        self.legs.get(id.0 as usize).unwrap_or(&self.legs[0])
    }

    pub(crate) fn get_mut(&mut self, id: PathId) -> Option<&mut FlowPath> {
        if id.is_valid() {
            self.legs.get_mut(id.0 as usize)
        } else {
            None
        }
    }

    /// Detaches `id` from its parent.
    pub(crate) fn detach(&mut self, id: PathId) {
        let Some(parent) = self.get_mut(id).and_then(|p| p.parent.take()) else {
            return;
        };
        if let Some(parent) = self.get_mut(parent) {
            parent.num_children -= 1;
        }
    }

    /// Attaches `id` below `base`, aggregating capacity and distance.
    pub(crate) fn fork(&mut self, id: PathId, base: PathId, capacity: u32, free_capacity: i32, distance: u32) {
        if !id.is_valid() {
            return;
        }
        let base_leg = self.get(base).clone();
        if self.get(id).parent != Some(base) {
            self.detach(id);
            if let Some(b) = self.get_mut(base) {
                b.num_children += 1;
            }
            if let Some(leg) = self.get_mut(id) {
                leg.parent = Some(base);
            }
        }
        if let Some(leg) = self.get_mut(id) {
            leg.capacity = base_leg.capacity.min(capacity);
            leg.free_capacity = base_leg.free_capacity.min(free_capacity);
            leg.distance = base_leg.distance.saturating_add(distance);
            leg.origin = base_leg.origin;
            debug_assert!(leg.distance > 0, "forked leg without distance");
        }
    }

    /// Frees `id` for reuse. Releasing a free slot again is a no-op.
    pub(crate) fn release(&mut self, id: PathId) {
        if id.is_valid() && (id.0 as usize) < self.legs.len() && !self.free.contains(&id) {
            self.detach(id);
            self.free.push(id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.legs.len() - 1 - self.free.len()
    }
}
