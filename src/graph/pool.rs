//! Id-reusing arena of live link graphs.

use crate::time::Date;
use crate::types::{CargoId, GraphId};

use super::store::GraphStore;

/// Owns every live [`GraphStore`], addressed by [`GraphId`].
///
/// Freed ids are handed out again, lowest first. The pool never grows past
/// its limit; callers check [`can_allocate`](Self::can_allocate) or handle a
/// `None` from [`allocate`](Self::allocate).
#[derive(Debug, Default)]
pub struct GraphPool {
    slots: Vec<Option<GraphStore>>,
    limit: usize,
    live: usize,
}

impl GraphPool {
    /// Creates an empty pool holding at most `limit` graphs.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            limit: limit.min(usize::from(u16::MAX)),
            live: 0,
        }
    }

    /// Number of live graphs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no graph is alive.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns true if another graph fits.
    #[must_use]
    pub const fn can_allocate(&self) -> bool {
        self.live < self.limit
    }

    /// Creates an empty graph for `cargo`. Returns `None` if the pool is full.
    pub fn allocate(&mut self, cargo: CargoId, now: Date) -> Option<GraphId> {
        if !self.can_allocate() {
            return None;
        }
        let index = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        let id = GraphId(u16::try_from(index).ok()?);
        self.slots[index] = Some(GraphStore::new(id, cargo, now));
        self.live += 1;
        Some(id)
    }

    /// Places a restored graph under its own id. Returns the graph back if
    /// the id is taken or the pool is full.
    pub fn insert(&mut self, graph: GraphStore) -> Result<(), GraphStore> {
        let index = usize::from(graph.id().0);
        if !self.can_allocate() || self.contains(graph.id()) {
            return Err(graph);
        }
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(graph);
        self.live += 1;
        Ok(())
    }

    /// Returns true if `id` names a live graph.
    #[must_use]
    pub fn contains(&self, id: GraphId) -> bool {
        self.get(id).is_some()
    }

    /// Live graph `id`.
    #[must_use]
    pub fn get(&self, id: GraphId) -> Option<&GraphStore> {
        self.slots.get(usize::from(id.0)).and_then(Option::as_ref)
    }

    /// Live graph `id`, mutably.
    pub fn get_mut(&mut self, id: GraphId) -> Option<&mut GraphStore> {
        self.slots.get_mut(usize::from(id.0)).and_then(Option::as_mut)
    }

    /// Destroys graph `id` and frees its id.
    pub fn remove(&mut self, id: GraphId) -> Option<GraphStore> {
        let graph = self.slots.get_mut(usize::from(id.0))?.take()?;
        self.live -= 1;
        Some(graph)
    }

    /// Live graphs in id order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphStore> {
        self.slots.iter().flatten()
    }

    /// Live graphs in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GraphStore> {
        self.slots.iter_mut().flatten()
    }
}
