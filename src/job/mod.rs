//! Computation jobs.
//!
//! A [`ComputationJob`] is a frozen copy of one link graph plus the scratch
//! data that pipeline stages fill in: demand and flow per edge, undelivered
//! supply, path trees and planned flow-share tables per hub. Stages only ever
//! touch the job, so it can run on its own thread while the live graph keeps
//! changing.

mod annotation;
mod path;
mod reconcile;

use std::collections::VecDeque;
use std::sync::Arc;

pub use annotation::{EdgeAnnotation, NodeAnnotation};
pub use path::{FlowPath, PathId};
pub use reconcile::JoinReport;

use path::PathArena;

use crate::config::LinkGraphSettings;
use crate::flow::FlowStatMap;
use crate::graph::{GraphStore, NodeRef};
use crate::time::Date;
use crate::types::{CargoId, GraphId, JobId, NodeId, StationId};

/// A link graph calculation in progress.
#[derive(Debug)]
pub struct ComputationJob {
    id: JobId,
    graph: Arc<GraphStore>,
    settings: LinkGraphSettings,
    join_date: Date,
    nodes: Vec<NodeAnnotation>,
    edges: Vec<Vec<EdgeAnnotation>>,
    paths: PathArena,
}

impl ComputationJob {
    /// Creates a job over a frozen graph copy.
    ///
    /// Annotations stay empty until [`init`](Self::init) runs; the first
    /// pipeline stage does that.
    #[must_use]
    pub fn new(id: JobId, graph: Arc<GraphStore>, settings: LinkGraphSettings, join_date: Date) -> Self {
        Self {
            id,
            graph,
            settings,
            join_date,
            nodes: Vec::new(),
            edges: Vec::new(),
            paths: PathArena::default(),
        }
    }

    /// Sizes the annotations to the graph. Undelivered supply starts at each
    /// hub's supply; demand, flow and paths start empty.
    pub fn init(&mut self) {
        let size = self.graph.size();
        self.nodes = self
            .graph
            .node_ids()
            .map(|id| NodeAnnotation::new(self.graph.node(id).supply()))
            .collect();
        self.edges = vec![vec![EdgeAnnotation::default(); size]; size];
        self.paths = PathArena::default();
    }

    /// Job identity.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Frozen copy of the graph.
    #[must_use]
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub(crate) fn shared_graph(&self) -> Arc<GraphStore> {
        Arc::clone(&self.graph)
    }

    /// Id of the live graph this job was copied from.
    #[must_use]
    pub fn graph_id(&self) -> GraphId {
        self.graph.id()
    }

    /// Cargo type of the graph.
    #[must_use]
    pub fn cargo(&self) -> CargoId {
        self.graph.cargo()
    }

    /// Number of hubs.
    #[must_use]
    pub fn size(&self) -> usize {
        self.graph.size()
    }

    /// Last compression of the copied graph.
    #[must_use]
    pub fn last_compression(&self) -> Date {
        self.graph.last_compression()
    }

    /// Settings taken when the job was spawned.
    #[must_use]
    pub const fn settings(&self) -> &LinkGraphSettings {
        &self.settings
    }

    /// Date the job was due when it was spawned. Date shifts only move
    /// the scheduler's copy, see [`RunningJob::join_date`].
    ///
    /// [`RunningJob::join_date`]: crate::schedule::RunningJob::join_date
    #[must_use]
    pub const fn join_date(&self) -> Date {
        self.join_date
    }

    /// Returns true once the join date has come.
    #[must_use]
    pub fn is_scheduled_to_be_joined(&self, now: Date) -> bool {
        self.join_date <= now
    }

    /// Hub `id` of the frozen graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        self.graph.node(id)
    }

    /// Annotation of hub `id`.
    #[must_use]
    pub fn annotation(&self, id: NodeId) -> &NodeAnnotation {
        &self.nodes[usize::from(id)]
    }

    /// Planned flow-share table of hub `id`.
    #[must_use]
    pub fn flows(&self, id: NodeId) -> &FlowStatMap {
        &self.nodes[usize::from(id)].flows
    }

    /// Planned flow-share table of hub `id`, mutably.
    pub fn flows_mut(&mut self, id: NodeId) -> &mut FlowStatMap {
        &mut self.nodes[usize::from(id)].flows
    }

    /// Path legs leaving hub `id`, flowing ones first.
    #[must_use]
    pub fn paths(&self, id: NodeId) -> &VecDeque<PathId> {
        &self.nodes[usize::from(id)].paths
    }

    /// Path legs leaving hub `id`, mutably. Keep legs without flow at the back.
    pub fn paths_mut(&mut self, id: NodeId) -> &mut VecDeque<PathId> {
        &mut self.nodes[usize::from(id)].paths
    }

    /// Annotation of the edge from `from` to `to`.
    #[must_use]
    pub fn edge_annotation(&self, from: NodeId, to: NodeId) -> &EdgeAnnotation {
        &self.edges[usize::from(from)][usize::from(to)]
    }

    /// Annotation of the edge from `from` to `to`, mutably.
    pub fn edge_annotation_mut(&mut self, from: NodeId, to: NodeId) -> &mut EdgeAnnotation {
        &mut self.edges[usize::from(from)][usize::from(to)]
    }

    /// Assigns `amount` of `from`'s supply to `to`, adding it as demand on
    /// the edge between them.
    pub fn deliver_supply(&mut self, from: NodeId, to: NodeId, amount: u32) {
        let node = &mut self.nodes[usize::from(from)];
        debug_assert!(amount <= node.undelivered_supply);
        node.undelivered_supply = node.undelivered_supply.saturating_sub(amount);
        self.edges[usize::from(from)][usize::from(to)].add_demand(amount);
    }

    /// Drops every planned record originating at `origin`, in every hub.
    pub fn erase_flows(&mut self, origin: StationId) {
        for node in &mut self.nodes {
            node.flows.remove(origin);
        }
    }

    /// Allocates a new path leg at hub `node`.
    pub fn new_path(&mut self, node: NodeId, source: bool) -> PathId {
        self.paths.alloc(FlowPath::new(node, source))
    }

    /// Path leg `id`. Unknown ids resolve to the sentinel.
    #[must_use]
    pub fn path(&self, id: PathId) -> &FlowPath {
        self.paths.get(id)
    }

    /// Path leg `id`, mutably. `None` for the sentinel.
    pub fn path_mut(&mut self, id: PathId) -> Option<&mut FlowPath> {
        self.paths.get_mut(id)
    }

    /// Number of live path legs.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Re-parents `id` below `base`.
    ///
    /// Capacity and free capacity become the minimum of `base`'s and the
    /// given values, distance becomes `base`'s plus `distance`.
    pub fn fork_path(&mut self, id: PathId, base: PathId, capacity: u32, free_capacity: i32, distance: u32) {
        self.paths.fork(id, base, capacity, free_capacity, distance);
    }

    /// Detaches `id` from its parent.
    pub fn detach_path(&mut self, id: PathId) {
        self.paths.detach(id);
    }

    /// Detaches and frees `id`. It must not be listed at any hub anymore.
    pub fn release_path(&mut self, id: PathId) {
        self.paths.release(id);
    }

    /// Pushes up to `flow` along the path ending in `id`.
    ///
    /// Flow is pushed from the root down. With `max_saturation` set, no
    /// edge is filled beyond that percentage of its capacity; the pushed
    /// amount shrinks accordingly. A leg that gains its first flow moves to
    /// the front of its parent hub's path list. Returns the amount pushed.
    pub fn add_path_flow(&mut self, id: PathId, flow: u32, max_saturation: Option<u32>) -> u32 {
        if !id.is_valid() {
            return 0;
        }
        let leg = self.paths.get(id);
        let (node, parent, leg_flow) = (leg.node, leg.parent, leg.flow);
        let mut new_flow = flow;

        if let Some(parent) = parent {
            let parent_node = self.paths.get(parent).node;
            let (from, to) = (usize::from(parent_node), usize::from(node));
            if let Some(saturation) = max_saturation {
                let capacity = u64::from(self.graph.edge(parent_node, node).capacity());
                let usable = u32::try_from(capacity * u64::from(saturation) / 100).unwrap_or(u32::MAX);
                let planned = self.edges[from][to].flow;
                if usable <= planned {
                    return 0;
                }
                new_flow = new_flow.min(usable - planned);
            }
            new_flow = self.add_path_flow(parent, new_flow, max_saturation);
            if leg_flow == 0 && new_flow > 0 {
                let list = &mut self.nodes[from].paths;
                list.retain(|&p| p != id);
                list.push_front(id);
            }
            self.edges[from][to].add_flow(new_flow);
        }

        if let Some(leg) = self.paths.get_mut(id) {
            leg.add_leg_flow(new_flow);
        }
        new_flow
    }
}
