//! Per-run scratch data attached to the hubs and edges of a job.

use std::collections::VecDeque;

use super::path::PathId;
use crate::flow::FlowStatMap;

/// Demand and flow planned for one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeAnnotation {
    pub(crate) demand: u32,
    pub(crate) unsatisfied_demand: u32,
    pub(crate) flow: u32,
}

impl EdgeAnnotation {
    /// Transport demand between the two hubs.
    #[must_use]
    pub const fn demand(&self) -> u32 {
        self.demand
    }

    /// Demand not yet covered by flow.
    #[must_use]
    pub const fn unsatisfied_demand(&self) -> u32 {
        self.unsatisfied_demand
    }

    /// Planned flow over the edge.
    #[must_use]
    pub const fn flow(&self) -> u32 {
        self.flow
    }

    /// Adds planned flow.
    pub fn add_flow(&mut self, flow: u32) {
        self.flow = self.flow.saturating_add(flow);
    }

    /// Removes planned flow.
    pub fn remove_flow(&mut self, flow: u32) {
        debug_assert!(flow <= self.flow);
        self.flow = self.flow.saturating_sub(flow);
    }

    /// Adds demand, all of it unsatisfied.
    pub fn add_demand(&mut self, demand: u32) {
        self.demand = self.demand.saturating_add(demand);
        self.unsatisfied_demand = self.unsatisfied_demand.saturating_add(demand);
    }

    /// Marks some demand as covered.
    pub fn satisfy_demand(&mut self, demand: u32) {
        debug_assert!(demand <= self.unsatisfied_demand);
        self.unsatisfied_demand = self.unsatisfied_demand.saturating_sub(demand);
    }
}

/// Per-hub results of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeAnnotation {
    pub(crate) undelivered_supply: u32,
    pub(crate) paths: VecDeque<PathId>,
    pub(crate) flows: FlowStatMap,
}

impl NodeAnnotation {
    pub(crate) fn new(supply: u32) -> Self {
        Self {
            undelivered_supply: supply,
            paths: VecDeque::new(),
            flows: FlowStatMap::new(),
        }
    }

    /// Supply not yet assigned to a destination.
    #[must_use]
    pub const fn undelivered_supply(&self) -> u32 {
        self.undelivered_supply
    }

    /// Paths leaving this hub. Legs without flow are at the back.
    #[must_use]
    pub const fn paths(&self) -> &VecDeque<PathId> {
        &self.paths
    }

    /// Planned flow-share table of this hub.
    #[must_use]
    pub const fn flows(&self) -> &FlowStatMap {
        &self.flows
    }
}
