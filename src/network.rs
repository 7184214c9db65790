//! The distribution network: every link graph, the stations they mirror,
//! the job scheduler and the clock.
//!
//! [`DistributionNetwork`] is what the simulation talks to. Gameplay events
//! (a vehicle loading at a station, supply being produced, a station being
//! demolished) come in through its methods and never fail; the daily tick
//! drives job spawning and joining; routing consumers read the flow tables
//! of the stations afterwards.
//!
//! # Example
//!
//! ```
//! use cargodist::{CargoId, Date, DistributionNetwork, EdgeUpdateMode, LinkGraphSettings, Position, StationId};
//!
//! let mut net = DistributionNetwork::builder()
//!     .settings(LinkGraphSettings { threaded: false, ..LinkGraphSettings::default() })
//!     .build()
//!     .unwrap();
//! net.add_station(StationId(1), Position::new(0, 0));
//! net.add_station(StationId(2), Position::new(10, 0));
//! net.increase_stats(StationId(1), CargoId(0), StationId(2), 40, 10, EdgeUpdateMode::increase());
//!
//! let graph = net.graph_of(StationId(1), CargoId(0)).unwrap();
//! assert_eq!(net.graph(graph).unwrap().size(), 2);
//! assert!(net.on_new_day(Date::from_days(4)).is_none());
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{DistributionPolicy, LinkGraphSettings, NetworkLimits};
use crate::error::{DistResult, SnapshotError, ValidationError};
use crate::flow::FlowStatMap;
use crate::graph::{
    EdgeUpdateMode, GraphPool, GraphStore, NodeRelocated, COMPRESSION_INTERVAL, MIN_TIMEOUT_DISTANCE,
};
use crate::job::JoinReport;
use crate::schedule::{DailyAction, Scheduler, Spawner, ThreadSpawner};
use crate::snapshot::{JobRecord, NetworkSnapshot, SNAPSHOT_VERSION};
use crate::stage::Pipeline;
use crate::station::{GoodsEntry, RerouteRequest, Station, StationRegistry};
use crate::time::Date;
use crate::types::{CargoId, GraphId, JobId, NodeId, Position, StationId};

/// Builder for [`DistributionNetwork`].
#[derive(Default)]
pub struct DistributionNetworkBuilder {
    settings: Option<LinkGraphSettings>,
    limits: Option<NetworkLimits>,
    pipeline: Option<Pipeline>,
    spawner: Option<Arc<dyn Spawner>>,
    policy: Option<Arc<dyn DistributionPolicy>>,
    start_date: Option<Date>,
}

impl DistributionNetworkBuilder {
    /// Creates a builder with default settings and limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the link graph settings.
    #[must_use]
    pub fn settings(mut self, settings: LinkGraphSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the identifier budgets.
    #[must_use]
    pub fn limits(mut self, limits: NetworkLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Sets the stages every job runs after initialisation.
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Sets the thread spawner used for jobs.
    #[must_use]
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Sets the policy deciding the distribution mode at join time.
    /// Without one, the live settings decide.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn DistributionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the initial date. Defaults to day zero.
    #[must_use]
    pub fn start_date(mut self, date: Date) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Builds an empty network.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the settings or limits are invalid.
    pub fn build(self) -> DistResult<DistributionNetwork> {
        let settings = self.settings.unwrap_or_default();
        let limits = self.limits.unwrap_or_default();
        settings.validate()?;
        limits.validate()?;
        let scheduler = Scheduler::with_spawner(
            self.pipeline.unwrap_or_default(),
            limits.max_jobs,
            self.spawner.unwrap_or_else(|| Arc::new(ThreadSpawner)),
        );
        Ok(DistributionNetwork {
            graphs: GraphPool::new(limits.max_graphs),
            stations: StationRegistry::new(),
            scheduler,
            date: self.start_date.unwrap_or(Date::ZERO),
            reroutes: Vec::new(),
            policy: self.policy,
            settings,
            limits,
        })
    }

    /// Rebuilds a network from a snapshot.
    ///
    /// Settings, limits and the date come from the snapshot; the pipeline,
    /// spawner and policy from this builder. Running jobs are restarted
    /// from their graph copies and keep their ids and join dates.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fails validation or holds more
    /// graphs than its own limits allow.
    pub fn restore(self, snapshot: NetworkSnapshot) -> DistResult<DistributionNetwork> {
        snapshot.validate()?;
        let mut net = Self {
            settings: Some(snapshot.settings),
            limits: Some(snapshot.limits),
            start_date: Some(snapshot.date),
            ..self
        }
        .build()?;

        for graph in snapshot.graphs {
            net.graphs.insert(graph).map_err(|g| SnapshotError::Corrupt {
                reason: format!("{} exceeds the graph budget of {}", g.id(), net.limits.max_graphs),
            })?;
        }
        net.stations = snapshot.stations;
        for id in snapshot.queue {
            if net.graphs.contains(id) && !net.scheduler.is_queued(id) {
                net.scheduler.queue(id);
            }
        }
        for job in snapshot.jobs {
            net.scheduler.resume(job.id, job.graph, job.settings, job.join_date);
        }
        debug!(
            date = %net.date,
            graphs = net.graphs.len(),
            stations = net.stations.len(),
            "restored distribution network"
        );
        Ok(net)
    }
}

impl std::fmt::Debug for DistributionNetworkBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionNetworkBuilder")
            .field("settings", &self.settings)
            .field("limits", &self.limits)
            .field("pipeline", &self.pipeline)
            .field("start_date", &self.start_date)
            .finish_non_exhaustive()
    }
}

/// Link graphs, stations and job scheduling for every cargo type.
pub struct DistributionNetwork {
    settings: LinkGraphSettings,
    limits: NetworkLimits,
    graphs: GraphPool,
    stations: StationRegistry,
    scheduler: Scheduler,
    date: Date,
    reroutes: Vec<RerouteRequest>,
    policy: Option<Arc<dyn DistributionPolicy>>,
}

impl DistributionNetwork {
    /// Starts building a network.
    #[must_use]
    pub fn builder() -> DistributionNetworkBuilder {
        DistributionNetworkBuilder::new()
    }

    /// Creates an empty network with `settings` and default limits.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `settings` are invalid.
    pub fn new(settings: LinkGraphSettings) -> DistResult<Self> {
        Self::builder().settings(settings).build()
    }

    /// Current date.
    #[must_use]
    pub const fn date(&self) -> Date {
        self.date
    }

    /// Live settings. Running jobs keep the copy they were spawned with.
    #[must_use]
    pub const fn settings(&self) -> &LinkGraphSettings {
        &self.settings
    }

    /// Replaces the live settings.
    ///
    /// # Errors
    ///
    /// Returns an error and keeps the old settings if `settings` are invalid.
    pub fn set_settings(&mut self, settings: LinkGraphSettings) -> Result<(), ValidationError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Identifier budgets.
    #[must_use]
    pub const fn limits(&self) -> &NetworkLimits {
        &self.limits
    }

    /// All live graphs.
    #[must_use]
    pub const fn graphs(&self) -> &GraphPool {
        &self.graphs
    }

    /// Graph `id`.
    #[must_use]
    pub fn graph(&self, id: GraphId) -> Option<&GraphStore> {
        self.graphs.get(id)
    }

    /// All stations.
    #[must_use]
    pub const fn stations(&self) -> &StationRegistry {
        &self.stations
    }

    /// Station `id`.
    #[must_use]
    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(id)
    }

    /// The job scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Flow table routing `cargo` at `station`.
    #[must_use]
    pub fn flows(&self, station: StationId, cargo: CargoId) -> Option<&FlowStatMap> {
        self.stations.goods(station, cargo).map(GoodsEntry::flows)
    }

    /// Graph holding the hub of `station` for `cargo`.
    #[must_use]
    pub fn graph_of(&self, station: StationId, cargo: CargoId) -> Option<GraphId> {
        self.stations.goods(station, cargo)?.graph()
    }

    /// Registers a station. Returns false if it was already known.
    pub fn add_station(&mut self, id: StationId, xy: Position) -> bool {
        if self.stations.contains(id) {
            return false;
        }
        self.stations.insert(Station::new(id, xy));
        true
    }

    /// Moves a station and every hub mirroring it.
    pub fn move_station(&mut self, id: StationId, xy: Position) {
        let Some(station) = self.stations.get_mut(id) else {
            return;
        };
        station.set_xy(xy);
        for (_, ge) in station.goods_entries_mut() {
            let Some(graph) = ge.graph.and_then(|g| self.graphs.get_mut(g)) else {
                continue;
            };
            if usize::from(ge.node) < graph.size() {
                graph.node_mut(ge.node).update_location(xy);
            }
        }
    }

    /// Records that a vehicle with `capacity` (of which `usage` is used)
    /// travels from `from` to `to` carrying `cargo`.
    ///
    /// Creates a graph if neither station has a hub yet, adds the missing
    /// hub to the other station's graph, or merges the smaller of two
    /// graphs into the larger one. If no graph can be allocated the link is
    /// not tracked.
    pub fn increase_stats(
        &mut self,
        from: StationId,
        cargo: CargoId,
        to: StationId,
        capacity: u32,
        usage: u32,
        mode: EdgeUpdateMode,
    ) {
        if from == to || capacity == 0 || !self.stations.contains(from) || !self.stations.contains(to) {
            return;
        }
        let Some(graph) = self.link_graphs(from, cargo, to) else {
            return;
        };
        let (Some(n1), Some(n2)) = (self.hub(from, cargo, graph), self.hub(to, cargo, graph)) else {
            return;
        };
        if let Some(g) = self.graphs.get_mut(graph) {
            g.node_mut(n1)
                .update_edge(n2, capacity, usage.min(capacity), mode, self.date);
        }
    }

    /// Puts the hubs of `from` and `to` into one graph and returns it.
    fn link_graphs(&mut self, from: StationId, cargo: CargoId, to: StationId) -> Option<GraphId> {
        let g1 = self.graph_of(from, cargo).filter(|&g| self.graphs.contains(g));
        let g2 = self.graph_of(to, cargo).filter(|&g| self.graphs.contains(g));
        match (g1, g2) {
            (None, None) => {
                let id = self.create_graph(cargo)?;
                self.add_hub(id, to, cargo);
                self.add_hub(id, from, cargo);
                Some(id)
            }
            (None, Some(g)) => {
                self.add_hub(g, from, cargo);
                Some(g)
            }
            (Some(g), None) => {
                self.add_hub(g, to, cargo);
                Some(g)
            }
            (Some(a), Some(b)) if a == b => Some(a),
            (Some(a), Some(b)) => {
                let size = |g| self.graphs.get(g).map_or(0, GraphStore::size);
                let (keep, gone) = if size(a) < size(b) { (b, a) } else { (a, b) };
                self.scheduler.unqueue(gone);
                let other = self.graphs.remove(gone)?;
                let moved = self.graphs.get_mut(keep)?.merge(other, self.date);
                debug!(graph = %keep, absorbed = %gone, hubs = moved.len(), "merged link graphs");
                relocate(&mut self.stations, cargo, moved);
                Some(keep)
            }
        }
    }

    fn create_graph(&mut self, cargo: CargoId) -> Option<GraphId> {
        let Some(id) = self.graphs.allocate(cargo, self.date) else {
            warn!(%cargo, limit = self.limits.max_graphs, "can't allocate link graph");
            return None;
        };
        self.scheduler.queue(id);
        debug!(graph = %id, %cargo, "created link graph");
        Some(id)
    }

    /// Adds a hub for `station` to `graph`.
    ///
    /// # Panics
    ///
    /// Panics if the graph already holds as many hubs as the hub budget allows.
    fn add_hub(&mut self, graph: GraphId, station: StationId, cargo: CargoId) -> Option<NodeId> {
        let st = self.stations.get_mut(station)?;
        let xy = st.xy();
        let g = self.graphs.get_mut(graph)?;
        assert!(
            g.size() < self.limits.max_hubs,
            "{graph}: hub budget of {} exhausted",
            self.limits.max_hubs
        );
        let ge = st.goods_mut(cargo);
        let node = g.add_node(station, xy, ge.acceptance);
        ge.graph = Some(graph);
        ge.node = node;
        Some(node)
    }

    fn hub(&self, station: StationId, cargo: CargoId, graph: GraphId) -> Option<NodeId> {
        self.stations
            .goods(station, cargo)
            .filter(|ge| ge.graph() == Some(graph))
            .map(GoodsEntry::node)
    }

    /// Adds `amount` of freshly produced `cargo` at `station`, creating a
    /// single-hub graph for it if needed.
    pub fn add_supply(&mut self, station: StationId, cargo: CargoId, amount: u32) {
        if !self.stations.contains(station) {
            return;
        }
        let graph = match self.graph_of(station, cargo).filter(|&g| self.graphs.contains(g)) {
            Some(g) => g,
            None => {
                let Some(g) = self.create_graph(cargo) else {
                    return;
                };
                self.add_hub(g, station, cargo);
                g
            }
        };
        let Some(node) = self.hub(station, cargo, graph) else {
            return;
        };
        if let Some(g) = self.graphs.get_mut(graph) {
            g.node_mut(node).update_supply(amount, self.date);
        }
    }

    /// Sets how much `cargo` the area around `station` accepts.
    pub fn set_acceptance(&mut self, station: StationId, cargo: CargoId, acceptance: u32) {
        let Some(st) = self.stations.get_mut(station) else {
            return;
        };
        let ge = st.goods_mut(cargo);
        ge.acceptance = acceptance;
        if let Some(g) = ge.graph.and_then(|g| self.graphs.get_mut(g)) {
            if usize::from(ge.node) < g.size() {
                g.node_mut(ge.node).set_demand(acceptance);
            }
        }
    }

    /// Removes a station and its hubs.
    ///
    /// Every other hub of the station's graphs forgets the cargo that came
    /// from it; hubs with a link to it also delete the shares via it and
    /// reroute the affected cargo. Graphs left empty are destroyed.
    pub fn remove_station(&mut self, id: StationId) -> Option<Station> {
        let hubs: Vec<(CargoId, GraphId, NodeId)> = self
            .stations
            .get(id)?
            .cargoes()
            .filter_map(|c| {
                let ge = self.stations.goods(id, c)?;
                Some((c, ge.graph()?, ge.node()))
            })
            .collect();

        for (cargo, graph_id, node) in hubs {
            let Some(graph) = self.graphs.get_mut(graph_id) else {
                continue;
            };
            if usize::from(node) >= graph.size() {
                continue;
            }
            for n in graph.node_ids() {
                let other = graph.node(n).station();
                let linked = graph.edge(n, node).last_update().is_valid();
                let Some(st) = self.stations.get_mut(other) else {
                    continue;
                };
                let ge = st.goods_mut(cargo);
                ge.flows.remove(id);
                if linked {
                    ge.flows.delete_flows(id);
                    self.reroutes.push(RerouteRequest {
                        station: other,
                        cargo,
                        avoid: id,
                        avoid2: other,
                    });
                }
            }
            let moved = graph.remove_node(node);
            let empty = graph.is_empty();
            relocate(&mut self.stations, cargo, moved);
            if empty {
                self.scheduler.unqueue(graph_id);
                self.graphs.remove(graph_id);
                debug!(graph = %graph_id, "deleted empty link graph");
            }
        }
        debug!(station = %id, "removed station");
        self.stations.remove(id)
    }

    /// Ages out the links leaving `station`.
    ///
    /// A link not serviced for longer than its timeout is removed and the
    /// shares via it deleted. A link only missing unrestricted service is
    /// restricted, one only missing restricted service is released. Cargo
    /// affected by a removal or restriction is rerouted. Graphs not
    /// compressed for [`COMPRESSION_INTERVAL`] days are compressed.
    pub fn delete_stale_links(&mut self, station: StationId) {
        let Some(from) = self.stations.get(station) else {
            return;
        };
        let from_xy = from.xy();
        let hubs: Vec<(CargoId, GraphId, NodeId)> = from
            .cargoes()
            .filter_map(|c| {
                let ge = from.goods(c)?;
                Some((c, ge.graph()?, ge.node()))
            })
            .collect();
        let now = self.date;
        let age = |date: Date| u32::try_from(now - date).unwrap_or(0);

        for (cargo, graph_id, node) in hubs {
            let Some(graph) = self.graphs.get_mut(graph_id) else {
                continue;
            };
            if usize::from(node) >= graph.size() {
                continue;
            }
            let links: Vec<_> = graph.node(node).edges().map(|(to, edge)| (to, *edge)).collect();
            for (to, edge) in links {
                let target = graph.node(to);
                let via = target.station();
                let timeout = MIN_TIMEOUT_DISTANCE + from_xy.manhattan(target.xy()) / 8;
                let unrestricted = edge.last_unrestricted_update();
                let restricted = edge.last_restricted_update();

                if !edge.last_update().is_valid() || age(edge.last_update()) > timeout {
                    graph.node_mut(node).remove_edge(to);
                    if let Some(st) = self.stations.get_mut(station) {
                        st.goods_mut(cargo).flows.delete_flows(via);
                    }
                    debug!(%station, %via, %cargo, "removed stale link");
                    self.reroutes.push(RerouteRequest {
                        station,
                        cargo,
                        avoid: via,
                        avoid2: station,
                    });
                } else if unrestricted.is_valid() && age(unrestricted) > timeout {
                    graph.node_mut(node).restrict_edge(to);
                    if let Some(st) = self.stations.get_mut(station) {
                        st.goods_mut(cargo).flows.restrict_flows(via);
                    }
                    self.reroutes.push(RerouteRequest {
                        station,
                        cargo,
                        avoid: via,
                        avoid2: station,
                    });
                } else if restricted.is_valid() && age(restricted) > timeout {
                    graph.node_mut(node).release_edge(to);
                }
            }

            if now - graph.last_compression() > COMPRESSION_INTERVAL {
                graph.compress(now);
                debug!(graph = %graph_id, "compressed link graph");
            }
        }
    }

    /// Advances the clock to `date` and runs the daily job action.
    ///
    /// Returns the report of the job joined today, if any. Its reroute
    /// requests are also queued for [`drain_reroutes`](Self::drain_reroutes).
    pub fn on_new_day(&mut self, date: Date) -> Option<JoinReport> {
        self.date = date;
        match DailyAction::for_day(date, self.settings.recalc_interval_days())? {
            DailyAction::Spawn => {
                self.spawn_next();
                None
            }
            DailyAction::Join => self.join_next(),
        }
    }

    /// Spawns a job for the next queued graph.
    pub fn spawn_next(&mut self) -> Option<JobId> {
        self.scheduler.spawn_next(&self.graphs, &self.settings, self.date)
    }

    /// Joins the oldest job if it is due.
    pub fn join_next(&mut self) -> Option<JoinReport> {
        let policy: &dyn DistributionPolicy = match &self.policy {
            Some(policy) => &**policy,
            None => &self.settings,
        };
        let report = self
            .scheduler
            .join_next(self.date, &self.graphs, &mut self.stations, policy)?;
        self.reroutes.extend(report.reroutes.iter().copied());
        Some(report)
    }

    /// Returns true if the simulation should pause because a due job is
    /// still computing.
    #[must_use]
    pub fn needs_pause(&self) -> bool {
        self.settings.pause_on_join && self.scheduler.is_join_with_unfinished_job_due(self.date)
    }

    /// Shifts the clock and every stored date by `interval` days.
    pub fn shift_dates(&mut self, interval: i32) {
        self.date += interval;
        self.scheduler.shift_dates(interval, &mut self.graphs);
    }

    /// Takes the reroute requests collected so far.
    pub fn drain_reroutes(&mut self) -> Vec<RerouteRequest> {
        std::mem::take(&mut self.reroutes)
    }

    /// Captures the whole network.
    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            version: SNAPSHOT_VERSION,
            date: self.date,
            settings: self.settings.clone(),
            limits: self.limits,
            graphs: self.graphs.iter().cloned().collect(),
            stations: self.stations.clone(),
            queue: self.scheduler.queued().collect(),
            jobs: self
                .scheduler
                .running()
                .map(|job| JobRecord {
                    id: job.id(),
                    graph: job.graph().clone(),
                    settings: job.settings().clone(),
                    join_date: job.join_date(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for DistributionNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionNetwork")
            .field("date", &self.date)
            .field("graphs", &self.graphs.len())
            .field("stations", &self.stations.len())
            .field("scheduler", &self.scheduler)
            .field("reroutes", &self.reroutes.len())
            .finish_non_exhaustive()
    }
}

fn relocate(stations: &mut StationRegistry, cargo: CargoId, moved: impl IntoIterator<Item = NodeRelocated>) {
    for m in moved {
        if let Some(st) = stations.get_mut(m.station) {
            let ge = st.goods_mut(cargo);
            ge.graph = Some(m.graph);
            ge.node = m.node;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARGO: CargoId = CargoId(0);

    fn inline_settings() -> LinkGraphSettings {
        LinkGraphSettings {
            threaded: false,
            ..LinkGraphSettings::default()
        }
    }

    fn network(stations: u16) -> DistributionNetwork {
        let mut net = DistributionNetwork::new(inline_settings()).unwrap();
        for i in 0..stations {
            net.add_station(StationId(i), Position::new(u32::from(i) * 10, 0));
        }
        net
    }

    fn link(net: &mut DistributionNetwork, a: u16, b: u16) {
        net.increase_stats(StationId(a), CARGO, StationId(b), 50, 10, EdgeUpdateMode::increase());
    }

    #[test]
    fn first_link_creates_queued_graph() {
        let mut net = network(2);
        link(&mut net, 0, 1);
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        assert_eq!(net.graph_of(StationId(1), CARGO), Some(g));
        assert!(net.scheduler().is_queued(g));
        let graph = net.graph(g).unwrap();
        // The destination hub is added first.
        assert_eq!(graph.node(0).station(), StationId(1));
        let n0 = net.station(StationId(0)).unwrap().goods(CARGO).unwrap().node();
        let n1 = net.station(StationId(1)).unwrap().goods(CARGO).unwrap().node();
        assert_eq!(graph.edge(n0, n1).capacity(), 50);
        assert_eq!(graph.edge(n1, n0).capacity(), 0);
    }

    #[test]
    fn unknown_stations_and_self_links_are_ignored() {
        let mut net = network(2);
        link(&mut net, 0, 9);
        link(&mut net, 0, 0);
        assert!(net.graphs().is_empty());
    }

    #[test]
    fn linking_two_graphs_merges_smaller_into_larger() {
        let mut net = network(5);
        link(&mut net, 0, 1);
        link(&mut net, 1, 2);
        link(&mut net, 3, 4);
        let big = net.graph_of(StationId(0), CARGO).unwrap();
        let small = net.graph_of(StationId(3), CARGO).unwrap();
        assert_ne!(big, small);

        link(&mut net, 4, 0);
        assert!(net.graph(small).is_none());
        assert!(!net.scheduler().is_queued(small));
        let graph = net.graph(big).unwrap();
        assert_eq!(graph.size(), 5);
        for i in 0..5 {
            let ge = net.station(StationId(i)).unwrap().goods(CARGO).unwrap();
            assert_eq!(ge.graph(), Some(big));
            assert_eq!(graph.node(ge.node()).station(), StationId(i));
        }
    }

    #[test]
    fn full_pool_leaves_link_untracked() {
        let limits = NetworkLimits {
            max_graphs: 1,
            ..NetworkLimits::default()
        };
        let mut net = DistributionNetwork::builder()
            .settings(inline_settings())
            .limits(limits)
            .build()
            .unwrap();
        for i in 0..4 {
            net.add_station(StationId(i), Position::default());
        }
        link(&mut net, 0, 1);
        link(&mut net, 2, 3);
        assert_eq!(net.graphs().len(), 1);
        assert_eq!(net.graph_of(StationId(2), CARGO), None);
    }

    #[test]
    fn supply_and_acceptance_reach_the_hub() {
        let mut net = network(1);
        net.set_acceptance(StationId(0), CARGO, 8);
        net.add_supply(StationId(0), CARGO, 30);
        net.add_supply(StationId(0), CARGO, 12);
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        let hub = net.graph(g).unwrap().node(0);
        assert_eq!(hub.supply(), 42);
        assert_eq!(hub.demand(), 8);

        net.set_acceptance(StationId(0), CARGO, 3);
        assert_eq!(net.graph(g).unwrap().node(0).demand(), 3);
    }

    #[test]
    fn move_station_moves_hubs() {
        let mut net = network(2);
        link(&mut net, 0, 1);
        net.move_station(StationId(0), Position::new(7, 7));
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        let node = net.station(StationId(0)).unwrap().goods(CARGO).unwrap().node();
        assert_eq!(net.graph(g).unwrap().node(node).xy(), Position::new(7, 7));
        assert_eq!(net.station(StationId(0)).unwrap().xy(), Position::new(7, 7));
    }

    #[test]
    fn removing_station_relocates_and_reroutes() {
        let mut net = network(3);
        link(&mut net, 0, 1);
        link(&mut net, 1, 2);
        link(&mut net, 2, 1);
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        // Station 2 routes cargo from 0 via 1.
        net.stations
            .get_mut(StationId(2))
            .unwrap()
            .goods_mut(CARGO)
            .flows
            .add_flow(StationId(0), StationId(1), 5);

        let removed_node = net.station(StationId(1)).unwrap().goods(CARGO).unwrap().node();
        net.remove_station(StationId(1)).unwrap();
        assert!(net.station(StationId(1)).is_none());
        assert_eq!(net.graph(g).unwrap().size(), 2);

        let reroutes = net.drain_reroutes();
        assert!(reroutes.contains(&RerouteRequest {
            station: StationId(2),
            cargo: CARGO,
            avoid: StationId(1),
            avoid2: StationId(2),
        }));
        assert!(net.flows(StationId(2), CARGO).unwrap().is_empty());
        assert!(net.drain_reroutes().is_empty());

        // Whoever sits in the freed slot still finds its hub.
        for st in [StationId(0), StationId(2)] {
            let node = net.station(st).unwrap().goods(CARGO).unwrap().node();
            assert_eq!(net.graph(g).unwrap().node(node).station(), st);
        }
        assert!(net
            .stations()
            .iter()
            .any(|s| s.goods(CARGO).unwrap().node() == removed_node));
    }

    #[test]
    fn removing_last_station_deletes_graph() {
        let mut net = network(1);
        net.add_supply(StationId(0), CARGO, 1);
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        net.remove_station(StationId(0));
        assert!(net.graph(g).is_none());
        assert!(!net.scheduler().is_queued(g));
        assert!(net.remove_station(StationId(0)).is_none());
    }

    #[test]
    fn stale_links_restrict_then_die() {
        let mut net = network(2);
        link(&mut net, 0, 1);
        net.stations
            .get_mut(StationId(0))
            .unwrap()
            .goods_mut(CARGO)
            .flows
            .add_flow(StationId(0), StationId(1), 5);
        // Timeout is 32 + 10 / 8 = 33 days.
        net.date = Date::from_days(33);
        net.delete_stale_links(StationId(0));
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        assert_eq!(net.graph(g).unwrap().node(1).edges().count(), 1);

        // Serviced restricted only; the unrestricted part ages out.
        let restricted = EdgeUpdateMode::increase().restricted();
        net.increase_stats(StationId(0), CARGO, StationId(1), 5, 0, restricted);
        net.date = Date::from_days(34);
        net.delete_stale_links(StationId(0));
        let edge = *net.graph(g).unwrap().edge(1, 0);
        assert!(edge.is_present());
        assert!(!edge.last_unrestricted_update().is_valid());
        let record = net.flows(StationId(0), CARGO).unwrap().get(StationId(0)).unwrap();
        assert_eq!(record.unrestricted(), 0);
        assert_eq!(net.drain_reroutes().len(), 1);

        net.date = Date::from_days(80);
        net.delete_stale_links(StationId(0));
        assert_eq!(net.graph(g).unwrap().node(1).edges().count(), 0);
        assert!(net.flows(StationId(0), CARGO).unwrap().is_empty());
        assert_eq!(net.drain_reroutes().len(), 1);
    }

    #[test]
    fn rewinding_past_a_stamp_keeps_the_link() {
        let mut net = network(2);
        net.date = Date::from_days(2);
        link(&mut net, 0, 1);
        net.date = Date::from_days(10);
        net.shift_dates(-10);
        assert_eq!(net.date(), Date::ZERO);

        let g = net.graph_of(StationId(0), CARGO).unwrap();
        let edge = *net.graph(g).unwrap().edge(1, 0);
        assert_eq!(edge.last_update(), Date::from_days(-8));
        assert!(edge.last_update().is_valid());

        net.delete_stale_links(StationId(0));
        assert!(net.graph(g).unwrap().edge(1, 0).is_present());
        assert!(net.drain_reroutes().is_empty());
    }

    #[test]
    fn old_graphs_get_compressed() {
        let mut net = network(2);
        net.increase_stats(StationId(0), CARGO, StationId(1), 50, 10, EdgeUpdateMode::increase());
        let g = net.graph_of(StationId(0), CARGO).unwrap();
        net.date = Date::from_days(300);
        net.increase_stats(StationId(0), CARGO, StationId(1), 50, 10, EdgeUpdateMode::increase());
        net.delete_stale_links(StationId(0));
        let graph = net.graph(g).unwrap();
        assert_eq!(graph.last_compression(), Date::from_days(150));
        assert_eq!(graph.edge(1, 0).capacity(), 50);
    }

    #[test]
    fn daily_driver_spawns_and_joins() {
        let mut net = network(2);
        link(&mut net, 0, 1);
        let g = net.graph_of(StationId(0), CARGO).unwrap();

        assert!(net.on_new_day(Date::from_days(4)).is_none());
        assert!(net.scheduler().is_running(g));
        assert!(!net.needs_pause());
        for day in 5..22 {
            assert!(net.on_new_day(Date::from_days(day)).is_none(), "day {day}");
        }
        let report = net.on_new_day(Date::from_days(22)).unwrap();
        assert_eq!(report.graph, Some(g));
        assert!(net.scheduler().is_queued(g));
    }

    #[test]
    fn shift_dates_moves_clock_and_jobs() {
        let mut net = network(2);
        link(&mut net, 0, 1);
        net.on_new_day(Date::from_days(8));
        net.shift_dates(-8);
        assert_eq!(net.date(), Date::ZERO);
        assert_eq!(net.scheduler().running().next().unwrap().join_date(), Date::from_days(16));
    }

    #[test]
    fn rejects_invalid_settings() {
        let bad = LinkGraphSettings {
            recalc_time: 0,
            ..LinkGraphSettings::default()
        };
        assert!(DistributionNetwork::new(bad.clone()).unwrap_err().is_validation());
        let mut net = network(0);
        assert!(net.set_settings(bad).is_err());
        assert_eq!(net.settings().recalc_time, 16);
    }

    #[test]
    fn snapshot_restores_jobs_and_queue() {
        let mut net = network(4);
        link(&mut net, 0, 1);
        link(&mut net, 2, 3);
        net.on_new_day(Date::from_days(4));
        let snap = net.snapshot();
        assert_eq!(snap.jobs.len(), 1);
        assert_eq!(snap.queue.len(), 1);

        let restored = DistributionNetwork::builder().restore(snap.clone()).unwrap();
        assert_eq!(restored.date(), Date::from_days(4));
        assert_eq!(restored.snapshot(), snap);
    }
}
