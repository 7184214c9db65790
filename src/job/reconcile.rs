//! Joining a finished job back into the live network.

use tracing::debug;

use super::ComputationJob;
use crate::config::DistributionPolicy;
use crate::flow::FlowStat;
use crate::graph::GraphPool;
use crate::station::{RerouteRequest, StationRegistry};
use crate::types::{GraphId, JobId, StationId};

/// Outcome of joining one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Job that was joined.
    pub job: Option<JobId>,
    /// Graph the job was copied from.
    pub graph: Option<GraphId>,
    /// Hubs whose planned flows reached their station.
    pub applied: usize,
    /// Hubs whose results were dropped because the station changed.
    pub discarded: usize,
    /// Cargo to be rerouted after flows were deleted.
    pub reroutes: Vec<RerouteRequest>,
}

impl ComputationJob {
    /// Moves the planned flows of every hub into its station's table.
    ///
    /// Results for stations that are gone or no longer mirrored by the same
    /// hub are dropped. Shares over links that disappeared are deleted;
    /// shares over links only used restricted are restricted. Records the
    /// job didn't produce are invalidated under automatic distribution and
    /// deleted (with their cargo rerouted) under manual distribution. If the
    /// graph itself is gone, nothing is applied.
    pub fn finalise(
        mut self,
        graphs: &GraphPool,
        stations: &mut StationRegistry,
        policy: &dyn DistributionPolicy,
    ) -> JoinReport {
        let mut report = JoinReport {
            job: Some(self.id),
            graph: Some(self.graph_id()),
            ..JoinReport::default()
        };
        let Some(live) = graphs.get(self.graph_id()) else {
            debug!(job = %self.id, graph = %self.graph_id(), "link graph gone, dropping results");
            return report;
        };
        let cargo = self.cargo();
        let graph_id = self.graph_id();
        let automatic = policy.distribution_type(cargo).is_automatic();
        let frozen = self.shared_graph();

        for node_id in frozen.node_ids() {
            let from = frozen.node(node_id);
            let station = from.station();
            if !stations
                .get(station)
                .is_some_and(|st| st.is_hub(cargo, graph_id, node_id))
            {
                debug!(job = %self.id, %station, "station changed, dropping its flows");
                self.erase_flows(station);
                report.discarded += 1;
                continue;
            }

            let mut flows = std::mem::take(self.flows_mut(node_id));
            let mut erased_origins = Vec::new();
            for (to, _) in from.edges() {
                if self.edge_annotation(node_id, to).flow() == 0 {
                    continue;
                }
                let via = frozen.node(to).station();
                let via_valid = stations
                    .get(via)
                    .is_some_and(|st| st.is_hub(cargo, graph_id, to));
                let live_edge = (usize::from(node_id.max(to)) < live.size()).then(|| live.edge(node_id, to));
                match live_edge {
                    Some(edge) if via_valid && edge.last_update().is_valid() => {
                        if !edge.last_unrestricted_update().is_valid() {
                            flows.restrict_flows(via);
                        }
                    }
                    _ => {
                        // Also drop the live records of origins that vanished,
                        // so old and new flows can't form a cycle.
                        erased_origins.extend(flows.delete_flows(via));
                    }
                }
            }

            let Some(st) = stations.get_mut(station) else {
                continue;
            };
            let ge = st.goods_mut(cargo);
            for origin in erased_origins {
                ge.flows.remove(origin);
            }

            let live_origins: Vec<StationId> = ge.flows.origins().collect();
            for origin in live_origins {
                if let Some(mut planned) = flows.remove(origin) {
                    if let Some(record) = ge.flows.get_mut(origin) {
                        record.swap_shares(&mut planned);
                    }
                } else if automatic {
                    if let Some(record) = ge.flows.get_mut(origin) {
                        record.invalidate();
                    }
                } else if let Some(mut record) = ge.flows.remove(origin) {
                    let mut stale = FlowStat::new(StationId::INVALID, 1, false);
                    record.swap_shares(&mut stale);
                    report.reroutes.extend(stale.shares().values().map(|&avoid| RerouteRequest {
                        station,
                        cargo,
                        avoid,
                        avoid2: station,
                    }));
                }
            }
            for (origin, record) in flows {
                ge.flows.insert(origin, record);
            }
            report.applied += 1;
        }

        debug!(
            job = %self.id,
            applied = report.applied,
            discarded = report.discarded,
            reroutes = report.reroutes.len(),
            "joined link graph job"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{DistributionType, LinkGraphSettings};
    use crate::graph::{EdgeUpdateMode, GraphStore};
    use crate::station::Station;
    use crate::time::Date;
    use crate::types::{CargoId, Position};

    const CARGO: CargoId = CargoId(0);

    struct Fixture {
        graphs: GraphPool,
        stations: StationRegistry,
    }

    /// Stations 0 and 1 linked both ways in graph 0.
    fn fixture() -> Fixture {
        let mut graphs = GraphPool::new(4);
        let id = graphs.allocate(CARGO, Date::ZERO).unwrap();
        let mut stations = StationRegistry::new();
        let g = graphs.get_mut(id).unwrap();
        for i in 0..2u16 {
            let node = g.add_node(StationId(i), Position::new(u32::from(i), 0), 0);
            let mut st = Station::new(StationId(i), Position::new(u32::from(i), 0));
            let ge = st.goods_mut(CARGO);
            ge.graph = Some(id);
            ge.node = node;
            stations.insert(st);
        }
        g.node_mut(0)
            .update_edge(1, 10, 0, EdgeUpdateMode::increase(), Date::ZERO);
        g.node_mut(1)
            .update_edge(0, 10, 0, EdgeUpdateMode::increase(), Date::ZERO);
        Fixture { graphs, stations }
    }

    /// Job planning 6 units from station 0 via station 1.
    fn planned_job(f: &Fixture) -> ComputationJob {
        let copy = f.graphs.get(GraphId(0)).unwrap().clone();
        let mut job = ComputationJob::new(JobId(1), Arc::new(copy), LinkGraphSettings::default(), Date::ZERO);
        job.init();
        job.edge_annotation_mut(0, 1).add_flow(6);
        job.flows_mut(0).add_flow(StationId(0), StationId(1), 6);
        job.flows_mut(1).add_flow(StationId(0), StationId::INVALID, 6);
        job
    }

    #[test]
    fn flows_reach_stations() {
        let mut f = fixture();
        let job = planned_job(&f);
        let report = job.finalise(&f.graphs, &mut f.stations, &LinkGraphSettings::default());
        assert_eq!(report.applied, 2);
        assert!(report.reroutes.is_empty());
        let flows = f.stations.goods(StationId(0), CARGO).unwrap().flows();
        assert_eq!(flows.flow_from_via(StationId(0), StationId(1)), 6);
        let flows = f.stations.goods(StationId(1), CARGO).unwrap().flows();
        assert_eq!(flows.flow_from_via(StationId(0), StationId::INVALID), 6);
    }

    #[test]
    fn removed_graph_drops_everything() {
        let mut f = fixture();
        let job = planned_job(&f);
        f.graphs.remove(GraphId(0));
        let report = job.finalise(&f.graphs, &mut f.stations, &LinkGraphSettings::default());
        assert_eq!(report.applied, 0);
        assert!(f.stations.goods(StationId(0), CARGO).unwrap().flows().is_empty());
    }

    #[test]
    fn removed_link_deletes_shares() {
        let mut f = fixture();
        let job = planned_job(&f);
        f.graphs.get_mut(GraphId(0)).unwrap().node_mut(0).remove_edge(1);
        let report = job.finalise(&f.graphs, &mut f.stations, &LinkGraphSettings::default());
        assert_eq!(report.applied, 2);
        assert!(f.stations.goods(StationId(0), CARGO).unwrap().flows().is_empty());
    }

    #[test]
    fn restricted_link_restricts_shares() {
        let mut f = fixture();
        let job = planned_job(&f);
        let g = f.graphs.get_mut(GraphId(0)).unwrap();
        g.node_mut(0)
            .touch_edge(1, crate::graph::Restriction::Restricted, Date::from_days(2));
        g.node_mut(0).restrict_edge(1);
        job.finalise(&f.graphs, &mut f.stations, &LinkGraphSettings::default());
        let record = f
            .stations
            .goods(StationId(0), CARGO)
            .unwrap()
            .flows()
            .get(StationId(0))
            .unwrap()
            .clone();
        assert_eq!(record.unrestricted(), 0);
        assert_eq!(record.share(StationId(1)), 6);
    }

    #[test]
    fn moved_station_discards_its_results() {
        let mut f = fixture();
        let job = planned_job(&f);
        f.stations
            .get_mut(StationId(1))
            .unwrap()
            .goods_mut(CARGO)
            .node = 7;
        let report = job.finalise(&f.graphs, &mut f.stations, &LinkGraphSettings::default());
        assert_eq!(report.discarded, 1);
        // The only share at station 0 went via the moved station.
        assert!(f.stations.goods(StationId(0), CARGO).unwrap().flows().is_empty());
    }

    #[test]
    fn stale_records_follow_distribution_mode() {
        let mut f = fixture();
        let stale_origin = StationId(9);
        for st in [StationId(0), StationId(1)] {
            let ge = f.stations.get_mut(st).unwrap().goods_mut(CARGO);
            ge.flows.add_flow(stale_origin, StationId(1), 4);
            ge.flows.add_flow(stale_origin, StationId(0), 2);
        }

        // Manual: deleted, cargo rerouted around every old next hop.
        let job = planned_job(&f);
        let manual = LinkGraphSettings::default();
        let report = job.finalise(&f.graphs, &mut f.stations, &manual);
        assert!(!f
            .stations
            .goods(StationId(0), CARGO)
            .unwrap()
            .flows()
            .contains(stale_origin));
        assert_eq!(report.reroutes.len(), 4);
        assert!(report.reroutes.contains(&RerouteRequest {
            station: StationId(0),
            cargo: CARGO,
            avoid: StationId(1),
            avoid2: StationId(0),
        }));

        // Automatic: kept but shrunk to minimal shares.
        let mut f = fixture();
        let ge = f.stations.get_mut(StationId(0)).unwrap().goods_mut(CARGO);
        ge.flows.add_flow(stale_origin, StationId(1), 4);
        let job = planned_job(&f);
        let auto = LinkGraphSettings::default().with_distribution(CARGO, DistributionType::Asymmetric);
        let report = job.finalise(&f.graphs, &mut f.stations, &auto);
        assert!(report.reroutes.is_empty());
        let flows = f.stations.goods(StationId(0), CARGO).unwrap().flows();
        assert_eq!(flows.flow_from(stale_origin), 1);
    }
}
