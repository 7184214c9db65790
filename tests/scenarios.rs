//! End-to-end scenarios: a graph going through a full job cycle, merging
//! graphs of different ages, and emptying a graph.

use cargodist::{
    CargoId, Date, DistributionNetwork, EdgeUpdateMode, GraphId, GraphStore, LinkGraphSettings, Position,
    StationId,
};

const CARGO: CargoId = CargoId(0);
const X: StationId = StationId(10);
const Y: StationId = StationId(11);

fn inline_network() -> DistributionNetwork {
    let settings = LinkGraphSettings {
        threaded: false,
        ..LinkGraphSettings::default()
    };
    DistributionNetwork::new(settings).unwrap()
}

/// Scenario A: a two-hub graph is queued, spawned with the init stage only
/// and joined. Nothing produced flows, so nothing reaches the stations.
#[test]
fn test_init_only_cycle_leaves_tables_empty() {
    let mut net = inline_network();
    net.add_station(X, Position::new(0, 0));
    net.add_station(Y, Position::new(20, 0));
    net.increase_stats(X, CARGO, Y, 10, 0, EdgeUpdateMode::increase());
    let graph = net.graph_of(X, CARGO).unwrap();
    assert!(net.scheduler().is_queued(graph));

    let job = net.spawn_next().expect("graph with two hubs is spawned");
    assert!(net.scheduler().is_running(graph));
    assert!(!net.scheduler().is_queued(graph));

    // Not due before recalc_time has passed.
    assert!(net.join_next().is_none());
    net.on_new_day(Date::from_days(17));
    let report = net.join_next().expect("job is due");
    assert_eq!(report.job, Some(job));
    assert_eq!(report.graph, Some(graph));
    assert_eq!(report.applied, 2);
    assert!(report.reroutes.is_empty());

    assert!(net.flows(X, CARGO).unwrap().is_empty());
    assert!(net.flows(Y, CARGO).unwrap().is_empty());
    assert!(net.scheduler().is_queued(graph));
    assert_eq!(net.scheduler().running().count(), 0);
}

/// Scenario A through the daily driver on real worker threads.
#[test]
fn test_threaded_cycle_through_daily_driver() {
    let mut net = DistributionNetwork::new(LinkGraphSettings::default()).unwrap();
    net.add_station(X, Position::new(0, 0));
    net.add_station(Y, Position::new(20, 0));
    net.increase_stats(X, CARGO, Y, 10, 0, EdgeUpdateMode::increase());

    let mut reports = Vec::new();
    for day in 1..=40 {
        reports.extend(net.on_new_day(Date::from_days(day)));
    }
    // Spawned on day 4 and joined on day 22, spawned again on day 24.
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].graph, Some(GraphId(0)));
    assert!(net.scheduler().is_running(GraphId(0)));
    assert!(net.flows(X, CARGO).unwrap().is_empty());
}

/// Scenario B: merging a graph 100 days past its compression into one 10
/// days past scales the absorbed supply by 11/101.
#[test]
fn test_merge_scales_by_age() {
    let now = Date::from_days(1000);
    let mut young = GraphStore::new(GraphId(0), CARGO, now + -10);
    young.add_node(X, Position::new(0, 0), 0);
    young.node_mut(0).update_supply(500, now);

    let mut old = GraphStore::new(GraphId(1), CARGO, now + -100);
    old.add_node(Y, Position::new(5, 5), 0);
    old.node_mut(0).update_supply(1000, now);

    let moved = young.merge(old, now);
    assert_eq!(young.size(), 2);
    assert_eq!(young.node(0).supply(), 500);
    // 1000 * 11 / 101 = 108.9, rounded down.
    assert_eq!(young.node(1).supply(), 108);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].station, Y);
    assert_eq!(moved[0].graph, GraphId(0));
    assert_eq!(moved[0].node, 1);
}

/// Scenario B with the scaled value clamped at one.
#[test]
fn test_merge_never_scales_to_zero() {
    let now = Date::from_days(1000);
    let mut young = GraphStore::new(GraphId(0), CARGO, now);
    young.add_node(X, Position::default(), 0);
    let mut old = GraphStore::new(GraphId(1), CARGO, now + -500);
    old.add_node(Y, Position::default(), 0);
    old.add_node(StationId(12), Position::default(), 0);
    old.node_mut(0).update_supply(3, now);
    old.node_mut(0)
        .update_edge(1, 2, 1, EdgeUpdateMode::increase(), now);

    young.merge(old, now);
    assert_eq!(young.node(1).supply(), 1);
    assert_eq!(young.edge(1, 2).capacity(), 1);
    assert_eq!(young.edge(1, 2).usage(), 1);
    assert_eq!(young.node(1).edges().map(|(to, _)| to).collect::<Vec<_>>(), vec![2]);
}

/// Scenario C: removing the only hub leaves an empty graph.
#[test]
fn test_remove_only_hub() {
    let mut g = GraphStore::new(GraphId(0), CARGO, Date::ZERO);
    g.add_node(X, Position::default(), 0);
    assert!(g.remove_node(0).is_none());
    assert_eq!(g.size(), 0);
    assert!(g.is_empty());
    assert_eq!(g.node_ids().count(), 0);
}

/// Scenario C through the façade: the empty graph is destroyed.
#[test]
fn test_removing_last_station_destroys_graph() {
    let mut net = inline_network();
    net.add_station(X, Position::default());
    net.add_supply(X, CARGO, 5);
    let graph = net.graph_of(X, CARGO).unwrap();
    assert_eq!(net.graph(graph).unwrap().size(), 1);

    net.remove_station(X).unwrap();
    assert!(net.graph(graph).is_none());
    assert!(net.graphs().is_empty());
    assert!(net.spawn_next().is_none());
}
