//! # cargodist - cargo distribution graph engine
//!
//! cargodist keeps one link graph per cargo type and connected region of
//! stations, and periodically recomputes on a background thread how much
//! cargo should flow between the stations of each graph and along which
//! next hops.
//!
//! ## Core Concepts
//!
//! - **GraphStore**: hubs (one per station) and directed links with capacity,
//!   usage and freshness dates; merged, compressed and aged incrementally
//! - **ComputationJob**: a frozen copy of one graph plus per-run annotations,
//!   run through a [`Pipeline`] of [`StageHandler`]s
//! - **Scheduler**: the queue of graphs waiting for a job and the running
//!   jobs, driven once per simulated day
//! - **FlowStatMap**: per-station flow shares keyed by origin, filled in when
//!   a job is joined and read by routing consumers
//! - **DistributionNetwork**: the façade tying it together for the simulation
//!
//! ## Usage
//!
//! ```rust
//! use cargodist::{CargoId, Date, DistributionNetwork, EdgeUpdateMode, LinkGraphSettings, Position, StationId};
//!
//! let settings = LinkGraphSettings { threaded: false, ..LinkGraphSettings::default() };
//! let mut net = DistributionNetwork::new(settings)?;
//! net.add_station(StationId(0), Position::new(0, 0));
//! net.add_station(StationId(1), Position::new(8, 0));
//! net.increase_stats(StationId(0), CargoId(0), StationId(1), 30, 5, EdgeUpdateMode::increase());
//! net.add_supply(StationId(0), CargoId(0), 20);
//!
//! for day in 1..=30 {
//!     net.on_new_day(Date::from_days(day));
//! }
//! # Ok::<(), cargodist::DistError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod time;
pub mod types;

// Link graphs and flow shares
pub mod flow;
pub mod graph;
pub mod station;

// Computation and scheduling
pub mod job;
pub mod schedule;
pub mod stage;

// Façade and persistence
pub mod network;
pub mod snapshot;

// Re-export primary types at crate root for convenience
pub use config::{DistributionPolicy, DistributionType, LinkGraphSettings, NetworkLimits};
pub use error::{DistError, DistResult, SnapshotError, ValidationError};
pub use flow::{FlowStat, FlowStatMap, SharesMap};
pub use graph::{
    Edge, EdgeUpdateMode, GraphPool, GraphStore, NodeRelocated, Restriction, UpdatePolicy, COMPRESSION_INTERVAL,
    MAX_HUBS, MIN_TIMEOUT_DISTANCE,
};
pub use job::{ComputationJob, EdgeAnnotation, FlowPath, JoinReport, NodeAnnotation, PathId};
pub use network::{DistributionNetwork, DistributionNetworkBuilder};
pub use schedule::{DailyAction, RunningJob, Scheduler, Spawner, Task, ThreadSpawner};
pub use snapshot::{JobRecord, NetworkSnapshot, SNAPSHOT_VERSION};
pub use stage::{InitHandler, Pipeline, StageHandler};
pub use station::{GoodsEntry, RerouteRequest, Station, StationRegistry};
pub use time::Date;
pub use types::{CargoId, GraphId, JobId, NodeId, Position, StationId, INVALID_NODE};
