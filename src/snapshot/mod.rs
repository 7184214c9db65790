//! Save/restore of the whole distribution network.
//!
//! A [`NetworkSnapshot`] is a plain serde value: graphs, stations, the
//! schedule, the clock and the running jobs. Jobs are stored as the inputs
//! needed to restart them (graph copy, settings, join date); their partial
//! results are not kept and the computation simply runs again on restore.
//!
//! With the `persistent` feature, [`codec`] frames snapshots into
//! checksummed files.

#[cfg(feature = "persistent")]
pub mod codec;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{LinkGraphSettings, NetworkLimits};
use crate::error::SnapshotError;
use crate::graph::GraphStore;
use crate::station::StationRegistry;
use crate::time::Date;
use crate::types::{GraphId, JobId};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// A running job as it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identity.
    pub id: JobId,
    /// The frozen graph copy the job computes on.
    pub graph: GraphStore,
    /// Settings the job was spawned with.
    pub settings: LinkGraphSettings,
    /// Date the job is due.
    pub join_date: Date,
}

/// Everything needed to rebuild a [`DistributionNetwork`](crate::network::DistributionNetwork).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Layout version, [`SNAPSHOT_VERSION`] when written by this crate.
    pub version: u8,
    /// Current simulation date.
    pub date: Date,
    /// Live settings.
    pub settings: LinkGraphSettings,
    /// Identifier budgets.
    pub limits: NetworkLimits,
    /// Live graphs, in id order.
    pub graphs: Vec<GraphStore>,
    /// Stations with their hub assignments and flow tables.
    pub stations: StationRegistry,
    /// Graphs waiting for their next job, next first.
    pub queue: Vec<GraphId>,
    /// Running jobs, oldest first.
    pub jobs: Vec<JobRecord>,
}

impl NetworkSnapshot {
    /// Checks the snapshot can be restored.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is unknown or a graph or job id
    /// appears twice.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let mut graphs = BTreeSet::new();
        for graph in &self.graphs {
            if !graphs.insert(graph.id()) {
                return Err(SnapshotError::DuplicateGraph(graph.id()));
            }
        }
        let mut jobs = BTreeSet::new();
        for job in &self.jobs {
            if !jobs.insert(job.id) {
                return Err(SnapshotError::DuplicateJob(job.id));
            }
        }
        Ok(())
    }
}
