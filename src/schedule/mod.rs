//! Job scheduling.
//!
//! The [`Scheduler`] keeps a FIFO of graphs waiting for their next job and
//! the list of running jobs, oldest first. Once per day the simulation asks
//! it to spawn the next job or to join the oldest one.

mod worker;

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

pub use worker::{Spawner, Task, ThreadSpawner};

use worker::Execution;

use crate::config::{DistributionPolicy, LinkGraphSettings};
use crate::graph::{GraphPool, GraphStore};
use crate::job::{ComputationJob, JoinReport};
use crate::stage::Pipeline;
use crate::station::StationRegistry;
use crate::time::Date;
use crate::types::{GraphId, JobId};

/// What the daily driver should do on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyAction {
    /// Spawn the next job.
    Spawn,
    /// Join the oldest job if it is due.
    Join,
}

impl DailyAction {
    /// Spawn on the first day of each recalculation interval, join halfway.
    #[must_use]
    pub fn for_day(now: Date, recalc_interval: i32) -> Option<Self> {
        let interval = recalc_interval.max(1);
        let offset = now.days().rem_euclid(interval);
        if offset == 0 {
            Some(Self::Spawn)
        } else if offset == interval / 2 {
            Some(Self::Join)
        } else {
            None
        }
    }
}

/// A job in flight and what is needed to restart it.
pub struct RunningJob {
    id: JobId,
    graph: Arc<GraphStore>,
    settings: LinkGraphSettings,
    join_date: Date,
    execution: Execution,
}

impl RunningJob {
    /// Job identity.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Graph copy the job computes on.
    #[must_use]
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Settings taken at spawn time.
    #[must_use]
    pub const fn settings(&self) -> &LinkGraphSettings {
        &self.settings
    }

    /// Date the job is due.
    #[must_use]
    pub const fn join_date(&self) -> Date {
        self.join_date
    }

    /// Returns true once the join date has come.
    #[must_use]
    pub fn is_scheduled_to_be_joined(&self, now: Date) -> bool {
        self.join_date <= now
    }

    /// Returns true if the result can be collected without waiting.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.execution.is_completed()
    }
}

impl std::fmt::Debug for RunningJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningJob")
            .field("id", &self.id)
            .field("graph", &self.graph.id())
            .field("join_date", &self.join_date)
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

/// Queue of graphs and list of running jobs.
pub struct Scheduler {
    schedule: VecDeque<GraphId>,
    running: VecDeque<RunningJob>,
    pipeline: Pipeline,
    spawner: Arc<dyn Spawner>,
    max_jobs: usize,
}

impl Scheduler {
    /// Creates a scheduler running `pipeline` on OS threads.
    #[must_use]
    pub fn new(pipeline: Pipeline, max_jobs: usize) -> Self {
        Self::with_spawner(pipeline, max_jobs, Arc::new(ThreadSpawner))
    }

    /// Creates a scheduler with a custom thread spawner.
    #[must_use]
    pub fn with_spawner(pipeline: Pipeline, max_jobs: usize, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            schedule: VecDeque::new(),
            running: VecDeque::new(),
            pipeline,
            spawner,
            max_jobs: max_jobs.clamp(1, usize::from(u16::MAX)),
        }
    }

    /// The stage list every job runs.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Appends `graph` to the queue.
    pub fn queue(&mut self, graph: GraphId) {
        debug_assert!(!self.is_queued(graph), "{graph} queued twice");
        self.schedule.push_back(graph);
    }

    /// Removes `graph` from the queue.
    pub fn unqueue(&mut self, graph: GraphId) {
        self.schedule.retain(|&g| g != graph);
    }

    /// Returns true if `graph` waits in the queue.
    #[must_use]
    pub fn is_queued(&self, graph: GraphId) -> bool {
        self.schedule.contains(&graph)
    }

    /// Queued graphs, next first.
    pub fn queued(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.schedule.iter().copied()
    }

    /// Running jobs, oldest first.
    pub fn running(&self) -> impl Iterator<Item = &RunningJob> {
        self.running.iter()
    }

    /// Returns true if a job for `graph` is running.
    #[must_use]
    pub fn is_running(&self, graph: GraphId) -> bool {
        self.running.iter().any(|j| j.graph.id() == graph)
    }

    /// Spawns a job for the first queued graph with at least two hubs.
    ///
    /// Smaller graphs are rotated to the back of the queue. The graph is
    /// copied before the job starts and leaves the queue until its job is
    /// joined. Returns the new job's id.
    ///
    /// # Panics
    ///
    /// Panics if every job id is in use.
    pub fn spawn_next(&mut self, graphs: &GraphPool, settings: &LinkGraphSettings, now: Date) -> Option<JobId> {
        let mut picked = None;
        for _ in 0..self.schedule.len() {
            let Some(id) = self.schedule.pop_front() else {
                break;
            };
            match graphs.get(id) {
                Some(graph) if graph.size() >= 2 => {
                    picked = Some(graph);
                    break;
                }
                Some(_) => self.schedule.push_back(id),
                None => debug!(graph = %id, "dropping queue entry of deleted link graph"),
            }
        }
        let graph = picked?;

        let job_id = self.allocate_job_id();
        let join_date = now + settings.recalc_time_days();
        let copy = Arc::new(graph.clone());
        debug!(job = %job_id, graph = %graph.id(), size = graph.size(), %join_date, "spawning link graph job");
        self.start(job_id, copy, settings.clone(), join_date);
        Some(job_id)
    }

    /// Restarts a job from its graph copy, keeping its id and join date.
    pub fn resume(&mut self, id: JobId, graph: GraphStore, settings: LinkGraphSettings, join_date: Date) {
        debug!(job = %id, graph = %graph.id(), %join_date, "resuming link graph job");
        self.start(id, Arc::new(graph), settings, join_date);
    }

    fn start(&mut self, id: JobId, graph: Arc<GraphStore>, settings: LinkGraphSettings, join_date: Date) {
        let threaded = settings.threaded;
        let job = ComputationJob::new(id, Arc::clone(&graph), settings.clone(), join_date);
        let execution = if threaded {
            Execution::spawn(self.spawner.as_ref(), &self.pipeline, job)
        } else {
            Execution::inline(&self.pipeline, job)
        };
        self.running.push_back(RunningJob {
            id,
            graph,
            settings,
            join_date,
            execution,
        });
    }

    fn allocate_job_id(&self) -> JobId {
        (0..self.max_jobs)
            .filter_map(|i| u16::try_from(i).ok())
            .map(JobId)
            .find(|id| self.running.iter().all(|j| j.id != *id))
            .unwrap_or_else(|| panic!("link graph job ids exhausted ({} jobs running)", self.running.len()))
    }

    /// Returns true if a job is due but still computing, so joining would
    /// block the simulation.
    #[must_use]
    pub fn is_join_with_unfinished_job_due(&self, now: Date) -> bool {
        for job in &self.running {
            if !job.is_scheduled_to_be_joined(now) {
                return false;
            }
            if !job.is_completed() {
                return true;
            }
        }
        false
    }

    /// Joins the oldest job if it is due.
    ///
    /// Waits for the worker, reconciles the results into `stations` and puts
    /// the graph back at the end of the queue if it still exists.
    pub fn join_next(
        &mut self,
        now: Date,
        graphs: &GraphPool,
        stations: &mut StationRegistry,
        policy: &dyn DistributionPolicy,
    ) -> Option<JoinReport> {
        if !self.running.front()?.is_scheduled_to_be_joined(now) {
            return None;
        }
        let running = self.running.pop_front()?;
        let graph_id = running.graph.id();
        let report = match running.execution.join() {
            Some(job) => job.finalise(graphs, stations, policy),
            None => {
                debug!(job = %running.id, graph = %graph_id, "job produced no result");
                JoinReport {
                    job: Some(running.id),
                    graph: Some(graph_id),
                    ..JoinReport::default()
                }
            }
        };
        if graphs.contains(graph_id) {
            // Recycled ids must not end up queued twice.
            self.unqueue(graph_id);
            self.queue(graph_id);
        }
        Some(report)
    }

    /// Shifts the dates of every graph and the join date of every job.
    pub fn shift_dates(&mut self, interval: i32, graphs: &mut GraphPool) {
        for graph in graphs.iter_mut() {
            graph.shift_dates(interval);
        }
        for job in &mut self.running {
            job.join_date += interval;
        }
    }

    /// Waits for every running job and drops all state.
    pub fn clear(&mut self) {
        for job in self.running.drain(..) {
            let _ = job.execution.join();
        }
        self.schedule.clear();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("schedule", &self.schedule)
            .field("running", &self.running)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
