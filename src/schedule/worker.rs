//! Running one job off the simulation thread.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use tracing::warn;

use crate::job::ComputationJob;
use crate::stage::Pipeline;

/// Work handed to a [`Spawner`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Starts the thread a job runs on.
///
/// Spawning may fail; the job then runs inline on the calling thread.
pub trait Spawner: Send + Sync {
    /// Starts `task` on a new thread called `name`.
    fn spawn(&self, name: String, task: Task) -> io::Result<JoinHandle<()>>;
}

/// Spawns one named OS thread per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, name: String, task: Task) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name).spawn(task)
    }
}

/// Where a job is being computed.
pub(crate) enum Execution {
    /// On a worker thread; the job comes back through `done`.
    Threaded {
        done: Receiver<ComputationJob>,
        handle: JoinHandle<()>,
    },
    /// Already computed on the simulation thread.
    Finished(ComputationJob),
}

impl Execution {
    /// Runs `pipeline` over `job` on a thread from `spawner`, or inline when
    /// no thread can be started.
    pub(crate) fn spawn(spawner: &dyn Spawner, pipeline: &Pipeline, job: ComputationJob) -> Self {
        let name = format!("cargodist-job-{}", job.id().0);
        let (job_tx, job_rx) = bounded::<ComputationJob>(1);
        let (done_tx, done_rx) = bounded::<ComputationJob>(1);
        let worker_pipeline = pipeline.clone();
        let task: Task = Box::new(move || {
            if let Ok(mut job) = job_rx.recv() {
                worker_pipeline.run(&mut job);
                let _ = done_tx.send(job);
            }
        });

        match spawner.spawn(name, task) {
            Ok(handle) => match job_tx.send(job) {
                Ok(()) => Self::Threaded { done: done_rx, handle },
                Err(returned) => {
                    let _ = handle.join();
                    let job = returned.into_inner();
                    warn!(job = %job.id(), "job worker exited early, running inline");
                    Self::inline(pipeline, job)
                }
            },
            Err(err) => {
                warn!(job = %job.id(), error = %err, "failed to spawn job thread, running inline");
                Self::inline(pipeline, job)
            }
        }
    }

    /// Runs `pipeline` over `job` right away.
    pub(crate) fn inline(pipeline: &Pipeline, mut job: ComputationJob) -> Self {
        pipeline.run(&mut job);
        Self::Finished(job)
    }

    /// Returns true once the job's result is available without blocking.
    pub(crate) fn is_completed(&self) -> bool {
        match self {
            Self::Threaded { done, .. } => !done.is_empty(),
            Self::Finished(_) => true,
        }
    }

    /// Waits for the job. Returns `None` if the worker died.
    pub(crate) fn join(self) -> Option<ComputationJob> {
        match self {
            Self::Threaded { done, handle } => {
                let job = done.recv().ok();
                if handle.join().is_err() {
                    warn!("job worker panicked, results lost");
                    return None;
                }
                job
            }
            Self::Finished(job) => Some(job),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LinkGraphSettings;
    use crate::graph::GraphStore;
    use crate::time::Date;
    use crate::types::{CargoId, GraphId, JobId};

    /// Refuses every spawn.
    pub(crate) struct NoThreads;

    impl Spawner for NoThreads {
        fn spawn(&self, _name: String, _task: Task) -> io::Result<JoinHandle<()>> {
            Err(io::Error::other("no threads here"))
        }
    }

    fn job() -> ComputationJob {
        let g = GraphStore::new(GraphId(0), CargoId(0), Date::ZERO);
        ComputationJob::new(JobId(4), Arc::new(g), LinkGraphSettings::default(), Date::ZERO)
    }

    #[test]
    fn threaded_job_comes_back() {
        let exec = Execution::spawn(&ThreadSpawner, &Pipeline::init_only(), job());
        assert!(matches!(exec, Execution::Threaded { .. }));
        let back = exec.join().unwrap();
        assert_eq!(back.id(), JobId(4));
    }

    #[test]
    fn spawn_failure_runs_inline() {
        let exec = Execution::spawn(&NoThreads, &Pipeline::init_only(), job());
        assert!(exec.is_completed());
        assert!(matches!(exec, Execution::Finished(_)));
        assert_eq!(exec.join().unwrap().id(), JobId(4));
    }
}
