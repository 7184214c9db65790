//! Pipeline stages.
//!
//! A job is computed by running an ordered list of stages over it. The first
//! stage always initialises the annotations; demand estimation, flow solving
//! and flow mapping plug in behind it through [`StageHandler`].

use std::sync::Arc;

use tracing::trace;

use crate::job::ComputationJob;

/// One step of the computation.
///
/// Handlers are shared by every job and may run on several worker threads at
/// once. `run` must only touch the job it is given.
pub trait StageHandler: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Runs the stage.
    fn run(&self, job: &mut ComputationJob);
}

/// Sizes and initialises the job's annotations.
#[derive(Debug, Default, Clone, Copy)]
pub struct InitHandler;

impl StageHandler for InitHandler {
    fn name(&self) -> &'static str {
        "init"
    }

    fn run(&self, job: &mut ComputationJob) {
        job.init();
    }
}

/// Immutable ordered list of stages, starting with [`InitHandler`].
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Box<dyn StageHandler>]>,
}

impl Pipeline {
    /// Pipeline that only initialises annotations.
    #[must_use]
    pub fn init_only() -> Self {
        Self::new(Vec::new())
    }

    /// Pipeline running [`InitHandler`] followed by `stages`.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn StageHandler>>) -> Self {
        let mut all: Vec<Box<dyn StageHandler>> = Vec::with_capacity(stages.len() + 1);
        all.push(Box::new(InitHandler));
        all.extend(stages);
        Self { stages: all.into() }
    }

    /// Number of stages, including initialisation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; the initialisation stage is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.name())
    }

    /// Runs every stage over `job`, in order.
    pub fn run(&self, job: &mut ComputationJob) {
        for stage in self.stages.iter() {
            trace!(job = %job.id(), stage = stage.name(), "running stage");
            stage.run(job);
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::init_only()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
