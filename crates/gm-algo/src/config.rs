use std::fmt;

use gm_block::MatrixSource;

use crate::algorithm::Algorithm;
use crate::error::Result;
use crate::plan::Plan;

/// How the 2-D coordinator hands tasks to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Saturate every worker once, then send the next task to whichever
    /// worker returns a result first.
    #[default]
    OnDemand,
    /// Rounds: one task per worker in rank order, then wait for all of
    /// that round's results before starting the next round.
    Cyclic,
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPolicy::OnDemand => write!(f, "on-demand"),
            DispatchPolicy::Cyclic => write!(f, "cyclic"),
        }
    }
}

pub const DEFAULT_SEED: u64 = 42;

/// Parameters of one distributed multiplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Global matrix size (`n x n` operands).
    pub n: usize,
    /// Number of workers in the world group.
    pub workers: usize,
    pub algorithm: Algorithm,
    /// Edge of one 2-D task block. `None` picks the default for `n`.
    pub block_size: Option<usize>,
    pub dispatch: DispatchPolicy,
    /// Seed of the operand generators. A uses `seed`, B uses `seed + 1`.
    pub seed: u64,
    /// Undo Cannon's initial alignment so A and B end where they started.
    pub restore: bool,
    /// Collect the full C at the coordinator once the schedule finishes.
    pub gather: bool,
}

impl RunConfig {
    pub fn new(n: usize, workers: usize, algorithm: Algorithm) -> Self {
        RunConfig {
            n,
            workers,
            algorithm,
            block_size: None,
            dispatch: DispatchPolicy::default(),
            seed: DEFAULT_SEED,
            restore: true,
            gather: true,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchPolicy) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Seeded sources for A and B.
    pub fn seeded_operands(&self) -> (MatrixSource, MatrixSource) {
        (
            MatrixSource::seeded(self.seed),
            MatrixSource::seeded(self.seed.wrapping_add(1)),
        )
    }

    pub fn with_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    pub fn with_gather(mut self, gather: bool) -> Self {
        self.gather = gather;
        self
    }

    /// Check every precondition of the selected algorithm.
    ///
    /// Depends only on the configuration, never on the calling worker.
    pub fn validate(&self) -> Result<Plan> {
        Plan::for_config(self)
    }
}
