//! One driver per schedule, behind a common [`Driver`] contract.

pub mod broadcast;
pub mod cannon;
pub mod dns;

use std::fmt::Debug;

use gm_block::{BlockLayout, Kernel, Matrix, MatrixSource};
use gm_comm::Communicator;
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::config::RunConfig;
use crate::coordinator::{assemble, COORDINATOR_RANK};
use crate::error::{AlgoError, Result};
use crate::plan::Plan;
use crate::product::Product;

pub use broadcast::Broadcast2D;
pub use cannon::{ring_multiply, Cannon, RingSchedule};
pub use dns::Dns;

/// Everything a worker needs to take part in one run.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub config: &'a RunConfig,
    /// The validated shape of the run, identical on every worker.
    pub plan: &'a Plan,
    pub a: &'a MatrixSource,
    pub b: &'a MatrixSource,
    pub kernel: &'a dyn Kernel,
}

/// A distributed multiplication schedule.
///
/// Every worker of the world group calls `run` with the same job; the
/// schedule is symmetric, so all of them issue the same sequence of
/// collective calls.
pub trait Driver: Send + Sync + Debug {
    /// The algorithm this driver implements.
    fn algorithm(&self) -> Algorithm;

    /// Execute this worker's part of the schedule.
    fn run(&self, world: &Communicator, job: &Job<'_>) -> Result<Product>;
}

/// Dispatch table from [`Algorithm`] to its driver.
pub fn driver_for(algorithm: Algorithm) -> Box<dyn Driver> {
    match algorithm {
        Algorithm::Ring => Box::new(Cannon),
        Algorithm::Mesh2D => Box::new(Broadcast2D),
        Algorithm::Dns3D => Box::new(Dns),
    }
}

/// Error for a driver handed a plan built for another algorithm.
pub(crate) fn plan_mismatch(driver: Algorithm, plan: &Plan) -> AlgoError {
    AlgoError::Protocol(format!(
        "{} driver given a {} plan",
        driver,
        plan.algorithm()
    ))
}

/// Gather one block per member of `group` at its rank 0 and assemble the
/// full matrix there. Group rank `t` must own block `(t / side, t % side)`.
pub(crate) fn gather_result(
    group: &Communicator,
    layout: &BlockLayout,
    block: &Matrix,
) -> Result<Option<Matrix>> {
    let gathered = group.gather(block.as_slice(), COORDINATOR_RANK)?;
    match gathered {
        Some(data) => {
            debug!(blocks = group.size(), "assembling result");
            assemble(layout, &data).map(Some)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        for algorithm in Algorithm::ALL {
            assert_eq!(driver_for(algorithm).algorithm(), algorithm);
        }
    }
}
