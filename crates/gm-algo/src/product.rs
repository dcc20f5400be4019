use std::time::Duration;

use gm_block::Matrix;

use crate::config::DispatchPolicy;

/// What one worker hands back when its schedule is done.
#[derive(Debug, Clone)]
pub struct Product {
    /// World rank.
    pub rank: usize,
    /// Grid coordinates, for the grid-based schedules.
    pub coords: Option<Vec<usize>>,
    /// The authoritative C block this worker owns, if any.
    pub block: Option<Matrix>,
    /// The full C, at the coordinator only.
    pub result: Option<Matrix>,
    pub trace: Trace,
    /// Wall time spent inside the driver.
    pub elapsed: Duration,
}

impl Product {
    pub fn new(rank: usize, trace: Trace) -> Self {
        Product {
            rank,
            coords: None,
            block: None,
            result: None,
            trace,
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_coords(mut self, coords: &[usize]) -> Self {
        self.coords = Some(coords.to_vec());
        self
    }

    pub fn with_block(mut self, block: Matrix) -> Self {
        self.block = Some(block);
        self
    }

    pub fn with_result(mut self, result: Option<Matrix>) -> Self {
        self.result = result;
        self
    }
}

/// Per-schedule record of what a worker did.
#[derive(Debug, Clone, PartialEq)]
pub enum Trace {
    Ring(RingTrace),
    /// The 2-D coordinator's view of dispatch.
    Dispatch(DispatchReport),
    /// A 2-D task worker; `completed` is zero for workers that never got a task.
    TaskWorker { completed: usize },
    Dns(DnsTrace),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingTrace {
    /// Multiply-shift steps executed.
    pub steps: usize,
    /// Whether the initial alignment was undone.
    pub restored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub policy: DispatchPolicy,
    pub tasks: usize,
    /// `(task, worker)` in the order tasks were sent.
    pub assignments: Vec<(usize, usize)>,
    /// Results received from workers.
    pub results: usize,
    /// Distinct C blocks written.
    pub blocks_written: usize,
    /// Largest number of outstanding tasks at any moment.
    pub max_in_flight: usize,
    /// Workers sent the termination tag.
    pub terminated: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsTrace {
    /// Kept or received an A block in the seed phase.
    pub holds_a_seed: bool,
    /// Kept or received a B block in the seed phase.
    pub holds_b_seed: bool,
    /// Seed messages that reached this worker without being consumed.
    pub stray_seeds: usize,
    /// Partial products summed here, at the `k = 0` plane only.
    pub reduce_contributions: Option<usize>,
}
