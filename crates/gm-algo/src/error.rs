use gm_block::BlockError;
use gm_comm::CommError;
use thiserror::Error;

/// Input combinations a schedule cannot run with.
///
/// Checked from the run parameters alone, so every worker reaches the same
/// verdict before issuing any communication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    #[error("worker count {workers} is not a perfect {} (required by a {ndims}-D grid)", power_name(.ndims))]
    NotPerfectPower { workers: usize, ndims: usize },
    #[error("matrix size {n} is not divisible by grid side {side}")]
    NotDivisible { n: usize, side: usize },
    #[error("{workers} workers given, at least {required} required")]
    TooFewWorkers { workers: usize, required: usize },
    #[error("block size {block_size} does not evenly divide matrix size {n}")]
    InvalidBlockSize { n: usize, block_size: usize },
    #[error("matrix size must be positive")]
    EmptyMatrix,
    #[error("{tasks} tasks do not fit in the message tag space")]
    TooManyTasks { tasks: usize },
}

fn power_name(ndims: &usize) -> &'static str {
    match *ndims {
        2 => "square",
        3 => "cube",
        _ => "power",
    }
}

#[derive(Error, Debug)]
pub enum AlgoError {
    #[error("precondition violated: {0}")]
    Precondition(#[from] Precondition),
    #[error("communication error: {0}")]
    Comm(#[from] CommError),
    #[error("block error: {0}")]
    Block(#[from] BlockError),
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl AlgoError {
    /// True if this worker stopped only because a peer failed first.
    pub fn is_abort(&self) -> bool {
        matches!(self, AlgoError::Comm(CommError::Aborted { .. }))
    }
}

pub type Result<T> = std::result::Result<T, AlgoError>;
