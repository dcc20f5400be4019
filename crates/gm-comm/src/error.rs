use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommError {
    #[error("rank {rank} is outside a group of size {size}")]
    InvalidRank { rank: usize, size: usize },
    #[error("{workers} workers do not form a {ndims}-dimensional grid with equal sides")]
    NotPerfectPower { workers: usize, ndims: usize },
    #[error("grid of {grid} positions does not match a group of {group} workers")]
    GridMismatch { grid: usize, group: usize },
    #[error("coordinates {coords:?} are outside grid {dims:?}")]
    InvalidCoordinates { coords: Vec<usize>, dims: Vec<usize> },
    #[error("invalid axis {axis} for a grid with {ndims} dimensions")]
    InvalidAxis { axis: usize, ndims: usize },
    #[error("message length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("run aborted by rank {origin}")]
    Aborted { origin: usize },
    #[error("peer rank {0} is no longer reachable")]
    Disconnected(usize),
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CommError>;
