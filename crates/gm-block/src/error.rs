use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("buffer length {len} does not hold a {rows}x{cols} matrix")]
    BufferLength { len: usize, rows: usize, cols: usize },
    #[error("multiply dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MultiplyMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("index ({row}, {col}) out of bounds for {rows}x{cols} matrix")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("matrix size {n} is not divisible by grid side {side}")]
    NotDivisible { n: usize, side: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BlockError>;
