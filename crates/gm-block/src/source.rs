use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BlockError, Result};
use crate::layout::BlockRegion;
use crate::matrix::Matrix;

const ROW_STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Where the elements of an operand come from.
///
/// Workers ask for just their region; the coordinator may materialise the
/// whole matrix. Both views agree element by element.
#[derive(Debug, Clone)]
pub enum MatrixSource {
    /// Pseudo-random values in `[0, 10)`, one RNG stream per global row.
    Seeded { seed: u64 },
    /// An explicit matrix shared read-only by every worker.
    Dense(Arc<Matrix>),
}

impl MatrixSource {
    pub fn seeded(seed: u64) -> Self {
        MatrixSource::Seeded { seed }
    }

    pub fn dense(matrix: Matrix) -> Self {
        MatrixSource::Dense(Arc::new(matrix))
    }

    /// Build the full `n x n` matrix.
    pub fn materialize(&self, n: usize) -> Result<Matrix> {
        self.region(n, &BlockRegion::new(0, 0, n, n))
    }

    /// Build only the elements inside `region` of the `n x n` matrix.
    pub fn region(&self, n: usize, region: &BlockRegion) -> Result<Matrix> {
        match self {
            MatrixSource::Seeded { seed } => {
                if region.row + region.rows > n || region.col + region.cols > n {
                    return Err(BlockError::OutOfBounds {
                        row: region.row + region.rows,
                        col: region.col + region.cols,
                        rows: n,
                        cols: n,
                    });
                }
                let mut data = Vec::with_capacity(region.numel());
                for row in region.row..region.row + region.rows {
                    let mut rng = Self::row_stream(*seed, row);
                    // Skip to the first requested column so every caller
                    // sees the same value at the same global index.
                    for _ in 0..region.col {
                        let _: f32 = rng.gen();
                    }
                    for _ in 0..region.cols {
                        data.push(10.0 * rng.gen::<f32>());
                    }
                }
                Matrix::new(data, region.rows, region.cols)
            }
            MatrixSource::Dense(m) => {
                if m.dims() != (n, n) {
                    return Err(BlockError::DimensionMismatch {
                        expected: (n, n),
                        got: m.dims(),
                    });
                }
                m.extract(region)
            }
        }
    }

    fn row_stream(seed: u64, row: usize) -> StdRng {
        StdRng::seed_from_u64(seed ^ (row as u64 + 1).wrapping_mul(ROW_STREAM_MIX))
    }
}
