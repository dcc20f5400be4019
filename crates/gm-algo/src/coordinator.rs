use gm_block::{BlockLayout, Matrix, MatrixSource};

use crate::error::{AlgoError, Result};

/// World rank that plays the coordinator.
pub const COORDINATOR_RANK: usize = 0;

/// The asymmetric part a worker plays in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Holds full-size buffers: all of A and B for the 2-D schedule, and
    /// the assembled C for every schedule.
    Coordinator,
    /// Holds only its own blocks.
    Worker,
}

impl Role {
    pub fn of(world_rank: usize) -> Role {
        if world_rank == COORDINATOR_RANK {
            Role::Coordinator
        } else {
            Role::Worker
        }
    }
}

/// Full-size operands and the output matrix, owned by the coordinator only.
#[derive(Debug, Clone)]
pub struct Coordinator {
    pub a: Matrix,
    pub b: Matrix,
    pub c: Matrix,
}

impl Coordinator {
    /// Materialise A and B in full and allocate a zeroed C.
    pub fn load(n: usize, a: &MatrixSource, b: &MatrixSource) -> Result<Self> {
        Ok(Coordinator {
            a: a.materialize(n)?,
            b: b.materialize(n)?,
            c: Matrix::square(n),
        })
    }

    pub fn into_result(self) -> Matrix {
        self.c
    }
}

/// Rebuild a full matrix from blocks gathered in row-major block order.
///
/// `gathered` holds `side * side` blocks of `layout.block_len()` elements;
/// block `t` belongs at block coordinates `(t / side, t % side)`.
pub fn assemble(layout: &BlockLayout, gathered: &[f32]) -> Result<Matrix> {
    let side = layout.side();
    let block_len = layout.block_len();
    if gathered.len() != side * side * block_len {
        return Err(AlgoError::Protocol(format!(
            "gathered {} elements, expected {} blocks of {}",
            gathered.len(),
            side * side,
            block_len
        )));
    }
    let mut full = Matrix::square(layout.n());
    for (t, block) in gathered.chunks(block_len).enumerate() {
        let region = layout.region(t / side, t % side);
        full.place(&region, block)?;
    }
    Ok(full)
}
