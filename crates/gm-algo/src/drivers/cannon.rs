use gm_block::{BlockStore, Kernel};
use gm_comm::{CartGrid, Communicator, Shift};
use tracing::{debug, trace};

use crate::algorithm::Algorithm;
use crate::drivers::{gather_result, plan_mismatch, Driver, Job};
use crate::error::{AlgoError, Result};
use crate::plan::Plan;
use crate::product::{Product, RingTrace, Trace};

const ROW_AXIS: usize = 0;
const COL_AXIS: usize = 1;

const TAG_SHIFT_A: u32 = 10;
const TAG_SHIFT_B: u32 = 11;

/// Cannon's ring-shift schedule on a periodic square grid.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cannon;

/// How many multiply-shift steps to run and whether to undo the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSchedule {
    pub steps: usize,
    pub restore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    InitialAlign,
    MultiplyShift { step: usize },
    Restore,
    Done,
}

/// Run the ring schedule on this worker's resident blocks.
///
/// The worker at `(r, c)` first shifts A left by `r` and B up by `c`, then
/// alternates multiply-accumulate with single-step shifts. Restore moves
/// both operands back by their total displacement, so A and B end where
/// they started for any step count. Every worker of `grid` must call this
/// with the same schedule.
pub fn ring_multiply(
    grid: &CartGrid,
    store: &mut BlockStore,
    kernel: &dyn Kernel,
    schedule: RingSchedule,
) -> Result<RingTrace> {
    let (row, col) = match grid.coords() {
        [row, col] => (*row as isize, *col as isize),
        other => {
            return Err(AlgoError::Protocol(format!(
                "ring schedule needs a 2-D grid, got coordinates {:?}",
                other
            )))
        }
    };

    let mut steps = 0;
    let mut restored = false;
    let mut phase = Phase::InitialAlign;
    while phase != Phase::Done {
        phase = match phase {
            Phase::InitialAlign => {
                shift_operands(grid, store, -row, -col)?;
                trace!(row, col, "initial alignment done");
                Phase::MultiplyShift { step: 0 }
            }
            Phase::MultiplyShift { step } if step < schedule.steps => {
                store.multiply_accumulate(kernel)?;
                shift_operands(grid, store, -1, -1)?;
                steps += 1;
                trace!(step, "multiply-shift done");
                Phase::MultiplyShift { step: step + 1 }
            }
            Phase::MultiplyShift { .. } if schedule.restore => Phase::Restore,
            Phase::MultiplyShift { .. } => Phase::Done,
            Phase::Restore => {
                let moved = steps as isize;
                shift_operands(grid, store, row + moved, col + moved)?;
                restored = true;
                trace!("alignment restored");
                Phase::Done
            }
            Phase::Done => Phase::Done,
        };
    }

    Ok(RingTrace { steps, restored })
}

/// Move A by `a_disp` along the row (leftwards when negative) and B by
/// `b_disp` along the column (upwards when negative).
fn shift_operands(grid: &CartGrid, store: &mut BlockStore, a_disp: isize, b_disp: isize) -> Result<()> {
    exchange(grid, store.a.as_mut_slice(), COL_AXIS, a_disp, TAG_SHIFT_A)?;
    exchange(grid, store.b.as_mut_slice(), ROW_AXIS, b_disp, TAG_SHIFT_B)
}

fn exchange(grid: &CartGrid, buf: &mut [f32], axis: usize, disp: isize, tag: u32) -> Result<()> {
    match grid.shift(axis, disp)? {
        Shift {
            source: Some(source),
            dest: Some(dest),
        } => {
            grid.comm().sendrecv_replace(buf, dest, source, tag)?;
            Ok(())
        }
        _ => Err(AlgoError::Protocol(format!(
            "shift by {} on axis {} leaves a non-periodic grid",
            disp, axis
        ))),
    }
}

impl Driver for Cannon {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Ring
    }

    fn run(&self, world: &Communicator, job: &Job<'_>) -> Result<Product> {
        let (shape, layout) = match job.plan {
            Plan::Ring { shape, layout } => (shape, layout),
            other => return Err(plan_mismatch(self.algorithm(), other)),
        };

        let grid = CartGrid::new(world, shape.clone())?;
        let coords = grid.coords().to_vec();
        let mut store = BlockStore::load(layout, (coords[0], coords[1]), job.a, job.b)?;
        debug!(?coords, nlocal = store.nlocal(), "blocks loaded");

        let schedule = RingSchedule {
            steps: layout.side(),
            restore: job.config.restore,
        };
        let ring = ring_multiply(&grid, &mut store, job.kernel, schedule)?;

        let result = if job.config.gather {
            gather_result(grid.comm(), layout, &store.c)?
        } else {
            None
        };

        Ok(Product::new(world.world_rank(), Trace::Ring(ring))
            .with_coords(&coords)
            .with_block(store.c)
            .with_result(result))
    }
}
