use gm_block::{BlockStore, Matrix};
use gm_comm::{CartGrid, Communicator, Source, TagMatch};
use tracing::{debug, trace, warn};

use crate::algorithm::Algorithm;
use crate::drivers::{gather_result, plan_mismatch, Driver, Job};
use crate::error::{AlgoError, Result};
use crate::plan::Plan;
use crate::product::{DnsTrace, Product, Trace};

const TAG_SEED_A: u32 = 20;
const TAG_SEED_B: u32 = 21;

/// Sub-group masks over the `(i, j, k)` axes.
const VARY_J: [bool; 3] = [false, true, false];
const VARY_I: [bool; 3] = [true, false, false];
const VARY_K: [bool; 3] = [false, false, true];
const PLANE: [bool; 3] = [true, true, false];

/// The DNS schedule on a `q x q x q` grid.
///
/// Worker `(i, j, 0)` starts with `A[i][j]` and `B[i][j]`. After seeding
/// and broadcasting, worker `(i, j, k)` holds `A[i][k]` and `B[k][j]`; the
/// sum over `k` lands at `(i, j, 0)` as `C[i][j]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dns;

impl Driver for Dns {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Dns3D
    }

    fn run(&self, world: &Communicator, job: &Job<'_>) -> Result<Product> {
        let (shape, layout) = match job.plan {
            Plan::Dns3D { shape, layout } => (shape, layout),
            other => return Err(plan_mismatch(self.algorithm(), other)),
        };

        let grid = CartGrid::new(world, shape.clone())?;
        let coords = grid.coords().to_vec();
        let (i, j, k) = match coords.as_slice() {
            [i, j, k] => (*i, *j, *k),
            other => {
                return Err(AlgoError::Protocol(format!(
                    "DNS needs a 3-D grid, got coordinates {:?}",
                    other
                )))
            }
        };

        // Every worker derives the same groups in the same order.
        let a_group = grid.subgroup(&VARY_J)?;
        let b_group = grid.subgroup(&VARY_I)?;
        let depth_group = grid.subgroup(&VARY_K)?;
        let plane_group = grid.subgroup(&PLANE)?;

        let mut store = if k == 0 {
            BlockStore::load(layout, (i, j), job.a, job.b)?
        } else {
            BlockStore::zeros(layout.block_size())
        };

        // Phase 1: seed A onto the j == k plane and B onto the i == k plane.
        let comm = grid.comm();
        let mut holds_a_seed = false;
        let mut holds_b_seed = false;
        if k == 0 {
            let a_dest = grid.rank_of(&[i, j, j])?;
            if a_dest == grid.rank() {
                holds_a_seed = true;
            } else {
                comm.send(a_dest, TAG_SEED_A, store.a.as_slice())?;
            }
            let b_dest = grid.rank_of(&[i, j, i])?;
            if b_dest == grid.rank() {
                holds_b_seed = true;
            } else {
                comm.send(b_dest, TAG_SEED_B, store.b.as_slice())?;
            }
        } else {
            let origin = grid.rank_of(&[i, j, 0])?;
            if j == k {
                comm.recv_into(store.a.as_mut_slice(), Source::Rank(origin), TagMatch::Tag(TAG_SEED_A))?;
                holds_a_seed = true;
            }
            if i == k {
                comm.recv_into(store.b.as_mut_slice(), Source::Rank(origin), TagMatch::Tag(TAG_SEED_B))?;
                holds_b_seed = true;
            }
        }
        trace!(holds_a_seed, holds_b_seed, "seed phase done");

        // Phase 2: on a single kept axis the group rank is the coordinate,
        // so the roots are the members at j == k and i == k.
        a_group.broadcast(store.a.as_mut_slice(), k)?;
        b_group.broadcast(store.b.as_mut_slice(), k)?;
        trace!("broadcast phase done");

        // Phase 3.
        store.c.clear();
        store.multiply_accumulate(job.kernel)?;

        // Phase 4.
        let reduced = depth_group.reduce_sum(store.c.as_slice(), 0)?;

        // Every seed was sent before the barrier, so any left unconsumed
        // after it went to the wrong worker.
        comm.barrier()?;
        let stray_seeds = drain_seeds(comm)?;
        if stray_seeds > 0 {
            warn!(stray_seeds, "seed messages reached a worker outside its plane");
        }

        let trace = DnsTrace {
            holds_a_seed,
            holds_b_seed,
            stray_seeds,
            reduce_contributions: reduced.as_ref().map(|r| r.contributions),
        };

        let mut product = Product::new(world.world_rank(), Trace::Dns(trace)).with_coords(&coords);
        if let Some(reduced) = reduced {
            let block = Matrix::new(reduced.data, layout.block_size(), layout.block_size())?;
            debug!(i, j, contributions = reduced.contributions, "result block reduced");
            if job.config.gather {
                product = product.with_result(gather_result(&plane_group, layout, &block)?);
            }
            product = product.with_block(block);
        }
        Ok(product)
    }
}

/// Consume every seed message already delivered here and count them.
fn drain_seeds(comm: &Communicator) -> Result<usize> {
    let mut count = 0;
    for tag in [TAG_SEED_A, TAG_SEED_B] {
        while comm.try_recv(Source::Any, TagMatch::Tag(tag))?.is_some() {
            count += 1;
        }
    }
    Ok(count)
}
