use gm_block::BlockLayout;
use gm_comm::GridShape;

use crate::algorithm::Algorithm;
use crate::config::RunConfig;
use crate::error::{Precondition, Result};
use crate::tasks::TaskGrid;

/// A validated schedule shape: everything a driver needs to know about the
/// grid before it issues its first message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Periodic `side x side` grid with one block per worker.
    Ring { shape: GridShape, layout: BlockLayout },
    /// Coordinator plus `task_workers` workers sharing the task grid.
    Mesh2D { tasks: TaskGrid, task_workers: usize },
    /// Non-periodic `side x side x side` grid; the `k = 0` plane owns the
    /// operand and result blocks.
    Dns3D { shape: GridShape, layout: BlockLayout },
}

impl Plan {
    /// Derive the plan for `config`, or the precondition it violates.
    pub fn for_config(config: &RunConfig) -> Result<Plan> {
        if config.n == 0 {
            return Err(Precondition::EmptyMatrix.into());
        }
        if config.workers == 0 {
            return Err(Precondition::TooFewWorkers {
                workers: 0,
                required: 1,
            }
            .into());
        }
        let ndims = config.algorithm.topology_rank();
        match config.algorithm {
            Algorithm::Ring => {
                let (shape, layout) = equal_grid(config.n, config.workers, ndims, true)?;
                Ok(Plan::Ring { shape, layout })
            }
            Algorithm::Mesh2D => {
                if config.workers < 2 {
                    return Err(Precondition::TooFewWorkers {
                        workers: config.workers,
                        required: 2,
                    }
                    .into());
                }
                let block_size = config
                    .block_size
                    .unwrap_or_else(|| TaskGrid::default_block_size(config.n));
                let tasks = TaskGrid::new(config.n, block_size)?;
                Ok(Plan::Mesh2D {
                    tasks,
                    task_workers: config.workers - 1,
                })
            }
            Algorithm::Dns3D => {
                let (shape, layout) = equal_grid(config.n, config.workers, ndims, false)?;
                Ok(Plan::Dns3D { shape, layout })
            }
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Plan::Ring { .. } => Algorithm::Ring,
            Plan::Mesh2D { .. } => Algorithm::Mesh2D,
            Plan::Dns3D { .. } => Algorithm::Dns3D,
        }
    }

    /// Number of workers the plan was built for.
    pub fn workers(&self) -> usize {
        match self {
            Plan::Ring { shape, .. } | Plan::Dns3D { shape, .. } => shape.size(),
            Plan::Mesh2D { task_workers, .. } => task_workers + 1,
        }
    }
}

fn equal_grid(
    n: usize,
    workers: usize,
    ndims: usize,
    periodic: bool,
) -> std::result::Result<(GridShape, BlockLayout), Precondition> {
    let shape = GridShape::equal_sides(workers, ndims, periodic)
        .map_err(|_| Precondition::NotPerfectPower { workers, ndims })?;
    let side = shape.side(0);
    let layout = BlockLayout::new(n, side).map_err(|_| Precondition::NotDivisible { n, side })?;
    Ok((shape, layout))
}
