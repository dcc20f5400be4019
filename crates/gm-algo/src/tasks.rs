use gm_block::{BlockRegion, Matrix};

use crate::error::{AlgoError, Precondition, Result};

/// The 2-D task decomposition of C: one task per `block_size x block_size`
/// block, numbered in row-major block order.
///
/// A task message carries `block_size` rows of A as a `block_size x n`
/// slab followed by `block_size` columns of B as an `n x block_size` slab.
/// The result of a task is the `block_size x block_size` block of C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskGrid {
    n: usize,
    block_size: usize,
}

impl TaskGrid {
    pub fn new(n: usize, block_size: usize) -> std::result::Result<Self, Precondition> {
        if n == 0 {
            return Err(Precondition::EmptyMatrix);
        }
        if block_size == 0 || n % block_size != 0 {
            return Err(Precondition::InvalidBlockSize { n, block_size });
        }
        let grid = TaskGrid { n, block_size };
        if grid.count() >= u32::MAX as usize {
            return Err(Precondition::TooManyTasks {
                tasks: grid.count(),
            });
        }
        Ok(grid)
    }

    /// Largest divisor of `n` that does not exceed `sqrt(n)`.
    ///
    /// For a perfect square this is `sqrt(n)`, which yields `n` tasks.
    pub fn default_block_size(n: usize) -> usize {
        (1..=n)
            .take_while(|b| b * b <= n)
            .filter(|b| n % b == 0)
            .last()
            .unwrap_or(1)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks per axis.
    pub fn blocks_per_side(&self) -> usize {
        self.n / self.block_size
    }

    /// Total number of tasks.
    pub fn count(&self) -> usize {
        self.blocks_per_side() * self.blocks_per_side()
    }

    /// Reserved tag telling a worker that no more tasks will come.
    pub fn termination_tag(&self) -> u32 {
        self.count() as u32
    }

    /// Workers that receive a first task: `min(task_workers, count)`.
    /// The rest never receive one.
    pub fn initial_assignments(&self, task_workers: usize) -> usize {
        task_workers.min(self.count())
    }

    /// `(taskRow, taskCol)`: the top-left element of the task's C block.
    pub fn origin(&self, task: usize) -> (usize, usize) {
        let per_side = self.blocks_per_side();
        (
            (task / per_side) * self.block_size,
            (task % per_side) * self.block_size,
        )
    }

    /// Region of C written by `task`.
    pub fn region(&self, task: usize) -> BlockRegion {
        let (row, col) = self.origin(task);
        BlockRegion::new(row, col, self.block_size, self.block_size)
    }

    /// Length of one task message.
    pub fn message_len(&self) -> usize {
        2 * self.block_size * self.n
    }

    /// Length of one task result.
    pub fn result_len(&self) -> usize {
        self.block_size * self.block_size
    }

    /// Build the message for `task` into `buf`, replacing its contents.
    pub fn build_message(&self, a: &Matrix, b: &Matrix, task: usize, buf: &mut Vec<f32>) -> Result<()> {
        self.check_task(task)?;
        let (row, col) = self.origin(task);
        let rows_of_a = a.extract(&BlockRegion::new(row, 0, self.block_size, self.n))?;
        let cols_of_b = b.extract(&BlockRegion::new(0, col, self.n, self.block_size))?;
        buf.clear();
        buf.extend_from_slice(rows_of_a.as_slice());
        buf.extend_from_slice(cols_of_b.as_slice());
        Ok(())
    }

    /// Split a received message into its A slab and B slab.
    pub fn split_message<'m>(&self, message: &'m [f32]) -> Result<(&'m [f32], &'m [f32])> {
        if message.len() != self.message_len() {
            return Err(AlgoError::Protocol(format!(
                "task message has {} elements, expected {}",
                message.len(),
                self.message_len()
            )));
        }
        Ok(message.split_at(self.block_size * self.n))
    }

    pub fn check_task(&self, task: usize) -> Result<()> {
        if task >= self.count() {
            return Err(AlgoError::Protocol(format!(
                "task {} out of range (0..{})",
                task,
                self.count()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_block_size() {
        assert_eq!(TaskGrid::default_block_size(16), 4);
        assert_eq!(TaskGrid::default_block_size(9), 3);
        assert_eq!(TaskGrid::default_block_size(3), 1);
        assert_eq!(TaskGrid::default_block_size(12), 3);
        assert_eq!(TaskGrid::default_block_size(2), 1);
        assert_eq!(TaskGrid::default_block_size(1), 1);
    }

    #[test]
    fn test_invalid_block_size() {
        assert_eq!(
            TaskGrid::new(6, 4),
            Err(Precondition::InvalidBlockSize { n: 6, block_size: 4 })
        );
        assert!(TaskGrid::new(6, 0).is_err());
        assert_eq!(TaskGrid::new(0, 1), Err(Precondition::EmptyMatrix));
    }

    #[test]
    fn test_task_origins_row_major() {
        let grid = TaskGrid::new(3, 1).unwrap();
        assert_eq!(grid.count(), 9);
        assert_eq!(grid.termination_tag(), 9);
        assert_eq!(grid.origin(0), (0, 0));
        assert_eq!(grid.origin(2), (0, 2));
        assert_eq!(grid.origin(5), (1, 2));
        assert_eq!(grid.origin(8), (2, 2));
    }

    #[test]
    fn test_initial_assignments() {
        let grid = TaskGrid::new(4, 2).unwrap();
        assert_eq!(grid.initial_assignments(2), 2);
        assert_eq!(grid.initial_assignments(7), 4);
    }

    #[test]
    fn test_message_layout() {
        let a = Matrix::new((0..16).map(|v| v as f32).collect(), 4, 4).unwrap();
        let b = Matrix::new((0..16).map(|v| 100.0 + v as f32).collect(), 4, 4).unwrap();
        let grid = TaskGrid::new(4, 2).unwrap();
        let mut buf = Vec::new();
        // Task 1 covers rows 0..2 and columns 2..4.
        grid.build_message(&a, &b, 1, &mut buf).unwrap();
        let (rows, cols) = grid.split_message(&buf).unwrap();
        assert_eq!(rows, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(cols, &[102.0, 103.0, 106.0, 107.0, 110.0, 111.0, 114.0, 115.0]);
        assert!(grid.build_message(&a, &b, 4, &mut buf).is_err());
        assert!(grid.split_message(&buf[1..]).is_err());
    }
}
