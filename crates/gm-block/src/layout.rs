use std::fmt;

use crate::error::{BlockError, Result};

/// A rectangular window into a matrix: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRegion {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

impl BlockRegion {
    pub fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        BlockRegion {
            row,
            col,
            rows,
            cols,
        }
    }

    /// Number of elements covered by this region.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }
}

impl fmt::Display for BlockRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{}, {}..{}]",
            self.row,
            self.row + self.rows,
            self.col,
            self.col + self.cols
        )
    }
}

/// Checkerboard partitioning of an `n x n` matrix into `side x side` square
/// blocks of `n / side` elements per edge.
///
/// The mapping is identical for A, B and C, so block boundaries always
/// line up between operands and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    n: usize,
    side: usize,
}

impl BlockLayout {
    /// Create a layout, failing if `side` does not divide `n`.
    pub fn new(n: usize, side: usize) -> Result<Self> {
        if side == 0 || n == 0 || n % side != 0 {
            return Err(BlockError::NotDivisible { n, side });
        }
        Ok(BlockLayout { n, side })
    }

    /// Global matrix size.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of blocks along each axis.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Edge length of one block (`nlocal`).
    pub fn block_size(&self) -> usize {
        self.n / self.side
    }

    /// Number of elements in one block.
    pub fn block_len(&self) -> usize {
        self.block_size() * self.block_size()
    }

    /// Region of the global matrix owned by block `(block_row, block_col)`.
    pub fn region(&self, block_row: usize, block_col: usize) -> BlockRegion {
        let b = self.block_size();
        BlockRegion::new(block_row * b, block_col * b, b, b)
    }

    /// Map a global index to `((block_row, block_col), (local_row, local_col))`.
    pub fn locate(&self, row: usize, col: usize) -> Result<((usize, usize), (usize, usize))> {
        if row >= self.n || col >= self.n {
            return Err(BlockError::OutOfBounds {
                row,
                col,
                rows: self.n,
                cols: self.n,
            });
        }
        let b = self.block_size();
        Ok(((row / b, col / b), (row % b, col % b)))
    }

    /// Inverse of [`BlockLayout::locate`].
    pub fn global(&self, block: (usize, usize), local: (usize, usize)) -> (usize, usize) {
        let b = self.block_size();
        (block.0 * b + local.0, block.1 * b + local.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size() {
        let layout = BlockLayout::new(6, 3).unwrap();
        assert_eq!(layout.block_size(), 2);
        assert_eq!(layout.block_len(), 4);
        assert_eq!(layout.region(1, 2), BlockRegion::new(2, 4, 2, 2));
    }

    #[test]
    fn test_not_divisible() {
        assert!(BlockLayout::new(5, 2).is_err());
        assert!(BlockLayout::new(4, 0).is_err());
    }

    #[test]
    fn test_locate_inverse() {
        let layout = BlockLayout::new(8, 4).unwrap();
        for row in 0..8 {
            for col in 0..8 {
                let (block, local) = layout.locate(row, col).unwrap();
                assert_eq!(layout.global(block, local), (row, col));
            }
        }
        assert!(layout.locate(8, 0).is_err());
    }

    #[test]
    fn test_region_display() {
        assert_eq!(BlockRegion::new(0, 2, 2, 2).to_string(), "[0..2, 2..4]");
    }
}
