use crate::error::Result;
use crate::kernel::Kernel;
use crate::layout::BlockLayout;
use crate::matrix::Matrix;
use crate::source::MatrixSource;

/// A worker's private blocks of A, B and the partial result C.
///
/// All three are `nlocal x nlocal`. The C block starts zeroed and is only
/// changed by the multiply-accumulate kernel or by a reduction.
#[derive(Debug, Clone)]
pub struct BlockStore {
    pub a: Matrix,
    pub b: Matrix,
    pub c: Matrix,
}

impl BlockStore {
    /// Allocate zeroed blocks of edge `nlocal`.
    pub fn zeros(nlocal: usize) -> Self {
        BlockStore {
            a: Matrix::square(nlocal),
            b: Matrix::square(nlocal),
            c: Matrix::square(nlocal),
        }
    }

    /// Load block `(block_row, block_col)` of both operands; C is zeroed.
    pub fn load(
        layout: &BlockLayout,
        block: (usize, usize),
        a: &MatrixSource,
        b: &MatrixSource,
    ) -> Result<Self> {
        let region = layout.region(block.0, block.1);
        Ok(BlockStore {
            a: a.region(layout.n(), &region)?,
            b: b.region(layout.n(), &region)?,
            c: Matrix::square(layout.block_size()),
        })
    }

    /// Edge length of the blocks.
    pub fn nlocal(&self) -> usize {
        self.c.rows()
    }

    /// `C += A @ B` on the resident blocks.
    pub fn multiply_accumulate(&mut self, kernel: &dyn Kernel) -> Result<()> {
        self.c.multiply_accumulate(&self.a, &self.b, kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::CpuKernel;

    #[test]
    fn test_load_picks_region() {
        let a = Matrix::new((0..16).map(|v| v as f32).collect(), 4, 4).unwrap();
        let layout = BlockLayout::new(4, 2).unwrap();
        let src = MatrixSource::dense(a);
        let store = BlockStore::load(&layout, (1, 0), &src, &src).unwrap();
        assert_eq!(store.a.as_slice(), &[8.0, 9.0, 12.0, 13.0]);
        assert_eq!(store.c.as_slice(), &[0.0; 4]);
        assert_eq!(store.nlocal(), 2);
    }

    #[test]
    fn test_multiply_accumulate() {
        let mut store = BlockStore::zeros(2);
        store.a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        store.b = Matrix::identity(2);
        store.multiply_accumulate(&CpuKernel::new()).unwrap();
        store.multiply_accumulate(&CpuKernel::new()).unwrap();
        assert_eq!(store.c.as_slice(), &[2.0, 4.0, 6.0, 8.0]);
    }
}
