use std::fmt;
use std::io::Write;

use rand::Rng;

use crate::error::{BlockError, Result};
use crate::kernel::Kernel;
use crate::layout::BlockRegion;

/// A dense, row-major matrix of single-precision elements.
///
/// The same type holds a whole `N x N` operand at the coordinator and a
/// single `nlocal x nlocal` block at a worker; only the dimensions differ.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Wrap an existing row-major buffer.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(BlockError::BufferLength {
                len: data.len(),
                rows,
                cols,
            });
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Create a zero-filled `rows x cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a zero-filled `n x n` matrix.
    pub fn square(n: usize) -> Self {
        Self::zeros(n, n)
    }

    /// Create an `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::square(n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Build a matrix from nested rows. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(BlockError::DimensionMismatch {
                    expected: (n_rows, n_cols),
                    got: (n_rows, row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Matrix::new(data, n_rows, n_cols)
    }

    /// Create a matrix with elements drawn uniformly from `[0, 10)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let mut m = Self::zeros(rows, cols);
        m.fill_random(rng);
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `(rows, cols)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the element at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.rows && col < self.cols, "index out of bounds");
        self.data[row * self.cols + col]
    }

    /// Sets the element at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        assert!(row < self.rows && col < self.cols, "index out of bounds");
        self.data[row * self.cols + col] = value;
    }

    /// Checked variant of [`Matrix::get`].
    pub fn try_get(&self, row: usize, col: usize) -> Result<f32> {
        if row >= self.rows || col >= self.cols {
            return Err(BlockError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(self.data[row * self.cols + col])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Zero every element.
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Overwrite every element with a value drawn uniformly from `[0, 10)`.
    pub fn fill_random<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for v in self.data.iter_mut() {
            *v = 10.0 * rng.gen::<f32>();
        }
    }

    /// Copy the sub-matrix described by `region` into a new matrix.
    pub fn extract(&self, region: &BlockRegion) -> Result<Matrix> {
        self.check_region(region)?;
        let mut data = Vec::with_capacity(region.rows * region.cols);
        for r in region.row..region.row + region.rows {
            let start = r * self.cols + region.col;
            data.extend_from_slice(&self.data[start..start + region.cols]);
        }
        Matrix::new(data, region.rows, region.cols)
    }

    /// Write `block` into the sub-matrix described by `region`.
    pub fn place(&mut self, region: &BlockRegion, block: &[f32]) -> Result<()> {
        self.check_region(region)?;
        if block.len() != region.rows * region.cols {
            return Err(BlockError::BufferLength {
                len: block.len(),
                rows: region.rows,
                cols: region.cols,
            });
        }
        for (i, chunk) in block.chunks_exact(region.cols).enumerate() {
            let start = (region.row + i) * self.cols + region.col;
            self.data[start..start + region.cols].copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Accumulate `a @ b` into `self` using `kernel`.
    pub fn multiply_accumulate(
        &mut self,
        a: &Matrix,
        b: &Matrix,
        kernel: &dyn Kernel,
    ) -> Result<()> {
        if a.cols != b.rows {
            return Err(BlockError::MultiplyMismatch {
                m: a.rows,
                k: a.cols,
                k2: b.rows,
                n: b.cols,
            });
        }
        if self.dims() != (a.rows, b.cols) {
            return Err(BlockError::DimensionMismatch {
                expected: (a.rows, b.cols),
                got: self.dims(),
            });
        }
        kernel.multiply_accumulate(&a.data, &b.data, &mut self.data, a.rows, a.cols, b.cols)
    }

    /// Matrix product `self @ other` into a fresh accumulator.
    pub fn matmul(&self, other: &Matrix, kernel: &dyn Kernel) -> Result<Matrix> {
        let mut c = Matrix::zeros(self.rows, other.cols);
        c.multiply_accumulate(self, other, kernel)?;
        Ok(c)
    }

    /// Largest absolute element-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Matrix) -> Result<f32> {
        if self.dims() != other.dims() {
            return Err(BlockError::DimensionMismatch {
                expected: self.dims(),
                got: other.dims(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max))
    }

    /// Write the matrix as tab-separated text, one row per line.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for row in self.data.chunks(self.cols.max(1)) {
            for v in row {
                write!(out, "{:.6}\t", v)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn check_region(&self, region: &BlockRegion) -> Result<()> {
        if region.row + region.rows > self.rows || region.col + region.cols > self.cols {
            return Err(BlockError::OutOfBounds {
                row: region.row + region.rows,
                col: region.col + region.cols,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.chunks(self.cols.max(1)) {
            for (j, v) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>10.4}", v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::CpuKernel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> Matrix {
        Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap()
    }

    #[test]
    fn test_new_length_mismatch() {
        assert!(Matrix::new(vec![1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn test_get_set() {
        let mut m = Matrix::zeros(2, 3);
        m.set(1, 2, 7.5);
        assert_eq!(m.get(1, 2), 7.5);
        assert_eq!(m.as_slice()[5], 7.5);
        assert!(m.try_get(2, 0).is_err());
    }

    #[test]
    #[should_panic]
    fn test_get_out_of_bounds_panics() {
        let m = Matrix::square(2);
        let _ = m.get(2, 0);
    }

    #[test]
    fn test_fill_and_clear() {
        let mut m = Matrix::square(3);
        m.fill(2.0);
        assert!(m.as_slice().iter().all(|&v| v == 2.0));
        m.clear();
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fill_random_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = Matrix::random(8, 8, &mut rng);
        assert!(m.as_slice().iter().all(|&v| (0.0..10.0).contains(&v)));
    }

    #[test]
    fn test_from_rows_ragged() {
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_extract_and_place() {
        let mut m = Matrix::new((0..16).map(|v| v as f32).collect(), 4, 4).unwrap();
        let region = BlockRegion::new(2, 2, 2, 2);
        let block = m.extract(&region).unwrap();
        assert_eq!(block.as_slice(), &[10.0, 11.0, 14.0, 15.0]);

        m.place(&BlockRegion::new(0, 0, 2, 2), block.as_slice()).unwrap();
        assert_eq!(m.get(0, 0), 10.0);
        assert_eq!(m.get(1, 1), 15.0);
        assert!(m.extract(&BlockRegion::new(3, 3, 2, 2)).is_err());
    }

    #[test]
    fn test_matmul() {
        let kernel = CpuKernel::new();
        let b = Matrix::from_rows(&[vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
        let c = sample().matmul(&b, &kernel).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_multiply_accumulate_adds() {
        let kernel = CpuKernel::new();
        let mut c = Matrix::identity(2);
        c.multiply_accumulate(&sample(), &Matrix::identity(2), &kernel)
            .unwrap();
        assert_eq!(c.as_slice(), &[2.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_matmul_mismatch() {
        let kernel = CpuKernel::new();
        let a = Matrix::zeros(2, 3);
        assert!(a.matmul(&Matrix::zeros(2, 2), &kernel).is_err());
    }

    #[test]
    fn test_max_abs_diff() {
        let a = sample();
        let mut b = sample();
        b.set(1, 0, 3.5);
        assert_eq!(a.max_abs_diff(&b).unwrap(), 0.5);
    }

    #[test]
    fn test_write_to() {
        let mut out = Vec::new();
        sample().write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "1.000000\t2.000000\t\n3.000000\t4.000000\t\n");
    }
}
