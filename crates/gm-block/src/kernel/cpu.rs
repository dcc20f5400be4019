use super::Kernel;
use crate::error::{BlockError, Result};

/// Pure-Rust CPU multiply-accumulate.
///
/// Straightforward `i-p-j` loops: each `c[i][j]` receives its products in
/// ascending `p`, matching the rounding of the textbook triple loop while
/// walking `b` and `c` row-wise.
#[derive(Debug, Clone)]
pub struct CpuKernel;

impl CpuKernel {
    pub fn new() -> Self {
        CpuKernel
    }
}

impl Default for CpuKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for CpuKernel {
    fn name(&self) -> &str {
        "cpu"
    }

    fn multiply_accumulate(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<()> {
        if a.len() != m * k {
            return Err(BlockError::BufferLength {
                len: a.len(),
                rows: m,
                cols: k,
            });
        }
        if b.len() != k * n {
            return Err(BlockError::BufferLength {
                len: b.len(),
                rows: k,
                cols: n,
            });
        }
        if c.len() != m * n {
            return Err(BlockError::BufferLength {
                len: c.len(),
                rows: m,
                cols: n,
            });
        }

        for i in 0..m {
            let c_row = &mut c[i * n..(i + 1) * n];
            for p in 0..k {
                let a_ip = a[i * k + p];
                let b_row = &b[p * n..(p + 1) * n];
                for (c_ij, b_pj) in c_row.iter_mut().zip(b_row) {
                    *c_ij += a_ip * b_pj;
                }
            }
        }
        Ok(())
    }
}
