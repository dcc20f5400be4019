pub mod cpu;

use std::fmt::Debug;

use crate::error::Result;

pub use cpu::CpuKernel;

/// Local multiply-accumulate kernel shared by every distributed schedule.
///
/// Implementations work on flat row-major slices and write into a buffer
/// supplied by the caller; they never allocate or communicate.
pub trait Kernel: Send + Sync + Debug {
    /// Returns the name of this kernel (e.g., "cpu").
    fn name(&self) -> &str;

    /// Accumulating matrix multiplication: `C += A @ B`.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - `c`: row-major accumulator of shape [m, n]
    ///
    /// Accumulation is plain single precision in ascending `k` order.
    fn multiply_accumulate(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<()>;

    /// Square-block convenience form of [`Kernel::multiply_accumulate`].
    fn multiply_accumulate_square(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        nlocal: usize,
    ) -> Result<()> {
        self.multiply_accumulate(a, b, c, nlocal, nlocal, nlocal)
    }
}
