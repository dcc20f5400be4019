//! `gm-block` - Local dense matrices and block arithmetic for gridmul.
//!
//! This crate provides:
//! - A row-major `Matrix` type used both for whole matrices and for blocks
//! - A `BlockLayout` mapping global indices to (owner, local offset)
//! - A `Kernel` trait for the local multiply-accumulate, with a `CpuKernel`
//! - `MatrixSource` for materialising whole matrices or single blocks
//! - `BlockStore`, a worker's private A, B and C blocks
//!
//! Nothing in here communicates; every call is local to one worker.

pub mod error;
pub mod kernel;
pub mod layout;
pub mod matrix;
pub mod source;
pub mod store;

// Re-export primary types at the crate root for convenience.
pub use error::{BlockError, Result};
pub use kernel::{CpuKernel, Kernel};
pub use layout::{BlockLayout, BlockRegion};
pub use matrix::Matrix;
pub use source::MatrixSource;
pub use store::BlockStore;
