//! `gm-cli` - argument parsing and file output for the `gridmul` binary.

pub mod args;
pub mod dump;

pub use args::{AlgorithmArg, Cli, DispatchArg};
pub use dump::{append_report, dump_matrices, write_matrix};
