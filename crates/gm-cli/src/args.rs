use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gm_algo::config::DEFAULT_SEED;
use gm_algo::{Algorithm, DispatchPolicy, RunConfig};

/// Distributed dense matrix multiplication on a simulated process grid.
#[derive(Parser, Debug, Clone)]
#[command(name = "gridmul")]
#[command(version)]
#[command(about = "Multiply two random N x N matrices with Cannon, 2-D broadcast or DNS")]
pub struct Cli {
    /// Matrix size N.
    #[arg(short = 'n', long = "size", value_name = "N")]
    pub size: usize,

    /// Number of workers.
    #[arg(short = 'p', long, value_name = "P")]
    pub workers: usize,

    #[arg(short, long, value_enum, default_value_t = AlgorithmArg::Ring)]
    pub algorithm: AlgorithmArg,

    /// Edge of one 2-D task block (must divide N).
    #[arg(short, long, value_name = "B")]
    pub block_size: Option<usize>,

    /// Task hand-out policy of the 2-D coordinator.
    #[arg(long, value_enum, default_value_t = DispatchArg::OnDemand)]
    pub dispatch: DispatchArg,

    /// Seed of the operand generators.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Leave A and B in their aligned positions after Cannon's schedule.
    #[arg(long)]
    pub no_restore: bool,

    /// Print A, B and C to stdout.
    #[arg(long)]
    pub print: bool,

    /// Write matrixA.txt, matrixB.txt and matrixC.txt into this directory.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Compare C with a sequential multiply.
    #[arg(long)]
    pub verify: bool,

    /// Append the timing line to this file.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmArg {
    /// Cannon's ring-shift schedule (P a perfect square)
    #[value(alias = "cannon")]
    Ring,
    /// Coordinator hands out one block per task (P >= 2)
    #[value(name = "mesh2d", alias = "2d")]
    Mesh2d,
    /// DNS on a cube of workers (P a perfect cube)
    #[value(name = "dns3d", alias = "dns")]
    Dns3d,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Ring => Algorithm::Ring,
            AlgorithmArg::Mesh2d => Algorithm::Mesh2D,
            AlgorithmArg::Dns3d => Algorithm::Dns3D,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchArg {
    OnDemand,
    Cyclic,
}

impl From<DispatchArg> for DispatchPolicy {
    fn from(arg: DispatchArg) -> Self {
        match arg {
            DispatchArg::OnDemand => DispatchPolicy::OnDemand,
            DispatchArg::Cyclic => DispatchPolicy::Cyclic,
        }
    }
}

impl Cli {
    /// The run this invocation asks for.
    pub fn to_config(&self) -> RunConfig {
        let mut config = RunConfig::new(self.size, self.workers, self.algorithm.into())
            .with_dispatch(self.dispatch.into())
            .with_seed(self.seed)
            .with_restore(!self.no_restore);
        if let Some(block_size) = self.block_size {
            config = config.with_block_size(block_size);
        }
        config
    }

    /// Whether the full operands are needed after the run.
    pub fn needs_operands(&self) -> bool {
        self.print || self.verify || self.output.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["gridmul", "-n", "8", "-p", "4"]).unwrap();
        let config = cli.to_config();
        assert_eq!(config.n, 8);
        assert_eq!(config.workers, 4);
        assert_eq!(config.algorithm, Algorithm::Ring);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert!(config.restore);
        assert!(!cli.needs_operands());
    }

    #[test]
    fn test_parse_mesh_options() {
        let cli = Cli::try_parse_from([
            "gridmul", "--size", "12", "--workers", "5", "-a", "2d", "-b", "3", "--dispatch", "cyclic",
            "--seed", "9", "--verify",
        ])
        .unwrap();
        let config = cli.to_config();
        assert_eq!(config.algorithm, Algorithm::Mesh2D);
        assert_eq!(config.block_size, Some(3));
        assert_eq!(config.dispatch, DispatchPolicy::Cyclic);
        assert_eq!(config.seed, 9);
        assert!(cli.needs_operands());
    }

    #[test]
    fn test_parse_dns_alias() {
        let cli = Cli::try_parse_from(["gridmul", "-n", "4", "-p", "8", "-a", "dns", "--no-restore"]).unwrap();
        assert_eq!(cli.algorithm, AlgorithmArg::Dns3d);
        assert!(!cli.to_config().restore);
    }

    #[test]
    fn test_missing_size_rejected() {
        assert!(Cli::try_parse_from(["gridmul", "-p", "4"]).is_err());
        assert!(Cli::try_parse_from(["gridmul", "-n", "4", "-p", "4", "-a", "pthreads"]).is_err());
    }
}
