use std::fmt;
use std::time::{Duration, Instant};

use gm_block::{CpuKernel, Kernel, Matrix, MatrixSource};
use gm_comm::{Communicator, Universe};
use tracing::{debug, info, warn};

use crate::algorithm::Algorithm;
use crate::config::RunConfig;
use crate::drivers::{driver_for, Job};
use crate::error::{AlgoError, Result};
use crate::product::Product;

/// Starts one worker per rank and runs the configured schedule.
#[derive(Debug)]
pub struct Runner {
    kernel: Box<dyn Kernel>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// A runner using the CPU kernel.
    pub fn new() -> Self {
        Runner {
            kernel: Box::new(CpuKernel::new()),
        }
    }

    pub fn with_kernel(kernel: Box<dyn Kernel>) -> Self {
        Runner { kernel }
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    /// Run every worker and return its outcome, indexed by rank.
    ///
    /// Each worker validates `config` on its own before communicating, so
    /// a precondition violation shows up on every rank.
    pub fn launch(
        &self,
        config: &RunConfig,
        a: &MatrixSource,
        b: &MatrixSource,
    ) -> Result<Vec<Result<Product>>> {
        if config.workers == 0 {
            // No rank would run to report the violation.
            config.validate()?;
        }
        let universe = Universe::new(config.workers)?;
        info!(
            algorithm = %config.algorithm,
            n = config.n,
            workers = config.workers,
            kernel = self.kernel.name(),
            "starting run"
        );
        Ok(universe.run(|world| self.run_worker(&world, config, a, b)))
    }

    /// Run every worker and fold the per-rank outcomes into one.
    ///
    /// Fails with the first error that is not merely a peer abort.
    pub fn run(&self, config: &RunConfig, a: &MatrixSource, b: &MatrixSource) -> Result<RunOutcome> {
        let outcomes = self.launch(config, a, b)?;

        let mut products = Vec::with_capacity(outcomes.len());
        let mut aborted = None;
        for outcome in outcomes {
            match outcome {
                Ok(product) => products.push(product),
                Err(e) if e.is_abort() => {
                    aborted.get_or_insert(e);
                }
                Err(e) => {
                    warn!(error = %e, "run failed");
                    return Err(e);
                }
            }
        }
        if let Some(e) = aborted {
            return Err(e);
        }

        let elapsed = products
            .iter()
            .map(|p| p.elapsed)
            .max()
            .unwrap_or_default();
        let result = products.iter_mut().find_map(|p| p.result.take());
        let report = RunReport {
            algorithm: config.algorithm,
            n: config.n,
            workers: config.workers,
            elapsed,
        };
        info!(elapsed_ms = elapsed.as_secs_f64() * 1e3, "run finished");

        Ok(RunOutcome {
            products,
            report,
            result,
        })
    }

    fn run_worker(
        &self,
        world: &Communicator,
        config: &RunConfig,
        a: &MatrixSource,
        b: &MatrixSource,
    ) -> Result<Product> {
        let plan = config.validate()?;
        if plan.workers() != world.size() {
            return Err(AlgoError::Protocol(format!(
                "plan for {} workers run on {}",
                plan.workers(),
                world.size()
            )));
        }
        let driver = driver_for(plan.algorithm());
        let job = Job {
            config,
            plan: &plan,
            a,
            b,
            kernel: self.kernel.as_ref(),
        };

        let start = Instant::now();
        let mut product = driver.run(world, &job)?;
        product.elapsed = start.elapsed();
        debug!(elapsed_us = product.elapsed.as_micros() as u64, "worker done");
        Ok(product)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Per-worker products in rank order. The coordinator's `result` has
    /// been moved into [`RunOutcome::result`].
    pub products: Vec<Product>,
    pub report: RunReport,
    /// The full C, if the schedule collected it.
    pub result: Option<Matrix>,
}

/// Timing summary of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub algorithm: Algorithm,
    pub n: usize,
    pub workers: usize,
    /// Slowest worker's time inside the schedule.
    pub elapsed: Duration,
}

impl RunReport {
    /// Tab-separated line: algorithm, N, workers, seconds.
    pub fn summary(&self) -> String {
        format!(
            "{}\t{}\t{}\t{:.6}",
            self.algorithm,
            self.n,
            self.workers,
            self.elapsed.as_secs_f64()
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} N={} workers={} time={:.6}s",
            self.algorithm,
            self.n,
            self.workers,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let report = RunReport {
            algorithm: Algorithm::Dns3D,
            n: 8,
            workers: 8,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(report.summary(), "dns3d\t8\t8\t1.500000");
        assert_eq!(report.to_string(), "dns3d N=8 workers=8 time=1.500000s");
    }

    #[test]
    fn test_run_identity() {
        let config = RunConfig::new(4, 4, Algorithm::Ring);
        let a = MatrixSource::dense(Matrix::identity(4));
        let b = MatrixSource::seeded(9);
        let outcome = Runner::new().run(&config, &a, &b).unwrap();
        assert_eq!(outcome.products.len(), 4);
        assert_eq!(outcome.result.unwrap(), b.materialize(4).unwrap());
    }
}
