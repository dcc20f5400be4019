use anyhow::{bail, Context, Result};
use clap::Parser;
use gm_algo::Runner;
use gm_cli::{append_report, dump_matrices, Cli};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config = cli.to_config();
    let (a, b) = config.seeded_operands();
    let runner = Runner::new();
    let outcome = runner
        .run(&config, &a, &b)
        .with_context(|| format!("{} run with {} workers failed", config.algorithm, config.workers))?;

    println!("{}", outcome.report);
    if let Some(path) = &cli.report {
        append_report(path, &outcome.report)?;
    }

    if !cli.needs_operands() {
        return Ok(());
    }
    let c = outcome
        .result
        .context("the coordinator did not collect the result")?;
    let a = a.materialize(config.n)?;
    let b = b.materialize(config.n)?;

    if cli.verify {
        let expected = a.matmul(&b, runner.kernel())?;
        let diff = c.max_abs_diff(&expected)?;
        // Entries lie in [0, 10); allow single-precision error growing with N.
        let tolerance = 1e-5 * 100.0 * (config.n * config.n) as f32;
        if diff > tolerance {
            bail!("result differs from sequential product by {} (tolerance {})", diff, tolerance);
        }
        info!(max_abs_diff = diff, "result verified");
    }
    if cli.print {
        println!("Matrix A\n{}\nMatrix B\n{}\nMatrix C\n{}", a, b, c);
    }
    if let Some(dir) = &cli.output {
        dump_matrices(dir, &a, &b, &c)?;
    }
    Ok(())
}
