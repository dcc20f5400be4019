use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gm_algo::RunReport;
use gm_block::Matrix;
use tracing::info;

/// Write `matrix` as tab-separated rows.
pub fn write_matrix(path: &Path, matrix: &Matrix) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    matrix
        .write_to(&mut out)
        .with_context(|| format!("writing {}", path.display()))?;
    out.flush()?;
    Ok(())
}

/// Write A, B and C into `dir` as `matrixA.txt`, `matrixB.txt` and
/// `matrixC.txt`, creating the directory if needed.
pub fn dump_matrices(dir: &Path, a: &Matrix, b: &Matrix, c: &Matrix) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::with_capacity(3);
    for (name, matrix) in [("matrixA.txt", a), ("matrixB.txt", b), ("matrixC.txt", c)] {
        let path = dir.join(name);
        write_matrix(&path, matrix)?;
        written.push(path);
    }
    info!(dir = %dir.display(), "matrices written");
    Ok(written)
}

/// Append the report's summary line to `path`.
pub fn append_report(path: &Path, report: &RunReport) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    writeln!(file, "{}", report.summary())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_algo::Algorithm;
    use std::time::Duration;

    #[test]
    fn test_dump_matrices() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = Matrix::identity(2);
        let c = a.clone();
        let written = dump_matrices(&out, &a, &b, &c).unwrap();
        assert_eq!(written.len(), 3);

        let text = fs::read_to_string(out.join("matrixA.txt")).unwrap();
        assert_eq!(text, "1.000000\t2.000000\t\n3.000000\t4.000000\t\n");
        assert!(out.join("matrixC.txt").exists());
    }

    #[test]
    fn test_append_report() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let report = RunReport {
            algorithm: Algorithm::Ring,
            n: 4,
            workers: 4,
            elapsed: Duration::from_millis(250),
        };
        append_report(file.path(), &report).unwrap();
        append_report(file.path(), &report).unwrap();
        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "ring\t4\t4\t0.250000\nring\t4\t4\t0.250000\n");
    }
}
