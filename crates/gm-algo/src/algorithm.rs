use std::fmt;
use std::str::FromStr;

use crate::error::AlgoError;

/// The distributed schedules, one per topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Cannon's algorithm: align, then multiply and shift around the rings
    /// of a periodic `q x q` grid.
    Ring,
    /// One-pass 2-D block distribution: a coordinator hands out one task per
    /// block of C and assembles the returned results.
    Mesh2D,
    /// Dekel-Nassimi-Sahni on a `q x q x q` grid.
    Dns3D,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Ring, Algorithm::Mesh2D, Algorithm::Dns3D];

    /// Short name used on the command line and in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Ring => "ring",
            Algorithm::Mesh2D => "mesh2d",
            Algorithm::Dns3D => "dns3d",
        }
    }

    /// Number of axes of the process grid the schedule runs on.
    pub fn topology_rank(&self) -> usize {
        match self {
            Algorithm::Ring => 2,
            Algorithm::Mesh2D => 1,
            Algorithm::Dns3D => 3,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = AlgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ring" | "cannon" => Ok(Algorithm::Ring),
            "mesh2d" | "2d" | "broadcast" => Ok(Algorithm::Mesh2D),
            "dns3d" | "dns" | "3d" => Ok(Algorithm::Dns3D),
            other => Err(AlgoError::Protocol(format!("unknown algorithm '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for alg in Algorithm::ALL {
            assert_eq!(alg.name().parse::<Algorithm>().unwrap(), alg);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("Cannon".parse::<Algorithm>().unwrap(), Algorithm::Ring);
        assert_eq!("dns".parse::<Algorithm>().unwrap(), Algorithm::Dns3D);
        assert!("sparse".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_topology_rank() {
        assert_eq!(Algorithm::Ring.topology_rank(), 2);
        assert_eq!(Algorithm::Dns3D.topology_rank(), 3);
    }
}
