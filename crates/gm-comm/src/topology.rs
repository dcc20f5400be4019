use std::fmt;

use tracing::debug;

use crate::communicator::Communicator;
use crate::error::{CommError, Result};

/// Exact integer `degree`-th root of `value`, if one exists.
pub fn integer_root(value: usize, degree: u32) -> Option<usize> {
    if degree == 0 {
        return None;
    }
    if value == 0 {
        return Some(0);
    }
    let guess = (value as f64).powf(1.0 / degree as f64).round() as usize;
    // Float rounding can land one off either side.
    (guess.saturating_sub(1)..=guess + 1)
        .find(|&r| r.checked_pow(degree) == Some(value))
}

/// Shape of a Cartesian process grid: extent and periodicity per axis.
///
/// Positions are enumerated in row-major order, so rank `r` has the
/// coordinates obtained by writing `r` in the mixed radix given by `dims`
/// (last axis fastest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridShape {
    dims: Vec<usize>,
    periods: Vec<bool>,
}

/// Ranks involved in a displacement along one axis, as seen from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    /// Rank whose data arrives here (`coords - disp`).
    pub source: Option<usize>,
    /// Rank that receives our data (`coords + disp`).
    pub dest: Option<usize>,
}

impl GridShape {
    /// Create a shape from explicit extents and periodicity.
    pub fn new(dims: Vec<usize>, periods: Vec<bool>) -> Result<Self> {
        if dims.len() != periods.len() || dims.is_empty() || dims.contains(&0) {
            return Err(CommError::Other(format!(
                "invalid grid dims {:?} with periods {:?}",
                dims, periods
            )));
        }
        Ok(GridShape { dims, periods })
    }

    /// A grid with `ndims` axes of equal length `workers^(1/ndims)`.
    ///
    /// Fails unless `workers` is a perfect square (2 axes) or perfect
    /// cube (3 axes); every 1-axis grid is valid.
    pub fn equal_sides(workers: usize, ndims: usize, periodic: bool) -> Result<Self> {
        let side = integer_root(workers, ndims as u32)
            .filter(|&s| s > 0)
            .ok_or(CommError::NotPerfectPower { workers, ndims })?;
        GridShape::new(vec![side; ndims], vec![periodic; ndims])
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Extent of `axis`.
    pub fn side(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periods[axis]
    }

    /// Number of grid positions.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Coordinates of grid rank `rank`.
    pub fn coordinates_of(&self, rank: usize) -> Result<Vec<usize>> {
        if rank >= self.size() {
            return Err(CommError::InvalidRank {
                rank,
                size: self.size(),
            });
        }
        let mut coords = vec![0; self.ndims()];
        let mut rest = rank;
        for axis in (0..self.ndims()).rev() {
            coords[axis] = rest % self.dims[axis];
            rest /= self.dims[axis];
        }
        Ok(coords)
    }

    /// Grid rank at `coords`.
    pub fn rank_of(&self, coords: &[usize]) -> Result<usize> {
        if coords.len() != self.ndims() || coords.iter().zip(&self.dims).any(|(c, d)| c >= d) {
            return Err(CommError::InvalidCoordinates {
                coords: coords.to_vec(),
                dims: self.dims.clone(),
            });
        }
        Ok(coords
            .iter()
            .zip(&self.dims)
            .fold(0, |acc, (&c, &d)| acc * d + c))
    }

    /// Rank found `delta` steps from `coords` along `axis`.
    ///
    /// Periodic axes wrap around; on a non-periodic axis an out-of-range
    /// step yields `None`.
    pub fn neighbor(&self, coords: &[usize], axis: usize, delta: isize) -> Result<Option<usize>> {
        self.check_axis(axis)?;
        let side = self.dims[axis] as isize;
        let moved = coords
            .get(axis)
            .map(|&c| c as isize + delta)
            .ok_or_else(|| CommError::InvalidCoordinates {
                coords: coords.to_vec(),
                dims: self.dims.clone(),
            })?;
        let target = if self.periods[axis] {
            moved.rem_euclid(side)
        } else if (0..side).contains(&moved) {
            moved
        } else {
            return Ok(None);
        };
        let mut next = coords.to_vec();
        next[axis] = target as usize;
        self.rank_of(&next).map(Some)
    }

    /// Source and destination for a displacement of `disp` along `axis`.
    pub fn shift(&self, coords: &[usize], axis: usize, disp: isize) -> Result<Shift> {
        Ok(Shift {
            source: self.neighbor(coords, axis, -disp)?,
            dest: self.neighbor(coords, axis, disp)?,
        })
    }

    /// Grid ranks that share every coordinate of `coords` except on the
    /// axes where `keep` is true, in ascending rank order.
    pub fn subgroup_ranks(&self, coords: &[usize], keep: &[bool]) -> Result<Vec<usize>> {
        if keep.len() != self.ndims() {
            return Err(CommError::InvalidAxis {
                axis: keep.len(),
                ndims: self.ndims(),
            });
        }
        let mut ranks = Vec::new();
        for rank in 0..self.size() {
            let other = self.coordinates_of(rank)?;
            let same = (0..self.ndims()).all(|axis| keep[axis] || other[axis] == coords[axis]);
            if same {
                ranks.push(rank);
            }
        }
        Ok(ranks)
    }

    fn check_axis(&self, axis: usize) -> Result<()> {
        if axis >= self.ndims() {
            return Err(CommError::InvalidAxis {
                axis,
                ndims: self.ndims(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (d, p)) in self.dims.iter().zip(&self.periods).enumerate() {
            if i > 0 {
                write!(f, "x")?;
            }
            write!(f, "{}{}", d, if *p { "p" } else { "" })?;
        }
        Ok(())
    }
}

/// A communicator arranged as a Cartesian grid.
///
/// Grid rank equals group rank (no reordering). Coordinates are fixed at
/// construction and never change.
#[derive(Debug, Clone)]
pub struct CartGrid {
    comm: Communicator,
    shape: GridShape,
    coords: Vec<usize>,
}

impl CartGrid {
    /// Arrange `comm` as `shape`. The group size must equal the grid size.
    pub fn new(comm: &Communicator, shape: GridShape) -> Result<Self> {
        if shape.size() != comm.size() {
            return Err(CommError::GridMismatch {
                grid: shape.size(),
                group: comm.size(),
            });
        }
        let members: Vec<usize> = (0..comm.size()).collect();
        let comm = comm.derive(&members)?;
        let coords = shape.coordinates_of(comm.rank())?;
        debug!(grid = %shape, ?coords, "cartesian grid created");
        Ok(CartGrid {
            comm,
            shape,
            coords,
        })
    }

    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    pub fn shape(&self) -> &GridShape {
        &self.shape
    }

    /// This worker's coordinates.
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn coordinates_of(&self, rank: usize) -> Result<Vec<usize>> {
        self.shape.coordinates_of(rank)
    }

    pub fn rank_of(&self, coords: &[usize]) -> Result<usize> {
        self.shape.rank_of(coords)
    }

    /// Rank `delta` steps away from this worker along `axis`.
    pub fn neighbor(&self, axis: usize, delta: isize) -> Result<Option<usize>> {
        self.shape.neighbor(&self.coords, axis, delta)
    }

    /// Source and destination of a displacement `disp` along `axis`.
    pub fn shift(&self, axis: usize, disp: isize) -> Result<Shift> {
        self.shape.shift(&self.coords, axis, disp)
    }

    /// Sub-group of the workers that agree with this one on every axis not
    /// selected by `keep`. Group rank order follows grid rank order, so on a
    /// single kept axis the group rank equals the coordinate on that axis.
    ///
    /// Every worker of the grid must call `subgroup` with the same masks in
    /// the same order.
    pub fn subgroup(&self, keep: &[bool]) -> Result<Communicator> {
        let ranks = self.shape.subgroup_ranks(&self.coords, keep)?;
        let group = self.comm.derive(&ranks)?;
        debug!(?keep, members = ?ranks, "sub-group created");
        Ok(group)
    }
}
