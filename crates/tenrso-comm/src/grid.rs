//! Cartesian process grid
//!
//! Ranks map to grid coordinates in row-major order: the last grid dimension
//! varies fastest.
//!
//! For mode `i` two families of sub-groups matter:
//! - the **fiber** of a process: all processes whose coordinates differ only in
//!   dimension `i` (`P_i` members);
//! - the **slice** of a process: all processes sharing its coordinate `c_i`
//!   (`P / P_i` members).

use crate::error::{CommError, CommResult};

/// Shape of a P₁ × … × Pₙ process grid
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessGrid {
    dims: Vec<usize>,
}

impl ProcessGrid {
    /// Create a grid, rejecting empty shapes and zero extents
    pub fn new(dims: &[usize]) -> CommResult<Self> {
        if dims.is_empty() {
            return Err(CommError::InvalidGrid {
                grid: dims.to_vec(),
                reason: "grid needs at least one dimension".to_string(),
            });
        }
        if dims.contains(&0) {
            return Err(CommError::InvalidGrid {
                grid: dims.to_vec(),
                reason: "grid extents must be positive".to_string(),
            });
        }
        Ok(Self {
            dims: dims.to_vec(),
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn modes(&self) -> usize {
        self.dims.len()
    }

    /// Total number of processes
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Grid coordinates of `rank`
    pub fn coords_of(&self, rank: usize) -> Vec<usize> {
        let mut coords = vec![0; self.dims.len()];
        let mut rem = rank;
        for (c, &d) in coords.iter_mut().zip(&self.dims).rev() {
            *c = rem % d;
            rem /= d;
        }
        coords
    }

    /// Rank at `coords`
    pub fn rank_of(&self, coords: &[usize]) -> usize {
        coords
            .iter()
            .zip(&self.dims)
            .fold(0, |acc, (&c, &d)| acc * d + c)
    }

    /// Ranks of the fiber through `coords` along `mode`, ordered by coordinate
    pub fn fiber_members(&self, coords: &[usize], mode: usize) -> Vec<usize> {
        let mut c = coords.to_vec();
        (0..self.dims[mode])
            .map(|k| {
                c[mode] = k;
                self.rank_of(&c)
            })
            .collect()
    }

    /// Ranks whose coordinate in `mode` equals `coord`, in ascending order
    pub fn slice_members(&self, mode: usize, coord: usize) -> Vec<usize> {
        (0..self.size())
            .filter(|&r| self.coords_of(r)[mode] == coord)
            .collect()
    }

    /// A color shared by exactly the members of one fiber along `mode`
    ///
    /// The rank of the fiber's first process is used.
    pub fn fiber_color(&self, coords: &[usize], mode: usize) -> usize {
        let mut c = coords.to_vec();
        c[mode] = 0;
        self.rank_of(&c)
    }
}
