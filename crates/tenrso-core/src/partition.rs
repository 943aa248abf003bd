//! Block partitioning of a global tensor over a process grid
//!
//! A global tensor of shape M₁ × … × Mₙ is cut over a P₁ × … × Pₙ grid so that
//! the process at grid coordinates (c₁, …, cₙ) holds the contiguous block
//!
//! ```text
//! [c₁·M₁/P₁, (c₁+1)·M₁/P₁) × … × [cₙ·Mₙ/Pₙ, (cₙ+1)·Mₙ/Pₙ)
//! ```
//!
//! The factor rows of mode i that such a block touches are shared by the
//! P/Pᵢ processes with the same coordinate cᵢ. Each of them owns Mᵢ/P of
//! those rows, ordered by its rank within that group.

use crate::dense::DenseND;
use scirs2_core::ndarray_ext::{Array, IxDyn};
use scirs2_core::numeric::Num;

/// Even block distribution of a global tensor over a process grid
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockPartition {
    global_dims: Vec<usize>,
    grid: Vec<usize>,
}

impl BlockPartition {
    /// Describe how `global_dims` is cut over `grid`
    ///
    /// # Errors
    ///
    /// Fails if the mode counts differ, if any extent is zero, or if a global
    /// dimension is not divisible by its grid extent.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrso_core::BlockPartition;
    ///
    /// let part = BlockPartition::new(&[4, 6, 2], &[2, 3, 1]).unwrap();
    /// assert_eq!(part.local_dims(), vec![2, 2, 2]);
    /// assert_eq!(part.num_blocks(), 6);
    /// ```
    pub fn new(global_dims: &[usize], grid: &[usize]) -> anyhow::Result<Self> {
        if global_dims.len() != grid.len() {
            anyhow::bail!(
                "Grid has {} modes but the tensor has {}",
                grid.len(),
                global_dims.len()
            );
        }
        if global_dims.is_empty() {
            anyhow::bail!("Cannot partition a tensor without modes");
        }
        for (mode, (&dim, &parts)) in global_dims.iter().zip(grid.iter()).enumerate() {
            if dim == 0 || parts == 0 {
                anyhow::bail!(
                    "Mode {} has zero extent (dimension {}, grid {})",
                    mode,
                    dim,
                    parts
                );
            }
            if dim % parts != 0 {
                anyhow::bail!(
                    "Mode {} dimension {} is not divisible by grid extent {}",
                    mode,
                    dim,
                    parts
                );
            }
        }
        Ok(Self {
            global_dims: global_dims.to_vec(),
            grid: grid.to_vec(),
        })
    }

    pub fn modes(&self) -> usize {
        self.global_dims.len()
    }

    pub fn global_dims(&self) -> &[usize] {
        &self.global_dims
    }

    pub fn grid(&self) -> &[usize] {
        &self.grid
    }

    /// Number of grid blocks (processes)
    pub fn num_blocks(&self) -> usize {
        self.grid.iter().product()
    }

    /// Shape of every local block: Mᵢ / Pᵢ
    pub fn local_dims(&self) -> Vec<usize> {
        self.global_dims
            .iter()
            .zip(self.grid.iter())
            .map(|(&m, &p)| m / p)
            .collect()
    }

    /// Rows of each mode's factor owned by one process: Mᵢ / P
    ///
    /// # Errors
    ///
    /// Fails if a global dimension is not divisible by the total process count.
    pub fn factor_shard_dims(&self) -> anyhow::Result<Vec<usize>> {
        let procs = self.num_blocks();
        self.global_dims
            .iter()
            .enumerate()
            .map(|(mode, &m)| {
                if m % procs != 0 {
                    anyhow::bail!(
                        "Mode {} dimension {} is not divisible by the process count {}",
                        mode,
                        m,
                        procs
                    );
                }
                Ok(m / procs)
            })
            .collect()
    }

    /// Global index of the first element of the block at `coords`
    pub fn offsets(&self, coords: &[usize]) -> anyhow::Result<Vec<usize>> {
        self.check_coords(coords)?;
        Ok(self
            .local_dims()
            .iter()
            .zip(coords.iter())
            .map(|(&len, &c)| c * len)
            .collect())
    }

    /// First global factor row owned by the process at `coords` whose rank
    /// within its mode-`mode` slice group is `slice_rank`
    pub fn factor_shard_offset(
        &self,
        mode: usize,
        coords: &[usize],
        slice_rank: usize,
    ) -> anyhow::Result<usize> {
        self.check_coords(coords)?;
        if mode >= self.modes() {
            anyhow::bail!("Mode {} out of bounds for {} modes", mode, self.modes());
        }
        let shard = self.factor_shard_dims()?[mode];
        let block = self.global_dims[mode] / self.grid[mode];
        Ok(coords[mode] * block + slice_rank * shard)
    }

    /// Copy the block at `coords` out of a global tensor
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrso_core::{BlockPartition, DenseND};
    ///
    /// let global = DenseND::from_vec((0..16).map(|x| x as f64).collect(), &[4, 4]).unwrap();
    /// let part = BlockPartition::new(&[4, 4], &[2, 2]).unwrap();
    /// let block = part.extract(&global, &[1, 0]).unwrap();
    /// assert_eq!(block.as_slice(), &[8.0, 9.0, 12.0, 13.0]);
    /// ```
    pub fn extract<T>(&self, global: &DenseND<T>, coords: &[usize]) -> anyhow::Result<DenseND<T>>
    where
        T: Clone + Num,
    {
        if global.dimensions() != self.global_dims.as_slice() {
            anyhow::bail!(
                "Tensor shape {:?} does not match partitioned shape {:?}",
                global.dimensions(),
                self.global_dims
            );
        }
        let offsets = self.offsets(coords)?;
        let local = self.local_dims();
        let source = global.as_array();
        let data = Array::from_shape_fn(IxDyn(&local), |idx: IxDyn| {
            let gidx: Vec<usize> = offsets
                .iter()
                .enumerate()
                .map(|(i, &off)| idx[i] + off)
                .collect();
            source[IxDyn(&gidx)].clone()
        });
        Ok(DenseND::from_array(data))
    }

    fn check_coords(&self, coords: &[usize]) -> anyhow::Result<()> {
        if coords.len() != self.modes() {
            anyhow::bail!(
                "Coordinates {:?} do not match a {}-mode grid",
                coords,
                self.modes()
            );
        }
        for (mode, (&c, &p)) in coords.iter().zip(self.grid.iter()).enumerate() {
            if c >= p {
                anyhow::bail!(
                    "Coordinate {} of mode {} outside grid extent {}",
                    c,
                    mode,
                    p
                );
            }
        }
        Ok(())
    }
}
