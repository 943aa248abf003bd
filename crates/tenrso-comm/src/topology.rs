//! Per-mode communicators for a distributed factorization
//!
//! [`NtfCommunicator`] owns the world group plus one fiber and one slice
//! sub-communicator per mode. Callers never pick a group by hand: each
//! collective the engine issues is named by a [`Collective`], which fixes the
//! [`CommScope`] it runs in.

use crate::communicator::Communicator;
use crate::error::{CommError, CommResult};
use crate::grid::ProcessGrid;
use std::fmt;

/// The group a collective runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommScope {
    World,
    Fiber(usize),
    Slice(usize),
}

/// Collectives issued by the factorization engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collective {
    /// Sum of per-process factor Grams
    GramAllReduce,
    /// Sum of per-column squared norms
    NormAllReduce,
    /// Sum of the local inner product
    ErrorAllReduce,
    /// Min/max/sum of phase timings
    TimingReduce,
    /// Assemble a mode's factor rows for the local tensor block
    FactorAllGather,
    /// Sum partial MTTKRPs and keep the owned rows
    MttkrpReduceScatter,
}

impl Collective {
    /// Scope of this collective when acting on `mode`
    pub fn scope(self, mode: usize) -> CommScope {
        match self {
            Collective::GramAllReduce
            | Collective::NormAllReduce
            | Collective::ErrorAllReduce
            | Collective::TimingReduce => CommScope::World,
            Collective::FactorAllGather | Collective::MttkrpReduceScatter => CommScope::Slice(mode),
        }
    }
}

impl fmt::Display for Collective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collective::GramAllReduce => "gram all-reduce",
            Collective::NormAllReduce => "norm all-reduce",
            Collective::ErrorAllReduce => "error all-reduce",
            Collective::TimingReduce => "timing reduce",
            Collective::FactorAllGather => "factor all-gather",
            Collective::MttkrpReduceScatter => "mttkrp reduce-scatter",
        };
        f.write_str(name)
    }
}

/// World communicator with per-mode fiber and slice groups
pub struct NtfCommunicator<C: Communicator> {
    world: C,
    grid: ProcessGrid,
    coords: Vec<usize>,
    fibers: Vec<C>,
    slices: Vec<C>,
}

impl<C: Communicator> fmt::Debug for NtfCommunicator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtfCommunicator")
            .field("rank", &self.world.rank())
            .field("grid", &self.grid.dims())
            .field("coords", &self.coords)
            .finish()
    }
}

impl<C: Communicator> NtfCommunicator<C> {
    /// Lay `world` out on `grid` and build the sub-communicators
    ///
    /// Collective over `world`: every member must call it with the same grid.
    ///
    /// # Errors
    ///
    /// [`CommError::GridMismatch`] if the grid does not have exactly
    /// `world.size()` processes; any error of the underlying splits.
    pub fn new(world: C, grid: ProcessGrid) -> CommResult<Self> {
        if grid.size() != world.size() {
            return Err(CommError::GridMismatch {
                grid: grid.dims().to_vec(),
                expected: grid.size(),
                actual: world.size(),
            });
        }
        let coords = grid.coords_of(world.rank());
        let mut fibers = Vec::with_capacity(grid.modes());
        let mut slices = Vec::with_capacity(grid.modes());
        for mode in 0..grid.modes() {
            fibers.push(world.split(grid.fiber_color(&coords, mode), coords[mode])?);
            slices.push(world.split(coords[mode], world.rank())?);
        }
        Ok(Self {
            world,
            grid,
            coords,
            fibers,
            slices,
        })
    }

    pub fn world(&self) -> &C {
        &self.world
    }

    pub fn grid(&self) -> &ProcessGrid {
        &self.grid
    }

    /// World rank
    pub fn rank(&self) -> usize {
        self.world.rank()
    }

    /// World size
    pub fn size(&self) -> usize {
        self.world.size()
    }

    /// Grid coordinates of this process
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    /// Fiber group along `mode`
    ///
    /// # Panics
    ///
    /// Panics if `mode` is not a grid dimension.
    pub fn fiber(&self, mode: usize) -> &C {
        &self.fibers[mode]
    }

    /// Slice group of `mode`
    ///
    /// # Panics
    ///
    /// Panics if `mode` is not a grid dimension.
    pub fn slice(&self, mode: usize) -> &C {
        &self.slices[mode]
    }

    pub fn fiber_rank(&self, mode: usize) -> usize {
        self.fibers[mode].rank()
    }

    pub fn slice_rank(&self, mode: usize) -> usize {
        self.slices[mode].rank()
    }

    /// Communicator to use for `collective` acting on `mode`
    ///
    /// # Panics
    ///
    /// Panics if the collective is mode-scoped and `mode` is not a grid dimension.
    pub fn scope(&self, collective: Collective, mode: usize) -> &C {
        match collective.scope(mode) {
            CommScope::World => &self.world,
            CommScope::Fiber(m) => &self.fibers[m],
            CommScope::Slice(m) => &self.slices[m],
        }
    }

    /// Check that the mode-scoped groups have the membership the grid implies
    ///
    /// Collective over the world group. For every mode, the factor all-gather
    /// and MTTKRP reduce-scatter groups must hold exactly the `P / P_i`
    /// processes sharing this process's coordinate, in ascending world-rank
    /// order, and the fiber must hold `P_i` processes.
    pub fn verify_topology(&self) -> CommResult<()> {
        let me = self.world.rank() as f64;
        for mode in 0..self.grid.modes() {
            let expected = self.grid.slice_members(mode, self.coords[mode]);
            for collective in [Collective::FactorAllGather, Collective::MttkrpReduceScatter] {
                let comm = self.scope(collective, mode);
                if comm.size() != expected.len() {
                    return Err(CommError::TopologyMismatch {
                        collective: collective.to_string(),
                        mode,
                        reason: format!(
                            "group has {} members, expected {}",
                            comm.size(),
                            expected.len()
                        ),
                    });
                }
                let mut members = vec![0.0; comm.size()];
                comm.all_gather(&[me], &mut members)?;
                let members: Vec<usize> = members.iter().map(|&m| m as usize).collect();
                if members != expected {
                    return Err(CommError::TopologyMismatch {
                        collective: collective.to_string(),
                        mode,
                        reason: format!("members {:?}, expected {:?}", members, expected),
                    });
                }
            }

            let fiber = self.fiber(mode);
            let fiber_size = self.grid.dims()[mode];
            if fiber.size() != fiber_size {
                return Err(CommError::TopologyMismatch {
                    collective: "fiber".to_string(),
                    mode,
                    reason: format!("group has {} members, expected {}", fiber.size(), fiber_size),
                });
            }
        }
        Ok(())
    }
}
