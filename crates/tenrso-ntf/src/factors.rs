//! Factor shards owned by one process
//!
//! Each process holds, for every mode, a (nᵢ × k) shard of the global factor
//! with nᵢ = Mᵢ / P. The transposed orientation is always the `.t()` view of
//! the same buffer, so the two can never disagree.

use crate::error::{NtfError, NtfResult};
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView2, Axis};
use scirs2_core::random::{rngs::StdRng, Rng, SeedableRng};
use tenrso_comm::{Collective, Communicator, NtfCommunicator};

/// Local factor shards plus the column scale λ
#[derive(Debug, Clone)]
pub struct DistNcpFactors {
    factors: Vec<Array2<f64>>,
    lambda: Array1<f64>,
    rank: usize,
}

impl DistNcpFactors {
    /// Uniform [0, 1) shards of the given row counts
    pub fn new_random(shard_rows: &[usize], rank: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let factors = shard_rows
            .iter()
            .map(|&n| Array2::from_shape_fn((n, rank), |_| rng.random::<f64>()))
            .collect();
        Self {
            factors,
            lambda: Array1::ones(rank),
            rank,
        }
    }

    /// Wrap explicit shards; λ starts at ones
    pub fn from_factors(factors: Vec<Array2<f64>>) -> NtfResult<Self> {
        let Some(first) = factors.first() else {
            return Err(NtfError::TooFewModes(0));
        };
        let rank = first.ncols();
        if rank == 0 {
            return Err(NtfError::InvalidRank(0));
        }
        for (mode, f) in factors.iter().enumerate() {
            if f.ncols() != rank {
                return Err(NtfError::FactorShape {
                    mode,
                    expected: (f.nrows(), rank),
                    actual: f.dim(),
                });
            }
        }
        Ok(Self {
            factors,
            lambda: Array1::ones(rank),
            rank,
        })
    }

    pub fn modes(&self) -> usize {
        self.factors.len()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn factor(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.factors[mode].view()
    }

    /// (k × nᵢ) orientation of the shard
    pub fn factor_t(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.factors[mode].t()
    }

    pub fn factors(&self) -> &[Array2<f64>] {
        &self.factors
    }

    pub fn lambda(&self) -> &Array1<f64> {
        &self.lambda
    }

    /// Replace the shard of `mode`; the shape must not change
    pub fn set(&mut self, mode: usize, factor: Array2<f64>) -> NtfResult<()> {
        let expected = self.factors[mode].dim();
        if factor.dim() != expected {
            return Err(NtfError::FactorShape {
                mode,
                expected,
                actual: factor.dim(),
            });
        }
        self.factors[mode] = factor;
        Ok(())
    }

    pub fn into_parts(self) -> (Vec<Array2<f64>>, Array1<f64>) {
        (self.factors, self.lambda)
    }

    /// Scale the columns of `mode` to unit global norm; λ becomes the norms
    ///
    /// Collective over the world group. Columns with zero global norm are
    /// left untouched.
    pub fn distributed_normalize<C: Communicator>(
        &mut self,
        mode: usize,
        comm: &NtfCommunicator<C>,
    ) -> NtfResult<()> {
        self.lambda = self.normalize_mode(mode, comm)?;
        Ok(())
    }

    /// Normalize every mode; λ becomes the product of all column norms
    pub fn distributed_normalize_all<C: Communicator>(
        &mut self,
        comm: &NtfCommunicator<C>,
    ) -> NtfResult<()> {
        let mut lambda = Array1::ones(self.rank);
        for mode in 0..self.modes() {
            lambda *= &self.normalize_mode(mode, comm)?;
        }
        self.lambda = lambda;
        Ok(())
    }

    fn normalize_mode<C: Communicator>(
        &mut self,
        mode: usize,
        comm: &NtfCommunicator<C>,
    ) -> NtfResult<Array1<f64>> {
        let factor = &mut self.factors[mode];
        let mut sq = factor.map_axis(Axis(0), |col| col.dot(&col));
        let buf = sq.as_slice_mut().ok_or(NtfError::NonContiguous("column norms"))?;
        comm.scope(Collective::NormAllReduce, mode)
            .all_reduce(buf, tenrso_comm::ReduceOp::Sum)?;

        let norms = sq.mapv(f64::sqrt);
        for (mut col, &norm) in factor.axis_iter_mut(Axis(1)).zip(norms.iter()) {
            if norm > 0.0 {
                col.mapv_inplace(|v| v / norm);
            }
        }
        Ok(norms)
    }

    /// Assemble the full (Mᵢ × k) factor of `mode` on every rank
    ///
    /// Collective over the world group. Rank r's shard lands at row
    /// cᵢ(r)·Mᵢ/Pᵢ + s·nᵢ, where s is r's position in its mode-i slice.
    pub fn gather_global<C: Communicator>(
        &self,
        mode: usize,
        comm: &NtfCommunicator<C>,
    ) -> NtfResult<Array2<f64>> {
        let grid = comm.grid();
        let shard = &self.factors[mode];
        let (n, k) = shard.dim();
        let size = comm.size();
        let block = n * (size / grid.dims()[mode]);

        let send = shard.as_standard_layout();
        let send = send.as_slice().ok_or(NtfError::NonContiguous("factor shard"))?;
        let mut recv = vec![0.0; send.len() * size];
        comm.world().all_gather(send, &mut recv)?;

        let mut global = Array2::zeros((n * size, k));
        for r in 0..size {
            let c = grid.coords_of(r)[mode];
            let s = grid
                .slice_members(mode, c)
                .iter()
                .position(|&m| m == r)
                .unwrap_or(0);
            let offset = c * block + s * n;
            let rows = &recv[r * n * k..(r + 1) * n * k];
            for i in 0..n {
                global
                    .row_mut(offset + i)
                    .iter_mut()
                    .zip(&rows[i * k..(i + 1) * k])
                    .for_each(|(g, &v)| *g = v);
            }
        }
        Ok(global)
    }
}
