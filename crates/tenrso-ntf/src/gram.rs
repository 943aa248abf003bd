//! Global Gram matrices per mode and their Hadamard combination

use crate::error::{NtfError, NtfResult};
use crate::timing::{NtfTimings, Phase, Stopwatch};
use scirs2_core::ndarray_ext::{Array2, ArrayView2};
use tenrso_comm::{Collective, Communicator, NtfCommunicator, ReduceOp};
use tenrso_kernels::{apply_regularization, gram_hadamard_into, gram_into, hadamard};

/// Gram maintainer
///
/// `global[m]` is the world sum of the local Grams of mode m, regularized.
/// `combined` is the Hadamard product of every global Gram but the active
/// mode's, refreshed by [`GramState::gram_hadamard`].
#[derive(Debug, Clone)]
pub struct GramState {
    local: Array2<f64>,
    global: Vec<Array2<f64>>,
    combined: Array2<f64>,
    regularizers: Vec<(f64, f64)>,
}

impl GramState {
    /// `regularizers[m]` holds the (L2, L1) weights of mode m
    pub fn new(modes: usize, rank: usize, regularizers: Vec<(f64, f64)>) -> Self {
        Self {
            local: Array2::zeros((rank, rank)),
            global: vec![Array2::zeros((rank, rank)); modes],
            combined: Array2::ones((rank, rank)),
            regularizers,
        }
    }

    /// Recompute the global Gram of `mode` from its local factor shard
    ///
    /// Collective over the world group: every factor row is owned by exactly
    /// one process, so the sum over all processes is the full Gram.
    pub fn update_global_gram<C: Communicator>(
        &mut self,
        mode: usize,
        factor: &ArrayView2<f64>,
        comm: &NtfCommunicator<C>,
        timings: &mut NtfTimings,
    ) -> NtfResult<()> {
        let mut sw = Stopwatch::start();
        gram_into(factor, &mut self.local)?;
        timings.record_compute(Phase::Gram, sw.lap());

        let global = &mut self.global[mode];
        global.assign(&self.local);
        let buf = global
            .as_slice_mut()
            .ok_or(NtfError::NonContiguous("global gram"))?;
        comm.scope(Collective::GramAllReduce, mode)
            .all_reduce(buf, ReduceOp::Sum)?;
        timings.record_communication(Phase::AllReduce, sw.lap());

        let (l2, l1) = self.regularizers.get(mode).copied().unwrap_or((0.0, 0.0));
        apply_regularization(global, l2, l1)?;
        Ok(())
    }

    /// Hadamard product of all global Grams except `mode`'s
    pub fn gram_hadamard(&mut self, mode: usize, timings: &mut NtfTimings) -> NtfResult<()> {
        let mut sw = Stopwatch::start();
        gram_hadamard_into(&self.global, Some(mode), &mut self.combined)?;
        timings.record_compute(Phase::Gram, sw.lap());
        Ok(())
    }

    /// `combined ⊙ global[mode]`, the product over every mode
    ///
    /// Only meaningful right after `gram_hadamard(mode)` and the refresh of
    /// `global[mode]`.
    pub fn all_grams(&self, mode: usize) -> NtfResult<Array2<f64>> {
        Ok(hadamard(&self.combined.view(), &self.global[mode].view())?)
    }

    pub fn combined(&self) -> &Array2<f64> {
        &self.combined
    }

    pub fn global(&self, mode: usize) -> &Array2<f64> {
        &self.global[mode]
    }
}
