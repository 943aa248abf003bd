//! Distributed MTTKRP
//!
//! For mode i the local tensor block spans Tᵢ = Mᵢ/Pᵢ indices. The engine
//! keeps, per mode:
//!
//! - `gathered[i]` (Tᵢ × k): the factor rows matching the local block,
//!   all-gathered from the nᵢ-row shards of the mode's slice group
//! - `mttkrp[i]` (Tᵢ × k): the block's partial MTTKRP
//! - `local_mttkrp[i]` (nᵢ × k): the rows this process owns after the
//!   reduce-scatter over the slice group
//! - `krp[i]`: the leave-one-out Khatri-Rao buffer, absent when a dimension
//!   tree is used
//!
//! The transposed orientations are `.t()` views of these buffers.

use crate::error::{NtfError, NtfResult};
use crate::timing::{NtfTimings, Phase, Stopwatch};
use scirs2_core::ndarray_ext::{Array2, ArrayView2};
use std::sync::Arc;
use tenrso_comm::{Collective, Communicator, NtfCommunicator};
use tenrso_core::DenseND;
use tenrso_dimtree::DimensionTree;
use tenrso_kernels::{khatri_rao_leave_out_one_into, mttkrp_with_krp_into};

#[derive(Debug)]
pub struct MttkrpEngine {
    tensor: Arc<DenseND<f64>>,
    gathered: Vec<Array2<f64>>,
    krp: Option<Vec<Array2<f64>>>,
    mttkrp: Vec<Array2<f64>>,
    local_mttkrp: Vec<Array2<f64>>,
    dim_tree: Option<DimensionTree>,
}

impl MttkrpEngine {
    /// Allocate every per-mode buffer once
    ///
    /// `shard_rows[i]` is nᵢ. With `use_dim_tree` no Khatri-Rao buffers are
    /// allocated; call [`MttkrpEngine::build_dim_tree`] once the gathered
    /// factors are in place.
    pub fn new(tensor: Arc<DenseND<f64>>, shard_rows: &[usize], rank: usize, use_dim_tree: bool) -> Self {
        let dims = tensor.dimensions().to_vec();
        let numel = tensor.numel();
        let krp = (!use_dim_tree).then(|| {
            dims.iter()
                .map(|&t| Array2::zeros((numel / t, rank)))
                .collect()
        });
        Self {
            gathered: dims.iter().map(|&t| Array2::zeros((t, rank))).collect(),
            mttkrp: dims.iter().map(|&t| Array2::zeros((t, rank))).collect(),
            local_mttkrp: shard_rows.iter().map(|&n| Array2::zeros((n, rank))).collect(),
            krp,
            dim_tree: None,
            tensor,
        }
    }

    /// All-gather the shard of `mode` into `gathered[mode]`
    ///
    /// Collective over the mode's slice group. Shards land in slice-rank
    /// order, which is the order of their rows inside the local block.
    pub fn gather_ncp_factor<C: Communicator>(
        &mut self,
        mode: usize,
        shard: &ArrayView2<f64>,
        comm: &NtfCommunicator<C>,
        timings: &mut NtfTimings,
    ) -> NtfResult<()> {
        let send = shard.as_standard_layout();
        let send = send.as_slice().ok_or(NtfError::NonContiguous("factor shard"))?;
        let recv = self.gathered[mode]
            .as_slice_mut()
            .ok_or(NtfError::NonContiguous("gathered factor"))?;

        let sw = Stopwatch::start();
        comm.scope(Collective::FactorAllGather, mode)
            .all_gather(send, recv)?;
        timings.record_communication(Phase::AllGather, sw.elapsed());
        Ok(())
    }

    /// Build the dimension tree over the current gathered factors
    pub fn build_dim_tree(&mut self, split: usize) -> NtfResult<()> {
        self.dim_tree = Some(DimensionTree::construct(
            Arc::clone(&self.tensor),
            &self.gathered,
            split,
        )?);
        Ok(())
    }

    /// Push the freshly gathered factor of `mode` into the tree, if any
    pub fn set_tree_factor(&mut self, mode: usize) -> NtfResult<()> {
        if let Some(tree) = self.dim_tree.as_mut() {
            tree.set_factor(mode, &self.gathered[mode].view())?;
        }
        Ok(())
    }

    /// Local MTTKRP of `mode` followed by the reduce-scatter of its rows
    ///
    /// Collective over the mode's slice group. Every other mode's gathered
    /// factor must be current.
    pub fn distmttkrp<C: Communicator>(
        &mut self,
        mode: usize,
        comm: &NtfCommunicator<C>,
        timings: &mut NtfTimings,
    ) -> NtfResult<()> {
        let mut sw = Stopwatch::start();
        match (self.dim_tree.as_mut(), self.krp.as_mut()) {
            (Some(tree), _) => {
                tree.in_order_reuse_mttkrp(mode, &mut self.mttkrp[mode])?;
                timings.record_compute(Phase::Mttkrp, sw.lap());
            }
            (None, Some(krp)) => {
                let views: Vec<ArrayView2<f64>> = self.gathered.iter().map(|g| g.view()).collect();
                khatri_rao_leave_out_one_into(&views, mode, &mut krp[mode].view_mut())?;
                timings.record_compute(Phase::Krp, sw.lap());

                mttkrp_with_krp_into(
                    &self.tensor.view(),
                    &krp[mode].view(),
                    mode,
                    &mut self.mttkrp[mode].view_mut(),
                )?;
                timings.record_compute(Phase::Mttkrp, sw.lap());
            }
            (None, None) => {
                // dim-tree mode before build_dim_tree: fall back to the plain kernel
                let views: Vec<ArrayView2<f64>> = self.gathered.iter().map(|g| g.view()).collect();
                self.mttkrp[mode] = tenrso_kernels::mttkrp(&self.tensor.view(), &views, mode)?;
                timings.record_compute(Phase::Mttkrp, sw.lap());
            }
        }

        let send = self.mttkrp[mode]
            .as_slice()
            .ok_or(NtfError::NonContiguous("mttkrp"))?;
        let recv = self.local_mttkrp[mode]
            .as_slice_mut()
            .ok_or(NtfError::NonContiguous("local mttkrp"))?;
        comm.scope(Collective::MttkrpReduceScatter, mode)
            .reduce_scatter_block(send, recv)?;
        timings.record_communication(Phase::ReduceScatter, sw.lap());
        Ok(())
    }

    pub fn uses_dim_tree(&self) -> bool {
        self.dim_tree.is_some()
    }

    /// (Tᵢ × k) gathered factor
    pub fn gathered(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.gathered[mode].view()
    }

    /// (k × Tᵢ) orientation of the gathered factor
    pub fn gathered_t(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.gathered[mode].t()
    }

    /// (Tᵢ × k) partial MTTKRP of the local block, before the reduce-scatter
    pub fn mttkrp(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.mttkrp[mode].view()
    }

    /// (k × Tᵢ) orientation of the block MTTKRP
    pub fn mttkrp_t(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.mttkrp[mode].t()
    }

    /// (nᵢ × k) owned rows of the reduced MTTKRP
    pub fn local_mttkrp(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.local_mttkrp[mode].view()
    }

    /// (k × nᵢ) orientation handed to the local solver
    pub fn local_mttkrp_t(&self, mode: usize) -> ArrayView2<'_, f64> {
        self.local_mttkrp[mode].t()
    }
}
