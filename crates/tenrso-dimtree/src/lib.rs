//! # tenrso-dimtree
//!
//! Two-level dimension tree for MTTKRP.
//!
//! The modes are cut at `split` into a left child `[0, split)` and a right
//! child `[split, N)`. Each child caches the tensor block contracted with the
//! Khatri-Rao product of the *other* child's factors:
//!
//! - left partial  `P_L = X_(L×R) · (U_split ⊙ … ⊙ U_{N-1})`, shape (L × k)
//! - right partial `P_R = X_(L×R)ᵀ · (U_0 ⊙ … ⊙ U_{split-1})`, shape (R × k)
//!
//! where L and R are the products of the left and right mode extents. An
//! MTTKRP for a mode then only contracts the (much smaller) partial of its
//! child with the factors of its siblings. Sweeping modes in order, each
//! partial is rebuilt once per sweep: updating a left mode invalidates the
//! right partial and vice versa.
//!
//! ```
//! use std::sync::Arc;
//! use scirs2_core::ndarray_ext::Array2;
//! use tenrso_core::synthetic::{random_factors, random_low_rank};
//! use tenrso_dimtree::DimensionTree;
//! use tenrso_kernels::mttkrp;
//!
//! let (x, _) = random_low_rank(&[3, 4, 5], 2, 1).unwrap();
//! let factors = random_factors(&[3, 4, 5], 2, 2);
//! let mut tree = DimensionTree::construct(Arc::new(x.clone()), &factors, 1).unwrap();
//!
//! let mut out = Array2::zeros((4, 2));
//! tree.in_order_reuse_mttkrp(1, &mut out).unwrap();
//!
//! let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
//! let direct = mttkrp(&x.view(), &views, 1).unwrap();
//! assert!(tenrso_kernels::approx_equal(&out.view(), &direct.view(), 1e-10));
//! ```

use scirs2_core::ndarray_ext::{Array2, ArrayView2, IxDyn};
use std::sync::Arc;
use tenrso_core::DenseND;
use tenrso_kernels::{khatri_rao_chain, mttkrp_with_krp_into, KernelError};
use thiserror::Error;

/// Errors raised while building or querying a dimension tree
#[derive(Debug, Error)]
pub enum DimTreeError {
    #[error("split {split} must satisfy 1 <= split < {modes}")]
    InvalidSplit { split: usize, modes: usize },

    #[error("expected {expected} factor matrices, got {actual}")]
    FactorCount { expected: usize, actual: usize },

    #[error("factor {mode} has shape {actual:?}, expected {expected:?}")]
    FactorShape {
        mode: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("mode {mode} out of range for a {modes}-mode tree")]
    InvalidMode { mode: usize, modes: usize },

    #[error("tensor block cannot be viewed as a matrix: {0}")]
    Layout(String),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type DimTreeResult<T> = Result<T, DimTreeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Cached two-child dimension tree over one tensor block
#[derive(Debug)]
pub struct DimensionTree {
    tensor: Arc<DenseND<f64>>,
    factors: Vec<Array2<f64>>,
    split: usize,
    rank: usize,
    left: Option<Array2<f64>>,
    right: Option<Array2<f64>>,
}

impl DimensionTree {
    /// Build a tree over `tensor` with the given gathered factors
    ///
    /// `factors[m]` must be (Iₘ × k) with Iₘ the tensor extent of mode m.
    /// Partials are computed lazily on first use.
    pub fn construct(
        tensor: Arc<DenseND<f64>>,
        factors: &[Array2<f64>],
        split: usize,
    ) -> DimTreeResult<Self> {
        let modes = tensor.modes();
        if split == 0 || split >= modes {
            return Err(DimTreeError::InvalidSplit { split, modes });
        }
        if factors.len() != modes {
            return Err(DimTreeError::FactorCount {
                expected: modes,
                actual: factors.len(),
            });
        }
        let rank = factors[0].ncols();
        for (mode, f) in factors.iter().enumerate() {
            let expected = (tensor.dimensions()[mode], rank);
            if f.dim() != expected {
                return Err(DimTreeError::FactorShape {
                    mode,
                    expected,
                    actual: f.dim(),
                });
            }
        }
        Ok(Self {
            tensor,
            factors: factors.to_vec(),
            split,
            rank,
            left: None,
            right: None,
        })
    }

    pub fn split(&self) -> usize {
        self.split
    }

    pub fn modes(&self) -> usize {
        self.factors.len()
    }

    /// Replace the cached copy of a factor after it was updated
    ///
    /// Invalidates the partial of the opposite child, which was contracted
    /// with the old factor.
    pub fn set_factor(&mut self, mode: usize, factor: &ArrayView2<f64>) -> DimTreeResult<()> {
        self.check_mode(mode)?;
        let expected = self.factors[mode].dim();
        if factor.dim() != expected {
            return Err(DimTreeError::FactorShape {
                mode,
                expected,
                actual: factor.dim(),
            });
        }
        self.factors[mode].assign(factor);
        match self.side(mode) {
            Side::Left => self.right = None,
            Side::Right => self.left = None,
        }
        Ok(())
    }

    /// MTTKRP of `mode` against the cached factors, reusing the child partial
    ///
    /// `out` must be (Iₘ × k) and is overwritten.
    pub fn in_order_reuse_mttkrp(&mut self, mode: usize, out: &mut Array2<f64>) -> DimTreeResult<()> {
        self.check_mode(mode)?;
        let expected = (self.tensor.dimensions()[mode], self.rank);
        if out.dim() != expected {
            return Err(DimTreeError::FactorShape {
                mode,
                expected,
                actual: out.dim(),
            });
        }

        let side = self.side(mode);
        self.ensure_partial(side)?;
        let (range, partial) = match side {
            Side::Left => (0..self.split, self.left.as_ref()),
            Side::Right => (self.split..self.modes(), self.right.as_ref()),
        };
        let partial = partial.ok_or_else(|| DimTreeError::Layout("partial not cached".into()))?;

        let dims = self.tensor.dimensions();
        let before: usize = dims[range.start..mode].iter().product();
        let after: usize = dims[mode + 1..range.end].iter().product();
        let siblings: Vec<ArrayView2<f64>> = range
            .filter(|&m| m != mode)
            .map(|m| self.factors[m].view())
            .collect();
        let krp = khatri_rao_chain(&siblings, self.rank)?;

        contract_partial(&partial.view(), before, dims[mode], after, &krp.view(), out);
        Ok(())
    }

    fn check_mode(&self, mode: usize) -> DimTreeResult<()> {
        if mode >= self.modes() {
            return Err(DimTreeError::InvalidMode {
                mode,
                modes: self.modes(),
            });
        }
        Ok(())
    }

    fn side(&self, mode: usize) -> Side {
        if mode < self.split {
            Side::Left
        } else {
            Side::Right
        }
    }

    fn ensure_partial(&mut self, side: Side) -> DimTreeResult<()> {
        let cached = match side {
            Side::Left => self.left.is_some(),
            Side::Right => self.right.is_some(),
        };
        if cached {
            return Ok(());
        }
        tracing::trace!(?side, split = self.split, "recomputing dimension tree partial");

        let dims = self.tensor.dimensions();
        let l: usize = dims[..self.split].iter().product();
        let r: usize = dims[self.split..].iter().product();
        let matrix = self
            .tensor
            .view()
            .into_shape_with_order(IxDyn(&[l, r]))
            .map_err(|e| DimTreeError::Layout(e.to_string()))?;

        // contract with the factors of the opposite child
        let (others, contract_mode, rows) = match side {
            Side::Left => (self.split..self.modes(), 0, l),
            Side::Right => (0..self.split, 1, r),
        };
        let views: Vec<ArrayView2<f64>> = others.map(|m| self.factors[m].view()).collect();
        let krp = khatri_rao_chain(&views, self.rank)?;

        let mut partial = Array2::<f64>::zeros((rows, self.rank));
        mttkrp_with_krp_into(&matrix, &krp.view(), contract_mode, &mut partial.view_mut())?;
        match side {
            Side::Left => self.left = Some(partial),
            Side::Right => self.right = Some(partial),
        }
        Ok(())
    }
}

/// out[i, r] = Σ_{a,b} P[(a·d + i)·B + b, r] · K[a·B + b, r]
fn contract_partial(
    partial: &ArrayView2<f64>,
    before: usize,
    d: usize,
    after: usize,
    krp: &ArrayView2<f64>,
    out: &mut Array2<f64>,
) {
    out.fill(0.0);
    for a in 0..before {
        for i in 0..d {
            let mut row = out.row_mut(i);
            for b in 0..after {
                let p = partial.row((a * d + i) * after + b);
                let k = krp.row(a * after + b);
                for ((o, &pv), &kv) in row.iter_mut().zip(p.iter()).zip(k.iter()) {
                    *o += pv * kv;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenrso_core::synthetic::{random_factors, random_low_rank};
    use tenrso_kernels::{max_abs_diff, mttkrp};

    fn direct(x: &DenseND<f64>, factors: &[Array2<f64>], mode: usize) -> Array2<f64> {
        let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
        mttkrp(&x.view(), &views, mode).unwrap()
    }

    #[test]
    fn test_matches_direct_for_every_split() {
        let dims = [3, 2, 4, 2];
        let (x, _) = random_low_rank(&dims, 3, 7).unwrap();
        let x = Arc::new(x);
        let factors = random_factors(&dims, 3, 8);

        for split in 1..dims.len() {
            let mut tree = DimensionTree::construct(Arc::clone(&x), &factors, split).unwrap();
            for mode in 0..dims.len() {
                let mut out = Array2::zeros((dims[mode], 3));
                tree.in_order_reuse_mttkrp(mode, &mut out).unwrap();
                let expected = direct(&x, &factors, mode);
                assert!(max_abs_diff(&out.view(), &expected.view()).unwrap() < 1e-10);
            }
        }
    }

    #[test]
    fn test_set_factor_invalidates_opposite_child() {
        let dims = [2, 3, 2];
        let (x, _) = random_low_rank(&dims, 2, 3).unwrap();
        let mut factors = random_factors(&dims, 2, 4);
        let mut tree = DimensionTree::construct(Arc::new(x.clone()), &factors, 1).unwrap();

        let mut out0 = Array2::zeros((2, 2));
        let mut out2 = Array2::zeros((2, 2));
        tree.in_order_reuse_mttkrp(0, &mut out0).unwrap();
        tree.in_order_reuse_mttkrp(2, &mut out2).unwrap();
        assert!(tree.left.is_some() && tree.right.is_some());

        // a left-mode update only invalidates the right partial
        factors[0].mapv_inplace(|v| v * 2.0 + 1.0);
        tree.set_factor(0, &factors[0].view()).unwrap();
        assert!(tree.left.is_some());
        assert!(tree.right.is_none());

        tree.in_order_reuse_mttkrp(2, &mut out2).unwrap();
        let expected = direct(&x, &factors, 2);
        assert!(max_abs_diff(&out2.view(), &expected.view()).unwrap() < 1e-10);

        factors[2].mapv_inplace(|v| v - 0.5);
        tree.set_factor(2, &factors[2].view()).unwrap();
        assert!(tree.left.is_none());
    }

    #[test]
    fn test_invalid_construction() {
        let x = Arc::new(DenseND::<f64>::ones(&[2, 2]));
        let factors = random_factors(&[2, 2], 1, 0);
        assert!(matches!(
            DimensionTree::construct(Arc::clone(&x), &factors, 0),
            Err(DimTreeError::InvalidSplit { .. })
        ));
        assert!(matches!(
            DimensionTree::construct(Arc::clone(&x), &factors[..1], 1),
            Err(DimTreeError::FactorCount { .. })
        ));
        let bad = random_factors(&[2, 3], 1, 0);
        assert!(matches!(
            DimensionTree::construct(x, &bad, 1),
            Err(DimTreeError::FactorShape { mode: 1, .. })
        ));
    }

    #[test]
    fn test_wrong_output_shape() {
        let x = Arc::new(DenseND::<f64>::ones(&[2, 2]));
        let factors = random_factors(&[2, 2], 1, 0);
        let mut tree = DimensionTree::construct(x, &factors, 1).unwrap();
        let mut out = Array2::zeros((3, 1));
        assert!(tree.in_order_reuse_mttkrp(0, &mut out).is_err());
        assert!(matches!(
            tree.in_order_reuse_mttkrp(5, &mut out),
            Err(DimTreeError::InvalidMode { .. })
        ));
    }
}
