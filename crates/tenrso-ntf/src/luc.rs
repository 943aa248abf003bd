//! Local update of one factor slab
//!
//! Given the combined Gram G (k × k) and the local MTTKRP M (n × k), each
//! rule returns a new (n × k) slab minimizing ‖X₍ₘ₎ − H Kᵀ‖ over the local
//! rows, where KᵀK = G and X₍ₘ₎K = M. The nonnegative rules never return a
//! negative entry. Updates are purely local and deterministic.

use crate::config::UpdateAlgorithm;
use crate::error::NtfResult;
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use scirs2_linalg::lstsq;
use tenrso_kernels::KernelError;

const EPSILON: f64 = 1e-16;

/// Values above `-FEASIBILITY_TOL` count as nonnegative in the pivoting rule
const FEASIBILITY_TOL: f64 = 1e-14;

/// Full exchanges allowed before falling back to single-index exchanges
const BPP_BACKUP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Luc {
    algorithm: UpdateAlgorithm,
}

impl Luc {
    pub fn new(algorithm: UpdateAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> UpdateAlgorithm {
        self.algorithm
    }

    /// Compute the updated slab
    ///
    /// `mttkrp_t` is the transposed (k × n) local MTTKRP and `current` the
    /// (n × k) slab being replaced. MU and HALS start from `current`.
    pub fn update(
        &self,
        gram: &Array2<f64>,
        mttkrp_t: &ArrayView2<f64>,
        current: &ArrayView2<f64>,
    ) -> NtfResult<Array2<f64>> {
        let k = gram.nrows();
        let mttkrp = mttkrp_t.t();
        if gram.ncols() != k || mttkrp.ncols() != k {
            return Err(KernelError::dimension_mismatch(
                "local update",
                vec![k, mttkrp.nrows()],
                vec![mttkrp_t.nrows(), mttkrp_t.ncols()],
                "MTTKRP rank must match the Gram matrix",
            )
            .into());
        }
        if current.dim() != mttkrp.dim() {
            return Err(KernelError::dimension_mismatch(
                "local update",
                vec![mttkrp.nrows(), k],
                vec![current.nrows(), current.ncols()],
                "current slab must match the MTTKRP",
            )
            .into());
        }

        match self.algorithm {
            UpdateAlgorithm::Mu => Ok(multiplicative(gram, &mttkrp, current)),
            UpdateAlgorithm::Hals => Ok(hals(gram, &mttkrp, current)),
            UpdateAlgorithm::AnlsBpp => {
                let mut out = Array2::zeros(mttkrp.dim());
                for (i, row) in mttkrp.axis_iter(Axis(0)).enumerate() {
                    let x = nnls_bpp(gram, &row)?;
                    out.row_mut(i).assign(&x);
                }
                Ok(out)
            }
            UpdateAlgorithm::CpAls => {
                let mut out = Array2::zeros(mttkrp.dim());
                for (i, row) in mttkrp.axis_iter(Axis(0)).enumerate() {
                    let x = solve_normal(gram, &row.to_owned())?;
                    out.row_mut(i).assign(&x);
                }
                Ok(out)
            }
        }
    }
}

/// H ← H ⊙ M ⊘ (H G + ε)
fn multiplicative(gram: &Array2<f64>, mttkrp: &ArrayView2<f64>, current: &ArrayView2<f64>) -> Array2<f64> {
    let denom = current.dot(gram);
    let mut out = current.to_owned();
    out.zip_mut_with(mttkrp, |h, &m| *h *= m);
    out.zip_mut_with(&denom, |h, &d| *h = (*h / (d + EPSILON)).max(0.0));
    out
}

/// One pass of column-wise block coordinate descent
fn hals(gram: &Array2<f64>, mttkrp: &ArrayView2<f64>, current: &ArrayView2<f64>) -> Array2<f64> {
    let mut h = current.to_owned();
    for r in 0..gram.nrows() {
        let diag = gram[[r, r]];
        if diag <= 0.0 {
            continue;
        }
        // uses the columns already updated in this pass
        let hg = h.dot(&gram.column(r));
        let mut col = h.column_mut(r);
        for (i, value) in col.iter_mut().enumerate() {
            *value = (*value + (mttkrp[[i, r]] - hg[i]) / diag).max(EPSILON);
        }
    }
    h
}

/// min ‖x‖ subject to x ≥ 0 for the normal equations G x = b
///
/// Block principal pivoting: the passive set is exchanged wholesale while
/// the number of infeasible indices keeps shrinking, and one index at a
/// time once it stalls for [`BPP_BACKUP`] rounds.
fn nnls_bpp(gram: &Array2<f64>, b: &ArrayView1<f64>) -> NtfResult<Array1<f64>> {
    let k = b.len();
    let mut passive = vec![false; k];
    let mut x = Array1::<f64>::zeros(k);
    let mut y = b.mapv(|v| -v);

    let mut budget = BPP_BACKUP;
    let mut best = k + 1;
    let max_rounds = 10 * (k + 1) * (k + 1);

    for _ in 0..max_rounds {
        let infeasible: Vec<usize> = (0..k)
            .filter(|&i| {
                if passive[i] {
                    x[i] < -FEASIBILITY_TOL
                } else {
                    y[i] < -FEASIBILITY_TOL
                }
            })
            .collect();
        if infeasible.is_empty() {
            break;
        }

        if infeasible.len() < best {
            best = infeasible.len();
            budget = BPP_BACKUP;
            infeasible.iter().for_each(|&i| passive[i] = !passive[i]);
        } else if budget > 0 {
            budget -= 1;
            infeasible.iter().for_each(|&i| passive[i] = !passive[i]);
        } else if let Some(&i) = infeasible.last() {
            passive[i] = !passive[i];
        }

        let free: Vec<usize> = (0..k).filter(|&i| passive[i]).collect();
        x.fill(0.0);
        if !free.is_empty() {
            let sub = Array2::from_shape_fn((free.len(), free.len()), |(a, c)| {
                gram[[free[a], free[c]]]
            });
            let rhs = Array1::from_iter(free.iter().map(|&i| b[i]));
            let sol = solve_normal(&sub, &rhs)?;
            for (a, &i) in free.iter().enumerate() {
                x[i] = sol[a];
            }
        }
        y = gram.dot(&x) - b;
        for &i in &free {
            y[i] = 0.0;
        }
    }

    x.mapv_inplace(|v| v.max(0.0));
    Ok(x)
}

/// Solve G x = b, retrying with a small diagonal shift if G is singular
fn solve_normal(gram: &Array2<f64>, b: &Array1<f64>) -> NtfResult<Array1<f64>> {
    match lstsq(&gram.view(), &b.view(), None) {
        Ok(solution) => Ok(solution.x),
        Err(_) => {
            let eps = f64::EPSILON * (gram.nrows() * 10) as f64;
            let mut shifted = gram.clone();
            shifted.diag_mut().mapv_inplace(|d| d + eps);
            Ok(lstsq(&shifted.view(), &b.view(), None)?.x)
        }
    }
}
