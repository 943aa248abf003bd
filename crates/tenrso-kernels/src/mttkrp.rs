//! MTTKRP (Matricized Tensor Times Khatri-Rao Product) implementation
//!
//! MTTKRP is the computational bottleneck in CP-ALS tensor decomposition.
//! For tensor X and factor matrices {U₁, ..., Uₙ}, it computes:
//!
//! V = X_(mode) × (U₁ ⊙ ... ⊙ U_(mode-1) ⊙ U_(mode+1) ⊙ ... ⊙ Uₙ)
//!
//! Where X_(mode) is the mode-n matricization and ⊙ is the Khatri-Rao product.
//!
//! The row-major tensor buffer is read as a (L × Iₘ × Q) block, with L the
//! product of the leading modes and Q the product of the trailing ones. The
//! Khatri-Rao row for tensor index (l, i, q) is then `l·Q + q`, so no explicit
//! matricization is ever materialized.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Direct use of `ndarray` is forbidden per SCIRS2_INTEGRATION_POLICY.md

use crate::error::{KernelError, KernelResult};
use crate::khatri_rao::khatri_rao_leave_out_one;
use scirs2_core::ndarray_ext::{Array2, ArrayView, ArrayView2, ArrayViewMut1, ArrayViewMut2, IxDyn};
use scirs2_core::numeric::Float;

/// Output rows above which the row loop runs in parallel
#[cfg(feature = "parallel")]
const PARALLEL_ROWS: usize = 64;

/// Compute MTTKRP from the tensor and all factor matrices
///
/// Builds the leave-one-out Khatri-Rao product and delegates to
/// [`mttkrp_with_krp_into`].
///
/// # Errors
///
/// Returns error if:
/// - Mode is out of bounds
/// - Factor matrix row counts don't match tensor dimensions (the factor of
///   `mode` itself is only checked for rank)
/// - Factor matrices have different numbers of columns (rank)
///
/// # Complexity
///
/// Time: O(I_mode × R × ∏ᵢ≠ₘₒ₋ᵈₑ Iᵢ)
/// Space: O(R × ∏ᵢ≠ₘₒ₋ᵈₑ Iᵢ) for the Khatri-Rao product
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, Array2};
/// use tenrso_kernels::mttkrp;
///
/// let tensor = Array::from_shape_vec(
///     vec![2, 3, 4],
///     (0..24).map(|x| x as f64).collect()
/// ).unwrap();
///
/// let u1 = Array2::<f64>::ones((2, 2));
/// let u2 = Array2::<f64>::ones((3, 2));
/// let u3 = Array2::<f64>::ones((4, 2));
///
/// let result = mttkrp(&tensor.view(), &[u1.view(), u2.view(), u3.view()], 1).unwrap();
/// assert_eq!(result.shape(), &[3, 2]);
/// // Row 0 sums the slice X[:, 0, :]
/// assert_eq!(result[[0, 0]], (0..4).chain(12..16).sum::<i32>() as f64);
/// ```
pub fn mttkrp<T>(
    tensor: &ArrayView<T, IxDyn>,
    factors: &[ArrayView2<T>],
    mode: usize,
) -> KernelResult<Array2<T>>
where
    T: Float + Send + Sync,
{
    let shape = tensor.shape();
    if factors.len() != shape.len() {
        return Err(KernelError::dimension_mismatch(
            "mttkrp",
            vec![shape.len()],
            vec![factors.len()],
            "one factor matrix per tensor mode is required",
        ));
    }
    if mode >= shape.len() {
        return Err(KernelError::invalid_mode(
            mode,
            shape.len(),
            format!("Tensor has only {} modes", shape.len()),
        ));
    }
    for (i, f) in factors.iter().enumerate() {
        if i != mode && f.nrows() != shape[i] {
            return Err(KernelError::dimension_mismatch(
                "mttkrp",
                vec![shape[i], f.ncols()],
                vec![f.nrows(), f.ncols()],
                format!("factor {} rows must match tensor dimension {}", i, i),
            ));
        }
    }

    let krp = khatri_rao_leave_out_one(factors, mode)?;
    let mut out = Array2::<T>::zeros((shape[mode], krp.ncols()));
    mttkrp_with_krp_into(tensor, &krp.view(), mode, &mut out.view_mut())?;
    Ok(out)
}

/// Compute MTTKRP against a precomputed leave-one-out Khatri-Rao product
///
/// `krp` must have ∏ᵢ≠ₘₒ₋ᵈₑ Iᵢ rows in forward mode order (last mode
/// fastest), as produced by [`khatri_rao_leave_out_one`]. `out` must be
/// (I_mode × R) and is overwritten.
///
/// # Errors
///
/// Returns error on an out-of-range mode or any shape disagreement between
/// the tensor, the Khatri-Rao product and the output buffer.
pub fn mttkrp_with_krp_into<T>(
    tensor: &ArrayView<T, IxDyn>,
    krp: &ArrayView2<T>,
    mode: usize,
    out: &mut ArrayViewMut2<T>,
) -> KernelResult<()>
where
    T: Float + Send + Sync,
{
    let shape = tensor.shape();
    if mode >= shape.len() {
        return Err(KernelError::invalid_mode(
            mode,
            shape.len(),
            format!("Tensor has only {} modes", shape.len()),
        ));
    }
    let left: usize = shape[..mode].iter().product();
    let rows = shape[mode];
    let right: usize = shape[mode + 1..].iter().product();
    let rank = krp.ncols();

    if krp.nrows() != left * right {
        return Err(KernelError::dimension_mismatch(
            "mttkrp_with_krp",
            vec![left * right, rank],
            krp.shape().to_vec(),
            "KRP rows must equal the product of the other modes",
        ));
    }
    if out.shape() != [rows, rank] {
        return Err(KernelError::dimension_mismatch(
            "mttkrp_with_krp",
            vec![rows, rank],
            out.shape().to_vec(),
            "output must be (mode dimension) × rank",
        ));
    }

    let standard = tensor.as_standard_layout();
    let data = standard.as_slice().ok_or_else(|| {
        KernelError::dimension_mismatch(
            "mttkrp_with_krp",
            shape.to_vec(),
            shape.to_vec(),
            "tensor data is not contiguous",
        )
    })?;

    #[cfg(feature = "parallel")]
    {
        if rows >= PARALLEL_ROWS {
            use scirs2_core::ndarray_ext::Axis;
            use scirs2_core::parallel_ops::*;

            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(i, mut row)| accumulate_row(data, krp, i, rows, left, right, &mut row));
            return Ok(());
        }
    }

    for i in 0..rows {
        let mut row = out.row_mut(i);
        accumulate_row(data, krp, i, rows, left, right, &mut row);
    }
    Ok(())
}

/// out[i, :] = Σ_{l,q} X[l, i, q] · KRP[l·Q + q, :]
fn accumulate_row<T: Float>(
    data: &[T],
    krp: &ArrayView2<T>,
    i: usize,
    rows: usize,
    left: usize,
    right: usize,
    out: &mut ArrayViewMut1<T>,
) {
    out.fill(T::zero());
    for l in 0..left {
        let base = (l * rows + i) * right;
        for q in 0..right {
            let x = data[base + q];
            if x == T::zero() {
                continue;
            }
            let k = krp.row(l * right + q);
            out.zip_mut_with(&k, |o, &kv| *o = *o + x * kv);
        }
    }
}
