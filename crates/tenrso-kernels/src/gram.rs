//! Gram matrices and their regularization
//!
//! The Gram of a factor U (n × k) is the symmetric (k × k) matrix UᵀU. Only the
//! upper triangle is accumulated; the lower one is mirrored afterwards.

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array2, ArrayView2};
use scirs2_core::numeric::Float;

/// Compute the Gram matrix UᵀU
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_kernels::gram;
///
/// let u = array![[1.0, 2.0], [3.0, 4.0]];
/// let g = gram(&u.view());
/// assert_eq!(g, array![[10.0, 14.0], [14.0, 20.0]]);
/// ```
pub fn gram<T: Float>(u: &ArrayView2<T>) -> Array2<T> {
    let k = u.ncols();
    let mut out = Array2::<T>::zeros((k, k));
    accumulate(u, &mut out);
    out
}

/// Compute UᵀU into a preallocated (k × k) buffer
pub fn gram_into<T: Float>(u: &ArrayView2<T>, out: &mut Array2<T>) -> KernelResult<()> {
    let k = u.ncols();
    if out.shape() != [k, k] {
        return Err(KernelError::dimension_mismatch(
            "gram_into",
            vec![k, k],
            out.shape().to_vec(),
            "output must be rank × rank",
        ));
    }
    out.fill(T::zero());
    accumulate(u, out);
    Ok(())
}

fn accumulate<T: Float>(u: &ArrayView2<T>, out: &mut Array2<T>) {
    let k = u.ncols();
    for row in u.rows() {
        for a in 0..k {
            let ra = row[a];
            if ra == T::zero() {
                continue;
            }
            for b in a..k {
                out[[a, b]] = out[[a, b]] + ra * row[b];
            }
        }
    }
    for a in 0..k {
        for b in 0..a {
            out[[a, b]] = out[[b, a]];
        }
    }
}

/// Add Tikhonov (`2·l2·I`) and sparsity (`2·l1·J`) terms to a Gram matrix
///
/// Each term is applied only when its coefficient is strictly positive.
///
/// # Errors
///
/// Returns [`KernelError::DimensionMismatch`] if `gram` is not square.
pub fn apply_regularization<T: Float>(gram: &mut Array2<T>, l2: T, l1: T) -> KernelResult<()> {
    let (r, c) = gram.dim();
    if r != c {
        return Err(KernelError::dimension_mismatch(
            "apply_regularization",
            vec![r, r],
            vec![r, c],
            "Gram matrix must be square",
        ));
    }
    let two = T::one() + T::one();
    if l2 > T::zero() {
        for i in 0..r {
            gram[[i, i]] = gram[[i, i]] + two * l2;
        }
    }
    if l1 > T::zero() {
        gram.mapv_inplace(|v| v + two * l1);
    }
    Ok(())
}
