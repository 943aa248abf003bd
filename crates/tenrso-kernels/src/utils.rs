//! Small numeric helpers shared by the kernels and their callers

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::ArrayView2;
use scirs2_core::numeric::Float;

/// Frobenius inner product ⟨A, B⟩ = Σ aᵢⱼ·bᵢⱼ
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_kernels::inner_product;
///
/// let a = array![[1.0, 2.0], [3.0, 4.0]];
/// assert_eq!(inner_product(&a.view(), &a.view()).unwrap(), 30.0);
/// ```
pub fn inner_product<T: Float>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> KernelResult<T> {
    if a.shape() != b.shape() {
        return Err(KernelError::dimension_mismatch(
            "inner_product",
            a.shape().to_vec(),
            b.shape().to_vec(),
            "operands must have the same shape",
        ));
    }
    Ok(a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (&x, &y)| acc + x * y))
}

/// Frobenius norm of a matrix
pub fn frobenius_norm<T: Float>(matrix: &ArrayView2<T>) -> T {
    matrix
        .iter()
        .fold(T::zero(), |acc, &v| acc + v * v)
        .sqrt()
}

/// Largest absolute element-wise difference, or `None` on shape mismatch
pub fn max_abs_diff<T: Float>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> Option<T> {
    if a.shape() != b.shape() {
        return None;
    }
    Some(
        a.iter()
            .zip(b.iter())
            .fold(T::zero(), |m, (&x, &y)| m.max((x - y).abs())),
    )
}

/// Check if two matrices are approximately equal within an absolute tolerance
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::Array2;
/// use tenrso_kernels::approx_equal;
///
/// let a = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let b = Array2::from_shape_vec((2, 2), vec![1.0 + 1e-11, 2.0, 3.0, 4.0]).unwrap();
/// assert!(approx_equal(&a.view(), &b.view(), 1e-10));
/// ```
pub fn approx_equal<T: Float>(a: &ArrayView2<T>, b: &ArrayView2<T>, tol: T) -> bool {
    max_abs_diff(a, b).is_some_and(|d| d <= tol)
}
