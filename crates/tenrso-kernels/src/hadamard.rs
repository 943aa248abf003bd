//! Hadamard (element-wise) product implementation
//!
//! CP-ALS combines the Gram matrices of all inactive modes with an
//! element-wise product; [`gram_hadamard_into`] does exactly that.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Direct use of `ndarray` is forbidden per SCIRS2_INTEGRATION_POLICY.md

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array2, ArrayView2};
use scirs2_core::numeric::Float;

/// Compute the Hadamard (element-wise) product of two matrices
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_kernels::hadamard;
///
/// let a = array![[1.0, 2.0], [3.0, 4.0]];
/// let b = array![[5.0, 6.0], [7.0, 8.0]];
/// let c = hadamard(&a.view(), &b.view()).unwrap();
/// assert_eq!(c[[0, 1]], 12.0);
/// assert_eq!(c[[1, 0]], 21.0);
/// ```
pub fn hadamard<T: Float>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> KernelResult<Array2<T>> {
    let mut out = a.to_owned();
    hadamard_inplace(&mut out, b)?;
    Ok(out)
}

/// In-place Hadamard product, `a ← a ⊙ b`
pub fn hadamard_inplace<T: Float>(a: &mut Array2<T>, b: &ArrayView2<T>) -> KernelResult<()> {
    if a.shape() != b.shape() {
        return Err(KernelError::dimension_mismatch(
            "hadamard",
            a.shape().to_vec(),
            b.shape().to_vec(),
            "operands must have the same shape",
        ));
    }
    a.zip_mut_with(b, |x, &y| *x = *x * y);
    Ok(())
}

/// Element-wise product of all `grams` except the one at `skip`
///
/// `out` is seeded with ones, so skipping the only Gram leaves the all-ones
/// matrix.
///
/// # Errors
///
/// Fails on an empty Gram list or when any Gram differs in shape from `out`.
pub fn gram_hadamard_into<T: Float>(
    grams: &[Array2<T>],
    skip: Option<usize>,
    out: &mut Array2<T>,
) -> KernelResult<()> {
    if grams.is_empty() {
        return Err(KernelError::empty_input("gram_hadamard", "grams"));
    }
    if let Some(mode) = skip {
        if mode >= grams.len() {
            return Err(KernelError::invalid_mode(
                mode,
                grams.len(),
                "skipped Gram must be one of the inputs",
            ));
        }
    }
    out.fill(T::one());
    for (i, g) in grams.iter().enumerate() {
        if Some(i) == skip {
            continue;
        }
        hadamard_inplace(out, &g.view())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    #[test]
    fn test_hadamard_shape_mismatch() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0], [2.0]];
        assert!(hadamard(&a.view(), &b.view()).is_err());
    }

    #[test]
    fn test_gram_hadamard_skips_mode() {
        let grams = vec![
            array![[2.0, 1.0], [1.0, 2.0]],
            array![[3.0, 0.5], [0.5, 3.0]],
            array![[5.0, 2.0], [2.0, 5.0]],
        ];
        let mut out = Array2::<f64>::zeros((2, 2));
        gram_hadamard_into(&grams, Some(1), &mut out).unwrap();
        assert_eq!(out, array![[10.0, 2.0], [2.0, 10.0]]);

        gram_hadamard_into(&grams, None, &mut out).unwrap();
        assert_eq!(out, array![[30.0, 1.0], [1.0, 30.0]]);
    }

    #[test]
    fn test_gram_hadamard_single_skipped() {
        let grams = vec![array![[4.0]]];
        let mut out = Array2::<f64>::zeros((1, 1));
        gram_hadamard_into(&grams, Some(0), &mut out).unwrap();
        assert_eq!(out, array![[1.0]]);
    }

    #[test]
    fn test_gram_hadamard_invalid_skip() {
        let grams = vec![array![[4.0]]];
        let mut out = Array2::<f64>::zeros((1, 1));
        assert!(gram_hadamard_into(&grams, Some(3), &mut out).is_err());
    }
}
