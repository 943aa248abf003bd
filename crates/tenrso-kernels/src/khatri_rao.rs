//! Khatri-Rao product (column-wise Kronecker product)
//!
//! For matrices A (I × K) and B (J × K), the Khatri-Rao product C = A ⊙ B has
//! size (I·J × K) where each column k of C is the Kronecker product of column
//! k of A and column k of B. The row index of C is `i·J + j`, so the right
//! operand varies fastest.
//!
//! CP-ALS needs the product of every factor except the active one
//! ("leave one out"). Taking the remaining factors in forward mode order makes
//! the last mode vary fastest, which matches the row-major unfolding of a
//! tensor block.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Direct use of `ndarray` is forbidden per SCIRS2_INTEGRATION_POLICY.md

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array2, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use scirs2_core::numeric::Float;

/// Output size (rows × rank) above which the column loop runs in parallel
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Compute the Khatri-Rao product of two matrices
///
/// # Errors
///
/// Returns [`KernelError::RankMismatch`] if the column counts differ.
///
/// # Complexity
///
/// Time: O(I × J × K)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_kernels::khatri_rao;
///
/// let a = array![[1.0, 2.0], [3.0, 4.0]];
/// let b = array![[5.0, 6.0], [7.0, 8.0]];
/// let c = khatri_rao(&a.view(), &b.view()).unwrap();
/// assert_eq!(c.shape(), &[4, 2]);
///
/// // First column: [1*5, 1*7, 3*5, 3*7]
/// assert_eq!(c[[0, 0]], 5.0);
/// assert_eq!(c[[1, 0]], 7.0);
/// assert_eq!(c[[2, 0]], 15.0);
/// assert_eq!(c[[3, 0]], 21.0);
/// ```
pub fn khatri_rao<T>(a: &ArrayView2<T>, b: &ArrayView2<T>) -> KernelResult<Array2<T>>
where
    T: Float + Send + Sync,
{
    khatri_rao_chain(&[a.view(), b.view()], a.ncols())
}

/// Khatri-Rao product of a sequence of matrices, `F₀ ⊙ F₁ ⊙ … ⊙ Fₘ`
///
/// The last matrix varies fastest. An empty sequence yields the (1 × rank)
/// all-ones row, the neutral element of the product.
///
/// # Errors
///
/// Returns [`KernelError::RankMismatch`] if any matrix does not have `rank` columns.
pub fn khatri_rao_chain<T>(factors: &[ArrayView2<T>], rank: usize) -> KernelResult<Array2<T>>
where
    T: Float + Send + Sync,
{
    let selected: Vec<&ArrayView2<T>> = factors.iter().collect();
    check_ranks("khatri_rao_chain", &selected, rank)?;
    let rows: usize = selected.iter().map(|f| f.nrows()).product();
    let mut out = Array2::<T>::zeros((rows, rank));
    fill(&selected, &mut out.view_mut());
    Ok(out)
}

/// Khatri-Rao product of all factors except `mode`, in forward mode order
///
/// # Errors
///
/// Fails if `mode` is out of range or the factors disagree on the rank.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_kernels::khatri_rao_leave_out_one;
///
/// let u0 = array![[1.0], [2.0]];
/// let u1 = array![[9.0], [9.0], [9.0]];
/// let u2 = array![[3.0], [4.0]];
///
/// let krp = khatri_rao_leave_out_one(&[u0.view(), u1.view(), u2.view()], 1).unwrap();
/// assert_eq!(krp.column(0).to_vec(), vec![3.0, 4.0, 6.0, 8.0]);
/// ```
pub fn khatri_rao_leave_out_one<T>(factors: &[ArrayView2<T>], mode: usize) -> KernelResult<Array2<T>>
where
    T: Float + Send + Sync,
{
    let (rows, rank) = leave_out_one_shape(factors, mode)?;
    let mut out = Array2::<T>::zeros((rows, rank));
    khatri_rao_leave_out_one_into(factors, mode, &mut out.view_mut())?;
    Ok(out)
}

/// In-place variant of [`khatri_rao_leave_out_one`] writing into a
/// preallocated (∏ᵢ≠mode Iᵢ × rank) buffer
pub fn khatri_rao_leave_out_one_into<T>(
    factors: &[ArrayView2<T>],
    mode: usize,
    out: &mut ArrayViewMut2<T>,
) -> KernelResult<()>
where
    T: Float + Send + Sync,
{
    let (rows, rank) = leave_out_one_shape(factors, mode)?;
    if out.shape() != [rows, rank] {
        return Err(KernelError::dimension_mismatch(
            "khatri_rao_leave_out_one_into",
            vec![rows, rank],
            out.shape().to_vec(),
            "output buffer must be (product of other modes) × rank",
        ));
    }
    let selected: Vec<&ArrayView2<T>> = factors
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mode)
        .map(|(_, f)| f)
        .collect();
    fill(&selected, out);
    Ok(())
}

fn leave_out_one_shape<T>(factors: &[ArrayView2<T>], mode: usize) -> KernelResult<(usize, usize)> {
    if factors.is_empty() {
        return Err(KernelError::empty_input("khatri_rao_leave_out_one", "factors"));
    }
    if mode >= factors.len() {
        return Err(KernelError::invalid_mode(
            mode,
            factors.len(),
            "leave-out mode must index one of the factors",
        ));
    }
    let rank = factors[mode].ncols();
    let all: Vec<&ArrayView2<T>> = factors.iter().collect();
    check_ranks("khatri_rao_leave_out_one", &all, rank)?;
    let rows = factors
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mode)
        .map(|(_, f)| f.nrows())
        .product();
    Ok((rows, rank))
}

fn check_ranks<T>(operation: &str, factors: &[&ArrayView2<T>], rank: usize) -> KernelResult<()> {
    for (i, f) in factors.iter().enumerate() {
        if f.ncols() != rank {
            return Err(KernelError::rank_mismatch(operation, rank, f.ncols(), i));
        }
    }
    Ok(())
}

fn fill<T>(factors: &[&ArrayView2<T>], out: &mut ArrayViewMut2<T>)
where
    T: Float + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if out.len() >= PARALLEL_THRESHOLD {
            use scirs2_core::ndarray_ext::Axis;
            use scirs2_core::parallel_ops::*;

            out.axis_iter_mut(Axis(1))
                .into_par_iter()
                .enumerate()
                .for_each(|(r, mut col)| fill_column(factors, r, &mut col));
            return;
        }
    }

    for r in 0..out.ncols() {
        let mut col = out.column_mut(r);
        fill_column(factors, r, &mut col);
    }
}

/// Expand column `r` in place, appending one factor at a time
///
/// After absorbing a factor with `d` rows the prefix of length `len·d` holds
/// the product so far, with the newest factor varying fastest. Walking `j`
/// downwards keeps every write at or above the entry still to be read.
fn fill_column<T: Float>(factors: &[&ArrayView2<T>], r: usize, col: &mut ArrayViewMut1<T>) {
    if col.is_empty() {
        return;
    }
    col[0] = T::one();
    let mut len = 1;
    for f in factors {
        let d = f.nrows();
        for j in (0..len).rev() {
            let base = col[j];
            for t in (0..d).rev() {
                col[j * d + t] = base * f[[t, r]];
            }
        }
        len *= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    #[test]
    fn test_khatri_rao_basic() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[5.0, 6.0], [7.0, 8.0]];
        let c = khatri_rao(&a.view(), &b.view()).unwrap();

        assert_eq!(c.shape(), &[4, 2]);
        assert_eq!(c[[0, 1]], 12.0);
        assert_eq!(c[[1, 1]], 16.0);
        assert_eq!(c[[2, 1]], 24.0);
        assert_eq!(c[[3, 1]], 32.0);
    }

    #[test]
    fn test_khatri_rao_rank_mismatch() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0], [2.0]];
        assert!(matches!(
            khatri_rao(&a.view(), &b.view()),
            Err(KernelError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_chain_is_ones() {
        let krp = khatri_rao_chain::<f64>(&[], 3).unwrap();
        assert_eq!(krp, array![[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_leave_out_one_matches_pairwise() {
        let u0 = array![[1.0, 2.0], [3.0, 4.0]];
        let u1 = array![[5.0, 6.0], [7.0, 8.0], [9.0, 10.0]];
        let u2 = array![[11.0, 12.0], [13.0, 14.0]];
        let factors = [u0.view(), u1.view(), u2.view()];

        for mode in 0..3 {
            let krp = khatri_rao_leave_out_one(&factors, mode).unwrap();
            let others: Vec<_> = (0..3).filter(|&i| i != mode).collect();
            let expected = khatri_rao(&factors[others[0]], &factors[others[1]]).unwrap();
            assert_eq!(krp, expected, "mode {}", mode);
        }
    }

    #[test]
    fn test_leave_out_one_single_factor() {
        let u0 = array![[2.0, 3.0]];
        let krp = khatri_rao_leave_out_one(&[u0.view()], 0).unwrap();
        assert_eq!(krp, array![[1.0, 1.0]]);
    }

    #[test]
    fn test_leave_out_one_invalid_mode() {
        let u0 = array![[1.0]];
        assert!(matches!(
            khatri_rao_leave_out_one(&[u0.view()], 1),
            Err(KernelError::InvalidMode { .. })
        ));
    }

    #[test]
    fn test_into_rejects_wrong_buffer() {
        let u0 = array![[1.0], [2.0]];
        let u1 = array![[1.0], [2.0], [3.0]];
        let mut out = Array2::<f64>::zeros((2, 1));
        let err = khatri_rao_leave_out_one_into(&[u0.view(), u1.view()], 0, &mut out.view_mut());
        assert!(matches!(err, Err(KernelError::DimensionMismatch { .. })));
    }
}
