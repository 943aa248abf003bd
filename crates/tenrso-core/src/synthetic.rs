//! Synthetic tensors with known CP structure
//!
//! Used to drive the factorization engine without tensor files: a tensor is
//! built as X = Σᵣ λᵣ (u₁ᵣ ⊗ u₂ᵣ ⊗ … ⊗ uₙᵣ) from explicit factor matrices,
//! so that the exact rank and the exact reconstruction are known.

use crate::dense::DenseND;
use scirs2_core::ndarray_ext::{Array1, Array2};
use scirs2_core::random::{rngs::StdRng, Rng, SeedableRng};

/// Random nonnegative factor matrices with entries in [0, 1)
///
/// # Examples
///
/// ```
/// use tenrso_core::synthetic::random_factors;
///
/// let factors = random_factors(&[4, 5, 6], 3, 7);
/// assert_eq!(factors.len(), 3);
/// assert_eq!(factors[1].shape(), &[5, 3]);
/// ```
pub fn random_factors(dims: &[usize], rank: usize, seed: u64) -> Vec<Array2<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    dims.iter()
        .map(|&d| Array2::from_shape_fn((d, rank), |_| rng.random::<f64>()))
        .collect()
}

/// Assemble Σᵣ λᵣ (u₁ᵣ ⊗ … ⊗ uₙᵣ)
///
/// `weights` defaults to all ones.
///
/// # Errors
///
/// Fails if no factors are given, if their column counts differ, or if the
/// weight vector has the wrong length.
///
/// # Complexity
///
/// Time: O(R × ∏ᵢ Iᵢ)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_core::synthetic::low_rank_tensor;
///
/// let a = array![[1.0], [2.0]];
/// let b = array![[3.0], [4.0]];
/// let x = low_rank_tensor(&[a, b], None).unwrap();
/// assert_eq!(x.as_slice(), &[3.0, 4.0, 6.0, 8.0]);
/// ```
pub fn low_rank_tensor(
    factors: &[Array2<f64>],
    weights: Option<&Array1<f64>>,
) -> anyhow::Result<DenseND<f64>> {
    let Some(first) = factors.first() else {
        anyhow::bail!("At least one factor matrix is required");
    };
    let rank = first.ncols();
    for (i, factor) in factors.iter().enumerate() {
        if factor.ncols() != rank {
            anyhow::bail!(
                "Factor matrix {} has {} columns, expected {}",
                i,
                factor.ncols(),
                rank
            );
        }
    }
    if let Some(w) = weights {
        if w.len() != rank {
            anyhow::bail!("Weight vector has length {}, expected {}", w.len(), rank);
        }
    }

    let shape: Vec<usize> = factors.iter().map(|f| f.nrows()).collect();
    let total: usize = shape.iter().product();
    let n_modes = shape.len();
    let mut data = vec![0.0; total];

    for r in 0..rank {
        let weight = weights.map_or(1.0, |w| w[r]);
        for (idx, slot) in data.iter_mut().enumerate() {
            let mut value = weight;
            let mut remaining = idx;
            for mode in (0..n_modes).rev() {
                let i = remaining % shape[mode];
                remaining /= shape[mode];
                value *= factors[mode][[i, r]];
            }
            *slot += value;
        }
    }

    DenseND::from_vec(data, &shape)
}

/// Random nonnegative tensor of exact CP rank `rank`, together with its factors
pub fn random_low_rank(
    dims: &[usize],
    rank: usize,
    seed: u64,
) -> anyhow::Result<(DenseND<f64>, Vec<Array2<f64>>)> {
    let factors = random_factors(dims, rank, seed);
    let tensor = low_rank_tensor(&factors, None)?;
    Ok((tensor, factors))
}
