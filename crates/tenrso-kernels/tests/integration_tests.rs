//! Integration tests for tenrso-kernels
//!
//! MTTKRP is checked against its element-wise definition on tensors built
//! with tenrso-core.

use scirs2_core::ndarray_ext::Array2;
use tenrso_core::synthetic::random_factors;
use tenrso_core::DenseND;
use tenrso_kernels::{
    gram, gram_hadamard_into, inner_product, khatri_rao_leave_out_one, max_abs_diff, mttkrp,
    mttkrp_with_krp_into,
};

/// V[i, r] = Σ over all multi-indices with index `i` at `mode` of X · ∏ U_m[idx_m, r]
fn naive_mttkrp(x: &DenseND<f64>, factors: &[Array2<f64>], mode: usize) -> Array2<f64> {
    let dims = x.dimensions().to_vec();
    let rank = factors[0].ncols();
    let mut out = Array2::<f64>::zeros((dims[mode], rank));
    let mut idx = vec![0usize; dims.len()];
    for lin in 0..x.numel() {
        let mut rem = lin;
        for m in (0..dims.len()).rev() {
            idx[m] = rem % dims[m];
            rem /= dims[m];
        }
        let v = x[&idx[..]];
        for r in 0..rank {
            let mut p = v;
            for (m, f) in factors.iter().enumerate() {
                if m != mode {
                    p *= f[[idx[m], r]];
                }
            }
            out[[idx[mode], r]] += p;
        }
    }
    out
}

#[test]
fn test_mttkrp_matches_definition() {
    let dims = [3, 4, 2, 5];
    let x = DenseND::from_vec((0..120).map(|v| (v as f64).sin()).collect(), &dims).unwrap();
    let factors = random_factors(&dims, 3, 11);
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();

    for mode in 0..dims.len() {
        let fast = mttkrp(&x.view(), &views, mode).unwrap();
        let slow = naive_mttkrp(&x, &factors, mode);
        let diff = max_abs_diff(&fast.view(), &slow.view()).unwrap();
        assert!(diff < 1e-10, "mode {} differs by {}", mode, diff);
    }
}

#[test]
fn test_large_mttkrp_matches_definition() {
    // enough rows to take the parallel path when it is enabled
    let dims = [80, 3, 4];
    let x = DenseND::from_vec((0..960).map(|v| ((v * 7) % 13) as f64).collect(), &dims).unwrap();
    let factors = random_factors(&dims, 2, 5);
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();

    let krp = khatri_rao_leave_out_one(&views, 0).unwrap();
    let mut out = Array2::<f64>::zeros((80, 2));
    mttkrp_with_krp_into(&x.view(), &krp.view(), 0, &mut out.view_mut()).unwrap();

    let slow = naive_mttkrp(&x, &factors, 0);
    assert!(max_abs_diff(&out.view(), &slow.view()).unwrap() < 1e-9);
}

#[test]
fn test_model_norm_identity() {
    // ‖Σ_r ∘ U_m[:, r]‖² = 1ᵀ (⊛_m U_mᵀU_m) 1
    let dims = [3, 4, 2];
    let factors = random_factors(&dims, 2, 21);
    let x = tenrso_core::synthetic::low_rank_tensor(&factors, None).unwrap();

    let grams: Vec<_> = factors.iter().map(|f| gram(&f.view())).collect();
    let mut all = Array2::<f64>::zeros((2, 2));
    gram_hadamard_into(&grams, None, &mut all).unwrap();
    assert!((all.sum() - x.norm_squared()).abs() < 1e-9);

    // ⟨X, model⟩ = ⟨MTTKRP_m, U_m⟩ for any mode
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
    let v = mttkrp(&x.view(), &views, 2).unwrap();
    let inner = inner_product(&v.view(), &factors[2].view()).unwrap();
    assert!((inner - x.norm_squared()).abs() < 1e-9);
}
