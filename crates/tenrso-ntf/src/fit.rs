//! Relative reconstruction error from Gram matrices and one inner product
//!
//! With X ≈ Σᵣ λᵣ (a₁ᵣ ⊗ … ⊗ aₙᵣ) and unit-norm columns, the model norm is
//! λᵀ (G₁ ⊙ … ⊙ Gₙ) λ and ⟨X, model⟩ is the dot product of the last mode's
//! MTTKRP with its unnormalized factor, so the error never touches the
//! reconstructed tensor.

use scirs2_core::ndarray_ext::{ArrayView1, ArrayView2};

/// λᵀ G λ for the Hadamard product G of all global Grams
pub fn model_norm_squared(lambda: &ArrayView1<f64>, all_grams: &ArrayView2<f64>) -> f64 {
    all_grams.dot(lambda).dot(lambda)
}

/// sqrt(max(0, ‖X‖² + ‖M‖² − 2⟨X, M⟩) / ‖X‖²)
///
/// The radicand is clamped at zero; cancellation makes it slightly negative
/// when the model reproduces the tensor.
pub fn relative_error(tensor_norm_squared: f64, model_norm_squared: f64, inner: f64) -> f64 {
    let residual = (tensor_norm_squared + model_norm_squared - 2.0 * inner).max(0.0);
    (residual / tensor_norm_squared).sqrt()
}
