//! # tenrso-kernels
//!
//! Local dense kernels behind distributed CP/NTF.
//!
//! ## Overview
//!
//! Every process of a distributed factorization runs the same handful of
//! kernels on its own tensor block and factor blocks:
//!
//! - **Khatri-Rao product** - leave-one-out product of the gathered factors
//! - **MTTKRP** - tensor block times Khatri-Rao product, without matricizing
//! - **Gram** - symmetric UᵀU and its L1/L2 regularization
//! - **Hadamard** - element-wise combination of the inactive-mode Grams
//!
//! Kernels validate shapes and return [`KernelError`] instead of panicking,
//! and most have an `_into` variant that writes into a preallocated buffer so
//! the solver loop does not allocate per mode.
//!
//! ## Quick Start
//!
//! ```rust
//! use scirs2_core::ndarray_ext::Array2;
//! use tenrso_core::DenseND;
//! use tenrso_kernels::{gram, khatri_rao_leave_out_one, mttkrp_with_krp_into};
//!
//! let tensor = DenseND::<f64>::ones(&[3, 4, 5]);
//! let factors = vec![
//!     Array2::<f64>::ones((3, 2)),
//!     Array2::<f64>::ones((4, 2)),
//!     Array2::<f64>::ones((5, 2)),
//! ];
//! let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
//!
//! let krp = khatri_rao_leave_out_one(&views, 1).unwrap();
//! assert_eq!(krp.shape(), &[15, 2]);
//!
//! let mut out = Array2::<f64>::zeros((4, 2));
//! mttkrp_with_krp_into(&tensor.view(), &krp.view(), 1, &mut out.view_mut()).unwrap();
//! assert!(out.iter().all(|&v| v == 15.0));
//!
//! assert_eq!(gram(&factors[0].view())[[0, 1]], 3.0);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default) - Parallel column/row loops for large operands
//!
//! ## SciRS2 Integration
//!
//! This crate uses `scirs2-core` for all array operations and numerical computations.
//! Direct use of `ndarray`, `rand`, or `num-traits` is not permitted.
//! See `SCIRS2_INTEGRATION_POLICY.md` for details.

pub mod error;
pub mod gram;
pub mod hadamard;
pub mod khatri_rao;
pub mod mttkrp;
pub mod utils;


// Re-exports
pub use error::{KernelError, KernelResult};
pub use gram::*;
pub use hadamard::*;
pub use khatri_rao::*;
pub use mttkrp::*;
pub use utils::*;
