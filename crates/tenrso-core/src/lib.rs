//! # tenrso-core
//!
//! Core tensor types for the TenRSo distributed factorization stack.
//!
//! - **Dense tensor blocks** ([`DenseND`]) in row-major layout
//! - **Grid partitioning** ([`BlockPartition`]) describing which block of a
//!   global tensor, and which factor rows, each process owns
//! - **Synthetic tensors** ([`synthetic`]) with exact low-rank structure
//!
//! ## SciRS2 Integration
//!
//! **CRITICAL:** This crate uses `scirs2-core` for all scientific computing operations.
//! Direct use of `ndarray`, `rand`, or `num-traits` is forbidden. See `SCIRS2_INTEGRATION_POLICY.md`.
//!
//! ## Quick Start
//!
//! ```
//! use tenrso_core::{BlockPartition, DenseND};
//! use tenrso_core::synthetic::random_low_rank;
//!
//! let (global, _factors) = random_low_rank(&[4, 4, 4], 2, 42).unwrap();
//! let part = BlockPartition::new(global.dimensions(), &[2, 1, 1]).unwrap();
//!
//! let block: DenseND<f64> = part.extract(&global, &[1, 0, 0]).unwrap();
//! assert_eq!(block.dimensions(), &[2, 4, 4]);
//! ```

pub mod dense;
pub mod partition;
pub mod synthetic;


pub use dense::DenseND;
pub use partition::BlockPartition;
