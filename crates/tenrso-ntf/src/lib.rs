//! # tenrso-ntf
//!
//! Distributed alternating-update nonnegative tensor factorization.
//!
//! A dense N-mode tensor is cut into blocks over a P₁ × … × Pₙ process grid.
//! Each process runs one [`DistAuntf`] on its block and, per sweep and mode:
//!
//! 1. computes the block MTTKRP against the gathered factors of the other
//!    modes and reduce-scatters it over the mode's slice group
//! 2. combines the global Grams of the other modes by Hadamard product
//! 3. solves for its own factor rows with the configured [`UpdateAlgorithm`]
//! 4. normalizes the columns, refreshes the mode's global Gram over the world
//!    group and re-gathers the updated rows
//!
//! An optional [`DimensionTree`](tenrso_dimtree::DimensionTree) replaces the
//! per-mode Khatri-Rao product with cached partial contractions.
//!
//! ## Quick Start
//!
//! ```rust
//! use tenrso_comm::{LocalComm, NtfCommunicator, ProcessGrid};
//! use tenrso_core::{synthetic::random_low_rank, BlockPartition};
//! use tenrso_ntf::{DistAuntf, NtfConfig, UpdateAlgorithm};
//!
//! let dims = [4, 4, 4];
//! let (x, _) = random_low_rank(&dims, 2, 3).unwrap();
//! let partition = BlockPartition::new(&dims, &[2, 1, 1]).unwrap();
//!
//! let errors = LocalComm::run(2, |world| {
//!     let grid = ProcessGrid::new(&[2, 1, 1]).unwrap();
//!     let comm = NtfCommunicator::new(world, grid).unwrap();
//!     let block = partition.extract(&x, comm.coords()).unwrap();
//!     let config = NtfConfig::new(2, UpdateAlgorithm::AnlsBpp)
//!         .with_iterations(5)
//!         .with_error(true);
//!     let engine = DistAuntf::new(block, &dims, comm, config).unwrap();
//!     engine.compute_ntf().unwrap().errors
//! });
//! assert_eq!(errors[0], errors[1]);
//! assert_eq!(errors[0].len(), 5);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default) - parallel kernel loops inside each process
//! - `mpi` - run over MPI through `tenrso_comm::MpiComm`

pub mod auntf;
pub mod config;
pub mod error;
pub mod factors;
pub mod fit;
pub mod gram;
pub mod luc;
pub mod mttkrp;
pub mod timing;


pub use auntf::{DistAuntf, DriverState, NtfOutcome};
pub use config::{NtfConfig, UpdateAlgorithm};
pub use error::{NtfError, NtfResult};
pub use factors::DistNcpFactors;
pub use fit::{model_norm_squared, relative_error};
pub use gram::GramState;
pub use luc::Luc;
pub use mttkrp::MttkrpEngine;
pub use timing::{generate_report, NtfTimings, Phase, Stopwatch, TimingReport, TimingRow};
