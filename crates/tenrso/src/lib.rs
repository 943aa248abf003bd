//! # TenRSo - Distributed Tensor Factorization for COOLJAPAN
//!
//! Nonnegative CP factorization of dense tensors cut over a process grid.
//!
//! This is the **meta crate** that re-exports all TenRSo components for convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use tenrso::prelude::*;
//!
//! let (x, _) = random_low_rank(&[4, 4, 4], 2, 1)?;
//! let comm = NtfCommunicator::new(SelfComm, ProcessGrid::new(&[1, 1, 1])?)?;
//! let config = NtfConfig::new(2, UpdateAlgorithm::Hals).with_iterations(10);
//!
//! let outcome = DistAuntf::new(x, &[4, 4, 4], comm, config)?.compute_ntf()?;
//! assert_eq!(outcome.factors.len(), 3);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Tensor Blocks ([`core`])
//!
//! Dense N-D blocks, grid partitioning and synthetic low-rank tensors.
//!
//! ```
//! use tenrso::core::{BlockPartition, DenseND};
//!
//! let part = BlockPartition::new(&[8, 6], &[2, 3]).unwrap();
//! assert_eq!(part.local_dims(), vec![4, 2]);
//! # let _ = DenseND::<f64>::zeros(&[4, 2]);
//! ```
//!
//! ### Local Kernels ([`kernels`])
//!
//! Khatri-Rao, MTTKRP, Gram and Hadamard products.
//!
//! ### Communication ([`comm`])
//!
//! The `Communicator` trait, the in-process `LocalComm`, process grids and
//! the per-mode fiber/slice groups. `MpiComm` is available with the `mpi`
//! feature.
//!
//! ### Dimension Trees ([`dimtree`])
//!
//! Reuse of partial MTTKRP contractions across modes.
//!
//! ### The Engine ([`ntf`])
//!
//! `DistAuntf`, local update solvers, error estimation and timing reports.
//!
//! ## Features
//!
//! - `parallel` (default): parallel kernel loops inside each process
//! - `mpi`: MPI-backed communicator

pub use tenrso_comm as comm;
pub use tenrso_core as core;
pub use tenrso_dimtree as dimtree;
pub use tenrso_kernels as kernels;
pub use tenrso_ntf as ntf;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tenrso::prelude::*;
    //!
    //! let tensor = DenseND::<f64>::zeros(&[10, 20, 30]);
    //! ```

    // Tensor blocks
    pub use crate::core::synthetic::{low_rank_tensor, random_factors, random_low_rank};
    pub use crate::core::{BlockPartition, DenseND};

    // Communication
    pub use crate::comm::{Communicator, LocalComm, NtfCommunicator, ProcessGrid, SelfComm};

    // Engine
    pub use crate::ntf::{
        DistAuntf, NtfConfig, NtfError, NtfOutcome, TimingReport, UpdateAlgorithm,
    };

    // Common kernels
    pub use crate::kernels::{gram, hadamard, khatri_rao, mttkrp};
}
