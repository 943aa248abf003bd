//! # tenrso-comm
//!
//! Collective communication for distributed tensor factorization.
//!
//! - [`Communicator`] - blocking all-reduce, all-gather, reduce-scatter and split
//! - [`SelfComm`] - the single-process group
//! - [`LocalComm`] - one thread per rank inside one process, used by tests and the CLI
//! - `MpiComm` - the same contract over MPI (feature `mpi`)
//! - [`ProcessGrid`] and [`NtfCommunicator`] - grid layout with per-mode fiber
//!   and slice groups, and the mapping from engine collectives to groups
//!
//! ## Quick Start
//!
//! ```
//! use tenrso_comm::{Collective, Communicator, LocalComm, NtfCommunicator, ProcessGrid};
//!
//! let sizes = LocalComm::run(4, |world| {
//!     let grid = ProcessGrid::new(&[2, 2, 1]).unwrap();
//!     let comm = NtfCommunicator::new(world, grid).unwrap();
//!     comm.verify_topology().unwrap();
//!     comm.scope(Collective::FactorAllGather, 0).size()
//! });
//! assert_eq!(sizes, vec![2; 4]);
//! ```

pub mod communicator;
pub mod error;
pub mod grid;
pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod topology;

pub use communicator::{Communicator, ReduceOp, SelfComm};
pub use error::{CommError, CommResult};
pub use grid::ProcessGrid;
pub use local::LocalComm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;
pub use topology::{Collective, CommScope, NtfCommunicator};
