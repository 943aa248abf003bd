//! MPI communication backend
//!
//! Requires the `mpi` feature flag and an MPI installation. The caller
//! initializes MPI and keeps the universe alive for as long as any
//! communicator derived from it is in use:
//!
//! ```ignore
//! let universe = mpi::initialize().ok_or_else(|| anyhow::anyhow!("MPI init failed"))?;
//! let world = MpiComm::world(&universe);
//! ```

use crate::communicator::{check_blocks, Communicator, ReduceOp};
use crate::error::{CommError, CommResult};
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::{Communicator as _, CommunicatorCollectives as _};

/// [`Communicator`] over an MPI communicator
pub struct MpiComm {
    comm: SimpleCommunicator,
}

impl MpiComm {
    /// Wrap an existing MPI communicator
    pub fn new(comm: SimpleCommunicator) -> Self {
        Self { comm }
    }

    /// The world communicator of an initialized universe
    pub fn world(universe: &Universe) -> Self {
        Self::new(universe.world())
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn barrier(&self) -> CommResult<()> {
        self.comm.barrier();
        Ok(())
    }

    fn all_reduce(&self, buf: &mut [f64], op: ReduceOp) -> CommResult<()> {
        let send = buf.to_vec();
        match op {
            ReduceOp::Sum => self
                .comm
                .all_reduce_into(&send[..], buf, SystemOperation::sum()),
            ReduceOp::Max => self
                .comm
                .all_reduce_into(&send[..], buf, SystemOperation::max()),
            ReduceOp::Min => self
                .comm
                .all_reduce_into(&send[..], buf, SystemOperation::min()),
        }
        Ok(())
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()> {
        check_blocks("all_gather", send.len(), recv.len(), self.size())?;
        self.comm.all_gather_into(send, recv);
        Ok(())
    }

    fn reduce_scatter_block(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()> {
        check_blocks("reduce_scatter_block", recv.len(), send.len(), self.size())?;
        self.comm
            .reduce_scatter_block_into(send, recv, SystemOperation::sum());
        Ok(())
    }

    fn split(&self, color: usize, key: usize) -> CommResult<Self> {
        self.comm
            .split_by_color_with_key(Color::with_value(color as i32), key as i32)
            .map(MpiComm::new)
            .ok_or(CommError::SplitFailed { color })
    }
}
