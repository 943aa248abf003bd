//! The collective-communication contract used by the factorization engine
//!
//! Every operation is blocking and collective: all members of the group must
//! call the same operations in the same order with consistent buffer sizes.

use crate::error::{CommError, CommResult};

/// Element-wise reduction applied by [`Communicator::all_reduce`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

impl ReduceOp {
    /// Combine two values
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }
}

/// Blocking collectives over a fixed group of processes
pub trait Communicator {
    /// Rank of this process within the group
    fn rank(&self) -> usize;

    /// Number of processes in the group
    fn size(&self) -> usize;

    /// Block until every member has reached the barrier
    fn barrier(&self) -> CommResult<()>;

    /// Reduce `buf` element-wise over the group; every member receives the result
    fn all_reduce(&self, buf: &mut [f64], op: ReduceOp) -> CommResult<()>;

    /// Concatenate equal-sized blocks from every member in rank order
    ///
    /// `recv` must hold `size() * send.len()` elements.
    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()>;

    /// Sum `send` over the group and hand block `rank()` of the result to each member
    ///
    /// `send` must hold `size() * recv.len()` elements.
    fn reduce_scatter_block(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()>;

    /// Partition the group by `color`, ordering each part by `(key, rank)`
    fn split(&self, color: usize, key: usize) -> CommResult<Self>
    where
        Self: Sized;

    /// Reduce a single value over the group
    fn all_reduce_scalar(&self, value: f64, op: ReduceOp) -> CommResult<f64> {
        let mut buf = [value];
        self.all_reduce(&mut buf, op)?;
        Ok(buf[0])
    }
}

/// Check the `recv = size × send` relation shared by gather-like collectives
pub(crate) fn check_blocks(
    operation: &'static str,
    block: usize,
    total: usize,
    size: usize,
) -> CommResult<()> {
    if block * size != total {
        return Err(CommError::CountMismatch {
            operation,
            expected: block * size,
            actual: total,
        });
    }
    Ok(())
}

/// The trivial single-process group
///
/// Collectives copy their input; `split` always yields another single-process
/// group.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> CommResult<()> {
        Ok(())
    }

    fn all_reduce(&self, _buf: &mut [f64], _op: ReduceOp) -> CommResult<()> {
        Ok(())
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()> {
        check_blocks("all_gather", send.len(), recv.len(), 1)?;
        recv.copy_from_slice(send);
        Ok(())
    }

    fn reduce_scatter_block(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()> {
        check_blocks("reduce_scatter_block", recv.len(), send.len(), 1)?;
        recv.copy_from_slice(send);
        Ok(())
    }

    fn split(&self, _color: usize, _key: usize) -> CommResult<Self> {
        Ok(SelfComm)
    }
}
