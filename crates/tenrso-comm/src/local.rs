//! In-process communicator backed by one thread per rank
//!
//! [`LocalComm::run`] spawns `size` scoped threads and hands each a world
//! communicator. Collectives are two-phase rendezvous on a shared barrier:
//! every member publishes its contribution, waits, reads all contributions in
//! rank order, and waits again before the slots may be reused. Reductions
//! therefore combine in the same order on every rank and give bit-identical
//! results everywhere.
//!
//! A rank whose closure returns or panics is marked as departed. Peers blocked
//! in a barrier of any group containing it fail with [`CommError::Aborted`]
//! instead of hanging.

use crate::communicator::{check_blocks, Communicator, ReduceOp};
use crate::error::{CommError, CommResult};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Universe {
    departed: Vec<AtomicBool>,
}

impl Universe {
    fn new(size: usize) -> Self {
        Self {
            departed: (0..size).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    fn any_departed(&self, members: &[usize]) -> bool {
        members
            .iter()
            .any(|&m| self.departed[m].load(Ordering::Acquire))
    }
}

/// Marks a world rank as gone when its thread finishes, normally or not
struct Departure {
    universe: Arc<Universe>,
    rank: usize,
}

impl Drop for Departure {
    fn drop(&mut self) {
        self.universe.departed[self.rank].store(true, Ordering::Release);
    }
}

struct BarrierState {
    arrived: usize,
    generation: u64,
}

struct Group {
    /// World rank of each member, indexed by group rank
    members: Vec<usize>,
    universe: Arc<Universe>,
    barrier: Mutex<BarrierState>,
    cvar: Condvar,
    slots: Vec<RwLock<Vec<f64>>>,
    split_requests: Mutex<Vec<(usize, usize)>>,
    split_groups: Mutex<HashMap<usize, Arc<Group>>>,
}

impl Group {
    fn new(members: Vec<usize>, universe: Arc<Universe>) -> Self {
        let size = members.len();
        Self {
            members,
            universe,
            barrier: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            cvar: Condvar::new(),
            slots: (0..size).map(|_| RwLock::new(Vec::new())).collect(),
            split_requests: Mutex::new(vec![(0, 0); size]),
            split_groups: Mutex::new(HashMap::new()),
        }
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn wait(&self) -> CommResult<()> {
        let mut state = self.barrier.lock();
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size() {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }
        // A departed member can only have passed barriers that already completed.
        while state.generation == generation {
            if self.universe.any_departed(&self.members) {
                return Err(CommError::Aborted);
            }
            self.cvar.wait_for(&mut state, POLL_INTERVAL);
        }
        Ok(())
    }

    /// Publish `send`, then run `combine` over every member's contribution
    fn rendezvous<R>(
        &self,
        rank: usize,
        send: &[f64],
        combine: impl FnOnce(&[&[f64]]) -> CommResult<R>,
    ) -> CommResult<R> {
        {
            let mut slot = self.slots[rank].write();
            slot.clear();
            slot.extend_from_slice(send);
        }
        self.wait()?;
        let result = {
            let guards: Vec<_> = self.slots.iter().map(|s| s.read()).collect();
            let parts: Vec<&[f64]> = guards.iter().map(|g| g.as_slice()).collect();
            combine(&parts)
        };
        self.wait()?;
        result
    }
}

fn check_parts(operation: &'static str, parts: &[&[f64]], len: usize) -> CommResult<()> {
    match parts.iter().find(|p| p.len() != len) {
        Some(p) => Err(CommError::CountMismatch {
            operation,
            expected: len,
            actual: p.len(),
        }),
        None => Ok(()),
    }
}

/// Thread-backed communicator for running SPMD code inside one process
#[derive(Clone)]
pub struct LocalComm {
    group: Arc<Group>,
    rank: usize,
}

impl fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.group.size())
            .field("members", &self.group.members)
            .finish()
    }
}

impl LocalComm {
    /// Run `f` on `size` ranks, one thread each, and collect the results in rank order
    ///
    /// A panic on any rank is resumed on the caller once all threads have
    /// stopped; the remaining ranks see [`CommError::Aborted`] from their next
    /// collective.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrso_comm::{Communicator, LocalComm, ReduceOp};
    ///
    /// let sums = LocalComm::run(4, |comm| {
    ///     comm.all_reduce_scalar(comm.rank() as f64, ReduceOp::Sum).unwrap()
    /// });
    /// assert_eq!(sums, vec![6.0; 4]);
    /// ```
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        tracing::debug!(size, "starting in-process communicator group");
        let universe = Arc::new(Universe::new(size));
        let world = Arc::new(Group::new((0..size).collect(), Arc::clone(&universe)));
        let f = &f;

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let comm = LocalComm {
                        group: Arc::clone(&world),
                        rank,
                    };
                    let universe = Arc::clone(&universe);
                    scope.spawn(move || {
                        let _departure = Departure { universe, rank };
                        f(comm)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }

    /// World ranks of the members of this group, in group-rank order
    pub fn members(&self) -> &[usize] {
        &self.group.members
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size()
    }

    fn barrier(&self) -> CommResult<()> {
        self.group.wait()
    }

    fn all_reduce(&self, buf: &mut [f64], op: ReduceOp) -> CommResult<()> {
        let len = buf.len();
        let reduced = self.group.rendezvous(self.rank, buf, |parts| {
            check_parts("all_reduce", parts, len)?;
            let mut acc = parts[0].to_vec();
            for part in &parts[1..] {
                for (a, &b) in acc.iter_mut().zip(part.iter()) {
                    *a = op.apply(*a, b);
                }
            }
            Ok(acc)
        })?;
        buf.copy_from_slice(&reduced);
        Ok(())
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()> {
        check_blocks("all_gather", send.len(), recv.len(), self.size())?;
        let block = send.len();
        self.group.rendezvous(self.rank, send, |parts| {
            check_parts("all_gather", parts, block)?;
            for (dst, part) in recv.chunks_mut(block.max(1)).zip(parts.iter()) {
                dst.copy_from_slice(part);
            }
            Ok(())
        })
    }

    fn reduce_scatter_block(&self, send: &[f64], recv: &mut [f64]) -> CommResult<()> {
        check_blocks("reduce_scatter_block", recv.len(), send.len(), self.size())?;
        let block = recv.len();
        let offset = self.rank * block;
        self.group.rendezvous(self.rank, send, |parts| {
            check_parts("reduce_scatter_block", parts, send.len())?;
            recv.fill(0.0);
            for part in parts {
                for (r, &v) in recv.iter_mut().zip(&part[offset..offset + block]) {
                    *r += v;
                }
            }
            Ok(())
        })
    }

    fn split(&self, color: usize, key: usize) -> CommResult<Self> {
        self.group.split_requests.lock()[self.rank] = (color, key);
        self.group.wait()?;

        let part: Vec<usize> = {
            let requests = self.group.split_requests.lock();
            let mut part: Vec<(usize, usize)> = requests
                .iter()
                .enumerate()
                .filter(|(_, req)| req.0 == color)
                .map(|(r, req)| (req.1, r))
                .collect();
            part.sort_unstable();
            part.into_iter().map(|(_, r)| r).collect()
        };
        let new_rank = part.iter().position(|&r| r == self.rank);

        let group = {
            let mut groups = self.group.split_groups.lock();
            let entry = groups.entry(color).or_insert_with(|| {
                let members = part.iter().map(|&r| self.group.members[r]).collect();
                Arc::new(Group::new(members, Arc::clone(&self.group.universe)))
            });
            Arc::clone(entry)
        };

        self.group.wait()?;
        if self.rank == 0 {
            self.group.split_groups.lock().clear();
        }

        let rank = new_rank.ok_or(CommError::SplitFailed { color })?;
        tracing::trace!(color, key, rank, size = group.size(), "split communicator");
        Ok(LocalComm { group, rank })
    }
}
