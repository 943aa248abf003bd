//! Per-phase timing statistics
//!
//! Every rank accumulates wall-clock seconds per [`Phase`] in [`NtfTimings`].
//! At the end of a run [`generate_report`] reduces each counter over the
//! world group and produces one [`TimingRow`] per phase holding the root
//! rank's value together with the minimum, mean and maximum over all ranks.

use crate::config::UpdateAlgorithm;
use crate::error::NtfResult;
use std::fmt;
use std::time::Instant;
use tenrso_comm::{Collective, Communicator, NtfCommunicator, ReduceOp};

/// Timed phase of a factorization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Total,
    Communication,
    Compute,
    AllGather,
    AllReduce,
    ReduceScatter,
    Gram,
    Krp,
    Mttkrp,
    Nnls,
    ErrorCompute,
    ErrorCommunication,
}

impl Phase {
    pub const COUNT: usize = 12;

    /// Phases reported for every run, in report order
    pub const CORE: [Phase; 10] = [
        Phase::Total,
        Phase::Communication,
        Phase::Compute,
        Phase::AllGather,
        Phase::AllReduce,
        Phase::ReduceScatter,
        Phase::Gram,
        Phase::Krp,
        Phase::Mttkrp,
        Phase::Nnls,
    ];

    /// Phases reported only when the relative error is computed
    pub const ERROR: [Phase; 2] = [Phase::ErrorCompute, Phase::ErrorCommunication];

    fn index(self) -> usize {
        self as usize
    }

    /// Row name used in the report
    pub fn label(self) -> &'static str {
        match self {
            Phase::Total => "total_d",
            Phase::Communication => "total_comm",
            Phase::Compute => "total_comp",
            Phase::AllGather => "total_allgather",
            Phase::AllReduce => "total_allreduce",
            Phase::ReduceScatter => "total_reducescatter",
            Phase::Gram => "total_gram",
            Phase::Krp => "total_krp",
            Phase::Mttkrp => "total_mttkrp",
            Phase::Nnls => "total_nnls",
            Phase::ErrorCompute => "total_err_compute",
            Phase::ErrorCommunication => "total_err_communication",
        }
    }
}

/// Seconds accumulated per phase on one rank
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NtfTimings {
    seconds: [f64; Phase::COUNT],
}

impl NtfTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, phase: Phase, seconds: f64) {
        self.seconds[phase.index()] += seconds;
    }

    pub fn get(&self, phase: Phase) -> f64 {
        self.seconds[phase.index()]
    }

    /// Charge a local computation to `phase` and to the compute total
    pub fn record_compute(&mut self, phase: Phase, seconds: f64) {
        self.add(phase, seconds);
        self.add(Phase::Compute, seconds);
    }

    /// Charge a collective to `phase` and to the communication total
    pub fn record_communication(&mut self, phase: Phase, seconds: f64) {
        self.add(phase, seconds);
        self.add(Phase::Communication, seconds);
    }
}

/// Wall-clock timer restarted at every lap
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since the last lap, restarting the timer
    pub fn lap(&mut self) -> f64 {
        let now = Instant::now();
        let seconds = now.duration_since(self.start).as_secs_f64();
        self.start = now;
        seconds
    }

    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

/// One phase reduced over the world group
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRow {
    pub phase: Phase,
    pub root: f64,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// Timing summary of a run
///
/// `min`, `avg` and `max` agree on every rank; `root` is the calling rank's
/// own counter, so the copy printed by rank 0 carries the root values.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    pub low_rank: usize,
    pub processes: usize,
    pub algorithm: UpdateAlgorithm,
    pub rows: Vec<TimingRow>,
}

impl TimingReport {
    pub fn row(&self, phase: Phase) -> Option<&TimingRow> {
        self.rows.iter().find(|r| r.phase == phase)
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(
                f,
                "{}::k::{}::SIZE::{}::algo::{}::root::{}::min::{}::avg::{}::max::{}",
                row.phase.label(),
                self.low_rank,
                self.processes,
                self.algorithm,
                row.root,
                row.min,
                row.avg,
                row.max
            )?;
        }
        Ok(())
    }
}

/// Reduce every reported phase over the world group
///
/// Collective: every rank must call it with the same `include_error`.
pub fn generate_report<C: Communicator>(
    timings: &NtfTimings,
    comm: &NtfCommunicator<C>,
    low_rank: usize,
    algorithm: UpdateAlgorithm,
    include_error: bool,
) -> NtfResult<TimingReport> {
    let world = comm.scope(Collective::TimingReduce, 0);
    world.barrier()?;

    let mut phases = Phase::CORE.to_vec();
    if include_error {
        phases.extend_from_slice(&Phase::ERROR);
    }

    let local: Vec<f64> = phases.iter().map(|&p| timings.get(p)).collect();
    let mut min = local.clone();
    let mut max = local.clone();
    let mut sum = local.clone();
    world.all_reduce(&mut min, ReduceOp::Min)?;
    world.all_reduce(&mut max, ReduceOp::Max)?;
    world.all_reduce(&mut sum, ReduceOp::Sum)?;

    let processes = world.size();
    let rows = phases
        .iter()
        .enumerate()
        .map(|(i, &phase)| TimingRow {
            phase,
            root: local[i],
            min: min[i],
            avg: sum[i] / processes as f64,
            max: max[i],
        })
        .collect();

    Ok(TimingReport {
        low_rank,
        processes,
        algorithm,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenrso_comm::{LocalComm, ProcessGrid, SelfComm};

    #[test]
    fn test_compute_and_communication_totals() {
        let mut t = NtfTimings::new();
        t.record_compute(Phase::Gram, 1.0);
        t.record_compute(Phase::Mttkrp, 2.0);
        t.record_communication(Phase::AllGather, 0.5);
        t.add(Phase::Nnls, 4.0);
        assert_eq!(t.get(Phase::Compute), 3.0);
        assert_eq!(t.get(Phase::Communication), 0.5);
        // local solves are not charged as compute
        assert_eq!(t.get(Phase::Nnls), 4.0);
    }

    #[test]
    fn test_report_rows_and_format() {
        let grid = ProcessGrid::new(&[1, 1]).unwrap();
        let comm = NtfCommunicator::new(SelfComm, grid).unwrap();
        let mut t = NtfTimings::new();
        t.add(Phase::Total, 2.0);

        let report = generate_report(&t, &comm, 3, UpdateAlgorithm::Hals, false).unwrap();
        assert_eq!(report.rows.len(), 10);
        assert!(report.row(Phase::ErrorCompute).is_none());

        let text = report.to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first, "total_d::k::3::SIZE::1::algo::hals::root::2::min::2::avg::2::max::2");

        let with_error = generate_report(&t, &comm, 3, UpdateAlgorithm::Hals, true).unwrap();
        assert_eq!(with_error.rows.len(), 12);
        assert_eq!(with_error.rows[11].phase.label(), "total_err_communication");
    }

    #[test]
    fn test_report_reduces_over_world() {
        let reports = LocalComm::run(4, |world| {
            let grid = ProcessGrid::new(&[2, 2]).unwrap();
            let comm = NtfCommunicator::new(world, grid).unwrap();
            let mut t = NtfTimings::new();
            t.add(Phase::Krp, 1.0 + comm.rank() as f64);
            generate_report(&t, &comm, 2, UpdateAlgorithm::Mu, false).unwrap()
        });
        for (rank, report) in reports.iter().enumerate() {
            let row = report.row(Phase::Krp).unwrap();
            assert_eq!(row.root, 1.0 + rank as f64);
            assert_eq!(row.min, 1.0);
            assert_eq!(row.max, 4.0);
            assert_eq!(row.avg, 2.5);
        }
    }

    #[test]
    fn test_stopwatch_lap_restarts() {
        let mut sw = Stopwatch::start();
        let first = sw.lap();
        assert!(first >= 0.0);
        assert!(sw.elapsed() >= 0.0);
    }
}
