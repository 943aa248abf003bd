//! The distributed alternating-update driver
//!
//! One [`DistAuntf`] runs per process. All of its collective operations must
//! be entered by every process in the same order; the driver guarantees that
//! by walking the same [`DriverState`] sequence on every rank.

use crate::config::NtfConfig;
use crate::error::{NtfError, NtfResult};
use crate::factors::DistNcpFactors;
use crate::fit::{model_norm_squared, relative_error};
use crate::gram::GramState;
use crate::luc::Luc;
use crate::mttkrp::MttkrpEngine;
use crate::timing::{generate_report, NtfTimings, Phase, Stopwatch, TimingReport};
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView2};
use std::sync::Arc;
use tenrso_comm::{Collective, Communicator, NtfCommunicator, ReduceOp};
use tenrso_core::DenseND;

/// Position of the driver in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Grams and gathers of modes 1..N, optional dimension tree
    Initializing,
    /// Update of one mode within one sweep
    Sweep { iteration: usize, mode: usize },
    /// Relative error after a completed sweep
    ComputeError { iteration: usize },
    /// Timing reduction
    Reporting,
    Terminal,
}

impl DriverState {
    /// The state that follows `self`
    pub fn next(self, modes: usize, iterations: usize, compute_error: bool) -> DriverState {
        let after_sweep = |iteration: usize| {
            if iteration + 1 < iterations {
                DriverState::Sweep {
                    iteration: iteration + 1,
                    mode: 0,
                }
            } else {
                DriverState::Reporting
            }
        };
        match self {
            DriverState::Initializing => DriverState::Sweep {
                iteration: 0,
                mode: 0,
            },
            DriverState::Sweep { iteration, mode } if mode + 1 < modes => DriverState::Sweep {
                iteration,
                mode: mode + 1,
            },
            DriverState::Sweep { iteration, .. } if compute_error => {
                DriverState::ComputeError { iteration }
            }
            DriverState::Sweep { iteration, .. } => after_sweep(iteration),
            DriverState::ComputeError { iteration } => after_sweep(iteration),
            DriverState::Reporting | DriverState::Terminal => DriverState::Terminal,
        }
    }
}

/// Result of [`DistAuntf::compute_ntf`] on one process
#[derive(Debug, Clone)]
pub struct NtfOutcome {
    /// Local factor shards, columns of unit global norm
    pub factors: Vec<Array2<f64>>,
    /// Column norms of the last updated mode
    pub lambda: Array1<f64>,
    /// Relative error after each iteration, empty unless enabled
    pub errors: Vec<f64>,
    pub report: TimingReport,
}

/// Distributed alternating-update NTF over one local tensor block
#[derive(Debug)]
pub struct DistAuntf<C: Communicator> {
    global_dims: Vec<usize>,
    comm: NtfCommunicator<C>,
    config: NtfConfig,
    factors: DistNcpFactors,
    grams: GramState,
    engine: MttkrpEngine,
    luc: Luc,
    timings: NtfTimings,
    global_sqnorm: f64,
}

impl<C: Communicator> DistAuntf<C> {
    /// Set up the engine for the local block `tensor` of a tensor with
    /// extents `global_dims`
    ///
    /// Shapes and settings are validated before the first collective. The
    /// initial shards are uniform random, seeded with `config.seed` plus the
    /// world rank, and normalized across all modes.
    pub fn new(
        tensor: DenseND<f64>,
        global_dims: &[usize],
        comm: NtfCommunicator<C>,
        config: NtfConfig,
    ) -> NtfResult<Self> {
        let modes = tensor.modes();
        if modes < 2 {
            return Err(NtfError::TooFewModes(modes));
        }
        let grid = comm.grid().dims().to_vec();
        if global_dims.len() != modes || grid.len() != modes {
            return Err(NtfError::ModeCountMismatch {
                tensor: modes,
                global: global_dims.len(),
                grid: grid.len(),
            });
        }
        config.validate(modes)?;

        let processes = comm.size();
        for mode in 0..modes {
            let global = global_dims[mode];
            for parts in [grid[mode], processes] {
                if global % parts != 0 {
                    return Err(NtfError::IndivisibleDimension { mode, global, parts });
                }
            }
            let local = tensor.dimensions()[mode];
            if local != global / grid[mode] {
                return Err(NtfError::DimensionMismatch {
                    mode,
                    local,
                    global,
                    grid: grid[mode],
                });
            }
        }

        comm.verify_topology()?;
        let global_sqnorm = comm
            .scope(Collective::NormAllReduce, 0)
            .all_reduce_scalar(tensor.norm_squared(), ReduceOp::Sum)?;
        if config.compute_error && global_sqnorm == 0.0 {
            return Err(NtfError::ZeroNormTensor);
        }

        let shard_rows: Vec<usize> = global_dims.iter().map(|&m| m / processes).collect();
        let seed = config.seed.wrapping_add(comm.rank() as u64);
        let mut factors = DistNcpFactors::new_random(&shard_rows, config.rank, seed);
        factors.distributed_normalize_all(&comm)?;

        let regularizers = (0..modes).map(|m| config.regularizer(m)).collect();
        let grams = GramState::new(modes, config.rank, regularizers);
        let engine = MttkrpEngine::new(Arc::new(tensor), &shard_rows, config.rank, config.dim_tree);

        tracing::debug!(
            rank = comm.rank(),
            coords = ?comm.coords(),
            ?shard_rows,
            "engine ready"
        );

        Ok(Self {
            global_dims: global_dims.to_vec(),
            luc: Luc::new(config.algorithm),
            comm,
            config,
            factors,
            grams,
            engine,
            timings: NtfTimings::new(),
            global_sqnorm,
        })
    }

    /// Replace the initial shards, then renormalize all modes
    ///
    /// Collective over the world group.
    pub fn set_initial_factors(&mut self, shards: Vec<Array2<f64>>) -> NtfResult<()> {
        if shards.len() != self.modes() {
            return Err(NtfError::ModeCountMismatch {
                tensor: self.modes(),
                global: self.global_dims.len(),
                grid: shards.len(),
            });
        }
        for (mode, shard) in shards.into_iter().enumerate() {
            self.factors.set(mode, shard)?;
        }
        self.factors.distributed_normalize_all(&self.comm)
    }

    pub fn modes(&self) -> usize {
        self.global_dims.len()
    }

    pub fn global_dims(&self) -> &[usize] {
        &self.global_dims
    }

    pub fn config(&self) -> &NtfConfig {
        &self.config
    }

    pub fn comm(&self) -> &NtfCommunicator<C> {
        &self.comm
    }

    pub fn factors(&self) -> &DistNcpFactors {
        &self.factors
    }

    pub fn grams(&self) -> &GramState {
        &self.grams
    }

    pub fn engine(&self) -> &MttkrpEngine {
        &self.engine
    }

    pub fn timings(&self) -> &NtfTimings {
        &self.timings
    }

    /// ‖X‖² of the whole distributed tensor
    pub fn global_sqnorm(&self) -> f64 {
        self.global_sqnorm
    }

    /// Refresh the regularized global Gram of `mode`
    pub fn update_global_gram(&mut self, mode: usize) -> NtfResult<()> {
        self.grams
            .update_global_gram(mode, &self.factors.factor(mode), &self.comm, &mut self.timings)
    }

    /// Combine every global Gram except `mode`'s
    pub fn gram_hadamard(&mut self, mode: usize) -> NtfResult<()> {
        self.grams.gram_hadamard(mode, &mut self.timings)
    }

    /// All-gather the shard of `mode` over its slice group
    pub fn gather_ncp_factor(&mut self, mode: usize) -> NtfResult<()> {
        self.engine
            .gather_ncp_factor(mode, &self.factors.factor(mode), &self.comm, &mut self.timings)
    }

    /// MTTKRP of `mode` reduced onto the owned rows
    pub fn distmttkrp(&mut self, mode: usize) -> NtfResult<()> {
        self.engine.distmttkrp(mode, &self.comm, &mut self.timings)
    }

    /// Relative error of the current model
    ///
    /// `unnormalized` is the last mode's shard as returned by the local
    /// solver, before normalization. Expects the Grams and the MTTKRP of the
    /// last mode to be those of the sweep that produced it. Collective over
    /// the world group.
    pub fn compute_error(&mut self, unnormalized: &ArrayView2<f64>) -> NtfResult<f64> {
        let last = self.modes() - 1;
        let mut sw = Stopwatch::start();
        let all_grams = self.grams.all_grams(last)?;
        let model = model_norm_squared(&self.factors.lambda().view(), &all_grams.view());
        let inner = (&self.engine.local_mttkrp(last) * unnormalized).sum();
        self.timings.add(Phase::ErrorCompute, sw.lap());

        let inner = self
            .comm
            .scope(Collective::ErrorAllReduce, last)
            .all_reduce_scalar(inner, ReduceOp::Sum)?;
        self.timings.add(Phase::ErrorCommunication, sw.lap());

        Ok(relative_error(self.global_sqnorm, model, inner))
    }

    fn initialize(&mut self) -> NtfResult<()> {
        // mode 0 is refreshed by the first update
        for mode in 1..self.modes() {
            self.update_global_gram(mode)?;
            self.gather_ncp_factor(mode)?;
        }
        if self.config.dim_tree {
            self.engine.build_dim_tree(self.modes() / 2)?;
        }
        Ok(())
    }

    /// One mode step; returns the unnormalized shard when the error needs it
    fn update_mode(&mut self, iteration: usize, mode: usize) -> NtfResult<Option<Array2<f64>>> {
        self.distmttkrp(mode)?;
        self.gram_hadamard(mode)?;

        let sw = Stopwatch::start();
        let updated = self.luc.update(
            self.grams.combined(),
            &self.engine.local_mttkrp_t(mode),
            &self.factors.factor(mode),
        )?;
        self.timings.add(Phase::Nnls, sw.elapsed());

        let unnormalized =
            (self.config.compute_error && mode + 1 == self.modes()).then(|| updated.clone());
        self.factors.set(mode, updated)?;
        self.factors.distributed_normalize(mode, &self.comm)?;
        self.update_global_gram(mode)?;
        self.gather_ncp_factor(mode)?;
        self.engine.set_tree_factor(mode)?;

        tracing::debug!(iteration, mode, "mode updated");
        Ok(unnormalized)
    }

    /// Run the configured number of sweeps and reduce the timings
    ///
    /// Collective over every group of the communicator.
    #[tracing::instrument(
        skip(self),
        fields(
            rank = self.comm.rank(),
            algorithm = %self.config.algorithm,
            k = self.config.rank
        )
    )]
    pub fn compute_ntf(mut self) -> NtfResult<NtfOutcome> {
        let total = Stopwatch::start();
        let is_root = self.comm.rank() == 0;
        let (modes, iterations, with_error) =
            (self.modes(), self.config.iterations, self.config.compute_error);

        let mut errors = Vec::new();
        let mut unnormalized: Option<Array2<f64>> = None;
        let mut report = None;
        let mut state = DriverState::Initializing;

        while state != DriverState::Terminal {
            match state {
                DriverState::Initializing => self.initialize()?,
                DriverState::Sweep { iteration, mode } => {
                    if let Some(u) = self.update_mode(iteration, mode)? {
                        unnormalized = Some(u);
                    }
                    if is_root && mode + 1 == modes && !with_error {
                        tracing::info!(iteration, "iteration complete");
                    }
                }
                DriverState::ComputeError { iteration } => {
                    let err = match unnormalized.take() {
                        Some(u) => self.compute_error(&u.view())?,
                        None => f64::NAN,
                    };
                    if is_root {
                        tracing::info!(iteration, relative_error = err, "iteration complete");
                    }
                    errors.push(err);
                }
                DriverState::Reporting => {
                    self.timings.add(Phase::Total, total.elapsed());
                    let r = generate_report(
                        &self.timings,
                        &self.comm,
                        self.config.rank,
                        self.config.algorithm,
                        with_error,
                    )?;
                    if is_root {
                        for line in r.to_string().lines() {
                            tracing::info!("{line}");
                        }
                    }
                    report = Some(r);
                }
                DriverState::Terminal => {}
            }
            state = state.next(modes, iterations, with_error);
        }

        let report = report.ok_or(NtfError::InvalidIterations(iterations))?;
        let (factors, lambda) = self.factors.into_parts();
        Ok(NtfOutcome {
            factors,
            lambda,
            errors,
            report,
        })
    }
}
