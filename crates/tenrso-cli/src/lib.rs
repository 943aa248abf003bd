//! # tenrso-cli
//!
//! Command-line driver for the distributed NTF engine. `distntf` builds a
//! synthetic low-rank tensor, cuts it over a process grid, and runs one
//! engine per grid position on its own thread.
//!
//! ```bash
//! distntf --dims 32,32,32 --grid 2,2,1 --rank 8 --algorithm bpp --iterations 20 --error
//! distntf --dims 16,16,16,16 --grid 2,1,1,2 --config ntf.json --log-format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tenrso_comm::{CommError, LocalComm, NtfCommunicator, ProcessGrid};
use tenrso_core::synthetic::random_low_rank;
use tenrso_core::BlockPartition;
use tenrso_ntf::{DistAuntf, NtfConfig, NtfError, NtfOutcome, TimingReport, UpdateAlgorithm};

/// Distributed nonnegative CP factorization of a synthetic tensor
#[derive(Parser, Debug, Clone)]
#[command(name = "distntf")]
#[command(about = "Distributed alternating-update NTF over an in-process process grid")]
#[command(version)]
pub struct Args {
    /// Global tensor dimensions, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub dims: Vec<usize>,

    /// Process grid extents, one per mode
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub grid: Vec<usize>,

    /// Factorization rank
    #[arg(short = 'k', long)]
    pub rank: Option<usize>,

    /// Local update: mu, hals, bpp (anls_bpp) or als (cp_als)
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// Outer iterations
    #[arg(short = 't', long)]
    pub iterations: Option<usize>,

    /// Regularizers as l2_0,l1_0,l2_1,l1_1,...
    #[arg(long, value_delimiter = ',')]
    pub regs: Option<Vec<f64>>,

    /// Report the relative error after every iteration
    #[arg(short, long)]
    pub error: bool,

    /// Use the dimension tree for MTTKRP
    #[arg(long)]
    pub dim_tree: bool,

    /// Seed for factor initialization
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rank of the synthetic tensor (defaults to the factorization rank)
    #[arg(long)]
    pub tensor_rank: Option<usize>,

    /// JSON file holding an `NtfConfig`; flags override its fields
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the default `tenrso_ntf=info,tenrso_cli=info` filter.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tenrso_ntf=info,tenrso_cli=info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match format {
        LogFormat::Json => subscriber
            .json()
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .try_init(),
        LogFormat::Compact => subscriber.compact().try_init(),
        LogFormat::Pretty => subscriber.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Merge the optional config file with the command-line flags
pub fn build_config(args: &Args) -> Result<NtfConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => NtfConfig::default(),
    };

    if let Some(rank) = args.rank {
        config.rank = rank;
    }
    if let Some(name) = &args.algorithm {
        config.algorithm = name
            .parse::<UpdateAlgorithm>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(regs) = &args.regs {
        config.regularizers = regs.clone();
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.compute_error |= args.error;
    config.dim_tree |= args.dim_tree;
    Ok(config)
}

/// The failing rank's own error rather than the aborts it caused on its peers
fn first_cause(errors: impl IntoIterator<Item = anyhow::Error>) -> Option<anyhow::Error> {
    let is_abort = |e: &anyhow::Error| {
        matches!(e.downcast_ref::<CommError>(), Some(CommError::Aborted))
            || matches!(
                e.downcast_ref::<NtfError>(),
                Some(NtfError::Comm(CommError::Aborted))
            )
    };
    let (aborts, causes): (Vec<_>, Vec<_>) = errors.into_iter().partition(is_abort);
    causes.into_iter().chain(aborts).next()
}

/// What rank 0 saw
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub config: NtfConfig,
    pub errors: Vec<f64>,
    pub report: TimingReport,
}

/// Factor a synthetic tensor on `product(grid)` threads
pub fn run(args: &Args) -> Result<RunSummary> {
    let config = build_config(args)?;
    let partition = BlockPartition::new(&args.dims, &args.grid)?;
    let tensor_rank = args.tensor_rank.unwrap_or(config.rank);
    let (global, _) = random_low_rank(&args.dims, tensor_rank, config.seed.wrapping_add(1))?;
    let processes: usize = args.grid.iter().product();

    tracing::info!(
        dims = ?args.dims,
        grid = ?args.grid,
        processes,
        rank = config.rank,
        algorithm = %config.algorithm,
        "starting distributed factorization"
    );

    let outcomes = LocalComm::run(processes, |world| -> Result<NtfOutcome> {
        let comm = NtfCommunicator::new(world, ProcessGrid::new(&args.grid)?)?;
        let block = partition.extract(&global, comm.coords())?;
        let engine = DistAuntf::new(block, &args.dims, comm, config.clone())?;
        Ok(engine.compute_ntf()?)
    });

    let (ok, failed): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(|r| r.is_ok());
    if let Some(cause) = first_cause(failed.into_iter().filter_map(|r| r.err())) {
        return Err(cause);
    }
    let root = ok
        .into_iter()
        .find_map(|r| r.ok())
        .context("process grid is empty")?;

    Ok(RunSummary {
        config,
        errors: root.errors,
        report: root.report,
    })
}
