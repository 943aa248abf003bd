//! Run configuration for [`DistAuntf`](crate::DistAuntf)

use crate::error::{NtfError, NtfResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local update rule applied to each factor slab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAlgorithm {
    /// Multiplicative update (nonnegative)
    Mu,
    /// Hierarchical ALS, one column at a time (nonnegative)
    Hals,
    /// Alternating nonnegative least squares with block principal pivoting
    AnlsBpp,
    /// Unconstrained least squares
    CpAls,
}

impl UpdateAlgorithm {
    /// Whether the update keeps every entry nonnegative
    pub fn is_nonnegative(self) -> bool {
        !matches!(self, UpdateAlgorithm::CpAls)
    }
}

impl fmt::Display for UpdateAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateAlgorithm::Mu => "mu",
            UpdateAlgorithm::Hals => "hals",
            UpdateAlgorithm::AnlsBpp => "anls_bpp",
            UpdateAlgorithm::CpAls => "cp_als",
        };
        f.write_str(name)
    }
}

impl FromStr for UpdateAlgorithm {
    type Err = NtfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mu" => Ok(UpdateAlgorithm::Mu),
            "hals" => Ok(UpdateAlgorithm::Hals),
            "anls_bpp" | "bpp" => Ok(UpdateAlgorithm::AnlsBpp),
            "cp_als" | "als" => Ok(UpdateAlgorithm::CpAls),
            other => Err(NtfError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Factorization settings
///
/// Regularizers are laid out as `[l2_0, l1_0, l2_1, l1_1, ...]`; an empty
/// vector means no regularization on any mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfConfig {
    pub rank: usize,
    pub algorithm: UpdateAlgorithm,
    pub iterations: usize,
    pub regularizers: Vec<f64>,
    pub compute_error: bool,
    pub dim_tree: bool,
    /// Added to the world rank to seed each process's initial factors
    pub seed: u64,
}

impl Default for NtfConfig {
    fn default() -> Self {
        Self {
            rank: 10,
            algorithm: UpdateAlgorithm::AnlsBpp,
            iterations: 30,
            regularizers: Vec::new(),
            compute_error: false,
            dim_tree: false,
            seed: 0,
        }
    }
}

impl NtfConfig {
    pub fn new(rank: usize, algorithm: UpdateAlgorithm) -> Self {
        Self {
            rank,
            algorithm,
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_regularizers(mut self, regularizers: Vec<f64>) -> Self {
        self.regularizers = regularizers;
        self
    }

    pub fn with_error(mut self, enable: bool) -> Self {
        self.compute_error = enable;
        self
    }

    pub fn with_dim_tree(mut self, enable: bool) -> Self {
        self.dim_tree = enable;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// (L2, L1) weights of `mode`
    pub fn regularizer(&self, mode: usize) -> (f64, f64) {
        match (
            self.regularizers.get(2 * mode),
            self.regularizers.get(2 * mode + 1),
        ) {
            (Some(&l2), Some(&l1)) => (l2, l1),
            _ => (0.0, 0.0),
        }
    }

    /// Check the settings against a tensor with `modes` modes
    pub fn validate(&self, modes: usize) -> NtfResult<()> {
        if self.rank == 0 {
            return Err(NtfError::InvalidRank(self.rank));
        }
        if self.iterations == 0 {
            return Err(NtfError::InvalidIterations(self.iterations));
        }
        if !self.regularizers.is_empty() && self.regularizers.len() != 2 * modes {
            return Err(NtfError::RegularizerLength {
                expected: 2 * modes,
                actual: self.regularizers.len(),
            });
        }
        if let Some((index, &value)) = self
            .regularizers
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(NtfError::InvalidRegularizer { index, value });
        }
        Ok(())
    }
}
