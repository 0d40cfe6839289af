use quantum::StorageKind;
use serde::{Deserialize, Serialize};

use crate::solvers::lanczos::LanczosConfig;

/// Which eigenpairs to compute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub count: usize,
    pub vectors: bool,
    /// Eigenpairs nearest this value instead of the lowest ones.
    pub target: Option<f64>,
}

impl SolveRequest {
    /// Lowest `count` eigenvalues together with their eigenvectors.
    pub fn lowest(count: usize) -> Self {
        Self {
            count,
            vectors: true,
            target: None,
        }
    }

    pub fn with_vectors(mut self, vectors: bool) -> Self {
        self.vectors = vectors;

        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);

        self
    }

    pub fn clipped(&self, size: usize) -> Self {
        Self {
            count: self.count.min(size),
            ..self.clone()
        }
    }

    /// Whether a result computed for `self` already answers `other`.
    pub fn covers(&self, other: &SolveRequest) -> bool {
        self.target == other.target && self.count >= other.count && (self.vectors || !other.vectors)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Solver {
    Dense,
    Banded,
    Lanczos,
}

impl Solver {
    /// Matrix shape the solver consumes.
    pub fn storage(&self) -> StorageKind {
        match self {
            Solver::Dense => StorageKind::Dense,
            Solver::Banded => StorageKind::Banded,
            Solver::Lanczos => StorageKind::Sparse,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum SolverChoice {
    #[default]
    Auto,
    Forced(Solver),
}

/// Thresholds of the automatic solver choice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverPolicy {
    /// Bases up to this size are always diagonalized densely.
    pub dense_limit: usize,
    /// Requests for at least this fraction of the spectrum go dense.
    pub dense_fraction: f64,
    /// Banded storage is used while `band_width * band_ratio <= size`.
    pub band_ratio: usize,
    pub lanczos: LanczosConfig,
}

impl Default for SolverPolicy {
    fn default() -> Self {
        Self {
            dense_limit: 400,
            dense_fraction: 0.25,
            band_ratio: 8,
            lanczos: LanczosConfig::default(),
        }
    }
}

impl SolverPolicy {
    pub fn with_dense_limit(mut self, dense_limit: usize) -> Self {
        self.dense_limit = dense_limit;

        self
    }

    pub fn with_dense_fraction(mut self, dense_fraction: f64) -> Self {
        self.dense_fraction = dense_fraction;

        self
    }

    pub fn with_band_ratio(mut self, band_ratio: usize) -> Self {
        self.band_ratio = band_ratio;

        self
    }

    pub fn with_lanczos(mut self, lanczos: LanczosConfig) -> Self {
        self.lanczos = lanczos;

        self
    }

    /// Solver for `request`, already clipped to the basis `size`.
    ///
    /// Lanczos only converges quickly at the ends of the spectrum, so targeted
    /// requests that would go to Lanczos use the banded bisection instead.
    pub fn select(&self, size: usize, band_width: usize, request: &SolveRequest) -> Solver {
        let count = request.count;
        let solver = if size <= self.dense_limit || count as f64 >= self.dense_fraction * size as f64 {
            Solver::Dense
        } else if band_width * self.band_ratio <= size || request.target.is_some() {
            Solver::Banded
        } else {
            Solver::Lanczos
        };
        tracing::debug!(size, band_width, count, target = ?request.target, ?solver, "selected solver");

        solver
    }

    pub fn resolve(&self, choice: SolverChoice, size: usize, band_width: usize, request: &SolveRequest) -> Solver {
        match choice {
            SolverChoice::Auto => self.select(size, band_width, request),
            SolverChoice::Forced(solver) => {
                tracing::debug!(?solver, "solver forced");
                solver
            }
        }
    }
}
