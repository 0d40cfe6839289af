use std::fmt::Display;

use quantum::{BasisError, StorageError};
use thiserror::Error;

/// Optional model features evaluated on top of an eigen system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    BasisEnergy,
    BasisFunctions,
    PartialTrace,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::BasisEnergy => write!(f, "basis state energies"),
            Capability::BasisFunctions => write!(f, "basis function evaluation"),
            Capability::PartialTrace => write!(f, "partial trace"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("no convergence after {iterations} iterations, {converged} of {requested} eigenpairs converged")]
    NoConvergence {
        iterations: usize,
        converged: usize,
        requested: usize,
    },

    #[error("illegal solver input: {0}")]
    IllegalInput(String),

    #[error("eigen decomposition failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` is invalid: {message}")]
    InvalidField { field: String, message: String },

    #[error("record version {0} is not supported")]
    UnsupportedVersion(u64),

    #[error("record format `{found}` is not `{expected}`")]
    WrongFormat { found: String, expected: String },

    #[error("record was written for model `{found}`, loading it into `{expected}`")]
    ModelMismatch { found: String, expected: String },

    #[error("inconsistent record: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error)]
pub enum EigenError {
    #[error(transparent)]
    Basis(#[from] BasisError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The model does not provide an optional feature, distinct from a failure.
    #[error("model `{model}` does not support {capability}")]
    NotSupported {
        model: &'static str,
        capability: Capability,
    },

    #[error("eigen system is not attached to a live model")]
    Detached,

    #[error("eigen system is not diagonalized")]
    NotDiagonalized,

    #[error("eigenvectors were not requested in the last diagonalization")]
    MissingVectors,

    #[error("eigenstate {index} is out of range, {count} eigenpairs available")]
    StateOutOfRange { index: usize, count: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EigenError {
    pub fn not_supported(model: &'static str, capability: Capability) -> Self {
        Self::NotSupported { model, capability }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }
}
