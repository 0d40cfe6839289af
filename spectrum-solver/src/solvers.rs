pub mod banded;
pub mod dense;
pub mod lanczos;

use std::ops::Range;

use faer::Mat;
use quantum::{MatrixStorage, Storage};

use crate::{
    error::SolverError,
    selector::{Solver, SolveRequest, SolverPolicy},
};

/// Selected eigenpairs sorted by ascending eigenvalue.
///
/// Column `i` of `vectors` is the normalised eigenvector of `values[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    pub values: Vec<f64>,
    pub vectors: Option<Mat<f64>>,
}

impl Spectrum {
    pub fn empty(with_vectors: bool, size: usize) -> Self {
        Self {
            values: vec![],
            vectors: with_vectors.then(|| Mat::zeros(size, 0)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Contiguous window of `count` values of the ascending `sorted` nearest to `target`,
/// ties resolved towards lower values.
pub fn nearest_window(sorted: &[f64], count: usize, target: f64) -> Range<usize> {
    let start = sorted.partition_point(|&v| v < target);

    nearest_window_by(sorted.len(), count, target, start, |i| sorted[i])
}

/// Same selection as [`nearest_window`] over a spectrum of `len` values known only
/// through `value(i)`, `start` being the number of values below `target`.
pub(crate) fn nearest_window_by(
    len: usize,
    count: usize,
    target: f64,
    start: usize,
    mut value: impl FnMut(usize) -> f64,
) -> Range<usize> {
    let count = count.min(len);
    let (mut lower, mut upper) = (start, start);

    while upper - lower < count {
        if lower == 0 {
            upper += 1;
        } else if upper == len || target - value(lower - 1) <= value(upper) - target {
            lower -= 1;
        } else {
            upper += 1;
        }
    }

    lower..upper
}

/// Indices of the full ascending spectrum selected by `request`.
pub fn requested_window(sorted: &[f64], request: &SolveRequest) -> Range<usize> {
    match request.target {
        Some(target) => nearest_window(sorted, request.count, target),
        None => 0..request.count.min(sorted.len()),
    }
}

/// Runs `solver` on the filled `storage`.
pub fn solve(
    storage: &Storage,
    solver: Solver,
    request: &SolveRequest,
    policy: &SolverPolicy,
) -> Result<Spectrum, SolverError> {
    match (solver, storage) {
        (Solver::Dense, Storage::Dense(matrix)) => dense::solve(matrix.as_ref(), request),
        (Solver::Dense, storage) => dense::solve(storage.to_dense().as_ref(), request),
        (Solver::Banded, Storage::Banded(matrix)) => banded::solve(matrix, request),
        (Solver::Lanczos, Storage::Sparse(matrix)) => {
            lanczos::solve(&matrix.to_csr(), request, &policy.lanczos)
        }
        (solver, storage) => Err(SolverError::IllegalInput(format!(
            "{solver:?} solver cannot run on {:?} storage",
            storage.kind()
        ))),
    }
}
