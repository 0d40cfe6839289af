//! Lanczos iteration for a few eigenpairs of a large sparse symmetric matrix.
//!
//! Every new Krylov vector is orthogonalised twice against all previous ones,
//! so the tridiagonal projection stays faithful up to the full dimension.
//! An invariant subspace ends the recurrence; it is continued from a fresh
//! random vector orthogonal to everything built so far.

use faer::{Mat, Side};
use quantum::storage::CsrMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{error::SolverError, selector::SolveRequest};

use super::{requested_window, Spectrum};

const BREAKDOWN: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanczosConfig {
    /// Krylov dimension cap, the matrix size when `None`.
    pub max_iterations: Option<usize>,
    /// Relative Ritz residual accepted as converged.
    pub tolerance: f64,
    /// Krylov steps between convergence checks.
    pub check_every: usize,
    pub seed: u64,
}

impl Default for LanczosConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            tolerance: 1e-10,
            check_every: 5,
            seed: 42,
        }
    }
}

impl LanczosConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);

        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;

        self
    }

    pub fn with_check_every(mut self, check_every: usize) -> Self {
        self.check_every = check_every.max(1);

        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;

        self
    }
}

enum RitzCheck {
    Converged(Spectrum),
    Pending { converged: usize },
}

pub fn solve(matrix: &CsrMatrix, request: &SolveRequest, config: &LanczosConfig) -> Result<Spectrum, SolverError> {
    let size = matrix.n;
    let count = request.count.min(size);
    if size == 0 || count == 0 {
        return Ok(Spectrum::empty(request.vectors, size));
    }
    let request = request.clipped(size);

    let max_dim = config.max_iterations.unwrap_or(size).clamp(1, size);
    let first_check = size.min((2 * count).max(20));
    let check_every = config.check_every.max(1);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(max_dim);
    let mut alpha: Vec<f64> = Vec::with_capacity(max_dim);
    let mut beta: Vec<f64> = Vec::with_capacity(max_dim);
    let mut scale = f64::MIN_POSITIVE;

    let mut v = random_orthogonal(size, &basis, &mut rng);
    let mut w = vec![0.0; size];

    loop {
        matrix.spmv(&v, &mut w);
        if let (Some(previous), Some(&b)) = (basis.last(), beta.last()) {
            axpy(-b, previous, &mut w);
        }
        let a = dot(&w, &v);
        axpy(-a, &v, &mut w);
        basis.push(v);

        for _ in 0..2 {
            for q in &basis {
                let overlap = dot(&w, q);
                axpy(-overlap, q, &mut w);
            }
        }
        alpha.push(a);
        let b = dot(&w, &w).sqrt();
        scale = scale.max(a.abs() + b);

        let dim = basis.len();
        let breakdown = b <= BREAKDOWN * scale;
        let scheduled = dim >= first_check && (dim - first_check) % check_every == 0;

        if dim == size || dim == max_dim || (scheduled && !breakdown && dim >= count) {
            let exact = dim == size;
            match ritz_pairs(&basis, &alpha, &beta, b, &request, config.tolerance, exact)? {
                RitzCheck::Converged(spectrum) => {
                    tracing::debug!(dim, "lanczos converged");
                    return Ok(spectrum);
                }
                RitzCheck::Pending { converged } if dim == max_dim => {
                    return Err(SolverError::NoConvergence {
                        iterations: dim,
                        converged,
                        requested: count,
                    });
                }
                RitzCheck::Pending { converged } => {
                    tracing::trace!(dim, converged, "lanczos check");
                }
            }
        }

        if breakdown {
            tracing::debug!(dim, "lanczos breakdown, restarting");
            beta.push(0.0);
            v = random_orthogonal(size, &basis, &mut rng);
        } else {
            beta.push(b);
            v = w.iter().map(|x| x / b).collect();
        }
    }
}

fn ritz_pairs(
    basis: &[Vec<f64>],
    alpha: &[f64],
    beta: &[f64],
    residual_beta: f64,
    request: &SolveRequest,
    tolerance: f64,
    exact: bool,
) -> Result<RitzCheck, SolverError> {
    let dim = alpha.len();
    if dim < request.count {
        return Ok(RitzCheck::Pending { converged: 0 });
    }

    let tridiagonal = Mat::from_fn(dim, dim, |i, j| {
        if i == j {
            alpha[i]
        } else if i + 1 == j {
            beta[i]
        } else if j + 1 == i {
            beta[j]
        } else {
            0.0
        }
    });
    let eigen = tridiagonal
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| SolverError::Backend(format!("{e:?}")))?;
    let theta: Vec<f64> = eigen.S().column_vector().iter().copied().collect();
    let s = eigen.U();

    let window = requested_window(&theta, request);
    let converged = window
        .clone()
        .filter(|&i| exact || (residual_beta * s[(dim - 1, i)]).abs() <= tolerance * theta[i].abs().max(1.0))
        .count();
    if converged < window.len() {
        return Ok(RitzCheck::Pending { converged });
    }

    let size = basis[0].len();
    let vectors = request.vectors.then(|| {
        Mat::from_fn(size, window.len(), |row, col| {
            let i = window.start + col;
            (0..dim).map(|j| s[(j, i)] * basis[j][row]).sum::<f64>()
        })
    });

    Ok(RitzCheck::Converged(Spectrum {
        values: theta[window].to_vec(),
        vectors,
    }))
}

/// Random unit vector orthogonal to `basis`.
fn random_orthogonal(size: usize, basis: &[Vec<f64>], rng: &mut StdRng) -> Vec<f64> {
    loop {
        let mut v: Vec<f64> = (0..size).map(|_| rng.random::<f64>() - 0.5).collect();
        for _ in 0..2 {
            for q in basis {
                let overlap = dot(&v, q);
                axpy(-overlap, q, &mut v);
            }
        }

        let norm = dot(&v, &v).sqrt();
        if norm > BREAKDOWN {
            v.iter_mut().for_each(|x| *x /= norm);
            return v;
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn axpy(factor: f64, x: &[f64], y: &mut [f64]) {
    y.iter_mut().zip(x).for_each(|(y, x)| *y += factor * x);
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use quantum::{storage::SparseMatrix, MatrixStorage};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::solvers::dense;

    use super::*;

    fn random_sparse(size: usize, seed: u64) -> SparseMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut matrix = SparseMatrix::new(size);
        for i in 0..size {
            matrix.set(i, i, i as f64 * 0.1 + rng.random::<f64>()).unwrap();
            for _ in 0..3 {
                let j = rng.random_range(0..size);
                matrix.set(i, j, rng.random::<f64>() - 0.5).unwrap();
            }
        }

        matrix
    }

    #[test]
    fn matches_dense() {
        let matrix = random_sparse(300, 5);
        let request = SolveRequest::lowest(4);

        let lanczos = solve(&matrix.to_csr(), &request, &LanczosConfig::default()).unwrap();
        let dense = dense::solve(matrix.to_dense().as_ref(), &request).unwrap();

        let lanczos_vectors = lanczos.vectors.unwrap();
        let dense_vectors = dense.vectors.unwrap();
        for k in 0..4 {
            assert_relative_eq!(lanczos.values[k], dense.values[k], epsilon = 1e-8);

            let overlap: f64 = (0..300).map(|i| lanczos_vectors[(i, k)] * dense_vectors[(i, k)]).sum();
            assert_relative_eq!(overlap.abs(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn target_window() {
        let matrix = random_sparse(120, 9);
        let all = dense::solve(matrix.to_dense().as_ref(), &SolveRequest::lowest(120).with_vectors(false)).unwrap();

        let target = all.values[60] + 1e-9;
        let request = SolveRequest::lowest(2).with_target(target).with_vectors(false);
        let lanczos = solve(&matrix.to_csr(), &request, &LanczosConfig::default()).unwrap();
        let dense = dense::solve(matrix.to_dense().as_ref(), &request).unwrap();

        for (l, d) in lanczos.values.iter().zip(&dense.values) {
            assert_relative_eq!(l, d, epsilon = 1e-8);
        }
    }

    #[test]
    fn restart_on_invariant_subspace() {
        let mut matrix = SparseMatrix::new(6);
        for i in 0..6 {
            matrix.set(i, i, (i / 2) as f64 + 1.0).unwrap();
        }

        let spectrum = solve(&matrix.to_csr(), &SolveRequest::lowest(10), &LanczosConfig::default()).unwrap();

        let expected = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0];
        assert_eq!(spectrum.len(), 6);
        for (value, expected) in spectrum.values.iter().zip(expected) {
            assert_relative_eq!(*value, expected, epsilon = 1e-12);
        }

        let vectors = spectrum.vectors.unwrap();
        let gram = vectors.transpose() * vectors.as_ref();
        for i in 0..6 {
            assert_relative_eq!(gram[(i, i)], 1.0, epsilon = 1e-10);
            assert_relative_eq!(gram[(i, (i + 1) % 6)], 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn stops_without_convergence() {
        let matrix = random_sparse(50, 2);
        let config = LanczosConfig::default().with_max_iterations(2);

        let result = solve(&matrix.to_csr(), &SolveRequest::lowest(3), &config);
        assert!(matches!(
            result,
            Err(SolverError::NoConvergence {
                iterations: 2,
                converged: 0,
                requested: 3,
            })
        ));
    }
}
