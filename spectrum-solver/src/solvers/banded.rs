//! Eigenpairs of a symmetric band matrix without forming the dense matrix.
//!
//! Eigenvalues are isolated one index at a time by bisection on the inertia
//! of `A - σI` (signs of the `LDLᵀ` pivots). Eigenvectors follow from inverse
//! iteration with a partially pivoted band `LU`, vectors inside a cluster of
//! close eigenvalues being orthogonalised against each other.

use std::collections::HashMap;

use faer::Mat;
use quantum::{storage::BandedMatrix, MatrixStorage};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{error::SolverError, selector::SolveRequest};

use super::{nearest_window_by, Spectrum};

const MAX_BISECTIONS: usize = 200;
const MAX_INVERSE_STEPS: usize = 8;
const CLUSTER_TOLERANCE: f64 = 1e-3;

pub fn solve(matrix: &BandedMatrix, request: &SolveRequest) -> Result<Spectrum, SolverError> {
    let size = matrix.size();
    if size == 0 || request.count == 0 {
        return Ok(Spectrum::empty(request.vectors, size));
    }

    let sturm = SturmSequence::new(matrix);
    let mut values = HashMap::new();
    let mut value = |index: usize| *values.entry(index).or_insert_with(|| sturm.eigenvalue(index));

    let window = match request.target {
        Some(target) => {
            let start = sturm.count_below(target);
            nearest_window_by(size, request.count, target, start, &mut value)
        }
        None => 0..request.count.min(size),
    };
    let eigenvalues: Vec<f64> = window.map(&mut value).collect();

    let vectors = if request.vectors {
        Some(inverse_iteration(matrix, &eigenvalues, sturm.norm)?)
    } else {
        None
    };

    Ok(Spectrum {
        values: eigenvalues,
        vectors,
    })
}

/// Inertia counts of shifted band matrices.
struct SturmSequence<'a> {
    matrix: &'a BandedMatrix,
    lower: f64,
    upper: f64,
    norm: f64,
    pivot_min: f64,
}

impl<'a> SturmSequence<'a> {
    fn new(matrix: &'a BandedMatrix) -> Self {
        let size = matrix.size();
        let band_width = matrix.band_width();

        // Gershgorin discs
        let mut lower = f64::INFINITY;
        let mut upper = f64::NEG_INFINITY;
        let mut norm: f64 = 0.0;
        for i in 0..size {
            let center = matrix.get(i, i);
            let radius: f64 = (i.saturating_sub(band_width)..(i + band_width + 1).min(size))
                .filter(|&j| j != i)
                .map(|j| matrix.get(i, j).abs())
                .sum();

            lower = lower.min(center - radius);
            upper = upper.max(center + radius);
            norm = norm.max(center.abs() + radius);
        }
        let margin = 2.0 * f64::EPSILON * norm.max(1.0) * size as f64;

        Self {
            matrix,
            lower: lower - margin,
            upper: upper + margin,
            norm,
            pivot_min: f64::MIN_POSITIVE * norm.max(1.0).powi(2),
        }
    }

    /// Number of eigenvalues strictly below `shift`.
    fn count_below(&self, shift: f64) -> usize {
        let size = self.matrix.size();
        let width = self.matrix.band_width() + 1;
        // column k holds d_k followed by L_{k+1, k}, ..., L_{k+b, k}
        let mut factor = vec![0.0; size * width];
        let mut negatives = 0;

        for k in 0..size {
            let column = self.matrix.lower_column(k);
            let first = k.saturating_sub(width - 1);

            let mut pivot = column[0] - shift;
            for j in first..k {
                let l_kj = factor[j * width + k - j];
                pivot -= l_kj * l_kj * factor[j * width];
            }
            if pivot.abs() < self.pivot_min {
                pivot = -self.pivot_min;
            }
            if pivot < 0.0 {
                negatives += 1;
            }
            factor[k * width] = pivot;

            for (offset, &a_ik) in column.iter().enumerate().skip(1) {
                let i = k + offset;
                let mut sum = a_ik;
                for j in i.saturating_sub(width - 1)..k {
                    sum -= factor[j * width + i - j] * factor[j * width + k - j] * factor[j * width];
                }
                factor[k * width + offset] = sum / pivot;
            }
        }

        negatives
    }

    /// Eigenvalue of ascending `index` by bisection.
    fn eigenvalue(&self, index: usize) -> f64 {
        let (mut lower, mut upper) = (self.lower, self.upper);

        for _ in 0..MAX_BISECTIONS {
            let tolerance = 2.0 * f64::EPSILON * lower.abs().max(upper.abs())
                + f64::EPSILON * self.norm
                + self.pivot_min;
            if upper - lower <= tolerance {
                break;
            }

            let middle = 0.5 * (lower + upper);
            if self.count_below(middle) > index {
                upper = middle
            } else {
                lower = middle
            }
        }

        0.5 * (lower + upper)
    }
}

/// `A - σI` factorised as `P A = L U` in the band layout of LAPACK `gbtrf`.
///
/// With `kl = ku = b` the factor keeps `3b + 1` rows per column; element `(i, j)`
/// lives at row `kv + i - j` with `kv = 2b` to leave room for the fill of `U`.
struct BandLu {
    size: usize,
    band_width: usize,
    rows: usize,
    data: Vec<f64>,
    pivots: Vec<usize>,
}

impl BandLu {
    fn factor(matrix: &BandedMatrix, shift: f64, tiny: f64) -> Self {
        let size = matrix.size();
        let band_width = matrix.band_width();
        let kv = 2 * band_width;
        let rows = 3 * band_width + 1;

        let mut lu = Self {
            size,
            band_width,
            rows,
            data: vec![0.0; size * rows],
            pivots: vec![0; size],
        };
        for j in 0..size {
            for i in j.saturating_sub(band_width)..(j + band_width + 1).min(size) {
                let diagonal = if i == j { shift } else { 0.0 };
                *lu.at(i, j) = matrix.get(i, j) - diagonal;
            }
        }

        let mut last_column = 0;
        for j in 0..size {
            let below = band_width.min(size - 1 - j);

            let mut pivot_row = 0;
            for r in 1..=below {
                if lu.data[j * rows + kv + r].abs() > lu.data[j * rows + kv + pivot_row].abs() {
                    pivot_row = r;
                }
            }
            lu.pivots[j] = j + pivot_row;
            last_column = last_column.max((j + band_width + pivot_row).min(size - 1));

            if pivot_row != 0 {
                for c in j..=last_column {
                    let upper = (kv + j) - c + c * rows;
                    let lower = (kv + j + pivot_row) - c + c * rows;
                    lu.data.swap(upper, lower);
                }
            }

            // the shift is an eigenvalue, so near-singular pivots are clamped to `tiny`
            let pivot = &mut lu.data[j * rows + kv];
            if pivot.abs() < tiny {
                *pivot = if pivot.is_sign_negative() { -tiny } else { tiny };
            }
            let pivot = *pivot;

            for r in 1..=below {
                lu.data[j * rows + kv + r] /= pivot;
            }
            for c in j + 1..=last_column {
                let u_jc = lu.data[c * rows + (kv + j) - c];
                if u_jc == 0.0 {
                    continue;
                }
                for r in 1..=below {
                    let l_rj = lu.data[j * rows + kv + r];
                    lu.data[c * rows + (kv + j + r) - c] -= l_rj * u_jc;
                }
            }
        }

        lu
    }

    fn at(&mut self, row: usize, col: usize) -> &mut f64 {
        &mut self.data[col * self.rows + (2 * self.band_width + row) - col]
    }

    fn solve_in_place(&self, x: &mut [f64]) {
        let kv = 2 * self.band_width;
        let rows = self.rows;

        for j in 0..self.size {
            let p = self.pivots[j];
            if p != j {
                x.swap(p, j);
            }
            let below = self.band_width.min(self.size - 1 - j);
            for r in 1..=below {
                x[j + r] -= self.data[j * rows + kv + r] * x[j];
            }
        }

        for j in (0..self.size).rev() {
            x[j] /= self.data[j * rows + kv];
            for i in j.saturating_sub(kv)..j {
                x[i] -= self.data[j * rows + (kv + i) - j] * x[j];
            }
        }
    }
}

fn inverse_iteration(matrix: &BandedMatrix, values: &[f64], norm: f64) -> Result<Mat<f64>, SolverError> {
    let size = matrix.size();
    let scale = norm.max(f64::MIN_POSITIVE);
    let tiny = f64::EPSILON * scale;
    let residual_tolerance = 1e3 * f64::EPSILON * scale * (size as f64).sqrt();

    let mut rng = StdRng::seed_from_u64(size as u64);
    let mut vectors: Vec<Vec<f64>> = Vec::with_capacity(values.len());

    for (k, &value) in values.iter().enumerate() {
        let lu = BandLu::factor(matrix, value, tiny);
        let cluster: Vec<usize> = (0..k)
            .filter(|&i| (values[i] - value).abs() <= CLUSTER_TOLERANCE * scale)
            .collect();

        let mut x: Vec<f64> = (0..size).map(|_| rng.random::<f64>() - 0.5).collect();
        let mut converged = false;
        for _ in 0..MAX_INVERSE_STEPS {
            orthogonalize(&mut x, cluster.iter().map(|&i| vectors[i].as_slice()));
            normalize(&mut x);

            lu.solve_in_place(&mut x);
            orthogonalize(&mut x, cluster.iter().map(|&i| vectors[i].as_slice()));
            normalize(&mut x);

            if residual(matrix, value, &x) <= residual_tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(SolverError::NoConvergence {
                iterations: MAX_INVERSE_STEPS,
                converged: k,
                requested: values.len(),
            });
        }
        vectors.push(x);
    }

    Ok(Mat::from_fn(size, vectors.len(), |i, j| vectors[j][i]))
}

fn orthogonalize<'a>(x: &mut [f64], basis: impl Iterator<Item = &'a [f64]>) {
    for v in basis {
        let overlap: f64 = x.iter().zip(v).map(|(a, b)| a * b).sum();
        x.iter_mut().zip(v).for_each(|(a, b)| *a -= overlap * b);
    }
}

fn normalize(x: &mut [f64]) {
    let norm = x.iter().map(|a| a * a).sum::<f64>().sqrt();
    if norm > 0.0 {
        x.iter_mut().for_each(|a| *a /= norm);
    }
}

fn residual(matrix: &BandedMatrix, value: f64, x: &[f64]) -> f64 {
    let size = matrix.size();
    let band_width = matrix.band_width();

    (0..size)
        .map(|i| {
            let ax: f64 = (i.saturating_sub(band_width)..(i + band_width + 1).min(size))
                .map(|j| matrix.get(i, j) * x[j])
                .sum();
            (ax - value * x[i]).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use quantum::storage::BandedMatrix;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::solvers::dense;

    use super::*;

    fn random_banded(size: usize, band_width: usize, seed: u64) -> BandedMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut matrix = BandedMatrix::zeros(size, band_width);
        for j in 0..size {
            for i in j..(j + band_width + 1).min(size) {
                matrix.set(i, j, rng.random::<f64>() - 0.5).unwrap();
            }
        }

        matrix
    }

    #[test]
    fn inertia_count() {
        let matrix = random_banded(30, 3, 1);
        let sturm = SturmSequence::new(&matrix);
        let dense = dense::solve(matrix.to_dense().as_ref(), &SolveRequest::lowest(30).with_vectors(false)).unwrap();

        for k in 1..30 {
            let shift = 0.5 * (dense.values[k - 1] + dense.values[k]);
            assert_eq!(sturm.count_below(shift), k);
        }
        assert_eq!(sturm.count_below(sturm.lower), 0);
        assert_eq!(sturm.count_below(sturm.upper), 30);
    }

    #[test]
    fn matches_dense() {
        let matrix = random_banded(40, 4, 7);
        let request = SolveRequest::lowest(6);

        let banded = solve(&matrix, &request).unwrap();
        let dense = dense::solve(matrix.to_dense().as_ref(), &request).unwrap();

        let banded_vectors = banded.vectors.unwrap();
        let dense_vectors = dense.vectors.unwrap();
        for k in 0..6 {
            assert_relative_eq!(banded.values[k], dense.values[k], epsilon = 1e-10);

            let overlap: f64 = (0..40).map(|i| banded_vectors[(i, k)] * dense_vectors[(i, k)]).sum();
            assert_relative_eq!(overlap.abs(), 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn target_window() {
        let matrix = random_banded(25, 2, 3);
        let all = dense::solve(matrix.to_dense().as_ref(), &SolveRequest::lowest(25).with_vectors(false)).unwrap();

        let target = 0.5 * (all.values[10] + all.values[11]) + 1e-6;
        let request = SolveRequest::lowest(3).with_target(target).with_vectors(false);
        let banded = solve(&matrix, &request).unwrap();
        let dense = dense::solve(matrix.to_dense().as_ref(), &request).unwrap();

        assert_eq!(banded.len(), 3);
        for (b, d) in banded.values.iter().zip(&dense.values) {
            assert_relative_eq!(b, d, epsilon = 1e-10);
        }
    }

    #[test]
    fn degenerate_cluster() {
        let mut matrix = BandedMatrix::zeros(6, 1);
        for i in 0..6 {
            matrix.set(i, i, if i < 3 { 1.0 } else { 2.0 }).unwrap();
        }

        let spectrum = solve(&matrix, &SolveRequest::lowest(4)).unwrap();
        assert_eq!(spectrum.values.len(), 4);
        for value in &spectrum.values[..3] {
            assert_relative_eq!(*value, 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(spectrum.values[3], 2.0, epsilon = 1e-12);

        let vectors = spectrum.vectors.unwrap();
        let gram = vectors.transpose() * vectors.as_ref();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(gram[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn single_state_and_clipping() {
        let mut matrix = BandedMatrix::zeros(1, 0);
        matrix.set(0, 0, -2.5).unwrap();

        let spectrum = solve(&matrix, &SolveRequest::lowest(3)).unwrap();
        assert_eq!(spectrum.values.len(), 1);
        assert_relative_eq!(spectrum.values[0], -2.5, epsilon = 1e-12);
        assert_relative_eq!(spectrum.vectors.unwrap()[(0, 0)].abs(), 1.0);
    }
}
