use std::collections::HashMap;

use faer::{ColRef, Mat, Side};
use quantum::QuantumBasis;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EigenError, SolverError},
    model::Subsystems,
};

/// Per basis state weight `f(k)` of the expectation `Σ_k |c_k|² f(k)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Weight {
    QuantumNumber(usize),
    QuantumNumberSquared(usize),
    BasisEnergy,
}

/// `Σ_k |c_k|² f(k)` of one eigenvector.
pub fn weighted_expectation(vector: ColRef<f64>, weights: &[f64]) -> f64 {
    vector.iter().zip(weights).map(|(c, w)| c * c * w).sum()
}

/// Reduced density matrix over the kept axes of a basis.
#[derive(Clone, Debug)]
pub struct ReducedDensity {
    /// Quantum numbers of the kept axes labelling rows and columns.
    pub labels: Vec<Vec<i32>>,
    pub matrix: Mat<f64>,
}

impl ReducedDensity {
    pub fn trace(&self) -> f64 {
        (0..self.matrix.nrows()).map(|i| self.matrix[(i, i)]).sum()
    }

    /// `tr ρ²`
    pub fn purity(&self) -> f64 {
        let mut purity = 0.0;
        for j in 0..self.matrix.ncols() {
            for i in 0..self.matrix.nrows() {
                purity += self.matrix[(i, j)].powi(2);
            }
        }

        purity
    }

    /// Von Neumann entropy `-tr ρ ln ρ`.
    pub fn entropy(&self) -> Result<f64, EigenError> {
        let populations = self
            .matrix
            .self_adjoint_eigenvalues(Side::Lower)
            .map_err(|e| SolverError::Backend(format!("{e:?}")))?;

        Ok(populations
            .into_iter()
            .filter(|&p| p > 1e-14)
            .map(|p| -p * p.ln())
            .sum())
    }
}

/// `ρ_{a a'} = Σ_b c_{(a, b)} c_{(a', b)}` with `a` the quantum numbers on the kept axes.
pub fn partial_trace<B: QuantumBasis>(
    basis: &B,
    vector: ColRef<f64>,
    subsystems: &Subsystems,
) -> Result<ReducedDensity, EigenError> {
    let rank = basis.rank();
    for &axis in &subsystems.kept {
        quantum::BasisError::check_axis(axis, rank)?;
    }
    let traced: Vec<usize> = (0..rank).filter(|a| !subsystems.kept.contains(a)).collect();

    let mut labels: Vec<Vec<i32>> = basis
        .table()
        .iter()
        .map(|s| subsystems.kept.iter().map(|&a| s[a]).collect())
        .collect();
    labels.sort_unstable();
    labels.dedup();
    let label_index: HashMap<&[i32], usize> = labels.iter().enumerate().map(|(i, l)| (l.as_slice(), i)).collect();

    let mut groups: HashMap<Vec<i32>, Vec<(usize, f64)>> = HashMap::new();
    for (k, state) in basis.table().iter().enumerate() {
        let kept: Vec<i32> = subsystems.kept.iter().map(|&a| state[a]).collect();
        let rest: Vec<i32> = traced.iter().map(|&a| state[a]).collect();

        groups.entry(rest).or_default().push((label_index[kept.as_slice()], vector[k]));
    }

    let mut matrix = Mat::zeros(labels.len(), labels.len());
    for members in groups.values() {
        for &(a, c_a) in members {
            for &(b, c_b) in members {
                matrix[(a, b)] += c_a * c_b;
            }
        }
    }

    Ok(ReducedDensity { labels, matrix })
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use faer::Col;
    use quantum::basis::RectangularBasis;

    use super::*;

    #[test]
    fn expectation() {
        let vector = Col::from_fn(3, |i| [0.6, 0.0, 0.8][i]);
        assert_relative_eq!(weighted_expectation(vector.as_ref(), &[1.0, 5.0, 2.0]), 0.36 + 1.28);
    }

    #[test]
    fn product_state_is_pure() {
        // (n, m) with n in 0..=1 and m in -1..=1
        let basis = RectangularBasis::new(vec![1., 1.].into(), &[]).unwrap();
        let field = [0.6, 0.8];
        let spin = [0.0, 0.6, 0.8];
        let vector = Col::from_fn(6, |k| field[k / 3] * spin[k % 3]);

        let rho = partial_trace(&basis, vector.as_ref(), &Subsystems { kept: vec![0] }).unwrap();
        assert_eq!(rho.labels, vec![vec![0], vec![1]]);
        assert_relative_eq!(rho.trace(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(rho.purity(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(rho.entropy().unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn bell_state_is_mixed() {
        let basis = RectangularBasis::new(vec![1., 1., 2.].into(), &[]).unwrap();
        // |0, -1⟩ + |1, 1⟩
        let vector = Col::from_fn(4, |k| if k == 0 || k == 3 { 0.5f64.sqrt() } else { 0.0 });

        let rho = partial_trace(&basis, vector.as_ref(), &Subsystems { kept: vec![1] }).unwrap();
        assert_eq!(rho.labels, vec![vec![-1], vec![1]]);
        assert_relative_eq!(rho.purity(), 0.5, epsilon = 1e-14);
        assert_relative_eq!(rho.entropy().unwrap(), 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn invalid_axis() {
        let basis = RectangularBasis::new(vec![1., 1.].into(), &[]).unwrap();
        let vector = Col::<f64>::zeros(6);

        let err = partial_trace(&basis, vector.as_ref(), &Subsystems { kept: vec![2] }).unwrap_err();
        assert!(matches!(
            err,
            EigenError::Basis(quantum::BasisError::InvalidAxis { axis: 2, rank: 2 })
        ));
    }
}
