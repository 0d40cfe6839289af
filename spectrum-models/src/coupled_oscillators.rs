use quantum::{basis::ParityBasis, special::hermite_functions, BasisError, BasisParams, QuantumBasis};
use serde::{Deserialize, Serialize};
use spectrum_solver::{DerivedObservables, EigenError, HamiltonianBuilder, Subsystems};

const COUPLINGS: [[i32; 2]; 8] = [
    [2, 0],
    [-2, 0],
    [0, 2],
    [0, -2],
    [2, 2],
    [2, -2],
    [-2, 2],
    [-2, -2],
];

/// Two oscillators coupled by a quartic term,
///
/// `H = ½(p₁² + p₂²) + ½ω²(x₁² + x₂²) + λ x₁² x₂²`,
///
/// in the Cartesian oscillator basis of frequency `ω`.
/// Basis parameters are those of [`ParityBasis`], `[max_e, parity1 = 0, parity2 = 0]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoupledOscillators {
    pub omega: f64,
    pub coupling: f64,
}

impl CoupledOscillators {
    pub fn new(omega: f64, coupling: f64) -> Self {
        Self { omega, coupling }
    }

    /// `⟨n'| x² |n⟩` of a single oscillator.
    fn x_squared(&self, bra: i32, ket: i32) -> f64 {
        let low = bra.min(ket) as f64;
        let value = match bra - ket {
            0 => 2.0 * low + 1.0,
            2 | -2 => ((low + 1.0) * (low + 2.0)).sqrt(),
            _ => 0.0,
        };

        value / (2.0 * self.omega)
    }

    fn energy(&self, n1: i32, n2: i32) -> f64 {
        self.omega * (n1 + n2 + 1) as f64
    }
}

impl HamiltonianBuilder for CoupledOscillators {
    const NAME: &'static str = "coupled oscillators";

    type Basis = ParityBasis;

    fn build_basis(&self, params: &BasisParams) -> Result<ParityBasis, BasisError> {
        ParityBasis::new(params.clone(), &COUPLINGS)
    }

    fn row(&self, basis: &ParityBasis, index: usize, elements: &mut Vec<(usize, f64)>) {
        let Ok(&[n1, n2]) = basis.quantum_numbers(index) else {
            return;
        };

        let diagonal = self.energy(n1, n2) + self.coupling * self.x_squared(n1, n1) * self.x_squared(n2, n2);
        elements.push((index, diagonal));

        for [d1, d2] in COUPLINGS {
            let (m1, m2) = (n1 + d1, n2 + d2);
            if let Some(j) = basis.lookup(&[m1, m2]) {
                elements.push((j, self.coupling * self.x_squared(m1, n1) * self.x_squared(m2, n2)));
            }
        }
    }
}

impl DerivedObservables for CoupledOscillators {
    fn basis_energy(&self, basis: &ParityBasis, index: usize) -> Result<f64, EigenError> {
        let &[n1, n2] = basis.quantum_numbers(index)? else {
            return Err(EigenError::InvalidInput("oscillator states have rank 2".to_string()));
        };

        Ok(self.energy(n1, n2))
    }

    /// `ψ_{n1}(x₁) ψ_{n2}(x₂)` at `point = [x₁, x₂]`.
    fn basis_functions(&self, basis: &ParityBasis, point: &[f64], values: &mut [f64]) -> Result<(), EigenError> {
        let &[x1, x2] = point else {
            return Err(EigenError::InvalidInput(format!(
                "expected a point (x1, x2), got {} coordinates",
                point.len()
            )));
        };

        let scale = self.omega.sqrt();
        let psi1 = hermite_functions(basis.max_e(), scale * x1);
        let psi2 = hermite_functions(basis.max_e(), scale * x2);

        for (value, state) in values.iter_mut().zip(basis.table().iter()) {
            *value = scale * psi1[state[0] as usize] * psi2[state[1] as usize];
        }

        Ok(())
    }

    /// First oscillator against the second.
    fn subsystems(&self) -> Result<Subsystems, EigenError> {
        Ok(Subsystems { kept: vec![0] })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use quantum::utility::{grid, linspace};
    use spectrum_solver::{model::merged_row, EigenSystem, SolveRequest, Weight};

    use super::*;

    fn diagonalized(model: &Arc<CoupledOscillators>, params: Vec<f64>, count: usize) -> EigenSystem<CoupledOscillators> {
        let mut system = EigenSystem::new(params);
        system.attach(Arc::downgrade(model));
        system.diagonalize(&SolveRequest::lowest(count), None).unwrap();

        system
    }

    #[test]
    fn symmetric_rows() {
        let model = CoupledOscillators::new(1.3, 0.4);
        let basis = model.build_basis(&vec![9.].into()).unwrap();

        for i in 0..basis.len() {
            for (j, value) in merged_row(&model, &basis, i) {
                let back = merged_row(&model, &basis, j).into_iter().find(|e| e.0 == i);
                assert_relative_eq!(back.unwrap().1, value, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn uncoupled_shells() {
        let model = Arc::new(CoupledOscillators::new(2.0, 0.0));
        let system = diagonalized(&model, vec![4.], 6);

        let expected = [2.0, 4.0, 4.0, 6.0, 6.0, 6.0];
        for (value, expected) in system.eigenvalues().unwrap().iter().zip(expected) {
            assert_relative_eq!(*value, expected, epsilon = 1e-12);
        }
        assert_relative_eq!(system.weighted_expectation(0, Weight::BasisEnergy).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn quartic_coupling_is_variational() {
        let model = Arc::new(CoupledOscillators::new(1.0, 0.5));

        let small = diagonalized(&model, vec![8., 1., 1.], 1);
        let large = diagonalized(&model, vec![20., 1., 1.], 1);
        let (small, large) = (small.eigenvalues().unwrap()[0], large.eigenvalues().unwrap()[0]);

        assert!(large <= small + 1e-12);
        assert!(large > 1.0);
        // first order perturbation λ ⟨x²⟩² = λ / 4
        assert!(large < 1.0 + 0.5 / 4.0);
    }

    #[test]
    fn normalised_density() {
        let model = Arc::new(CoupledOscillators::new(1.0, 0.3));
        let system = diagonalized(&model, vec![12., 1., 1.], 2);

        let axis = linspace(-8.0, 8.0, 161);
        let points = grid(&[axis.clone(), axis]);
        let densities = system.densities(&[0, 1], &points).unwrap();

        for density in densities {
            let norm: f64 = density.iter().sum::<f64>() * 0.1 * 0.1;
            assert_relative_eq!(norm, 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn entanglement_grows_with_coupling() {
        let free = Arc::new(CoupledOscillators::new(1.0, 0.0));
        let coupled = Arc::new(CoupledOscillators::new(1.0, 2.0));

        let free = diagonalized(&free, vec![14., 1., 1.], 1).partial_trace(0).unwrap();
        let coupled = diagonalized(&coupled, vec![14., 1., 1.], 1).partial_trace(0).unwrap();

        assert_relative_eq!(free.purity(), 1.0, epsilon = 1e-12);
        assert!(coupled.purity() < 1.0 - 1e-3);
        assert!(coupled.entropy().unwrap() > free.entropy().unwrap());
    }

    #[test]
    fn point_arity_is_checked() {
        let model = CoupledOscillators::new(1.0, 0.0);
        let basis = model.build_basis(&vec![2.].into()).unwrap();
        let mut values = vec![0.0; basis.len()];

        let err = model.basis_functions(&basis, &[0.0], &mut values).unwrap_err();
        assert!(matches!(err, EigenError::InvalidInput(_)));
    }
}
