use quantum::{
    basis::RectangularBasis,
    spins::{DoubleSpin, SpinOperators},
    BasisError, BasisParams, QuantumBasis,
};
use serde::{Deserialize, Serialize};
use spectrum_solver::{DerivedObservables, EigenError, HamiltonianBuilder, Subsystems};

/// `(Δn, Δ2m)` of the coupling terms.
const COUPLINGS: [[i32; 2]; 4] = [[1, -2], [-1, 2], [1, 2], [-1, -2]];

/// Single mode field coupled to a collective spin `j`,
///
/// `H = ω a†a + ω₀ J_z + λ / √(2j) [(a† J₋ + a J₊) + δ (a† J₊ + a J₋)]`.
///
/// Basis parameters are `[max_n, 2j, parity = 0]` with states `(n, 2m)`.
/// A non-zero parity keeps the states with `(-1)^(n + m + j)` equal to it.
/// `δ = 1` is the Dicke model, `δ = 0` the Tavis-Cummings model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dicke {
    pub omega: f64,
    pub omega_0: f64,
    pub coupling: f64,
    pub counter_rotating: f64,
}

impl Dicke {
    pub fn new(omega: f64, omega_0: f64, coupling: f64) -> Self {
        Self {
            omega,
            omega_0,
            coupling,
            counter_rotating: 1.0,
        }
    }

    pub fn with_counter_rotating(mut self, counter_rotating: f64) -> Self {
        self.counter_rotating = counter_rotating;

        self
    }

    /// Coupling `√(ω ω₀) / 2` of the superradiant transition of the Dicke model.
    pub fn critical_coupling(&self) -> f64 {
        (self.omega * self.omega_0).sqrt() / 2.0
    }

    fn bare_energy(&self, n: i32, spin: DoubleSpin) -> f64 {
        self.omega * n as f64 + self.omega_0 * SpinOperators::proj_z(spin, spin)
    }
}

impl HamiltonianBuilder for Dicke {
    const NAME: &'static str = "dicke";

    type Basis = RectangularBasis;

    fn build_basis(&self, params: &BasisParams) -> Result<RectangularBasis, BasisError> {
        let max_n = params.required(0, "max_n")?;
        let double_j = params.required(1, "2j")?;
        let parity = params.get(2).unwrap_or(0.0);

        RectangularBasis::new(vec![max_n, double_j, 2.0, parity].into(), &COUPLINGS)
    }

    fn row(&self, basis: &RectangularBasis, index: usize, elements: &mut Vec<(usize, f64)>) {
        let Ok(&[n, double_m]) = basis.quantum_numbers(index) else {
            return;
        };
        let double_j = basis.max_m() as u32;
        let ket = DoubleSpin(double_j, double_m);

        elements.push((index, self.bare_energy(n, ket)));
        if double_j == 0 {
            return;
        }

        let prefactor = self.coupling / (double_j as f64).sqrt();
        for [dn, dm] in COUPLINGS {
            let Some(j) = basis.lookup(&[n + dn, double_m + dm]) else {
                continue;
            };
            let bra = DoubleSpin(double_j, double_m + dm);

            let boson = if dn > 0 { (n as f64 + 1.0).sqrt() } else { (n as f64).sqrt() };
            let spin = if dm > 0 {
                SpinOperators::ladder_plus(bra, ket)
            } else {
                SpinOperators::ladder_minus(bra, ket)
            };
            let weight = if dn * dm < 0 { 1.0 } else { self.counter_rotating };

            elements.push((j, prefactor * weight * boson * spin));
        }
    }
}

impl DerivedObservables for Dicke {
    fn basis_energy(&self, basis: &RectangularBasis, index: usize) -> Result<f64, EigenError> {
        let &[n, double_m] = basis.quantum_numbers(index)? else {
            return Err(EigenError::InvalidInput("dicke states have rank 2".to_string()));
        };

        Ok(self.bare_energy(n, DoubleSpin(basis.max_m() as u32, double_m)))
    }

    /// Field against spin.
    fn subsystems(&self) -> Result<Subsystems, EigenError> {
        Ok(Subsystems { kept: vec![0] })
    }
}
