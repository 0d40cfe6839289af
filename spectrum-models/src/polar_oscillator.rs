use std::f64::consts::{FRAC_1_SQRT_2, PI};

use quantum::{
    basis::{AngularRange, TriangularBasis},
    special::{oscillator_radial, radial_moment},
    BasisError, BasisParams, QuantumBasis,
};
use serde::{Deserialize, Serialize};
use spectrum_solver::{Capability, DerivedObservables, EigenError, HamiltonianBuilder};

/// Anharmonic oscillator with a threefold symmetric cubic term,
///
/// `H = ½p² + A r² + B r³ cos 3φ + C r⁴`,
///
/// expanded in the 2D oscillator basis `|n, m⟩` of unit frequency with energies `2n + |m| + 1`.
///
/// Basis parameters are those of [`TriangularBasis`] with the weight fixed to 2,
/// `[max_e, half = 0, modulus = 0, residue = 0]`. The full angular range uses
/// `e^{imφ}` states, the half range the real `cos mφ` states symmetric under
/// `φ -> -φ`. The cubic term couples `m` to `m ± 3` in the full range and to `m + 3`, `|m - 3|`
/// in the half range, so half range sectors have to be closed under both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarOscillator {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl PolarOscillator {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    fn offsets(range: AngularRange) -> Vec<[i32; 2]> {
        let angular: &[i32] = match range {
            AngularRange::Full => &[3, -3],
            AngularRange::Half => &[3, -3, 1, -1],
        };

        let mut offsets: Vec<[i32; 2]> = (-2..=2).filter(|&dn| dn != 0).map(|dn| [dn, 0]).collect();
        for &dm in angular {
            offsets.extend((-3..=3).map(|dn| [dn, dm]));
        }

        offsets
    }

    /// `m'` reached from `m` by `cos 3φ`.
    fn angular_targets(range: AngularRange, m: i32) -> Vec<i32> {
        match range {
            AngularRange::Full => vec![m + 3, m - 3],
            AngularRange::Half if m == 0 => vec![3],
            AngularRange::Half => vec![m + 3, (m - 3).abs()],
        }
    }

    /// `⟨m'| cos 3φ |m⟩`
    fn angular_factor(range: AngularRange, bra: i32, ket: i32) -> f64 {
        match range {
            AngularRange::Full if (bra - ket).abs() == 3 => 0.5,
            AngularRange::Full => 0.0,
            AngularRange::Half if bra == 0 || ket == 0 => {
                if bra + ket == 3 {
                    FRAC_1_SQRT_2
                } else {
                    0.0
                }
            }
            AngularRange::Half if bra == ket + 3 || ket == bra + 3 || bra + ket == 3 => 0.5,
            AngularRange::Half => 0.0,
        }
    }

    /// `⟨n' m'| r^k |n m⟩` radial part, zero outside the shells `r^k` connects.
    fn moment(bra: (i32, i32), ket: (i32, i32), k: usize) -> f64 {
        let shell = |(n, m): (i32, i32)| 2 * n + m.abs();
        if (shell(bra) - shell(ket)).unsigned_abs() as usize > k {
            return 0.0;
        }

        radial_moment(
            (bra.0 as usize, bra.1.unsigned_abs() as usize),
            (ket.0 as usize, ket.1.unsigned_abs() as usize),
            k,
        )
    }
}

impl HamiltonianBuilder for PolarOscillator {
    const NAME: &'static str = "polar oscillator";

    type Basis = TriangularBasis;

    fn build_basis(&self, params: &BasisParams) -> Result<TriangularBasis, BasisError> {
        let max_e = params.required(0, "max_e")?;
        let half = params.get(1).unwrap_or(0.0);
        let modulus = params.get(2).unwrap_or(0.0);
        let residue = params.get(3).unwrap_or(0.0);

        let range = if half as i64 == 1 { AngularRange::Half } else { AngularRange::Full };
        TriangularBasis::new(
            vec![max_e, 2.0, half, modulus, residue].into(),
            &Self::offsets(range),
        )
    }

    fn row(&self, basis: &TriangularBasis, index: usize, elements: &mut Vec<(usize, f64)>) {
        let Ok(&[n, m]) = basis.quantum_numbers(index) else {
            return;
        };
        let ket = (n, m);

        for dn in -2..=2 {
            let bra = (n + dn, m);
            let Some(j) = basis.lookup(&[bra.0, bra.1]) else {
                continue;
            };

            let mut value = (self.a - 0.5) * Self::moment(bra, ket, 2) + self.c * Self::moment(bra, ket, 4);
            if dn == 0 {
                value += (2 * n + m.abs() + 1) as f64;
            }
            elements.push((j, value));
        }

        if self.b == 0.0 {
            return;
        }
        for m_bra in Self::angular_targets(basis.range(), m) {
            let angular = Self::angular_factor(basis.range(), m_bra, m);
            for dn in -3..=3 {
                let bra = (n + dn, m_bra);
                if let Some(j) = basis.lookup(&[bra.0, bra.1]) {
                    elements.push((j, self.b * angular * Self::moment(bra, ket, 3)));
                }
            }
        }
    }
}

impl DerivedObservables for PolarOscillator {
    fn basis_energy(&self, basis: &TriangularBasis, index: usize) -> Result<f64, EigenError> {
        let &[n, m] = basis.quantum_numbers(index)? else {
            return Err(EigenError::InvalidInput("polar states have rank 2".to_string()));
        };

        Ok((2 * n + m.abs() + 1) as f64)
    }

    /// Real basis functions at the Cartesian `point = [x, y]`, half angular range only.
    fn basis_functions(&self, basis: &TriangularBasis, point: &[f64], values: &mut [f64]) -> Result<(), EigenError> {
        if basis.range() == AngularRange::Full {
            return Err(EigenError::not_supported(Self::NAME, Capability::BasisFunctions));
        }
        let &[x, y] = point else {
            return Err(EigenError::InvalidInput(format!(
                "expected a point (x, y), got {} coordinates",
                point.len()
            )));
        };

        let (r, phi) = (x.hypot(y), y.atan2(x));
        for (value, state) in values.iter_mut().zip(basis.table().iter()) {
            let (n, m) = (state[0] as usize, state[1]);
            let angular = if m == 0 {
                (2.0 * PI).sqrt().recip()
            } else {
                (m as f64 * phi).cos() / PI.sqrt()
            };

            *value = oscillator_radial(n, m as usize, r) * angular;
        }

        Ok(())
    }
}
