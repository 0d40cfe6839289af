/// Spin state `|j, m⟩` stored in doubled units `(2j, 2m)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DoubleSpin(pub u32, pub i32);

impl DoubleSpin {
    pub fn is_valid(&self) -> bool {
        self.1.unsigned_abs() <= self.0 && (self.0 as i32 - self.1) % 2 == 0
    }

    /// All projections `2m = -2j, -2j + 2, ..., 2j`.
    pub fn projections(double_j: u32) -> impl Iterator<Item = DoubleSpin> {
        (0..=double_j).map(move |k| DoubleSpin(double_j, 2 * k as i32 - double_j as i32))
    }
}

/// Matrix elements `⟨bra| O |ket⟩` of single spin operators.
pub struct SpinOperators;

impl SpinOperators {
    pub fn proj_z(dspin_bra: DoubleSpin, dspin_ket: DoubleSpin) -> f64 {
        if dspin_bra == dspin_ket {
            dspin_bra.1 as f64 / 2.0
        } else {
            0.0
        }
    }

    pub fn ladder_plus(dspin_bra: DoubleSpin, dspin_ket: DoubleSpin) -> f64 {
        if dspin_bra.0 == dspin_ket.0 && dspin_bra.1 == dspin_ket.1 + 2 && dspin_bra.is_valid() {
            Self::ladder_factor(dspin_bra, dspin_ket)
        } else {
            0.0
        }
    }

    pub fn ladder_minus(dspin_bra: DoubleSpin, dspin_ket: DoubleSpin) -> f64 {
        if dspin_bra.0 == dspin_ket.0 && dspin_bra.1 + 2 == dspin_ket.1 && dspin_bra.is_valid() {
            Self::ladder_factor(dspin_bra, dspin_ket)
        } else {
            0.0
        }
    }

    /// `√(j(j + 1) - m m')` written in doubled units.
    fn ladder_factor(dspin_bra: DoubleSpin, dspin_ket: DoubleSpin) -> f64 {
        let double_j = dspin_ket.0 as i32;

        ((double_j * (double_j + 2) - dspin_bra.1 * dspin_ket.1) as f64).sqrt() / 2.0
    }
}
