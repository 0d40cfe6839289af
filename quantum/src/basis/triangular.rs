use serde::{Deserialize, Serialize};

use crate::error::BasisError;

use super::{band_width_for, BasisParams, QuantumBasis, StateTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngularRange {
    /// Both signs of `m`.
    Full,
    /// Only `m >= 0`, used for bases symmetrised under `m -> -m`.
    Half,
}

/// Energy cutoff `weight * n + |m| <= max_e` with `n >= 0` and signed `m`.
///
/// Parameters: `[max_e, weight = 1, half = 0, modulus = 0, residue = 0]`.
/// With a non-zero `modulus` only the sector `m ≡ residue (mod modulus)` is kept.
/// States are ordered by shell `weight * n + |m|`, then by ascending `m`.
#[derive(Clone, Debug)]
pub struct TriangularBasis {
    params: BasisParams,
    table: StateTable,
    max_e: usize,
    weight: usize,
    range: AngularRange,
    modulus: i32,
    residue: i32,
    band_width: usize,
}

impl TriangularBasis {
    pub fn new(params: BasisParams, offsets: &[[i32; 2]]) -> Result<Self, BasisError> {
        let max_e = params.bound(0, "max_e")?;
        let weight = params.bound_or(1, "weight", 1)?;
        let range = match params.count_or(2, "half", 0)? {
            0 => AngularRange::Full,
            1 => AngularRange::Half,
            other => {
                return Err(BasisError::InvalidParameters(format!("half flag has to be 0 or 1, got {other}")))
            }
        };
        let modulus = params.bound_or(3, "modulus", 0)?;
        let residue = params.bound_or(4, "residue", 0)?;

        if weight == 0 {
            return Err(BasisError::InvalidParameters("weight has to be positive".to_string()));
        }
        if (modulus == 0 && residue != 0) || (modulus > 0 && residue >= modulus) {
            return Err(BasisError::InvalidParameters(format!(
                "residue {residue} is not valid for modulus {modulus}"
            )));
        }

        let mut table = StateTable::new(2);
        for shell in 0..=max_e {
            let m_min = match range {
                AngularRange::Full => -shell,
                AngularRange::Half => 0,
            };

            for m in m_min..=shell {
                let radial = shell - m.abs();
                if radial % weight != 0 {
                    continue;
                }
                if modulus > 0 && m.rem_euclid(modulus) != residue {
                    continue;
                }

                table.push(&[radial / weight, m]);
            }
        }
        if table.is_empty() {
            return Err(BasisError::Empty);
        }

        let band_width = band_width_for(&table, offsets);

        Ok(Self {
            params,
            table,
            max_e: max_e as usize,
            weight: weight as usize,
            range,
            modulus,
            residue,
            band_width,
        })
    }

    pub fn max_e(&self) -> usize {
        self.max_e
    }

    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn range(&self) -> AngularRange {
        self.range
    }

    /// `(modulus, residue)` of the kept angular sector, `None` when all `m` are kept.
    pub fn sector(&self) -> Option<(i32, i32)> {
        (self.modulus > 0).then_some((self.modulus, self.residue))
    }

    /// Shell `weight * n + |m|` of a state.
    pub fn shell(&self, numbers: &[i32]) -> i32 {
        self.weight as i32 * numbers[0] + numbers[1].abs()
    }
}

impl QuantumBasis for TriangularBasis {
    fn table(&self) -> &StateTable {
        &self.table
    }

    fn params(&self) -> &BasisParams {
        &self.params
    }

    fn band_width(&self) -> usize {
        self.band_width
    }
}
