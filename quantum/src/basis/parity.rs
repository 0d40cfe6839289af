use num::Integer;

use crate::error::BasisError;

use super::{band_width_for, BasisParams, QuantumBasis, StateTable};

/// Cartesian product basis `(n1, n2)` truncated at `n1 + n2 <= max_e`.
///
/// Parameters: `[max_e, parity1 = 0, parity2 = 0]`, where a parity of 1 keeps
/// even and -1 keeps odd values on that axis. States are ordered by shell
/// `n1 + n2`, then by ascending `n1`.
#[derive(Clone, Debug)]
pub struct ParityBasis {
    params: BasisParams,
    table: StateTable,
    max_e: usize,
    parities: [i32; 2],
    band_width: usize,
}

impl ParityBasis {
    pub fn new(params: BasisParams, offsets: &[[i32; 2]]) -> Result<Self, BasisError> {
        let max_e = params.bound(0, "max_e")?;
        let parities = [
            params.integer_or(1, "parity1", 0)?,
            params.integer_or(2, "parity2", 0)?,
        ];

        if let Some(p) = parities.iter().find(|p| !matches!(p, -1..=1)) {
            return Err(BasisError::InvalidParameters(format!("parity has to be -1, 0 or 1, got {p}")));
        }

        let allowed = |n: i32, parity: i32| match parity {
            1 => n.is_even(),
            -1 => n.is_odd(),
            _ => true,
        };

        let mut table = StateTable::new(2);
        for shell in 0..=max_e {
            for n1 in 0..=shell {
                let n2 = shell - n1;
                if allowed(n1, parities[0]) && allowed(n2, parities[1]) {
                    table.push(&[n1, n2]);
                }
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
            parities,
            band_width,
        })
    }

    pub fn max_e(&self) -> usize {
        self.max_e
    }

    pub fn parities(&self) -> [i32; 2] {
        self.parities
    }
}

impl QuantumBasis for ParityBasis {
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
