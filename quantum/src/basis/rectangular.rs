use num::Integer;

use crate::error::BasisError;

use super::{band_width_for, Axes, Axis, BasisParams, QuantumBasis, StateTable};

/// Rectangular cutoff `0 <= n <= max_n`, `|m| <= max_m` with `m` advancing by `step`.
///
/// Parameters: `[max_n, max_m, step = 1, parity = 0]`. A non-zero parity keeps
/// only states with `(-1)^(n + (m + max_m) / step) == parity`, the second term
/// being the position of `m` on its axis. States are ordered by `n`, then `m`.
#[derive(Clone, Debug)]
pub struct RectangularBasis {
    params: BasisParams,
    table: StateTable,
    max_n: usize,
    max_m: i32,
    step: i32,
    parity: i32,
    band_width: usize,
}

impl RectangularBasis {
    pub fn new(params: BasisParams, offsets: &[[i32; 2]]) -> Result<Self, BasisError> {
        let max_n = params.bound(0, "max_n")?;
        let max_m = params.bound(1, "max_m")?;
        let step = params.bound_or(2, "step", 1)?;
        let parity = params.integer_or(3, "parity", 0)?;

        if step == 0 || (2 * max_m) % step != 0 {
            return Err(BasisError::InvalidParameters(format!(
                "step {step} does not divide the range -{max_m}..={max_m}"
            )));
        }
        if !matches!(parity, -1..=1) {
            return Err(BasisError::InvalidParameters(format!("parity has to be -1, 0 or 1, got {parity}")));
        }

        let mut axes = Axes::default();
        axes.push_axis(Axis::new(0, max_n, 1))
            .push_axis(Axis::new(-max_m, max_m, step));

        let states = axes.iter_elements().filter(|s| {
            parity == 0 || state_parity(s[0] + (s[1] + max_m) / step) == parity
        });
        let table = StateTable::from_states(2, states);
        if table.is_empty() {
            return Err(BasisError::Empty);
        }

        let band_width = band_width_for(&table, offsets);

        Ok(Self {
            params,
            table,
            max_n: max_n as usize,
            max_m,
            step,
            parity,
            band_width,
        })
    }

    pub fn max_n(&self) -> usize {
        self.max_n
    }

    pub fn max_m(&self) -> i32 {
        self.max_m
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn parity(&self) -> i32 {
        self.parity
    }

    fn m_positions(&self) -> i32 {
        2 * self.max_m / self.step + 1
    }
}

fn state_parity(exponent: i32) -> i32 {
    if exponent.is_even() { 1 } else { -1 }
}

impl QuantumBasis for RectangularBasis {
    fn table(&self) -> &StateTable {
        &self.table
    }

    fn params(&self) -> &BasisParams {
        &self.params
    }

    fn band_width(&self) -> usize {
        self.band_width
    }

    fn lookup(&self, numbers: &[i32]) -> Option<usize> {
        if self.parity != 0 {
            return self.table.lookup(numbers);
        }

        let &[n, m] = numbers else {
            return None;
        };
        if n < 0 || n > self.max_n as i32 || m.abs() > self.max_m || (m + self.max_m) % self.step != 0 {
            return None;
        }

        Some((n * self.m_positions() + (m + self.max_m) / self.step) as usize)
    }
}
