//! Special functions for oscillator matrix elements and wavefunctions.
//!
//! Factorials, binomials and gamma functions are kept in the log domain,
//! alternating sums carry their signs separately from the magnitudes.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// `ln Γ(x)` for `x > 0` (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    assert!(x > 0.0, "ln_gamma is defined here only for positive arguments, got {x}");

    if x < 0.5 {
        // reflection Γ(x) Γ(1 - x) = π / sin(πx)
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut series = LANCZOS_COEFFICIENTS[0];
    for (k, &c) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
        series += c / (x + k as f64);
    }
    let t = x + LANCZOS_G + 0.5;

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `ln n!`, summed exactly for small `n`.
pub fn ln_factorial(n: usize) -> f64 {
    if n < 32 {
        (2..=n).map(|k| (k as f64).ln()).sum()
    } else {
        ln_gamma(n as f64 + 1.0)
    }
}

/// Sum of terms `±exp(ln_magnitude)` with positive and negative parts kept apart
/// and rescaled by the largest magnitude before exponentiation.
#[derive(Clone, Debug, Default)]
pub struct SignedLogSum {
    terms: Vec<(bool, f64)>,
}

impl SignedLogSum {
    pub fn push(&mut self, negative: bool, ln_magnitude: f64) {
        if ln_magnitude > f64::NEG_INFINITY {
            self.terms.push((negative, ln_magnitude));
        }
    }

    pub fn value(&self) -> f64 {
        let Some(max) = self.terms.iter().map(|t| t.1).reduce(f64::max) else {
            return 0.0;
        };

        let (mut positive, mut negative) = (0.0, 0.0);
        for &(is_negative, ln_magnitude) in &self.terms {
            let scaled = (ln_magnitude - max).exp();
            if is_negative {
                negative += scaled
            } else {
                positive += scaled
            }
        }

        let difference = positive - negative;
        if difference == 0.0 {
            return 0.0;
        }

        difference.signum() * (max + difference.abs().ln()).exp()
    }
}

/// Normalised Hermite functions `ψ_0(x)..=ψ_n(x)` of the unit frequency oscillator.
pub fn hermite_functions(n: usize, x: f64) -> Vec<f64> {
    let mut psi = Vec::with_capacity(n + 1);
    psi.push(PI.powf(-0.25) * (-0.5 * x * x).exp());
    if n >= 1 {
        psi.push(2f64.sqrt() * x * psi[0]);
    }

    for k in 1..n {
        let k_f = k as f64;
        let next = (2.0 / (k_f + 1.0)).sqrt() * x * psi[k] - (k_f / (k_f + 1.0)).sqrt() * psi[k - 1];
        psi.push(next);
    }

    psi
}

/// Generalised Laguerre polynomial `L_n^α(x)` by upward recurrence.
pub fn laguerre(n: usize, alpha: f64, x: f64) -> f64 {
    let mut previous = 1.0;
    if n == 0 {
        return previous;
    }
    let mut current = 1.0 + alpha - x;

    for k in 1..n {
        let k_f = k as f64;
        let next = ((2.0 * k_f + 1.0 + alpha - x) * current - (k_f + alpha) * previous) / (k_f + 1.0);
        previous = current;
        current = next;
    }

    current
}

/// Radial part of the 2D unit frequency oscillator state `|n, m⟩`
/// normalised as `∫ R² r dr = 1`.
pub fn oscillator_radial(n: usize, m_abs: usize, r: f64) -> f64 {
    let ln_norm = 0.5 * (2f64.ln() + ln_factorial(n) - ln_factorial(n + m_abs));
    let r2 = r * r;

    ln_norm.exp() * r.powi(m_abs as i32) * (-0.5 * r2).exp() * laguerre(n, m_abs as f64, r2)
}

/// Generalised binomial `C(x, k)` for real `x` as `(negative, ln|C|)`, `None` when it vanishes.
pub fn ln_binomial_real(x: f64, k: usize) -> Option<(bool, f64)> {
    let mut negative = false;
    let mut ln_magnitude = -ln_factorial(k);
    for i in 0..k {
        let factor = x - i as f64;
        if factor == 0.0 {
            return None;
        }
        negative ^= factor < 0.0;
        ln_magnitude += factor.abs().ln();
    }

    Some((negative, ln_magnitude))
}

/// `⟨n', m'| r^k |n, m⟩` between radial oscillator states, `bra = (n', |m'|)` and `ket = (n, |m|)`.
///
/// Single sum
/// `(-1)^{n+n'} √(n'! n! / ((n'+a')! (n+a)!)) Σ_j C(s-a', n'-j) C(s-a, n-j) Γ(s+j+1) / j!`
/// with `s = (a + a' + k) / 2`. When `s - a` and `s - a'` are non-negative integers
/// every term has the same sign.
pub fn radial_moment(bra: (usize, usize), ket: (usize, usize), k: usize) -> f64 {
    let (n_bra, a_bra) = bra;
    let (n_ket, a_ket) = ket;
    let s = (a_bra + a_ket + k) as f64 / 2.0;

    let ln_norm = 0.5
        * (ln_factorial(n_bra) + ln_factorial(n_ket)
            - ln_factorial(n_bra + a_bra)
            - ln_factorial(n_ket + a_ket));
    let negative = (n_bra + n_ket) % 2 == 1;

    let mut sum = SignedLogSum::default();
    for j in 0..=n_bra.min(n_ket) {
        let (Some((negative_bra, ln_bra)), Some((negative_ket, ln_ket))) = (
            ln_binomial_real(s - a_bra as f64, n_bra - j),
            ln_binomial_real(s - a_ket as f64, n_ket - j),
        ) else {
            continue;
        };
        let ln_term = ln_bra + ln_ket + ln_gamma(s + j as f64 + 1.0) - ln_factorial(j);

        sum.push(negative ^ negative_bra ^ negative_ket, ln_norm + ln_term);
    }

    sum.value()
}
