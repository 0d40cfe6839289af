//! Physical models diagonalized with `spectrum-solver`.

pub mod coupled_oscillators;
pub mod dicke;
pub mod polar_oscillator;

pub use coupled_oscillators::CoupledOscillators;
pub use dicke::Dicke;
pub use polar_oscillator::PolarOscillator;
