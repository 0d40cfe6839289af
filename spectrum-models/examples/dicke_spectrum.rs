use std::sync::Arc;

use quantum::utility::linspace;
use spectrum_models::Dicke;
use spectrum_solver::{BarProgress, EigenSystem, EigenError, SolveRequest, Weight};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LEVELS: usize = 10;

pub fn main() -> Result<(), EigenError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // [max_n, 2j, parity]
    let params = vec![60., 10., 1.];
    let request = SolveRequest::lowest(LEVELS);

    let mut last = None;
    for coupling in linspace(0.0, 1.5, 16) {
        let model = Arc::new(Dicke::new(1.0, 1.0, coupling));
        let mut system = EigenSystem::new(params.clone());
        system.attach(Arc::downgrade(&model));

        let progress = BarProgress::default();
        system.diagonalize(&request, Some(&progress))?;

        let photons = system.peres_invariants(Weight::QuantumNumber(0))?;
        let entropy = system.partial_trace(0)?.entropy()?;
        let levels = system
            .eigenvalues()?
            .iter()
            .zip(&photons)
            .map(|(e, n)| format!("{e:.6} ({n:.3})"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("λ = {coupling:.2}, ground entropy {entropy:.4}: {levels}");

        last = Some((system, model));
    }

    if let Some((system, _model)) = last {
        system.save("data/dicke_spectrum.json")?;
    }

    Ok(())
}
