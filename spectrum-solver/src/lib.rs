pub mod eigen_system;
pub mod error;
pub mod model;
pub mod observables;
pub mod persistence;
pub mod progress;
pub mod selector;
pub mod solvers;

pub use eigen_system::{EigenSystem, Stage};
pub use error::{Capability, EigenError, PersistenceError, SolverError};
pub use model::{DerivedObservables, HamiltonianBuilder, Subsystems};
pub use observables::{ReducedDensity, Weight};
pub use progress::{BarProgress, LogProgress, Progress};
pub use selector::{SolveRequest, Solver, SolverChoice, SolverPolicy};
pub use solvers::Spectrum;

pub extern crate faer;
pub extern crate quantum;
