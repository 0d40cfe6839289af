use std::{
    sync::{Arc, Weak},
    time::Instant,
};

use faer::ColRef;
use hhmmss::Hhmmss;
use quantum::{BasisParams, MatrixStorage, QuantumBasis, Storage};

use crate::{
    error::EigenError,
    model::{fill_matrix, DerivedObservables, HamiltonianBuilder},
    observables::{self, ReducedDensity, Weight},
    progress::Progress,
    selector::{SolveRequest, Solver, SolverChoice, SolverPolicy},
    solvers::{self, Spectrum},
};

/// Lifecycle of an [`EigenSystem`], only ever moving forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Unbuilt,
    BasisBuilt,
    MatrixFilled,
    Diagonalized,
}

/// Truncated basis, matrix and eigenpairs of one model at fixed basis parameters.
///
/// The model is held through a [`Weak`] reference set by [`EigenSystem::attach`],
/// the caller owns it. The matrix is kept only between filling and solving.
pub struct EigenSystem<M: HamiltonianBuilder> {
    params: BasisParams,
    model: Weak<M>,
    policy: SolverPolicy,
    choice: SolverChoice,

    basis: Option<M::Basis>,
    storage: Option<Storage>,
    spectrum: Option<Spectrum>,
    request: Option<SolveRequest>,
    solver: Option<Solver>,
    stage: Stage,
}

impl<M: HamiltonianBuilder> EigenSystem<M> {
    pub fn new(params: impl Into<BasisParams>) -> Self {
        Self {
            params: params.into(),
            model: Weak::new(),
            policy: SolverPolicy::default(),
            choice: SolverChoice::Auto,
            basis: None,
            storage: None,
            spectrum: None,
            request: None,
            solver: None,
            stage: Stage::Unbuilt,
        }
    }

    pub(crate) fn restored(
        params: BasisParams,
        model: Weak<M>,
        basis: M::Basis,
        request: SolveRequest,
        spectrum: Spectrum,
    ) -> Self {
        let mut system = Self::new(params);
        system.model = model;
        system.basis = Some(basis);
        system.request = Some(request);
        system.spectrum = Some(spectrum);
        system.stage = Stage::Diagonalized;

        system
    }

    pub fn with_policy(mut self, policy: SolverPolicy) -> Self {
        self.policy = policy;

        self
    }

    pub fn with_solver(mut self, choice: SolverChoice) -> Self {
        self.choice = choice;

        self
    }

    pub fn attach(&mut self, model: Weak<M>) {
        self.model = model;
    }

    pub fn model(&self) -> Result<Arc<M>, EigenError> {
        self.model.upgrade().ok_or(EigenError::Detached)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn params(&self) -> &BasisParams {
        &self.params
    }

    pub fn policy(&self) -> &SolverPolicy {
        &self.policy
    }

    pub fn basis(&self) -> Option<&M::Basis> {
        self.basis.as_ref()
    }

    /// Filled matrix waiting for diagonalization, if any.
    pub fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    /// Request answered by the stored eigenpairs.
    pub fn request(&self) -> Option<&SolveRequest> {
        self.request.as_ref()
    }

    /// Solver used for the stored eigenpairs, `None` for loaded results.
    pub fn solver(&self) -> Option<Solver> {
        self.solver
    }

    pub fn build_basis(&mut self) -> Result<&M::Basis, EigenError> {
        let basis = match self.basis.take() {
            Some(basis) => basis,
            None => {
                let basis = self.model()?.build_basis(&self.params)?;
                tracing::debug!(
                    model = M::NAME,
                    size = basis.len(),
                    band_width = basis.band_width(),
                    "basis built"
                );
                self.advance(Stage::BasisBuilt);

                basis
            }
        };

        Ok(self.basis.insert(basis))
    }

    /// Fills the storage the solver policy picks for the last request,
    /// or for the ground state when nothing was requested yet.
    pub fn fill_matrix(&mut self, progress: Option<&dyn Progress>) -> Result<&Storage, EigenError> {
        let request = self.request.clone().unwrap_or_else(|| SolveRequest::lowest(1));
        let (size, band_width) = self.basis_shape()?;
        let solver = self.policy.resolve(self.choice, size, band_width, &request.clipped(size));

        let storage = self.filled_storage(solver, progress)?;

        Ok(self.storage.insert(storage))
    }

    /// Computes the eigenpairs selected by `request`.
    ///
    /// Requests for more eigenpairs than basis states are clipped. When the stored
    /// eigenpairs already cover the request they are returned without recomputation.
    pub fn diagonalize(
        &mut self,
        request: &SolveRequest,
        progress: Option<&dyn Progress>,
    ) -> Result<&Spectrum, EigenError> {
        let (size, band_width) = self.basis_shape()?;
        if request.count > size {
            tracing::warn!(requested = request.count, size, "more eigenpairs requested than basis states, clipping");
        }
        let request = request.clipped(size);

        let covered = match (&self.request, &self.spectrum) {
            (Some(stored), Some(_)) => stored.covers(&request),
            _ => false,
        };
        if covered {
            return self.spectrum();
        }

        let solver = self.policy.resolve(self.choice, size, band_width, &request);
        let storage = self.filled_storage(solver, progress)?;

        let timer = Instant::now();
        let spectrum = match solvers::solve(&storage, solver, &request, &self.policy) {
            Ok(spectrum) => spectrum,
            Err(err) => {
                self.storage = Some(storage);
                return Err(err.into());
            }
        };
        drop(storage);

        tracing::info!(
            model = M::NAME,
            ?solver,
            size,
            count = spectrum.len(),
            elapsed = %timer.elapsed().hhmmssxxx(),
            "diagonalized"
        );
        if let Some(progress) = progress {
            progress.finish();
        }

        self.request = Some(request);
        self.solver = Some(solver);
        self.advance(Stage::Diagonalized);

        Ok(self.spectrum.insert(spectrum))
    }

    pub fn spectrum(&self) -> Result<&Spectrum, EigenError> {
        self.spectrum.as_ref().ok_or(EigenError::NotDiagonalized)
    }

    /// Ascending eigenvalues.
    pub fn eigenvalues(&self) -> Result<&[f64], EigenError> {
        Ok(&self.spectrum()?.values)
    }

    /// Normalised eigenvector of the `index`-th stored eigenvalue.
    pub fn eigenvector(&self, index: usize) -> Result<ColRef<'_, f64>, EigenError> {
        let spectrum = self.spectrum()?;
        let vectors = spectrum.vectors.as_ref().ok_or(EigenError::MissingVectors)?;
        if index >= spectrum.len() {
            return Err(EigenError::StateOutOfRange {
                index,
                count: spectrum.len(),
            });
        }

        Ok(vectors.as_ref().col(index))
    }

    fn advance(&mut self, stage: Stage) {
        self.stage = self.stage.max(stage);
    }

    fn basis_shape(&mut self) -> Result<(usize, usize), EigenError> {
        let basis = self.build_basis()?;

        Ok((basis.len(), basis.band_width()))
    }

    fn filled_storage(&mut self, solver: Solver, progress: Option<&dyn Progress>) -> Result<Storage, EigenError> {
        match self.storage.take() {
            Some(storage) if storage.kind() == solver.storage() => return Ok(storage),
            Some(stale) => tracing::debug!(kind = ?stale.kind(), "dropping matrix of another shape"),
            None => {}
        }

        let model = self.model()?;
        let basis = self.build_basis()?;
        let mut storage = Storage::zeros(solver.storage(), basis.len(), basis.band_width());
        fill_matrix(model.as_ref(), basis, &mut storage, progress)?;
        tracing::debug!(kind = ?storage.kind(), nonzeros = storage.nonzeros(), "matrix filled");
        self.advance(Stage::MatrixFilled);

        Ok(storage)
    }
}

impl<M: DerivedObservables> EigenSystem<M> {
    /// `f(k)` of every basis state.
    pub fn weights(&self, weight: Weight) -> Result<Vec<f64>, EigenError> {
        let basis = self.basis.as_ref().ok_or(EigenError::NotDiagonalized)?;

        match weight {
            Weight::QuantumNumber(axis) => (0..basis.len())
                .map(|k| basis.quantum_number(axis, k).map(|q| q as f64).map_err(EigenError::from))
                .collect(),
            Weight::QuantumNumberSquared(axis) => (0..basis.len())
                .map(|k| basis.quantum_number(axis, k).map(|q| (q as f64).powi(2)).map_err(EigenError::from))
                .collect(),
            Weight::BasisEnergy => {
                let model = self.model()?;
                (0..basis.len()).map(|k| model.basis_energy(basis, k)).collect()
            }
        }
    }

    /// `Σ_k |c_k|² f(k)` of eigenstate `state`.
    pub fn weighted_expectation(&self, state: usize, weight: Weight) -> Result<f64, EigenError> {
        let vector = self.eigenvector(state)?;
        let weights = self.weights(weight)?;

        Ok(observables::weighted_expectation(vector, &weights))
    }

    /// Weighted expectation of every stored eigenstate.
    pub fn peres_invariants(&self, weight: Weight) -> Result<Vec<f64>, EigenError> {
        let weights = self.weights(weight)?;

        (0..self.spectrum()?.len())
            .map(|state| self.eigenvector(state).map(|vector| observables::weighted_expectation(vector, &weights)))
            .collect()
    }

    /// Wavefunction values `amplitudes[s][p]` of eigenstates `states` at `points`.
    pub fn amplitudes(&self, states: &[usize], points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EigenError> {
        let model = self.model()?;
        let basis = self.basis.as_ref().ok_or(EigenError::NotDiagonalized)?;
        let vectors = states
            .iter()
            .map(|&s| self.eigenvector(s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = vec![0.0; basis.len()];
        let mut amplitudes = vec![Vec::with_capacity(points.len()); states.len()];
        for point in points {
            model.basis_functions(basis, point, &mut values)?;

            for (vector, amplitude) in vectors.iter().zip(&mut amplitudes) {
                amplitude.push(vector.iter().zip(&values).map(|(c, f)| c * f).sum::<f64>());
            }
        }

        Ok(amplitudes)
    }

    /// Probability densities `|ψ_s(p)|²`.
    pub fn densities(&self, states: &[usize], points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EigenError> {
        let mut densities = self.amplitudes(states, points)?;
        densities.iter_mut().flatten().for_each(|a| *a *= *a);

        Ok(densities)
    }

    pub fn partial_trace(&self, state: usize) -> Result<ReducedDensity, EigenError> {
        let subsystems = self.model()?.subsystems()?;
        let basis = self.basis.as_ref().ok_or(EigenError::NotDiagonalized)?;

        observables::partial_trace(basis, self.eigenvector(state)?, &subsystems)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use approx::assert_relative_eq;
    use quantum::StorageKind;

    use crate::model::test::Chain;

    use super::*;

    fn attached(model: &Arc<Chain>, max_n: f64) -> EigenSystem<Chain> {
        let mut system = EigenSystem::new(vec![max_n]);
        system.attach(Arc::downgrade(model));

        system
    }

    #[test]
    fn lifecycle() {
        let model = Arc::new(Chain { coupling: 0.3 });
        let mut system = EigenSystem::<Chain>::new(vec![5.]);

        assert_eq!(system.stage(), Stage::Unbuilt);
        assert!(matches!(system.build_basis(), Err(EigenError::Detached)));
        assert!(matches!(system.eigenvalues(), Err(EigenError::NotDiagonalized)));

        system.attach(Arc::downgrade(&model));
        assert_eq!(system.build_basis().unwrap().len(), 6);
        assert_eq!(system.stage(), Stage::BasisBuilt);

        let storage = system.fill_matrix(None).unwrap();
        assert_eq!(storage.kind(), StorageKind::Dense);
        assert_eq!(system.stage(), Stage::MatrixFilled);

        system.diagonalize(&SolveRequest::lowest(6), None).unwrap();
        assert_eq!(system.stage(), Stage::Diagonalized);
        assert!(system.storage().is_none());
        assert_eq!(system.solver(), Some(Solver::Dense));

        // trace is conserved
        let sum: f64 = system.eigenvalues().unwrap().iter().sum();
        assert_relative_eq!(sum, 15.0, epsilon = 1e-12);

        system.build_basis().unwrap();
        assert_eq!(system.stage(), Stage::Diagonalized);
    }

    #[test]
    fn detached_model() {
        let model = Arc::new(Chain { coupling: 0.3 });
        let mut system = attached(&model, 3.);
        drop(model);

        assert!(matches!(
            system.diagonalize(&SolveRequest::lowest(1), None),
            Err(EigenError::Detached)
        ));
    }

    #[test]
    fn over_request_is_clipped() {
        let model = Arc::new(Chain { coupling: 0.0 });

        for solver in [Solver::Dense, Solver::Banded, Solver::Lanczos] {
            let mut system = attached(&model, 3.).with_solver(SolverChoice::Forced(solver));
            let spectrum = system.diagonalize(&SolveRequest::lowest(10), None).unwrap();

            assert_eq!(spectrum.len(), 4);
            assert_eq!(spectrum.vectors.as_ref().map(|v| v.ncols()), Some(4));
            for (k, value) in spectrum.values.iter().enumerate() {
                assert_relative_eq!(*value, k as f64, epsilon = 1e-10);
            }
            assert_eq!(system.request().map(|r| r.count), Some(4));
        }
    }

    #[test]
    fn solvers_agree() {
        let model = Arc::new(Chain { coupling: 0.7 });
        let request = SolveRequest::lowest(3);

        let mut dense = attached(&model, 40.).with_solver(SolverChoice::Forced(Solver::Dense));
        let expected = dense.diagonalize(&request, None).unwrap().values.clone();

        for solver in [Solver::Banded, Solver::Lanczos] {
            let mut system = attached(&model, 40.).with_solver(SolverChoice::Forced(solver));
            let values = &system.diagonalize(&request, None).unwrap().values;

            assert_eq!(values.len(), 3);
            for (value, expected) in values.iter().zip(&expected) {
                assert_relative_eq!(value, expected, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn matrix_of_another_shape_is_dropped() {
        let model = Arc::new(Chain { coupling: 0.4 });
        let mut system = attached(&model, 40.).with_policy(SolverPolicy::default().with_dense_limit(0));

        assert_eq!(system.fill_matrix(None).unwrap().kind(), StorageKind::Banded);

        system.diagonalize(&SolveRequest::lowest(20), None).unwrap();
        assert_eq!(system.solver(), Some(Solver::Dense));
        assert!(system.storage().is_none());
    }

    #[test]
    fn targeted_request_uses_bisection() {
        let model = Arc::new(Chain { coupling: 0.0 });
        let policy = SolverPolicy::default().with_dense_limit(0).with_band_ratio(100);
        let mut system = attached(&model, 40.).with_policy(policy);

        let values = system
            .diagonalize(&SolveRequest::lowest(3).with_target(20.05), None)
            .unwrap()
            .values
            .clone();
        assert_eq!(system.solver(), Some(Solver::Banded));
        for (value, expected) in values.iter().zip([19.0, 20.0, 21.0]) {
            assert_relative_eq!(*value, expected, epsilon = 1e-10);
        }

        system.diagonalize(&SolveRequest::lowest(3), None).unwrap();
        assert_eq!(system.solver(), Some(Solver::Lanczos));
    }

    #[test]
    fn covered_request_is_reused() {
        let model = Arc::new(Chain { coupling: 0.2 });
        let mut system = attached(&model, 9.);

        let lines = Mutex::new(vec![]);
        let sink = |line: &str| lines.lock().unwrap().push(line.to_string());

        system.diagonalize(&SolveRequest::lowest(3), Some(&sink)).unwrap();
        let spectrum = system.diagonalize(&SolveRequest::lowest(2).with_vectors(false), Some(&sink)).unwrap();
        assert_eq!(spectrum.len(), 3);
        assert_eq!(lines.lock().unwrap().len(), 1);

        system.diagonalize(&SolveRequest::lowest(4), Some(&sink)).unwrap();
        assert_eq!(system.eigenvalues().unwrap().len(), 4);
        assert_eq!(lines.lock().unwrap().len(), 2);
    }

    #[test]
    fn eigenvector_access() {
        let model = Arc::new(Chain { coupling: 0.2 });
        let mut system = attached(&model, 4.);

        system.diagonalize(&SolveRequest::lowest(2).with_vectors(false), None).unwrap();
        assert!(matches!(system.eigenvector(0), Err(EigenError::MissingVectors)));

        system.diagonalize(&SolveRequest::lowest(2), None).unwrap();
        let norm: f64 = system.eigenvector(1).unwrap().iter().map(|c| c * c).sum();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
        assert!(matches!(
            system.eigenvector(2),
            Err(EigenError::StateOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn weighted_expectations() {
        let model = Arc::new(Chain { coupling: 0.0 });
        let mut system = attached(&model, 3.);
        system.diagonalize(&SolveRequest::lowest(4), None).unwrap();

        assert_relative_eq!(system.weighted_expectation(2, Weight::QuantumNumber(0)).unwrap(), 2.0);
        assert_relative_eq!(system.weighted_expectation(2, Weight::QuantumNumberSquared(0)).unwrap(), 4.0);
        assert_relative_eq!(system.weighted_expectation(3, Weight::BasisEnergy).unwrap(), 3.0);

        let invariants = system.peres_invariants(Weight::QuantumNumber(0)).unwrap();
        for (k, value) in invariants.iter().enumerate() {
            assert_relative_eq!(*value, k as f64, epsilon = 1e-12);
        }

        assert!(matches!(
            system.weighted_expectation(0, Weight::QuantumNumber(5)),
            Err(EigenError::Basis(quantum::BasisError::InvalidAxis { axis: 5, rank: 2 }))
        ));
    }

    #[test]
    fn unsupported_observables() {
        let model = Arc::new(Chain { coupling: 0.1 });
        let mut system = attached(&model, 3.);
        system.diagonalize(&SolveRequest::lowest(2), None).unwrap();

        let err = system.amplitudes(&[0], &[vec![0.0]]).unwrap_err();
        assert!(err.is_not_supported());
        assert!(system.partial_trace(0).unwrap_err().is_not_supported());

        assert!(system.amplitudes(&[0], &[]).unwrap()[0].is_empty());
    }
}
