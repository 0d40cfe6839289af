use quantum::{BasisError, BasisParams, MatrixStorage, QuantumBasis, StorageError};
use rayon::prelude::*;

use crate::{
    error::{Capability, EigenError},
    progress::{report, Progress},
};

const ROW_CHUNK: usize = 512;

/// Matrix elements of a physical model in its truncated basis.
pub trait HamiltonianBuilder: Send + Sync {
    /// Tag stored with persisted results.
    const NAME: &'static str;

    type Basis: QuantumBasis;

    fn build_basis(&self, params: &BasisParams) -> Result<Self::Basis, BasisError>;

    /// Pushes `(column, value)` for the diagonal and every coupling of state `index`.
    ///
    /// Neighbours for which `basis.lookup` returns `None` are skipped.
    /// Repeated columns are summed.
    fn row(&self, basis: &Self::Basis, index: usize, elements: &mut Vec<(usize, f64)>);
}

/// Axis partition of a two part basis, the axes in `kept` forming the first part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subsystems {
    pub kept: Vec<usize>,
}

/// Optional model capabilities, each defaulting to [`EigenError::NotSupported`].
pub trait DerivedObservables: HamiltonianBuilder {
    /// Unperturbed energy of a basis state.
    fn basis_energy(&self, _basis: &Self::Basis, _index: usize) -> Result<f64, EigenError> {
        Err(EigenError::not_supported(Self::NAME, Capability::BasisEnergy))
    }

    /// Values of all basis functions at `point`, written into `values` of basis length.
    fn basis_functions(&self, _basis: &Self::Basis, _point: &[f64], _values: &mut [f64]) -> Result<(), EigenError> {
        Err(EigenError::not_supported(Self::NAME, Capability::BasisFunctions))
    }

    fn subsystems(&self) -> Result<Subsystems, EigenError> {
        Err(EigenError::not_supported(Self::NAME, Capability::PartialTrace))
    }
}

/// Row of the model with repeated columns merged, sorted by column.
pub fn merged_row<M: HamiltonianBuilder>(model: &M, basis: &M::Basis, index: usize) -> Vec<(usize, f64)> {
    let mut row = Vec::new();
    model.row(basis, index, &mut row);
    row.sort_unstable_by_key(|e| e.0);
    row.dedup_by(|next, kept| {
        let same = next.0 == kept.0;
        if same {
            kept.1 += next.1;
        }
        same
    });

    row
}

/// Fills `storage` with the model matrix.
///
/// Rows are computed in parallel chunks and written in row order, only the
/// upper triangle of every row being written.
pub fn fill_matrix<M, S>(
    model: &M,
    basis: &M::Basis,
    storage: &mut S,
    progress: Option<&dyn Progress>,
) -> Result<(), StorageError>
where
    M: HamiltonianBuilder,
    S: MatrixStorage + ?Sized,
{
    let size = basis.len();
    assert_eq!(size, storage.size(), "storage does not match the basis size");

    for start in (0..size).step_by(ROW_CHUNK) {
        let end = (start + ROW_CHUNK).min(size);
        let rows: Vec<Vec<(usize, f64)>> = (start..end)
            .into_par_iter()
            .map(|i| merged_row(model, basis, i))
            .collect();

        for (i, row) in (start..end).zip(rows) {
            for (j, value) in row {
                if j >= i {
                    storage.set(i, j, value)?;
                }
            }
        }

        report(progress, || format!("filled rows {end}/{size}"));
    }

    Ok(())
}
