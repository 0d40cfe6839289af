use faer::{MatRef, Side};

use crate::{error::SolverError, selector::SolveRequest};

use super::{requested_window, Spectrum};

/// Full symmetric eigendecomposition, reading the lower triangle.
pub fn solve(matrix: MatRef<f64>, request: &SolveRequest) -> Result<Spectrum, SolverError> {
    let size = matrix.nrows();
    if size != matrix.ncols() {
        return Err(SolverError::IllegalInput(format!(
            "matrix is not square, {}x{}",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    if size == 0 || request.count == 0 {
        return Ok(Spectrum::empty(request.vectors, size));
    }

    if !request.vectors {
        let values = matrix
            .self_adjoint_eigenvalues(Side::Lower)
            .map_err(|e| SolverError::Backend(format!("{e:?}")))?;
        let window = requested_window(&values, request);

        return Ok(Spectrum {
            values: values[window].to_vec(),
            vectors: None,
        });
    }

    let eigen = matrix
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| SolverError::Backend(format!("{e:?}")))?;
    let values: Vec<f64> = eigen.S().column_vector().iter().copied().collect();
    let window = requested_window(&values, request);

    Ok(Spectrum {
        vectors: Some(eigen.U().subcols(window.start, window.len()).to_owned()),
        values: values[window].to_vec(),
    })
}
