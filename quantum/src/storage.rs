pub mod banded;
pub mod sparse;

use faer::Mat;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub use banded::BandedMatrix;
pub use sparse::{CsrMatrix, SparseMatrix};

/// Square real symmetric matrix addressed by `(row, col)`.
///
/// `set(i, j, v)` defines both `(i, j)` and `(j, i)`.
/// `get` panics for coordinates outside of the matrix, the same as indexing.
pub trait MatrixStorage {
    fn size(&self) -> usize;

    fn get(&self, row: usize, col: usize) -> f64;

    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), StorageError>;

    /// Number of stored non-zero elements of the full matrix.
    fn nonzeros(&self) -> usize;

    /// Copies the matrix into a dense one.
    fn to_dense(&self) -> Mat<f64> {
        Mat::from_fn(self.size(), self.size(), |i, j| self.get(i, j))
    }
}

impl MatrixStorage for Mat<f64> {
    fn size(&self) -> usize {
        assert_eq!(self.nrows(), self.ncols(), "storage has to be square");

        self.nrows()
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self[(row, col)]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), StorageError> {
        StorageError::check_bounds(row, col, self.nrows())?;

        self[(row, col)] = value;
        self[(col, row)] = value;

        Ok(())
    }

    fn nonzeros(&self) -> usize {
        let mut count = 0;
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                if self[(i, j)] != 0.0 {
                    count += 1;
                }
            }
        }

        count
    }

    fn to_dense(&self) -> Mat<f64> {
        self.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    Dense,
    Banded,
    Sparse,
}

/// One of the supported matrix shapes, chosen before the matrix is filled.
#[derive(Clone, Debug)]
pub enum Storage {
    Dense(Mat<f64>),
    Banded(BandedMatrix),
    Sparse(SparseMatrix),
}

impl Storage {
    pub fn zeros(kind: StorageKind, size: usize, band_width: usize) -> Self {
        match kind {
            StorageKind::Dense => Self::Dense(Mat::zeros(size, size)),
            StorageKind::Banded => Self::Banded(BandedMatrix::zeros(size, band_width)),
            StorageKind::Sparse => Self::Sparse(SparseMatrix::new(size)),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            Storage::Dense(_) => StorageKind::Dense,
            Storage::Banded(_) => StorageKind::Banded,
            Storage::Sparse(_) => StorageKind::Sparse,
        }
    }

    fn inner(&self) -> &dyn MatrixStorage {
        match self {
            Storage::Dense(m) => m,
            Storage::Banded(m) => m,
            Storage::Sparse(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MatrixStorage {
        match self {
            Storage::Dense(m) => m,
            Storage::Banded(m) => m,
            Storage::Sparse(m) => m,
        }
    }
}

impl MatrixStorage for Storage {
    fn size(&self) -> usize {
        self.inner().size()
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.inner().get(row, col)
    }

    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), StorageError> {
        self.inner_mut().set(row, col, value)
    }

    fn nonzeros(&self) -> usize {
        self.inner().nonzeros()
    }

    fn to_dense(&self) -> Mat<f64> {
        self.inner().to_dense()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fill(storage: &mut Storage) -> Result<(), StorageError> {
        storage.set(0, 0, 1.0)?;
        storage.set(1, 0, 0.5)?;
        storage.set(2, 1, -0.25)?;
        storage.set(3, 3, 4.0)?;

        Ok(())
    }

    #[test]
    fn shapes_agree() {
        let kinds = [StorageKind::Dense, StorageKind::Banded, StorageKind::Sparse];
        let mut dense = Vec::new();

        for kind in kinds {
            let mut storage = Storage::zeros(kind, 4, 1);
            assert_eq!(storage.kind(), kind);
            fill(&mut storage).unwrap();

            assert_eq!(storage.size(), 4);
            assert_eq!(storage.get(0, 1), 0.5);
            assert_eq!(storage.get(1, 0), 0.5);
            assert_eq!(storage.get(1, 2), -0.25);
            assert_eq!(storage.get(0, 3), 0.0);
            assert_eq!(storage.nonzeros(), 6);

            dense.push(storage.to_dense());
        }

        assert_eq!(dense[0], dense[1]);
        assert_eq!(dense[0], dense[2]);
    }

    #[test]
    fn out_of_bounds() {
        for kind in [StorageKind::Dense, StorageKind::Banded, StorageKind::Sparse] {
            let mut storage = Storage::zeros(kind, 3, 2);
            assert_eq!(
                storage.set(3, 0, 1.0),
                Err(StorageError::OutOfBounds { row: 3, col: 0, size: 3 })
            );
        }
    }
}
