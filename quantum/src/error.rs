//! Errors of basis construction and matrix storage.

use thiserror::Error;

/// Returned from basis construction and basis introspection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BasisError {
    /// Requested a quantum number axis the basis does not have.
    #[error("quantum number axis {axis} is not defined for a rank {rank} basis")]
    InvalidAxis { axis: usize, rank: usize },

    /// Requested a basis state outside of `0..len`.
    #[error("basis state {index} is out of range for a basis of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Parameter vector does not describe a valid basis.
    #[error("invalid basis parameters: {0}")]
    InvalidParameters(String),

    /// Truncation removed every state.
    #[error("basis truncation left no states")]
    Empty,
}

impl BasisError {
    pub fn check_axis(axis: usize, rank: usize) -> Result<(), Self> {
        (axis < rank).then_some(()).ok_or(Self::InvalidAxis { axis, rank })
    }

    pub(crate) fn check_index(index: usize, len: usize) -> Result<(), Self> {
        (index < len).then_some(()).ok_or(Self::IndexOutOfRange { index, len })
    }
}

/// Returned from writes into a [`MatrixStorage`][crate::storage::MatrixStorage].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    /// Coupling written outside the declared band of a banded matrix.
    #[error("element ({row}, {col}) lies outside the declared band width {band_width}")]
    OutsideBand { row: usize, col: usize, band_width: usize },

    /// Coordinates outside of the square matrix.
    #[error("element ({row}, {col}) is out of bounds for a {size}x{size} matrix")]
    OutOfBounds { row: usize, col: usize, size: usize },
}

impl StorageError {
    pub(crate) fn check_bounds(row: usize, col: usize, size: usize) -> Result<(), Self> {
        (row < size && col < size)
            .then_some(())
            .ok_or(Self::OutOfBounds { row, col, size })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = BasisError::InvalidAxis { axis: 3, rank: 2 };
        assert!(err.to_string().contains("axis 3"));

        let err = StorageError::OutsideBand { row: 7, col: 2, band_width: 3 };
        assert_eq!(
            err.to_string(),
            "element (7, 2) lies outside the declared band width 3"
        );
    }

    #[test]
    fn checks() {
        assert!(BasisError::check_axis(1, 2).is_ok());
        assert_eq!(
            BasisError::check_axis(2, 2),
            Err(BasisError::InvalidAxis { axis: 2, rank: 2 })
        );
        assert!(StorageError::check_bounds(4, 0, 4).is_err());
    }
}
