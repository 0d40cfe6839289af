use crate::error::StorageError;

use super::MatrixStorage;

/// Symmetric band matrix storing only the diagonal and `band_width` sub-diagonals.
///
/// Column `j` occupies `data[j * (band_width + 1)..]`, element `(i, j)` with
/// `j <= i <= j + band_width` lying at offset `i - j`.
#[derive(Clone, Debug, PartialEq)]
pub struct BandedMatrix {
    size: usize,
    band_width: usize,
    data: Vec<f64>,
}

impl BandedMatrix {
    pub fn zeros(size: usize, band_width: usize) -> Self {
        let band_width = band_width.min(size.saturating_sub(1));

        Self {
            size,
            band_width,
            data: vec![0.0; size * (band_width + 1)],
        }
    }

    pub fn band_width(&self) -> usize {
        self.band_width
    }

    fn position(&self, row: usize, col: usize) -> Option<usize> {
        let (row, col) = if row >= col { (row, col) } else { (col, row) };

        (row - col <= self.band_width).then(|| col * (self.band_width + 1) + row - col)
    }

    /// Elements of column `col` from the diagonal downwards, clipped at the matrix edge.
    pub fn lower_column(&self, col: usize) -> &[f64] {
        let start = col * (self.band_width + 1);
        let len = (self.band_width + 1).min(self.size - col);

        &self.data[start..start + len]
    }
}

impl MatrixStorage for BandedMatrix {
    fn size(&self) -> usize {
        self.size
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.size && col < self.size, "element ({row}, {col}) out of bounds");

        self.position(row, col).map_or(0.0, |p| self.data[p])
    }

    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), StorageError> {
        StorageError::check_bounds(row, col, self.size)?;

        let position = self.position(row, col).ok_or(StorageError::OutsideBand {
            row,
            col,
            band_width: self.band_width,
        })?;
        self.data[position] = value;

        Ok(())
    }

    fn nonzeros(&self) -> usize {
        (0..self.size)
            .flat_map(|j| self.lower_column(j).iter().enumerate())
            .filter(|(_, v)| **v != 0.0)
            .map(|(offset, _)| if offset == 0 { 1 } else { 2 })
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symmetric_access() {
        let mut banded = BandedMatrix::zeros(5, 2);
        banded.set(3, 1, 2.5).unwrap();
        banded.set(0, 0, 1.0).unwrap();
        banded.set(4, 4, -1.0).unwrap();

        assert_eq!(banded.get(1, 3), 2.5);
        assert_eq!(banded.get(3, 1), 2.5);
        assert_eq!(banded.get(4, 0), 0.0);
        assert_eq!(banded.lower_column(1), &[0.0, 0.0, 2.5]);
        assert_eq!(banded.lower_column(4), &[-1.0]);
        assert_eq!(banded.nonzeros(), 4);
    }

    #[test]
    fn outside_band_fails() {
        let mut banded = BandedMatrix::zeros(5, 1);

        assert_eq!(
            banded.set(0, 2, 1.0),
            Err(StorageError::OutsideBand { row: 0, col: 2, band_width: 1 })
        );
        assert_eq!(
            banded.set(4, 5, 1.0),
            Err(StorageError::OutOfBounds { row: 4, col: 5, size: 5 })
        );
    }

    #[test]
    fn band_clipped_to_size() {
        let banded = BandedMatrix::zeros(3, 10);

        assert_eq!(banded.band_width(), 2);
        assert_eq!(banded.lower_column(0).len(), 3);
    }
}
