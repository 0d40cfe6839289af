use std::collections::BTreeMap;

use crate::error::StorageError;

use super::MatrixStorage;

/// Symmetric matrix keeping only explicitly set elements of the upper triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseMatrix {
    size: usize,
    elements: BTreeMap<(usize, usize), f64>,
}

impl SparseMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            elements: BTreeMap::new(),
        }
    }

    fn key(row: usize, col: usize) -> (usize, usize) {
        (row.min(col), row.max(col))
    }

    /// Stored upper triangle elements `(row, col, value)` with `row <= col`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.elements.iter().map(|(&(i, j), &v)| (i, j, v))
    }

    /// Compressed sparse row form of the full symmetric matrix.
    pub fn to_csr(&self) -> CsrMatrix {
        let mut counts = vec![0; self.size];
        for (i, j, _) in self.iter() {
            counts[i] += 1;
            if i != j {
                counts[j] += 1;
            }
        }

        let mut row_ptr = Vec::with_capacity(self.size + 1);
        row_ptr.push(0);
        for c in &counts {
            row_ptr.push(row_ptr[row_ptr.len() - 1] + c);
        }

        let nnz = row_ptr[self.size];
        let mut col_idx = vec![0; nnz];
        let mut values = vec![0.0; nnz];
        let mut cursor = row_ptr[..self.size].to_vec();

        // upper triangle keys come sorted by row, so lower elements of a row
        // are all placed before its upper elements
        let mut place = |row: usize, col: usize, value: f64| {
            col_idx[cursor[row]] = col;
            values[cursor[row]] = value;
            cursor[row] += 1;
        };
        for (i, j, v) in self.iter() {
            if i != j {
                place(j, i, v);
            }
        }
        for (i, j, v) in self.iter() {
            place(i, j, v);
        }

        CsrMatrix {
            n: self.size,
            row_ptr,
            col_idx,
            values,
        }
    }
}

impl MatrixStorage for SparseMatrix {
    fn size(&self) -> usize {
        self.size
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.size && col < self.size, "element ({row}, {col}) out of bounds");

        self.elements.get(&Self::key(row, col)).copied().unwrap_or(0.0)
    }

    fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), StorageError> {
        StorageError::check_bounds(row, col, self.size)?;
        self.elements.insert(Self::key(row, col), value);

        Ok(())
    }

    fn nonzeros(&self) -> usize {
        self.iter()
            .filter(|(_, _, v)| *v != 0.0)
            .map(|(i, j, _)| if i == j { 1 } else { 2 })
            .sum()
    }
}

/// Full symmetric matrix in compressed sparse row format, columns sorted within a row.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pub n: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// `y = A x`
    pub fn spmv(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.n) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *yi = sum;
        }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}
