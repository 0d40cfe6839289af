pub mod parity;
pub mod rectangular;
pub mod triangular;

use std::{collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::error::BasisError;

pub use parity::ParityBasis;
pub use rectangular::RectangularBasis;
pub use triangular::{AngularRange, TriangularBasis};

/// Positional numeric parameters from which a basis is rebuilt.
/// Entries expected to be counts or quantum numbers are truncated toward zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisParams(Vec<f64>);

impl BasisParams {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, position: usize) -> Option<f64> {
        self.0.get(position).copied()
    }

    pub fn required(&self, position: usize, name: &str) -> Result<f64, BasisError> {
        let value = self.get(position).ok_or_else(|| {
            BasisError::InvalidParameters(format!("missing parameter {name} at position {position}"))
        })?;

        if value.is_finite() {
            Ok(value)
        } else {
            Err(BasisError::InvalidParameters(format!("{name} is not finite")))
        }
    }

    /// Non-negative integer at `position`.
    pub fn count(&self, position: usize, name: &str) -> Result<usize, BasisError> {
        let value = self.required(position, name)?.trunc();
        if value < 0.0 {
            return Err(BasisError::InvalidParameters(format!("{name} has to be non-negative, got {value}")));
        }

        Ok(value as usize)
    }

    pub fn count_or(&self, position: usize, name: &str, default: usize) -> Result<usize, BasisError> {
        match self.get(position) {
            Some(_) => self.count(position, name),
            None => Ok(default),
        }
    }

    /// Non-negative integer at `position` that fits a quantum number.
    pub fn bound(&self, position: usize, name: &str) -> Result<i32, BasisError> {
        let count = self.count(position, name)?;

        i32::try_from(count)
            .map_err(|_| BasisError::InvalidParameters(format!("{name} = {count} exceeds the quantum number range")))
    }

    pub fn bound_or(&self, position: usize, name: &str, default: i32) -> Result<i32, BasisError> {
        match self.get(position) {
            Some(_) => self.bound(position, name),
            None => Ok(default),
        }
    }

    pub fn integer_or(&self, position: usize, name: &str, default: i32) -> Result<i32, BasisError> {
        match self.get(position) {
            Some(_) => Ok(self.required(position, name)?.trunc() as i32),
            None => Ok(default),
        }
    }
}

impl From<Vec<f64>> for BasisParams {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for BasisParams {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

/// Enumeration of basis states with a reverse index.
///
/// States are stored as a flat array of `rank` quantum numbers per state,
/// the position in the array being the basis index.
#[derive(Clone, Debug)]
pub struct StateTable {
    rank: usize,
    numbers: Vec<i32>,
    index: HashMap<Vec<i32>, usize>,
}

impl StateTable {
    pub fn new(rank: usize) -> Self {
        assert!(rank > 0, "rank 0 basis is not allowed");

        Self {
            rank,
            numbers: vec![],
            index: HashMap::new(),
        }
    }

    pub fn from_states<I>(rank: usize, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[i32]>,
    {
        let mut table = Self::new(rank);
        for state in states {
            table.push(state.as_ref());
        }

        table
    }

    /// Appends a state and returns its index.
    pub fn push(&mut self, numbers: &[i32]) -> usize {
        assert_eq!(numbers.len(), self.rank, "state of wrong rank");

        let index = self.len();
        let previous = self.index.insert(numbers.to_vec(), index);
        assert!(previous.is_none(), "state {numbers:?} enumerated twice");
        self.numbers.extend_from_slice(numbers);

        index
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn len(&self) -> usize {
        self.numbers.len() / self.rank
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[i32]> {
        self.numbers.get(index * self.rank..(index + 1) * self.rank)
    }

    pub fn lookup(&self, numbers: &[i32]) -> Option<usize> {
        self.index.get(numbers).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[i32]> {
        self.numbers.chunks_exact(self.rank)
    }

    /// Sorted distinct values of the quantum number on `axis`.
    pub fn axis_values(&self, axis: usize) -> Result<Vec<i32>, BasisError> {
        BasisError::check_axis(axis, self.rank)?;

        let mut values: Vec<i32> = self.iter().map(|s| s[axis]).collect();
        values.sort_unstable();
        values.dedup();

        Ok(values)
    }
}

impl Display for StateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, state) in self.iter().enumerate() {
            let labels: Vec<String> = state.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{i}: |{}⟩", labels.join(", "))?
        }

        Ok(())
    }
}

/// Maximum index distance between a state and any existing neighbour
/// reached by one of the selection rule `offsets`.
pub fn band_width_for<O: AsRef<[i32]>>(table: &StateTable, offsets: &[O]) -> usize {
    let mut neighbour = vec![0; table.rank()];
    let mut band_width = 0;

    for (i, state) in table.iter().enumerate() {
        for offset in offsets {
            let offset = offset.as_ref();
            assert_eq!(offset.len(), table.rank(), "selection rule of wrong rank");

            for ((n, &s), &d) in neighbour.iter_mut().zip(state).zip(offset) {
                *n = s + d;
            }

            if let Some(j) = table.lookup(&neighbour) {
                band_width = band_width.max(i.abs_diff(j));
            }
        }
    }

    band_width
}

/// Contract shared by every basis shape.
///
/// Implementations guarantee that for every `i` in `0..len()`
/// `lookup(quantum_numbers(i)) == Some(i)`, and that `lookup` returns `None`
/// for every combination removed by the truncation.
pub trait QuantumBasis: Send + Sync {
    fn table(&self) -> &StateTable;

    fn params(&self) -> &BasisParams;

    /// Maximum index distance between two states the model may couple.
    fn band_width(&self) -> usize;

    fn len(&self) -> usize {
        self.table().len()
    }

    fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn rank(&self) -> usize {
        self.table().rank()
    }

    fn lookup(&self, numbers: &[i32]) -> Option<usize> {
        self.table().lookup(numbers)
    }

    fn quantum_numbers(&self, index: usize) -> Result<&[i32], BasisError> {
        let table = self.table();
        BasisError::check_index(index, table.len())?;

        Ok(&table.numbers[index * table.rank..(index + 1) * table.rank])
    }

    fn quantum_number(&self, axis: usize, index: usize) -> Result<i32, BasisError> {
        BasisError::check_axis(axis, self.rank())?;

        Ok(self.quantum_numbers(index)?[axis])
    }

    /// Number of distinct values taken by the quantum number on `axis`.
    fn axis_size(&self, axis: usize) -> Result<usize, BasisError> {
        Ok(self.table().axis_values(axis)?.len())
    }

    fn axis_values(&self, axis: usize) -> Result<Vec<i32>, BasisError> {
        self.table().axis_values(axis)
    }
}

/// Range of values of one quantum number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Axis {
    pub start: i32,
    pub end: i32,
    pub step: i32,
}

impl Axis {
    pub fn new(start: i32, end: i32, step: i32) -> Self {
        assert!(step > 0, "axis step has to be positive");
        assert!(start <= end, "empty axis is not allowed");

        Self { start, end, step }
    }

    pub fn size(&self) -> usize {
        ((self.end - self.start) / self.step) as usize + 1
    }

    pub fn value(&self, position: usize) -> i32 {
        self.start + self.step * position as i32
    }
}

/// Product of quantum number axes.
#[derive(Clone, Debug, Default)]
pub struct Axes(Vec<Axis>);

impl Axes {
    pub fn push_axis(&mut self, axis: Axis) -> &mut Self {
        self.0.push(axis);

        self
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn size(&self) -> usize {
        self.0.iter().fold(1, |acc, a| acc * a.size())
    }

    /// Iterates the product with the last axis running fastest.
    pub fn iter_elements(&self) -> AxesIter<'_> {
        AxesIter {
            axes: &self.0,
            positions: vec![0; self.0.len()],
            current_index: 0,
            size: self.size(),
        }
    }
}

pub struct AxesIter<'a> {
    axes: &'a [Axis],
    positions: Vec<usize>,
    current_index: usize,
    size: usize,
}

impl Iterator for AxesIter<'_> {
    type Item = Vec<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.size || self.axes.is_empty() {
            return None;
        }

        if self.current_index > 0 {
            for (p, axis) in self.positions.iter_mut().zip(self.axes).rev() {
                *p += 1;
                if *p < axis.size() {
                    break;
                }
                *p = 0;
            }
        }
        self.current_index += 1;

        Some(
            self.positions
                .iter()
                .zip(self.axes)
                .map(|(&p, a)| a.value(p))
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn params_truncation() {
        let params = BasisParams::new(vec![5.7, -1.2, f64::NAN]);

        assert_eq!(params.count(0, "max"), Ok(5));
        assert!(params.count(1, "negative").is_err());
        assert!(params.count(2, "nan").is_err());
        assert!(params.count(3, "missing").is_err());
        assert_eq!(params.count_or(3, "missing", 4), Ok(4));
        assert_eq!(params.integer_or(1, "parity", 0), Ok(-1));

        let params = BasisParams::new(vec![2147483647., 2147483648.]);
        assert_eq!(params.bound(0, "max"), Ok(i32::MAX));
        assert!(matches!(params.bound(1, "max"), Err(BasisError::InvalidParameters(_))));
        assert_eq!(params.bound_or(2, "missing", 3), Ok(3));
    }

    #[test]
    fn axes_iteration() {
        let mut axes = Axes::default();
        axes.push_axis(Axis::new(0, 1, 1)).push_axis(Axis::new(-2, 2, 2));

        let expected = vec![
            vec![0, -2],
            vec![0, 0],
            vec![0, 2],
            vec![1, -2],
            vec![1, 0],
            vec![1, 2],
        ];
        let elements: Vec<Vec<i32>> = axes.iter_elements().collect();

        assert_eq!(axes.size(), 6);
        assert_eq!(expected, elements);
    }

    #[test]
    fn table_round_trip() {
        let table = StateTable::from_states(2, [[0, 0], [1, -1], [1, 1]]);

        assert_eq!(table.len(), 3);
        for (i, state) in table.iter().enumerate() {
            assert_eq!(table.lookup(state), Some(i));
        }
        assert_eq!(table.lookup(&[2, 0]), None);
        assert_eq!(table.lookup(&[1]), None);
        assert_eq!(table.axis_values(1), Ok(vec![-1, 0, 1]));
        assert_eq!(
            table.axis_values(2),
            Err(BasisError::InvalidAxis { axis: 2, rank: 2 })
        );
    }

    #[test]
    #[should_panic]
    fn duplicated_state() {
        StateTable::from_states(1, [[0], [0]]);
    }

    #[test]
    fn band_width() {
        let table = StateTable::from_states(1, [[0], [1], [2], [3], [4]]);

        assert_eq!(band_width_for(&table, &[[1], [-1]]), 1);
        assert_eq!(band_width_for(&table, &[[0], [3]]), 3);
        assert_eq!(band_width_for(&table, &[[7]]), 0);
    }

    #[test]
    fn display() {
        let table = StateTable::from_states(2, [[0, 1]]);

        assert_eq!(format!("{table}"), "0: |0, 1⟩\n");
    }
}
