//! Data
//!
//! Borrowed column-major matrix views for model inputs and an owned [`Dataset`]
//! of (feature vector, outcome) records that can be partitioned by row index.
use crate::errors::ConformalError;
use serde::{Deserialize, Serialize};

/// Contiguous Column Major Matrix data container.
///
/// This structure holds a dense matrix of values in a single contiguous memory block.
/// It follows column-major order (Fortran-style), so each column is a contiguous slice.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    ///
    /// * `data` - Column-major values, `rows * cols` long.
    /// * `rows` - Number of records.
    /// * `cols` - Number of features.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        j * self.rows + i
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        let start = self.item_index(0, col);
        &self.data[start..start + self.rows]
    }

    /// Check the backing slice holds exactly `rows * cols` values.
    pub fn validate(&self) -> Result<(), ConformalError> {
        if self.data.len() != self.rows * self.cols {
            return Err(ConformalError::ShapeMismatch(
                "matrix data".to_string(),
                self.rows * self.cols,
                self.data.len(),
            ));
        }
        Ok(())
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }
}

/// Owned collection of records, each a feature vector and a scalar outcome.
///
/// Features are stored column-major, the same layout [`Matrix`] reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    data: Vec<f64>,
    y: Vec<f64>,
    cols: usize,
}

impl Dataset {
    /// Build a dataset from column-major feature values and outcomes.
    pub fn new(data: Vec<f64>, y: Vec<f64>, cols: usize) -> Result<Self, ConformalError> {
        if data.len() != y.len() * cols {
            return Err(ConformalError::ShapeMismatch(
                "dataset features".to_string(),
                y.len() * cols,
                data.len(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ConformalError::invalid_argument("y", "finite outcomes", "non-finite value"));
        }
        Ok(Dataset { data, y, cols })
    }

    /// Build a dataset from row-major records.
    pub fn from_rows(rows: &[Vec<f64>], y: Vec<f64>) -> Result<Self, ConformalError> {
        if rows.len() != y.len() {
            return Err(ConformalError::ShapeMismatch("dataset rows".to_string(), y.len(), rows.len()));
        }
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = vec![0.0; rows.len() * cols];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ConformalError::ShapeMismatch("dataset row".to_string(), cols, row.len()));
            }
            for (j, v) in row.iter().enumerate() {
                data[j * rows.len() + i] = *v;
            }
        }
        Dataset::new(data, y, cols)
    }

    /// Borrow the features as a [`Matrix`].
    pub fn matrix(&self) -> Matrix<'_, f64> {
        Matrix::new(&self.data, self.y.len(), self.cols)
    }

    /// Outcome values.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Number of records.
    pub fn rows(&self) -> usize {
        self.y.len()
    }

    /// Number of features.
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Feature vector of record `i`.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.matrix().get_row(i)
    }

    /// Copy the records at `index`, in order, into a new dataset.
    pub fn subset(&self, index: &[usize]) -> Dataset {
        let rows = self.rows();
        let mut data = Vec::with_capacity(index.len() * self.cols);
        for j in 0..self.cols {
            let col = &self.data[j * rows..(j + 1) * rows];
            data.extend(index.iter().map(|&i| col[i]));
        }
        let y = index.iter().map(|&i| self.y[i]).collect();
        Dataset { data, y, cols: self.cols }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_access() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get(0, 1), &4.0);
        assert_eq!(m.get_row(2), vec![3.0, 6.0]);
        assert_eq!(m.get_col(1), &[4.0, 5.0, 6.0]);
        assert!(m.validate().is_ok());
        assert!(Matrix::new(&v, 4, 2).validate().is_err());
    }

    #[test]
    fn test_dataset_from_rows_and_subset() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let ds = Dataset::from_rows(&rows, vec![0.1, 0.2, 0.3]).unwrap();
        assert_eq!(ds.rows(), 3);
        assert_eq!(ds.cols(), 2);
        assert_eq!(ds.row(1), vec![2.0, 20.0]);

        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.y(), &[0.3, 0.1]);
        assert_eq!(sub.row(0), vec![3.0, 30.0]);
        assert_eq!(sub.row(1), vec![1.0, 10.0]);
    }

    #[test]
    fn test_dataset_rejects_bad_shapes() {
        assert!(matches!(
            Dataset::new(vec![1.0, 2.0, 3.0], vec![1.0, 2.0], 2),
            Err(ConformalError::ShapeMismatch(..))
        ));
        assert!(matches!(
            Dataset::new(vec![1.0, 2.0], vec![1.0, f64::NAN], 1),
            Err(ConformalError::InvalidArgument(..))
        ));
        let ragged = vec![vec![1.0], vec![2.0, 3.0]];
        assert!(Dataset::from_rows(&ragged, vec![0.0, 0.0]).is_err());
    }
}
