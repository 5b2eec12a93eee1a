//! A small row-major matrix used for feature rows.
use std::ops::{Index, IndexMut};

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct Array2<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

#[derive(Debug, Clone, Error)]
pub enum ShapeError {
    #[error("invalid shape ({rows}, {cols}) for buffer of length {len}")]
    BufferLength { rows: usize, cols: usize, len: usize },
    #[error("cannot stack a block with {found} columns onto {expected} columns")]
    ColumnMismatch { expected: usize, found: usize },
}

impl<T> Array2<T> {
    pub fn from_shape_vec(shape: (usize, usize), data: Vec<T>) -> Result<Self, ShapeError> {
        let (rows, cols) = shape;
        if data.len() != rows * cols {
            return Err(ShapeError::BufferLength {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Build from equally long rows. An empty input gives a `0 x 0` matrix.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, ShapeError> {
        let cols = rows.first().map_or(0, Vec::len);
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * cols);
        for row in rows {
            if row.len() != cols {
                return Err(ShapeError::ColumnMismatch {
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            data,
            rows: n_rows,
            cols,
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn row_slice(&self, row: usize) -> &[T] {
        let start = self.offset(row, 0);
        &self.data[start..start + self.cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        (0..self.rows).map(move |row| self.row_slice(row))
    }
}

impl<T: Clone> Array2<T> {
    /// Stack blocks on top of each other, keeping their order.
    ///
    /// Blocks without rows are skipped when checking the column count.
    pub fn vstack(blocks: &[Array2<T>]) -> Result<Self, ShapeError> {
        let cols = blocks
            .iter()
            .find(|b| b.rows > 0)
            .map_or(0, |b| b.cols);
        let total_rows: usize = blocks.iter().map(|b| b.rows).sum();
        let mut data = Vec::with_capacity(total_rows * cols);
        for block in blocks.iter().filter(|b| b.rows > 0) {
            if block.cols != cols {
                return Err(ShapeError::ColumnMismatch {
                    expected: cols,
                    found: block.cols,
                });
            }
            data.extend_from_slice(&block.data);
        }
        Ok(Self {
            data,
            rows: total_rows,
            cols,
        })
    }
}

impl<T> Index<(usize, usize)> for Array2<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let offset = self.offset(index.0, index.1);
        &self.data[offset]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2<T> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let offset = self.offset(index.0, index.1);
        &mut self.data[offset]
    }
}
