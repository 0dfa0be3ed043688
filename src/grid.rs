use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading a snapshot grid from disk.
///
/// Callers decide per call whether a variant is fatal: the two mandatory
/// comparison snapshots propagate either variant to the top level, while the
/// frame pipeline treats `NotFound` as a skip and anything else as a logged
/// per-frame error.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("snapshot file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("malformed snapshot {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },
}

/// Raised when two grids that must share dimensions do not.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("grid shape mismatch: {rows_a}x{cols_a} vs {rows_b}x{cols_b}")]
pub struct ShapeMismatch {
    pub rows_a: usize,
    pub cols_a: usize,
    pub rows_b: usize,
    pub cols_b: usize,
}

/// A rectangular grid of scalar opinion coordinates for one time step.
///
/// Values are stored row-major. Grids are read-only once loaded; derived
/// grids (the difference map) are built through [`Grid::from_data`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Grid {
    /// Builds a grid from row-major data. The length of `data` must equal
    /// `rows * cols`.
    pub fn from_data(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), rows * cols, "row-major data length mismatch");
        Self { rows, cols, data }
    }

    /// Loads a headerless CSV file into a grid.
    ///
    /// Distinguishes a missing file (`NotFound`) from content that exists but
    /// is not a rectangular numeric grid (`Malformed`). No side effects
    /// beyond the read.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound {
                    path: path_ref.to_path_buf(),
                }
            } else {
                LoadError::Malformed {
                    path: path_ref.to_path_buf(),
                    detail: e.to_string(),
                }
            }
        })?;

        // flexible: report ragged widths ourselves with row context
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let malformed = |detail: String| LoadError::Malformed {
            path: path_ref.to_path_buf(),
            detail,
        };

        let mut data = Vec::new();
        let mut cols = 0usize;
        let mut rows = 0usize;

        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| malformed(e.to_string()))?;

            if row_idx == 0 {
                cols = record.len();
                if cols == 0 {
                    return Err(malformed("first row has no columns".to_string()));
                }
            } else if record.len() != cols {
                return Err(malformed(format!(
                    "row {} has {} columns, expected {}",
                    row_idx,
                    record.len(),
                    cols
                )));
            }

            for (col_idx, field) in record.iter().enumerate() {
                let value: f32 = field.trim().parse().map_err(|_| {
                    malformed(format!(
                        "row {}, column {}: not a number: {:?}",
                        row_idx, col_idx, field
                    ))
                })?;
                data.push(value);
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(malformed("file contains no rows".to_string()));
        }

        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// The row-major flattened sample backing this grid.
    pub fn values(&self) -> &[f32] {
        &self.data
    }
}
