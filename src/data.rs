//! Dataset ingestion.
//!
//! [`CsvTable`] reads a delimited text file into one row-major `f32` buffer. A [`Dataset`] is
//! built from it by designating one column as the target and keeping the others as features.
//! Both store samples contiguously so the training loop can hand out slices without copying.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How to read a CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Discard the first row.
    pub has_header: bool,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
        }
    }
}

/// A numeric table with row-major layout: `data.len() == rows * columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    data: Vec<f32>,
    columns: usize,
    rows: usize,
}

impl CsvTable {
    /// Read every cell of `path` as an `f32`.
    ///
    /// Rows must all have the same number of cells; an empty file yields an empty table.
    pub fn read<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let table = Self::from_reader(file, options)?;
        log::debug!(
            "read {} rows x {} columns from {}",
            table.rows,
            table.columns,
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: std::io::Read>(reader: R, options: &CsvOptions) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(options.has_header)
            .delimiter(options.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut data = Vec::new();
        let mut columns = 0;
        let mut rows = 0;
        for (idx, record) in csv.records().enumerate() {
            let record = record?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);
            if rows == 0 {
                columns = record.len();
            } else if record.len() != columns {
                return Err(Error::InvalidData(format!(
                    "line {line} has {} columns, expected {columns}",
                    record.len()
                )));
            }
            for cell in record.iter() {
                let value = cell.parse::<f32>().map_err(|e| Error::Parse {
                    line,
                    message: format!("{cell:?} is not a number: {e}"),
                })?;
                data.push(value);
            }
            rows += 1;
        }

        Ok(Self {
            data,
            columns,
            rows,
        })
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Distance between the starts of two consecutive rows in [`CsvTable::data`].
    #[inline]
    pub fn stride(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Panics if `idx >= rows`.
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.stride();
        &self.data[start..start + self.columns]
    }

    /// Split `label_column` out as the target; every other column becomes a feature.
    pub fn to_dataset(&self, label_column: usize) -> Result<Dataset> {
        if self.rows == 0 {
            return Err(Error::InvalidData("csv table has no rows".to_owned()));
        }
        if self.columns < 2 {
            return Err(Error::InvalidData(format!(
                "csv table needs at least 2 columns for features and label, got {}",
                self.columns
            )));
        }
        if label_column >= self.columns {
            return Err(Error::InvalidConfig(format!(
                "label column {label_column} out of range for {} columns",
                self.columns
            )));
        }

        let input_dim = self.columns - 1;
        let mut inputs = Vec::with_capacity(self.rows * input_dim);
        let mut targets = Vec::with_capacity(self.rows);
        for idx in 0..self.rows {
            let row = self.row(idx);
            inputs.extend_from_slice(&row[..label_column]);
            inputs.extend_from_slice(&row[label_column + 1..]);
            targets.push(row[label_column]);
        }

        Dataset::from_flat(inputs, targets, input_dim, 1)
    }
}

/// Training samples: one input row and one target row per sample, each kept in its own
/// contiguous row-major buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<f32>,
    labels: Vec<f32>,
    samples: usize,
    input_dim: usize,
    target_dim: usize,
}

impl Dataset {
    /// Wrap flat buffers of shape `(samples, input_dim)` and `(samples, target_dim)`.
    pub fn from_flat(
        features: Vec<f32>,
        labels: Vec<f32>,
        input_dim: usize,
        target_dim: usize,
    ) -> Result<Self> {
        if input_dim == 0 || target_dim == 0 {
            return Err(Error::InvalidData(format!(
                "sample widths must be non-zero, got input_dim={input_dim} target_dim={target_dim}"
            )));
        }
        let samples = features.len() / input_dim;
        if samples * input_dim != features.len() {
            return Err(Error::InvalidData(format!(
                "{} feature values do not split into rows of {input_dim}",
                features.len()
            )));
        }
        if labels.len() != samples * target_dim {
            return Err(Error::InvalidData(format!(
                "{samples} samples need {} label values, got {}",
                samples * target_dim,
                labels.len()
            )));
        }

        log::debug!("dataset: {samples} samples, {input_dim} -> {target_dim}");
        Ok(Self {
            features,
            labels,
            samples,
            input_dim,
            target_dim,
        })
    }

    /// Copy per-sample rows into contiguous storage. Every row must have the width of the first.
    pub fn from_rows(inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "{} input rows but {} target rows",
                inputs.len(),
                targets.len()
            )));
        }
        let (Some(first_x), Some(first_y)) = (inputs.first(), targets.first()) else {
            return Err(Error::InvalidData("no samples given".to_owned()));
        };

        let features = flatten(inputs, first_x.len(), "input")?;
        let labels = flatten(targets, first_y.len(), "target")?;
        Self::from_flat(features, labels, first_x.len(), first_y.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    /// Features of sample `idx`. Panics if `idx >= len`.
    #[inline]
    pub fn input(&self, idx: usize) -> &[f32] {
        &self.features[idx * self.input_dim..(idx + 1) * self.input_dim]
    }

    /// Target of sample `idx`. Panics if `idx >= len`.
    #[inline]
    pub fn target(&self, idx: usize) -> &[f32] {
        &self.labels[idx * self.target_dim..(idx + 1) * self.target_dim]
    }
}

fn flatten(rows: &[Vec<f32>], width: usize, what: &str) -> Result<Vec<f32>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(Error::InvalidData(format!(
                "{what} row {i} has {} values, expected {width}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}
