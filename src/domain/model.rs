use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Column-oriented view of one `log.csv` produced by a training run.
///
/// Every cell is numeric; empty cells and `nan` are stored as `f64::NAN`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogTable {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl LogTable {
    pub fn new(source: PathBuf, headers: Vec<String>) -> Self {
        let columns = vec![Vec::new(); headers.len()];
        Self {
            source,
            headers,
            columns,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_row(&mut self, row: Vec<f64>) {
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// `(suffix, values)` for every column whose name starts with `prefix`, in header order.
    pub fn columns_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [f64])> + 'a {
        self.headers
            .iter()
            .zip(self.columns.iter())
            .filter_map(move |(name, values)| {
                name.strip_prefix(prefix)
                    .map(|suffix| (suffix, values.as_slice()))
            })
    }

    pub fn truncate(&mut self, len: usize) {
        for column in &mut self.columns {
            column.truncate(len);
        }
    }
}

/// All runs of one column family (`return/`, `proba/`) grouped by environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSeries {
    pub env: String,
    pub runs: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedColumns {
    pub prefix: String,
    pub frames: Vec<f64>,
    pub envs: Vec<EnvSeries>,
}

impl ExtractedColumns {
    pub fn env(&self, env: &str) -> Option<&EnvSeries> {
        self.envs.iter().find(|s| s.env == env)
    }
}

/// One aggregated curve (a percentile across runs) for one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeries {
    pub env: String,
    pub percentile: f64,
    pub values: Vec<f64>,
}

/// A CSV table ready to be written to the stats directory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatTable {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StatTable {
    pub fn to_csv(&self) -> crate::utils::error::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| crate::utils::error::CurriculumError::processing(e.to_string()))?;
        String::from_utf8(bytes)
            .map_err(|e| crate::utils::error::CurriculumError::processing(e.to_string()))
    }
}

/// Raw MiniGrid style observation: a 7x7x3 egocentric image and a mission string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub image: Vec<u8>,
    pub mission: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreprocessedObss {
    pub images: Vec<Vec<f32>>,
    pub instrs: Vec<Vec<i64>>,
}

/// Result of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    pub obs: O,
    pub reward: f64,
    pub done: bool,
}

/// One row of a training `log.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub returns: Vec<Option<f64>>,
    pub probas: Vec<f64>,
}
