//! Loading, cleaning, smoothing and aggregating training logs.

use crate::core::training_log::LOG_FILE_NAME;
use crate::domain::model::{AggregatedSeries, EnvSeries, ExtractedColumns, LogTable};
use crate::utils::error::{CurriculumError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const CLEAN_SUFFIX: &str = "-clean";
pub const RETURN_PREFIX: &str = "return/";
pub const PROBA_PREFIX: &str = "proba/";

/// Every `log.csv` below `dir`, in path order.
pub fn discover_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();
    discover_recursive(dir, &mut results)?;
    results.sort();
    Ok(results)
}

fn discover_recursive(dir: &Path, results: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            discover_recursive(&path, results)?;
        } else if path
            .file_name()
            .map(|n| n == LOG_FILE_NAME)
            .unwrap_or(false)
        {
            results.push(path);
        }
    }

    Ok(())
}

fn parse_cell(path: &Path, column: &str, cell: &str) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        CurriculumError::processing(format!(
            "{}: non-numeric value '{}' in column '{}'",
            path.display(),
            cell,
            column
        ))
    })
}

pub fn read_log_table(path: &Path) -> Result<LogTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = LogTable::new(path.to_path_buf(), headers);

    for record in reader.records() {
        let record = record?;
        let row = table
            .headers
            .iter()
            .zip(record.iter())
            .map(|(column, cell)| parse_cell(path, column, cell))
            .collect::<Result<Vec<f64>>>()?;
        table.push_row(row);
    }

    Ok(table)
}

pub fn write_log_table(path: &Path, table: &LogTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for i in 0..table.len() {
        let row: Vec<String> = table
            .columns
            .iter()
            .map(|c| if c[i].is_nan() { String::new() } else { c[i].to_string() })
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Replaces every NaN by the previous value of the column, starting from 0.
pub fn forward_fill(values: &mut [f64]) {
    let mut prev = 0.0;
    for value in values.iter_mut() {
        if value.is_nan() {
            *value = prev;
        } else {
            prev = *value;
        }
    }
}

pub fn clean_returns(table: &mut LogTable) {
    for (name, column) in table.headers.iter().zip(table.columns.iter_mut()) {
        if name.starts_with(RETURN_PREFIX) {
            forward_fill(column);
        }
    }
}

/// Row count shared by every table: the shortest table, cut before the
/// first row whose frame count exceeds `max_frame`.
pub fn common_length(tables: &[LogTable], max_frame: Option<f64>) -> Result<usize> {
    let mut length = usize::MAX;
    for table in tables {
        length = length.min(table.len());
        if let Some(max_frame) = max_frame {
            let frames = table.column("frames").ok_or_else(|| {
                CurriculumError::processing(format!(
                    "{} has no 'frames' column",
                    table.source.display()
                ))
            })?;
            if let Some(cut) = frames.iter().position(|&f| f > max_frame) {
                length = length.min(cut);
            }
        }
    }
    Ok(if length == usize::MAX { 0 } else { length })
}

/// Loads every log below `model_dir`, cleaning returns and caching the
/// cleaned copy next to the original as `log.csv-clean`.
pub fn load_and_clean_logs(model_dir: &Path, max_frame: Option<f64>) -> Result<Vec<LogTable>> {
    if !model_dir.is_dir() {
        return Err(CurriculumError::processing(format!(
            "model directory {} does not exist",
            model_dir.display()
        )));
    }

    let mut tables = Vec::new();
    for path in discover_logs(model_dir)? {
        let mut clean_path = path.clone().into_os_string();
        clean_path.push(CLEAN_SUFFIX);
        let clean_path = PathBuf::from(clean_path);

        let table = if clean_path.exists() {
            let mut table = read_log_table(&clean_path)?;
            table.source = path.clone();
            table
        } else {
            let mut table = read_log_table(&path)?;
            clean_returns(&mut table);
            write_log_table(&clean_path, &table)?;
            table
        };
        tracing::info!("{} loaded and cleaned.", path.display());
        tables.push(table);
    }

    if tables.is_empty() {
        return Err(CurriculumError::processing(format!(
            "no {} found under {}",
            LOG_FILE_NAME,
            model_dir.display()
        )));
    }

    let length = common_length(&tables, max_frame)?;
    for table in &mut tables {
        table.truncate(length);
    }
    Ok(tables)
}

/// Rolling mean over the last `window` values, ignoring NaN (`min_periods = 1`).
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (sum, count) = values[start..=i]
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Groups the columns starting with `prefix` by environment and smooths them.
pub fn extract_and_smooth(tables: &[LogTable], prefix: &str, window: usize) -> Result<ExtractedColumns> {
    let first = tables
        .first()
        .ok_or_else(|| CurriculumError::processing("no training logs to extract from"))?;
    let frames = first
        .column("frames")
        .ok_or_else(|| {
            CurriculumError::processing(format!("{} has no 'frames' column", first.source.display()))
        })?
        .to_vec();

    let mut envs: Vec<EnvSeries> = Vec::new();
    for table in tables {
        for (env, values) in table.columns_with_prefix(prefix) {
            let smoothed = rolling_mean(values, window);
            match envs.iter_mut().find(|s| s.env == env) {
                Some(series) => series.runs.push(smoothed),
                None => envs.push(EnvSeries {
                    env: env.to_string(),
                    runs: vec![smoothed],
                }),
            }
        }
    }

    Ok(ExtractedColumns {
        prefix: prefix.to_string(),
        frames,
        envs,
    })
}

/// Linear-interpolation percentile of `values` (`q` in `[0, 100]`); NaN if any input is NaN.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Per environment and per time-step percentiles across runs.
pub fn percentile_aggregate(data: &ExtractedColumns, percentiles: &[f64]) -> Vec<AggregatedSeries> {
    let mut out = Vec::new();
    for series in &data.envs {
        let len = series.runs.iter().map(Vec::len).min().unwrap_or(0);
        for &q in percentiles {
            let values = (0..len)
                .map(|t| {
                    let column: Vec<f64> = series.runs.iter().map(|run| run[t]).collect();
                    percentile(&column, q)
                })
                .collect();
            out.push(AggregatedSeries {
                env: series.env.clone(),
                percentile: q,
                values,
            });
        }
    }
    out
}

pub fn median_aggregate(data: &ExtractedColumns) -> Vec<AggregatedSeries> {
    percentile_aggregate(data, &[50.0])
}

pub fn shorten_env_name(env_name: &str) -> &str {
    let name = env_name.strip_prefix("MiniGrid-").unwrap_or(env_name);
    name.strip_suffix("-v0").unwrap_or(name)
}

/// First frame at which `values` reaches `threshold`.
pub fn frames_to_reach(frames: &[f64], values: &[f64], threshold: f64) -> Option<f64> {
    frames
        .iter()
        .zip(values)
        .find(|(_, v)| **v >= threshold)
        .map(|(&f, _)| f)
}
