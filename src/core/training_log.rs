use crate::domain::model::LogRow;
use crate::utils::error::{CurriculumError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "log.csv";

/// Appends one row per update to a model's `log.csv`.
pub struct TrainingLogWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    num_envs: usize,
}

impl TrainingLogWriter {
    pub fn create(model_dir: &Path, env_names: &[String]) -> Result<Self> {
        fs::create_dir_all(model_dir)?;
        let path = model_dir.join(LOG_FILE_NAME);
        let mut writer = csv::Writer::from_path(&path)?;

        let mut header = vec![
            "update".to_string(),
            "frames".to_string(),
            "duration".to_string(),
        ];
        header.extend(env_names.iter().map(|e| format!("return/{}", e)));
        header.extend(env_names.iter().map(|e| format!("proba/{}", e)));
        writer.write_record(&header)?;

        Ok(Self {
            path,
            writer,
            num_envs: env_names.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_row(&mut self, update: u64, frames: u64, duration_secs: f64, row: &LogRow) -> Result<()> {
        if row.returns.len() != self.num_envs || row.probas.len() != self.num_envs {
            return Err(CurriculumError::processing(format!(
                "log row has {} returns and {} probas, expected {}",
                row.returns.len(),
                row.probas.len(),
                self.num_envs
            )));
        }

        let mut record = vec![
            update.to_string(),
            frames.to_string(),
            format!("{:.3}", duration_secs),
        ];
        // 缺少的回報寫成空欄位
        record.extend(
            row.returns
                .iter()
                .map(|r| r.map(|v| v.to_string()).unwrap_or_default()),
        );
        record.extend(row.probas.iter().map(|p| p.to_string()));
        self.writer.write_record(&record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_returns_are_empty_cells() {
        let dir = TempDir::new().unwrap();
        let envs = vec!["A-v0".to_string(), "B-v0".to_string()];
        let mut log = TrainingLogWriter::create(dir.path(), &envs).unwrap();
        log.write_row(
            1,
            128,
            0.5,
            &LogRow {
                returns: vec![Some(0.25), None],
                probas: vec![0.5, 0.5],
            },
        )
        .unwrap();
        log.flush().unwrap();

        let content = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "update,frames,duration,return/A-v0,return/B-v0,proba/A-v0,proba/B-v0"
        );
        assert_eq!(lines.next().unwrap(), "1,128,0.500,0.25,,0.5,0.5");
    }

    #[test]
    fn test_row_width_is_checked() {
        let dir = TempDir::new().unwrap();
        let mut log = TrainingLogWriter::create(dir.path(), &["A-v0".to_string()]).unwrap();
        let row = LogRow {
            returns: vec![None, None],
            probas: vec![1.0],
        };
        assert!(log.write_row(1, 1, 0.0, &row).is_err());
    }
}
