use crate::config::stats_config::{StatDefinition, StatKind};
use crate::core::stats::{
    extract_and_smooth, frames_to_reach, load_and_clean_logs, median_aggregate,
    percentile_aggregate, shorten_env_name, PROBA_PREFIX, RETURN_PREFIX,
};
use crate::core::{LogTable, Pipeline, StatTable, Storage};
use crate::domain::model::AggregatedSeries;
use crate::utils::error::{CurriculumError, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy)]
pub struct StatsOptions {
    /// Rolling-mean window, in updates.
    pub window: usize,
    pub return_to_reach: f64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            window: 100,
            return_to_reach: 0.8,
        }
    }
}

/// Cleaned and truncated logs of one labelled run folder.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub label: String,
    pub tables: Vec<LogTable>,
}

/// Computes one statistic from training logs and writes its tables to the stats storage.
pub struct StatsPipeline<S: Storage> {
    storage: S,
    models_dir: PathBuf,
    stat: StatDefinition,
    options: StatsOptions,
}

impl<S: Storage> StatsPipeline<S> {
    pub fn new(storage: S, models_dir: impl Into<PathBuf>, stat: StatDefinition, options: StatsOptions) -> Self {
        Self {
            storage,
            models_dir: models_dir.into(),
            stat,
            options,
        }
    }

    pub fn stat(&self) -> &StatDefinition {
        &self.stat
    }

    fn return_bands(&self, runs: &[LoadedRun]) -> Result<Vec<StatTable>> {
        let mut headers = vec!["algorithm".to_string(), "env".to_string(), "frames".to_string()];
        headers.extend(self.stat.percentiles.iter().map(|q| format!("p{}", q)));
        let mut bands = StatTable {
            file_name: format!("{}.csv", self.stat.name),
            headers,
            rows: Vec::new(),
        };
        let mut reach = StatTable {
            file_name: format!("{}-reach.csv", self.stat.name),
            headers: vec![
                "algorithm".to_string(),
                "env".to_string(),
                "return_to_reach".to_string(),
                "frames".to_string(),
            ],
            rows: Vec::new(),
        };

        for run in runs {
            let returns = extract_and_smooth(&run.tables, RETURN_PREFIX, self.options.window)?;
            let aggregated = percentile_aggregate(&returns, &self.stat.percentiles);
            let medians = median_aggregate(&returns);

            for env in &returns.envs {
                let short = shorten_env_name(&env.env);
                let series: Vec<&AggregatedSeries> =
                    aggregated.iter().filter(|a| a.env == env.env).collect();
                let len = series
                    .iter()
                    .map(|s| s.values.len())
                    .min()
                    .unwrap_or(0)
                    .min(returns.frames.len());

                for t in 0..len {
                    let mut row = vec![
                        run.label.clone(),
                        short.to_string(),
                        format_value(returns.frames[t]),
                    ];
                    row.extend(series.iter().map(|s| format_value(s.values[t])));
                    bands.rows.push(row);
                }

                let reached = medians
                    .iter()
                    .find(|m| m.env == env.env)
                    .and_then(|m| frames_to_reach(&returns.frames, &m.values, self.options.return_to_reach));
                reach.rows.push(vec![
                    run.label.clone(),
                    short.to_string(),
                    self.options.return_to_reach.to_string(),
                    reached.map(format_value).unwrap_or_default(),
                ]);
            }
        }

        Ok(vec![bands, reach])
    }

    fn return_proba(&self, runs: &[LoadedRun]) -> Result<Vec<StatTable>> {
        let run = runs.first().ok_or_else(|| {
            CurriculumError::processing(format!("'{}' has no run to aggregate", self.stat.name))
        })?;

        let returns = extract_and_smooth(&run.tables, RETURN_PREFIX, self.options.window)?;
        let probas = extract_and_smooth(&run.tables, PROBA_PREFIX, self.options.window)?;
        let median_returns = median_aggregate(&returns);
        let median_probas = median_aggregate(&probas);

        let mut table = StatTable {
            file_name: format!("{}.csv", self.stat.name),
            headers: vec![
                "env".to_string(),
                "frames".to_string(),
                "return".to_string(),
                "proba".to_string(),
            ],
            rows: Vec::new(),
        };

        for ret in &median_returns {
            let proba = median_probas.iter().find(|p| p.env == ret.env);
            let short = shorten_env_name(&ret.env);
            for (t, value) in ret.values.iter().enumerate().take(returns.frames.len()) {
                let p = proba
                    .and_then(|p| p.values.get(t).copied())
                    .unwrap_or(f64::NAN);
                table.rows.push(vec![
                    short.to_string(),
                    format_value(returns.frames[t]),
                    format_value(*value),
                    format_value(p),
                ]);
            }
        }

        Ok(vec![table])
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for StatsPipeline<S> {
    type Extracted = Vec<LoadedRun>;
    type Transformed = Vec<StatTable>;

    async fn extract(&self) -> Result<Vec<LoadedRun>> {
        tracing::info!("> {}", self.stat.name);

        let mut runs = Vec::with_capacity(self.stat.runs.len());
        for spec in &self.stat.runs {
            let folder = self.models_dir.join(&spec.folder);
            let mut tables = load_and_clean_logs(&folder, self.stat.max_frame)?;

            if let Some([start, end]) = spec.slice {
                let end = end.min(tables.len());
                if start >= end {
                    return Err(CurriculumError::processing(format!(
                        "run '{}' selects logs [{}, {}) but only {} were found in {}",
                        spec.label,
                        start,
                        end,
                        tables.len(),
                        folder.display()
                    )));
                }
                tables = tables.drain(start..end).collect();
            }

            tracing::debug!("{}: {} logs of {} rows", spec.label, tables.len(), tables[0].len());
            runs.push(LoadedRun {
                label: spec.label.clone(),
                tables,
            });
        }
        Ok(runs)
    }

    async fn transform(&self, runs: Vec<LoadedRun>) -> Result<Vec<StatTable>> {
        match self.stat.kind {
            StatKind::ReturnBands => self.return_bands(&runs),
            StatKind::ReturnProba => self.return_proba(&runs),
        }
    }

    async fn load(&self, tables: Vec<StatTable>) -> Result<String> {
        let mut written = Vec::with_capacity(tables.len());
        for table in &tables {
            let csv = table.to_csv()?;
            self.storage.write_file(&table.file_name, csv.as_bytes()).await?;
            tracing::debug!("Wrote {} rows to {}", table.rows.len(), table.file_name);
            written.push(table.file_name.clone());
        }
        Ok(written.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::stats_config::RunSpec;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::{fs, path::Path};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn get(&self, path: &str) -> Option<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|d| String::from_utf8(d.clone()).unwrap())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| CurriculumError::processing(format!("missing {}", path)))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn write_log(dir: &Path, rows: &[(u64, &str, &str)]) {
        fs::create_dir_all(dir).unwrap();
        let mut content = String::from(
            "update,frames,duration,return/MiniGrid-Unlock-v0,proba/MiniGrid-Unlock-v0\n",
        );
        for (i, (frames, ret, proba)) in rows.iter().enumerate() {
            content.push_str(&format!("{},{},1.0,{},{}\n", i + 1, frames, ret, proba));
        }
        fs::write(dir.join("log.csv"), content).unwrap();
    }

    fn stat(kind: StatKind, runs: Vec<RunSpec>) -> StatDefinition {
        StatDefinition {
            name: "Test".to_string(),
            description: None,
            kind,
            max_frame: None,
            percentiles: vec![25.0, 50.0, 75.0],
            runs,
        }
    }

    fn run(label: &str, folder: &str) -> RunSpec {
        RunSpec {
            label: label.to_string(),
            folder: folder.to_string(),
            slice: None,
        }
    }

    #[tokio::test]
    async fn test_return_bands_tables() {
        let dir = TempDir::new().unwrap();
        write_log(
            &dir.path().join("alg/seed1"),
            &[(100, "0", "1"), (200, "1", "1")],
        );
        write_log(
            &dir.path().join("alg/seed2"),
            &[(100, "0", "1"), (200, "", "1")],
        );

        let storage = MockStorage::default();
        let pipeline = StatsPipeline::new(
            storage.clone(),
            dir.path(),
            stat(StatKind::ReturnBands, vec![run("Alg", "alg")]),
            StatsOptions {
                window: 1,
                return_to_reach: 0.5,
            },
        );

        let runs = pipeline.extract().await.unwrap();
        assert_eq!(runs[0].tables.len(), 2);
        let tables = pipeline.transform(runs).await.unwrap();
        let written = pipeline.load(tables).await.unwrap();
        assert_eq!(written, "Test.csv, Test-reach.csv");

        let bands = storage.get("Test.csv").unwrap();
        let lines: Vec<&str> = bands.lines().collect();
        assert_eq!(lines[0], "algorithm,env,frames,p25,p50,p75");
        assert_eq!(lines[1], "Alg,Unlock,100,0,0,0");
        // seed2 is forward-filled to 0 at t=1
        assert_eq!(lines[2], "Alg,Unlock,200,0.25,0.5,0.75");

        let reach = storage.get("Test-reach.csv").unwrap();
        assert_eq!(reach.lines().nth(1), Some("Alg,Unlock,0.5,200"));
    }

    #[tokio::test]
    async fn test_return_proba_with_slice() {
        let dir = TempDir::new().unwrap();
        for seed in 1..=3 {
            let ret = seed.to_string();
            write_log(
                &dir.path().join(format!("alg/seed{}", seed)),
                &[(10, ret.as_str(), "0.5")],
            );
        }

        let mut spec = run("Alg", "alg");
        spec.slice = Some([1, 2]);
        let storage = MockStorage::default();
        let pipeline = StatsPipeline::new(
            storage.clone(),
            dir.path(),
            stat(StatKind::ReturnProba, vec![spec]),
            StatsOptions::default(),
        );

        let runs = pipeline.extract().await.unwrap();
        assert_eq!(runs[0].tables.len(), 1);
        let tables = pipeline.transform(runs).await.unwrap();
        pipeline.load(tables).await.unwrap();

        let csv = storage.get("Test.csv").unwrap();
        assert_eq!(csv, "env,frames,return,proba\nUnlock,10,2,0.5\n");
    }

    #[tokio::test]
    async fn test_missing_folder_fails_extract() {
        let dir = TempDir::new().unwrap();
        let pipeline = StatsPipeline::new(
            MockStorage::default(),
            dir.path(),
            stat(StatKind::ReturnBands, vec![run("Alg", "missing")]),
            StatsOptions::default(),
        );
        assert!(pipeline.extract().await.is_err());
    }
}
