use crate::utils::error::{CurriculumError, Result};
use crate::utils::validation::{validate_model_name, validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_STATS: &str = include_str!("../../exps/stats.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    pub stats: Vec<StatDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatKind {
    /// Percentile bands of the smoothed return, one group per algorithm.
    ReturnBands,
    /// Median return next to the median sampling probability of a single algorithm.
    ReturnProba,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatDefinition {
    pub name: String,
    pub description: Option<String>,
    pub kind: StatKind,
    pub max_frame: Option<f64>,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    pub runs: Vec<RunSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub label: String,
    /// Model folder relative to the models directory.
    pub folder: String,
    /// `[start, end)` selection among the logs found in the folder.
    pub slice: Option<[usize; 2]>,
}

fn default_percentiles() -> Vec<f64> {
    vec![25.0, 50.0, 75.0]
}

impl StatsConfig {
    /// The statistics shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_STATS)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn get(&self, name: &str) -> Option<&StatDefinition> {
        self.stats.iter().find(|s| s.name == name)
    }

    /// Either the named statistic or every statistic.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&StatDefinition>> {
        match name {
            None => Ok(self.stats.iter().collect()),
            Some(name) => self
                .get(name)
                .map(|s| vec![s])
                .ok_or_else(|| CurriculumError::InvalidConfigValueError {
                    field: "stat".to_string(),
                    value: name.to_string(),
                    reason: format!(
                        "Unknown statistic. Known: {}",
                        self.stats
                            .iter()
                            .map(|s| s.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }),
        }
    }
}

impl Validate for StatsConfig {
    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for stat in &self.stats {
            stat.validate()?;
            if !names.insert(stat.name.as_str()) {
                return Err(CurriculumError::config(format!(
                    "statistic '{}' is defined twice",
                    stat.name
                )));
            }
        }
        Ok(())
    }
}

impl Validate for StatDefinition {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("stats.name", &self.name)?;
        if self.runs.is_empty() {
            return Err(CurriculumError::MissingConfigError {
                field: format!("stats.{}.runs", self.name),
            });
        }
        if self.kind == StatKind::ReturnProba && self.runs.len() != 1 {
            return Err(CurriculumError::config(format!(
                "'{}' is a return-proba statistic and takes exactly one run",
                self.name
            )));
        }
        if self.percentiles.iter().any(|q| !(0.0..=100.0).contains(q)) {
            return Err(CurriculumError::config(format!(
                "'{}' has a percentile outside [0, 100]",
                self.name
            )));
        }
        for run in &self.runs {
            validate_model_name("stats.runs.folder", &run.folder)?;
            if let Some([start, end]) = run.slice {
                if start >= end {
                    return Err(CurriculumError::config(format!(
                        "'{}' run '{}' has an empty slice [{}, {})",
                        self.name, run.label, start, end
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogue() {
        let config = StatsConfig::builtin().unwrap();
        assert_eq!(config.stats.len(), 11);

        let bup = config.get("BUP-ReturnProba-GPropLinreg").unwrap();
        assert_eq!(bup.kind, StatKind::ReturnProba);
        assert_eq!(bup.runs[0].slice, Some([6, 7]));
        assert_eq!(bup.max_frame, Some(3_300_000.0));

        let kc = config.get("KC-Return-MR-coef").unwrap();
        assert_eq!(kc.runs.len(), 3);
        assert_eq!(kc.percentiles, vec![25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_select_unknown_stat() {
        let config = StatsConfig::builtin().unwrap();
        assert_eq!(config.select(None).unwrap().len(), 11);
        assert!(config.select(Some("Nope")).is_err());
    }

    #[test]
    fn test_return_proba_needs_single_run() {
        let toml = r#"
[[stats]]
name = "bad"
kind = "return-proba"
runs = [
    { label = "a", folder = "x" },
    { label = "b", folder = "y" },
]
"#;
        assert!(StatsConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let toml = r#"
[[stats]]
name = "same"
kind = "return-bands"
runs = [{ label = "a", folder = "x" }]

[[stats]]
name = "same"
kind = "return-bands"
runs = [{ label = "a", folder = "x" }]
"#;
        assert!(StatsConfig::from_toml_str(toml).is_err());
    }
}
