use crate::config::toml_config::substitute_env_vars;
use crate::core::attention::AttentionMode;
use crate::core::dist::DistKind;
use crate::core::lp::ReturnHistory;
use crate::core::teacher::LpKind;
use crate::utils::error::{CurriculumError, Result};
use crate::utils::validation::{
    validate_env_substituted, validate_non_empty_string, validate_positive_number, validate_range,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Hyper-parameter grid of training jobs, one job per combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub grid: GridAxes,
    #[serde(default)]
    pub launch: LaunchConfig,
    pub slurm: Option<SlurmConfig>,
    /// Extra training flags per curriculum (e.g. `--no-instr`).
    #[serde(default)]
    pub extra_args: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridAxes {
    pub seeds: Vec<u64>,
    pub curriculums: Vec<String>,
    pub rt_hists: Vec<ReturnHistory>,
    pub dist_cps: Vec<AttentionMode>,
    pub lp_cps: Vec<LpKind>,
    pub dist_crs: Vec<DistKind>,
    pub ks: Vec<usize>,
    pub epsilons: Vec<f64>,
    pub pot_coefs: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Script wrapping the training command, run before the interpreter.
    pub wrapper: Option<String>,
    pub python: String,
    pub module: String,
    pub save_interval: u32,
    /// Pause between two launches.
    pub delay_ms: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            wrapper: Some("exps/run.sh".to_string()),
            python: "python".to_string(),
            module: "scripts.train".to_string(),
            save_interval: 10,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlurmConfig {
    pub account: String,
    #[serde(default = "default_cpus")]
    pub cpus_per_task: u32,
    #[serde(default = "default_gpus")]
    pub gpus: u32,
    #[serde(default = "default_mem")]
    pub mem: String,
    /// Wall time per curriculum, `H:M:S`.
    pub times: HashMap<String, String>,
}

fn default_cpus() -> u32 {
    4
}

fn default_gpus() -> u32 {
    1
}

fn default_mem() -> String {
    "4G".to_string()
}

impl GridConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(&substitute_env_vars(content))?)
    }

    pub fn num_jobs(&self) -> usize {
        let g = &self.grid;
        g.seeds.len()
            * g.curriculums.len()
            * g.rt_hists.len()
            * g.dist_cps.len()
            * g.lp_cps.len()
            * g.dist_crs.len()
            * g.ks.len()
            * g.epsilons.len()
            * g.pot_coefs.len()
    }
}

impl Validate for GridConfig {
    fn validate(&self) -> Result<()> {
        let g = &self.grid;
        let axes = [
            ("grid.seeds", g.seeds.len()),
            ("grid.curriculums", g.curriculums.len()),
            ("grid.rt_hists", g.rt_hists.len()),
            ("grid.dist_cps", g.dist_cps.len()),
            ("grid.lp_cps", g.lp_cps.len()),
            ("grid.dist_crs", g.dist_crs.len()),
            ("grid.ks", g.ks.len()),
            ("grid.epsilons", g.epsilons.len()),
            ("grid.pot_coefs", g.pot_coefs.len()),
        ];
        for (field, len) in axes {
            if len == 0 {
                return Err(CurriculumError::MissingConfigError {
                    field: field.to_string(),
                });
            }
        }

        for curriculum in &g.curriculums {
            validate_non_empty_string("grid.curriculums", curriculum)?;
        }
        for &k in &g.ks {
            validate_positive_number("grid.ks", k, 2)?;
        }
        for &eps in &g.epsilons {
            validate_range("grid.epsilons", eps, 0.0, 1.0)?;
        }
        for &pot in &g.pot_coefs {
            validate_range("grid.pot_coefs", pot, 0.0, f64::MAX)?;
        }

        validate_non_empty_string("launch.python", &self.launch.python)?;
        validate_non_empty_string("launch.module", &self.launch.module)?;
        validate_env_substituted("launch.python", &self.launch.python)?;
        validate_env_substituted("launch.module", &self.launch.module)?;
        if let Some(wrapper) = &self.launch.wrapper {
            validate_env_substituted("launch.wrapper", wrapper)?;
        }
        for (curriculum, args) in &self.extra_args {
            validate_env_substituted(&format!("extra_args.{}", curriculum), args)?;
        }

        if let Some(slurm) = &self.slurm {
            validate_non_empty_string("slurm.account", &slurm.account)?;
            validate_env_substituted("slurm.account", &slurm.account)?;
            validate_env_substituted("slurm.mem", &slurm.mem)?;
            for (curriculum, time) in &slurm.times {
                validate_env_substituted(&format!("slurm.times.{}", curriculum), time)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = r#"
[grid]
seeds = [1, 2]
curriculums = ["BabyAI-KeyCorridor"]
rt_hists = ["Gaussian"]
dist_cps = ["LpPot", "LpPotRr"]
lp_cps = ["Linreg"]
dist_crs = ["GreedyProp"]
ks = [20]
epsilons = [0.2]
pot_coefs = [0, 0.001]

[slurm]
account = "def-lab"
times = { "BabyAI-KeyCorridor" = "2:0:0" }

[extra_args]
"BabyAI-KeyCorridor" = "--no-instr"
"#;

    #[test]
    fn test_parse_grid() {
        let config = GridConfig::from_toml_str(GRID).unwrap();
        assert_eq!(config.num_jobs(), 8);
        assert_eq!(config.grid.dist_cps[1], AttentionMode::LpPotRr);
        assert_eq!(config.launch.save_interval, 10);
        let slurm = config.slurm.as_ref().unwrap();
        assert_eq!(slurm.cpus_per_task, 4);
        assert_eq!(slurm.mem, "4G");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_axis_is_rejected() {
        let config = GridConfig::from_toml_str(&GRID.replace("seeds = [1, 2]", "seeds = []")).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unset_account_variable_is_rejected() {
        let grid = GRID.replace("\"def-lab\"", "\"${AUTO_CURRICULUM_UNSET_ACCOUNT}\"");
        let config = GridConfig::from_toml_str(&grid).unwrap();
        assert_eq!(config.slurm.as_ref().unwrap().account, "${AUTO_CURRICULUM_UNSET_ACCOUNT}");

        let err = config.validate().unwrap_err();
        assert!(matches!(err, CurriculumError::ConfigError { .. }));
        assert!(err.to_string().contains("AUTO_CURRICULUM_UNSET_ACCOUNT"));
    }

    #[test]
    fn test_unknown_algorithm_name_fails_parsing() {
        assert!(GridConfig::from_toml_str(&GRID.replace("\"Linreg\"", "\"Linear\"")).is_err());
    }
}
