use crate::core::attention::{AttentionComputer, AttentionMode, MasteringRates};
use crate::core::curriculum::Curriculum;
use crate::core::dist::{Boltzmann, DistKind, GreedyAmax, GreedyProp};
use crate::core::lp::{LinregLp, OnlineLp, ReturnHistory, WindowLp};
use crate::domain::ports::{DistComputer, LpComputer};
use crate::utils::error::{CurriculumError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LpKind {
    Online,
    Window,
    #[default]
    Linreg,
}

impl FromStr for LpKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Online" => Ok(Self::Online),
            "Window" => Ok(Self::Window),
            "Linreg" => Ok(Self::Linreg),
            other => Err(format!(
                "unknown learning progress computer '{}' (Online, Window, Linreg)",
                other
            )),
        }
    }
}

impl fmt::Display for LpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Online => "Online",
            Self::Window => "Window",
            Self::Linreg => "Linreg",
        };
        write!(f, "{}", name)
    }
}

/// Hyper-parameters of a curriculum teacher, as found in grid and project files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeacherConfig {
    pub lp_cp: LpKind,
    pub dist_cp: AttentionMode,
    pub dist_cr: DistKind,
    pub rt_hist: ReturnHistory,
    #[serde(rename = "K")]
    pub k: usize,
    pub eps: f64,
    pub pot_coef: f64,
    pub alpha: f64,
    pub tau: f64,
}

impl Default for TeacherConfig {
    fn default() -> Self {
        Self {
            lp_cp: LpKind::Linreg,
            dist_cp: AttentionMode::Lp,
            dist_cr: DistKind::GreedyProp,
            rt_hist: ReturnHistory::Normal,
            k: 20,
            eps: 0.2,
            pot_coef: 0.0,
            alpha: 0.1,
            tau: 1.0,
        }
    }
}

impl Validate for TeacherConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("teacher.K", self.k, 2)?;
        validate_range("teacher.eps", self.eps, 0.0, 1.0)?;
        validate_range("teacher.alpha", self.alpha, 0.0, 1.0)?;
        validate_range("teacher.pot_coef", self.pot_coef, 0.0, f64::MAX)?;
        if !(self.tau > 0.0) {
            return Err(CurriculumError::InvalidConfigValueError {
                field: "teacher.tau".to_string(),
                value: self.tau.to_string(),
                reason: "Temperature must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Chooses which environment of a curriculum the student should practice next.
pub struct CurriculumTeacher {
    lp: Box<dyn LpComputer>,
    mastering: MasteringRates,
    attention: AttentionComputer,
    dist: Box<dyn DistComputer>,
    distrib: Vec<f64>,
}

impl CurriculumTeacher {
    pub fn new(config: &TeacherConfig, curriculum: &Curriculum) -> Result<Self> {
        config.validate()?;
        let n = curriculum.num_envs();

        let lp: Box<dyn LpComputer> = match config.lp_cp {
            LpKind::Online => Box::new(OnlineLp::new(n, config.alpha)),
            LpKind::Window => Box::new(WindowLp::new(n, config.k, config.rt_hist)),
            LpKind::Linreg => Box::new(LinregLp::new(n, config.k, config.rt_hist)),
        };
        let dist: Box<dyn DistComputer> = match config.dist_cr {
            DistKind::GreedyAmax => Box::new(GreedyAmax { eps: config.eps }),
            DistKind::GreedyProp => Box::new(GreedyProp { eps: config.eps }),
            DistKind::Boltzmann => Box::new(Boltzmann { tau: config.tau }),
        };

        tracing::debug!(
            "Teacher for {}: lp={} attention={} dist={} K={}",
            curriculum.name,
            config.lp_cp,
            config.dist_cp,
            config.dist_cr,
            config.k
        );

        Ok(Self {
            lp,
            mastering: MasteringRates::new(n, config.k),
            attention: AttentionComputer::new(config.dist_cp, config.pot_coef, curriculum)?,
            dist,
            distrib: vec![1.0 / n as f64; n],
        })
    }

    pub fn num_envs(&self) -> usize {
        self.distrib.len()
    }

    pub fn distribution(&self) -> &[f64] {
        &self.distrib
    }

    /// Feeds the return of a finished episode and recomputes the distribution.
    pub fn update(&mut self, env_id: usize, returnn: f64) -> Result<&[f64]> {
        if env_id >= self.num_envs() {
            return Err(CurriculumError::ValidationError {
                message: format!(
                    "environment index {} out of range ({} environments)",
                    env_id,
                    self.num_envs()
                ),
            });
        }
        if !returnn.is_finite() {
            return Err(CurriculumError::ValidationError {
                message: format!("episode return must be finite, got {}", returnn),
            });
        }

        self.mastering.record(env_id, returnn);
        let lps = self.lp.update(env_id, returnn).to_vec();
        let attention = self.attention.compute(&lps, &self.mastering.rates());
        self.distrib = self.dist.compute(&attention);
        Ok(&self.distrib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml_names() {
        let config: TeacherConfig = toml::from_str(
            r#"
lp_cp = "Window"
dist_cp = "LpPotRr"
dist_cr = "GreedyAmax"
rt_hist = "Gaussian"
K = 10
eps = 0.1
pot_coef = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.lp_cp, LpKind::Window);
        assert_eq!(config.dist_cp, AttentionMode::LpPotRr);
        assert_eq!(config.dist_cr, DistKind::GreedyAmax);
        assert_eq!(config.rt_hist, ReturnHistory::Gaussian);
        assert_eq!(config.k, 10);
        assert_eq!(config.tau, 1.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let c = Curriculum::by_name("KeyCorridor").unwrap();
        let config = TeacherConfig {
            eps: 1.5,
            ..TeacherConfig::default()
        };
        assert!(CurriculumTeacher::new(&config, &c).is_err());

        let config = TeacherConfig {
            k: 1,
            ..TeacherConfig::default()
        };
        assert!(CurriculumTeacher::new(&config, &c).is_err());
    }

    #[test]
    fn test_teacher_favours_progressing_env() {
        let c = Curriculum::by_name("BlockedUnlockPickup").unwrap();
        let config = TeacherConfig {
            eps: 0.0,
            ..TeacherConfig::default()
        };
        let mut teacher = CurriculumTeacher::new(&config, &c).unwrap();
        assert_eq!(teacher.distribution(), &[1.0 / 3.0; 3]);

        for i in 0..10 {
            teacher.update(1, i as f64 * 0.1).unwrap();
            teacher.update(0, 0.5).unwrap();
        }
        let d = teacher.distribution();
        assert!(d[1] > 0.99);
        assert!((d.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_rejects_bad_input() {
        let c = Curriculum::by_name("BlockedUnlockPickup").unwrap();
        let mut teacher = CurriculumTeacher::new(&TeacherConfig::default(), &c).unwrap();
        assert!(teacher.update(3, 1.0).is_err());
        assert!(teacher.update(0, f64::NAN).is_err());
    }
}
