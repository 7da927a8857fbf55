//! Teacher runs against a synthetic student, producing a regular `log.csv`.

use crate::core::curriculum::Curriculum;
use crate::core::menv::{BoxedEnv, MultiEnv};
use crate::core::teacher::{CurriculumTeacher, TeacherConfig};
use crate::core::training_log::TrainingLogWriter;
use crate::core::{ConfigProvider, Environment, Step};
use crate::utils::error::{CurriculumError, Result};
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation::{validate_model_name, validate_positive_number, validate_range, Validate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub curriculum: String,
    pub model: String,
    pub num_updates: u64,
    pub episodes_per_update: usize,
    pub frames_per_episode: u64,
    pub learning_rate: f64,
    pub seed: u64,
    pub teacher: TeacherConfig,
}

impl Validate for SimulationConfig {
    fn validate(&self) -> Result<()> {
        validate_model_name("model", &self.model)?;
        validate_positive_number("num-updates", self.num_updates as usize, 1)?;
        validate_positive_number("episodes-per-update", self.episodes_per_update, 1)?;
        validate_range("learning-rate", self.learning_rate, 0.0, 1.0)?;
        self.teacher.validate()
    }
}

/// Skill of the student on every environment, shared by the synthetic environments.
pub type SharedSkills = Arc<Mutex<Vec<f64>>>;

/// One-step episodes rewarded 1 with probability equal to the student's skill.
///
/// Practicing raises the skill by `lr * readiness * (1 - skill)`, readiness
/// being the lowest skill among the prerequisites.
pub struct SyntheticEnv {
    id: String,
    index: usize,
    predecessors: Vec<usize>,
    skills: SharedSkills,
    learning_rate: f64,
    rng: ChaCha8Rng,
}

impl SyntheticEnv {
    pub fn new(
        curriculum: &Curriculum,
        index: usize,
        skills: SharedSkills,
        learning_rate: f64,
        seed: u64,
    ) -> Self {
        Self {
            id: curriculum.envs()[index].clone(),
            index,
            predecessors: curriculum.predecessors(index),
            skills,
            learning_rate,
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64)),
        }
    }
}

impl Environment for SyntheticEnv {
    type Observation = usize;

    fn id(&self) -> &str {
        &self.id
    }

    fn reset(&mut self) -> Result<usize> {
        Ok(self.index)
    }

    fn step(&mut self, _action: usize) -> Result<Step<usize>> {
        let mut skills = self
            .skills
            .lock()
            .map_err(|_| CurriculumError::processing("skill table lock poisoned"))?;

        let skill = skills[self.index];
        let reward = if self.rng.gen::<f64>() < skill { 1.0 } else { 0.0 };

        let readiness = self
            .predecessors
            .iter()
            .map(|&p| skills[p])
            .fold(1.0, f64::min);
        skills[self.index] = skill + self.learning_rate * readiness * (1.0 - skill);

        Ok(Step {
            obs: self.index,
            reward,
            done: true,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub log_path: PathBuf,
    pub updates: u64,
    pub frames: u64,
    pub final_skills: Vec<f64>,
    pub final_distribution: Vec<f64>,
}

pub fn run_simulation(
    config: &SimulationConfig,
    provider: &dyn ConfigProvider,
    monitor: &SystemMonitor,
) -> Result<SimulationSummary> {
    config.validate()?;
    let curriculum = Curriculum::by_name(&config.curriculum)?;
    let n = curriculum.num_envs();

    // 起點: 沒有先修的環境從 0.1 開始
    let skills: SharedSkills = Arc::new(Mutex::new(
        (0..n)
            .map(|i| if curriculum.predecessors(i).is_empty() { 0.1 } else { 0.0 })
            .collect(),
    ));
    let envs: Vec<BoxedEnv<usize>> = (0..n)
        .map(|i| {
            Box::new(SyntheticEnv::new(
                &curriculum,
                i,
                Arc::clone(&skills),
                config.learning_rate,
                config.seed,
            )) as BoxedEnv<usize>
        })
        .collect();

    let teacher = CurriculumTeacher::new(&config.teacher, &curriculum)?;
    let mut menv = MultiEnv::new(envs, Some(teacher), config.seed)?;

    let model_dir = provider.model_dir(&config.model);
    let mut writer = TrainingLogWriter::create(&model_dir, &menv.env_names())?;
    tracing::info!(
        "Simulating {} updates on {} ({} environments) into {}",
        config.num_updates,
        curriculum.name,
        n,
        writer.path().display()
    );

    let start = Instant::now();
    let mut frames = 0u64;
    let report_every = (config.num_updates / 10).max(1);
    menv.reset()?;

    for update in 1..=config.num_updates {
        for _ in 0..config.episodes_per_update {
            let step = menv.step(0)?;
            if step.done {
                menv.reset()?;
            }
            frames += config.frames_per_episode;
        }

        let row = menv.drain_log_row();
        writer.write_row(update, frames, start.elapsed().as_secs_f64(), &row)?;

        if update % report_every == 0 {
            tracing::debug!("U {} | F {:06} | D {:?}", update, frames, menv.distribution());
            monitor.log_stats(&format!("Update {}", update));
        }
    }
    writer.flush()?;

    let final_skills = skills
        .lock()
        .map_err(|_| CurriculumError::processing("skill table lock poisoned"))?
        .clone();

    Ok(SimulationSummary {
        log_path: writer.path().to_path_buf(),
        updates: config.num_updates,
        frames,
        final_skills,
        final_distribution: menv.distribution().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::ProjectConfig;
    use crate::core::attention::AttentionMode;
    use crate::core::stats::read_log_table;
    use tempfile::TempDir;

    fn config(curriculum: &str, model: &str) -> SimulationConfig {
        SimulationConfig {
            curriculum: curriculum.to_string(),
            model: model.to_string(),
            num_updates: 20,
            episodes_per_update: 8,
            frames_per_episode: 100,
            learning_rate: 0.05,
            seed: 1,
            teacher: TeacherConfig::default(),
        }
    }

    #[test]
    fn test_skill_growth_is_gated_by_prerequisites() {
        let curriculum = Curriculum::by_name("BlockedUnlockPickup").unwrap();
        let skills: SharedSkills = Arc::new(Mutex::new(vec![0.0, 0.0, 0.0]));
        let mut second = SyntheticEnv::new(&curriculum, 1, Arc::clone(&skills), 0.5, 0);

        let step = second.step(0).unwrap();
        assert_eq!(step.reward, 0.0);
        assert_eq!(skills.lock().unwrap()[1], 0.0);

        skills.lock().unwrap()[0] = 1.0;
        second.step(0).unwrap();
        assert!((skills.lock().unwrap()[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_simulation_writes_training_log() {
        let dir = TempDir::new().unwrap();
        let mut project = ProjectConfig::default();
        project.storage.root = dir.path().to_string_lossy().into_owned();

        let mut cfg = config("KeyCorridor", "sim/seed1");
        cfg.teacher.dist_cp = AttentionMode::LpPotRr;
        cfg.teacher.pot_coef = 0.5;
        let summary = run_simulation(&cfg, &project, &SystemMonitor::new(false)).unwrap();

        assert_eq!(summary.frames, 20 * 8 * 100);
        assert_eq!(summary.final_skills.len(), 6);
        assert!((summary.final_distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let table = read_log_table(&summary.log_path).unwrap();
        assert_eq!(table.len(), 20);
        assert_eq!(table.column("frames").unwrap()[19], 16000.0);
        assert_eq!(table.columns_with_prefix("proba/").count(), 6);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let project = ProjectConfig::default();
        let mut cfg = config("KeyCorridor", "sim");
        cfg.episodes_per_update = 0;
        assert!(run_simulation(&cfg, &project, &SystemMonitor::new(false)).is_err());

        let cfg = config("NoSuchCurriculum", "sim");
        assert!(run_simulation(&cfg, &project, &SystemMonitor::new(false)).is_err());
    }
}
