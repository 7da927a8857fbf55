use crate::core::teacher::CurriculumTeacher;
use crate::domain::model::{LogRow, Step};
use crate::domain::ports::Environment;
use crate::utils::error::{CurriculumError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub type BoxedEnv<O> = Box<dyn Environment<Observation = O>>;

/// Presents the environments of a curriculum as a single environment.
///
/// Each `reset` closes the running episode, reports its return to the
/// teacher and samples the environment of the next episode from the
/// teacher's distribution.
pub struct MultiEnv<O> {
    envs: Vec<BoxedEnv<O>>,
    teacher: Option<CurriculumTeacher>,
    distrib: Vec<f64>,
    env_id: usize,
    returnn: Option<f64>,
    rng: ChaCha8Rng,
    return_sums: Vec<f64>,
    return_counts: Vec<usize>,
}

impl<O> MultiEnv<O> {
    pub fn new(envs: Vec<BoxedEnv<O>>, teacher: Option<CurriculumTeacher>, seed: u64) -> Result<Self> {
        if envs.is_empty() {
            return Err(CurriculumError::config("a multi-environment needs at least one environment"));
        }
        let n = envs.len();
        if let Some(t) = &teacher {
            if t.num_envs() != n {
                return Err(CurriculumError::config(format!(
                    "teacher tracks {} environments but {} were given",
                    t.num_envs(),
                    n
                )));
            }
        }

        let distrib = match &teacher {
            Some(t) => t.distribution().to_vec(),
            None => vec![1.0 / n as f64; n],
        };

        Ok(Self {
            envs,
            teacher,
            distrib,
            env_id: 0,
            returnn: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            return_sums: vec![0.0; n],
            return_counts: vec![0; n],
        })
    }

    pub fn env_id(&self) -> usize {
        self.env_id
    }

    pub fn env_names(&self) -> Vec<String> {
        self.envs.iter().map(|e| e.id().to_string()).collect()
    }

    pub fn distribution(&self) -> &[f64] {
        &self.distrib
    }

    fn select_env(&mut self) {
        self.env_id = match WeightedIndex::new(&self.distrib) {
            Ok(index) => index.sample(&mut self.rng),
            Err(e) => {
                tracing::warn!("Invalid distribution {:?} ({}), sampling uniformly", self.distrib, e);
                self.rng.gen_range(0..self.envs.len())
            }
        };
    }

    /// Steps the environment selected by the last `reset`.
    pub fn step(&mut self, action: usize) -> Result<Step<O>> {
        let Some(returnn) = self.returnn.as_mut() else {
            return Err(CurriculumError::ValidationError {
                message: "multi-environment stepped before the first reset".to_string(),
            });
        };
        let step = self.envs[self.env_id].step(action)?;
        *returnn += step.reward;
        Ok(step)
    }

    pub fn reset(&mut self) -> Result<O> {
        if let Some(returnn) = self.returnn {
            if let Some(teacher) = self.teacher.as_mut() {
                self.distrib = teacher.update(self.env_id, returnn)?.to_vec();
            }
            self.return_sums[self.env_id] += returnn;
            self.return_counts[self.env_id] += 1;
        }

        self.returnn = Some(0.0);
        self.select_env();
        self.envs[self.env_id].reset()
    }

    /// Mean return per environment since the previous drain, with the current distribution.
    pub fn drain_log_row(&mut self) -> LogRow {
        let returns = self
            .return_sums
            .iter()
            .zip(&self.return_counts)
            .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect();
        self.return_sums.iter_mut().for_each(|s| *s = 0.0);
        self.return_counts.iter_mut().for_each(|c| *c = 0);

        LogRow {
            returns,
            probas: self.distrib.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::curriculum::Curriculum;
    use crate::core::teacher::TeacherConfig;

    struct FixedReward {
        id: String,
        reward: f64,
        resets: usize,
    }

    impl Environment for FixedReward {
        type Observation = usize;

        fn id(&self) -> &str {
            &self.id
        }

        fn reset(&mut self) -> Result<usize> {
            self.resets += 1;
            Ok(self.resets)
        }

        fn step(&mut self, _action: usize) -> Result<Step<usize>> {
            Ok(Step {
                obs: 0,
                reward: self.reward,
                done: true,
            })
        }
    }

    fn envs(curriculum: &Curriculum) -> Vec<BoxedEnv<usize>> {
        curriculum
            .envs()
            .iter()
            .enumerate()
            .map(|(i, id)| {
                Box::new(FixedReward {
                    id: id.clone(),
                    reward: i as f64,
                    resets: 0,
                }) as BoxedEnv<usize>
            })
            .collect()
    }

    #[test]
    fn test_empty_multi_env_is_rejected() {
        assert!(MultiEnv::<usize>::new(Vec::new(), None, 0).is_err());
    }

    #[test]
    fn test_step_before_reset_is_an_error() {
        let c = Curriculum::by_name("BlockedUnlockPickup").unwrap();
        let mut menv = MultiEnv::new(envs(&c), None, 0).unwrap();
        assert!(matches!(
            menv.step(0),
            Err(CurriculumError::ValidationError { .. })
        ));

        menv.reset().unwrap();
        assert!(menv.step(0).is_ok());
    }

    #[test]
    fn test_returns_are_logged_per_env() {
        let c = Curriculum::by_name("BlockedUnlockPickup").unwrap();
        let mut menv = MultiEnv::new(envs(&c), None, 7).unwrap();

        let mut played = vec![0usize; 3];
        menv.reset().unwrap();
        for _ in 0..30 {
            played[menv.env_id()] += 1;
            let step = menv.step(0).unwrap();
            assert!(step.done);
            menv.reset().unwrap();
        }

        let row = menv.drain_log_row();
        for (i, r) in row.returns.iter().enumerate() {
            if played[i] > 0 {
                assert_eq!(*r, Some(i as f64));
            } else {
                assert_eq!(*r, None);
            }
        }
        assert_eq!(row.probas, vec![1.0 / 3.0; 3]);

        let empty = menv.drain_log_row();
        assert!(empty.returns.iter().all(Option::is_none));
    }

    #[test]
    fn test_teacher_updates_distribution_on_reset() {
        let c = Curriculum::by_name("KeyCorridor").unwrap();
        let teacher = CurriculumTeacher::new(&TeacherConfig::default(), &c).unwrap();
        let mut menv = MultiEnv::new(envs(&c), Some(teacher), 3).unwrap();

        menv.reset().unwrap();
        for _ in 0..50 {
            menv.step(0).unwrap();
            menv.reset().unwrap();
        }
        let d = menv.distribution();
        assert_eq!(d.len(), 6);
        assert!((d.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_env_sequence() {
        let c = Curriculum::by_name("KeyCorridor").unwrap();
        let run = |seed| {
            let mut menv = MultiEnv::new(envs(&c), None, seed).unwrap();
            (0..20)
                .map(|_| {
                    menv.reset().unwrap();
                    menv.env_id()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }
}
