use crate::domain::model::{Observation, PreprocessedObss};
use crate::utils::error::{CurriculumError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const VOCAB_FILE_NAME: &str = "vocab.json";
pub const VOCAB_MAX_SIZE: usize = 100;
/// 7x7 egocentric view, 3 channels.
pub const IMAGE_SIZE: usize = 147;

pub fn vocab_path(run_dir: &Path) -> PathBuf {
    run_dir.join(VOCAB_FILE_NAME)
}

/// Token to id mapping with a fixed capacity, stored next to the model.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    path: PathBuf,
    max_size: usize,
    tokens: HashMap<String, i64>,
}

impl Vocabulary {
    /// Loads `<run_dir>/vocab.json`, or starts empty when the file does not exist yet.
    pub fn load(run_dir: &Path) -> Result<Self> {
        let path = vocab_path(run_dir);
        let tokens = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        tracing::debug!("Loaded {} vocabulary tokens from {}", tokens.len(), path.display());
        Ok(Self {
            path,
            max_size: VOCAB_MAX_SIZE,
            tokens,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<i64> {
        self.tokens.get(token).copied()
    }

    /// Id of `token`, assigning the next free id (starting at 1) to unseen tokens.
    pub fn get_or_insert(&mut self, token: &str) -> Result<i64> {
        if let Some(id) = self.tokens.get(token) {
            return Ok(*id);
        }
        if self.tokens.len() >= self.max_size {
            return Err(CurriculumError::VocabularyFull {
                max_size: self.max_size,
            });
        }
        let id = self.tokens.len() as i64 + 1;
        self.tokens.insert(token.to_string(), id);
        Ok(id)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(&self.tokens)?)?;
        Ok(())
    }
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]+").expect("static regex"))
}

/// Converts raw observations into model inputs.
pub struct ObssPreprocessor {
    vocab: Vocabulary,
}

impl ObssPreprocessor {
    pub fn new(run_dir: &Path) -> Result<Self> {
        Ok(Self {
            vocab: Vocabulary::load(run_dir)?,
        })
    }

    /// Images become `f32` rows; missions become id rows padded with 0 to the longest one.
    pub fn preprocess(&mut self, obss: &[Observation]) -> Result<PreprocessedObss> {
        let mut images = Vec::with_capacity(obss.len());
        let mut instrs = Vec::with_capacity(obss.len());

        for obs in obss {
            if obs.image.len() != IMAGE_SIZE {
                return Err(CurriculumError::ValidationError {
                    message: format!(
                        "observation image has {} values, expected {}",
                        obs.image.len(),
                        IMAGE_SIZE
                    ),
                });
            }
            images.push(obs.image.iter().map(|&v| f32::from(v)).collect());

            let mission = obs.mission.to_lowercase();
            let instr = token_regex()
                .find_iter(&mission)
                .map(|m| self.vocab.get_or_insert(m.as_str()))
                .collect::<Result<Vec<i64>>>()?;
            instrs.push(instr);
        }

        let max_len = instrs.iter().map(Vec::len).max().unwrap_or(0);
        for instr in &mut instrs {
            instr.resize(max_len, 0);
        }

        Ok(PreprocessedObss { images, instrs })
    }
}

pub fn reshape_reward(reward: f64) -> f64 {
    20.0 * reward
}
