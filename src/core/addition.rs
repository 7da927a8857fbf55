use crate::core::curriculum::addition_env_id;
use crate::domain::model::Step;
use crate::domain::ports::Environment;
use crate::utils::error::{CurriculumError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub const PLUS_TOKEN: u8 = 10;
pub const EQUALS_TOKEN: u8 = 11;
/// Digits 0-9 plus the two separators.
pub const NUM_TOKENS: usize = 12;
/// Keeps every sum inside `u64`.
pub const MAX_NUM_LEN: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionProblem {
    pub lhs: u64,
    pub rhs: u64,
    pub num_len: usize,
}

impl AdditionProblem {
    pub fn new(lhs: u64, rhs: u64, num_len: usize) -> Result<Self> {
        if num_len == 0 || num_len > MAX_NUM_LEN {
            return Err(CurriculumError::InvalidConfigValueError {
                field: "num_len".to_string(),
                value: num_len.to_string(),
                reason: format!("must be between 1 and {}", MAX_NUM_LEN),
            });
        }
        let bound = 10u64.pow(num_len as u32);
        if lhs >= bound || rhs >= bound {
            return Err(CurriculumError::ValidationError {
                message: format!("{} + {} does not fit in {} digits", lhs, rhs, num_len),
            });
        }
        Ok(Self { lhs, rhs, num_len })
    }

    pub fn answer(&self) -> u64 {
        self.lhs + self.rhs
    }

    /// `lhs + rhs =` as tokens, each operand least-significant digit first.
    pub fn encode(&self) -> Vec<u8> {
        let mut tokens = digits_lsd_first(self.lhs, self.num_len);
        tokens.push(PLUS_TOKEN);
        tokens.extend(digits_lsd_first(self.rhs, self.num_len));
        tokens.push(EQUALS_TOKEN);
        tokens
    }

    /// The sum's digits, least-significant first, with room for the carry.
    pub fn answer_digits(&self) -> Vec<u8> {
        digits_lsd_first(self.answer(), self.num_len + 1)
    }
}

fn digits_lsd_first(mut value: u64, len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| {
            let digit = (value % 10) as u8;
            value /= 10;
            digit
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerScore {
    pub digit_accuracy: f64,
    pub exact: bool,
}

/// Compares predicted digits (least-significant first) with the expected sum.
pub fn score_answer(problem: &AdditionProblem, predicted: &[u8]) -> AnswerScore {
    let expected = problem.answer_digits();
    let correct = expected
        .iter()
        .enumerate()
        .filter(|(i, d)| predicted.get(*i) == Some(*d))
        .count();
    // 多出來的位數只能是 0
    let trailing_ok = predicted.iter().skip(expected.len()).all(|&d| d == 0);

    AnswerScore {
        digit_accuracy: correct as f64 / expected.len() as f64,
        exact: correct == expected.len() && trailing_ok,
    }
}

/// `Addition-<n>`: one question per episode, reward 1 for the exact sum.
pub struct AdditionEnv {
    id: String,
    num_len: usize,
    rng: ChaCha8Rng,
    problem: Option<AdditionProblem>,
}

impl AdditionEnv {
    pub fn new(num_len: usize, seed: u64) -> Result<Self> {
        // 驗證長度
        AdditionProblem::new(0, 0, num_len)?;
        Ok(Self {
            id: addition_env_id(num_len),
            num_len,
            rng: ChaCha8Rng::seed_from_u64(seed),
            problem: None,
        })
    }

    pub fn num_len(&self) -> usize {
        self.num_len
    }

    pub fn problem(&self) -> Option<&AdditionProblem> {
        self.problem.as_ref()
    }

    fn sample_operand(&mut self) -> u64 {
        let high = 10u64.pow(self.num_len as u32);
        let low = if self.num_len == 1 { 0 } else { high / 10 };
        self.rng.gen_range(low..high)
    }
}

impl Environment for AdditionEnv {
    type Observation = AdditionProblem;

    fn id(&self) -> &str {
        &self.id
    }

    fn reset(&mut self) -> Result<AdditionProblem> {
        let lhs = self.sample_operand();
        let rhs = self.sample_operand();
        let problem = AdditionProblem::new(lhs, rhs, self.num_len)?;
        self.problem = Some(problem);
        Ok(problem)
    }

    fn step(&mut self, action: usize) -> Result<Step<AdditionProblem>> {
        let problem = self
            .problem
            .take()
            .ok_or_else(|| CurriculumError::processing(format!("{} stepped before reset", self.id)))?;
        let reward = if action as u64 == problem.answer() { 1.0 } else { 0.0 };
        Ok(Step {
            obs: problem,
            reward,
            done: true,
        })
    }
}
