//! Distribution computers: attention values in, sampling probabilities out.

use crate::domain::ports::DistComputer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum DistKind {
    GreedyAmax,
    #[default]
    GreedyProp,
    Boltzmann,
}

impl FromStr for DistKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GreedyAmax" => Ok(Self::GreedyAmax),
            "GreedyProp" => Ok(Self::GreedyProp),
            "Boltzmann" => Ok(Self::Boltzmann),
            other => Err(format!(
                "unknown distribution computer '{}' (GreedyAmax, GreedyProp, Boltzmann)",
                other
            )),
        }
    }
}

impl fmt::Display for DistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GreedyAmax => "GreedyAmax",
            Self::GreedyProp => "GreedyProp",
            Self::Boltzmann => "Boltzmann",
        };
        write!(f, "{}", name)
    }
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

/// Epsilon-greedy on the environment with the largest attention.
pub struct GreedyAmax {
    pub eps: f64,
}

impl DistComputer for GreedyAmax {
    fn compute(&self, attention: &[f64]) -> Vec<f64> {
        let n = attention.len();
        let mut distrib = vec![self.eps / n as f64; n];
        let best = attention
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &a)| match best {
                Some((_, b)) if b >= a => best,
                _ => Some((i, a)),
            });
        if let Some((i, _)) = best {
            distrib[i] += 1.0 - self.eps;
        }
        distrib
    }
}

/// Epsilon mixture of the uniform distribution and attention-proportional sampling.
pub struct GreedyProp {
    pub eps: f64,
}

impl DistComputer for GreedyProp {
    fn compute(&self, attention: &[f64]) -> Vec<f64> {
        let n = attention.len();
        let total: f64 = attention.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return uniform(n);
        }
        attention
            .iter()
            .map(|a| (1.0 - self.eps) * a / total + self.eps / n as f64)
            .collect()
    }
}

pub struct Boltzmann {
    pub tau: f64,
}

impl DistComputer for Boltzmann {
    fn compute(&self, attention: &[f64]) -> Vec<f64> {
        let max = attention.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return uniform(attention.len());
        }
        let exps: Vec<f64> = attention
            .iter()
            .map(|a| ((a - max) / self.tau).exp())
            .collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}
