//! Attention over the environments of a curriculum, built from learning
//! progress and, for the graph-aware modes, from mastering rates.

use crate::core::curriculum::Curriculum;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttentionMode {
    #[default]
    Lp,
    LpPot,
    LpPotRr,
}

impl FromStr for AttentionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Lp" => Ok(Self::Lp),
            "LpPot" => Ok(Self::LpPot),
            "LpPotRr" => Ok(Self::LpPotRr),
            other => Err(format!(
                "unknown attention computer '{}' (Lp, LpPot, LpPotRr)",
                other
            )),
        }
    }
}

impl fmt::Display for AttentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lp => "Lp",
            Self::LpPot => "LpPot",
            Self::LpPotRr => "LpPotRr",
        };
        write!(f, "{}", name)
    }
}

/// Normalized recent performance per environment, in `[0, 1]`.
pub struct MasteringRates {
    k: usize,
    min_returns: Vec<f64>,
    max_returns: Vec<f64>,
    recent: Vec<VecDeque<f64>>,
}

impl MasteringRates {
    pub fn new(num_envs: usize, k: usize) -> Self {
        Self::with_bounds(vec![0.0; num_envs], vec![1.0; num_envs], k)
    }

    pub fn with_bounds(min_returns: Vec<f64>, max_returns: Vec<f64>, k: usize) -> Self {
        let num_envs = min_returns.len();
        Self {
            k,
            min_returns,
            max_returns,
            recent: vec![VecDeque::with_capacity(k); num_envs],
        }
    }

    pub fn record(&mut self, env_id: usize, returnn: f64) {
        let window = &mut self.recent[env_id];
        window.push_back(returnn);
        while window.len() > self.k {
            window.pop_front();
        }
    }

    pub fn rate(&self, env_id: usize) -> f64 {
        let window = &self.recent[env_id];
        if window.is_empty() {
            return 0.0;
        }
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let span = self.max_returns[env_id] - self.min_returns[env_id];
        if span <= 0.0 {
            return 0.0;
        }
        ((mean - self.min_returns[env_id]) / span).clamp(0.0, 1.0)
    }

    pub fn rates(&self) -> Vec<f64> {
        (0..self.recent.len()).map(|i| self.rate(i)).collect()
    }
}

/// Combines learning progress with the prerequisite graph of a curriculum.
pub struct AttentionComputer {
    mode: AttentionMode,
    pot_coef: f64,
    predecessors: Vec<Vec<usize>>,
    reverse_topological: Vec<usize>,
}

impl AttentionComputer {
    pub fn new(mode: AttentionMode, pot_coef: f64, curriculum: &Curriculum) -> Result<Self> {
        let n = curriculum.num_envs();
        let predecessors = (0..n).map(|i| curriculum.predecessors(i)).collect();
        let mut reverse_topological = curriculum.topological_order()?;
        reverse_topological.reverse();
        Ok(Self {
            mode,
            pot_coef,
            predecessors,
            reverse_topological,
        })
    }

    pub fn mode(&self) -> AttentionMode {
        self.mode
    }

    /// Smallest mastering rate among the prerequisites, 1 without prerequisites.
    fn readiness(&self, env: usize, mastering: &[f64]) -> f64 {
        self.predecessors[env]
            .iter()
            .map(|&p| mastering[p])
            .fold(1.0, f64::min)
    }

    pub fn compute(&self, lps: &[f64], mastering: &[f64]) -> Vec<f64> {
        let base: Vec<f64> = lps.iter().map(|lp| lp.abs()).collect();
        if self.mode == AttentionMode::Lp {
            return base;
        }

        let mut attention: Vec<f64> = base
            .iter()
            .zip(mastering)
            .map(|(a, m)| a + self.pot_coef * (1.0 - m))
            .collect();

        if self.mode == AttentionMode::LpPotRr {
            for &env in &self.reverse_topological {
                let preds = &self.predecessors[env];
                if preds.is_empty() {
                    continue;
                }
                let available = attention[env];
                for &p in preds {
                    let share = available * (1.0 - mastering[p]) / preds.len() as f64;
                    attention[p] += share;
                    attention[env] -= share;
                }
            }
        }

        attention
            .iter()
            .enumerate()
            .map(|(env, a)| (self.readiness(env, mastering) * a).max(0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain3() -> Curriculum {
        Curriculum::by_name("BlockedUnlockPickup").unwrap()
    }

    #[test]
    fn test_mastering_rate_window_and_clamp() {
        let mut m = MasteringRates::new(2, 2);
        assert_eq!(m.rate(0), 0.0);
        m.record(0, 0.2);
        m.record(0, 0.6);
        m.record(0, 1.0);
        assert!((m.rate(0) - 0.8).abs() < 1e-12);

        let mut bounded = MasteringRates::with_bounds(vec![0.0], vec![20.0], 5);
        bounded.record(0, 30.0);
        assert_eq!(bounded.rate(0), 1.0);
    }

    #[test]
    fn test_lp_mode_is_absolute_lp() {
        let c = chain3();
        let att = AttentionComputer::new(AttentionMode::Lp, 1.0, &c).unwrap();
        assert_eq!(att.compute(&[-0.3, 0.1, 0.0], &[0.0; 3]), vec![0.3, 0.1, 0.0]);
    }

    #[test]
    fn test_lp_pot_gates_unready_envs() {
        let c = chain3();
        let att = AttentionComputer::new(AttentionMode::LpPot, 0.5, &c).unwrap();
        let a = att.compute(&[0.0, 0.2, 0.2], &[1.0, 0.0, 0.0]);
        // env 0 is mastered, env 1 is ready, env 2 waits on env 1
        assert_eq!(a[0], 0.0);
        assert!((a[1] - 0.7).abs() < 1e-12);
        assert_eq!(a[2], 0.0);
    }

    #[test]
    fn test_lp_pot_rr_moves_attention_to_prerequisites() {
        let c = chain3();
        let pot = AttentionComputer::new(AttentionMode::LpPot, 1.0, &c).unwrap();
        let rr = AttentionComputer::new(AttentionMode::LpPotRr, 1.0, &c).unwrap();
        let mastering = [0.5, 0.0, 0.0];
        let lps = [0.0, 0.0, 0.0];

        let a_pot = pot.compute(&lps, &mastering);
        let a_rr = rr.compute(&lps, &mastering);
        assert_eq!(a_pot, vec![0.5, 0.5, 0.0]);
        // env 2 hands its attention to env 1, which passes half of it on to env 0
        assert_eq!(a_rr, vec![1.5, 0.5, 0.0]);
    }

    #[test]
    fn test_unmastered_prerequisite_blocks_successor() {
        let c = chain3();
        let pot = AttentionComputer::new(AttentionMode::LpPot, 0.0, &c).unwrap();
        // env 1 progresses fastest but env 0 is not mastered at all
        let a = pot.compute(&[0.1, 0.4, 0.3], &[0.0, 0.5, 0.0]);
        assert!((a[0] - 0.1).abs() < 1e-12);
        assert_eq!(a[1], 0.0);
        assert!((a[2] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_attention_mode_names() {
        assert_eq!("LpPotRr".parse::<AttentionMode>().unwrap(), AttentionMode::LpPotRr);
        assert!("lp".parse::<AttentionMode>().is_err());
    }
}
