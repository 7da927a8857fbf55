//! Learning-progress estimators.
//!
//! Every estimator is fed the return of each finished episode together with
//! the index of the environment it was played on, and keeps one learning
//! progress value per environment.

use crate::domain::ports::LpComputer;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// How the returns kept in a window are pre-processed before estimating a slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ReturnHistory {
    #[default]
    Normal,
    Gaussian,
}

impl ReturnHistory {
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        match self {
            Self::Normal => values.to_vec(),
            Self::Gaussian => gaussian_smooth(values, 1.0, 2),
        }
    }
}

impl FromStr for ReturnHistory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(Self::Normal),
            "Gaussian" => Ok(Self::Gaussian),
            other => Err(format!("unknown return history '{}' (Normal, Gaussian)", other)),
        }
    }
}

impl fmt::Display for ReturnHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Gaussian => write!(f, "Gaussian"),
        }
    }
}

/// Gaussian-weighted moving average, renormalized at the window borders.
pub fn gaussian_smooth(values: &[f64], sigma: f64, radius: usize) -> Vec<f64> {
    let weights: Vec<f64> = (0..=radius)
        .map(|d| (-((d * d) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();

    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(values.len() - 1);
            let (mut acc, mut norm) = (0.0, 0.0);
            for (j, value) in values.iter().enumerate().take(hi + 1).skip(lo) {
                let w = weights[i.abs_diff(j)];
                acc += w * value;
                norm += w;
            }
            acc / norm
        })
        .collect()
}

/// Least-squares slope of `ys` against `xs`; 0 when it is undefined.
pub fn linreg_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var) = (0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }
    if var == 0.0 {
        0.0
    } else {
        cov / var
    }
}

/// Exponential moving average of the difference between consecutive returns.
pub struct OnlineLp {
    alpha: f64,
    prev_returns: Vec<Option<f64>>,
    lps: Vec<f64>,
}

impl OnlineLp {
    pub fn new(num_envs: usize, alpha: f64) -> Self {
        Self {
            alpha,
            prev_returns: vec![None; num_envs],
            lps: vec![0.0; num_envs],
        }
    }
}

impl LpComputer for OnlineLp {
    fn update(&mut self, env_id: usize, returnn: f64) -> &[f64] {
        if let Some(prev) = self.prev_returns[env_id] {
            self.lps[env_id] =
                self.alpha * (returnn - prev) + (1.0 - self.alpha) * self.lps[env_id];
        }
        self.prev_returns[env_id] = Some(returnn);
        &self.lps
    }

    fn lps(&self) -> &[f64] {
        &self.lps
    }
}

/// Slope between the mean of the older and the newer half of the last `K` returns.
pub struct WindowLp {
    k: usize,
    history: ReturnHistory,
    returns: Vec<VecDeque<f64>>,
    lps: Vec<f64>,
}

impl WindowLp {
    pub fn new(num_envs: usize, k: usize, history: ReturnHistory) -> Self {
        Self {
            k,
            history,
            returns: vec![VecDeque::with_capacity(k); num_envs],
            lps: vec![0.0; num_envs],
        }
    }
}

impl LpComputer for WindowLp {
    fn update(&mut self, env_id: usize, returnn: f64) -> &[f64] {
        let window = &mut self.returns[env_id];
        window.push_back(returnn);
        while window.len() > self.k {
            window.pop_front();
        }

        let len = window.len();
        if len >= 2 {
            let values = self.history.apply(window.make_contiguous());
            let half = len / 2;
            let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
            let older = mean(&values[..half]);
            let newer = mean(&values[half..]);
            // distance between the centres of the two halves
            let older_centre = (half as f64 - 1.0) / 2.0;
            let newer_centre = half as f64 + ((len - half) as f64 - 1.0) / 2.0;
            self.lps[env_id] = (newer - older) / (newer_centre - older_centre);
        }
        &self.lps
    }

    fn lps(&self) -> &[f64] {
        &self.lps
    }
}

/// Linear-regression slope of the last `K` returns against the global episode index.
pub struct LinregLp {
    k: usize,
    history: ReturnHistory,
    episode: u64,
    samples: Vec<VecDeque<(f64, f64)>>,
    lps: Vec<f64>,
}

impl LinregLp {
    pub fn new(num_envs: usize, k: usize, history: ReturnHistory) -> Self {
        Self {
            k,
            history,
            episode: 0,
            samples: vec![VecDeque::with_capacity(k); num_envs],
            lps: vec![0.0; num_envs],
        }
    }
}

impl LpComputer for LinregLp {
    fn update(&mut self, env_id: usize, returnn: f64) -> &[f64] {
        self.episode += 1;
        let window = &mut self.samples[env_id];
        window.push_back((self.episode as f64, returnn));
        while window.len() > self.k {
            window.pop_front();
        }

        let xs: Vec<f64> = window.iter().map(|&(x, _)| x).collect();
        let ys: Vec<f64> = window.iter().map(|&(_, y)| y).collect();
        self.lps[env_id] = linreg_slope(&xs, &self.history.apply(&ys));
        &self.lps
    }

    fn lps(&self) -> &[f64] {
        &self.lps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_lp_ignores_first_return() {
        let mut lp = OnlineLp::new(2, 0.5);
        assert_eq!(lp.update(0, 0.4), &[0.0, 0.0]);
        let lps = lp.update(0, 0.8).to_vec();
        assert!((lps[0] - 0.2).abs() < 1e-12);
        assert_eq!(lps[1], 0.0);
    }

    #[test]
    fn test_window_lp_on_linear_returns() {
        let mut lp = WindowLp::new(1, 4, ReturnHistory::Normal);
        for r in [0.0, 0.1, 0.2, 0.3] {
            lp.update(0, r);
        }
        assert!((lp.lps()[0] - 0.1).abs() < 1e-9);

        // the window drops the oldest return
        lp.update(0, 0.4);
        assert!((lp.lps()[0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_linreg_lp_uses_global_episode_index() {
        let mut lp = LinregLp::new(2, 10, ReturnHistory::Normal);
        lp.update(0, 0.0);
        lp.update(1, 0.5);
        lp.update(0, 1.0);
        // env 0 saw episodes 1 and 3
        assert!((lp.lps()[0] - 0.5).abs() < 1e-12);
        assert_eq!(lp.lps()[1], 0.0);
    }

    #[test]
    fn test_linreg_slope_degenerate_inputs() {
        assert_eq!(linreg_slope(&[1.0], &[3.0]), 0.0);
        assert_eq!(linreg_slope(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
        assert!((linreg_slope(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_smoothing_preserves_constants() {
        let smoothed = gaussian_smooth(&[0.5; 6], 1.0, 2);
        assert!(smoothed.iter().all(|v| (v - 0.5).abs() < 1e-12));

        let spike = gaussian_smooth(&[0.0, 0.0, 1.0, 0.0, 0.0], 1.0, 2);
        assert!(spike[2] < 1.0 && spike[1] > 0.0);
    }

    #[test]
    fn test_return_history_names() {
        assert_eq!("Gaussian".parse::<ReturnHistory>().unwrap(), ReturnHistory::Gaussian);
        assert!("gauss".parse::<ReturnHistory>().is_err());
        assert_eq!(ReturnHistory::Normal.to_string(), "Normal");
    }
}
