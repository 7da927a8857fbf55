//! Named curricula: environments ordered by a prerequisite graph.

use crate::utils::error::{CurriculumError, Result};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CurriculumKind {
    Rl,
    Addition,
}

/// A directed acyclic graph over environment ids. Edges go from a
/// prerequisite to the environment that builds on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curriculum {
    pub name: String,
    pub kind: CurriculumKind,
    envs: Vec<String>,
    edges: Vec<(usize, usize)>,
}

const RL_CURRICULA: [&str; 3] = ["BlockedUnlockPickup", "KeyCorridor", "ObstructedMaze"];
const ADDITION_CURRICULA: [(&str, usize); 3] = [("Addition1", 3), ("Addition2", 6), ("Addition3", 9)];

impl Curriculum {
    pub fn new(
        name: impl Into<String>,
        kind: CurriculumKind,
        envs: Vec<String>,
        edges: &[(&str, &str)],
    ) -> Result<Self> {
        let name = name.into();
        if envs.is_empty() {
            return Err(CurriculumError::config(format!(
                "curriculum '{}' has no environments",
                name
            )));
        }

        let mut index = HashMap::new();
        for (i, env) in envs.iter().enumerate() {
            if index.insert(env.as_str(), i).is_some() {
                return Err(CurriculumError::config(format!(
                    "curriculum '{}' lists '{}' twice",
                    name, env
                )));
            }
        }

        let mut resolved = Vec::with_capacity(edges.len());
        for (from, to) in edges {
            let lookup = |env: &str| {
                index.get(env).copied().ok_or_else(|| {
                    CurriculumError::config(format!(
                        "edge {} -> {} of '{}' names an unknown environment",
                        from, to, name
                    ))
                })
            };
            resolved.push((lookup(from)?, lookup(to)?));
        }

        let curriculum = Self {
            name,
            kind,
            envs,
            edges: resolved,
        };
        curriculum.topological_order()?;
        Ok(curriculum)
    }

    /// A linear curriculum where each environment is the prerequisite of the next one.
    pub fn chain(name: impl Into<String>, kind: CurriculumKind, envs: Vec<String>) -> Result<Self> {
        let pairs: Vec<(String, String)> = envs
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();
        let edges: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        Self::new(name, kind, envs, &edges)
    }

    pub fn by_name(name: &str) -> Result<Self> {
        let canonical = name.strip_prefix("BabyAI-").unwrap_or(name);
        match canonical {
            "BlockedUnlockPickup" => Self::chain(
                "BlockedUnlockPickup",
                CurriculumKind::Rl,
                minigrid(&["Unlock", "UnlockPickup", "BlockedUnlockPickup"]),
            ),
            "KeyCorridor" => Self::chain(
                "KeyCorridor",
                CurriculumKind::Rl,
                minigrid(&[
                    "KeyCorridorS3R1",
                    "KeyCorridorS3R2",
                    "KeyCorridorS3R3",
                    "KeyCorridorS4R3",
                    "KeyCorridorS5R3",
                    "KeyCorridorS6R3",
                ]),
            ),
            "ObstructedMaze" => {
                let envs = minigrid(&[
                    "ObstructedMaze-1Dl",
                    "ObstructedMaze-1Dlh",
                    "ObstructedMaze-1Dlhb",
                    "ObstructedMaze-2Dl",
                    "ObstructedMaze-2Dlh",
                    "ObstructedMaze-2Dlhb",
                    "ObstructedMaze-1Q",
                    "ObstructedMaze-2Q",
                    "ObstructedMaze-Full",
                ]);
                let e = |i: usize, j: usize| (envs[i].clone(), envs[j].clone());
                let pairs = [
                    e(0, 1),
                    e(1, 2),
                    e(0, 3),
                    e(1, 4),
                    e(2, 5),
                    e(3, 4),
                    e(4, 5),
                    e(5, 6),
                    e(6, 7),
                    e(7, 8),
                ];
                let edges: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(a, b)| (a.as_str(), b.as_str()))
                    .collect();
                Self::new("ObstructedMaze", CurriculumKind::Rl, envs.clone(), &edges)
            }
            other => match ADDITION_CURRICULA.iter().find(|(n, _)| *n == other) {
                Some((n, max_len)) => Self::chain(
                    *n,
                    CurriculumKind::Addition,
                    (1..=*max_len).map(addition_env_id).collect(),
                ),
                None => Err(CurriculumError::UnknownCurriculum {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Canonical names of every built-in curriculum.
    pub fn names() -> Vec<&'static str> {
        RL_CURRICULA
            .iter()
            .copied()
            .chain(ADDITION_CURRICULA.iter().map(|(n, _)| *n))
            .collect()
    }

    pub fn envs(&self) -> &[String] {
        &self.envs
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn env_index(&self, env: &str) -> Option<usize> {
        self.envs.iter().position(|e| e == env)
    }

    pub fn predecessors(&self, env: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|&&(_, to)| to == env)
            .map(|&(from, _)| from)
            .collect()
    }

    pub fn successors(&self, env: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|&&(from, _)| from == env)
            .map(|&(_, to)| to)
            .collect()
    }

    /// Kahn's algorithm; ties are broken by declaration order.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.envs.len();
        let mut in_degree = vec![0usize; n];
        for &(_, to) in &self.edges {
            in_degree[to] += 1;
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(env) = queue.pop_front() {
            order.push(env);
            for next in self.successors(env) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            return Err(CurriculumError::config(format!(
                "curriculum '{}' contains a prerequisite cycle",
                self.name
            )));
        }
        Ok(order)
    }
}

fn minigrid(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|n| format!("MiniGrid-{}-v0", n))
        .collect()
}

pub fn addition_env_id(num_len: usize) -> String {
    format!("Addition-{}", num_len)
}
