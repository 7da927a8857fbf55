//! Expands a hyper-parameter grid into training jobs and launches them.

use crate::app::runner::CommandSpec;
use crate::config::grid_config::GridConfig;
use crate::utils::error::{CurriculumError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridJob {
    pub model_name: String,
    #[serde(serialize_with = "serialize_command")]
    pub command: CommandSpec,
}

fn serialize_command<S: serde::Serializer>(
    command: &CommandSpec,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&command.to_string())
}

/// One job per combination, seed outermost and potential coefficient innermost.
pub fn expand(config: &GridConfig, use_slurm: bool) -> Result<Vec<GridJob>> {
    let g = &config.grid;
    let slurm = if use_slurm { config.slurm.as_ref() } else { None };
    let mut jobs = Vec::with_capacity(config.num_jobs());

    for seed in &g.seeds {
        for curriculum in &g.curriculums {
            let mut prefix = Vec::new();
            if let Some(slurm) = slurm {
                let time = slurm.times.get(curriculum).ok_or_else(|| {
                    CurriculumError::config(format!(
                        "no slurm time configured for curriculum '{}'",
                        curriculum
                    ))
                })?;
                prefix.extend([
                    "sbatch".to_string(),
                    format!("--account={}", slurm.account),
                    format!("--time={}", time),
                    format!("--cpus-per-task={}", slurm.cpus_per_task),
                    format!("--gres=gpu:{}", slurm.gpus),
                    format!("--mem={}", slurm.mem),
                ]);
            }
            if let Some(wrapper) = &config.launch.wrapper {
                prefix.push(wrapper.clone());
            }
            prefix.push(config.launch.python.clone());

            for rt_hist in &g.rt_hists {
                for dist_cp in &g.dist_cps {
                    for lp_cp in &g.lp_cps {
                        for dist_cr in &g.dist_crs {
                            for k in &g.ks {
                                for eps in &g.epsilons {
                                    for pot in &g.pot_coefs {
                                        let model_name = format!(
                                            "{}_{}_{}_{}_{}_K{}_eps{}_pot{}/seed{}",
                                            curriculum, rt_hist, dist_cp, lp_cp, dist_cr, k, eps, pot, seed
                                        );

                                        let mut tokens = prefix.clone();
                                        tokens.extend([
                                            "-m".to_string(),
                                            config.launch.module.clone(),
                                            "--seed".to_string(),
                                            seed.to_string(),
                                            "--curriculum".to_string(),
                                            curriculum.clone(),
                                            "--rt-hist".to_string(),
                                            rt_hist.to_string(),
                                            "--dist-cp".to_string(),
                                            dist_cp.to_string(),
                                            "--lp-cp".to_string(),
                                            lp_cp.to_string(),
                                            "--dist-cr".to_string(),
                                            dist_cr.to_string(),
                                            "--dist-K".to_string(),
                                            k.to_string(),
                                            "--dist-eps".to_string(),
                                            eps.to_string(),
                                            "--pot-coef".to_string(),
                                            pot.to_string(),
                                            "--model".to_string(),
                                            model_name.clone(),
                                        ]);
                                        if let Some(extra) = config.extra_args.get(curriculum) {
                                            tokens.extend(extra.split_whitespace().map(str::to_string));
                                        }
                                        tokens.extend([
                                            "--save-interval".to_string(),
                                            config.launch.save_interval.to_string(),
                                        ]);

                                        let program = tokens.remove(0);
                                        jobs.push(GridJob {
                                            model_name,
                                            command: CommandSpec {
                                                program,
                                                args: tokens,
                                                working_dir: None,
                                            },
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(jobs)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchReport {
    pub launched: usize,
    /// Model name and reason of every job that failed to start or exited non-zero.
    pub failed: Vec<(String, String)>,
}

/// Starts every job, pausing `delay` between two launches, then waits for all of them.
pub async fn launch(jobs: &[GridJob], delay: Duration) -> Result<LaunchReport> {
    let mut report = LaunchReport::default();
    let mut children = Vec::with_capacity(jobs.len());

    for (i, job) in jobs.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        tracing::info!("[{}/{}] {}", i + 1, jobs.len(), job.model_name);
        tracing::debug!("{}", job.command);

        match job.command.spawn() {
            Ok(child) => {
                report.launched += 1;
                children.push((job.model_name.clone(), child));
            }
            Err(e) => {
                tracing::error!("Failed to launch {}: {}", job.model_name, e);
                report.failed.push((job.model_name.clone(), e.to_string()));
            }
        }
    }

    // 等待所有子程序，個別錯誤記入報告
    for (model_name, mut child) in children {
        match child.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!("{} exited with {}", model_name, status);
                report.failed.push((model_name, format!("exited with {}", status)));
            }
            Err(e) => {
                tracing::error!("Failed to wait for {}: {}", model_name, e);
                report.failed.push((model_name, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[derive(Debug, Serialize)]
struct GridManifest<'a> {
    created_at: DateTime<Utc>,
    num_jobs: usize,
    jobs: &'a [GridJob],
}

/// Records the launched jobs as `<dir>/grid-<timestamp>.json`.
pub fn write_manifest(dir: &Path, jobs: &[GridJob]) -> Result<PathBuf> {
    write_manifest_at(dir, jobs, Utc::now())
}

fn write_manifest_at(dir: &Path, jobs: &[GridJob], created_at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("grid-{}.json", created_at.format("%Y%m%d-%H%M%S")));
    let manifest = GridManifest {
        created_at,
        num_jobs: jobs.len(),
        jobs,
    };
    std::fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(path)
}
