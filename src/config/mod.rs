pub mod cli;
pub mod grid_config;
pub mod stats_config;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::attention::AttentionMode;
#[cfg(feature = "cli")]
use crate::core::dist::DistKind;
#[cfg(feature = "cli")]
use crate::core::lp::ReturnHistory;
#[cfg(feature = "cli")]
use crate::core::teacher::{LpKind, TeacherConfig};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "auto-curriculum")]
#[command(about = "Train, evaluate and inspect curriculum-learning models")]
pub struct CliConfig {
    /// Project configuration file (defaults to ./auto-curriculum.toml when present)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Train an RL model on a curriculum
    TrainRl(TrainArgs),
    /// Train an addition model on a curriculum
    TrainAddition(TrainArgs),
    /// Evaluate an RL model on one environment
    EvaluateRl(EnvModelArgs),
    /// Evaluate an addition model on numbers of a given length
    EvaluateAddition(EvaluateAdditionArgs),
    /// Watch an RL model act in one environment
    VisualizeRl(EnvModelArgs),
    /// Launch the training-metrics dashboard
    Dashboard(DashboardArgs),
    /// List the known curricula
    Curricula,
    /// Run a curriculum teacher against a synthetic student
    Simulate(SimulateArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct TrainArgs {
    #[arg(long)]
    pub curriculum: String,

    #[arg(long)]
    pub model: String,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct EnvModelArgs {
    #[arg(long)]
    pub env: String,

    #[arg(long)]
    pub model: String,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct EvaluateAdditionArgs {
    #[arg(long = "num-len")]
    pub num_len: usize,

    #[arg(long)]
    pub model: String,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct DashboardArgs {
    /// Directory with the training logs, usually storage/models/<model>
    #[arg(long)]
    pub logdir: Option<String>,

    /// Shortcut for --logdir=<storage>/models/<model>
    #[arg(long, conflicts_with = "logdir")]
    pub model: Option<String>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    #[arg(long)]
    pub curriculum: String,

    #[arg(long)]
    pub model: String,

    #[arg(long, default_value = "200")]
    pub num_updates: u64,

    #[arg(long, default_value = "16")]
    pub episodes_per_update: usize,

    #[arg(long, default_value = "128")]
    pub frames_per_episode: u64,

    /// How fast the synthetic student improves on the environment it practices
    #[arg(long, default_value = "0.05")]
    pub learning_rate: f64,

    #[arg(long, default_value = "1")]
    pub seed: u64,

    #[command(flatten)]
    pub teacher: TeacherArgs,
}

/// Command-line overrides of the project's `[teacher]` section.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Args)]
pub struct TeacherArgs {
    #[arg(long)]
    pub lp_cp: Option<LpKind>,

    #[arg(long)]
    pub dist_cp: Option<AttentionMode>,

    #[arg(long)]
    pub dist_cr: Option<DistKind>,

    #[arg(long)]
    pub rt_hist: Option<ReturnHistory>,

    #[arg(long = "dist-K")]
    pub k: Option<usize>,

    #[arg(long = "dist-eps")]
    pub eps: Option<f64>,

    #[arg(long)]
    pub pot_coef: Option<f64>,

    #[arg(long)]
    pub tau: Option<f64>,
}

#[cfg(feature = "cli")]
impl TeacherArgs {
    pub fn apply_to(&self, base: &TeacherConfig) -> TeacherConfig {
        TeacherConfig {
            lp_cp: self.lp_cp.unwrap_or(base.lp_cp),
            dist_cp: self.dist_cp.unwrap_or(base.dist_cp),
            dist_cr: self.dist_cr.unwrap_or(base.dist_cr),
            rt_hist: self.rt_hist.unwrap_or(base.rt_hist),
            k: self.k.unwrap_or(base.k),
            eps: self.eps.unwrap_or(base.eps),
            pot_coef: self.pot_coef.unwrap_or(base.pot_coef),
            alpha: base.alpha,
            tau: self.tau.unwrap_or(base.tau),
        }
    }
}
