use crate::config::toml_config::RunnerConfig;
use crate::core::addition::MAX_NUM_LEN;
use crate::core::curriculum::{Curriculum, CurriculumKind};
use crate::core::ConfigProvider;
use crate::utils::error::{CurriculumError, Result};
use crate::utils::validation::{validate_env_id, validate_model_name, validate_path, validate_range};
use std::fmt;
use std::path::PathBuf;
use tokio::process::Command;

/// One of the commands a user runs against the training scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    TrainRl { curriculum: String, model: String },
    TrainAddition { curriculum: String, model: String },
    EvaluateRl { env: String, model: String },
    EvaluateAddition { num_len: usize, model: String },
    VisualizeRl { env: String, model: String },
    Dashboard { logdir: String },
}

impl Invocation {
    /// `--logdir` wins; `--model` resolves to the model's directory.
    pub fn dashboard(
        logdir: Option<String>,
        model: Option<String>,
        provider: &dyn ConfigProvider,
    ) -> Result<Self> {
        match (logdir, model) {
            (Some(logdir), _) => Ok(Self::Dashboard { logdir }),
            (None, Some(model)) => {
                validate_model_name("model", &model)?;
                Ok(Self::Dashboard {
                    logdir: provider.model_dir(&model).to_string_lossy().into_owned(),
                })
            }
            (None, None) => Err(CurriculumError::MissingConfigError {
                field: "logdir".to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TrainRl { .. } => "train-rl",
            Self::TrainAddition { .. } => "train-addition",
            Self::EvaluateRl { .. } => "evaluate-rl",
            Self::EvaluateAddition { .. } => "evaluate-addition",
            Self::VisualizeRl { .. } => "visualize-rl",
            Self::Dashboard { .. } => "dashboard",
        }
    }

    pub fn validate(&self, provider: &dyn ConfigProvider) -> Result<()> {
        match self {
            Self::TrainRl { curriculum, model } => {
                validate_curriculum(curriculum, CurriculumKind::Rl)?;
                validate_model_name("model", model)
            }
            Self::TrainAddition { curriculum, model } => {
                validate_curriculum(curriculum, CurriculumKind::Addition)?;
                validate_model_name("model", model)
            }
            Self::EvaluateRl { env, model } | Self::VisualizeRl { env, model } => {
                validate_env_id("env", env)?;
                validate_existing_model(model, provider)
            }
            Self::EvaluateAddition { num_len, model } => {
                validate_range("num-len", *num_len, 1, MAX_NUM_LEN)?;
                validate_existing_model(model, provider)
            }
            Self::Dashboard { logdir } => validate_path("logdir", logdir),
        }
    }

    /// The external command this invocation delegates to.
    pub fn command(&self, runner: &RunnerConfig) -> CommandSpec {
        let module = |name: &str| format!("{}.{}", runner.module_prefix, name);
        let python = |name: &str, flags: Vec<String>| {
            let mut args = vec!["-m".to_string(), module(name)];
            args.extend(flags);
            CommandSpec {
                program: runner.python.clone(),
                args,
                working_dir: runner.working_dir.as_ref().map(PathBuf::from),
            }
        };

        match self {
            Self::TrainRl { curriculum, model } => python(
                "train_rl",
                flags(&[("--curriculum", curriculum), ("--model", model)]),
            ),
            Self::TrainAddition { curriculum, model } => python(
                "train_addition",
                flags(&[("--curriculum", curriculum), ("--model", model)]),
            ),
            Self::EvaluateRl { env, model } => {
                python("evaluate_rl", flags(&[("--env", env), ("--model", model)]))
            }
            Self::EvaluateAddition { num_len, model } => {
                let num_len = num_len.to_string();
                python(
                    "evaluate_addition",
                    flags(&[("--num-len", num_len.as_str()), ("--model", model)]),
                )
            }
            Self::VisualizeRl { env, model } => {
                python("visualize_rl", flags(&[("--env", env), ("--model", model)]))
            }
            Self::Dashboard { logdir } => CommandSpec {
                program: runner.dashboard.clone(),
                args: vec![format!("--logdir={}", logdir)],
                working_dir: runner.working_dir.as_ref().map(PathBuf::from),
            },
        }
    }
}

fn flags(pairs: &[(&str, &str)]) -> Vec<String> {
    pairs
        .iter()
        .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
        .collect()
}

fn validate_curriculum(name: &str, expected: CurriculumKind) -> Result<()> {
    let curriculum = Curriculum::by_name(name)?;
    if curriculum.kind != expected {
        return Err(CurriculumError::InvalidConfigValueError {
            field: "curriculum".to_string(),
            value: name.to_string(),
            reason: format!("expected a {:?} curriculum, found {:?}", expected, curriculum.kind),
        });
    }
    Ok(())
}

fn validate_existing_model(model: &str, provider: &dyn ConfigProvider) -> Result<()> {
    validate_model_name("model", model)?;
    let dir = provider.model_dir(model);
    if !dir.is_dir() {
        return Err(CurriculumError::ValidationError {
            message: format!("model directory {} does not exist", dir.display()),
        });
    }
    Ok(())
}

/// A program with its arguments, run with inherited stdio.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl CommandSpec {
    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Runs to completion; a non-zero exit status is an error.
    pub async fn execute(&self) -> Result<()> {
        tracing::info!("Running: {}", self);
        let status = self
            .to_command()
            .status()
            .await
            .map_err(|e| CurriculumError::CommandError {
                program: self.program.clone(),
                message: format!("failed to start: {e}"),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CurriculumError::CommandError {
                program: self.program.clone(),
                message: match status.code() {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by a signal".to_string(),
                },
            })
        }
    }

    pub fn spawn(&self) -> Result<tokio::process::Child> {
        self.to_command()
            .spawn()
            .map_err(|e| CurriculumError::CommandError {
                program: self.program.clone(),
                message: format!("failed to start: {e}"),
            })
    }
}
