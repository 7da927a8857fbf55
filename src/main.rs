use auto_curriculum::app::runner::Invocation;
use auto_curriculum::app::simulate::{run_simulation, SimulationConfig};
use auto_curriculum::config::toml_config::ProjectConfig;
use auto_curriculum::config::{CliConfig, Command, SimulateArgs};
use auto_curriculum::core::curriculum::Curriculum;
use auto_curriculum::utils::monitor::SystemMonitor;
use auto_curriculum::utils::{logger, validation::Validate};
use auto_curriculum::{CurriculumError, Result};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::debug!("CLI config: {:?}", cli);

    // 載入並驗證專案配置
    let project = match ProjectConfig::load(cli.config.as_deref()).and_then(|p| {
        p.validate()?;
        Ok(p)
    }) {
        Ok(project) => project,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let (name, result) = match invocation(&cli.command, &project) {
        Some(Ok(invocation)) => (invocation.name(), run(&invocation, &project).await),
        Some(Err(e)) => ("dashboard", Err(e)),
        None => match &cli.command {
            Command::Simulate(args) => ("simulate", simulate(args, cli.monitor, &project)),
            _ => ("curricula", list_curricula()),
        },
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            name,
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

/// External entry point behind a subcommand; `None` for the ones handled here.
fn invocation(command: &Command, project: &ProjectConfig) -> Option<Result<Invocation>> {
    let invocation = match command {
        Command::TrainRl(a) => Invocation::TrainRl {
            curriculum: a.curriculum.clone(),
            model: a.model.clone(),
        },
        Command::TrainAddition(a) => Invocation::TrainAddition {
            curriculum: a.curriculum.clone(),
            model: a.model.clone(),
        },
        Command::EvaluateRl(a) => Invocation::EvaluateRl {
            env: a.env.clone(),
            model: a.model.clone(),
        },
        Command::EvaluateAddition(a) => Invocation::EvaluateAddition {
            num_len: a.num_len,
            model: a.model.clone(),
        },
        Command::VisualizeRl(a) => Invocation::VisualizeRl {
            env: a.env.clone(),
            model: a.model.clone(),
        },
        Command::Dashboard(a) => {
            return Some(Invocation::dashboard(a.logdir.clone(), a.model.clone(), project))
        }
        Command::Curricula | Command::Simulate(_) => return None,
    };
    Some(Ok(invocation))
}

async fn run(invocation: &Invocation, project: &ProjectConfig) -> Result<()> {
    invocation.validate(project)?;
    let command = invocation.command(&project.runner);
    tracing::info!("🚀 {}", invocation.name());
    command.execute().await.map_err(|e| match e {
        CurriculumError::CommandError { program, message } => CurriculumError::CommandError {
            program,
            message: format!("{} ({})", message, command),
        },
        other => other,
    })
}

fn simulate(args: &SimulateArgs, monitor_enabled: bool, project: &ProjectConfig) -> Result<()> {
    let config = SimulationConfig {
        curriculum: args.curriculum.clone(),
        model: args.model.clone(),
        num_updates: args.num_updates,
        episodes_per_update: args.episodes_per_update,
        frames_per_episode: args.frames_per_episode,
        learning_rate: args.learning_rate,
        seed: args.seed,
        teacher: args.teacher.apply_to(&project.teacher),
    };
    let monitor = SystemMonitor::new(monitor_enabled);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let summary = run_simulation(&config, project, &monitor)?;
    monitor.log_final_stats();
    println!("✅ Simulated {} updates ({} frames)", summary.updates, summary.frames);
    println!("📁 Log saved to: {}", summary.log_path.display());
    println!("🎓 Final skills: {:?}", round(&summary.final_skills));
    println!("🎲 Final distribution: {:?}", round(&summary.final_distribution));
    Ok(())
}

fn round(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v * 1000.0).round() / 1000.0).collect()
}

fn list_curricula() -> Result<()> {
    for name in Curriculum::names() {
        let curriculum = Curriculum::by_name(name)?;
        println!("{} ({:?}, {} environments)", curriculum.name, curriculum.kind, curriculum.num_envs());
        for (i, env) in curriculum.envs().iter().enumerate() {
            let preds: Vec<&str> = curriculum
                .predecessors(i)
                .into_iter()
                .map(|p| curriculum.envs()[p].as_str())
                .collect();
            if preds.is_empty() {
                println!("  {}", env);
            } else {
                println!("  {} <- {}", env, preds.join(", "));
            }
        }
    }
    Ok(())
}
