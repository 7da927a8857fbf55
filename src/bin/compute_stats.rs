use auto_curriculum::app::pipelines::{StatsOptions, StatsPipeline};
use auto_curriculum::config::stats_config::{StatDefinition, StatsConfig};
use auto_curriculum::config::toml_config::ProjectConfig;
use auto_curriculum::core::ConfigProvider;
use auto_curriculum::utils::error::CurriculumError;
use auto_curriculum::utils::{logger, validation::Validate};
use auto_curriculum::{Engine, LocalStorage};
use clap::Parser;

#[derive(Parser)]
#[command(name = "compute_stats")]
#[command(about = "Aggregate training logs into statistic tables")]
struct Args {
    /// Select a statistic to compute (all when omitted)
    #[arg(long)]
    stat: Option<String>,

    /// Number of updates to average on
    #[arg(long, default_value = "100")]
    window: usize,

    /// Return to reach, used by the reach tables
    #[arg(long, default_value = "0.8")]
    return_to_reach: f64,

    /// Statistic catalogue replacing the built-in one
    #[arg(long)]
    stats_file: Option<String>,

    /// Project configuration file
    #[arg(long)]
    config: Option<String>,

    /// List the statistics and exit
    #[arg(long)]
    list: bool,

    /// Show which logs would be read without computing anything
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    let loaded = ProjectConfig::load(args.config.as_deref()).and_then(|project| {
        project.validate()?;
        let catalogue = match &args.stats_file {
            Some(path) => StatsConfig::from_file(path)?,
            None => StatsConfig::builtin()?,
        };
        Ok((project, catalogue))
    });
    let (project, catalogue) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if args.list {
        for stat in &catalogue.stats {
            println!("{}", stat.name);
            if let Some(description) = &stat.description {
                println!("    {}", description);
            }
        }
        return Ok(());
    }

    let selected = match catalogue.select(args.stat.as_deref()) {
        Ok(selected) => selected,
        Err(e) => {
            tracing::error!("❌ Statistic selection failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            fail(e)
        }
    };

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No statistics will be written");
        display_plan(&selected, &project);
        return Ok(());
    }

    let options = StatsOptions {
        window: args.window.max(1),
        return_to_reach: args.return_to_reach,
    };
    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let stats_dir = project.stats_dir();
    let mut failures = Vec::new();
    for stat in selected {
        let storage = LocalStorage::new(stats_dir.clone());
        let pipeline = StatsPipeline::new(storage, project.models_dir(), stat.clone(), options);
        let engine = Engine::new_with_monitoring(pipeline, args.monitor);

        match engine.run().await {
            Ok(written) => {
                tracing::info!("✅ {} -> {}", stat.name, written);
                println!("✅ {}: {} in {}", stat.name, written, stats_dir.display());
            }
            Err(e) => {
                tracing::error!(
                    "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
                    stat.name,
                    e,
                    e.category(),
                    e.severity()
                );
                eprintln!("❌ {}: {}", stat.name, e.user_friendly_message());
                failures.push(e);
            }
        }
    }

    // 以最嚴重的錯誤決定退出碼
    if let Some(worst) = failures.into_iter().max_by_key(|e| e.exit_code()) {
        eprintln!("💡 建議: {}", worst.recovery_suggestion());
        fail(worst);
    }

    Ok(())
}

fn display_plan(stats: &[&StatDefinition], project: &ProjectConfig) {
    println!("📋 Statistics to compute:");
    for stat in stats {
        println!("  {} ({:?})", stat.name, stat.kind);
        for run in &stat.runs {
            let folder = project.model_dir(&run.folder);
            let slice = run
                .slice
                .map(|[a, b]| format!(" [{}..{})", a, b))
                .unwrap_or_default();
            println!("    {}: {}{}", run.label, folder.display(), slice);
        }
    }
    println!("  Output: {}", project.stats_dir().display());
}

fn fail(e: CurriculumError) -> ! {
    let exit_code = e.exit_code();
    std::process::exit(if exit_code > 0 { exit_code } else { 1 })
}
