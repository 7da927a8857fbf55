use auto_curriculum::app::grid::{expand, launch, write_manifest};
use auto_curriculum::config::grid_config::GridConfig;
use auto_curriculum::config::toml_config::ProjectConfig;
use auto_curriculum::utils::{logger, validation::Validate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "run_grid")]
#[command(about = "Launch one training job per combination of a hyper-parameter grid")]
struct Args {
    /// Grid definition
    #[arg(short, long, default_value = "exps/grid.toml")]
    config: String,

    /// Project configuration file (for the storage root)
    #[arg(long)]
    project: Option<String>,

    /// Don't submit through slurm
    #[arg(long)]
    no_slurm: bool,

    /// Print the commands without launching them
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("📁 Loading grid from: {}", args.config);
    let loaded = GridConfig::from_file(&args.config).and_then(|mut grid| {
        // 不走 slurm 時忽略 [slurm] 區段
        if args.no_slurm {
            grid.slurm = None;
        }
        grid.validate()?;
        let project = ProjectConfig::load(args.project.as_deref())?;
        project.validate()?;
        let jobs = expand(&grid, !args.no_slurm)?;
        Ok((grid, project, jobs))
    });
    let (grid, project, jobs) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if !args.no_slurm && grid.slurm.is_none() {
        tracing::warn!("No [slurm] section in {}, launching jobs directly", args.config);
    }
    tracing::info!("✅ {} jobs in the grid", jobs.len());

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No job will be launched");
        for job in &jobs {
            println!("{}", job.command);
        }
        return Ok(());
    }

    let manifest_dir = PathBuf::from(&project.storage.root).join("grids");
    match write_manifest(&manifest_dir, &jobs) {
        Ok(path) => tracing::info!("📝 Manifest written to {}", path.display()),
        Err(e) => tracing::warn!("Could not write the grid manifest: {}", e),
    }

    let delay = Duration::from_millis(grid.launch.delay_ms);
    let report = match launch(&jobs, delay).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("❌ Grid launch failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    };

    println!("✅ {} jobs launched", report.launched);
    if !report.failed.is_empty() {
        for (model, reason) in &report.failed {
            eprintln!("❌ {}: {}", model, reason);
        }
        // 外部程式失敗
        std::process::exit(2);
    }

    Ok(())
}
