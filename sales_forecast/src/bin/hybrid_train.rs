use clap::Parser;
use sales_forecast::utils::{group_progress, init_tracing};
use sales_forecast::{run_training, HybridConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hybrid_train")]
#[command(about = "Train the seasonal baseline and residual booster per (Store, Dept) group")]
struct Args {
    /// TOML config file; defaults plus HYBRID_* environment variables when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of groups to train (0 = all); defaults to training.group_limit
    #[arg(long)]
    limit: Option<usize>,
}

fn run(args: &Args) -> Result<()> {
    let config = HybridConfig::resolve(args.config.as_deref())?;
    info!(
        data_dir = %config.paths.data_dir.display(),
        output_dir = %config.paths.output_dir.display(),
        test_start = %config.calendar.test_start,
        "starting training"
    );

    let progress = group_progress(0, "training groups");
    let summary = run_training(&config, args.limit, &progress)?;

    println!("Trained {} groups", summary.trained());
    for record in &summary.metrics {
        println!(
            "  Store {:>3} Dept {:>3}  MAE prophet {:>10.2}  hybrid {:>10.2}",
            record.store, record.dept, record.mae_prophet, record.mae_hybrid
        );
    }
    for (key, reason) in &summary.failed {
        println!("  skipped {key}: {reason}");
    }
    println!("Metrics written to {}", config.metrics_path().display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing() {
        eprintln!("{e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
