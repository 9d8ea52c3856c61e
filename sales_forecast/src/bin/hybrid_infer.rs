use clap::Parser;
use sales_forecast::utils::init_tracing;
use sales_forecast::{forecast_future, GroupKey, HybridConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "hybrid_infer")]
#[command(about = "Forecast future weeks for one group from its persisted models")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    store: u32,

    #[arg(long, default_value_t = 1)]
    dept: u32,

    /// Weeks to forecast
    #[arg(long, default_value_t = 12)]
    horizon: usize,
}

fn run(args: &Args) -> Result<()> {
    let config = HybridConfig::resolve(args.config.as_deref())?;
    let rows = forecast_future(&config, GroupKey::new(args.store, args.dept), args.horizon)?;

    println!(
        "{:<12}{:>14}{:>14}{:>14}{:>14}",
        "Date", "yhat", "trend", "residual", "yhat_hybrid"
    );
    for row in &rows {
        println!(
            "{:<12}{:>14.2}{:>14.2}{:>14.2}{:>14.2}",
            row.date, row.yhat, row.trend, row.residual_pred, row.yhat_hybrid
        );
    }
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
