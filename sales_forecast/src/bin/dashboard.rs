use clap::Parser;
use indicatif::ProgressBar;
use sales_forecast::dashboard::{
    export_forecast, export_metrics, future_comparison, list_groups, load_group_forecast,
    load_metrics, overlay, request_forecast, ForecastOutcome, ForecastView, Horizon, MetricsPanel,
};
use sales_forecast::utils::init_tracing;
use sales_forecast::{GroupKey, HybridConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Text dashboard over trained forecasts and metrics")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Group as STORE_DEPT; the first trained group when omitted
    #[arg(short, long)]
    group: Option<GroupKey>,

    /// hybrid or seasonal
    #[arg(long, default_value = "hybrid")]
    view: ForecastView,

    /// Run on-demand inference for this many weeks (4 to 24)
    #[arg(long)]
    horizon: Option<usize>,

    /// Write metrics_{group}.csv and forecast_{group}.csv here
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn run(args: &Args) -> Result<()> {
    let config = HybridConfig::resolve(args.config.as_deref())?;
    let groups = list_groups(&config.forecasts_dir())?;
    let key = match args.group {
        Some(key) => key,
        None => groups[0],
    };
    println!(
        "Groups: {}",
        groups.iter().map(GroupKey::to_string).collect::<Vec<_>>().join(", ")
    );
    println!("Store {} Dept {}: actual vs {}", key.store, key.dept, args.view.label());

    let records = load_group_forecast(&config, key)?;
    println!("{:<12}{:>14}{:>14}", "Date", "actual", "predicted");
    for point in overlay(&records, args.view) {
        let actual = point
            .actual
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<12}{:>14}{:>14.2}", point.date, actual, point.predicted);
    }

    let metrics = load_metrics(&config)?;
    match metrics.iter().find(|m| m.key() == key) {
        Some(record) => {
            print!("\n{}", MetricsPanel::from_record(record));
            if let Some(dir) = &args.export_dir {
                println!("Wrote {}", export_metrics(dir, record)?.display());
            }
        }
        None => warn!(group = %key, "no metrics row for this group"),
    }

    if let Some(weeks) = args.horizon {
        let horizon = Horizon::new(weeks)?;
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Forecasting {} weeks", horizon.weeks()));
        let outcome = request_forecast(&config, key, horizon);
        spinner.finish_and_clear();

        match outcome? {
            ForecastOutcome::Ready(future) => {
                println!("\nNext {} weeks", horizon.weeks());
                println!("{:<12}{:>14}{:>14}", "Date", "yhat", "yhat_hybrid");
                for point in future_comparison(&future) {
                    println!("{:<12}{:>14.2}{:>14.2}", point.date, point.yhat, point.yhat_hybrid);
                }
                if let Some(dir) = &args.export_dir {
                    println!("Wrote {}", export_forecast(dir, key, &future)?.display());
                }
            }
            ForecastOutcome::Empty => println!("Forecast returned no rows"),
        }
    } else if let Some(dir) = &args.export_dir {
        println!("Wrote {}", export_forecast(dir, key, &records)?.display());
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
