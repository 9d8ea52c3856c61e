use clap::Parser;
use sales_forecast::utils::init_tracing;
use sales_forecast::{evaluate, HybridConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "evaluate")]
#[command(about = "Print mean metrics across all trained groups")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn run(args: &Args) -> Result<()> {
    let config = HybridConfig::resolve(args.config.as_deref())?;
    let summary = evaluate(&config)?;
    print!("{summary}");
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
