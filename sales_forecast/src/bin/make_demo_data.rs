use clap::Parser;
use sales_forecast::synthetic::{write_demo_data, SyntheticSpec};
use sales_forecast::utils::init_tracing;
use sales_forecast::{HybridConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "make_demo_data")]
#[command(about = "Write a synthetic train/features/stores data set")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory; defaults to paths.data_dir
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = 3)]
    years: usize,

    #[arg(long, default_value_t = 2)]
    stores: u32,

    #[arg(long, default_value_t = 2)]
    depts: u32,

    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn run(args: &Args) -> Result<()> {
    let config = HybridConfig::resolve(args.config.as_deref())?;
    let out = args.out.clone().unwrap_or(config.paths.data_dir);
    let spec = SyntheticSpec {
        stores: args.stores,
        depts: args.depts,
        weeks: args.years * 52,
        seed: args.seed,
        ..SyntheticSpec::default()
    };
    write_demo_data(&out, &spec)?;
    println!("Wrote demo data to {}", out.display());
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
