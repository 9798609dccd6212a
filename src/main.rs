//! # eload_sweep
//!
//! Bench runner for power-supply / electronic-load characterization.
//!
//! ## Usage
//!
//! ```bash
//! # Run the sweep plan against the bench
//! eload_sweep --config bench.toml
//!
//! # Connect, report identities, switch everything off
//! eload_sweep --check
//!
//! # Full run against the in-process simulated bench
//! eload_sweep --simulate --plan Sample_Rates.csv --output-dir /tmp/reports
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use eload_sweep::config::Settings;
use eload_sweep::data::CsvReportWriter;
use eload_sweep::simulation::SimulatedConnector;
use eload_sweep::sweep::{Ramp, SweepPlan};
use eload_sweep::timing::ThreadSettle;
use eload_sweep::{BenchSession, ConnectionManager, Connector, HardwareConnector};

/// Electronic load sweep bench
#[derive(Parser)]
#[command(name = "eload_sweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Sweep plan CSV (overrides sweep.plan_path)
    #[arg(short, long, value_name = "FILE")]
    plan: Option<PathBuf>,

    /// Report directory (overrides storage.output_dir)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Use the in-process simulated bench instead of hardware
    #[arg(long)]
    simulate: bool,

    /// Connect, report readiness and identities, then tear down
    #[arg(long)]
    check: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Every n-th simulated sensor line is truncated, to exercise the retry path.
const SIMULATED_GLITCH_INTERVAL: u32 = 17;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(plan) = cli.plan {
        settings.sweep.plan_path = plan;
    }
    if let Some(dir) = cli.output_dir {
        settings.storage.output_dir = dir;
    }

    if cli.print_config {
        let rendered =
            toml::to_string_pretty(&settings).context("Failed to render configuration")?;
        println!("{}", rendered);
        return Ok(());
    }

    let ramp = Ramp::standard();
    let plan = if cli.check {
        None
    } else {
        let plan = SweepPlan::from_csv_path(&settings.sweep.plan_path).with_context(|| {
            format!(
                "Failed to load sweep plan {}",
                settings.sweep.plan_path.display()
            )
        })?;
        info!(
            "Sweep plan: {} cases, {} ramps of {} steps",
            plan.len(),
            plan.total_trials(),
            ramp.len()
        );
        Some(plan)
    };

    let connector: Box<dyn Connector> = if cli.simulate {
        info!("Using simulated bench");
        Box::new(SimulatedConnector::new().with_glitches(SIMULATED_GLITCH_INTERVAL))
    } else {
        Box::new(HardwareConnector::new(&settings))
    };
    let writer = CsvReportWriter::new(
        settings.storage.output_dir.clone(),
        &settings.storage.file_prefix,
    );
    let mut session = BenchSession::new(
        ConnectionManager::new(connector),
        ramp,
        Box::new(ThreadSettle),
        Box::new(writer),
    );

    let summary = match plan {
        Some(plan) => session.run(&plan),
        None => session.check(),
    };
    summary.log();
    Ok(())
}
