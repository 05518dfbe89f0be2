//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::csv_journal_adapter::CsvJournalAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_snapshot_adapter::JsonSnapshotAdapter;
use crate::adapters::paper_broker::{PaperBroker, PaperConfig};
use crate::domain::engine::Engine;
use crate::domain::engine_config::EngineConfig;
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Parser, Debug)]
#[command(
    name = "structshift",
    about = "Multi-timeframe market structure trading engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the control loop against the paper terminal
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Run a single cycle and print the snapshot as JSON
    Once {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config, cycles } => run_engine(&config, cycles),
        Command::Once { config } => run_once(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn fail(err: &EngineError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

/// Reads the configuration and connects the engine to the paper terminal.
pub fn build_engine(adapter: &dyn ConfigPort) -> Result<(Engine, PaperBroker), EngineError> {
    let config = EngineConfig::from_config(adapter)?;
    let mut broker = PaperBroker::new(PaperConfig::from_config(adapter));
    let mut engine = Engine::new(config);
    engine.initialize(&mut broker)?;
    Ok((engine, broker))
}

fn snapshot_sink(engine: &Engine) -> Option<JsonSnapshotAdapter> {
    engine
        .config()
        .snapshot_path
        .as_ref()
        .map(JsonSnapshotAdapter::new)
}

fn run_engine(config_path: &Path, cycles: Option<u64>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let (mut engine, mut broker) = match build_engine(&adapter) {
        Ok(built) => built,
        Err(e) => return fail(&e),
    };

    let mut journal = CsvJournalAdapter::new(&engine.config().journal_path);
    let mut sink = snapshot_sink(&engine);
    let stop = Arc::new(AtomicBool::new(false));
    install_stop_handler(Arc::clone(&stop));

    info!(
        config = %config_path.display(),
        strategy = engine.strategy().info().name,
        journal = %journal.path().display(),
        "starting engine"
    );
    engine.run(
        &mut broker,
        &mut journal,
        sink.as_mut().map(|s| s as &mut dyn SnapshotPort),
        &stop,
        cycles,
    );
    ExitCode::SUCCESS
}

/// Ctrl-C and SIGTERM set `stop`; the loop finishes its current cycle and
/// shuts the terminal down.
fn install_stop_handler(stop: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if !stop.swap(true, Ordering::SeqCst) {
            info!("stop requested, finishing current cycle");
        }
    });
    if let Err(e) = result {
        warn!(error = %e, "could not install signal handler, stop with --cycles or kill");
    }
}

fn run_once(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let (mut engine, mut broker) = match build_engine(&adapter) {
        Ok(built) => built,
        Err(e) => return fail(&e),
    };

    let mut journal = CsvJournalAdapter::new(&engine.config().journal_path);
    let snapshot = engine.run_cycle(&mut broker, &mut journal, Local::now().naive_local());

    if let Some(mut sink) = snapshot_sink(&engine) {
        if let Err(e) = sink.publish(&snapshot) {
            return fail(&e);
        }
    }

    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&EngineError::Snapshot {
            reason: e.to_string(),
        }),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match EngineConfig::from_config(&adapter) {
        Ok(config) => {
            let timeframes: Vec<String> =
                config.timeframes.iter().map(|tf| tf.to_string()).collect();
            println!("Configuration OK");
            println!("  symbol:     {}", config.symbol);
            println!("  strategy:   {}", config.strategy);
            println!("  timeframes: {}", timeframes.join(", "));
            println!(
                "  risk:       {}% per trade, drawdown limit {}%",
                config.risk.risk_per_trade_pct, config.daily_drawdown_limit_pct
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
