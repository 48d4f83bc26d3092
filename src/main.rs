//! Wind farm twin entry point: CLI wiring for simulation, pipeline stages and reports.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use wind_farm_twin::PipelineError;
use wind_farm_twin::config::{PipelineConfig, ScenarioConfig};
use wind_farm_twin::io::export::{export_hourly_csv, export_kpi_csv};
use wind_farm_twin::logging;
use wind_farm_twin::pipeline::{GoldAggregator, RunSummary, SilverProcessor, StageProcessor, StageRunner};
use wind_farm_twin::records::{FarmKpiRecord, HourlyEnergyRecord};
use wind_farm_twin::report::ComparisonReport;
use wind_farm_twin::sim::{ScenarioRun, SimulationEngine};
use wind_farm_twin::state::FileStateStore;
use wind_farm_twin::store::{Layer, PartitionFilter, PartitionedStore};

/// Exit code when a stage finished but some partitions failed.
const EXIT_PARTITION_FAILURE: u8 = 1;
/// Exit code for fatal errors (configuration, state store, simulation).
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "wind-twin", version, about = "Wind farm digital twin and incremental telemetry pipeline")]
struct Cli {
    /// Data lake root (overrides the pipeline config).
    #[arg(long, global = true)]
    data_lake: Option<PathBuf>,

    /// Pipeline configuration TOML (data lake, workers, quality thresholds).
    #[arg(long, global = true)]
    pipeline_config: Option<PathBuf>,

    /// Partition workers per stage (overrides the pipeline config).
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Debug logging (ignored when RUST_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate one scenario run into Bronze.
    #[command(alias = "run-simulation")]
    Simulate(SimulateArgs),
    /// Clean new or changed Bronze partitions into Silver.
    #[command(alias = "run-silver")]
    Silver(FilterArgs),
    /// Aggregate new or changed Silver partitions into Gold.
    #[command(alias = "run-gold")]
    Gold(FilterArgs),
    /// Simulate both presets, run Silver and Gold, print the comparison.
    RunAll {
        /// Regenerate runs that already exist.
        #[arg(long)]
        overwrite: bool,
    },
    /// Print the scenario comparison from Gold.
    Report(FilterArgs),
    /// Export Gold tables as CSV.
    Export {
        /// Output directory.
        #[arg(long)]
        out_dir: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Scenario TOML file.
    #[arg(long, conflicts_with = "preset")]
    scenario: Option<PathBuf>,
    /// Built-in preset (no_wake, wake).
    #[arg(long)]
    preset: Option<String>,
    /// Override the wind seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Regenerate the run if it already exists.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only this scenario run.
    #[arg(long = "run")]
    sim_run_id: Option<String>,
    /// Only this farm.
    #[arg(long = "farm")]
    farm_id: Option<String>,
    /// Earliest date (YYYY-MM-DD), inclusive.
    #[arg(long = "from")]
    date_from: Option<NaiveDate>,
    /// Latest date (YYYY-MM-DD), inclusive.
    #[arg(long = "to")]
    date_to: Option<NaiveDate>,
}

impl FilterArgs {
    fn filter(&self) -> PartitionFilter {
        PartitionFilter {
            sim_run_id: self.sim_run_id.clone(),
            farm_id: self.farm_id.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

fn load_pipeline_config(cli: &Cli) -> Result<PipelineConfig, PipelineError> {
    let mut cfg = match &cli.pipeline_config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &cli.data_lake {
        cfg.data_lake = root.clone();
    }
    if let Some(n) = cli.workers {
        cfg.workers = n;
    }
    let errors = cfg.validate();
    if !errors.is_empty() {
        return Err(PipelineError::Configuration(errors));
    }
    Ok(cfg)
}

fn simulate(store: &PartitionedStore, args: &SimulateArgs) -> Result<(), PipelineError> {
    let mut cfg = match (&args.scenario, &args.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path)?,
        (None, Some(name)) => ScenarioConfig::from_preset(name)?,
        (None, None) => ScenarioConfig::wake(),
    };
    if let Some(seed) = args.seed {
        cfg.scenario.wind_seed = seed;
    }
    if args.overwrite {
        cfg.scenario.rerun_policy = "overwrite".to_string();
    }
    let run = ScenarioRun::from_config(&cfg)?;
    let summary = SimulationEngine::new(store).run(&run)?;
    println!("{summary}");
    Ok(())
}

fn run_stage(
    store: &PartitionedStore,
    cfg: &PipelineConfig,
    stage: &dyn StageProcessor,
    filter: &PartitionFilter,
) -> Result<RunSummary, PipelineError> {
    let state = FileStateStore::open(store.state_dir())?;
    let summary = StageRunner::new(store, &state)
        .with_workers(cfg.workers)
        .run(stage, filter)?;
    println!("{summary}");
    Ok(summary)
}

fn run_all(store: &PartitionedStore, cfg: &PipelineConfig, overwrite: bool) -> Result<bool, PipelineError> {
    for preset in ScenarioConfig::PRESETS {
        let args = SimulateArgs {
            scenario: None,
            preset: Some((*preset).to_string()),
            seed: None,
            overwrite,
        };
        match simulate(store, &args) {
            Err(PipelineError::RunExists(id)) => {
                tracing::info!(sim_run_id = %id, "run already simulated, reusing Bronze");
            }
            other => other?,
        }
    }
    let filter = PartitionFilter::all();
    let silver = run_stage(store, cfg, &SilverProcessor::new(store.clone(), cfg.quality.clone()), &filter)?;
    let gold = run_stage(store, cfg, &GoldAggregator::new(store.clone()), &filter)?;
    println!("{}", ComparisonReport::load(store, &filter)?);
    Ok(silver.is_success() && gold.is_success())
}

fn export(store: &PartitionedStore, out_dir: &Path, filter: &PartitionFilter) -> Result<(), PipelineError> {
    fs::create_dir_all(out_dir)?;
    let hourly = store.read_all::<HourlyEnergyRecord>(Layer::Gold, filter)?;
    let kpis = store.read_all::<FarmKpiRecord>(Layer::Gold, filter)?;
    export_hourly_csv(&hourly, &out_dir.join("hourly_energy.csv"))?;
    export_kpi_csv(&kpis, &out_dir.join("farm_kpi.csv"))?;
    println!(
        "Exported {} hourly rows and {} KPI rows to {}",
        hourly.len(),
        kpis.len(),
        out_dir.display()
    );
    Ok(())
}

fn execute(cli: &Cli) -> Result<bool, PipelineError> {
    let cfg = load_pipeline_config(cli)?;
    let store = PartitionedStore::new(&cfg.data_lake);
    match &cli.command {
        Command::Simulate(args) => simulate(&store, args).map(|()| true),
        Command::Silver(f) => {
            let silver = SilverProcessor::new(store.clone(), cfg.quality.clone());
            run_stage(&store, &cfg, &silver, &f.filter()).map(|s| s.is_success())
        }
        Command::Gold(f) => {
            run_stage(&store, &cfg, &GoldAggregator::new(store.clone()), &f.filter()).map(|s| s.is_success())
        }
        Command::RunAll { overwrite } => run_all(&store, &cfg, *overwrite),
        Command::Report(f) => {
            println!("{}", ComparisonReport::load(&store, &f.filter())?);
            Ok(true)
        }
        Command::Export { out_dir, filter } => export(&store, out_dir, &filter.filter()).map(|()| true),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_PARTITION_FAILURE),
        Err(e) => {
            tracing::error!(kind = %e.kind(), "{e}");
            eprintln!("error: {e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
