//! BrainWeb tDCS Surrogate Application
//!
//! Batch entry point of the conductivity surrogate pipeline. Each unit of
//! work reads `<data dir>/experiments/roi-<ROI>_anode-<A>_cathode-<C>.csv`
//! and writes the matching `_gpr.csv` surrogate table next to it.
//!
//! # Usage
//!
//! ```bash
//! # One experiment
//! brainweb-tdcs run --roi MC --anode C3 --cathode C4 --data-dir data/
//!
//! # Every registered experiment of one ROI, with a config file
//! BRAINWEB_TDCS_DATA_DIR=data/ brainweb-tdcs batch --roi dlPFC --config surrogate.toml
//!
//! # List the registry
//! brainweb-tdcs experiments
//! ```
//!
//! The exit code tells the orchestrator what failed: 2 configuration,
//! 3 data consistency, 4 numerical, 5 input format, 6 I/O (retryable).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use brainweb_tdcs_core::{ConfigError, Experiment, FieldQuantity, EXPERIMENTS, TISSUES};
use brainweb_tdcs_native::{
    table, ErrorKind, SurrogateConfig, SurrogateError, SurrogatePipeline, SurrogateResult,
};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// BrainWeb tDCS surrogate pipeline
#[derive(Parser, Debug)]
#[command(name = "brainweb-tdcs")]
#[command(author, version, about = "tDCS conductivity surrogate pipeline", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the surrogate table of one (ROI, anode, cathode) experiment
    Run {
        /// Region of interest (MC, dlPFC, vmPFC, IPS)
        #[arg(long)]
        roi: String,

        /// Nominal anode label
        #[arg(long)]
        anode: String,

        /// Cathode label
        #[arg(long)]
        cathode: String,

        /// Extraction table; defaults to the experiment's file in the data directory
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        io: DirectoryArgs,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Build the surrogate tables of every registered experiment
    Batch {
        /// Only experiments targeting this ROI
        #[arg(long)]
        roi: Option<String>,

        #[command(flatten)]
        io: DirectoryArgs,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// List the registered experiments
    Experiments {
        /// Only experiments targeting this ROI
        #[arg(long)]
        roi: Option<String>,
    },
}

#[derive(Args, Debug)]
struct DirectoryArgs {
    /// Study data directory; extraction tables live in its `experiments/`
    #[arg(long, env = "BRAINWEB_TDCS_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Directory for surrogate tables; defaults to `<data dir>/experiments`
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl DirectoryArgs {
    fn input(&self, experiment: &Experiment) -> PathBuf {
        experiment.data_path(&self.data_dir)
    }

    fn output(&self, experiment: &Experiment) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.join(experiment.surrogate_file_name()),
            None => experiment.surrogate_path(&self.data_dir),
        }
    }
}

/// Configuration file and per-field overrides
#[derive(Args, Debug)]
struct SettingsArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// New conductivity design points
    #[arg(long)]
    samples: Option<usize>,

    /// Halton design seed (0 = unrotated sequence)
    #[arg(long)]
    design_seed: Option<u64>,

    /// CDF inversion grid resolution
    #[arg(long)]
    grid_resolution: Option<usize>,

    /// Comma-separated field quantities to regress (e.g. e,e_r)
    #[arg(long, value_delimiter = ',')]
    vois: Option<Vec<FieldQuantity>>,

    /// Randomised optimizer restarts
    #[arg(long)]
    restarts: Option<usize>,

    /// Kernel diagonal noise
    #[arg(long)]
    noise: Option<f64>,

    /// Seed of the optimizer restarts
    #[arg(long)]
    gp_seed: Option<u64>,
}

impl SettingsArgs {
    /// File configuration (or defaults) with command-line overrides applied
    fn resolve(&self) -> anyhow::Result<SurrogateConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SurrogateConfig::default(),
        };

        if let Some(samples) = self.samples {
            config.new_samples = samples;
        }
        if let Some(seed) = self.design_seed {
            config.design_seed = seed;
        }
        if let Some(resolution) = self.grid_resolution {
            config.grid_resolution = resolution;
        }
        if let Some(vois) = &self.vois {
            config.vois.clone_from(vois);
        }
        if let Some(restarts) = self.restarts {
            config.gpr.restarts = restarts;
        }
        if let Some(noise) = self.noise {
            config.gpr.noise = noise;
        }
        if let Some(seed) = self.gp_seed {
            config.gpr.seed = seed;
        }

        Ok(config)
    }
}

fn load_config(path: &Path) -> anyhow::Result<SurrogateConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {err}");
    }

    info!("BrainWeb tDCS v{}", env!("CARGO_PKG_VERSION"));

    match execute(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            exit_code(&err)
        }
    }
}

fn execute(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run { roi, anode, cathode, input, io, settings } => {
            let experiment =
                Experiment::from_parts(&roi, &anode, &cathode).map_err(SurrogateError::from)?;
            let pipeline = SurrogatePipeline::new(settings.resolve()?, &TISSUES)?;
            let input = input.unwrap_or_else(|| io.input(&experiment));

            run_experiment(&pipeline, &experiment, &input, &io.output(&experiment))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Batch { roi, io, settings } => {
            if let Some(name) = &roi {
                brainweb_tdcs_core::find_roi(name).map_err(SurrogateError::from)?;
            }
            let pipeline = SurrogatePipeline::new(settings.resolve()?, &TISSUES)?;
            Ok(run_batch(&pipeline, roi.as_deref(), &io))
        }
        Commands::Experiments { roi } => {
            for experiment in selected(roi.as_deref()) {
                let kind = if experiment.bipolar { "bipolar" } else { "monopolar" };
                let electrodes: Vec<String> =
                    experiment.electrodes().into_iter().map(|(_, name)| name).collect();
                println!(
                    "{:<6} {:<8} {:<10} {:<22} {}",
                    experiment.roi.name,
                    experiment.montage(),
                    kind,
                    electrodes.join(","),
                    experiment.surrogate_file_name()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn selected(roi: Option<&str>) -> impl Iterator<Item = &'static Experiment> + '_ {
    EXPERIMENTS.iter().filter(move |e| roi.map_or(true, |name| e.roi.name == name))
}

/// One unit of work: read, fit, write.
///
/// Quantities that fitted are written even when another failed; the first
/// failure is then returned.
fn run_experiment(
    pipeline: &SurrogatePipeline,
    experiment: &Experiment,
    input: &Path,
    output: &Path,
) -> SurrogateResult<()> {
    info!(%experiment, input = %input.display(), "Starting experiment");

    let records = table::read_records(input)?;
    let run = pipeline.run(&records)?;

    if !run.quantities.is_empty() {
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)
                .map_err(|source| SurrogateError::Io { path: dir.to_path_buf(), source })?;
        }
        table::write_surrogate_records(output, &run)?;
    }

    match run.failures.into_values().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Run every selected experiment, isolating failures per unit
fn run_batch(pipeline: &SurrogatePipeline, roi: Option<&str>, io: &DirectoryArgs) -> ExitCode {
    let mut completed = 0usize;
    let mut first_failure: Option<ErrorKind> = None;

    for experiment in selected(roi) {
        match run_experiment(pipeline, experiment, &io.input(experiment), &io.output(experiment)) {
            Ok(()) => completed += 1,
            Err(err) => {
                warn!(
                    %experiment,
                    kind = %err.kind(),
                    retryable = err.is_retryable(),
                    "Experiment failed: {err}"
                );
                first_failure.get_or_insert(err.kind());
            }
        }
    }

    let total = selected(roi).count();
    info!(completed, failed = total - completed, "Batch finished");

    first_failure.map_or(ExitCode::SUCCESS, kind_exit_code)
}

fn kind_exit_code(kind: ErrorKind) -> ExitCode {
    let code = match kind {
        ErrorKind::Configuration => 2,
        ErrorKind::DataConsistency => 3,
        ErrorKind::Numerical => 4,
        ErrorKind::InputFormat => 5,
        ErrorKind::Io => 6,
    };
    ExitCode::from(code)
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<SurrogateError>() {
        kind_exit_code(err.kind())
    } else if err.downcast_ref::<ConfigError>().is_some()
        || err.downcast_ref::<toml::de::Error>().is_some()
    {
        kind_exit_code(ErrorKind::Configuration)
    } else {
        ExitCode::FAILURE
    }
}
