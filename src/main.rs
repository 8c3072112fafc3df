use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sea_surface::deck;
use sea_surface::prelude::*;

/// Command-line tool to synthesize rough sea surfaces and stage TEMPER runs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage a run folder and generate every realization of a batch
    Run(RunArgs),
    /// Write a single surface realization
    Surface(SurfaceArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// XML configuration file
    #[arg(default_value = "configuration.xml")]
    config: PathBuf,

    /// Number of parallel workers
    #[arg(short, long, default_value_t = 3)]
    workers: usize,

    /// Directory holding the template input files
    #[arg(long, default_value = "../TEMPER_Inputs")]
    inputs: PathBuf,

    /// Run folder to stage and write into
    #[arg(short, long, default_value = "testFolder")]
    output: PathBuf,

    /// Solver binary; when omitted only the input files are written
    #[arg(long)]
    solver: Option<PathBuf>,

    /// Input deck template name
    #[arg(long, default_value = "base_input.in")]
    deck_template: String,

    /// Surface file template name
    #[arg(long, default_value = "surfaceinput.srf")]
    surface_template: String,

    /// Run file prefix (defaults to the wind speed, e.g. 10mps)
    #[arg(long)]
    prefix: Option<String>,

    /// Use the smooth sinusoid reference surface instead of random realizations
    #[arg(long)]
    smooth: bool,

    /// Let the solver generate the surface from this OSG input template,
    /// patching a fresh seed into every deck instead of writing surface files
    #[arg(long, conflicts_with = "smooth")]
    osg_template: Option<String>,
}

#[derive(Args, Debug)]
struct SurfaceArgs {
    /// XML configuration file
    #[arg(default_value = "configuration.xml")]
    config: PathBuf,

    /// Random seed (defaults to the configured seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Output file path
    #[arg(short, long, default_value = "surface.srf")]
    output: PathBuf,

    /// Use the smooth sinusoid reference surface
    #[arg(long)]
    smooth: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Run(args) => run_batch(args),
        Command::Surface(args) => write_surface(args),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load(path: &Path) -> Result<(SurveyConfig, SpectralParameters, ComputationParameters)> {
    let config = SurveyConfig::from_path(path)
        .with_context(|| format!("loading configuration {}", path.display()))?;
    let params = config.spectral_parameters()?;
    let computation = config.computation()?;
    Ok((config, params, computation))
}

fn run_batch(args: RunArgs) -> Result<()> {
    let (config, params, computation) = load(&args.config)?;

    info!(
        wind_speed = params.wind_speed,
        wave_age = params.wave_age,
        length = params.length,
        samples = params.samples,
        "sea state"
    );

    let folder = RunFolder::stage(
        &args.inputs,
        &args.output,
        &args.deck_template,
        &args.surface_template,
    )
    .context("staging run folder")?;

    let prefix = args.prefix.unwrap_or_else(|| config.file_prefix());
    let model = if let Some(template) = &args.osg_template {
        folder
            .stage_osg_input(&args.inputs, template)
            .context("staging OSG input")?;
        SurfaceModel::Osg
    } else if args.smooth {
        SurfaceModel::Smooth
    } else {
        SurfaceModel::Random
    };

    let summary = BatchRunner::new(params, computation, folder, prefix)
        .with_solver(args.solver)
        .with_model(model)
        .run(args.workers)?;

    info!(completed = summary.completed(), "batch done");
    Ok(())
}

fn write_surface(args: SurfaceArgs) -> Result<()> {
    let (_, params, computation) = load(&args.config)?;

    let surface = if args.smooth {
        smooth_surface(params.length, params.samples)?
    } else {
        let spectrum = params.spectrum()?;
        let mut rng = StdRng::seed_from_u64(args.seed.unwrap_or(computation.seed));
        SurfaceSynthesizer::from_parameters(&params)?.synthesize(&spectrum, &mut rng)?
    };

    let (low, high) = surface.height_range();
    info!(
        low,
        high,
        rms = surface.rms_height(),
        "surface height range"
    );

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    deck::write_surface_records(&mut out, &surface)?;
    out.flush()?;

    info!(path = %args.output.display(), samples = surface.len(), "surface written");
    Ok(())
}
