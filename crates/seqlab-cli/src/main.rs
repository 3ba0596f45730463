use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use seqlab_core::{
    CpuBackend, ErrorAccumulator, ExperimentConfig, ProgressObserver, Session, SessionReport,
    SynthSpec, bootstrap, generate,
};
use seqlab_store::{RunStore, load_dataset, load_experiment, open_history, write_dataset};

#[derive(Parser)]
#[command(name = "seqlab", about = "Train and score online sequence predictors")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a dataset and score next-step predictions
    Run(RunArgs),

    /// Summarize the splits of a dataset file
    Inspect {
        /// Dataset JSON file
        dataset: PathBuf,
    },

    /// Write a synthetic note dataset with repeating motifs
    Synth(SynthArgs),

    /// List recorded runs, newest first
    History {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Print one JSON object per run
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Experiment TOML, or a dataset JSON to run with default settings
    config: PathBuf,

    /// Override the number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override how many leading sequences to use (0 = all)
    #[arg(long)]
    max_sequences: Option<usize>,

    /// Score this split instead of the configured one
    #[arg(long, conflicts_with = "no_eval")]
    eval_split: Option<String>,

    /// Train only
    #[arg(long)]
    no_eval: bool,

    /// Seed for engine weight initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Do not record this run in history
    #[arg(long)]
    no_record: bool,
}

#[derive(Args)]
struct SynthArgs {
    /// Output JSON path
    out: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Training sequences
    #[arg(long, default_value_t = 8)]
    train: usize,

    /// Held-out sequences (0 omits the test split)
    #[arg(long, default_value_t = 4)]
    test: usize,

    /// Timesteps per sequence
    #[arg(long, default_value_t = 32)]
    length: usize,

    /// Steps per motif cycle
    #[arg(long, default_value_t = 4)]
    period: usize,

    /// Distinct motifs to draw sequences from
    #[arg(long, default_value_t = 3)]
    motifs: usize,

    /// Notes per chord
    #[arg(long, default_value_t = 3)]
    chord_size: usize,

    /// Probability a step is replaced by silence
    #[arg(long, default_value_t = 0.0)]
    dropout: f64,
}

fn open_store() -> Result<RunStore> {
    open_history(None).context("failed to open run history")
}

fn rng_for(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Inspect { dataset } => cmd_inspect(dataset),
        Commands::Synth(args) => cmd_synth(args),
        Commands::History { limit, json } => cmd_history(*limit, *json),
    }
}

/// Prints progress lines to stdout as the session runs.
struct Console;

impl ProgressObserver for Console {
    fn sequence_trained(&mut self, _epoch: usize, sequence: usize, of: usize, _steps: usize) {
        println!("Training sequence {} out of {of} completed.", sequence + 1);
    }

    fn epoch_completed(&mut self, epoch: usize, of: usize) {
        println!("Training epoch {} out of {of} completed.", epoch + 1);
    }

    fn sequence_tested(&mut self, sequence: usize, of: usize, _acc: &ErrorAccumulator) {
        println!("Test sequence {} out of {of} tested.", sequence + 1);
    }
}

fn experiment_config(path: &Path) -> Result<ExperimentConfig> {
    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    if is_toml {
        load_experiment(path).with_context(|| format!("failed to load {}", path.display()))
    } else {
        Ok(ExperimentConfig::for_dataset(path))
    }
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    let mut config = experiment_config(&args.config)?;
    if let Some(epochs) = args.epochs {
        config.session.epochs = epochs;
    }
    if let Some(max) = args.max_sequences {
        config.session.max_sequences = max;
    }
    if let Some(split) = &args.eval_split {
        config.session.evaluate = true;
        config.session.eval_split = Some(split.clone());
    }
    if args.no_eval {
        config.session.evaluate = false;
    }
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }

    let experiment = config.resolve().context("invalid experiment")?;
    let dataset = load_dataset(&experiment.dataset)
        .with_context(|| format!("failed to load dataset {}", experiment.dataset.display()))?;

    let session = Session::new(&experiment.harness, experiment.layout, &experiment.plan);
    session.validate(&dataset)?;

    let mut rng = rng_for(experiment.seed);
    let mut engine = bootstrap(
        &CpuBackend,
        experiment.backend,
        &experiment.program,
        &experiment.engine,
        &mut rng,
    )
    .context("failed to bootstrap engine")?;
    tracing::info!(
        "engine ready: backend={}, program={}, input={}x{}",
        experiment.backend,
        experiment.program,
        experiment.engine.input_width,
        experiment.engine.input_height
    );

    let report = session.run_validated(&mut engine, &dataset, &mut Console)?;
    print_score(&report);

    if !args.no_record {
        let store = open_store()?;
        let id = store
            .record_run(&experiment, &report)
            .context("failed to record run")?;
        println!("run id: {id}");
    }
    Ok(())
}

fn print_score(report: &SessionReport) {
    let Some(eval) = &report.evaluation else {
        return;
    };
    match eval.error_percent() {
        Some(pct) => println!("Error percent: {pct}%"),
        None => {
            tracing::warn!("split '{}' produced no comparisons", eval.split);
            println!("Error percent: undefined (no comparisons)");
        }
    }
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let dataset =
        load_dataset(path).with_context(|| format!("failed to load dataset {}", path.display()))?;

    for split in dataset.summary() {
        println!("split:      {}", split.name);
        println!("sequences:  {}", split.sequences);
        println!("timesteps:  {}", split.timesteps);
        println!("length:     {}..={}", split.shortest, split.longest);
        match split.value_range {
            Some((lo, hi)) => println!("values:     {lo}..={hi}"),
            None => println!("values:     (none)"),
        }
        println!("max active: {}", split.max_active);
        println!();
    }
    Ok(())
}

fn cmd_synth(args: &SynthArgs) -> Result<()> {
    let spec = SynthSpec {
        motifs: args.motifs,
        period: args.period,
        length: args.length,
        train_sequences: args.train,
        test_sequences: args.test,
        chord_size: args.chord_size,
        dropout: args.dropout,
        ..SynthSpec::default()
    };

    let dataset = generate(&spec, &mut rng_for(args.seed)).context("failed to generate dataset")?;
    write_dataset(&args.out, &dataset)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    println!(
        "wrote {} ({} train, {} test sequences)",
        args.out.display(),
        spec.train_sequences,
        spec.test_sequences
    );
    Ok(())
}

fn cmd_history(limit: usize, json: bool) -> Result<()> {
    let store = open_store()?;
    let runs = store.recent_runs(limit).context("failed to list runs")?;

    if json {
        for run in &runs {
            println!("{}", serde_json::to_string(run)?);
        }
        return Ok(());
    }

    if runs.is_empty() {
        println!("(no runs recorded)");
        return Ok(());
    }
    for run in &runs {
        let score = match run.error_percent {
            Some(pct) => format!("{pct:.2}%"),
            None if run.eval_split.is_some() => "undefined".to_string(),
            None => "-".to_string(),
        };
        let label = if run.label.is_empty() {
            String::new()
        } else {
            format!(" [{}]", run.label)
        };
        println!(
            "{}  {}{}  {} epochs on '{}'  error {}  {}",
            run.started_at, run.id, label, run.epochs, run.train_split, score, run.dataset
        );
    }
    Ok(())
}
