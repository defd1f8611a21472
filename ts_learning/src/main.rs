//! Tesseract LSTM fine-tuning binary (`ts_learning`).
//!
//! `run` drives the whole pipeline over a ground-truth directory of
//! `<base>.png` / `<base>.gt.txt` pairs and leaves `<model>.traineddata` in
//! it. `validate`, `split` and `restore` expose the corpus preparation steps
//! on their own; `config` writes the resolved settings as JSON.

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use corpus_lib::{CorpusStore, PipelineConfig, splitter, validator};
use serde::Serialize;
use tesseract_lib::TesseractEngine;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use ts_learning::{Pipeline, PipelineReport};

const DEFAULT_FILTER: &str = "ts_learning=info,corpus_lib=info,tesseract_lib=info";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate, split, extract, build the seed, train, finalize and smoke-test.
    Run {
        #[command(flatten)]
        settings: Settings,
        /// Print the run report as JSON on stdout.
        #[arg(long)]
        report_json: bool,
    },
    /// Check image/transcript pairing only.
    Validate {
        #[command(flatten)]
        settings: Settings,
    },
    /// Split multi-line samples into single-line ones.
    Split {
        #[command(flatten)]
        settings: Settings,
    },
    /// Move archived multi-line originals back and drop their split lines.
    Restore {
        #[command(flatten)]
        settings: Settings,
    },
    /// Write the resolved configuration as JSON.
    Config {
        #[command(flatten)]
        settings: Settings,
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Config file plus per-field overrides. Flags win over the file.
#[derive(Args, Debug)]
struct Settings {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory with the ground-truth pairs.
    #[arg(long)]
    corpus: Option<PathBuf>,
    #[arg(short, long)]
    model: Option<String>,
    /// Pretrained `.traineddata` (or `.lstm`) to fine-tune.
    #[arg(long)]
    base_model: Option<PathBuf>,
    /// VGSL spec for training from scratch.
    #[arg(long)]
    net_spec: Option<String>,
    #[arg(long)]
    max_iterations: Option<u32>,
    #[arg(long)]
    psm: Option<u8>,
    #[arg(long)]
    split_threshold: Option<usize>,
    #[arg(long)]
    script_dir: Option<PathBuf>,
    /// Directory of the Tesseract executables; falls back to `TESSDIR`.
    #[arg(long)]
    tool_dir: Option<PathBuf>,
    #[arg(long)]
    tessdata_dir: Option<PathBuf>,
}

impl Settings {
    fn resolve(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::read(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(corpus) = self.corpus {
            config.corpus_root = corpus;
        }
        if let Some(model) = self.model {
            config.model_name = model;
        }
        if self.base_model.is_some() {
            config.base_model = self.base_model;
        }
        if self.net_spec.is_some() {
            config.net_spec = self.net_spec;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(psm) = self.psm {
            config.psm = psm;
        }
        if let Some(split_threshold) = self.split_threshold {
            config.split_threshold = split_threshold;
        }
        if let Some(script_dir) = self.script_dir {
            config.script_dir = script_dir;
        }
        if self.tool_dir.is_some() {
            config.tool_dir = self.tool_dir;
        }
        if config.tool_dir.is_none() {
            config.tool_dir = env::var_os("TESSDIR").map(PathBuf::from);
        }
        if self.tessdata_dir.is_some() {
            config.tessdata_dir = self.tessdata_dir;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    let engine = TesseractEngine::new(config.tool_dir.clone(), config.tessdata_dir.clone());
    let report = Pipeline::new(&engine, config)?.run()?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { settings, report_json } => {
            let config = settings.resolve()?;
            let checkpoints = CorpusStore::new(&config.corpus_root).checkpoint_dir();
            info!(corpus = %config.corpus_root.display(), model = %config.model_name, "pipeline started");

            // Training blocks for a long time; keep the runtime free to
            // observe Ctrl-C meanwhile.
            let task = tokio::task::spawn_blocking(move || run_pipeline(&config));
            tokio::select! {
                joined = task => {
                    let report = joined.context("pipeline task panicked")??;
                    if report_json {
                        print_json(&report)?;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!(checkpoints = %checkpoints.display(), "interrupted; rerun to resume from the last checkpoint");
                    std::process::exit(130);
                }
            }
        }
        Command::Validate { settings } => {
            let config = settings.resolve()?;
            let store = CorpusStore::open(&config.corpus_root)?;
            let report = validator::validate(&store)?;
            print_json(&report)?;
        }
        Command::Split { settings } => {
            let config = settings.resolve()?;
            let store = CorpusStore::open(&config.corpus_root)?;
            validator::validate(&store)?;
            let summary = splitter::split_corpus(&store, config.split_threshold)?;
            validator::validate(&store)?;
            print_json(&summary)?;
        }
        Command::Restore { settings } => {
            let config = settings.resolve()?;
            let store = CorpusStore::open(&config.corpus_root)?;
            let summary = splitter::restore(&store)?;
            print_json(&summary)?;
        }
        Command::Config { settings, output } => {
            let config = settings.resolve()?;
            config.save(&output)?;
            info!(path = %output.display(), "configuration written");
        }
    }
    Ok(())
}
