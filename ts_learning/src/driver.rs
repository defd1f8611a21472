//! Sequences the stages against one corpus and records every outcome.

use std::path::PathBuf;

use corpus_lib::{
    CorpusStore, PipelineConfig,
    manifest::build_manifest,
    splitter::{SplitSummary, split_corpus},
    validator::validate,
};
use serde::Serialize;
use tesseract_lib::Engine;
use tracing::{error, info, warn};

use crate::{
    error::{PipelineError, Stage, StageError},
    features::extract_features,
    history::{RunHistory, StageStatus},
    seed::build_seed,
    smoke::{SmokeResult, smoke_test},
    training::TrainingOrchestrator,
};

#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineReport {
    pub corpus_root: PathBuf,
    pub model_name: String,
    pub images: usize,
    pub split: Option<SplitSummary>,
    pub box_files: usize,
    pub extraction_failures: Vec<String>,
    pub symbols: usize,
    pub seed_model: PathBuf,
    pub manifest: PathBuf,
    pub samples: usize,
    /// Entries left out of the manifest because their box extraction failed.
    pub excluded_samples: usize,
    pub checkpoint: PathBuf,
    pub final_model: PathBuf,
    pub smoke: Option<SmokeResult>,
}

pub struct Pipeline<'a> {
    engine: &'a dyn Engine,
    config: &'a PipelineConfig,
    store: CorpusStore,
    history: RunHistory,
}

impl<'a> Pipeline<'a> {
    pub fn new(engine: &'a dyn Engine, config: &'a PipelineConfig) -> Result<Self, PipelineError> {
        let store = CorpusStore::open(&config.corpus_root).map_err(|err| PipelineError {
            stage: Stage::Preflight,
            source: err.into(),
        })?;
        let history = RunHistory::new(store.history_path());
        Ok(Self { engine, config, store, history })
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    fn note(&self, stage: Stage, status: StageStatus, detail: &str) {
        if let Err(err) = self.history.record(stage, status, detail) {
            warn!(path = %self.history.path().display(), error = %err, "cannot append run history");
        }
    }

    fn record<T>(
        &self,
        stage: Stage,
        result: Result<T, StageError>,
        status: impl FnOnce(&T) -> StageStatus,
    ) -> Result<T, PipelineError> {
        match result {
            Ok(value) => {
                self.note(stage, status(&value), "");
                Ok(value)
            }
            Err(source) => {
                error!(%stage, error = %source, "stage failed");
                self.note(stage, StageStatus::Failed, &source.to_string());
                Err(PipelineError { stage, source })
            }
        }
    }

    fn stage<T>(&self, stage: Stage, run: impl FnOnce() -> Result<T, StageError>) -> Result<T, PipelineError> {
        info!(%stage, "stage started");
        self.record(stage, run(), |_| StageStatus::Ok)
    }

    /// Like [`Pipeline::stage`], recorded as skipped when there was nothing to do.
    fn optional_stage<T>(
        &self,
        stage: Stage,
        run: impl FnOnce() -> Result<Option<T>, StageError>,
    ) -> Result<Option<T>, PipelineError> {
        info!(%stage, "stage started");
        self.record(stage, run(), |value| match value {
            Some(_) => StageStatus::Ok,
            None => StageStatus::Skipped,
        })
    }

    /// Runs every stage in order. Stage failures abort; the smoke test only
    /// warns.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let config = self.config;
        let store = &self.store;
        let mut report = PipelineReport {
            corpus_root: store.root().to_path_buf(),
            model_name: config.model_name.clone(),
            ..PipelineReport::default()
        };

        self.stage(Stage::Preflight, || Ok(self.engine.check_available()?))?;
        let validation = self.stage(Stage::Validate, || Ok(validate(store)?))?;
        report.images = validation.image_count;

        let split = self.optional_stage(Stage::Split, || {
            let needs_split = store.entries()?.iter().any(|entry| entry.is_multiline(config.split_threshold));
            if !needs_split {
                info!("no multi-line entries");
                return Ok(None);
            }
            Ok(Some(split_corpus(store, config.split_threshold)?))
        })?;
        if let Some(summary) = split {
            let validation = self.stage(Stage::Validate, || Ok(validate(store)?))?;
            report.images = validation.image_count;
            report.split = Some(summary);
        }

        let extraction = self.stage(Stage::Extract, || {
            let entries = store.entries()?;
            extract_features(self.engine, store, &entries, config.psm)
        })?;
        report.box_files = extraction.box_files.len();
        report.symbols = extraction.inventory.len();

        let seed = self.stage(Stage::Seed, || build_seed(self.engine, store, config))?;
        report.seed_model = seed.clone();

        let manifest = self.stage(Stage::Manifest, || {
            let (eligible, excluded): (Vec<_>, Vec<_>) = store
                .entries()?
                .into_iter()
                .partition(|entry| !extraction.failed.contains(&entry.base));
            if !excluded.is_empty() {
                warn!(excluded = excluded.len(), "leaving samples without box files out of training");
            }
            report.excluded_samples = excluded.len();
            Ok(build_manifest(store, &eligible, config.split_threshold)?)
        })?;
        report.manifest = manifest.path.clone();
        report.samples = manifest.len();
        report.extraction_failures = extraction.failed;

        let orchestrator = TrainingOrchestrator::new(self.engine, store, config);
        report.checkpoint = self.stage(Stage::Train, || orchestrator.train(&seed, &manifest.path))?;
        report.final_model = self.stage(Stage::Finalize, || orchestrator.finalize(&seed))?;

        match smoke_test(self.engine, config, &manifest, &report.final_model) {
            Ok(result) => {
                self.note(Stage::Smoke, StageStatus::Ok, &result.recognized);
                report.smoke = Some(result);
            }
            Err(err) => {
                warn!(error = %err, "smoke test failed");
                self.note(Stage::Smoke, StageStatus::Warning, &err.to_string());
            }
        }

        info!(
            model = %report.final_model.display(),
            samples = report.samples,
            symbols = report.symbols,
            "pipeline finished"
        );
        Ok(report)
    }
}
