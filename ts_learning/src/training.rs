//! Training orchestration: NotStarted → Running → Finalized.
//!
//! The lifecycle is persisted in `checkpoints/training_state.json`. The
//! checkpoint itself is owned by the engine; the orchestrator only decides
//! what a run continues from and never deletes it.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use corpus_lib::{CorpusStore, PipelineConfig};
use serde::{Deserialize, Serialize};
use tesseract_lib::{ContinueFrom, Engine, EngineError, TrainRequest, engine::with_suffix, fs::dir_exists};
use tracing::{info, warn};

use crate::error::StageError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    #[default]
    NotStarted,
    Running,
    Finalized,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingState {
    pub model: String,
    pub phase: TrainingPhase,
    /// Training invocations started for this model.
    pub runs: u32,
    pub max_iterations: u32,
    /// `checkpoint`, `pretrained` or `scratch`.
    pub continued_from: Option<String>,
    pub final_model: Option<PathBuf>,
    pub updated: Option<DateTime<Local>>,
}

impl TrainingState {
    /// A missing state file is a model that never started training.
    pub fn load(path: &Path) -> Result<Self, StageError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).map_err(StageError::io(path))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StageError::State {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StageError> {
        if let Some(dir) = path.parent() {
            dir_exists(dir, true).map_err(StageError::io(dir))?;
        }
        let file = File::create(path).map_err(StageError::io(path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| StageError::State {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(StageError::io(path))
    }
}

fn base_kind(continue_from: &ContinueFrom) -> &'static str {
    match continue_from {
        ContinueFrom::Checkpoint(_) => "checkpoint",
        ContinueFrom::Pretrained(_) => "pretrained",
        ContinueFrom::Scratch { .. } => "scratch",
    }
}

pub struct TrainingOrchestrator<'a> {
    engine: &'a dyn Engine,
    store: &'a CorpusStore,
    config: &'a PipelineConfig,
}

impl<'a> TrainingOrchestrator<'a> {
    pub fn new(engine: &'a dyn Engine, store: &'a CorpusStore, config: &'a PipelineConfig) -> Self {
        Self { engine, store, config }
    }

    pub fn checkpoint(&self) -> PathBuf {
        self.engine.checkpoint_path(&self.store.model_output(&self.config.model_name))
    }

    pub fn state(&self) -> Result<TrainingState, StageError> {
        TrainingState::load(&self.store.training_state_path())
    }

    fn update_state(&self, change: impl FnOnce(&mut TrainingState)) -> Result<TrainingState, StageError> {
        let path = self.store.training_state_path();
        let mut state = TrainingState::load(&path)?;
        state.model = self.config.model_name.clone();
        change(&mut state);
        state.updated = Some(Local::now());
        state.save(&path)?;
        Ok(state)
    }

    /// An existing checkpoint wins over the pretrained model, which wins
    /// over a network spec.
    pub fn continue_from(&self) -> Result<ContinueFrom, StageError> {
        let checkpoint = self.checkpoint();
        if checkpoint.is_file() {
            return Ok(ContinueFrom::Checkpoint(checkpoint));
        }
        if let Some(base) = &self.config.base_model {
            if !base.is_file() {
                return Err(StageError::MissingPrecondition(base.clone()));
            }
            return Ok(ContinueFrom::Pretrained(base.clone()));
        }
        if let Some(net_spec) = &self.config.net_spec {
            return Ok(ContinueFrom::Scratch { net_spec: net_spec.clone() });
        }
        Err(StageError::MissingBase)
    }

    /// Runs one bounded training invocation and returns the checkpoint.
    pub fn train(&self, seed_model: &Path, manifest: &Path) -> Result<PathBuf, StageError> {
        for required in [seed_model, manifest] {
            if !required.is_file() {
                return Err(StageError::MissingPrecondition(required.to_path_buf()));
            }
        }
        let continue_from = self.continue_from()?;
        let checkpoint_dir = self.store.checkpoint_dir();
        dir_exists(&checkpoint_dir, true).map_err(StageError::io(&checkpoint_dir))?;

        let kind = base_kind(&continue_from);
        // Recorded before the engine call so an interrupted run stays resumable.
        self.update_state(|state| {
            state.phase = TrainingPhase::Running;
            state.runs += 1;
            state.max_iterations = self.config.max_iterations;
            state.continued_from = Some(kind.to_string());
        })?;
        info!(
            model = %self.config.model_name,
            from = kind,
            max_iterations = self.config.max_iterations,
            "training"
        );

        let request = TrainRequest {
            seed_model: seed_model.to_path_buf(),
            continue_from,
            manifest: manifest.to_path_buf(),
            model_output: self.store.model_output(&self.config.model_name),
            max_iterations: self.config.max_iterations,
            psm: self.config.psm,
        };
        self.engine.train(&request)?;

        let checkpoint = self.checkpoint();
        if !checkpoint.is_file() {
            return Err(StageError::NoCheckpoint(checkpoint));
        }
        Ok(checkpoint)
    }

    /// Converts the checkpoint into `<model>.traineddata`.
    ///
    /// The engine writes to a staging file that replaces the final model only
    /// once it exists, so a failed run leaves the previous model in place. The
    /// staging file decides success, not the tool's exit status.
    pub fn finalize(&self, seed_model: &Path) -> Result<PathBuf, StageError> {
        let checkpoint = self.checkpoint();
        if !checkpoint.is_file() {
            return Err(StageError::MissingPrecondition(checkpoint));
        }
        let output = self.store.final_model_path(&self.config.model_name);
        let staging = with_suffix(&output, ".partial");
        if staging.exists() {
            fs::remove_file(&staging).map_err(StageError::io(&staging))?;
        }

        match self.engine.finalize(&checkpoint, seed_model, &staging) {
            Ok(()) => {}
            Err(err @ EngineError::Failed { .. }) => warn!(error = %err, "finalizer reported a failure"),
            Err(err) => {
                let _ = fs::remove_file(&staging);
                return Err(err.into());
            }
        }
        if !staging.is_file() {
            return Err(StageError::Finalization(output));
        }
        if output.exists() {
            warn!(model = %output.display(), "replacing the previous final model");
        }
        fs::rename(&staging, &output).map_err(StageError::io(&output))?;

        self.update_state(|state| {
            state.phase = TrainingPhase::Finalized;
            state.final_model = Some(output.clone());
        })?;
        info!(model = %output.display(), "final model written");
        Ok(output)
    }
}
