use std::{fs, path::PathBuf};

use corpus_lib::{CorpusStore, PipelineConfig};
use tesseract_lib::{Engine, EngineError, fs::dir_exists};
use tracing::{info, warn};

use crate::error::StageError;

/// Combines the inventory with script data into the seed model.
///
/// The seed artifact on disk decides success: a stale one is removed first,
/// and a tool that exits non-zero but still writes it is only warned about.
pub fn build_seed(engine: &dyn Engine, store: &CorpusStore, config: &PipelineConfig) -> Result<PathBuf, StageError> {
    let inventory = store.inventory_path();
    if !inventory.is_file() {
        return Err(StageError::MissingPrecondition(inventory));
    }
    let seed_dir = store.seed_dir();
    dir_exists(&seed_dir, true).map_err(StageError::io(&seed_dir))?;

    let seed = engine.seed_model_path(&seed_dir, &config.model_name);
    if seed.exists() {
        fs::remove_file(&seed).map_err(StageError::io(&seed))?;
    }

    match engine.build_seed_model(&inventory, &config.script_dir, &config.model_name, &seed_dir) {
        Ok(()) => {}
        Err(err @ EngineError::Failed { .. }) => warn!(error = %err, "seed builder reported a failure"),
        Err(err) => return Err(err.into()),
    }

    if !seed.is_file() {
        return Err(StageError::SeedBuild(seed));
    }
    info!(seed = %seed.display(), "seed model ready");
    Ok(seed)
}
