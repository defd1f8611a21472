use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Where an `lstmtraining` run picks up its weights.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContinueFrom {
    /// Resume an existing checkpoint lineage.
    Checkpoint(PathBuf),
    /// Fine-tune a pretrained model (`.traineddata` or an extracted `.lstm`).
    Pretrained(PathBuf),
    /// Train a fresh network described by a VGSL spec.
    Scratch { net_spec: String },
}

/// One bounded training invocation.
#[derive(Clone, Debug)]
pub struct TrainRequest {
    pub seed_model: PathBuf,
    pub continue_from: ContinueFrom,
    /// Sample manifest: one corpus base path per line.
    pub manifest: PathBuf,
    /// Checkpoint prefix; see [`Engine::checkpoint_path`].
    pub model_output: PathBuf,
    pub max_iterations: u32,
    pub psm: u8,
}

/// Capabilities the pipeline needs from a recognition engine.
///
/// Every method runs to completion before returning. Callers verify produced
/// artifacts on disk instead of relying on a reported success alone.
pub trait Engine: Send + Sync {
    /// Fails with [`EngineError::ToolMissing`] when any required tool is absent.
    fn check_available(&self) -> Result<(), EngineError>;

    /// Writes character boxes for `image` to `<out_base>.box` and returns that path.
    fn extract_boxes(&self, image: &Path, out_base: &Path, psm: u8) -> Result<PathBuf, EngineError>;

    /// Derives the symbol inventory file from a set of box files.
    fn build_inventory(&self, box_files: &[PathBuf], output: &Path) -> Result<(), EngineError>;

    /// Combines an inventory with script data into a seed model under `output_dir`.
    fn build_seed_model(&self, inventory: &Path, script_dir: &Path, name: &str, output_dir: &Path) -> Result<(), EngineError>;

    fn train(&self, request: &TrainRequest) -> Result<(), EngineError>;

    /// Converts a checkpoint into a deployable model at `output`.
    fn finalize(&self, checkpoint: &Path, seed_model: &Path, output: &Path) -> Result<(), EngineError>;

    /// Recognizes `image` with model `name` loaded from `model_dir`.
    fn infer(&self, model_dir: &Path, name: &str, image: &Path, psm: u8) -> Result<String, EngineError>;

    /// Path where [`Engine::build_seed_model`] leaves the seed model.
    fn seed_model_path(&self, output_dir: &Path, name: &str) -> PathBuf {
        output_dir.join(name).join(format!("{name}.traineddata"))
    }

    /// Checkpoint written by [`Engine::train`] for a given `model_output` prefix.
    fn checkpoint_path(&self, model_output: &Path) -> PathBuf {
        with_suffix(model_output, "_checkpoint")
    }
}

/// Appends `suffix` to the last path component without touching dots in it.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}
