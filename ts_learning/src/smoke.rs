use std::{
    fs,
    path::{Path, PathBuf},
};

use corpus_lib::{PipelineConfig, entry::transcript_lines, manifest::SampleManifest, store::TRANSCRIPT_SUFFIX};
use serde::Serialize;
use tesseract_lib::{Engine, engine::with_suffix, fs::find_image};
use tracing::info;

use crate::error::StageError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SmokeResult {
    pub image: PathBuf,
    pub recognized: String,
    pub expected: String,
    /// Levenshtein distance over characters divided by the expected length.
    pub cer: Option<f64>,
}

pub fn character_error_rate(expected: &str, recognized: &str) -> Option<f64> {
    let expected_len = expected.chars().count();
    if expected_len == 0 {
        return None;
    }
    Some(strsim::levenshtein(expected, recognized) as f64 / expected_len as f64)
}

/// Recognizes the first manifest sample with the final model.
pub fn smoke_test(
    engine: &dyn Engine,
    config: &PipelineConfig,
    manifest: &SampleManifest,
    final_model: &Path,
) -> Result<SmokeResult, StageError> {
    let base = manifest.first().ok_or_else(|| StageError::MissingPrecondition(manifest.path.clone()))?;
    let image = find_image(base).ok_or_else(|| StageError::MissingPrecondition(base.clone()))?;
    let model_dir = final_model.parent().unwrap_or(Path::new("."));

    let recognized = engine.infer(model_dir, &config.model_name, &image, config.psm)?.trim().to_string();
    let transcript = with_suffix(base, TRANSCRIPT_SUFFIX);
    let expected = fs::read_to_string(&transcript)
        .map(|contents| transcript_lines(&contents).join("\n"))
        .map_err(StageError::io(&transcript))?;
    let cer = character_error_rate(&expected, &recognized);

    info!(image = %image.display(), %recognized, %expected, cer = ?cer, "smoke test");
    Ok(SmokeResult { image, recognized, expected, cer })
}
