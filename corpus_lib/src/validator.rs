use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::{error::CorpusError, store::CorpusStore};

/// Pairing state of a corpus directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub image_count: usize,
    pub missing_transcript: Vec<PathBuf>,
    pub missing_image: Vec<PathBuf>,
    /// Bases present under more than one image extension.
    pub duplicate_images: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.image_count > 0
            && self.missing_transcript.is_empty()
            && self.missing_image.is_empty()
            && self.duplicate_images.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.image_count == 0 {
            return "no images found".to_string();
        }
        let mut parts = vec![format!("{} images", self.image_count)];
        if let Some(first) = self.missing_transcript.first() {
            parts.push(format!("{} without transcript (first: {})", self.missing_transcript.len(), first.display()));
        }
        if let Some(first) = self.missing_image.first() {
            parts.push(format!("{} transcripts without image (first: {})", self.missing_image.len(), first.display()));
        }
        if let Some(first) = self.duplicate_images.first() {
            parts.push(format!("{} bases with several images (first: {first})", self.duplicate_images.len()));
        }
        parts.join(", ")
    }
}

/// Checks that every image has exactly one transcript and vice versa.
/// Read-only; defects are reported, never repaired.
pub fn validate(store: &CorpusStore) -> Result<ValidationReport, CorpusError> {
    let scan = store.scan()?;
    let mut report = ValidationReport {
        image_count: scan.images.values().map(Vec::len).sum(),
        ..ValidationReport::default()
    };

    for (base, images) in &scan.images {
        if images.len() > 1 {
            report.duplicate_images.push(base.clone());
        }
        if !scan.transcripts.contains_key(base) {
            report.missing_transcript.extend(images.iter().cloned());
        }
    }
    report.missing_image = scan
        .transcripts
        .iter()
        .filter(|(base, _)| !scan.images.contains_key(*base))
        .map(|(_, path)| path.clone())
        .collect();

    if !report.is_clean() {
        warn!(report = %report.summary(), "corpus validation failed");
        return Err(CorpusError::Structural(report));
    }
    info!(images = report.image_count, "corpus is consistent");
    Ok(report)
}
