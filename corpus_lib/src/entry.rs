use std::{fs, path::PathBuf};

use serde::Serialize;

use crate::error::CorpusError;

/// One labeled sample: an image and its transcript sharing a base name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CorpusEntry {
    pub base: String,
    pub image: PathBuf,
    pub transcript: PathBuf,
    /// Transcript lines, trimmed, including interior blank lines.
    pub lines: Vec<String>,
}

impl CorpusEntry {
    /// Loads the transcript of a paired image.
    pub fn load(base: String, image: PathBuf, transcript: PathBuf) -> Result<Self, CorpusError> {
        let contents = fs::read_to_string(&transcript).map_err(CorpusError::io(&transcript))?;
        Ok(Self {
            base,
            image,
            transcript,
            lines: transcript_lines(&contents),
        })
    }

    /// Lines that occupy a band of the image, blank ones included.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn non_empty_lines(&self) -> usize {
        self.lines.iter().filter(|line| !line.is_empty()).count()
    }

    pub fn is_multiline(&self, threshold: usize) -> bool {
        self.non_empty_lines() > threshold
    }

    /// Base path without extension, as listed in the sample manifest.
    pub fn base_path(&self) -> PathBuf {
        self.image.with_file_name(&self.base)
    }
}

/// Splits transcript text into trimmed lines. Trailing blank lines come from
/// terminating newlines and are not part of the layout.
pub fn transcript_lines(contents: &str) -> Vec<String> {
    let mut lines: Vec<String> = contents.lines().map(|line| line.trim().to_string()).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}
