use std::path::PathBuf;

use images::ImageError;
use thiserror::Error;

use crate::validator::ValidationReport;

#[derive(Error, Debug)]
pub enum CorpusError {
    /// Authoring defect a human has to fix: empty corpus or unpaired files.
    #[error("corpus structure is broken: {}", .0.summary())]
    Structural(ValidationReport),

    #[error("entry `{base}` is malformed: {reason}")]
    MalformedEntry { base: String, reason: String },

    #[error("no single-line entries to list in {0}")]
    EmptyManifest(PathBuf),

    #[error("{failed} of {total} multi-line entries could not be split")]
    SplitFailed { failed: usize, total: usize },

    #[error("backup {0} already exists; refusing to overwrite an archived original")]
    BackupExists(PathBuf),

    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl CorpusError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
