use std::{fmt, path::PathBuf};

use corpus_lib::CorpusError;
use serde::{Deserialize, Serialize};
use tesseract_lib::EngineError;
use thiserror::Error;

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preflight,
    Validate,
    Split,
    Extract,
    Seed,
    Manifest,
    Train,
    Finalize,
    Smoke,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preflight => "preflight",
            Stage::Validate => "validate",
            Stage::Split => "split",
            Stage::Extract => "extract",
            Stage::Seed => "seed",
            Stage::Manifest => "manifest",
            Stage::Train => "train",
            Stage::Finalize => "finalize",
            Stage::Smoke => "smoke",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no box files were produced ({failed} of {total} images failed)")]
    NoOutput { failed: usize, total: usize },

    #[error("seed model {0} was not produced")]
    SeedBuild(PathBuf),

    #[error("nothing to train from: no checkpoint, no base model and no network spec")]
    MissingBase,

    #[error("training finished without checkpoint {0}")]
    NoCheckpoint(PathBuf),

    #[error("final model {0} was not produced")]
    Finalization(PathBuf),

    #[error("required artifact {0} is missing")]
    MissingPrecondition(PathBuf),

    #[error("training state {path} is unreadable")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// A failed stage; the only error the driver returns.
#[derive(Error, Debug)]
#[error("{stage} stage failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}
