//! Fine-tuning pipeline for Tesseract LSTM line models.
//!
//! Stages run in order against one corpus directory: validate, split
//! multi-line samples, extract boxes and the symbol inventory, build the seed
//! model, write the sample manifest, train (resuming from the checkpoint when
//! one exists), finalize and smoke-test the result.

pub mod driver;
pub mod error;
pub mod features;
pub mod history;
pub mod seed;
pub mod smoke;
pub mod training;

#[cfg(test)]
pub(crate) mod fake;

pub use driver::{Pipeline, PipelineReport};
pub use error::{PipelineError, Stage, StageError};
