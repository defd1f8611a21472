//! Recognition-engine boundary for the training pipeline.
//!
//! [`engine::Engine`] is the capability set the pipeline needs from an OCR
//! engine; [`commands::TesseractEngine`] implements it on top of the
//! Tesseract command-line tools.

pub mod boxfile;
pub mod commands;
pub mod engine;
pub mod error;
pub mod fs;

pub use commands::TesseractEngine;
pub use engine::{ContinueFrom, Engine, TrainRequest};
pub use error::EngineError;
