//! Minimal PNG image model used by the corpus tools.
//!
//! Images are kept as raw decoded scanlines plus the metadata needed to write
//! them back unchanged (palette, transparency, gamma, pixel density). Sources
//! in other formats are decoded through the `image` crate and converted into
//! the same model, so every derived sample is written as PNG.

pub mod algorythms;
pub mod error;
pub mod png;

pub use error::ImageError;
pub use crate::png::base::ImagePNG;
