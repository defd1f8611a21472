//! Corpus of (image, transcript) pairs and the preparation steps that run
//! before any engine work: validation, multi-line splitting and the training
//! sample manifest.

pub mod config;
pub mod entry;
pub mod error;
pub mod manifest;
pub mod splitter;
pub mod store;
pub mod validator;

pub use config::PipelineConfig;
pub use entry::CorpusEntry;
pub use error::CorpusError;
pub use store::CorpusStore;

#[cfg(test)]
pub(crate) mod testutil {
    use std::{fs, path::Path};

    use images::{
        ImagePNG,
        png::base::{BitDepthPNG, ColorTypePNG},
    };

    /// Grayscale PNG whose row `r` is filled with the value `r`.
    pub fn write_rows_png(path: &Path, width: u32, height: u32) {
        let bytes = (0..height).flat_map(|row| vec![row as u8; width as usize]).collect();
        ImagePNG::new(bytes, width, height, ColorTypePNG::Grayscale, BitDepthPNG::Eight)
            .write(path)
            .unwrap();
    }

    pub fn write_pair(root: &Path, base: &str, height: u32, transcript: &str) {
        write_rows_png(&root.join(format!("{base}.png")), 8, height);
        fs::write(root.join(format!("{base}.gt.txt")), transcript).unwrap();
    }
}
