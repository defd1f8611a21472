use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("cannot access image {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode PNG {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    #[error("cannot encode PNG {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },

    #[error("cannot decode image {path}")]
    Foreign {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("crop {w}x{h}+{x}+{y} is outside of a {width}x{height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        width: u32,
        height: u32,
    },

    #[error("unsupported pixel layout: {0}")]
    Unsupported(String),
}
