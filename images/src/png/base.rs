use std::{fs::File, io::BufWriter, path::Path};

use image::DynamicImage;
use png::{BitDepth, ColorType, PixelDimensions, ScaledFloat};
use tracing::debug;

use crate::error::ImageError;

// Internal representation of PNG color types.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum ColorTypePNG {
    Grayscale = 0,
    Rgb = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    Rgba = 6,
}

impl ColorTypePNG {
    // Converts png crate color type into local enum.
    pub fn from_png(png_type: ColorType) -> Self {
        match png_type {
            ColorType::Grayscale => Self::Grayscale,
            ColorType::Rgb => Self::Rgb,
            ColorType::Indexed => Self::Indexed,
            ColorType::GrayscaleAlpha => Self::GrayscaleAlpha,
            ColorType::Rgba => Self::Rgba,
        }
    }

    // Converts local enum into png crate color type.
    pub fn to_png(self) -> ColorType {
        match self {
            Self::Grayscale => ColorType::Grayscale,
            Self::Rgb => ColorType::Rgb,
            Self::Indexed => ColorType::Indexed,
            Self::GrayscaleAlpha => ColorType::GrayscaleAlpha,
            Self::Rgba => ColorType::Rgba,
        }
    }

    // Samples stored per pixel in the scanline (palette index counts as one).
    pub fn samples(self) -> usize {
        match self {
            Self::Grayscale | Self::Indexed => 1,
            Self::GrayscaleAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

// Internal representation of PNG bit depth.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum BitDepthPNG {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Sixteen = 16,
}

impl BitDepthPNG {
    // Converts png crate bit depth into local enum.
    pub fn from_png(png_type: BitDepth) -> Self {
        match png_type {
            BitDepth::One => Self::One,
            BitDepth::Two => Self::Two,
            BitDepth::Four => Self::Four,
            BitDepth::Eight => Self::Eight,
            BitDepth::Sixteen => Self::Sixteen,
        }
    }

    // Converts local enum into png crate bit depth.
    pub fn to_png(self) -> BitDepth {
        match self {
            Self::One => BitDepth::One,
            Self::Two => BitDepth::Two,
            Self::Four => BitDepth::Four,
            Self::Eight => BitDepth::Eight,
            Self::Sixteen => BitDepth::Sixteen,
        }
    }

    pub fn bits(self) -> usize {
        self as usize
    }
}

// Image metadata kept alongside the raw scanlines.
#[derive(Clone, Debug)]
pub struct InfoPNG {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorTypePNG,
    pub bit_depth: BitDepthPNG,
    pub line_size: usize,
    pub gamma: Option<f32>,
    pub palette: Option<Vec<u8>>,
    pub trns: Option<Vec<u8>>,
    pub dpi: Option<PixelDimensions>,
}

impl InfoPNG {
    pub fn bits_per_pixel(&self) -> usize {
        self.color_type.samples() * self.bit_depth.bits()
    }

    // Bytes in one scanline of `width` pixels for this pixel layout.
    pub fn line_size_for(&self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel()).div_ceil(8)
    }
}

// In-memory PNG image: raw scanline bytes + decoded metadata.
#[derive(Clone, Debug)]
pub struct ImagePNG {
    pub bytes: Vec<u8>,
    pub info: InfoPNG,
}

impl ImagePNG {
    // Creates an image from raw scanlines without optional chunks.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, color_type: ColorTypePNG, bit_depth: BitDepthPNG) -> Self {
        let mut info = InfoPNG {
            width,
            height,
            color_type,
            bit_depth,
            line_size: 0,
            gamma: None,
            palette: None,
            trns: None,
            dpi: None,
        };
        info.line_size = info.line_size_for(width);
        Self { bytes, info }
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Opens any supported corpus image.
    ///
    /// PNG files go through the `png` decoder so palette and bit depth are
    /// preserved; other formats are decoded by the `image` crate into 8-bit
    /// samples.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png {
            return Self::read(path);
        }
        let decoded = image::open(path).map_err(|source| ImageError::Foreign {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "decoded non-PNG image");
        Ok(Self::from_dynamic(decoded))
    }

    // Reads PNG from disk and decodes image bytes + metadata chunks.
    pub fn read(path: &Path) -> Result<Self, ImageError> {
        let file = File::open(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decode_err = |source| ImageError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = png::Decoder::new(file).read_info().map_err(decode_err)?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).map_err(decode_err)?;
        buf.truncate(frame.buffer_size());

        let meta = reader.info();
        let info = InfoPNG {
            width: frame.width,
            height: frame.height,
            color_type: ColorTypePNG::from_png(frame.color_type),
            bit_depth: BitDepthPNG::from_png(frame.bit_depth),
            line_size: frame.line_size,
            gamma: meta.gama_chunk.map(ScaledFloat::into_value),
            palette: meta.palette.as_deref().map(<[u8]>::to_vec),
            trns: meta.trns.as_deref().map(<[u8]>::to_vec),
            dpi: meta.pixel_dims,
        };
        Ok(Self { bytes: buf, info })
    }

    // Writes the current image to PNG with stored metadata.
    pub fn write(&self, path: &Path) -> Result<(), ImageError> {
        let file = File::create(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let encode_err = |source| ImageError::Encode {
            path: path.to_path_buf(),
            source,
        };

        let mut encoder = png::Encoder::new(BufWriter::new(file), self.info.width, self.info.height);
        encoder.set_color(self.info.color_type.to_png());
        encoder.set_depth(self.info.bit_depth.to_png());
        if let Some(gamma) = self.info.gamma {
            encoder.set_source_gamma(ScaledFloat::new(gamma));
        }
        // Indexed images are unreadable without their palette.
        if let Some(palette) = &self.info.palette {
            encoder.set_palette(palette.clone());
        }
        if let Some(trns) = &self.info.trns {
            encoder.set_trns(trns.clone());
        }
        encoder.set_pixel_dims(self.info.dpi);

        let mut writer = encoder.write_header().map_err(encode_err)?;
        writer.write_image_data(&self.bytes).map_err(encode_err)?;
        writer.finish().map_err(encode_err)?;
        Ok(())
    }

    fn from_dynamic(decoded: DynamicImage) -> Self {
        let (width, height) = (decoded.width(), decoded.height());
        match decoded {
            DynamicImage::ImageLuma8(buf) => Self::new(buf.into_raw(), width, height, ColorTypePNG::Grayscale, BitDepthPNG::Eight),
            DynamicImage::ImageLumaA8(buf) => Self::new(buf.into_raw(), width, height, ColorTypePNG::GrayscaleAlpha, BitDepthPNG::Eight),
            DynamicImage::ImageRgb8(buf) => Self::new(buf.into_raw(), width, height, ColorTypePNG::Rgb, BitDepthPNG::Eight),
            other => Self::new(other.to_rgba8().into_raw(), width, height, ColorTypePNG::Rgba, BitDepthPNG::Eight),
        }
    }
}
