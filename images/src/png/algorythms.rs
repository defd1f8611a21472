//! Cropping on raw PNG scanlines.
//!
//! Full-width bands are cut by slicing whole scanlines, which works for every
//! bit depth including packed 1/2/4-bit rows. Narrower crops need byte-aligned
//! pixels.

use crate::{algorythms::Algorythms, error::ImageError, png::base::ImagePNG};

impl Algorythms for ImagePNG {
    fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Result<Self, ImageError> {
        let (width, height) = (self.info.width, self.info.height);
        let inside = w > 0
            && h > 0
            && u64::from(x) + u64::from(w) <= u64::from(width)
            && u64::from(y) + u64::from(h) <= u64::from(height);
        if !inside {
            return Err(ImageError::OutOfBounds { x, y, w, h, width, height });
        }

        let line_size = self.info.line_size;
        let start = y as usize * line_size;
        let end = start + h as usize * line_size;
        let rows = self.bytes.get(start..end).ok_or_else(|| {
            ImageError::Unsupported(format!(
                "buffer holds {} bytes, rows {}..{} need {}",
                self.bytes.len(),
                y,
                y + h,
                end
            ))
        })?;

        let bytes = if x == 0 && w == width {
            rows.to_vec()
        } else {
            let bits = self.info.bits_per_pixel();
            if bits % 8 != 0 {
                return Err(ImageError::Unsupported(format!(
                    "horizontal crop of {bits}-bit packed pixels"
                )));
            }
            let pixel = bits / 8;
            let (from, to) = (x as usize * pixel, (x + w) as usize * pixel);
            rows.chunks_exact(line_size)
                .flat_map(|row| row[from..to].iter().copied())
                .collect()
        };

        let mut info = self.info.clone();
        info.width = w;
        info.height = h;
        info.line_size = self.info.line_size_for(w);
        Ok(Self { bytes, info })
    }

    fn crop_rows(&self, y: u32, h: u32) -> Result<Self, ImageError> {
        self.crop(0, y, self.info.width, h)
    }
}
