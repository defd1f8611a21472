use crate::error::ImageError;

/// Geometric operations on decoded images.
pub trait Algorythms: Sized {
    /// Returns the `w × h` sub-image whose top-left corner is `(x, y)`.
    ///
    /// The rectangle must lie inside the image; nothing is clamped.
    fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Result<Self, ImageError>;

    /// Returns the full-width horizontal band of `h` rows starting at row `y`.
    fn crop_rows(&self, y: u32, h: u32) -> Result<Self, ImageError>;
}
