pub use kurbo::{Affine, Point, Rect, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
/// Integer dimensions of an offscreen surface.
pub struct PixelSize {
    /// Width in physical pixels.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
}

impl PixelSize {
    /// Build a size from explicit dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Smallest integer size that fully covers `rect`.
    ///
    /// Returns `None` for empty, inverted, or non-finite bounds; callers
    /// treat that as "nothing to rasterize".
    pub fn ceil_of(rect: Rect) -> Option<Self> {
        let width = rect.width();
        let height = rect.height();
        if !width.is_finite() || !height.is_finite() {
            return None;
        }
        let width = width.ceil();
        let height = height.ceil();
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            width: width as u32,
            height: height as u32,
        })
    }
}
