use std::sync::Arc;

use crate::foundation::core::Affine;
use crate::foundation::error::MontageResult;

/// Opaque GPU-backed offscreen surface.
///
/// Surfaces are reference counted and clone-on-share; the caching layer never
/// hands one out by unique ownership, so a caller dropping its copy cannot
/// free a retained one. Creation and the final release belong to the render
/// thread (see [`crate::RenderDispatcher`]).
pub trait RenderTarget: Send + Sync {
    /// Surface width in physical pixels.
    fn width(&self) -> u32;

    /// Surface height in physical pixels.
    fn height(&self) -> u32;
}

/// Shared handle to a [`RenderTarget`].
pub type SurfaceHandle = Arc<dyn RenderTarget>;

/// The drawing-context contract the cache subsystem needs from a backend
/// canvas: origin translation while materializing, and blitting cached
/// bitmaps on reuse.
pub trait DrawCanvas {
    /// Prepend `transform` onto the current transform stack.
    fn push_transform(&mut self, transform: Affine);

    /// Undo the most recent [`push_transform`](Self::push_transform).
    fn pop_transform(&mut self);

    /// Blit `surface` with its top-left corner at `(x, y)`.
    fn draw_surface(&mut self, surface: &SurfaceHandle, x: f64, y: f64);
}

/// Backend factory for offscreen surfaces and the canvases drawing into
/// them.
pub trait SurfaceFactory {
    /// Allocate an offscreen surface, or `None` on resource exhaustion.
    ///
    /// Exhaustion is non-fatal to the caching layer: the node renders
    /// uncached for the frame and the attempt is retried on the next one.
    fn create_render_target(&self, width: u32, height: u32) -> Option<SurfaceHandle>;

    /// Wrap `target` in a drawing context, optionally clearing it first.
    fn create_canvas(
        &self,
        target: SurfaceHandle,
        clear: bool,
    ) -> MontageResult<Box<dyn DrawCanvas>>;
}
