//! Montage render-node caching.
//!
//! The Montage editor re-evaluates its composition graph every frame. This
//! crate decides, per frame and per node, whether a subtree's rendered output
//! is unchanged since the last frame and can be reused as a pre-rasterized
//! bitmap instead of being redrawn, while staying correct under structural
//! edits, partial stability, and cross-thread GPU-resource ownership.
//!
//! # Pipeline overview
//!
//! 1. **Report**: graph evaluation feeds per-node stability signals into each
//!    node's [`RenderNodeCache`] (consecutive-render counts and progress
//!    markers for the last three evaluation passes).
//! 2. **Pick**: once per frame, [`RenderNodeCacheContext::make_cache`] walks
//!    the graph top-down and picks cache boundaries — nodes whose whole
//!    subtree has settled. Sub-parts of an otherwise unstable subtree may
//!    still become boundaries on their own.
//! 3. **Materialize**: a chosen boundary is rendered once into an offscreen
//!    surface obtained from an injected [`SurfaceFactory`], with descendant
//!    caches cleared so a flattened bitmap and per-child bitmaps never
//!    coexist.
//! 4. **Reuse**: [`RenderNodeCacheContext::draw_node`] blits the cached
//!    bitmap until a staleness rule or a structural edit invalidates it.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single-writer GPU thread**: surfaces are created, mutated and released
//!   only on the render thread. Invalidation requested from another thread
//!   detaches the in-memory state immediately and defers the physical release
//!   through [`RenderDispatcher`].
//! - **Caches never own nodes**: the node-to-cache table holds weak handles
//!   and identity keys only, so caches cannot extend node lifetime.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod foundation;
mod graph;
mod threading;

pub use cache::context::{CacheOptions, CacheRules, RenderNodeCacheContext};
pub use cache::record::{CacheEntry, RenderNodeCache, STABLE_RENDER_COUNT};
pub use cache::window::StabilityWindow;
pub use foundation::core::{Affine, PixelSize, Point, Rect, Vec2};
pub use foundation::error::{MontageError, MontageResult};
pub use graph::canvas::{DrawCanvas, RenderTarget, SurfaceFactory, SurfaceHandle};
pub use graph::node::{ContainerRenderNode, NodeHandle, NodeKey, RenderNode, WeakNode};
pub use threading::dispatcher::{DispatchPriority, RenderDispatcher};
