use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::cache::record::RenderNodeCache;
use crate::foundation::core::{Affine, PixelSize, Vec2};
use crate::foundation::error::{MontageError, MontageResult};
use crate::graph::canvas::{DrawCanvas, SurfaceFactory};
use crate::graph::node::{NodeHandle, NodeKey, WeakNode};
use crate::threading::dispatcher::RenderDispatcher;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
/// Pixel-size thresholds a node must fall within to be materialized.
///
/// Tiny nodes are cheaper to redraw than to blit, huge ones are not worth
/// the surface memory; both ends are configurable from the editor shell.
pub struct CacheRules {
    /// Minimum cacheable width in pixels.
    pub min_width: u32,
    /// Minimum cacheable height in pixels.
    pub min_height: u32,
    /// Maximum cacheable width in pixels.
    pub max_width: u32,
    /// Maximum cacheable height in pixels.
    pub max_height: u32,
}

impl CacheRules {
    /// Permissive defaults: anything up to 8192 x 8192.
    pub const DEFAULT: Self = Self {
        min_width: 1,
        min_height: 1,
        max_width: 8192,
        max_height: 8192,
    };

    /// Validated constructor; minimums must not exceed maximums.
    pub fn new(
        min_width: u32,
        min_height: u32,
        max_width: u32,
        max_height: u32,
    ) -> MontageResult<Self> {
        if min_width > max_width || min_height > max_height {
            return Err(MontageError::validation(
                "CacheRules minimums must be <= maximums",
            ));
        }
        Ok(Self {
            min_width,
            min_height,
            max_width,
            max_height,
        })
    }

    /// True when `size` falls inside the configured thresholds.
    pub fn allows(&self, size: PixelSize) -> bool {
        (self.min_width..=self.max_width).contains(&size.width)
            && (self.min_height..=self.max_height).contains(&size.height)
    }
}

impl Default for CacheRules {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
/// Externally supplied caching configuration.
pub struct CacheOptions {
    /// Master switch; when false the context never materializes caches.
    pub enabled: bool,
    /// Size thresholds for choosing cache boundaries.
    pub rules: CacheRules,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: CacheRules::DEFAULT,
        }
    }
}

struct CacheSlot {
    node: WeakNode,
    cache: Arc<RenderNodeCache>,
}

/// Scene-wide node-to-cache association plus the boundary-picking driver.
///
/// The table is ephemeral: it maps node identity to [`RenderNodeCache`]
/// records through weak handles and never keeps a node alive. The context
/// itself lives on the render thread and is driven once per frame by the
/// rendering pipeline.
pub struct RenderNodeCacheContext {
    caches: HashMap<NodeKey, CacheSlot>,
    options: CacheOptions,
    dispatcher: RenderDispatcher,
}

impl RenderNodeCacheContext {
    /// New context whose GPU resources belong to `dispatcher`'s thread.
    pub fn new(dispatcher: RenderDispatcher) -> Self {
        Self {
            caches: HashMap::new(),
            options: CacheOptions::default(),
            dispatcher,
        }
    }

    /// Current caching configuration.
    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// Replace the caching configuration, dropping every existing cache.
    pub fn set_options(&mut self, options: CacheOptions) {
        tracing::debug!(?options, "replacing cache options, clearing all caches");
        self.clear();
        self.options = options;
    }

    /// Number of live cache records in the table.
    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }

    /// Get or lazily create the cache record for `node`.
    ///
    /// A slot whose node has been dropped (including one whose allocation
    /// address was reused by a new node) is disposed and replaced, so a
    /// record never outlives its node past a lookup.
    pub fn get_cache(&mut self, node: &NodeHandle) -> Arc<RenderNodeCache> {
        let key = NodeKey::of(node);
        let live = self
            .caches
            .get(&key)
            .filter(|slot| slot.node.upgrade().is_some())
            .map(|slot| Arc::clone(&slot.cache));
        if let Some(cache) = live {
            return cache;
        }

        let cache = Arc::new(RenderNodeCache::new(self.dispatcher.clone()));
        let slot = CacheSlot {
            node: Rc::downgrade(node),
            cache: Arc::clone(&cache),
        };
        if let Some(stale) = self.caches.insert(key, slot) {
            stale.cache.dispose();
        }
        cache
    }

    /// Whole-subtree eligibility: the node's own cache readiness plus, for
    /// containers, an unchanged children snapshot and every child
    /// recursively.
    pub fn can_cache_recursive(&mut self, node: &NodeHandle) -> bool {
        let cache = self.get_cache(node);
        if !cache.can_cache() {
            return false;
        }
        let children = node.borrow().children().map(|c| c.to_vec());
        if let Some(children) = children {
            if !cache.same_children(&children) {
                return false;
            }
            for child in &children {
                if !self.can_cache_recursive(child) {
                    return false;
                }
            }
        }
        true
    }

    /// Subtree eligibility skipping the node's own state.
    ///
    /// Used when deciding whether this node could be materialized from its
    /// children's already-stable output; vacuously true for leaves.
    pub fn can_cache_recursive_children_only(&mut self, node: &NodeHandle) -> bool {
        let children = node.borrow().children().map(|c| c.to_vec());
        match children {
            None => true,
            Some(children) => children.iter().all(|child| self.can_cache_recursive(child)),
        }
    }

    /// Invalidate `node`'s cache and every descendant's, unconditionally.
    pub fn clear_cache(&mut self, node: &NodeHandle) {
        self.get_cache(node).invalidate();
        let children = node.borrow().children().map(|c| c.to_vec());
        if let Some(children) = children {
            for child in &children {
                self.clear_cache(child);
            }
        }
    }

    #[tracing::instrument(level = "trace", skip_all)]
    /// Per-frame driver: pick `node` as the cache boundary when its subtree
    /// qualifies, otherwise recurse so independently stable sub-parts can
    /// still cache on their own.
    pub fn make_cache(
        &mut self,
        node: &NodeHandle,
        factory: &dyn SurfaceFactory,
    ) -> MontageResult<()> {
        if !self.options.enabled {
            return Ok(());
        }
        let cache = self.get_cache(node);
        if cache.can_cache_boundary() && self.can_cache_recursive_children_only(node) {
            // Boundary chosen; an existing bitmap stays valid as is.
            if !cache.is_cached() {
                return self.make_cache_core(node, factory);
            }
        } else if let Some(children) = node.borrow().children().map(|c| c.to_vec()) {
            // Not trustworthy as one flattened unit this frame.
            cache.invalidate();
            for child in &children {
                self.make_cache(child, factory)?;
            }
        }
        Ok(())
    }

    /// Materialize `node` as the chosen boundary: render it once into a
    /// fresh offscreen surface and commit the result.
    fn make_cache_core(
        &mut self,
        node: &NodeHandle,
        factory: &dyn SurfaceFactory,
    ) -> MontageResult<()> {
        // A flattened boundary bitmap and per-descendant bitmaps must never
        // coexist.
        let children = node.borrow().children().map(|c| c.to_vec());
        if let Some(children) = &children {
            for child in children {
                self.clear_cache(child);
            }
        }

        let bounds = {
            let node_ref = node.borrow();
            node_ref.cache_bounds().unwrap_or_else(|| node_ref.bounds())
        };
        let Some(size) = PixelSize::ceil_of(bounds) else {
            return Ok(());
        };
        if !self.options.rules.allows(size) {
            tracing::debug!(?size, "node size rejected by cache rules");
            return Ok(());
        }
        let Some(surface) = factory.create_render_target(size.width, size.height) else {
            tracing::warn!(
                width = size.width,
                height = size.height,
                "offscreen surface allocation failed, node renders uncached this frame"
            );
            return Ok(());
        };

        let mut canvas = factory.create_canvas(Arc::clone(&surface), true)?;
        canvas.push_transform(Affine::translate(Vec2::new(-bounds.x0, -bounds.y0)));
        node.borrow_mut().render_for_cache(&mut *canvas);
        canvas.pop_transform();
        drop(canvas);

        self.get_cache(node).store_cache(surface, bounds);
        Ok(())
    }

    /// Draw `node` through the cache: blit the cached bitmaps when the whole
    /// subtree still qualifies, otherwise fall back to a direct render.
    pub fn draw_node(&mut self, node: &NodeHandle, canvas: &mut dyn DrawCanvas) {
        let cache = self.get_cache(node);
        cache.increment_render_count();
        if cache.is_cached() {
            if self.can_cache_recursive(node) {
                for entry in cache.use_cache_all() {
                    canvas.draw_surface(&entry.surface, entry.bounds.x0, entry.bounds.y0);
                }
                return;
            }
            cache.invalidate();
        }
        node.borrow_mut().render(canvas);
    }

    /// Drop records whose node is gone.
    ///
    /// The table never keeps nodes alive; sweeping between edits keeps it
    /// from accumulating dead slots.
    pub fn sweep(&mut self) {
        self.caches.retain(|_, slot| {
            let live = slot.node.upgrade().is_some();
            if !live {
                slot.cache.dispose();
            }
            live
        });
    }

    /// Dispose every cache record and empty the table.
    pub fn clear(&mut self) {
        for (_, slot) in self.caches.drain() {
            slot.cache.dispose();
        }
    }
}

impl Drop for RenderNodeCacheContext {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/context.rs"]
mod tests;
