use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::window::StabilityWindow;
use crate::foundation::core::Rect;
use crate::graph::canvas::SurfaceHandle;
use crate::graph::node::{NodeHandle, NodeKey};
use crate::threading::dispatcher::{DispatchPriority, RenderDispatcher};

/// Consecutive unchanged renders after which a node is cacheable outright.
pub const STABLE_RENDER_COUNT: u32 = 3;

#[derive(Clone)]
/// One cached bitmap: an offscreen surface plus the bounds it was captured
/// over.
pub struct CacheEntry {
    /// Surface holding the pre-rasterized output.
    pub surface: SurfaceHandle,
    /// Bounds of the node at capture time, in its parent's space.
    pub bounds: Rect,
}

struct CacheState {
    entries: Vec<CacheEntry>,
    render_count: u32,
    window: StabilityWindow,
    cached_at: i64, // progress marker at capture, -1 = no capture
    children: Option<Vec<NodeKey>>,
    last_accessed: Instant,
    disposed: bool,
}

/// Staleness bookkeeping and zero or more cached bitmaps for a single render
/// node.
///
/// A record is fed by the traversal on the render thread (render counts,
/// progress reports, stores) but is shareable across threads: invalidation
/// arriving from elsewhere, such as a property change on a UI thread,
/// detaches the entries immediately and hands the physical surface release
/// to the render thread's low-priority queue.
pub struct RenderNodeCache {
    state: Mutex<CacheState>,
    dispatcher: RenderDispatcher,
}

impl RenderNodeCache {
    /// New empty record whose GPU resources belong to `dispatcher`'s thread.
    pub fn new(dispatcher: RenderDispatcher) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: Vec::new(),
                render_count: 0,
                window: StabilityWindow::new(),
                cached_at: -1,
                children: None,
                last_accessed: Instant::now(),
                disposed: false,
            }),
            dispatcher,
        }
    }

    /// True when at least one cached bitmap is held.
    pub fn is_cached(&self) -> bool {
        !self.state.lock().entries.is_empty()
    }

    /// Number of cached bitmaps.
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Set the consecutive-unchanged-render counter to an absolute value.
    pub fn report_render_count(&self, count: u32) {
        self.state.lock().render_count = count;
    }

    /// Count one more frame rendered without a detected change.
    pub fn increment_render_count(&self) {
        let mut state = self.state.lock();
        state.render_count = state.render_count.saturating_add(1);
    }

    /// Record one evaluation pass's progress marker and apply the staleness
    /// rules.
    ///
    /// The cache is dropped when the capture point is ahead of what is now
    /// being reported (an upstream structural change rolled progress back),
    /// or when the whole window has moved past the capture point (the node
    /// kept rendering directly after the bitmap was taken, so the bitmap no
    /// longer reflects the composition).
    pub fn report_progress(&self, value: i64, denom: i64) {
        let stale = {
            let mut state = self.state.lock();
            state.window.record(value, denom);
            if state.cached_at > value || state.window.min() > state.cached_at {
                Self::detach_entries(&mut state)
            } else {
                Vec::new()
            }
        };
        self.release(stale);
    }

    /// Whole-node eligibility: enough unchanged renders, or a settled
    /// stability window.
    pub fn can_cache(&self) -> bool {
        let state = self.state.lock();
        state.render_count >= STABLE_RENDER_COUNT || state.window.is_settled()
    }

    /// Looser test for whether cutting a cache boundary at this node is even
    /// worth attempting yet.
    pub fn can_cache_boundary(&self) -> bool {
        let state = self.state.lock();
        state.window.min() >= 1 || state.render_count >= STABLE_RENDER_COUNT
    }

    /// Snapshot the identity of `children` for later comparison.
    pub fn capture_children(&self, children: &[NodeHandle]) {
        self.state.lock().children = Some(children.iter().map(NodeKey::of).collect());
    }

    /// Compare the captured snapshot against the live `children`.
    ///
    /// False when never captured, and on any count or per-index identity
    /// mismatch.
    pub fn same_children(&self, children: &[NodeHandle]) -> bool {
        let state = self.state.lock();
        match &state.children {
            None => false,
            Some(snapshot) => {
                snapshot.len() == children.len()
                    && snapshot
                        .iter()
                        .zip(children)
                        .all(|(key, child)| *key == NodeKey::of(child))
            }
        }
    }

    /// Drop all cached bitmaps and forget the capture point. Idempotent.
    pub fn invalidate(&self) {
        let stale = {
            let mut state = self.state.lock();
            Self::detach_entries(&mut state)
        };
        self.release(stale);
    }

    /// Replace the cache with a single freshly rendered bitmap.
    pub fn store_cache(&self, surface: SurfaceHandle, bounds: Rect) {
        self.store_cache_entries(vec![CacheEntry { surface, bounds }]);
    }

    /// Replace the cache with a set of freshly rendered bitmaps.
    ///
    /// The capture point becomes the progress value recorded just before
    /// this store. Panics if the record was disposed.
    pub fn store_cache_entries(&self, entries: Vec<CacheEntry>) {
        let stale = {
            let mut state = self.state.lock();
            assert!(
                !state.disposed,
                "store_cache on a disposed render-node cache"
            );
            let stale = Self::detach_entries(&mut state);
            state.cached_at = state.window.latest();
            state.entries = entries;
            state.last_accessed = Instant::now();
            tracing::debug!(
                entries = state.entries.len(),
                cached_at = state.cached_at,
                "stored render-node cache"
            );
            stale
        };
        self.release(stale);
    }

    /// Cloned handle and capture bounds of the first cached bitmap.
    ///
    /// Panics when nothing is cached; callers must check
    /// [`is_cached`](Self::is_cached) first.
    pub fn use_cache(&self) -> CacheEntry {
        let mut state = self.state.lock();
        assert!(
            !state.entries.is_empty(),
            "use_cache on a node with no cache entries; check is_cached first"
        );
        state.last_accessed = Instant::now();
        state.entries[0].clone()
    }

    /// Cloned handles for every cached bitmap, in paint order.
    ///
    /// Same precondition as [`use_cache`](Self::use_cache).
    pub fn use_cache_all(&self) -> Vec<CacheEntry> {
        let mut state = self.state.lock();
        assert!(
            !state.entries.is_empty(),
            "use_cache_all on a node with no cache entries; check is_cached first"
        );
        state.last_accessed = Instant::now();
        state.entries.clone()
    }

    /// When the cache was last stored to or read from.
    pub fn last_accessed(&self) -> Instant {
        self.state.lock().last_accessed
    }

    /// True once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Release all GPU resources; further stores are rejected.
    pub fn dispose(&self) {
        let stale = {
            let mut state = self.state.lock();
            state.disposed = true;
            Self::detach_entries(&mut state)
        };
        self.release(stale);
    }

    fn detach_entries(state: &mut CacheState) -> Vec<CacheEntry> {
        state.cached_at = -1;
        std::mem::take(&mut state.entries)
    }

    /// Let `entries` drop here when on the owning thread, otherwise ship
    /// them to its low-priority queue so the refcount can only reach zero
    /// there.
    fn release(&self, entries: Vec<CacheEntry>) {
        if entries.is_empty() {
            return;
        }
        if self.dispatcher.check_access() {
            drop(entries);
        } else {
            tracing::trace!("deferring surface release to the render thread");
            self.dispatcher
                .dispatch(DispatchPriority::Low, move || drop(entries));
        }
    }
}

impl Drop for RenderNodeCache {
    fn drop(&mut self) {
        let entries = {
            let state = self.state.get_mut();
            state.disposed = true;
            std::mem::take(&mut state.entries)
        };
        self.release(entries);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/record.rs"]
mod tests;
