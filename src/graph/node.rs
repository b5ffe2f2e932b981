use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::foundation::core::Rect;
use crate::graph::canvas::DrawCanvas;

/// Shared handle to a node in the composition graph.
///
/// The graph is owned and mutated by the render thread only; handle identity
/// doubles as node identity for structural-change detection.
pub type NodeHandle = Rc<RefCell<dyn RenderNode>>;

/// Non-owning observer of a [`NodeHandle`].
pub type WeakNode = Weak<RefCell<dyn RenderNode>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Identity of a render node, derived from its allocation address.
///
/// Keys are plain non-owning values and are only ever compared for equality.
/// A key whose node has been dropped is detected through the weak handle
/// stored next to it, never through the key itself.
pub struct NodeKey(usize);

impl NodeKey {
    /// Identity key for `node`.
    pub fn of(node: &NodeHandle) -> Self {
        Self(Rc::as_ptr(node) as *const () as usize)
    }
}

/// A unit of the composition graph: a leaf that paints, or a container that
/// composites an ordered list of children.
///
/// The two `cache_*` hooks are an optional capability: nodes with a cheaper
/// or tighter offscreen representation override them, everything else gets
/// the default bounds and paint path when a cache is materialized.
pub trait RenderNode {
    /// Bounds of this node's output, in its parent's space.
    fn bounds(&self) -> Rect;

    /// Paint this node onto `canvas`.
    fn render(&mut self, canvas: &mut dyn DrawCanvas);

    /// Ordered children for containers, `None` for leaves.
    fn children(&self) -> Option<&[NodeHandle]> {
        None
    }

    /// Bounds override used when materializing an offscreen cache.
    fn cache_bounds(&self) -> Option<Rect> {
        None
    }

    /// Cache-specific paint path; defaults to the regular render.
    fn render_for_cache(&mut self, canvas: &mut dyn DrawCanvas) {
        self.render(canvas);
    }
}

#[derive(Default)]
/// Container node compositing an ordered list of children.
pub struct ContainerRenderNode {
    children: Vec<NodeHandle>,
}

impl ContainerRenderNode {
    /// New container with no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `child` at the end of the paint order.
    pub fn add_child(&mut self, child: NodeHandle) {
        self.children.push(child);
    }

    /// Replace the child at `index`, keeping its position in paint order.
    pub fn set_child(&mut self, index: usize, child: NodeHandle) {
        self.children[index] = child;
    }

    /// Remove and return the child at `index`.
    pub fn remove_child(&mut self, index: usize) -> NodeHandle {
        self.children.remove(index)
    }
}

impl RenderNode for ContainerRenderNode {
    fn bounds(&self) -> Rect {
        self.children
            .iter()
            .map(|child| child.borrow().bounds())
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    fn render(&mut self, canvas: &mut dyn DrawCanvas) {
        for child in &self.children {
            child.borrow_mut().render(canvas);
        }
    }

    fn children(&self) -> Option<&[NodeHandle]> {
        Some(&self.children)
    }
}
