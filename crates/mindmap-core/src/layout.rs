//! Layout Engine
//!
//! Assigns `left`/`top` to every visible node of a DataSource tree (the "logical structure"
//! layout: root on the left, children stacked vertically to its right).
//!
//! # Passes
//!
//! 1. **Base** (pre-order, with a post-order step): resolve each node's instance, place it
//!    `margin_x` to the right of its parent and sum the heights of its visible children into
//!    `children_area_height`.
//! 2. **Top** (pre-order): stack each node's children around the node's vertical center.
//! 3. **Adjust** (pre-order): when a node's children area is taller than the node, push its
//!    siblings apart by half the excess (earlier siblings up, later siblings down, subtrees
//!    included) and repeat the same shift at every ancestor level.
//!
//! ```text
//!            ┌────┐
//!            │ A  │──┬── a1
//!  ┌──────┐  └────┘  └── a2
//!  │ Root │──
//!  └──────┘  ┌────┐
//!            │ B  │
//!            └────┘
//! ```
//!
//! Layout is a pure function of the tree shape, the per-node content sizes and the
//! [`LayoutConfig`] margins; it is re-run in full after every mutation.

use crate::cache::LruCache;
use crate::data_source::{DataSourceNode, Uid};
use crate::node::{InstanceResolver, NodeArena, ResolveStats};
use crate::style::Theme;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Layout margins and root anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Horizontal gap between a node and its children.
    pub margin_x: f64,
    /// Vertical gap between siblings.
    pub margin_y: f64,
    /// Left edge of the root node.
    pub root_left: f64,
    /// Height of the drawing area; the root's top edge sits at half of it.
    pub canvas_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin_x: 80.0,
            margin_y: 50.0,
            root_left: 300.0,
            canvas_height: 800.0,
        }
    }
}

/// Axis-aligned bounding box of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    /// Minimum `left`.
    pub left: f64,
    /// Minimum `top`.
    pub top: f64,
    /// Maximum `left + width`.
    pub right: f64,
    /// Maximum `top + height`.
    pub bottom: f64,
}

/// Summary of one layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutFrame {
    /// Number of visible nodes.
    pub visible: usize,
    /// Instance resolution counters.
    pub stats: ResolveStats,
    /// Bounding box of every visible node.
    pub bounds: Bounds,
}

/// Three-pass tree layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    /// Create an engine.
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Replace the configuration (takes effect on the next pass).
    pub fn set_config(&mut self, config: LayoutConfig) {
        self.config = config;
    }

    pub(crate) fn run(
        &self,
        tree: &DataSourceNode,
        resolver: &mut InstanceResolver<'_>,
    ) -> (NodeArena, LayoutFrame) {
        let _span = tracing::debug_span!("layout", nodes = tree.count()).entered();

        let mut arena = NodeArena::new();
        self.base_pass(tree, None, 0, resolver, &mut arena);
        self.top_pass(&mut arena);
        self.adjust_pass(&mut arena);

        let frame = LayoutFrame {
            visible: arena.len(),
            stats: resolver.stats,
            bounds: bounds_of(&arena),
        };
        tracing::debug!(
            visible = frame.visible,
            created = frame.stats.created,
            revived = frame.stats.revived,
            remeasured = frame.stats.remeasured,
            "layout pass complete"
        );
        (arena, frame)
    }

    /// Returns the node height so the parent can sum its children area.
    fn base_pass(
        &self,
        node: &DataSourceNode,
        parent: Option<(&Uid, f64)>,
        depth: usize,
        resolver: &mut InstanceResolver<'_>,
        arena: &mut NodeArena,
    ) -> f64 {
        let mut instance = resolver.resolve(node, parent.map(|(uid, _)| uid), depth);
        instance.left = match parent {
            Some((_, parent_right)) => parent_right + self.config.margin_x,
            None => self.config.root_left,
        };
        arena.push_order(instance.uid.clone());

        if node.data.is_expand && !node.children.is_empty() {
            let uid = instance.uid.clone();
            let right = instance.right();
            let mut total = 0.0;
            for child in &node.children {
                total += self.base_pass(child, Some((&uid, right)), depth + 1, resolver, arena);
                instance.children.push(child.uid().clone());
            }
            let gaps = (node.children.len() - 1) as f64 * self.config.margin_y;
            instance.children_area_height = total + gaps;
        }

        let height = instance.height;
        arena.insert(instance);
        height
    }

    fn top_pass(&self, arena: &mut NodeArena) {
        if let Some(root) = arena.root().map(|root| root.uid.clone())
            && let Some(root) = arena.get_mut(&root)
        {
            root.top = self.config.canvas_height / 2.0;
        }

        for uid in arena.order().to_vec() {
            let Some(node) = arena.get(&uid) else {
                continue;
            };
            let start = node.top + node.height / 2.0 - node.children_area_height / 2.0;
            let children = node.children.clone();

            let mut offset = 0.0;
            for child in &children {
                if let Some(child) = arena.get_mut(child) {
                    child.top = start + offset;
                    offset += child.height + self.config.margin_y;
                }
            }
        }
    }

    fn adjust_pass(&self, arena: &mut NodeArena) {
        for uid in arena.order().to_vec() {
            let Some(node) = arena.get(&uid) else {
                continue;
            };
            let excess = node.children_area_height - node.height;
            if excess > 0.0 {
                shift_siblings(arena, &uid, excess / 2.0);
            }
        }
    }
}

/// Push the siblings of `uid` away from it by `offset`, then do the same one level up, until
/// the root is reached.
fn shift_siblings(arena: &mut NodeArena, uid: &Uid, offset: f64) {
    let mut current = uid.clone();
    while let Some(parent) = arena.get(&current).and_then(|node| node.parent.clone()) {
        let siblings = arena
            .get(&parent)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        if let Some(index) = siblings.iter().position(|sibling| *sibling == current) {
            for (i, sibling) in siblings.iter().enumerate() {
                let delta = match i.cmp(&index) {
                    Ordering::Less => -offset,
                    Ordering::Greater => offset,
                    Ordering::Equal => continue,
                };
                shift_subtree(arena, sibling, delta);
            }
        }
        current = parent;
    }
}

fn shift_subtree(arena: &mut NodeArena, uid: &Uid, delta: f64) {
    let mut stack = vec![uid.clone()];
    while let Some(uid) = stack.pop() {
        if let Some(node) = arena.get_mut(&uid) {
            node.top += delta;
            stack.extend(node.children.iter().cloned());
        }
    }
}

fn bounds_of(arena: &NodeArena) -> Bounds {
    let mut nodes = arena.iter();
    let Some(first) = nodes.next() else {
        return Bounds::default();
    };
    let init = Bounds {
        left: first.left,
        top: first.top,
        right: first.right(),
        bottom: first.bottom(),
    };
    nodes.fold(init, |acc, node| Bounds {
        left: acc.left.min(node.left),
        top: acc.top.min(node.top),
        right: acc.right.max(node.right()),
        bottom: acc.bottom.max(node.bottom()),
    })
}

/// Lay out `tree` from scratch, without any cached state.
///
/// Equivalent to the first frame of a fresh session.
pub fn layout_tree(tree: &DataSourceNode, config: &LayoutConfig, theme: &Theme) -> NodeArena {
    let mut cache = LruCache::new(tree.count());
    let pending = HashSet::new();
    let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &pending, theme);
    let (arena, _) = LayoutEngine::new(*config).run(tree, &mut resolver);
    arena
}
