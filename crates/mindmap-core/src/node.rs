//! Node instances
//!
//! A [`NodeInstance`] is the computed-geometry mirror of one visible DataSource node. Instances
//! of the current frame live in a [`NodeArena`] keyed by uid; parent/children links are uids into
//! the same arena, so the bidirectional tree needs no shared ownership.
//!
//! Instances are resolved once per layout pass, in three tiers:
//!
//! 1. **Bound**: the uid was laid out by the previous frame; its instance is moved over and its
//!    transient geometry reset.
//! 2. **Revived**: the uid left the frame earlier (collapsed, deleted, undone) but is still in the
//!    LRU cache.
//! 3. **Created**: nothing is known about the uid; the instance is built and measured.
//!
//! In the first two tiers the content size is reused unless the uid is pending a resize or its
//! content fingerprint changed.

use crate::cache::LruCache;
use crate::data_source::{DataSourceNode, Uid};
use crate::measure::content_size;
use crate::style::{StyleTier, Theme};
use std::collections::{HashMap, HashSet};

/// Computed geometry of one visible node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInstance {
    /// Uid of the DataSource node this instance mirrors.
    pub uid: Uid,
    /// Content width, including padding.
    pub width: f64,
    /// Content height, including padding.
    pub height: f64,
    /// Left edge in canvas units.
    pub left: f64,
    /// Top edge in canvas units.
    pub top: f64,
    /// Height of the stacked visible children, margins included (0 when collapsed or childless).
    pub children_area_height: f64,
    /// Parent uid (`None` for the root).
    pub parent: Option<Uid>,
    /// Visible children, in display order.
    pub children: Vec<Uid>,
    /// Layer index (root = 0).
    pub depth: usize,
    /// Whether this is the tree root.
    pub is_root: bool,
    /// Set when the content size was (re)computed during the last pass; the renderer should
    /// repaint this node.
    pub needs_relayout: bool,
    content_key: String,
}

impl NodeInstance {
    fn new(uid: Uid) -> Self {
        Self {
            uid,
            width: 0.0,
            height: 0.0,
            left: 0.0,
            top: 0.0,
            children_area_height: 0.0,
            parent: None,
            children: Vec::new(),
            depth: 0,
            is_root: false,
            needs_relayout: true,
            content_key: String::new(),
        }
    }

    /// Clear the per-pass geometry and links, keeping the content size.
    pub fn reset_transient(&mut self) {
        self.left = 0.0;
        self.top = 0.0;
        self.children_area_height = 0.0;
        self.parent = None;
        self.children.clear();
        self.needs_relayout = false;
    }

    /// Bottom edge (`top + height`).
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Right edge (`left + width`).
    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Instances of one layout frame.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: HashMap<Uid, NodeInstance>,
    root: Option<Uid>,
    order: Vec<Uid>,
}

impl NodeArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, instance: NodeInstance) {
        if instance.is_root {
            self.root = Some(instance.uid.clone());
        }
        self.nodes.insert(instance.uid.clone(), instance);
    }

    pub(crate) fn push_order(&mut self, uid: Uid) {
        self.order.push(uid);
    }

    pub(crate) fn take(&mut self, uid: &Uid) -> Option<NodeInstance> {
        self.nodes.remove(uid)
    }

    /// Instance for `uid`.
    pub fn get(&self, uid: &Uid) -> Option<&NodeInstance> {
        self.nodes.get(uid)
    }

    pub(crate) fn get_mut(&mut self, uid: &Uid) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(uid)
    }

    /// Whether `uid` is visible in this frame.
    pub fn contains(&self, uid: &Uid) -> bool {
        self.nodes.contains_key(uid)
    }

    /// Root instance.
    pub fn root(&self) -> Option<&NodeInstance> {
        self.root.as_ref().and_then(|uid| self.nodes.get(uid))
    }

    /// Number of visible nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the frame is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Visible uids in pre-order.
    pub fn order(&self) -> &[Uid] {
        &self.order
    }

    /// Visible instances in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeInstance> {
        self.order.iter().filter_map(|uid| self.nodes.get(uid))
    }

    /// Children of `uid`, in display order.
    pub fn children_of(&self, uid: &Uid) -> impl Iterator<Item = &NodeInstance> {
        self.nodes
            .get(uid)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|child| self.nodes.get(child))
    }

    /// Drop every instance.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.root = None;
    }
}

/// Resolution counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Instances carried over from the previous frame.
    pub bound: usize,
    /// Instances revived from the cache.
    pub revived: usize,
    /// Instances built from scratch.
    pub created: usize,
    /// Instances whose size was (re)computed.
    pub remeasured: usize,
}

/// Supplies instances during the base layout pass.
pub(crate) struct InstanceResolver<'a> {
    cache: &'a mut LruCache<Uid, NodeInstance>,
    previous: NodeArena,
    pending: &'a HashSet<Uid>,
    theme: &'a Theme,
    pub(crate) stats: ResolveStats,
}

impl<'a> InstanceResolver<'a> {
    pub(crate) fn new(
        cache: &'a mut LruCache<Uid, NodeInstance>,
        previous: NodeArena,
        pending: &'a HashSet<Uid>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            cache,
            previous,
            pending,
            theme,
            stats: ResolveStats::default(),
        }
    }

    /// Instance for `data` at `depth`, with cleared links and an up-to-date content size.
    pub(crate) fn resolve(
        &mut self,
        data: &DataSourceNode,
        parent: Option<&Uid>,
        depth: usize,
    ) -> NodeInstance {
        let uid = data.uid();
        let key = content_key(data, depth);

        let (mut instance, fresh) = if let Some(mut bound) = self.previous.take(uid) {
            bound.reset_transient();
            self.stats.bound += 1;
            (bound, false)
        } else if let Some(cached) = self.cache.get(uid) {
            let mut revived = cached.clone();
            revived.reset_transient();
            self.stats.revived += 1;
            (revived, false)
        } else {
            self.stats.created += 1;
            (NodeInstance::new(uid.clone()), true)
        };

        if fresh || self.pending.contains(uid) || instance.content_key != key {
            let size = content_size(&data.data, depth, self.theme);
            instance.width = size.width;
            instance.height = size.height;
            instance.content_key = key;
            instance.needs_relayout = true;
            self.stats.remeasured += 1;
        }

        instance.parent = parent.cloned();
        instance.depth = depth;
        instance.is_root = parent.is_none();

        self.cache.insert(uid.clone(), instance.clone());
        instance
    }
}

/// Everything that feeds the content size of a node.
fn content_key(data: &DataSourceNode, depth: usize) -> String {
    let node = &data.data;
    let mut key = format!("{:?}|{}|", StyleTier::from_depth(depth), node.text);
    if let Some(size) = node.size {
        key.push_str(&format!("{}x{}", size.width, size.height));
    }
    for (name, value) in node.style.iter() {
        key.push_str(&format!("|{name}={value}"));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(uid: &str, text: &str) -> DataSourceNode {
        DataSourceNode::with_uid(uid, text)
    }

    #[test]
    fn test_create_then_bind_reuses_size() {
        let theme = Theme::default();
        let pending = HashSet::new();
        let mut cache = LruCache::new(8);
        let node = leaf("a", "Alpha");

        let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &pending, &theme);
        let first = resolver.resolve(&node, None, 0);
        assert_eq!(resolver.stats.created, 1);
        assert!(first.needs_relayout);

        let mut previous = NodeArena::new();
        previous.insert(first.clone());
        let mut resolver = InstanceResolver::new(&mut cache, previous, &pending, &theme);
        let second = resolver.resolve(&node, None, 0);
        assert_eq!(resolver.stats.bound, 1);
        assert_eq!(resolver.stats.remeasured, 0);
        assert!(!second.needs_relayout);
        assert_eq!(second.width, first.width);
    }

    #[test]
    fn test_revived_instance_remeasures_on_content_change() {
        let theme = Theme::default();
        let pending = HashSet::new();
        let mut cache = LruCache::new(8);
        let mut node = leaf("a", "short");

        let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &pending, &theme);
        let before = resolver.resolve(&node, None, 1);

        node.data.text = "a much longer text".to_string();
        let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &pending, &theme);
        let after = resolver.resolve(&node, None, 1);
        assert_eq!(resolver.stats.revived, 1);
        assert_eq!(resolver.stats.remeasured, 1);
        assert!(after.width > before.width);
    }

    #[test]
    fn test_pending_resize_forces_remeasure() {
        let theme = Theme::default();
        let mut cache = LruCache::new(8);
        let node = leaf("a", "text");

        let none = HashSet::new();
        let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &none, &theme);
        let first = resolver.resolve(&node, None, 2);

        let pending: HashSet<Uid> = [Uid::from("a")].into_iter().collect();
        let mut previous = NodeArena::new();
        previous.insert(first);
        let mut resolver = InstanceResolver::new(&mut cache, previous, &pending, &theme);
        resolver.resolve(&node, None, 2);
        assert_eq!(resolver.stats.remeasured, 1);
    }

    #[test]
    fn test_depth_change_remeasures() {
        let theme = Theme::default();
        let pending = HashSet::new();
        let mut cache = LruCache::new(8);
        let node = leaf("a", "same text");

        let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &pending, &theme);
        let second_tier = resolver.resolve(&node, Some(&Uid::from("r")), 1);
        let mut resolver = InstanceResolver::new(&mut cache, NodeArena::new(), &pending, &theme);
        let node_tier = resolver.resolve(&node, Some(&Uid::from("r")), 2);
        assert_eq!(resolver.stats.remeasured, 1);
        assert!(node_tier.width < second_tier.width);
    }

    #[test]
    fn test_content_key_covers_size_and_overrides() {
        let mut node = leaf("a", "text");
        let plain = content_key(&node, 1);
        assert_eq!(plain, "Second|text|");

        node.data.size = Some(crate::data_source::Size::new(120.0, 40.0));
        node.data.style.set("fontSize", serde_json::json!(20));
        assert_eq!(content_key(&node, 1), "Second|text|120x40|fontSize=20");
        assert_ne!(content_key(&node, 2), content_key(&node, 1));
    }
}
