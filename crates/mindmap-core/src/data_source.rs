//! DataSource Tree
//!
//! The persisted mind-map document: a tree of [`DataSourceNode`]s whose `data` carries the node
//! text, view flags (`isExpand`, `isActive`, `isEdit`) and an open bag of style overrides.
//!
//! # Overview
//!
//! The DataSource tree is the only authoritative state in the engine. Everything else
//! (node instances, layout geometry, history snapshots) is derived from it:
//!
//! - Command handlers are the only code that mutates it.
//! - History snapshots are deep clones with `isActive` reset (see [`DataSourceNode::snapshot`]).
//! - Every node carries a [`Uid`] that is assigned once and survives cloning.
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "data": { "uid": "a1", "text": "Root", "isExpand": true, "isActive": false, "isEdit": false, "fontSize": 20 },
//!   "children": []
//! }
//! ```
//!
//! Style overrides such as `fontSize` live directly inside `data`; they are collected into
//! [`StyleOverrides`] on load and written back in place on save.
//!
//! # Example
//!
//! ```rust
//! use mindmap_core::{DataSourceNode, Uid};
//!
//! let root = DataSourceNode::with_uid("root", "Root")
//!     .with_children(vec![DataSourceNode::with_uid("a", "A"), DataSourceNode::with_uid("b", "B")]);
//!
//! assert_eq!(root.count(), 3);
//! assert_eq!(root.index_in_parent(&Uid::from("b")), Some(1));
//! ```

use crate::style::StyleOverrides;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Stable identifier of a DataSource node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Generate a fresh random (v4 UUID) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Width/height pair in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in canvas units.
    pub width: f64,
    /// Height in canvas units.
    pub height: f64,
}

impl Size {
    /// Create a size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

fn default_expand() -> bool {
    true
}

/// Content and view flags of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Identifier, generated on load when absent.
    #[serde(default = "Uid::generate")]
    pub uid: Uid,
    /// Node text (may contain `'\n'` line breaks).
    #[serde(default)]
    pub text: String,
    /// Whether the children of this node are visible.
    #[serde(default = "default_expand")]
    pub is_expand: bool,
    /// Whether the node is part of the current selection.
    #[serde(default)]
    pub is_active: bool,
    /// Whether the node text is being edited.
    #[serde(default)]
    pub is_edit: bool,
    /// Fixed size set by a drag-resize; overrides the measured text size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Per-node style overrides (`fontSize`, `paddingX`, `fillColor`, ...).
    #[serde(flatten)]
    pub style: StyleOverrides,
}

impl NodeData {
    /// Create node data with a fresh uid.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_uid(Uid::generate(), text)
    }

    /// Create node data with an explicit uid.
    pub fn with_uid(uid: impl Into<Uid>, text: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            text: text.into(),
            is_expand: true,
            is_active: false,
            is_edit: false,
            size: None,
            style: StyleOverrides::default(),
        }
    }
}

/// Document load/save errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document is not valid JSON or does not match the tree shape.
    #[error("invalid mind-map document: {0}")]
    Json(#[from] serde_json::Error),
    /// Two nodes share the same uid.
    #[error("duplicate node uid `{0}`")]
    DuplicateUid(Uid),
}

/// One node of the persisted mind-map tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceNode {
    /// Node content and flags.
    pub data: NodeData,
    /// Child nodes, in display order.
    #[serde(default)]
    pub children: Vec<DataSourceNode>,
}

impl DataSourceNode {
    /// Create a leaf with a fresh uid.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            data: NodeData::new(text),
            children: Vec::new(),
        }
    }

    /// Create a leaf with an explicit uid.
    pub fn with_uid(uid: impl Into<Uid>, text: impl Into<String>) -> Self {
        Self {
            data: NodeData::with_uid(uid, text),
            children: Vec::new(),
        }
    }

    /// Replace the children of this node (builder style).
    pub fn with_children(mut self, children: Vec<DataSourceNode>) -> Self {
        self.children = children;
        self
    }

    /// Parse a document and check uid uniqueness.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let root: DataSourceNode = serde_json::from_str(json)?;
        root.check_unique_uids()?;
        Ok(root)
    }

    /// Serialize the tree as compact JSON.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize the tree as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fail with [`DocumentError::DuplicateUid`] on the first repeated uid.
    pub fn check_unique_uids(&self) -> Result<(), DocumentError> {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !seen.insert(&node.data.uid) {
                return Err(DocumentError::DuplicateUid(node.data.uid.clone()));
            }
            stack.extend(node.children.iter());
        }
        Ok(())
    }

    /// Deep clone for history purposes: same uids, `isActive` forced to `false` everywhere.
    pub fn snapshot(&self) -> Self {
        let mut clone = self.clone();
        clone.walk_mut(&mut |node| node.data.is_active = false);
        clone
    }

    /// Uid of this node.
    pub fn uid(&self) -> &Uid {
        &self.data.uid
    }

    /// Number of nodes in this subtree (including `self`).
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DataSourceNode::count).sum::<usize>()
    }

    /// All uids of this subtree in pre-order.
    pub fn uids(&self) -> Vec<Uid> {
        let mut out = Vec::with_capacity(self.count());
        self.walk(&mut |node, _| out.push(node.data.uid.clone()));
        out
    }

    /// Pre-order traversal with depth (root = 0).
    pub fn walk<F: FnMut(&DataSourceNode, usize)>(&self, f: &mut F) {
        self.walk_at(0, f);
    }

    fn walk_at<F: FnMut(&DataSourceNode, usize)>(&self, depth: usize, f: &mut F) {
        f(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, f);
        }
    }

    /// Pre-order mutable traversal.
    pub fn walk_mut<F: FnMut(&mut DataSourceNode)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Whether `uid` is in this subtree.
    pub fn contains(&self, uid: &Uid) -> bool {
        self.find(uid).is_some()
    }

    /// Find a node by uid.
    pub fn find(&self, uid: &Uid) -> Option<&DataSourceNode> {
        if &self.data.uid == uid {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(uid))
    }

    /// Find a node by uid (mutable).
    pub fn find_mut(&mut self, uid: &Uid) -> Option<&mut DataSourceNode> {
        if &self.data.uid == uid {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(uid))
    }

    /// Parent of `uid` and the index of `uid` among its children.
    pub fn find_parent(&self, uid: &Uid) -> Option<(&DataSourceNode, usize)> {
        if let Some(index) = self.children.iter().position(|c| &c.data.uid == uid) {
            return Some((self, index));
        }
        self.children.iter().find_map(|child| child.find_parent(uid))
    }

    /// Parent of `uid` and the index of `uid` among its children (mutable).
    pub fn find_parent_mut(&mut self, uid: &Uid) -> Option<(&mut DataSourceNode, usize)> {
        if let Some(index) = self.children.iter().position(|c| &c.data.uid == uid) {
            return Some((self, index));
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_parent_mut(uid))
    }

    /// Index of `uid` among its siblings (`None` for the root or an unknown uid).
    pub fn index_in_parent(&self, uid: &Uid) -> Option<usize> {
        self.find_parent(uid).map(|(_, index)| index)
    }

    /// Ancestors of `uid`, root first, excluding `uid` itself.
    ///
    /// Returns `None` when `uid` is not in the tree.
    pub fn ancestors_of(&self, uid: &Uid) -> Option<Vec<Uid>> {
        let mut path = Vec::new();
        if self.collect_path(uid, &mut path) {
            path.pop();
            Some(path)
        } else {
            None
        }
    }

    fn collect_path(&self, uid: &Uid, path: &mut Vec<Uid>) -> bool {
        path.push(self.data.uid.clone());
        if &self.data.uid == uid {
            return true;
        }
        for child in &self.children {
            if child.collect_path(uid, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Depth of `uid` (root = 0).
    pub fn depth_of(&self, uid: &Uid) -> Option<usize> {
        self.ancestors_of(uid).map(|ancestors| ancestors.len())
    }

    /// Whether `ancestor` is a strict ancestor of `descendant`.
    pub fn is_ancestor(&self, ancestor: &Uid, descendant: &Uid) -> bool {
        self.ancestors_of(descendant)
            .is_some_and(|ancestors| ancestors.contains(ancestor))
    }

    /// The node that should take over the selection when `uid` disappears.
    ///
    /// Nearest previous sibling not in `removed`, else nearest next sibling not in `removed`,
    /// else the parent. `None` for the root or an unknown uid.
    pub fn adjacent_survivor(&self, uid: &Uid, removed: &HashSet<Uid>) -> Option<Uid> {
        let (parent, index) = self.find_parent(uid)?;
        let previous = parent.children[..index]
            .iter()
            .rev()
            .find(|sibling| !removed.contains(&sibling.data.uid));
        let next = parent.children[index + 1..]
            .iter()
            .find(|sibling| !removed.contains(&sibling.data.uid));

        previous
            .or(next)
            .map(|sibling| sibling.data.uid.clone())
            .or_else(|| Some(parent.data.uid.clone()))
    }

    /// Remove the subtree rooted at `uid`. The root itself cannot be removed.
    pub fn remove(&mut self, uid: &Uid) -> Option<DataSourceNode> {
        let (parent, index) = self.find_parent_mut(uid)?;
        Some(parent.children.remove(index))
    }

    /// Remove `uid` and splice its children into its place.
    ///
    /// Returns the uids of the promoted children.
    pub fn remove_promoting_children(&mut self, uid: &Uid) -> Option<Vec<Uid>> {
        let (parent, index) = self.find_parent_mut(uid)?;
        let removed = parent.children.remove(index);
        let promoted: Vec<Uid> = removed.children.iter().map(|c| c.data.uid.clone()).collect();
        for (offset, child) in removed.children.into_iter().enumerate() {
            parent.children.insert(index + offset, child);
        }
        Some(promoted)
    }

    /// Uids of active nodes in pre-order.
    pub fn active_uids(&self) -> Vec<Uid> {
        let mut out = Vec::new();
        self.walk(&mut |node, _| {
            if node.data.is_active {
                out.push(node.data.uid.clone());
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataSourceNode {
        DataSourceNode::with_uid("r", "Root").with_children(vec![
            DataSourceNode::with_uid("a", "A")
                .with_children(vec![DataSourceNode::with_uid("a1", "A1")]),
            DataSourceNode::with_uid("b", "B"),
            DataSourceNode::with_uid("c", "C"),
        ])
    }

    #[test]
    fn test_find_and_parent() {
        let tree = sample();
        assert_eq!(tree.find(&Uid::from("a1")).map(|n| n.data.text.as_str()), Some("A1"));
        let (parent, index) = tree.find_parent(&Uid::from("c")).unwrap();
        assert_eq!(parent.uid(), &Uid::from("r"));
        assert_eq!(index, 2);
        assert!(tree.find_parent(&Uid::from("r")).is_none());
    }

    #[test]
    fn test_ancestors_and_depth() {
        let tree = sample();
        assert_eq!(
            tree.ancestors_of(&Uid::from("a1")),
            Some(vec![Uid::from("r"), Uid::from("a")])
        );
        assert_eq!(tree.depth_of(&Uid::from("r")), Some(0));
        assert!(tree.is_ancestor(&Uid::from("r"), &Uid::from("a1")));
        assert!(!tree.is_ancestor(&Uid::from("b"), &Uid::from("a1")));
        assert_eq!(tree.ancestors_of(&Uid::from("zz")), None);
    }

    #[test]
    fn test_adjacent_survivor_prefers_previous_then_next_then_parent() {
        let tree = sample();
        let none = HashSet::new();
        assert_eq!(tree.adjacent_survivor(&Uid::from("b"), &none), Some(Uid::from("a")));
        assert_eq!(tree.adjacent_survivor(&Uid::from("a"), &none), Some(Uid::from("b")));
        assert_eq!(tree.adjacent_survivor(&Uid::from("a1"), &none), Some(Uid::from("a")));

        let removed: HashSet<Uid> = [Uid::from("a"), Uid::from("b")].into_iter().collect();
        assert_eq!(tree.adjacent_survivor(&Uid::from("b"), &removed), Some(Uid::from("c")));
    }

    #[test]
    fn test_remove_promoting_children_keeps_order() {
        let mut tree = sample();
        let promoted = tree.remove_promoting_children(&Uid::from("a")).unwrap();
        assert_eq!(promoted, vec![Uid::from("a1")]);
        let order: Vec<&str> = tree.children.iter().map(|c| c.uid().as_str()).collect();
        assert_eq!(order, vec!["a1", "b", "c"]);
    }

    #[test]
    fn test_snapshot_resets_active_and_keeps_uids() {
        let mut tree = sample();
        tree.find_mut(&Uid::from("b")).unwrap().data.is_active = true;
        let snapshot = tree.snapshot();
        assert!(snapshot.active_uids().is_empty());
        assert_eq!(snapshot.uids(), tree.uids());
    }

    #[test]
    fn test_json_round_trip_keeps_style_overrides_inline() {
        let json = r#"{"data":{"uid":"r","text":"Root","isExpand":true,"isActive":false,"isEdit":false,"fontSize":20},"children":[]}"#;
        let tree = DataSourceNode::from_json(json).unwrap();
        assert_eq!(tree.data.style.get("fontSize"), Some(&serde_json::json!(20)));

        let value: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
        assert_eq!(value["data"]["fontSize"], serde_json::json!(20));
        assert_eq!(value["data"]["uid"], serde_json::json!("r"));
    }

    #[test]
    fn test_missing_uid_is_generated_and_duplicates_rejected() {
        let tree = DataSourceNode::from_json(r#"{"data":{"text":"x"}}"#).unwrap();
        assert!(!tree.uid().as_str().is_empty());
        assert!(tree.data.is_expand);

        let dup = r#"{"data":{"uid":"x"},"children":[{"data":{"uid":"x"}}]}"#;
        assert!(matches!(
            DataSourceNode::from_json(dup),
            Err(DocumentError::DuplicateUid(uid)) if uid.as_str() == "x"
        ));
    }
}
