//! Selection Manager
//!
//! Keeps the ordered list of active nodes and the `isActive` flags of the live tree in sync.
//! The list is the source of truth for iteration order; the flags are what gets persisted and
//! what the renderer reads.

use crate::data_source::{DataSourceNode, Uid};
use std::collections::HashSet;

/// Ordered set of active node uids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionManager {
    active: Vec<Uid>,
}

impl SelectionManager {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active uids in selection order.
    pub fn active(&self) -> &[Uid] {
        &self.active
    }

    /// Most recently added active uid.
    pub fn last(&self) -> Option<&Uid> {
        self.active.last()
    }

    /// Whether `uid` is active.
    pub fn contains(&self, uid: &Uid) -> bool {
        self.active.contains(uid)
    }

    /// Number of active nodes.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Mark `uid` active. Idempotent; returns `false` if `uid` is not in `tree`.
    pub fn add_active(&mut self, tree: &mut DataSourceNode, uid: &Uid) -> bool {
        let Some(node) = tree.find_mut(uid) else {
            return false;
        };
        node.data.is_active = true;
        if !self.active.contains(uid) {
            self.active.push(uid.clone());
        }
        true
    }

    /// Mark `uid` inactive. Idempotent.
    pub fn remove_active(&mut self, tree: &mut DataSourceNode, uid: &Uid) {
        if let Some(node) = tree.find_mut(uid) {
            node.data.is_active = false;
        }
        self.active.retain(|active| active != uid);
    }

    /// Deactivate every node.
    pub fn clear(&mut self, tree: &mut DataSourceNode) {
        for uid in self.active.drain(..) {
            if let Some(node) = tree.find_mut(&uid) {
                node.data.is_active = false;
            }
        }
    }

    /// Replace the selection with `ids`.
    ///
    /// Every id is expected to be in `tree`; missing ids are skipped.
    pub fn reselect(&mut self, tree: &mut DataSourceNode, ids: &[Uid]) {
        self.clear(tree);
        for uid in ids {
            let found = self.add_active(tree, uid);
            debug_assert!(found, "reselected uid `{uid}` is not in the tree");
        }
    }

    /// Rebuild the list from the `isActive` flags of `tree` (pre-order).
    pub fn rebuild_from_tree(&mut self, tree: &DataSourceNode) {
        self.active = tree.active_uids();
    }

    /// Whether exactly the listed nodes carry `isActive` in `tree`.
    pub fn is_consistent_with(&self, tree: &DataSourceNode) -> bool {
        let flagged: HashSet<Uid> = tree.active_uids().into_iter().collect();
        let listed: HashSet<&Uid> = self.active.iter().collect();
        flagged.len() == listed.len() && flagged.iter().all(|uid| listed.contains(uid))
    }

    /// Deactivate every strict descendant of `uid`.
    pub fn clear_descendants(&mut self, tree: &mut DataSourceNode, uid: &Uid) {
        let Some(node) = tree.find(uid) else {
            return;
        };
        let descendants: HashSet<Uid> = node.uids().into_iter().skip(1).collect();
        let doomed: Vec<Uid> = self
            .active
            .iter()
            .filter(|active| descendants.contains(*active))
            .cloned()
            .collect();
        for uid in doomed {
            self.remove_active(tree, &uid);
        }
    }

    /// Drop ids that are no longer in `tree`.
    pub fn forget_missing(&mut self, tree: &DataSourceNode) {
        self.active.retain(|uid| tree.contains(uid));
    }
}

/// Filter `ids` down to the nodes with no ancestor in `ids`.
///
/// Order is preserved, duplicates and uids absent from `tree` are dropped.
pub fn topmost_ancestors_only(tree: &DataSourceNode, ids: &[Uid]) -> Vec<Uid> {
    let selected: HashSet<&Uid> = ids.iter().collect();
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|uid| seen.insert(*uid))
        .filter(|uid| {
            tree.ancestors_of(uid).is_some_and(|ancestors| {
                !ancestors.iter().any(|ancestor| selected.contains(ancestor))
            })
        })
        .cloned()
        .collect()
}
