//! History Manager
//!
//! Snapshot-based linear undo/redo. Every recorded command pushes a deep clone of the whole
//! DataSource tree (with `isActive` cleared), so restoring a state is a plain tree swap.
//!
//! ```text
//! entries:  [baseline] [insert-child] [set-expand] [resize]
//!                                          ^ active_index
//! undo  -> active_index - 1, restore that snapshot, reselect the ids of the undone entry
//! redo  -> active_index + 1, restore that snapshot, reselect per command kind
//! record after undo -> truncate everything past active_index, then push
//! ```
//!
//! # Gestures
//!
//! A resize drag or a text edit produces exactly one entry: the entry recorded before the
//! gesture receives the "before" [`ResizeRecord`] and the new entry carries the "after" record.

use crate::commands::CommandName;
use crate::data_source::{DataSourceNode, Size, Uid};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Undo/redo past either end of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryBoundary {
    /// `undo` at the oldest entry.
    #[error("nothing to undo")]
    NothingToUndo,
    /// `redo` at the newest entry.
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Size of one node at a history point.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeRecord {
    /// Resized node.
    pub uid: Uid,
    /// Width at that point.
    pub width: f64,
    /// Height at that point.
    pub height: f64,
}

impl ResizeRecord {
    fn new(uid: Uid, size: Size) -> Self {
        Self {
            uid,
            width: size.width,
            height: size.height,
        }
    }
}

/// One history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    /// Command that produced the entry (`None` for the baseline).
    pub cmd_name: Option<CommandName>,
    /// Nodes the command operated on.
    pub manipulated_node_ids: Vec<Uid>,
    /// Tree after the command, `isActive` cleared.
    pub snapshot: DataSourceNode,
    /// Index of the inserted node among its siblings (insert-sibling only).
    pub insert_sibling_index: Option<usize>,
    /// Size record attached by a gesture.
    pub resize_record: Option<ResizeRecord>,
}

/// History limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Maximum number of entries kept, baseline included.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

/// Before/after sizes of a finished gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSizes {
    /// Node the gesture acted on.
    pub uid: Uid,
    /// Size when the gesture started.
    pub before: Size,
    /// Size when the gesture ended.
    pub after: Size,
}

/// What to record for one executed command.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRequest {
    /// Executed command.
    pub cmd_name: CommandName,
    /// Nodes the command operated on, already normalized (topmost ancestors, root children).
    pub manipulated: Vec<Uid>,
    /// Index of the inserted sibling.
    pub insert_sibling_index: Option<usize>,
    /// Finished gesture to merge.
    pub gesture: Option<GestureSizes>,
}

impl RecordRequest {
    /// Request for `cmd_name` operating on `manipulated`.
    pub fn new(cmd_name: CommandName, manipulated: Vec<Uid>) -> Self {
        Self {
            cmd_name,
            manipulated,
            insert_sibling_index: None,
            gesture: None,
        }
    }
}

/// Result of an undo or redo.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryJump {
    /// New active index.
    pub index: usize,
    /// Tree to restore.
    pub snapshot: DataSourceNode,
    /// Nodes to select in the restored tree.
    pub reselect: Vec<Uid>,
    /// Size record of the restored entry.
    pub resize_record: Option<ResizeRecord>,
}

/// Linear snapshot history.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<HistoryItem>,
    active_index: usize,
    config: HistoryConfig,
}

impl HistoryManager {
    /// History holding only a baseline snapshot of `tree`.
    pub fn new(tree: &DataSourceNode, config: HistoryConfig) -> Self {
        let mut history = Self {
            entries: Vec::new(),
            active_index: 0,
            config: HistoryConfig {
                max_depth: config.max_depth.max(1),
            },
        };
        history.reset(tree);
        history
    }

    /// Drop every entry and start over from a baseline snapshot of `tree`.
    pub fn reset(&mut self, tree: &DataSourceNode) {
        self.entries.clear();
        self.entries.push(HistoryItem {
            cmd_name: None,
            manipulated_node_ids: Vec::new(),
            snapshot: tree.snapshot(),
            insert_sibling_index: None,
            resize_record: None,
        });
        self.active_index = 0;
    }

    /// Configuration.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// All kept entries, oldest first.
    pub fn entries(&self) -> &[HistoryItem] {
        &self.entries
    }

    /// Entry the live tree corresponds to.
    pub fn current(&self) -> Option<&HistoryItem> {
        self.entries.get(self.active_index)
    }

    /// Index of the current entry.
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// Number of kept entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: the baseline is never removed by `undo`/`redo`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `undo` would succeed.
    pub fn can_undo(&self) -> bool {
        self.active_index > 0
    }

    /// Whether `redo` would succeed.
    pub fn can_redo(&self) -> bool {
        self.active_index + 1 < self.entries.len()
    }

    /// Number of steps `undo` can take.
    pub fn undo_depth(&self) -> usize {
        self.active_index
    }

    /// Number of steps `redo` can take.
    pub fn redo_depth(&self) -> usize {
        self.entries.len().saturating_sub(self.active_index + 1)
    }

    /// Record the state of `tree` after a command.
    ///
    /// View-only commands are skipped; returns whether an entry was pushed.
    pub fn record(&mut self, tree: &DataSourceNode, request: RecordRequest) -> bool {
        if request.cmd_name.is_view_only() {
            return false;
        }

        self.entries.truncate(self.active_index + 1);

        let mut resize_record = None;
        if let Some(gesture) = request.gesture {
            if let Some(previous) = self.entries.last_mut() {
                previous.resize_record = Some(ResizeRecord::new(gesture.uid.clone(), gesture.before));
            }
            resize_record = Some(ResizeRecord::new(gesture.uid, gesture.after));
        }

        self.entries.push(HistoryItem {
            cmd_name: Some(request.cmd_name),
            manipulated_node_ids: request.manipulated,
            snapshot: tree.snapshot(),
            insert_sibling_index: request.insert_sibling_index,
            resize_record,
        });

        if self.entries.len() > self.config.max_depth {
            let overflow = self.entries.len() - self.config.max_depth;
            self.entries.drain(..overflow);
        }
        self.active_index = self.entries.len() - 1;

        tracing::debug!(
            command = %request.cmd_name,
            index = self.active_index,
            "recorded history entry"
        );
        true
    }

    /// Step back one entry.
    pub fn undo(&mut self) -> Result<HistoryJump, HistoryBoundary> {
        if self.active_index == 0 {
            return Err(HistoryBoundary::NothingToUndo);
        }
        let reselect = self.entries[self.active_index].manipulated_node_ids.clone();
        self.active_index -= 1;
        let target = &self.entries[self.active_index];

        tracing::debug!(index = self.active_index, "undo");
        Ok(HistoryJump {
            index: self.active_index,
            snapshot: target.snapshot.clone(),
            reselect,
            resize_record: target.resize_record.clone(),
        })
    }

    /// Step forward one entry.
    pub fn redo(&mut self) -> Result<HistoryJump, HistoryBoundary> {
        if !self.can_redo() {
            return Err(HistoryBoundary::NothingToRedo);
        }
        let previous = &self.entries[self.active_index].snapshot;
        let target = &self.entries[self.active_index + 1];
        let reselect = redo_selection(target, previous);
        let jump = HistoryJump {
            index: self.active_index + 1,
            snapshot: target.snapshot.clone(),
            reselect,
            resize_record: target.resize_record.clone(),
        };
        self.active_index += 1;

        tracing::debug!(index = self.active_index, "redo");
        Ok(jump)
    }
}

/// Nodes to select after redoing `item`, resolved against its snapshot.
///
/// `previous` is the snapshot the command was applied to.
fn redo_selection(item: &HistoryItem, previous: &DataSourceNode) -> Vec<Uid> {
    let tree = &item.snapshot;
    let ids = &item.manipulated_node_ids;

    let candidates: Vec<Uid> = match item.cmd_name {
        Some(CommandName::InsertChild) => ids
            .first()
            .and_then(|uid| tree.find(uid))
            .and_then(|node| node.children.last())
            .map(|child| vec![child.uid().clone()])
            .unwrap_or_default(),
        Some(CommandName::InsertSibling) => ids
            .first()
            .zip(item.insert_sibling_index)
            .and_then(|(uid, index)| {
                let (parent, _) = tree.find_parent(uid)?;
                parent.children.get(index)
            })
            .map(|node| vec![node.uid().clone()])
            .unwrap_or_default(),
        Some(CommandName::DeleteSubtree) => survivor_of_last(previous, ids),
        Some(CommandName::DeleteSinglePromoteChildren) => {
            let removed: HashSet<&Uid> = ids.iter().collect();
            let promoted: Vec<Uid> = ids
                .iter()
                .filter_map(|uid| previous.find(uid))
                .flat_map(|node| node.children.iter().map(DataSourceNode::uid))
                .filter(|uid| !removed.contains(uid))
                .cloned()
                .collect();
            if promoted.is_empty() {
                survivor_of_last(previous, ids)
            } else {
                promoted
            }
        }
        _ => ids.clone(),
    };

    candidates
        .into_iter()
        .filter(|uid| {
            let present = tree.contains(uid);
            debug_assert!(present, "redo selection `{uid}` is not in the restored tree");
            present
        })
        .collect()
}

/// Adjacent survivor of the last removed id, in the tree before removal.
pub(crate) fn survivor_of_last(before: &DataSourceNode, removed: &[Uid]) -> Vec<Uid> {
    let removed_set: HashSet<Uid> = removed.iter().cloned().collect();
    removed
        .last()
        .and_then(|uid| before.adjacent_survivor(uid, &removed_set))
        .into_iter()
        .collect()
}

/// In-progress gestures (resize drag, text edit).
#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    resize: Option<(Uid, Size)>,
    edit: Option<EditGesture>,
}

#[derive(Debug, Clone)]
struct EditGesture {
    uid: Uid,
    size: Size,
    text: String,
}

impl GestureTracker {
    /// Remember the size of `uid` at the start of a resize drag.
    pub fn begin_resize(&mut self, uid: Uid, before: Size) {
        self.resize = Some((uid, before));
    }

    /// Finish the resize drag of `uid`, returning its starting size.
    pub fn take_resize(&mut self, uid: &Uid) -> Option<Size> {
        match self.resize.take() {
            Some((started, before)) if &started == uid => Some(before),
            other => {
                self.resize = other;
                None
            }
        }
    }

    /// Remember size and text of `uid` when it enters edit mode.
    pub fn begin_edit(&mut self, uid: Uid, size: Size, text: String) {
        self.edit = Some(EditGesture { uid, size, text });
    }

    /// Finish the text edit of `uid`, returning its starting size and text.
    pub fn take_edit(&mut self, uid: &Uid) -> Option<(Size, String)> {
        match self.edit.take() {
            Some(edit) if &edit.uid == uid => Some((edit.size, edit.text)),
            other => {
                self.edit = other;
                None
            }
        }
    }

    /// Whether a gesture is in progress.
    pub fn is_active(&self) -> bool {
        self.resize.is_some() || self.edit.is_some()
    }

    /// Abandon every gesture.
    pub fn clear(&mut self) {
        self.resize = None;
        self.edit = None;
    }
}
