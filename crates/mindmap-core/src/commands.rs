//! Command Interface Layer
//!
//! Every mutation of the DataSource tree goes through a [`Command`]. Commands are dispatched by
//! name through a [`CommandRegistry`]: each [`CommandName`] maps to an ordered list of handlers,
//! and all of them run, in registration order, when the command executes.
//!
//! # Overview
//!
//! - **Structural commands**: insert-child, insert-sibling, delete-subtree,
//!   delete-single-promote-children, set-expand
//! - **Content commands**: set-edit, set-text, set-data, set-style, resize
//! - **Selection commands**: set-active, clear-active
//! - **History commands**: undo, redo
//!
//! Handlers see the session state through a [`CommandContext`] and report what they did through
//! [`CommandEffects`]; the session turns the effects into a history record, a layout pass and a
//! state-change notification.
//!
//! # Example
//!
//! ```rust
//! use mindmap_core::{Command, CommandResult, DataSourceNode, MindMapSession, Uid};
//!
//! let root = DataSourceNode::with_uid("root", "Root");
//! let mut session = MindMapSession::new(root);
//!
//! let result = session.exec_command(Command::insert_child("root")).unwrap();
//! let CommandResult::Inserted { uid } = result else { panic!("expected an insertion") };
//!
//! assert_eq!(session.selection().active(), &[uid]);
//! session.exec_command(Command::Undo).unwrap();
//! assert!(session.tree().children.is_empty());
//! ```

use crate::data_source::{DataSourceNode, Size, Uid};
use crate::history::{GestureSizes, GestureTracker, HistoryBoundary, HistoryManager};
use crate::measure::content_size;
use crate::node::NodeArena;
use crate::selection::{SelectionManager, topmost_ancestors_only};
use crate::style::Theme;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Text of a node created without explicit text.
pub const DEFAULT_NODE_TEXT: &str = "Branch topic";

/// Closed set of command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandName {
    /// Append a child to one node.
    InsertChild,
    /// Insert a sibling after one node.
    InsertSibling,
    /// Remove whole subtrees.
    DeleteSubtree,
    /// Remove nodes, promoting their children.
    DeleteSinglePromoteChildren,
    /// Expand or collapse nodes.
    SetExpand,
    /// Add or remove a node from the selection.
    SetActive,
    /// Enter or leave text edit mode.
    SetEdit,
    /// Replace the text of a node.
    SetText,
    /// Patch the data fields of a node.
    SetData,
    /// Set or clear a style override.
    SetStyle,
    /// Drag-resize a node.
    Resize,
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
    /// Empty the selection.
    ClearActive,
}

impl CommandName {
    /// Every command name.
    pub const ALL: [CommandName; 14] = [
        CommandName::InsertChild,
        CommandName::InsertSibling,
        CommandName::DeleteSubtree,
        CommandName::DeleteSinglePromoteChildren,
        CommandName::SetExpand,
        CommandName::SetActive,
        CommandName::SetEdit,
        CommandName::SetText,
        CommandName::SetData,
        CommandName::SetStyle,
        CommandName::Resize,
        CommandName::Undo,
        CommandName::Redo,
        CommandName::ClearActive,
    ];

    /// Kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::InsertChild => "insert-child",
            CommandName::InsertSibling => "insert-sibling",
            CommandName::DeleteSubtree => "delete-subtree",
            CommandName::DeleteSinglePromoteChildren => "delete-single-promote-children",
            CommandName::SetExpand => "set-expand",
            CommandName::SetActive => "set-active",
            CommandName::SetEdit => "set-edit",
            CommandName::SetText => "set-text",
            CommandName::SetData => "set-data",
            CommandName::SetStyle => "set-style",
            CommandName::Resize => "resize",
            CommandName::Undo => "undo",
            CommandName::Redo => "redo",
            CommandName::ClearActive => "clear-active",
        }
    }

    /// Commands that never produce a history entry.
    pub fn is_view_only(self) -> bool {
        matches!(
            self,
            CommandName::SetActive
                | CommandName::ClearActive
                | CommandName::SetData
                | CommandName::SetText
                | CommandName::Undo
                | CommandName::Redo
        )
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

/// Phase of a resize drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    /// Pointer pressed.
    Begin,
    /// Pointer moved.
    Update,
    /// Pointer released.
    End,
}

/// A command with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append a child to the single target node.
    InsertChild {
        /// Target nodes (exactly one).
        nodes: Vec<Uid>,
        /// Text of the new node ([`DEFAULT_NODE_TEXT`] when absent).
        text: Option<String>,
    },
    /// Insert a sibling right after the single target node.
    InsertSibling {
        /// Target nodes (exactly one, not the root).
        nodes: Vec<Uid>,
        /// Text of the new node ([`DEFAULT_NODE_TEXT`] when absent).
        text: Option<String>,
    },
    /// Remove the target subtrees.
    DeleteSubtree {
        /// Target nodes.
        nodes: Vec<Uid>,
    },
    /// Remove the target nodes, splicing their children into their place.
    DeleteSinglePromoteChildren {
        /// Target nodes (never the root).
        nodes: Vec<Uid>,
    },
    /// Expand or collapse the target nodes.
    SetExpand {
        /// Target nodes.
        nodes: Vec<Uid>,
        /// `true` to expand.
        expand: bool,
    },
    /// Change the selection state of one node.
    SetActive {
        /// Target node.
        node: Uid,
        /// `true` to select.
        active: bool,
        /// Keep the rest of the selection when selecting.
        additive: bool,
    },
    /// Enter or leave text edit mode.
    SetEdit {
        /// Target node.
        node: Uid,
        /// `true` to enter edit mode.
        editing: bool,
    },
    /// Replace the text of a node.
    SetText {
        /// Target node.
        node: Uid,
        /// New text.
        text: String,
    },
    /// Patch data fields of a node (`text`, `isExpand`, `isEdit`, `size`, style overrides).
    SetData {
        /// Target node.
        node: Uid,
        /// camelCase field -> value; `null` clears a style override or the fixed size.
        data: Map<String, Value>,
    },
    /// Set (`Some`) or clear (`None`) one style override on the target nodes.
    SetStyle {
        /// Target nodes.
        nodes: Vec<Uid>,
        /// camelCase style key.
        key: String,
        /// New value.
        value: Option<Value>,
    },
    /// One step of a drag-resize.
    Resize {
        /// Target node.
        node: Uid,
        /// New width.
        width: f64,
        /// New height.
        height: f64,
        /// Drag phase.
        phase: GesturePhase,
    },
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
    /// Empty the selection.
    ClearActive,
}

impl Command {
    /// Insert-child on `node` with the default text.
    pub fn insert_child(node: impl Into<Uid>) -> Self {
        Command::InsertChild {
            nodes: vec![node.into()],
            text: None,
        }
    }

    /// Insert-sibling after `node` with the default text.
    pub fn insert_sibling(node: impl Into<Uid>) -> Self {
        Command::InsertSibling {
            nodes: vec![node.into()],
            text: None,
        }
    }

    /// Delete the subtree of `node`.
    pub fn delete(node: impl Into<Uid>) -> Self {
        Command::DeleteSubtree {
            nodes: vec![node.into()],
        }
    }

    /// Select `node` alone.
    pub fn select(node: impl Into<Uid>) -> Self {
        Command::SetActive {
            node: node.into(),
            active: true,
            additive: false,
        }
    }

    /// Name of this command.
    pub fn name(&self) -> CommandName {
        match self {
            Command::InsertChild { .. } => CommandName::InsertChild,
            Command::InsertSibling { .. } => CommandName::InsertSibling,
            Command::DeleteSubtree { .. } => CommandName::DeleteSubtree,
            Command::DeleteSinglePromoteChildren { .. } => {
                CommandName::DeleteSinglePromoteChildren
            }
            Command::SetExpand { .. } => CommandName::SetExpand,
            Command::SetActive { .. } => CommandName::SetActive,
            Command::SetEdit { .. } => CommandName::SetEdit,
            Command::SetText { .. } => CommandName::SetText,
            Command::SetData { .. } => CommandName::SetData,
            Command::SetStyle { .. } => CommandName::SetStyle,
            Command::Resize { .. } => CommandName::Resize,
            Command::Undo => CommandName::Undo,
            Command::Redo => CommandName::Redo,
            Command::ClearActive => CommandName::ClearActive,
        }
    }

    /// Nodes named by this command.
    pub fn targets(&self) -> &[Uid] {
        match self {
            Command::InsertChild { nodes, .. }
            | Command::InsertSibling { nodes, .. }
            | Command::DeleteSubtree { nodes }
            | Command::DeleteSinglePromoteChildren { nodes }
            | Command::SetExpand { nodes, .. }
            | Command::SetStyle { nodes, .. } => nodes,
            Command::SetActive { node, .. }
            | Command::SetEdit { node, .. }
            | Command::SetText { node, .. }
            | Command::SetData { node, .. }
            | Command::Resize { node, .. } => std::slice::from_ref(node),
            Command::Undo | Command::Redo | Command::ClearActive => &[],
        }
    }
}

/// Command execution result.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Executed.
    Success,
    /// No handler is registered for the command.
    Ignored,
    /// A node was created.
    Inserted {
        /// Uid of the new node.
        uid: Uid,
    },
    /// Nodes were removed.
    Deleted {
        /// Every removed uid, descendants included.
        removed: Vec<Uid>,
    },
    /// A history entry was restored.
    HistoryRestored {
        /// Index of the restored entry.
        index: usize,
    },
}

/// Why a command was rejected on structural grounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralViolation {
    /// The command works on exactly one node.
    #[error("expected exactly one target node, got {0}")]
    SingleTargetRequired(usize),
    /// The command needs at least one node.
    #[error("no target node")]
    NoTarget,
    /// The named node is not in the live tree.
    #[error("node `{0}` is not in the tree")]
    UnknownNode(Uid),
    /// The root cannot have siblings.
    #[error("the root node cannot have siblings")]
    RootSibling,
    /// The root cannot be removed.
    #[error("the root node cannot be removed")]
    RootRemoval,
}

/// Command execution errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Rejected before any mutation.
    #[error("{command} rejected: {violation}")]
    Structural {
        /// Rejected command.
        command: CommandName,
        /// Reason.
        violation: StructuralViolation,
    },
    /// Undo/redo past the ends of the history.
    #[error(transparent)]
    HistoryBoundary(#[from] HistoryBoundary),
    /// No command has this name.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    /// The field is managed by the engine.
    #[error("field `{0}` cannot be set directly")]
    ReservedField(String),
    /// A value has the wrong type or range.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// Offending field.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl CommandError {
    fn structural(command: CommandName, violation: StructuralViolation) -> Self {
        CommandError::Structural { command, violation }
    }

    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        CommandError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// What handlers did, collected for the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandEffects {
    /// Nodes created.
    pub created: Vec<Uid>,
    /// Nodes removed (descendants included).
    pub removed: Vec<Uid>,
    /// Normalized nodes to record in history.
    pub manipulated: Vec<Uid>,
    /// Index of an inserted sibling.
    pub insert_sibling_index: Option<usize>,
    /// Nodes whose content size must be recomputed.
    pub invalidated: Vec<Uid>,
    /// Finished gesture to merge into history.
    pub gesture: Option<GestureSizes>,
    /// Do not record this execution (gesture in progress, no-op).
    pub skip_history: bool,
    /// The whole tree was replaced by a snapshot.
    pub tree_replaced: bool,
    /// History index restored by undo/redo.
    pub restored: Option<usize>,
    /// Postpone layout until the gesture ends or `flush_layout` is called.
    pub defer_layout: bool,
}

/// Session state handed to handlers.
pub struct CommandContext<'a> {
    /// Live DataSource tree.
    pub tree: &'a mut DataSourceNode,
    /// Selection.
    pub selection: &'a mut SelectionManager,
    /// History (for undo/redo).
    pub history: &'a mut HistoryManager,
    /// In-progress gestures.
    pub gestures: &'a mut GestureTracker,
    /// Instances of the last layout frame (read-only).
    pub nodes: &'a NodeArena,
    /// Active theme.
    pub theme: &'a Theme,
    /// Effects sink.
    pub effects: CommandEffects,
}

impl CommandContext<'_> {
    fn ensure_known(&self, command: CommandName, uid: &Uid) -> Result<(), CommandError> {
        if self.tree.contains(uid) {
            Ok(())
        } else {
            Err(CommandError::structural(
                command,
                StructuralViolation::UnknownNode(uid.clone()),
            ))
        }
    }

    fn ensure_all_known(&self, command: CommandName, nodes: &[Uid]) -> Result<(), CommandError> {
        if nodes.is_empty() {
            return Err(CommandError::structural(command, StructuralViolation::NoTarget));
        }
        nodes
            .iter()
            .try_for_each(|uid| self.ensure_known(command, uid))
    }

    /// Current content size of `uid` (fixed size, else measured text).
    pub fn current_size(&self, uid: &Uid) -> Option<Size> {
        let depth = self.tree.depth_of(uid)?;
        let node = self.tree.find(uid)?;
        Some(content_size(&node.data, depth, self.theme))
    }
}

/// A command handler.
pub type CommandHandler =
    Box<dyn FnMut(&mut CommandContext<'_>, &Command) -> Result<(), CommandError> + Send>;

/// Dispatch table from command name to handlers.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<CommandName, Vec<CommandHandler>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(name, handlers)| (name.as_str(), handlers.len()))
            .collect();
        f.debug_struct("CommandRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl CommandRegistry {
    /// Registry without any handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler of every command.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(CommandName::InsertChild, insert_child);
        registry.register(CommandName::InsertSibling, insert_sibling);
        registry.register(CommandName::DeleteSubtree, delete_subtree);
        registry.register(
            CommandName::DeleteSinglePromoteChildren,
            delete_single_promote_children,
        );
        registry.register(CommandName::SetExpand, set_expand);
        registry.register(CommandName::SetActive, set_active);
        registry.register(CommandName::ClearActive, clear_active);
        registry.register(CommandName::SetEdit, set_edit);
        registry.register(CommandName::SetText, set_text);
        registry.register(CommandName::SetData, set_data);
        registry.register(CommandName::SetStyle, set_style);
        registry.register(CommandName::Resize, resize);
        registry.register(CommandName::Undo, undo);
        registry.register(CommandName::Redo, redo);
        registry
    }

    /// Append a handler for `name`.
    pub fn register<F>(&mut self, name: CommandName, handler: F)
    where
        F: FnMut(&mut CommandContext<'_>, &Command) -> Result<(), CommandError> + Send + 'static,
    {
        self.handlers.entry(name).or_default().push(Box::new(handler));
    }

    /// Whether any handler is registered for `name`.
    pub fn is_registered(&self, name: CommandName) -> bool {
        self.handlers.get(&name).is_some_and(|handlers| !handlers.is_empty())
    }

    /// Number of handlers registered for `name`.
    pub fn handler_count(&self, name: CommandName) -> usize {
        self.handlers.get(&name).map_or(0, Vec::len)
    }

    /// Run every handler of `command` in registration order, stopping at the first error.
    ///
    /// Returns `false` when no handler is registered.
    pub fn execute(
        &mut self,
        ctx: &mut CommandContext<'_>,
        command: &Command,
    ) -> Result<bool, CommandError> {
        let Some(handlers) = self.handlers.get_mut(&command.name()) else {
            return Ok(false);
        };
        if handlers.is_empty() {
            return Ok(false);
        }
        for handler in handlers.iter_mut() {
            handler(ctx, command)?;
        }
        Ok(true)
    }
}

fn single_target(command: CommandName, nodes: &[Uid]) -> Result<&Uid, CommandError> {
    match nodes {
        [uid] => Ok(uid),
        _ => Err(CommandError::structural(
            command,
            StructuralViolation::SingleTargetRequired(nodes.len()),
        )),
    }
}

fn new_node(text: Option<&str>) -> DataSourceNode {
    let mut node = DataSourceNode::new(text.unwrap_or(DEFAULT_NODE_TEXT));
    node.data.is_edit = true;
    node
}

/// New nodes open in edit mode; leaving it records the typed text as one gesture.
fn begin_new_node_edit(ctx: &mut CommandContext<'_>, uid: &Uid) {
    let Some(size) = ctx.current_size(uid) else {
        return;
    };
    let text = ctx
        .tree
        .find(uid)
        .map(|node| node.data.text.clone())
        .unwrap_or_default();
    ctx.gestures.begin_edit(uid.clone(), size, text);
}

fn insert_child(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::InsertChild { nodes, text } = command else {
        return Ok(());
    };
    let target = single_target(CommandName::InsertChild, nodes)?;
    ctx.ensure_known(CommandName::InsertChild, target)?;

    let child = new_node(text.as_deref());
    let uid = child.uid().clone();
    if let Some(parent) = ctx.tree.find_mut(target) {
        parent.data.is_expand = true;
        parent.children.push(child);
    }

    begin_new_node_edit(ctx, &uid);
    ctx.selection.reselect(ctx.tree, std::slice::from_ref(&uid));
    ctx.effects.created.push(uid);
    ctx.effects.manipulated = vec![target.clone()];
    Ok(())
}

fn insert_sibling(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::InsertSibling { nodes, text } = command else {
        return Ok(());
    };
    let target = single_target(CommandName::InsertSibling, nodes)?;
    ctx.ensure_known(CommandName::InsertSibling, target)?;
    if ctx.tree.uid() == target {
        return Err(CommandError::structural(
            CommandName::InsertSibling,
            StructuralViolation::RootSibling,
        ));
    }

    let sibling = new_node(text.as_deref());
    let uid = sibling.uid().clone();
    let mut inserted_at = None;
    if let Some((parent, index)) = ctx.tree.find_parent_mut(target) {
        parent.children.insert(index + 1, sibling);
        inserted_at = Some(index + 1);
    }

    begin_new_node_edit(ctx, &uid);
    ctx.selection.reselect(ctx.tree, std::slice::from_ref(&uid));
    ctx.effects.created.push(uid);
    ctx.effects.manipulated = vec![target.clone()];
    ctx.effects.insert_sibling_index = inserted_at;
    Ok(())
}

fn delete_subtree(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::DeleteSubtree { nodes } = command else {
        return Ok(());
    };
    ctx.ensure_all_known(CommandName::DeleteSubtree, nodes)?;

    let root = ctx.tree.uid().clone();
    let topmost = topmost_ancestors_only(ctx.tree, nodes);
    // The root stays; deleting it empties the map instead.
    let targets: Vec<Uid> = if topmost.contains(&root) {
        ctx.tree.children.iter().map(|c| c.uid().clone()).collect()
    } else {
        topmost
    };
    if targets.is_empty() {
        ctx.effects.skip_history = true;
        return Ok(());
    }

    let survivor = crate::history::survivor_of_last(ctx.tree, &targets);
    ctx.selection.clear(ctx.tree);
    for uid in &targets {
        if let Some(subtree) = ctx.tree.remove(uid) {
            ctx.effects.removed.extend(subtree.uids());
        }
    }
    ctx.selection.forget_missing(ctx.tree);
    for uid in &survivor {
        ctx.selection.add_active(ctx.tree, uid);
    }

    ctx.effects.manipulated = targets;
    Ok(())
}

fn delete_single_promote_children(
    ctx: &mut CommandContext<'_>,
    command: &Command,
) -> Result<(), CommandError> {
    let Command::DeleteSinglePromoteChildren { nodes } = command else {
        return Ok(());
    };
    let name = CommandName::DeleteSinglePromoteChildren;
    ctx.ensure_all_known(name, nodes)?;
    if nodes.contains(ctx.tree.uid()) {
        return Err(CommandError::structural(name, StructuralViolation::RootRemoval));
    }

    let mut seen = HashSet::new();
    let targets: Vec<Uid> = nodes.iter().filter(|uid| seen.insert(*uid)).cloned().collect();
    let removed: HashSet<&Uid> = targets.iter().collect();
    let survivor = crate::history::survivor_of_last(ctx.tree, &targets);

    ctx.selection.clear(ctx.tree);
    let mut promoted = Vec::new();
    for uid in &targets {
        if let Some(children) = ctx.tree.remove_promoting_children(uid) {
            promoted.extend(children.into_iter().filter(|child| !removed.contains(child)));
            ctx.effects.removed.push(uid.clone());
        }
    }
    ctx.selection.forget_missing(ctx.tree);

    let reselect = if promoted.is_empty() { survivor } else { promoted };
    for uid in &reselect {
        ctx.selection.add_active(ctx.tree, uid);
    }
    ctx.effects.manipulated = targets;
    Ok(())
}

fn set_expand(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::SetExpand { nodes, expand } = command else {
        return Ok(());
    };
    ctx.ensure_all_known(CommandName::SetExpand, nodes)?;

    let root = ctx.tree.uid().clone();
    let targets: Vec<Uid> = if nodes.len() > 1 && nodes.contains(&root) {
        let children: Vec<Uid> = ctx.tree.children.iter().map(|c| c.uid().clone()).collect();
        // The root's children act in the root's place.
        ctx.selection.remove_active(ctx.tree, &root);
        for child in &children {
            ctx.selection.add_active(ctx.tree, child);
        }
        children
    } else if nodes.len() > 1 {
        topmost_ancestors_only(ctx.tree, nodes)
    } else {
        nodes.clone()
    };

    for uid in &targets {
        if let Some(node) = ctx.tree.find_mut(uid) {
            node.data.is_expand = *expand;
        }
        if !expand {
            ctx.selection.clear_descendants(ctx.tree, uid);
        }
    }

    ctx.effects.manipulated = targets;
    Ok(())
}

fn set_active(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::SetActive {
        node,
        active,
        additive,
    } = command
    else {
        return Ok(());
    };
    ctx.ensure_known(CommandName::SetActive, node)?;

    if *active {
        if !additive {
            ctx.selection.clear(ctx.tree);
        }
        ctx.selection.add_active(ctx.tree, node);
    } else {
        ctx.selection.remove_active(ctx.tree, node);
    }
    ctx.effects.manipulated = vec![node.clone()];
    Ok(())
}

fn clear_active(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    if matches!(command, Command::ClearActive) {
        ctx.selection.clear(ctx.tree);
    }
    Ok(())
}

fn set_edit(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::SetEdit { node, editing } = command else {
        return Ok(());
    };
    ctx.ensure_known(CommandName::SetEdit, node)?;

    let before = ctx.current_size(node);
    let Some(data) = ctx.tree.find_mut(node).map(|n| &mut n.data) else {
        return Ok(());
    };
    data.is_edit = *editing;

    if *editing {
        let text = data.text.clone();
        if let Some(size) = before {
            ctx.gestures.begin_edit(node.clone(), size, text);
        }
        ctx.effects.skip_history = true;
        return Ok(());
    }

    let changed = match ctx.gestures.take_edit(node) {
        Some((size, text)) if text != data.text => Some(size),
        _ => None,
    };
    match (changed, ctx.current_size(node)) {
        (Some(before), Some(after)) => {
            ctx.effects.gesture = Some(GestureSizes {
                uid: node.clone(),
                before,
                after,
            });
            ctx.effects.manipulated = vec![node.clone()];
            ctx.effects.invalidated.push(node.clone());
        }
        _ => ctx.effects.skip_history = true,
    }
    Ok(())
}

fn set_text(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::SetText { node, text } = command else {
        return Ok(());
    };
    ctx.ensure_known(CommandName::SetText, node)?;

    if let Some(target) = ctx.tree.find_mut(node) {
        target.data.text = text.clone();
    }
    ctx.effects.manipulated = vec![node.clone()];
    ctx.effects.invalidated.push(node.clone());
    Ok(())
}

/// Data keys a handler may never overwrite.
const ENGINE_FIELDS: [&str; 2] = ["uid", "isActive"];

enum DataPatch {
    Text(String),
    Expand(bool),
    Edit(bool),
    Size(Option<Size>),
    Style(String, Option<Value>),
}

fn parse_patch(key: &str, value: &Value) -> Result<DataPatch, CommandError> {
    if ENGINE_FIELDS.contains(&key) {
        return Err(CommandError::ReservedField(key.to_string()));
    }
    let patch = match key {
        "text" => DataPatch::Text(
            value
                .as_str()
                .ok_or_else(|| CommandError::invalid(key, "expected a string"))?
                .to_string(),
        ),
        "isExpand" => DataPatch::Expand(
            value
                .as_bool()
                .ok_or_else(|| CommandError::invalid(key, "expected a boolean"))?,
        ),
        "isEdit" => DataPatch::Edit(
            value
                .as_bool()
                .ok_or_else(|| CommandError::invalid(key, "expected a boolean"))?,
        ),
        "size" if value.is_null() => DataPatch::Size(None),
        "size" => DataPatch::Size(Some(
            serde_json::from_value(value.clone())
                .map_err(|err| CommandError::invalid(key, err.to_string()))?,
        )),
        _ if value.is_null() => DataPatch::Style(key.to_string(), None),
        _ => DataPatch::Style(key.to_string(), Some(value.clone())),
    };
    Ok(patch)
}

fn set_data(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::SetData { node, data } = command else {
        return Ok(());
    };
    ctx.ensure_known(CommandName::SetData, node)?;

    let patches = data
        .iter()
        .map(|(key, value)| parse_patch(key, value))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(target) = ctx.tree.find_mut(node) {
        let data = &mut target.data;
        for patch in patches {
            match patch {
                DataPatch::Text(text) => data.text = text,
                DataPatch::Expand(expand) => data.is_expand = expand,
                DataPatch::Edit(edit) => data.is_edit = edit,
                DataPatch::Size(size) => data.size = size,
                DataPatch::Style(key, Some(value)) => {
                    data.style.set(key, value);
                }
                DataPatch::Style(key, None) => {
                    data.style.remove(&key);
                }
            }
        }
    }
    ctx.effects.manipulated = vec![node.clone()];
    ctx.effects.invalidated.push(node.clone());
    Ok(())
}

/// Keys with a dedicated field in the node data.
const DATA_FIELDS: [&str; 6] = ["uid", "text", "isExpand", "isActive", "isEdit", "size"];

fn set_style(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::SetStyle { nodes, key, value } = command else {
        return Ok(());
    };
    ctx.ensure_all_known(CommandName::SetStyle, nodes)?;
    if DATA_FIELDS.contains(&key.as_str()) {
        return Err(CommandError::ReservedField(key.clone()));
    }

    for uid in nodes {
        if let Some(node) = ctx.tree.find_mut(uid) {
            match value {
                Some(value) => {
                    node.data.style.set(key.clone(), value.clone());
                }
                None => {
                    node.data.style.remove(key);
                }
            }
        }
    }
    ctx.effects.manipulated = nodes.clone();
    ctx.effects.invalidated.extend(nodes.iter().cloned());
    Ok(())
}

fn resize(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    let Command::Resize {
        node,
        width,
        height,
        phase,
    } = command
    else {
        return Ok(());
    };
    ctx.ensure_known(CommandName::Resize, node)?;
    for (key, value) in [("width", *width), ("height", *height)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(CommandError::invalid(key, format!("{value} is not a positive size")));
        }
    }

    let before = ctx.current_size(node);
    let after = Size::new(*width, *height);
    if let Some(target) = ctx.tree.find_mut(node) {
        target.data.size = Some(after);
    }
    ctx.effects.invalidated.push(node.clone());

    match phase {
        GesturePhase::Begin => {
            if let Some(before) = before {
                ctx.gestures.begin_resize(node.clone(), before);
            }
            ctx.effects.skip_history = true;
            ctx.effects.defer_layout = true;
        }
        GesturePhase::Update => {
            ctx.effects.skip_history = true;
            ctx.effects.defer_layout = true;
        }
        GesturePhase::End => {
            let before = ctx.gestures.take_resize(node).or(before).unwrap_or(after);
            ctx.effects.gesture = Some(GestureSizes {
                uid: node.clone(),
                before,
                after,
            });
            ctx.effects.manipulated = vec![node.clone()];
        }
    }
    Ok(())
}

fn restore(ctx: &mut CommandContext<'_>, jump: crate::history::HistoryJump) {
    *ctx.tree = jump.snapshot;
    *ctx.selection = SelectionManager::new();
    ctx.selection.reselect(ctx.tree, &jump.reselect);
    ctx.gestures.clear();

    ctx.effects.tree_replaced = true;
    ctx.effects.restored = Some(jump.index);
    ctx.effects.manipulated = jump.reselect;
    if let Some(record) = jump.resize_record {
        ctx.effects.invalidated.push(record.uid);
    }
}

fn undo(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    if matches!(command, Command::Undo) {
        let jump = ctx.history.undo()?;
        restore(ctx, jump);
    }
    Ok(())
}

fn redo(ctx: &mut CommandContext<'_>, command: &Command) -> Result<(), CommandError> {
    if matches!(command, Command::Redo) {
        let jump = ctx.history.redo()?;
        restore(ctx, jump);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryConfig;

    struct Fixture {
        tree: DataSourceNode,
        selection: SelectionManager,
        history: HistoryManager,
        gestures: GestureTracker,
        nodes: NodeArena,
        theme: Theme,
    }

    impl Fixture {
        fn new() -> Self {
            let tree = DataSourceNode::with_uid("r", "Root").with_children(vec![
                DataSourceNode::with_uid("a", "A")
                    .with_children(vec![DataSourceNode::with_uid("a1", "A1")]),
                DataSourceNode::with_uid("b", "B"),
            ]);
            let history = HistoryManager::new(&tree, HistoryConfig::default());
            Self {
                tree,
                selection: SelectionManager::new(),
                history,
                gestures: GestureTracker::default(),
                nodes: NodeArena::new(),
                theme: Theme::default(),
            }
        }

        fn run(&mut self, command: Command) -> Result<CommandEffects, CommandError> {
            let mut registry = CommandRegistry::with_builtin_handlers();
            let mut ctx = CommandContext {
                tree: &mut self.tree,
                selection: &mut self.selection,
                history: &mut self.history,
                gestures: &mut self.gestures,
                nodes: &self.nodes,
                theme: &self.theme,
                effects: CommandEffects::default(),
            };
            registry.execute(&mut ctx, &command)?;
            Ok(ctx.effects)
        }

        fn children(&self, uid: &str) -> Vec<String> {
            self.tree
                .find(&Uid::from(uid))
                .map(|n| n.children.iter().map(|c| c.data.text.clone()).collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_command_names_round_trip() {
        for name in CommandName::ALL {
            assert_eq!(name.as_str().parse::<CommandName>(), Ok(name));
        }
        assert_eq!(
            "explode".parse::<CommandName>(),
            Err(CommandError::UnknownCommand("explode".to_string()))
        );
    }

    #[test]
    fn test_insert_child_selects_new_node() {
        let mut fx = Fixture::new();
        fx.tree.find_mut(&Uid::from("b")).unwrap().data.is_expand = false;
        let effects = fx.run(Command::insert_child("b")).unwrap();

        let new_uid = effects.created[0].clone();
        let b = fx.tree.find(&Uid::from("b")).unwrap();
        assert!(b.data.is_expand);
        assert_eq!(b.children[0].data.text, DEFAULT_NODE_TEXT);
        assert!(b.children[0].data.is_edit);
        assert_eq!(fx.selection.active(), &[new_uid]);
        assert_eq!(effects.manipulated, vec![Uid::from("b")]);
    }

    #[test]
    fn test_insert_rejects_multiple_targets_without_mutation() {
        let mut fx = Fixture::new();
        let before = fx.tree.clone();
        let err = fx
            .run(Command::InsertChild {
                nodes: vec![Uid::from("a"), Uid::from("b")],
                text: None,
            })
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::Structural {
                command: CommandName::InsertChild,
                violation: StructuralViolation::SingleTargetRequired(2),
            }
        );
        assert_eq!(fx.tree, before);
    }

    #[test]
    fn test_insert_sibling_on_root_is_rejected() {
        let mut fx = Fixture::new();
        let err = fx.run(Command::insert_sibling("r")).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Structural {
                violation: StructuralViolation::RootSibling,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let mut fx = Fixture::new();
        let err = fx.run(Command::delete("ghost")).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_delete_root_removes_children_only() {
        let mut fx = Fixture::new();
        let effects = fx.run(Command::delete("r")).unwrap();
        assert!(fx.tree.children.is_empty());
        assert_eq!(effects.manipulated, vec![Uid::from("a"), Uid::from("b")]);
        assert_eq!(effects.removed.len(), 3);
        assert_eq!(fx.selection.active(), &[Uid::from("r")]);
    }

    #[test]
    fn test_promote_children_keeps_position() {
        let mut fx = Fixture::new();
        fx.run(Command::DeleteSinglePromoteChildren {
            nodes: vec![Uid::from("a")],
        })
        .unwrap();
        assert_eq!(fx.children("r"), vec!["A1", "B"]);
        assert_eq!(fx.selection.active(), &[Uid::from("a1")]);

        let err = fx
            .run(Command::DeleteSinglePromoteChildren {
                nodes: vec![Uid::from("r")],
            })
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Structural {
                violation: StructuralViolation::RootRemoval,
                ..
            }
        ));
    }

    #[test]
    fn test_multi_collapse_with_root_acts_on_root_children() {
        let mut fx = Fixture::new();
        fx.selection.add_active(&mut fx.tree, &Uid::from("r"));
        fx.selection.add_active(&mut fx.tree, &Uid::from("a1"));
        let effects = fx
            .run(Command::SetExpand {
                nodes: vec![Uid::from("r"), Uid::from("a1")],
                expand: false,
            })
            .unwrap();

        assert_eq!(effects.manipulated, vec![Uid::from("a"), Uid::from("b")]);
        assert!(fx.tree.data.is_expand);
        assert!(!fx.tree.find(&Uid::from("a")).unwrap().data.is_expand);
        assert_eq!(fx.selection.active(), &[Uid::from("a"), Uid::from("b")]);
        assert!(fx.selection.is_consistent_with(&fx.tree));
    }

    #[test]
    fn test_set_data_rejects_engine_fields() {
        let mut fx = Fixture::new();
        let mut data = Map::new();
        data.insert("text".to_string(), Value::from("renamed"));
        data.insert("uid".to_string(), Value::from("hijack"));
        let err = fx
            .run(Command::SetData {
                node: Uid::from("b"),
                data,
            })
            .unwrap_err();
        assert_eq!(err, CommandError::ReservedField("uid".to_string()));
        assert_eq!(fx.tree.find(&Uid::from("b")).unwrap().data.text, "B");
    }

    #[test]
    fn test_set_data_patches_fields_and_overrides() {
        let mut fx = Fixture::new();
        let mut data = Map::new();
        data.insert("text".to_string(), Value::from("renamed"));
        data.insert("fontSize".to_string(), Value::from(22));
        fx.run(Command::SetData {
            node: Uid::from("b"),
            data,
        })
        .unwrap();
        let b = &fx.tree.find(&Uid::from("b")).unwrap().data;
        assert_eq!(b.text, "renamed");
        assert_eq!(b.style.get("fontSize"), Some(&Value::from(22)));
    }

    #[test]
    fn test_resize_phases() {
        let mut fx = Fixture::new();
        let begin = fx
            .run(Command::Resize {
                node: Uid::from("b"),
                width: 50.0,
                height: 30.0,
                phase: GesturePhase::Begin,
            })
            .unwrap();
        assert!(begin.skip_history && begin.defer_layout);

        let end = fx
            .run(Command::Resize {
                node: Uid::from("b"),
                width: 90.0,
                height: 40.0,
                phase: GesturePhase::End,
            })
            .unwrap();
        assert!(!end.skip_history);
        let gesture = end.gesture.unwrap();
        assert_eq!(gesture.after, Size::new(90.0, 40.0));
        assert_ne!(gesture.before, gesture.after);

        let err = fx
            .run(Command::Resize {
                node: Uid::from("b"),
                width: -1.0,
                height: 40.0,
                phase: GesturePhase::Update,
            })
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidValue { .. }));
    }

    #[test]
    fn test_undo_at_baseline_reports_boundary() {
        let mut fx = Fixture::new();
        assert_eq!(
            fx.run(Command::Undo).unwrap_err(),
            CommandError::HistoryBoundary(HistoryBoundary::NothingToUndo)
        );
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let mut fx = Fixture::new();
        let mut registry = CommandRegistry::new();
        registry.register(CommandName::SetText, set_text);
        registry.register(CommandName::SetText, |ctx, _| {
            if let Some(node) = ctx.tree.find_mut(&Uid::from("b")) {
                node.data.text.push('!');
            }
            Ok(())
        });
        assert_eq!(registry.handler_count(CommandName::SetText), 2);

        let mut ctx = CommandContext {
            tree: &mut fx.tree,
            selection: &mut fx.selection,
            history: &mut fx.history,
            gestures: &mut fx.gestures,
            nodes: &fx.nodes,
            theme: &fx.theme,
            effects: CommandEffects::default(),
        };
        let command = Command::SetText {
            node: Uid::from("b"),
            text: "Hi".to_string(),
        };
        assert_eq!(registry.execute(&mut ctx, &command), Ok(true));
        assert_eq!(registry.execute(&mut ctx, &Command::Undo), Ok(false));
        assert_eq!(fx.tree.find(&Uid::from("b")).unwrap().data.text, "Hi!");
    }
}
