//! Mind-Map Session
//!
//! [`MindMapSession`] owns everything one open mind map needs: the DataSource tree, the
//! selection, the history, the command and shortcut registries, the node-instance cache and the
//! current layout frame.
//!
//! # Overview
//!
//! The session follows a unidirectional data flow:
//!
//! 1. The frontend executes commands via [`exec_command()`](MindMapSession::exec_command), or
//!    feeds key chords via [`handle_key()`](MindMapSession::handle_key)
//! 2. Handlers mutate the DataSource tree
//! 3. The history manager records a snapshot
//! 4. The layout engine recomputes geometry, reusing cached node instances
//! 5. The version number increments and subscribers are notified
//! 6. The renderer reads [`nodes()`](MindMapSession::nodes) and [`state()`](MindMapSession::state)
//!
//! # Example
//!
//! ```rust
//! use mindmap_core::{Command, DataSourceNode, MindMapSession, StateChangeType, Uid};
//!
//! let root = DataSourceNode::with_uid("root", "Root")
//!     .with_children(vec![DataSourceNode::with_uid("a", "A")]);
//! let mut session = MindMapSession::new(root);
//!
//! session.subscribe(|change| {
//!     println!("Version {} -> {}: {:?}", change.old_version, change.new_version, change.change_type);
//! });
//!
//! session.exec_command(Command::insert_sibling("a")).unwrap();
//!
//! let state = session.state();
//! assert_eq!(state.node_count, 3);
//! assert!(state.undo_redo.can_undo);
//! assert!(session.node(&Uid::from("a")).is_some());
//! ```

use crate::cache::LruCache;
use crate::commands::{
    Command, CommandContext, CommandError, CommandName, CommandRegistry, CommandResult,
};
use crate::config::{ConfigError, SessionConfig};
use crate::data_source::{DataSourceNode, DocumentError, Uid};
use crate::history::{GestureTracker, HistoryManager, RecordRequest};
use crate::keymap::{KeyChord, KeyChordError, ShortcutContext, ShortcutId, ShortcutRegistry};
use crate::layout::{LayoutConfig, LayoutEngine, LayoutFrame};
use crate::node::{InstanceResolver, NodeArena, NodeInstance};
use crate::selection::SelectionManager;
use crate::style::Theme;
use std::collections::HashSet;

/// State change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeType {
    /// Tree content or structure modified
    DocumentModified,
    /// Selection changed
    SelectionChanged,
    /// Geometry changed without a document change (theme, margins, deferred layout)
    LayoutChanged,
    /// An undo/redo restored a history entry
    HistoryRestored,
}

/// State change record
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Change type
    pub change_type: StateChangeType,
    /// Old version number
    pub old_version: u64,
    /// New version number
    pub new_version: u64,
    /// Command that caused the change, if any
    pub command: Option<CommandName>,
}

impl StateChange {
    /// Create a new state change record.
    pub fn new(change_type: StateChangeType, old_version: u64, new_version: u64) -> Self {
        Self {
            change_type,
            old_version,
            new_version,
            command: None,
        }
    }

    /// Attach the command that caused this change.
    pub fn with_command(mut self, command: CommandName) -> Self {
        self.command = Some(command);
        self
    }
}

/// Undo/redo stack state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRedoState {
    /// Can undo
    pub can_undo: bool,
    /// Can redo
    pub can_redo: bool,
    /// Undo stack depth
    pub undo_depth: usize,
    /// Redo stack depth
    pub redo_depth: usize,
    /// Index of the current history entry
    pub active_index: usize,
}

/// Session state summary
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// State version number
    pub version: u64,
    /// Number of nodes in the tree
    pub node_count: usize,
    /// Number of visible (laid out) nodes
    pub visible_count: usize,
    /// Active uids in selection order
    pub active: Vec<Uid>,
    /// Undo/redo state
    pub undo_redo: UndoRedoState,
    /// Whether a deferred layout is pending
    pub layout_pending: bool,
    /// Summary of the last layout pass
    pub last_frame: LayoutFrame,
}

/// State change callback function type
pub type StateChangeCallback = Box<dyn FnMut(&StateChange) + Send>;

/// One open mind map.
pub struct MindMapSession {
    tree: DataSourceNode,
    selection: SelectionManager,
    history: HistoryManager,
    registry: CommandRegistry,
    shortcuts: ShortcutRegistry,
    cache: LruCache<Uid, NodeInstance>,
    nodes: NodeArena,
    /// Uids whose content size must be recomputed on the next pass.
    pending_resize: HashSet<Uid>,
    gestures: GestureTracker,
    layout: LayoutEngine,
    theme: Theme,
    layout_dirty: bool,
    last_frame: LayoutFrame,
    state_version: u64,
    callbacks: Vec<StateChangeCallback>,
}

impl std::fmt::Debug for MindMapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindMapSession")
            .field("nodes", &self.tree.count())
            .field("visible", &self.nodes.len())
            .field("selection", &self.selection)
            .field("history_index", &self.history.active_index())
            .field("version", &self.state_version)
            .finish_non_exhaustive()
    }
}

impl MindMapSession {
    /// Open `tree` with the default configuration.
    pub fn new(tree: DataSourceNode) -> Self {
        Self::build(tree, SessionConfig::default(), Theme::default())
    }

    /// Open `tree` with `config`.
    pub fn with_config(tree: DataSourceNode, config: SessionConfig) -> Result<Self, ConfigError> {
        let theme = config.theme.resolve()?;
        Ok(Self::build(tree, config, theme))
    }

    /// Parse a JSON document and open it with the default configuration.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(Self::new(DataSourceNode::from_json(json)?))
    }

    fn build(tree: DataSourceNode, config: SessionConfig, theme: Theme) -> Self {
        let mut selection = SelectionManager::new();
        selection.rebuild_from_tree(&tree);
        let history = HistoryManager::new(&tree, config.history);
        let shortcuts = if config.default_shortcuts {
            ShortcutRegistry::with_default_bindings()
        } else {
            ShortcutRegistry::new()
        };

        let mut session = Self {
            tree,
            selection,
            history,
            registry: CommandRegistry::with_builtin_handlers(),
            shortcuts,
            cache: LruCache::new(config.cache_capacity),
            nodes: NodeArena::new(),
            pending_resize: HashSet::new(),
            gestures: GestureTracker::default(),
            layout: LayoutEngine::new(config.layout),
            theme,
            layout_dirty: false,
            last_frame: LayoutFrame::default(),
            state_version: 0,
            callbacks: Vec::new(),
        };
        session.relayout();
        session
    }

    /// Live DataSource tree.
    pub fn tree(&self) -> &DataSourceNode {
        &self.tree
    }

    /// Selection.
    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    /// History.
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Instances of the current layout frame.
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Instance of a visible node.
    pub fn node(&self, uid: &Uid) -> Option<&NodeInstance> {
        self.nodes.get(uid)
    }

    /// Node-instance cache.
    pub fn cache(&self) -> &LruCache<Uid, NodeInstance> {
        &self.cache
    }

    /// Active theme.
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Layout configuration.
    pub fn layout_config(&self) -> &LayoutConfig {
        self.layout.config()
    }

    /// Summary of the last layout pass.
    pub fn last_frame(&self) -> &LayoutFrame {
        &self.last_frame
    }

    /// Get current version number
    pub fn version(&self) -> u64 {
        self.state_version
    }

    /// Whether `undo` would succeed.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether `redo` would succeed.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Execute a command.
    ///
    /// Runs every registered handler, records history, lays the tree out (unless a resize drag
    /// is in progress) and notifies subscribers. A command without handlers is ignored. On error
    /// nothing is recorded and no notification is sent.
    pub fn exec_command(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        let name = command.name();
        let _span = tracing::debug_span!("exec_command", command = %name).entered();

        let mut ctx = CommandContext {
            tree: &mut self.tree,
            selection: &mut self.selection,
            history: &mut self.history,
            gestures: &mut self.gestures,
            nodes: &self.nodes,
            theme: &self.theme,
            effects: Default::default(),
        };
        if !self.registry.execute(&mut ctx, &command)? {
            tracing::debug!("no handler registered");
            return Ok(CommandResult::Ignored);
        }
        let effects = ctx.effects;

        if !effects.skip_history {
            let mut request = RecordRequest::new(name, effects.manipulated.clone());
            request.insert_sibling_index = effects.insert_sibling_index;
            request.gesture = effects.gesture.clone();
            self.history.record(&self.tree, request);
        }

        self.pending_resize.extend(effects.invalidated.iter().cloned());
        if effects.tree_replaced {
            self.nodes.clear();
        }
        if effects.defer_layout {
            self.layout_dirty = true;
        } else {
            self.relayout();
        }

        let change_type = match name {
            _ if effects.restored.is_some() => StateChangeType::HistoryRestored,
            CommandName::SetActive | CommandName::ClearActive => StateChangeType::SelectionChanged,
            _ => StateChangeType::DocumentModified,
        };
        self.mark_modified(change_type, Some(name));

        let result = if let Some(uid) = effects.created.first() {
            CommandResult::Inserted { uid: uid.clone() }
        } else if !effects.removed.is_empty() {
            CommandResult::Deleted {
                removed: effects.removed,
            }
        } else if let Some(index) = effects.restored {
            CommandResult::HistoryRestored { index }
        } else {
            CommandResult::Success
        };
        Ok(result)
    }

    /// Append a handler for a command.
    pub fn register_command<F>(&mut self, name: CommandName, handler: F)
    where
        F: FnMut(&mut CommandContext<'_>, &Command) -> Result<(), CommandError> + Send + 'static,
    {
        self.registry.register(name, handler);
    }

    /// Append a handler for a key chord such as `"Control|z"`.
    pub fn register_shortcut<F>(
        &mut self,
        chord: &str,
        handler: F,
    ) -> Result<ShortcutId, KeyChordError>
    where
        F: Fn(&ShortcutContext<'_>) -> Option<Command> + Send + 'static,
    {
        self.shortcuts.register(chord, handler)
    }

    /// Remove every handler of a key chord.
    pub fn remove_shortcut(&mut self, chord: &KeyChord) -> bool {
        self.shortcuts.remove(chord)
    }

    /// Remove one handler returned by [`MindMapSession::register_shortcut`].
    pub fn remove_shortcut_handler(&mut self, chord: &KeyChord, id: ShortcutId) -> bool {
        self.shortcuts.remove_handler(chord, id)
    }

    /// Execute the commands bound to `chord`, in order, stopping at the first error.
    pub fn handle_key(&mut self, chord: &KeyChord) -> Result<Vec<CommandResult>, CommandError> {
        let commands = {
            let ctx = ShortcutContext {
                active: self.selection.active(),
                tree: &self.tree,
            };
            self.shortcuts.commands_for(chord, &ctx)
        };
        tracing::trace!(%chord, commands = commands.len(), "key chord");

        commands
            .into_iter()
            .map(|command| self.exec_command(command))
            .collect()
    }

    /// Replace the document. History restarts from the new tree.
    pub fn load(&mut self, tree: DataSourceNode) -> Result<(), DocumentError> {
        tree.check_unique_uids()?;
        self.tree = tree;
        self.selection.rebuild_from_tree(&self.tree);
        self.history.reset(&self.tree);
        self.gestures.clear();
        self.pending_resize.clear();
        self.nodes.clear();
        self.relayout();
        self.mark_modified(StateChangeType::DocumentModified, None);
        Ok(())
    }

    /// Parse and load a JSON document.
    pub fn load_json(&mut self, json: &str) -> Result<(), DocumentError> {
        self.load(DataSourceNode::from_json(json)?)
    }

    /// Serialize the live tree.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        self.tree.to_json()
    }

    /// Switch theme. Every cached size is dropped.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.cache.clear();
        self.nodes.clear();
        self.relayout();
        self.mark_modified(StateChangeType::LayoutChanged, None);
    }

    /// Change the layout margins.
    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        self.layout.set_config(config);
        self.relayout();
        self.mark_modified(StateChangeType::LayoutChanged, None);
    }

    /// Run a deferred layout pass, if any. Returns whether a pass ran.
    pub fn flush_layout(&mut self) -> bool {
        if !self.layout_dirty {
            return false;
        }
        self.relayout();
        self.mark_modified(StateChangeType::LayoutChanged, None);
        true
    }

    fn relayout(&mut self) {
        debug_assert!(
            self.selection.is_consistent_with(&self.tree),
            "selection list and isActive flags diverged"
        );

        let previous = std::mem::take(&mut self.nodes);
        let (arena, frame) = {
            let mut resolver =
                InstanceResolver::new(&mut self.cache, previous, &self.pending_resize, &self.theme);
            self.layout.run(&self.tree, &mut resolver)
        };

        // Sizes of hidden nodes stay pending until they are laid out again.
        let tree = &self.tree;
        self.pending_resize
            .retain(|uid| !arena.contains(uid) && tree.contains(uid));
        self.nodes = arena;
        self.last_frame = frame;
        self.layout_dirty = false;
    }

    /// Get the session state summary
    pub fn state(&self) -> SessionState {
        SessionState {
            version: self.state_version,
            node_count: self.tree.count(),
            visible_count: self.nodes.len(),
            active: self.selection.active().to_vec(),
            undo_redo: UndoRedoState {
                can_undo: self.history.can_undo(),
                can_redo: self.history.can_redo(),
                undo_depth: self.history.undo_depth(),
                redo_depth: self.history.redo_depth(),
                active_index: self.history.active_index(),
            },
            layout_pending: self.layout_dirty,
            last_frame: self.last_frame,
        }
    }

    /// Subscribe to state change notifications
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Check if state has changed since a version
    pub fn has_changed_since(&self, version: u64) -> bool {
        self.state_version > version
    }

    fn mark_modified(&mut self, change_type: StateChangeType, command: Option<CommandName>) {
        let old_version = self.state_version;
        self.state_version += 1;

        let mut change = StateChange::new(change_type, old_version, self.state_version);
        if let Some(command) = command {
            change = change.with_command(command);
        }
        for callback in &mut self.callbacks {
            callback(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn session() -> MindMapSession {
        MindMapSession::new(DataSourceNode::with_uid("r", "Root").with_children(vec![
            DataSourceNode::with_uid("a", "A"),
            DataSourceNode::with_uid("b", "B"),
        ]))
    }

    #[test]
    fn test_new_session_lays_out_every_node() {
        let session = session();
        assert_eq!(session.nodes().len(), 3);
        assert_eq!(session.version(), 0);
        assert!(!session.can_undo());
        assert_eq!(session.last_frame().stats.created, 3);
    }

    #[test]
    fn test_subscribers_see_each_change() {
        let mut session = session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.subscribe(move |change| {
            sink.lock().unwrap().push((change.change_type, change.new_version));
        });

        session.exec_command(Command::select("a")).unwrap();
        session.exec_command(Command::insert_child("a")).unwrap();
        session.exec_command(Command::Undo).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (StateChangeType::SelectionChanged, 1),
                (StateChangeType::DocumentModified, 2),
                (StateChangeType::HistoryRestored, 3),
            ]
        );
    }

    #[test]
    fn test_failed_command_changes_nothing() {
        let mut session = session();
        let before = session.tree().clone();
        assert!(session.exec_command(Command::insert_sibling("r")).is_err());
        assert_eq!(session.tree(), &before);
        assert_eq!(session.version(), 0);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_unregistered_command_is_ignored() {
        let mut session = MindMapSession::new(DataSourceNode::with_uid("r", "Root"));
        session.registry = CommandRegistry::new();
        assert_eq!(session.exec_command(Command::Undo), Ok(CommandResult::Ignored));
        assert_eq!(session.version(), 0);
    }

    #[test]
    fn test_second_pass_binds_instances() {
        let mut session = session();
        session.exec_command(Command::select("a")).unwrap();
        let stats = session.last_frame().stats;
        assert_eq!(stats.bound, 3);
        assert_eq!(stats.remeasured, 0);
    }

    #[test]
    fn test_set_theme_remeasures() {
        let mut session = session();
        let before = session.node(&Uid::from("a")).unwrap().height;
        session.set_theme(Theme::classic());
        assert_eq!(session.last_frame().stats.created, 3);
        assert!(session.node(&Uid::from("a")).unwrap().height < before);
    }
}
