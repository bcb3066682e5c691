#![warn(missing_docs)]
//! Mindmap Core - Headless Mind-Map Engine
//!
//! # Overview
//!
//! `mindmap-core` is the headless kernel of a mind-map editor. It owns the document tree, computes
//! node geometry for a left-to-right logical layout, tracks the selection and records snapshot
//! undo/redo history. It does not draw anything; the upper layer renders the positioned
//! [`NodeInstance`]s however it likes.
//!
//! # Core Features
//!
//! - **DataSource Tree**: serde-backed document model, JSON in and out
//! - **Three-Pass Layout**: sizes, vertical stacking, then sibling overlap correction
//! - **Instance Cache**: LRU cache of node instances so collapsed/re-expanded nodes keep their
//!   measured size
//! - **Commands**: named command registry with multi-handler dispatch
//! - **Snapshot History**: bounded undo/redo with resize and edit gesture merging
//! - **Shortcuts**: key chords mapped to commands
//! - **State Tracking**: version number mechanism and change notifications
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Session (commands, shortcuts, state)       │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  History (snapshots, gestures)              │  ← Undo / Redo
//! ├─────────────────────────────────────────────┤
//! │  Layout Engine (three passes)               │  ← Geometry
//! ├─────────────────────────────────────────────┤
//! │  Node Instances + LRU Cache                 │  ← Measured nodes
//! ├─────────────────────────────────────────────┤
//! │  DataSource Tree + Theme                    │  ← Document
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use mindmap_core::{Command, CommandResult, DataSourceNode, MindMapSession, Uid};
//!
//! let root = DataSourceNode::with_uid("root", "Central topic");
//! let mut session = MindMapSession::new(root);
//!
//! let result = session.exec_command(Command::insert_child("root")).unwrap();
//! let CommandResult::Inserted { uid } = result else { panic!("expected an insert") };
//!
//! // The new node is selected and laid out to the right of the root
//! assert_eq!(session.selection().active(), &[uid.clone()]);
//! let root = session.node(&Uid::from("root")).unwrap();
//! let child = session.node(&uid).unwrap();
//! assert!(child.left > root.right());
//!
//! session.exec_command(Command::Undo).unwrap();
//! assert!(session.tree().children.is_empty());
//! ```
//!
//! # Module Description
//!
//! - [`data_source`] - Document tree model
//! - [`style`] - Themes and per-node style overrides
//! - [`measure`] - Text measurement
//! - [`cache`] - LRU cache
//! - [`node`] - Node instances and the instance arena
//! - [`layout`] - Three-pass logical layout
//! - [`selection`] - Active node list
//! - [`history`] - Snapshot undo/redo
//! - [`commands`] - Command registry and built-in commands
//! - [`keymap`] - Key chords and shortcut bindings
//! - [`config`] - JSON session configuration
//! - [`session`] - Session state management
//!
//! # Unicode Support
//!
//! - Text width is measured per grapheme cluster
//! - CJK double-width characters count as two cells

pub mod cache;
pub mod commands;
pub mod config;
pub mod data_source;
pub mod history;
pub mod keymap;
pub mod layout;
pub mod measure;
pub mod node;
pub mod selection;
pub mod session;
pub mod style;

pub use cache::LruCache;
pub use commands::{
    Command, CommandContext, CommandEffects, CommandError, CommandName, CommandRegistry,
    CommandResult, DEFAULT_NODE_TEXT, GesturePhase, StructuralViolation,
};
pub use config::{ConfigError, SessionConfig, ThemeSpec};
pub use data_source::{DataSourceNode, DocumentError, NodeData, Size, Uid};
pub use history::{HistoryBoundary, HistoryConfig, HistoryItem, HistoryManager, ResizeRecord};
pub use keymap::{
    KeyChord, KeyChordError, Modifier, ShortcutContext, ShortcutId, ShortcutRegistry,
};
pub use layout::{Bounds, LayoutConfig, LayoutEngine, LayoutFrame, layout_tree};
pub use node::{NodeArena, NodeInstance, ResolveStats};
pub use selection::{SelectionManager, topmost_ancestors_only};
pub use session::{
    MindMapSession, SessionState, StateChange, StateChangeCallback, StateChangeType,
    UndoRedoState,
};
pub use style::{NodeShape, NodeStyle, StyleOverrides, Theme};
