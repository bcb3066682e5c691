//! Shortcut Registry
//!
//! Maps key chords to command factories. The input layer turns a key event into a
//! [`KeyChord`] (`"Tab"`, `"Control|z"`, `"Shift|Delete"`); the session asks the registry which
//! commands the chord produces for the current selection and executes them.

use crate::commands::Command;
use crate::data_source::{DataSourceNode, Uid};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chord modifier. At most one is recorded per chord; `Control` wins over `Shift`, which wins
/// over `Alt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Control key.
    Control,
    /// Shift key.
    Shift,
    /// Alt key.
    Alt,
}

impl Modifier {
    fn as_str(self) -> &'static str {
        match self {
            Modifier::Control => "Control",
            Modifier::Shift => "Shift",
            Modifier::Alt => "Alt",
        }
    }
}

/// Key chord parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyChordError {
    /// Empty chord or empty key.
    #[error("empty key chord")]
    Empty,
    /// Unknown modifier name.
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
}

/// A key with an optional modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    modifier: Option<Modifier>,
    key: String,
}

impl KeyChord {
    /// Chord without modifier.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            modifier: None,
            key: key.into(),
        }
    }

    /// Chord with a modifier.
    pub fn with_modifier(modifier: Modifier, key: impl Into<String>) -> Self {
        Self {
            modifier: Some(modifier),
            key: key.into(),
        }
    }

    /// Chord of a key event. The space bar is named `Space`.
    pub fn from_event(key: &str, ctrl: bool, shift: bool, alt: bool) -> Self {
        let key = if key == " " { "Space" } else { key };
        let modifier = if ctrl {
            Some(Modifier::Control)
        } else if shift {
            Some(Modifier::Shift)
        } else if alt {
            Some(Modifier::Alt)
        } else {
            None
        };
        Self {
            modifier,
            key: key.to_string(),
        }
    }

    /// Modifier, if any.
    pub fn modifier(&self) -> Option<Modifier> {
        self.modifier
    }

    /// Key name.
    pub fn key_name(&self) -> &str {
        &self.key
    }
}

impl FromStr for KeyChord {
    type Err = KeyChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (modifier, key) = match s.split_once('|') {
            Some((modifier, key)) => {
                let modifier = match modifier {
                    "Control" | "Ctrl" => Modifier::Control,
                    "Shift" => Modifier::Shift,
                    "Alt" => Modifier::Alt,
                    other => return Err(KeyChordError::UnknownModifier(other.to_string())),
                };
                (Some(modifier), key)
            }
            None => (None, s),
        };
        if key.is_empty() {
            return Err(KeyChordError::Empty);
        }
        Ok(Self {
            modifier,
            key: key.to_string(),
        })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            Some(modifier) => write!(f, "{}|{}", modifier.as_str(), self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// What a shortcut handler can see.
#[derive(Debug, Clone, Copy)]
pub struct ShortcutContext<'a> {
    /// Active uids in selection order.
    pub active: &'a [Uid],
    /// Live tree.
    pub tree: &'a DataSourceNode,
}

impl ShortcutContext<'_> {
    /// Uid of the root node.
    pub fn root(&self) -> &Uid {
        self.tree.uid()
    }
}

/// A shortcut handler: produces the command to run, if any.
pub type ShortcutHandler = Box<dyn Fn(&ShortcutContext<'_>) -> Option<Command> + Send>;

/// Handle of one bound handler, for [`ShortcutRegistry::remove_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortcutId(u64);

/// Chord -> handlers table.
#[derive(Default)]
pub struct ShortcutRegistry {
    bindings: HashMap<KeyChord, Vec<(ShortcutId, ShortcutHandler)>>,
    next_id: u64,
}

impl fmt::Debug for ShortcutRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chords: Vec<String> = self.bindings.keys().map(ToString::to_string).collect();
        chords.sort();
        f.debug_struct("ShortcutRegistry")
            .field("chords", &chords)
            .finish()
    }
}

impl ShortcutRegistry {
    /// Registry without bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the default bindings.
    pub fn with_default_bindings() -> Self {
        let mut registry = Self::new();
        registry.bind(KeyChord::key("Tab"), |ctx| {
            Some(Command::InsertChild {
                nodes: non_empty(ctx.active)?,
                text: None,
            })
        });
        registry.bind(KeyChord::key("Enter"), |ctx| {
            Some(Command::InsertSibling {
                nodes: non_empty(ctx.active)?,
                text: None,
            })
        });
        registry.bind(KeyChord::key("Delete"), |ctx| {
            Some(Command::DeleteSubtree {
                nodes: non_empty(ctx.active)?,
            })
        });
        registry.bind(KeyChord::with_modifier(Modifier::Shift, "Delete"), |ctx| {
            Some(Command::DeleteSinglePromoteChildren {
                nodes: non_empty(ctx.active)?,
            })
        });
        registry.bind(KeyChord::with_modifier(Modifier::Control, "z"), |_| Some(Command::Undo));
        registry.bind(KeyChord::with_modifier(Modifier::Control, "y"), |_| Some(Command::Redo));
        registry.bind(KeyChord::key("Escape"), |ctx| {
            (!ctx.active.is_empty()).then_some(Command::ClearActive)
        });
        registry.bind(KeyChord::key("Space"), toggle_expand);
        registry
    }

    /// Append a handler for `chord`.
    pub fn bind<F>(&mut self, chord: KeyChord, handler: F) -> ShortcutId
    where
        F: Fn(&ShortcutContext<'_>) -> Option<Command> + Send + 'static,
    {
        let id = ShortcutId(self.next_id);
        self.next_id += 1;
        self.bindings
            .entry(chord)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Parse `chord` and append a handler for it.
    pub fn register<F>(&mut self, chord: &str, handler: F) -> Result<ShortcutId, KeyChordError>
    where
        F: Fn(&ShortcutContext<'_>) -> Option<Command> + Send + 'static,
    {
        Ok(self.bind(chord.parse()?, handler))
    }

    /// Remove every handler bound to `chord`.
    pub fn remove(&mut self, chord: &KeyChord) -> bool {
        self.bindings.remove(chord).is_some()
    }

    /// Remove one handler of `chord`, leaving the others bound.
    pub fn remove_handler(&mut self, chord: &KeyChord, id: ShortcutId) -> bool {
        let Some(handlers) = self.bindings.get_mut(chord) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(bound, _)| *bound != id);
        let removed = handlers.len() < before;
        if handlers.is_empty() {
            self.bindings.remove(chord);
        }
        removed
    }

    /// Whether `chord` has a binding.
    pub fn is_bound(&self, chord: &KeyChord) -> bool {
        self.bindings.contains_key(chord)
    }

    /// Commands produced by `chord`, in registration order.
    pub fn commands_for(&self, chord: &KeyChord, ctx: &ShortcutContext<'_>) -> Vec<Command> {
        self.bindings
            .get(chord)
            .into_iter()
            .flatten()
            .filter_map(|(_, handler)| handler(ctx))
            .collect()
    }
}

fn non_empty(active: &[Uid]) -> Option<Vec<Uid>> {
    (!active.is_empty()).then(|| active.to_vec())
}

/// Collapse the selection if its first node is expanded, else expand it.
fn toggle_expand(ctx: &ShortcutContext<'_>) -> Option<Command> {
    let first = ctx.active.first()?;
    let expanded = ctx.tree.find(first)?.data.is_expand;
    Some(Command::SetExpand {
        nodes: ctx.active.to_vec(),
        expand: !expanded,
    })
}
