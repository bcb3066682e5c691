//! Session configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "cacheCapacity": 500,
//!   "layout": { "marginX": 80, "marginY": 50 },
//!   "history": { "maxDepth": 50 },
//!   "theme": "classic"
//! }
//! ```
//!
//! Every field is optional. `theme` is either a built-in theme name or a full inline theme.

use crate::history::HistoryConfig;
use crate::layout::LayoutConfig;
use crate::style::Theme;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    /// The configuration is not valid JSON or has ill-typed fields.
    Json(#[from] serde_json::Error),

    #[error("unknown theme '{0}'")]
    /// `theme` names no built-in theme.
    UnknownTheme(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// Theme selection.
pub enum ThemeSpec {
    /// A built-in theme, by name.
    Named(String),
    /// A complete theme.
    Inline(Box<Theme>),
}

impl ThemeSpec {
    /// Resolve to a theme.
    pub fn resolve(&self) -> Result<Theme, ConfigError> {
        match self {
            ThemeSpec::Named(name) => {
                Theme::by_name(name).ok_or_else(|| ConfigError::UnknownTheme(name.clone()))
            }
            ThemeSpec::Inline(theme) => Ok(theme.as_ref().clone()),
        }
    }
}

impl Default for ThemeSpec {
    fn default() -> Self {
        ThemeSpec::Named("default".to_string())
    }
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Everything a session can be configured with.
pub struct SessionConfig {
    #[serde(default = "default_cache_capacity")]
    /// Capacity of the node-instance cache.
    pub cache_capacity: usize,

    #[serde(default)]
    /// Layout margins.
    pub layout: LayoutConfig,

    #[serde(default)]
    /// History limits.
    pub history: HistoryConfig,

    #[serde(default)]
    /// Theme.
    pub theme: ThemeSpec,

    #[serde(default = "default_true")]
    /// Install the default keyboard shortcuts.
    pub default_shortcuts: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            layout: LayoutConfig::default(),
            history: HistoryConfig::default(),
            theme: ThemeSpec::default(),
            default_shortcuts: true,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration, checking that the theme resolves.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.theme.resolve()?;
        Ok(config)
    }
}
