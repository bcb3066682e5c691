//! Style cascade
//!
//! Node styles are resolved through an explicit cascade instead of a prototype-style fallback:
//!
//! 1. the node's own [`StyleOverrides`] (keys such as `fontSize`, `paddingX`),
//! 2. the theme tier picked by depth ([`StyleTier`]: root, second level, deeper nodes),
//! 3. the theme-wide defaults (node padding).
//!
//! Only a handful of resolved values feed the layout engine (font size, line height, padding);
//! the rest are carried for the renderer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outline drawn around a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    /// Plain rectangle.
    #[default]
    Rectangle,
    /// Underline only.
    Line,
    /// Rounded capsule.
    Capsule,
}

/// Fully specified style of one theme tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    /// Outline shape.
    pub shape: NodeShape,
    /// Fill color (CSS color string).
    pub fill_color: String,
    /// Font family list.
    pub font_family: String,
    /// Text color.
    pub color: String,
    /// Font size in canvas units.
    pub font_size: f64,
    /// CSS font weight.
    pub font_weight: String,
    /// CSS font style.
    pub font_style: String,
    /// Line height as a multiple of `font_size`.
    pub line_height: f64,
    /// Border color.
    pub border_color: String,
    /// Border width.
    pub border_width: f64,
    /// Corner radius.
    pub border_radius: f64,
    /// CSS text decoration.
    pub text_decoration: String,
}

const DEFAULT_FONT_FAMILY: &str = "微软雅黑, Microsoft YaHei";

impl NodeStyle {
    fn base(fill_color: &str, color: &str, font_size: f64) -> Self {
        Self {
            shape: NodeShape::Rectangle,
            fill_color: fill_color.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: color.to_string(),
            font_size,
            font_weight: "normal".to_string(),
            font_style: "normal".to_string(),
            line_height: 1.5,
            border_color: "transparent".to_string(),
            border_width: 0.0,
            border_radius: 5.0,
            text_decoration: "none".to_string(),
        }
    }
}

/// Theme tier a node falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleTier {
    /// Depth 0.
    Root,
    /// Depth 1.
    Second,
    /// Depth 2 and deeper.
    Node,
}

impl StyleTier {
    /// Tier for a node at `depth` (root = 0).
    pub fn from_depth(depth: usize) -> Self {
        match depth {
            0 => StyleTier::Root,
            1 => StyleTier::Second,
            _ => StyleTier::Node,
        }
    }
}

/// Mind-map theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    /// Horizontal padding between the node border and its text.
    pub padding_x: f64,
    /// Vertical padding between the node border and its text.
    pub padding_y: f64,
    /// Connector line width.
    pub line_width: f64,
    /// Connector line color.
    pub line_color: String,
    /// Canvas background color.
    pub background_color: String,
    /// Root node style.
    pub root: NodeStyle,
    /// Second-level node style.
    pub second: NodeStyle,
    /// Style of every deeper node.
    pub node: NodeStyle,
}

impl Theme {
    /// Built-in theme names accepted by [`Theme::by_name`].
    pub const BUILTIN: [&'static str; 2] = ["default", "classic"];

    /// The default theme.
    pub fn default_theme() -> Self {
        let mut root = NodeStyle::base("#549688", "#fff", 16.0);
        root.font_weight = "bold".to_string();

        let mut second = NodeStyle::base("#fff", "#565656", 16.0);
        second.border_color = "#549688".to_string();
        second.border_width = 1.0;

        let node = NodeStyle::base("transparent", "#6a6d6c", 14.0);

        Self {
            padding_x: 10.0,
            padding_y: 5.0,
            line_width: 1.0,
            line_color: "#549688".to_string(),
            background_color: "#fafafa".to_string(),
            root,
            second,
            node,
        }
    }

    /// The "classic" theme: the default theme with warmer colors and smaller deep-node text.
    pub fn classic() -> Self {
        let mut theme = Self::default_theme();
        theme.line_color = "rgb(94, 202, 110)".to_string();
        theme.line_width = 2.0;
        theme.background_color = "rgb(241, 241, 241)".to_string();

        theme.root.fill_color = "rgb(255, 245, 214)".to_string();
        theme.root.color = "#1a1a1a".to_string();
        theme.root.font_size = 18.0;
        theme.root.border_radius = 10.0;
        theme.root.border_color = "rgb(249, 199, 84)".to_string();
        theme.root.border_width = 1.0;

        theme.second.shape = NodeShape::Line;
        theme.second.fill_color = "rgb(255, 245, 214)".to_string();
        theme.second.border_color = "rgb(94, 202, 110)".to_string();
        theme.second.border_width = 2.0;
        theme.second.color = "#1a1a1a".to_string();
        theme.second.font_size = 14.0;
        theme.second.border_radius = 10.0;

        theme.node.shape = NodeShape::Line;
        theme.node.font_size = 12.0;
        theme.node.color = "#1a1a1a".to_string();
        theme.node.border_width = 2.0;
        theme.node.border_color = "rgb(94, 202, 110)".to_string();
        theme
    }

    /// Look up a built-in theme.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default_theme()),
            "classic" => Some(Self::classic()),
            _ => None,
        }
    }

    /// Style of a tier.
    pub fn tier(&self, tier: StyleTier) -> &NodeStyle {
        match tier {
            StyleTier::Root => &self.root,
            StyleTier::Second => &self.second,
            StyleTier::Node => &self.node,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

/// Open set of per-node style overrides, keyed by camelCase property name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleOverrides(BTreeMap<String, Value>);

impl StyleOverrides {
    /// Empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set an override, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove an override, returning the previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether no override is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Overrides in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Result of the style cascade for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    /// Tier style with the node's overrides applied.
    pub style: NodeStyle,
    /// Resolved horizontal padding.
    pub padding_x: f64,
    /// Resolved vertical padding.
    pub padding_y: f64,
}

/// Resolve a node's style: own overrides, then the tier default, then the theme default.
///
/// Ill-typed override values are ignored (and logged), so resolution never fails.
pub fn resolve_style(overrides: &StyleOverrides, tier: StyleTier, theme: &Theme) -> ResolvedStyle {
    let mut style = theme.tier(tier).clone();
    let mut padding_x = theme.padding_x;
    let mut padding_y = theme.padding_y;

    for (key, value) in overrides.iter() {
        let applied = match key.as_str() {
            "paddingX" => number(value).map(|v| padding_x = v),
            "paddingY" => number(value).map(|v| padding_y = v),
            _ => apply_override(&mut style, key, value),
        };
        if applied.is_none() {
            tracing::warn!(key = %key, value = %value, "ignoring ill-typed style override");
        }
    }

    ResolvedStyle {
        style,
        padding_x,
        padding_y,
    }
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite() && *v >= 0.0)
}

fn string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

// Returns `None` only for a known key with a value of the wrong type.
fn apply_override(style: &mut NodeStyle, key: &str, value: &Value) -> Option<()> {
    match key {
        "shape" => style.shape = serde_json::from_value(value.clone()).ok()?,
        "fillColor" => style.fill_color = string(value)?,
        "fontFamily" => style.font_family = string(value)?,
        "color" => style.color = string(value)?,
        "fontSize" => style.font_size = number(value)?,
        "fontWeight" => style.font_weight = string(value)?,
        "fontStyle" => style.font_style = string(value)?,
        "lineHeight" => style.line_height = number(value)?,
        "borderColor" => style.border_color = string(value)?,
        "borderWidth" => style.border_width = number(value)?,
        "borderRadius" => style.border_radius = number(value)?,
        "textDecoration" => style.text_decoration = string(value)?,
        // Renderer-only data (image, icon, hyperLink, ...).
        _ => {}
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tier_from_depth() {
        assert_eq!(StyleTier::from_depth(0), StyleTier::Root);
        assert_eq!(StyleTier::from_depth(1), StyleTier::Second);
        assert_eq!(StyleTier::from_depth(7), StyleTier::Node);
    }

    #[test]
    fn test_cascade_prefers_override_then_tier_then_theme() {
        let theme = Theme::default_theme();
        let mut overrides = StyleOverrides::new();
        overrides.set("fontSize", json!(30));

        let resolved = resolve_style(&overrides, StyleTier::Node, &theme);
        assert_eq!(resolved.style.font_size, 30.0);
        assert_eq!(resolved.style.color, theme.node.color);
        assert_eq!(resolved.padding_x, theme.padding_x);

        overrides.set("paddingX", json!(4));
        let resolved = resolve_style(&overrides, StyleTier::Root, &theme);
        assert_eq!(resolved.padding_x, 4.0);
        assert_eq!(resolved.style.font_weight, "bold");
    }

    #[test]
    fn test_ill_typed_override_falls_back() {
        let theme = Theme::classic();
        let mut overrides = StyleOverrides::new();
        overrides.set("fontSize", json!("huge"));
        overrides.set("image", json!("https://example.com/a.png"));

        let resolved = resolve_style(&overrides, StyleTier::Second, &theme);
        assert_eq!(resolved.style.font_size, theme.second.font_size);
    }

    #[test]
    fn test_builtin_themes() {
        for name in Theme::BUILTIN {
            assert!(Theme::by_name(name).is_some());
        }
        assert!(Theme::by_name("neon").is_none());
        assert_eq!(Theme::classic().node.font_size, 12.0);
    }
}
