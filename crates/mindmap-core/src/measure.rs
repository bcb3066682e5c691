//! Headless text measurement.
//!
//! Node size is a pure function of the node text and its resolved style. Widths follow UAX #11
//! (via `unicode-width`) per grapheme cluster, so CJK text measures twice as wide as Latin text
//! of the same length.

use crate::data_source::{NodeData, Size};
use crate::style::{ResolvedStyle, StyleTier, Theme, resolve_style};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Advance of one narrow cell, as a fraction of the font size.
pub const CELL_WIDTH_RATIO: f64 = 0.6;

/// Display width of a grapheme cluster, in cells.
///
/// Clusters are measured by their base character; zero-width bases count as one cell.
pub fn grapheme_width(grapheme: &str) -> usize {
    grapheme
        .chars()
        .next()
        .and_then(UnicodeWidthChar::width)
        .map(|w| w.max(1))
        .unwrap_or(1)
}

/// Display width of one line, in cells.
pub fn line_width(line: &str) -> usize {
    line.graphemes(true).map(grapheme_width).sum()
}

/// Size of `text` rendered with `style`, including padding.
pub fn measure_text(text: &str, style: &ResolvedStyle) -> Size {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    let cells = lines.iter().map(|line| line_width(line)).max().unwrap_or(0).max(1);

    let font_size = style.style.font_size;
    let text_width = cells as f64 * font_size * CELL_WIDTH_RATIO;
    let text_height = lines.len() as f64 * font_size * style.style.line_height;

    Size::new(
        text_width + style.padding_x * 2.0,
        text_height + style.padding_y * 2.0,
    )
}

/// Content size of a node at `depth`: a drag-resized size wins over the measured text.
pub fn content_size(data: &NodeData, depth: usize, theme: &Theme) -> Size {
    if let Some(size) = data.size {
        return size;
    }
    let style = resolve_style(&data.style, StyleTier::from_depth(depth), theme);
    measure_text(&data.text, &style)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(font_size: f64) -> ResolvedStyle {
        let mut style = Theme::default_theme().node;
        style.font_size = font_size;
        style.line_height = 1.0;
        ResolvedStyle {
            style,
            padding_x: 0.0,
            padding_y: 0.0,
        }
    }

    #[test]
    fn test_wide_characters_count_double() {
        assert_eq!(line_width("abc"), 3);
        assert_eq!(line_width("你好"), 4);
        assert_eq!(line_width("e\u{301}"), 1);
    }

    #[test]
    fn test_measure_multiline_uses_widest_line() {
        let size = measure_text("ab\nabcd\r\nc", &plain(10.0));
        assert_eq!(size.width, 4.0 * 10.0 * CELL_WIDTH_RATIO);
        assert_eq!(size.height, 30.0);
    }

    #[test]
    fn test_empty_text_has_one_cell() {
        let size = measure_text("", &plain(10.0));
        assert_eq!(size.width, 10.0 * CELL_WIDTH_RATIO);
        assert_eq!(size.height, 10.0);
    }

    #[test]
    fn test_fixed_size_wins() {
        let mut data = NodeData::with_uid("n", "some long text");
        data.size = Some(Size::new(12.0, 34.0));
        assert_eq!(content_size(&data, 3, &Theme::default()), Size::new(12.0, 34.0));
    }

    #[test]
    fn test_padding_is_added_on_both_sides() {
        let theme = Theme::default_theme();
        let data = NodeData::with_uid("n", "x");
        let size = content_size(&data, 2, &theme);
        let style = &theme.node;
        assert_eq!(
            size.width,
            style.font_size * CELL_WIDTH_RATIO + theme.padding_x * 2.0
        );
        assert_eq!(
            size.height,
            style.font_size * style.line_height + theme.padding_y * 2.0
        );
    }
}
