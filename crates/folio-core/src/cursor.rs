//! Caret position and coordinate mapping.
//!
//! The canonical caret position is a linear character offset. [`StructurePosition`] is the
//! derived (paragraph, line, character) address used for drawing and vertical movement, and
//! is recomputed from the current [`LayoutResult`] whenever either changes.

use crate::layout::{LayoutResult, Line, LineLocation};
use unicode_segmentation::UnicodeSegmentation;

/// A layout-derived address of a document offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructurePosition {
    /// Paragraph index.
    pub paragraph_index: usize,
    /// Line index within the paragraph.
    pub line_index: usize,
    /// Character index within the line.
    pub character_index: usize,
    /// Pixel offset of the character boundary from the line start.
    pub pixel_offset_in_line: f32,
}

impl StructurePosition {
    /// The line this position lies on.
    pub fn line_location(&self) -> LineLocation {
        LineLocation {
            paragraph_index: self.paragraph_index,
            line_index: self.line_index,
        }
    }
}

/// Where to draw the caret.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaretGeometry {
    /// Page the caret is on.
    pub page_index: usize,
    /// Page-space x.
    pub x: f32,
    /// Page-space y of the top of the caret.
    pub y: f32,
    /// Caret height.
    pub height: f32,
}

/// Owns the single caret offset and maps between coordinate spaces.
#[derive(Debug, Clone, Default)]
pub struct CursorManager {
    offset: usize,
    structure: Option<StructurePosition>,
    /// Page-space x kept across consecutive vertical moves.
    preferred_x: Option<f32>,
}

impl CursorManager {
    /// Create a caret at offset 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear caret offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Structural address of the caret under the last layout.
    pub fn structure(&self) -> Option<StructurePosition> {
        self.structure
    }

    /// Resolve a page-space point to a structural position.
    ///
    /// Returns `None` when the point is outside the content laid out on `page_index`. With
    /// `for_cursor_placement`, points above the first or below the last line on the page snap
    /// to that line and `x` clamps to the line ends, so clicks in the margins still place
    /// the caret.
    pub fn map_pixel_coordinate_to_structure(
        &self,
        layout: &LayoutResult,
        x: f32,
        y: f32,
        page_index: usize,
        for_cursor_placement: bool,
    ) -> Option<StructurePosition> {
        let locations = layout.lines_on_page(page_index);
        let first = *locations.first()?;
        let last = *locations.last()?;
        let height = layout.line_height;

        let hit = locations.iter().copied().find(|loc| {
            layout
                .line(*loc)
                .is_some_and(|line| y >= line.y && y < line.y + height)
        });
        let location = match hit {
            Some(location) => location,
            None if !for_cursor_placement => return None,
            None => {
                let first_line = layout.line(first)?;
                if y < first_line.y { first } else { last }
            }
        };

        let paragraph = layout.paragraphs.get(location.paragraph_index)?;
        let line = paragraph.lines.get(location.line_index)?;
        let relative_x = x - line.x_offset;
        if !for_cursor_placement && (relative_x < 0.0 || relative_x > line.pixel_length) {
            return None;
        }

        let mut character_index = line.char_index_at_x(relative_x);
        if for_cursor_placement {
            let is_last_line = is_last(paragraph.lines.len(), location.line_index);
            character_index = clamp_to_visual_line(line, character_index, is_last_line);
        }

        Some(StructurePosition {
            paragraph_index: location.paragraph_index,
            line_index: location.line_index,
            character_index,
            pixel_offset_in_line: line.x_for_char(character_index),
        })
    }

    /// Linear offset of a structural position. Out-of-range indices clamp to the document.
    pub fn map_structure_to_linear(&self, layout: &LayoutResult, pos: &StructurePosition) -> usize {
        let Some(paragraph) = layout
            .paragraphs
            .get(pos.paragraph_index)
            .or_else(|| layout.paragraphs.last())
        else {
            return 0;
        };
        let line_index = pos.line_index.min(paragraph.lines.len().saturating_sub(1));
        let before: usize = paragraph.lines[..line_index].iter().map(|l| l.length).sum();
        let line_length = paragraph.lines.get(line_index).map_or(0, |l| l.length);
        paragraph.offset + before + pos.character_index.min(line_length)
    }

    /// Structural address of `offset`. An offset on a wrap boundary belongs to the later line.
    pub fn map_linear_to_structure(
        &self,
        layout: &LayoutResult,
        offset: usize,
    ) -> StructurePosition {
        let paragraph_index = layout.paragraph_index_at(offset);
        let Some(paragraph) = layout.paragraphs.get(paragraph_index) else {
            return StructurePosition {
                paragraph_index: 0,
                line_index: 0,
                character_index: 0,
                pixel_offset_in_line: 0.0,
            };
        };
        let relative = offset.saturating_sub(paragraph.offset).min(paragraph.length);
        let line_index = paragraph
            .lines
            .partition_point(|l| l.offset <= relative)
            .saturating_sub(1);
        let (character_index, pixel_offset_in_line) = match paragraph.lines.get(line_index) {
            Some(line) => {
                let ci = relative - line.offset;
                (ci, line.x_for_char(ci))
            }
            None => (0, 0.0),
        };

        StructurePosition {
            paragraph_index,
            line_index,
            character_index,
            pixel_offset_in_line,
        }
    }

    /// Page-space caret rectangle for `offset`.
    pub fn caret_geometry(&self, layout: &LayoutResult, offset: usize) -> Option<CaretGeometry> {
        let pos = self.map_linear_to_structure(layout, offset);
        let line = layout.line(pos.line_location())?;
        Some(CaretGeometry {
            page_index: line.page_index,
            x: line.x_offset + pos.pixel_offset_in_line,
            y: line.y,
            height: layout.line_height,
        })
    }

    /// Move the caret to `offset`, clamped to `[0, len]`. Returns whether the offset changed.
    pub fn set_cursor_position(
        &mut self,
        layout: &LayoutResult,
        offset: usize,
        len: usize,
    ) -> bool {
        self.preferred_x = None;
        self.place(layout, offset.min(len))
    }

    /// Re-derive the structural position after a relayout or external edit.
    pub fn refresh(&mut self, layout: &LayoutResult, len: usize) {
        self.offset = self.offset.min(len);
        self.structure = Some(self.map_linear_to_structure(layout, self.offset));
    }

    fn place(&mut self, layout: &LayoutResult, offset: usize) -> bool {
        let changed = offset != self.offset;
        self.offset = offset;
        self.structure = Some(self.map_linear_to_structure(layout, offset));
        changed
    }

    /// One character left, stopping at 0.
    pub fn move_left(&mut self, layout: &LayoutResult, len: usize) -> bool {
        self.set_cursor_position(layout, self.offset.saturating_sub(1), len)
    }

    /// One character right, stopping at the document end.
    pub fn move_right(&mut self, layout: &LayoutResult, len: usize) -> bool {
        self.set_cursor_position(layout, self.offset.saturating_add(1), len)
    }

    /// One line up, keeping the horizontal position. On the first line, moves to offset 0.
    pub fn move_up(&mut self, layout: &LayoutResult, len: usize) -> bool {
        self.move_vertical(layout, len, -1)
    }

    /// One line down, keeping the horizontal position. On the last line, moves to the end.
    pub fn move_down(&mut self, layout: &LayoutResult, len: usize) -> bool {
        self.move_vertical(layout, len, 1)
    }

    fn move_vertical(&mut self, layout: &LayoutResult, len: usize, delta: isize) -> bool {
        let current = self.map_linear_to_structure(layout, self.offset);
        let Some(line) = layout.line(current.line_location()) else {
            return false;
        };
        let x = self
            .preferred_x
            .unwrap_or(line.x_offset + current.pixel_offset_in_line);

        let Some(target) = adjacent_line(layout, current.line_location(), delta) else {
            let edge = if delta < 0 { 0 } else { len };
            return self.set_cursor_position(layout, edge, len);
        };
        let Some(paragraph) = layout.paragraphs.get(target.paragraph_index) else {
            return false;
        };
        let Some(target_line) = paragraph.lines.get(target.line_index) else {
            return false;
        };

        let character_index = clamp_to_visual_line(
            target_line,
            target_line.char_index_at_x(x - target_line.x_offset),
            is_last(paragraph.lines.len(), target.line_index),
        );
        let offset = paragraph.offset + target_line.offset + character_index;
        let changed = self.place(layout, offset.min(len));
        self.preferred_x = Some(x);
        changed
    }

    /// Start of the current visual line.
    pub fn move_line_start(&mut self, layout: &LayoutResult, len: usize) -> bool {
        let current = self.map_linear_to_structure(layout, self.offset);
        let start = self.offset - current.character_index;
        self.set_cursor_position(layout, start, len)
    }

    /// End of the current visual line (before the wrap point on wrapped lines).
    pub fn move_line_end(&mut self, layout: &LayoutResult, len: usize) -> bool {
        let current = self.map_linear_to_structure(layout, self.offset);
        let Some(paragraph) = layout.paragraphs.get(current.paragraph_index) else {
            return false;
        };
        let Some(line) = paragraph.lines.get(current.line_index) else {
            return false;
        };
        let end = clamp_to_visual_line(
            line,
            line.length,
            is_last(paragraph.lines.len(), current.line_index),
        );
        let start = self.offset - current.character_index;
        self.set_cursor_position(layout, start + end, len)
    }

    /// Previous word start in `text`, or 0.
    pub fn move_word_left(&mut self, layout: &LayoutResult, text: &str) -> bool {
        let len = text.chars().count();
        let target = word_ranges(text)
            .into_iter()
            .map(|(start, _)| start)
            .filter(|start| *start < self.offset)
            .last()
            .unwrap_or(0);
        self.set_cursor_position(layout, target, len)
    }

    /// Next word end in `text`, or the document end.
    pub fn move_word_right(&mut self, layout: &LayoutResult, text: &str) -> bool {
        let len = text.chars().count();
        let target = word_ranges(text)
            .into_iter()
            .map(|(_, end)| end)
            .find(|end| *end > self.offset)
            .unwrap_or(len);
        self.set_cursor_position(layout, target, len)
    }
}

fn is_last(line_count: usize, line_index: usize) -> bool {
    line_index + 1 >= line_count
}

/// A caret at the very end of a line that wrapped after whitespace would display at the start
/// of the next line, so keep it before that whitespace. A line broken inside a word has no
/// such slot; its end is the next line's start.
fn clamp_to_visual_line(line: &Line, character_index: usize, is_last_line: bool) -> usize {
    if !is_last_line && line.ends_with_whitespace && character_index >= line.length {
        line.length.saturating_sub(1)
    } else {
        character_index
    }
}

fn adjacent_line(layout: &LayoutResult, from: LineLocation, delta: isize) -> Option<LineLocation> {
    if delta < 0 {
        if from.line_index > 0 {
            return Some(LineLocation {
                line_index: from.line_index - 1,
                ..from
            });
        }
        let paragraph_index = from.paragraph_index.checked_sub(1)?;
        let lines = layout.paragraphs.get(paragraph_index)?.lines.len();
        Some(LineLocation {
            paragraph_index,
            line_index: lines.saturating_sub(1),
        })
    } else {
        let lines = layout.paragraphs.get(from.paragraph_index)?.lines.len();
        if from.line_index + 1 < lines {
            return Some(LineLocation {
                line_index: from.line_index + 1,
                ..from
            });
        }
        let paragraph_index = from.paragraph_index + 1;
        layout.paragraphs.get(paragraph_index)?;
        Some(LineLocation {
            paragraph_index,
            line_index: 0,
        })
    }
}

/// Character ranges of the words in `text` (UAX #29 word segments containing an
/// alphanumeric character).
pub fn word_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut char_offset = 0usize;
    for segment in text.split_word_bounds() {
        let count = segment.chars().count();
        if segment.chars().any(char::is_alphanumeric) {
            ranges.push((char_offset, char_offset + count));
        }
        char_offset += count;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutEngine, LayoutParams, Margins, PageSetup, PlainStyles, TextMetrics};

    fn layout(text: &str) -> LayoutResult {
        let params = LayoutParams {
            page: PageSetup {
                width: 80.0,
                height: 200.0,
            },
            margins: Margins {
                left: 10.0,
                right: 10.0,
                top: 20.0,
                bottom: 20.0,
            },
            metrics: TextMetrics {
                base_advance: 10.0,
                line_height: 20.0,
                ..TextMetrics::default()
            },
        };
        LayoutEngine::new(params).layout(text, &PlainStyles, &[])
    }

    #[test]
    fn test_pixel_to_structure() {
        let layout = layout("aaa bb cccc d");
        let cursor = CursorManager::new();
        // Second line starts at y = 40.
        let pos = cursor
            .map_pixel_coordinate_to_structure(&layout, 10.0 + 21.0, 45.0, 0, false)
            .unwrap();
        assert_eq!((pos.line_index, pos.character_index), (1, 2));
        assert_eq!(cursor.map_structure_to_linear(&layout, &pos), 9);
    }

    #[test]
    fn test_pixel_outside_content() {
        let layout = layout("abc");
        let cursor = CursorManager::new();
        assert!(cursor
            .map_pixel_coordinate_to_structure(&layout, 15.0, 100.0, 0, false)
            .is_none());
        assert!(cursor
            .map_pixel_coordinate_to_structure(&layout, 15.0, 25.0, 1, true)
            .is_none());
        let snapped = cursor
            .map_pixel_coordinate_to_structure(&layout, 500.0, 100.0, 0, true)
            .unwrap();
        assert_eq!(snapped.character_index, 3);
    }

    #[test]
    fn test_linear_to_structure_wrap_boundary() {
        let layout = layout("aaa bb cccc d");
        let cursor = CursorManager::new();
        let pos = cursor.map_linear_to_structure(&layout, 7);
        assert_eq!((pos.line_index, pos.character_index), (1, 0));
        let end = cursor.map_linear_to_structure(&layout, 13);
        assert_eq!((end.line_index, end.character_index), (1, 6));
    }

    #[test]
    fn test_set_cursor_clamps() {
        let layout = layout("abc");
        let mut cursor = CursorManager::new();
        assert!(cursor.set_cursor_position(&layout, 99, 3));
        assert_eq!(cursor.position(), 3);
        assert!(!cursor.move_right(&layout, 3));
    }

    #[test]
    fn test_sticky_x() {
        // Lines: "abcdef" / "gh" / "ijklmn"
        let layout = layout("abcdef\ngh\nijklmn");
        let mut cursor = CursorManager::new();
        cursor.set_cursor_position(&layout, 5, 16);
        cursor.move_down(&layout, 16);
        assert_eq!(cursor.position(), 9);
        cursor.move_down(&layout, 16);
        assert_eq!(cursor.position(), 15);
        cursor.move_up(&layout, 16);
        cursor.move_up(&layout, 16);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_vertical_at_edges() {
        let layout = layout("abc\ndef");
        let mut cursor = CursorManager::new();
        cursor.set_cursor_position(&layout, 1, 7);
        cursor.move_up(&layout, 7);
        assert_eq!(cursor.position(), 0);
        cursor.set_cursor_position(&layout, 5, 7);
        cursor.move_down(&layout, 7);
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn test_down_into_wrapped_line_stays_on_it() {
        // "xxxxx" then "aaa bb cccc" wrapping to "aaa bb " / "cccc".
        let layout = layout("xxxxx\naaa bb cccc");
        let mut cursor = CursorManager::new();
        cursor.set_cursor_position(&layout, 5, 17);
        cursor.move_down(&layout, 17);
        let pos = cursor.structure().unwrap();
        assert_eq!((pos.paragraph_index, pos.line_index), (1, 0));
    }

    #[test]
    fn test_word_moves() {
        let text = "hello, big world";
        let layout = layout(text);
        let mut cursor = CursorManager::new();
        cursor.move_word_right(&layout, text);
        assert_eq!(cursor.position(), 5);
        cursor.move_word_right(&layout, text);
        assert_eq!(cursor.position(), 10);
        cursor.move_word_left(&layout, text);
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn test_line_home_end() {
        let layout = layout("aaa bb cccc d");
        let mut cursor = CursorManager::new();
        cursor.set_cursor_position(&layout, 2, 13);
        cursor.move_line_end(&layout, 13);
        assert_eq!(cursor.position(), 6);
        cursor.move_line_start(&layout, 13);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_click_past_mid_word_break() {
        // "abcdefghijk" is wider than the page and breaks as "abcdef" / "ghijk".
        let broken = layout("abcdefghijk");
        let cursor = CursorManager::new();
        let pos = cursor
            .map_pixel_coordinate_to_structure(&broken, 75.0, 25.0, 0, true)
            .unwrap();
        assert_eq!((pos.line_index, pos.character_index), (0, 6));
        assert_eq!(cursor.map_structure_to_linear(&broken, &pos), 6);

        // After a space the caret stays in front of it.
        let spaced = layout("aaa bb cccc d");
        let pos = cursor
            .map_pixel_coordinate_to_structure(&spaced, 75.0, 25.0, 0, true)
            .unwrap();
        assert_eq!((pos.line_index, pos.character_index), (0, 6));
        assert_eq!(cursor.map_structure_to_linear(&spaced, &pos), 6);
    }

    #[test]
    fn test_line_end_of_mid_word_break() {
        let layout = layout("abcdefghijk");
        let mut cursor = CursorManager::new();
        cursor.set_cursor_position(&layout, 2, 11);
        cursor.move_line_end(&layout, 11);
        assert_eq!(cursor.position(), 6);
    }
}
