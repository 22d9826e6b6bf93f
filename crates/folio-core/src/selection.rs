//! Pointer-driven text selection.
//!
//! A small state machine: `Idle --start--> Selecting --end--> Idle`, with `clear` returning to
//! `Idle` from either state. The fixed end of a selection (its anchor) is the caret offset
//! captured when selecting began.

use crate::cursor::{CursorManager, word_ranges};
use crate::layout::LayoutResult;
use crate::storage::PieceTable;

/// A non-empty selected range of linear offsets, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Selection {
    /// Build a selection between two offsets in either order. Equal offsets collapse to `None`.
    pub fn new(a: usize, b: usize) -> Option<Self> {
        (a != b).then(|| Self {
            start: a.min(b),
            end: a.max(b),
        })
    }

    /// Selected character count.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false: collapsed ranges are never represented.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` lies inside the range.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A pointer drag is extending the selection.
    Selecting,
}

/// Tracks the selection and the drag gesture that builds it.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    state: SelectionState,
    anchor: usize,
    selection: Option<Selection>,
}

impl SelectionManager {
    /// Create an idle manager without a selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current gesture state.
    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Current selection.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Fixed end of the selection.
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Whether a selection exists.
    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }

    /// Begin a drag at a page-space point. Clears any selection and moves the caret to the
    /// point. Returns `false` (staying idle) when the point cannot be resolved.
    pub fn start_selection(
        &mut self,
        cursor: &mut CursorManager,
        layout: &LayoutResult,
        len: usize,
        (x, y, page_index): (f32, f32, usize),
    ) -> bool {
        self.selection = None;
        self.state = SelectionState::Idle;
        let Some(pos) = cursor.map_pixel_coordinate_to_structure(layout, x, y, page_index, true)
        else {
            return false;
        };
        let offset = cursor.map_structure_to_linear(layout, &pos);
        cursor.set_cursor_position(layout, offset, len);
        self.anchor = cursor.position();
        self.state = SelectionState::Selecting;
        true
    }

    /// Extend the drag to a page-space point. No-op unless selecting. Returns whether the
    /// selection changed.
    pub fn update_selection(
        &mut self,
        cursor: &mut CursorManager,
        layout: &LayoutResult,
        len: usize,
        (x, y, page_index): (f32, f32, usize),
    ) -> bool {
        if self.state != SelectionState::Selecting {
            return false;
        }
        let Some(pos) = cursor.map_pixel_coordinate_to_structure(layout, x, y, page_index, true)
        else {
            return false;
        };
        let candidate = cursor.map_structure_to_linear(layout, &pos).min(len);
        cursor.set_cursor_position(layout, candidate, len);
        let previous = self.selection;
        self.selection = Selection::new(self.anchor, candidate);
        previous != self.selection
    }

    /// Finish the drag. A zero-length result leaves no selection. Returns whether the
    /// selection changed.
    pub fn end_selection(
        &mut self,
        cursor: &mut CursorManager,
        layout: &LayoutResult,
        len: usize,
        point: (f32, f32, usize),
    ) -> bool {
        if self.state != SelectionState::Selecting {
            return false;
        }
        let changed = self.update_selection(cursor, layout, len, point);
        self.state = SelectionState::Idle;
        changed
    }

    /// Drop the selection and any gesture. Returns whether a selection existed.
    pub fn clear_selection(&mut self) -> bool {
        self.state = SelectionState::Idle;
        self.selection.take().is_some()
    }

    /// Select `[0, len]` when the document is non-empty.
    pub fn select_all(&mut self, len: usize) -> bool {
        let previous = self.selection;
        self.state = SelectionState::Idle;
        self.anchor = 0;
        self.selection = Selection::new(0, len);
        previous != self.selection
    }

    /// Select exactly `[start, end)`, anchored at `anchor`.
    pub fn set_selection(&mut self, anchor: usize, active: usize) -> bool {
        let previous = self.selection;
        self.anchor = anchor;
        self.selection = Selection::new(anchor, active);
        previous != self.selection
    }

    /// Extend (or begin) a keyboard selection: the caret moved from `previous_caret` to
    /// `new_caret` with shift held.
    pub fn extend_selection(&mut self, previous_caret: usize, new_caret: usize) -> bool {
        if self.selection.is_none() {
            self.anchor = previous_caret;
        }
        let anchor = self.anchor;
        self.set_selection(anchor, new_caret)
    }

    /// Select the word under a page-space point.
    pub fn select_word_at(
        &mut self,
        cursor: &mut CursorManager,
        layout: &LayoutResult,
        text: &str,
        (x, y, page_index): (f32, f32, usize),
    ) -> bool {
        let Some(pos) = cursor.map_pixel_coordinate_to_structure(layout, x, y, page_index, true)
        else {
            return false;
        };
        let offset = cursor.map_structure_to_linear(layout, &pos);
        let Some((start, end)) = word_ranges(text)
            .into_iter()
            .find(|(start, end)| *start <= offset && offset < *end)
            .or_else(|| {
                word_ranges(text)
                    .into_iter()
                    .find(|(_, end)| *end == offset)
            })
        else {
            return false;
        };
        self.state = SelectionState::Idle;
        cursor.set_cursor_position(layout, end, text.chars().count());
        self.set_selection(start, end)
    }

    /// Selected text, or an empty string without a selection.
    pub fn get_selected_text(&self, table: &PieceTable) -> String {
        match self.selection {
            Some(selection) => table
                .get_range_text(selection.start, selection.len())
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Left arrow with a selection: collapse the caret to its start. Returns whether the key
    /// was consumed.
    pub fn handle_move_left_with_selection(
        &mut self,
        cursor: &mut CursorManager,
        layout: &LayoutResult,
        len: usize,
    ) -> bool {
        match self.selection.take() {
            Some(selection) => {
                self.state = SelectionState::Idle;
                cursor.set_cursor_position(layout, selection.start, len);
                true
            }
            None => false,
        }
    }

    /// Right arrow with a selection: collapse the caret to its end. Returns whether the key
    /// was consumed.
    pub fn handle_move_right_with_selection(
        &mut self,
        cursor: &mut CursorManager,
        layout: &LayoutResult,
        len: usize,
    ) -> bool {
        match self.selection.take() {
            Some(selection) => {
                self.state = SelectionState::Idle;
                cursor.set_cursor_position(layout, selection.end, len);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutEngine, LayoutParams, Margins, PageSetup, PlainStyles, TextMetrics};

    fn layout(text: &str) -> LayoutResult {
        let params = LayoutParams {
            page: PageSetup {
                width: 200.0,
                height: 200.0,
            },
            margins: Margins {
                left: 0.0,
                right: 0.0,
                top: 0.0,
                bottom: 0.0,
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
    fn test_selection_new_normalizes() {
        assert_eq!(Selection::new(5, 2), Some(Selection { start: 2, end: 5 }));
        assert_eq!(Selection::new(3, 3), None);
    }

    #[test]
    fn test_drag_selects_backwards() {
        let layout = layout("hello world");
        let mut cursor = CursorManager::new();
        let mut manager = SelectionManager::new();

        assert!(manager.start_selection(&mut cursor, &layout, 11, (80.0, 5.0, 0)));
        assert_eq!(manager.state(), SelectionState::Selecting);
        manager.update_selection(&mut cursor, &layout, 11, (20.0, 5.0, 0));
        assert!(manager.end_selection(&mut cursor, &layout, 11, (10.0, 5.0, 0)));
        assert_eq!(manager.state(), SelectionState::Idle);
        assert_eq!(manager.selection(), Some(Selection { start: 1, end: 8 }));
    }

    #[test]
    fn test_update_ignored_when_idle() {
        let layout = layout("hello");
        let mut cursor = CursorManager::new();
        let mut manager = SelectionManager::new();
        assert!(!manager.update_selection(&mut cursor, &layout, 5, (30.0, 5.0, 0)));
        assert!(manager.selection().is_none());
    }

    #[test]
    fn test_click_without_drag_leaves_no_selection() {
        let layout = layout("hello");
        let mut cursor = CursorManager::new();
        let mut manager = SelectionManager::new();
        manager.start_selection(&mut cursor, &layout, 5, (20.0, 5.0, 0));
        manager.end_selection(&mut cursor, &layout, 5, (20.0, 5.0, 0));
        assert!(manager.selection().is_none());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_select_all() {
        let mut manager = SelectionManager::new();
        assert!(!manager.select_all(0));
        assert!(manager.selection().is_none());
        assert!(manager.select_all(7));
        assert_eq!(manager.selection(), Some(Selection { start: 0, end: 7 }));
    }

    #[test]
    fn test_selected_text() {
        let table = PieceTable::new("hello world");
        let mut manager = SelectionManager::new();
        assert_eq!(manager.get_selected_text(&table), "");
        manager.set_selection(6, 11);
        assert_eq!(manager.get_selected_text(&table), "world");
    }

    #[test]
    fn test_arrow_collapses_selection() {
        let layout = layout("hello world");
        let mut cursor = CursorManager::new();
        let mut manager = SelectionManager::new();

        assert!(!manager.handle_move_left_with_selection(&mut cursor, &layout, 11));

        manager.set_selection(2, 6);
        assert!(manager.handle_move_left_with_selection(&mut cursor, &layout, 11));
        assert_eq!(cursor.position(), 2);
        assert!(manager.selection().is_none());

        manager.set_selection(2, 6);
        assert!(manager.handle_move_right_with_selection(&mut cursor, &layout, 11));
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn test_keyboard_extension_keeps_anchor() {
        let mut manager = SelectionManager::new();
        manager.extend_selection(4, 5);
        manager.extend_selection(5, 6);
        assert_eq!(manager.selection(), Some(Selection { start: 4, end: 6 }));
        manager.extend_selection(6, 2);
        assert_eq!(manager.selection(), Some(Selection { start: 2, end: 4 }));
        manager.extend_selection(2, 4);
        assert!(manager.selection().is_none());
    }

    #[test]
    fn test_select_word() {
        let text = "hello brave world";
        let layout = layout(text);
        let mut cursor = CursorManager::new();
        let mut manager = SelectionManager::new();
        assert!(manager.select_word_at(&mut cursor, &layout, text, (72.0, 5.0, 0)));
        assert_eq!(manager.selection(), Some(Selection { start: 6, end: 11 }));
        assert_eq!(cursor.position(), 11);
    }
}
