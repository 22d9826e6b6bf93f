//! The editor orchestrator.
//!
//! [`Editor`] is the single owner of the document: its piece table, style tree, paragraph
//! formats, layout, caret and selection. Hosts push [`KeyEvent`]s and [`PointerEvent`]s in,
//! call formatting operations, and observe changes through listeners. Everything they get
//! back is a copy or a shared reference to immutable layout output.
//!
//! Every mutation runs to completion synchronously: edit storage, shift style boundaries,
//! recompute layout once, re-derive the caret, then notify listeners and redraw linked pages.

use crate::config::EditorConfig;
use crate::cursor::{CaretGeometry, CursorManager, StructurePosition};
use crate::error::{ConfigError, EditorError};
use crate::events::{EditorEvent, EditorEventKind, ListenerId, ListenerRegistry};
use crate::export::{DocxDocument, DocxSink, ExportOutcome, PdfDocument, PdfSink};
use crate::input::{Key, KeyEvent, Modifiers, PointerEvent};
use crate::intervals::{Rgb, StyleInterval, StyleIntervalTree, StyleSet, StyleTag};
use crate::layout::{Alignment, LayoutEngine, LayoutResult, PARAGRAPH_BREAK, ParagraphFormat};
use crate::render::{LinkReport, RenderTarget, SceneInput, build_page_scene};
use crate::selection::{Selection, SelectionManager, SelectionState};
use crate::storage::PieceTable;
use std::fmt;
use std::ops::RangeInclusive;

/// Caret and selection values compared before and after an operation to decide which
/// notifications to send.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewState {
    offset: usize,
    structure: Option<StructurePosition>,
    selection: Option<Selection>,
}

/// A paged rich-text editor.
pub struct Editor {
    config: EditorConfig,
    table: PieceTable,
    styles: StyleIntervalTree,
    engine: LayoutEngine,
    layout: LayoutResult,
    /// One entry per paragraph, kept in step with paragraph breaks.
    formats: Vec<ParagraphFormat>,
    cursor: CursorManager,
    selection: SelectionManager,
    /// Explicit style set for the next typed characters, set by toggling without a selection.
    pending: Option<StyleSet>,
    listeners: ListenerRegistry,
    page_count_listener: Option<ListenerId>,
    targets: Vec<Box<dyn RenderTarget>>,
    emitted_page_count: usize,
    initialized: bool,
    disposed: bool,
}

impl Editor {
    /// Create an editor over `text` with the default configuration.
    pub fn new(text: &str) -> Self {
        Self::with_config(text, EditorConfig::default())
    }

    /// Create an editor over `text`.
    pub fn with_config(text: &str, config: EditorConfig) -> Self {
        Self::with_styles(text, config, std::iter::empty())
    }

    /// Create an editor over `text` with initial style intervals. Intervals are clamped to
    /// the document; ones that end up empty are dropped.
    pub fn with_styles(
        text: &str,
        config: EditorConfig,
        styles: impl IntoIterator<Item = StyleInterval>,
    ) -> Self {
        let text = normalize_breaks(text);
        let table = PieceTable::new(&text);
        let len = table.len();
        let styles = StyleIntervalTree::from_intervals(
            styles
                .into_iter()
                .map(|i| StyleInterval::new(i.start.min(len), i.end.min(len), i.tag))
                .filter(|i| !i.is_empty()),
        );
        let engine = LayoutEngine::new(config.layout_params());
        let formats = vec![ParagraphFormat::default(); paragraph_count(&text)];
        let layout = engine.layout(&text, &styles, &formats);
        let mut cursor = CursorManager::new();
        cursor.refresh(&layout, len);
        let emitted_page_count = layout.page_count();

        Self {
            config,
            table,
            styles,
            engine,
            layout,
            formats,
            cursor,
            selection: SelectionManager::new(),
            pending: None,
            listeners: ListenerRegistry::new(),
            page_count_listener: None,
            targets: Vec::new(),
            emitted_page_count,
            initialized: false,
            disposed: false,
        }
    }

    /// Create an editor from a JSON configuration.
    pub fn from_json_config(text: &str, json: &str) -> Result<Self, ConfigError> {
        Ok(Self::with_config(text, EditorConfig::from_json(json)?))
    }

    /// Start drawing into linked render targets.
    pub fn initialize(&mut self) {
        self.initialized = true;
        self.disposed = false;
        tracing::debug!(
            chars = self.table.len(),
            pages = self.layout.page_count(),
            "editor initialized"
        );
        self.render();
    }

    /// Release render targets and listeners. Listener ids handed out earlier become inert.
    pub fn dispose(&mut self) {
        self.listeners.clear();
        self.page_count_listener = None;
        self.targets.clear();
        self.selection.clear_selection();
        self.pending = None;
        self.initialized = false;
        self.disposed = true;
        tracing::debug!("editor disposed");
    }

    /// Whether [`initialize`](Self::initialize) ran and [`dispose`](Self::dispose) has not.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Document text.
    pub fn text(&self) -> String {
        self.table.get_text()
    }

    /// Text of `[offset, offset + length)`.
    pub fn get_range_text(&self, offset: usize, length: usize) -> Result<String, EditorError> {
        Ok(self.table.get_range_text(offset, length)?)
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Caret offset.
    pub fn cursor_position(&self) -> usize {
        self.cursor.position()
    }

    /// Caret address under the current layout.
    pub fn structure_position(&self) -> Option<StructurePosition> {
        self.cursor.structure()
    }

    /// Where the caret is drawn.
    pub fn caret_geometry(&self) -> Option<CaretGeometry> {
        self.cursor.caret_geometry(&self.layout, self.cursor.position())
    }

    /// Current selection.
    pub fn selection(&self) -> Option<Selection> {
        self.selection.selection()
    }

    /// Selected text, empty without a selection.
    pub fn selected_text(&self) -> String {
        self.selection.get_selected_text(&self.table)
    }

    /// Current layout.
    pub fn layout(&self) -> &LayoutResult {
        &self.layout
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.layout.page_count()
    }

    /// Active configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// All style intervals, in start order.
    pub fn style_intervals(&self) -> Vec<StyleInterval> {
        self.styles.intervals()
    }

    /// Styles of the character at `offset`.
    pub fn styles_at(&self, offset: usize) -> StyleSet {
        self.styles.styles_at(offset)
    }

    /// Format of paragraph `index`.
    pub fn paragraph_format(&self, index: usize) -> Option<ParagraphFormat> {
        self.formats.get(index).copied()
    }

    /// Subscribe to events of `kind`.
    pub fn add_listener<F>(&mut self, kind: EditorEventKind, callback: F) -> ListenerId
    where
        F: FnMut(&EditorEvent) + Send + 'static,
    {
        self.listeners.add(kind, callback)
    }

    /// Unsubscribe. Safe to call repeatedly and after [`dispose`](Self::dispose).
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        if self.page_count_listener == Some(id) {
            self.page_count_listener = None;
        }
        self.listeners.remove(id)
    }

    /// Set the page-count callback, replacing one set earlier through this method. It is
    /// called with the new count whenever the count differs from the last one reported.
    pub fn set_page_count_change_callback<F>(&mut self, mut callback: F) -> ListenerId
    where
        F: FnMut(usize) + Send + 'static,
    {
        if let Some(previous) = self.page_count_listener.take() {
            self.listeners.remove(previous);
        }
        let id = self
            .listeners
            .add(EditorEventKind::PageCountChanged, move |event| {
                if let EditorEvent::PageCountChanged { new, .. } = event {
                    callback(*new);
                }
            });
        self.page_count_listener = Some(id);
        id
    }

    /// Attach targets for the pages after the ones already linked.
    pub fn link_canvases(&mut self, targets: Vec<Box<dyn RenderTarget>>) -> LinkReport {
        self.targets.extend(targets);
        self.finish_linking()
    }

    /// Detach every target and link `targets` from page 0.
    pub fn relink_canvases(&mut self, targets: Vec<Box<dyn RenderTarget>>) -> LinkReport {
        self.targets = targets;
        self.finish_linking()
    }

    fn finish_linking(&mut self) -> LinkReport {
        let report = self.link_report();
        if !report.is_complete() {
            tracing::warn!(
                pages = self.layout.page_count(),
                targets = self.targets.len(),
                missing = ?report.missing_pages,
                "fewer render targets than pages; drawing for missing pages is skipped"
            );
        }
        self.render();
        report
    }

    /// How the linked targets cover the current pages.
    pub fn link_report(&self) -> LinkReport {
        let pages = self.layout.page_count();
        let linked = self.targets.len().min(pages);
        LinkReport {
            linked,
            missing_pages: (linked..pages).collect(),
            spare_targets: self.targets.len().saturating_sub(pages),
        }
    }

    /// Redraw every page that has a target.
    pub fn render(&mut self) {
        if !self.initialized || self.targets.is_empty() {
            return;
        }
        let chars: Vec<char> = self.table.get_text().chars().collect();
        let input = SceneInput {
            layout: &self.layout,
            chars: &chars,
            styles: &self.styles,
            selection: self.selection.selection(),
            caret: self.cursor.caret_geometry(&self.layout, self.cursor.position()),
            theme: self.config.theme,
        };
        let pages = self.layout.page_count();
        for (page_index, target) in self.targets.iter_mut().enumerate().take(pages) {
            build_page_scene(&input, page_index).replay(target.as_mut());
        }
    }

    /// Handle a key press. Returns whether the event was consumed.
    pub fn handle_key_down(&mut self, event: KeyEvent) -> bool {
        if self.disposed {
            return false;
        }
        match self.dispatch_key(event) {
            Ok(consumed) => consumed,
            Err(err) => {
                tracing::error!(error = %err, key = ?event.key, "key event failed");
                false
            }
        }
    }

    fn dispatch_key(&mut self, event: KeyEvent) -> Result<bool, EditorError> {
        let modifiers = event.modifiers;
        match event.key {
            Key::Char(ch) if modifiers.command() => Ok(self.handle_shortcut(ch, modifiers)),
            Key::Char('\r') | Key::Char('\n') | Key::Enter => {
                self.insert_text("\n")?;
                Ok(true)
            }
            Key::Char('\t') | Key::Tab => {
                self.insert_text("\t")?;
                Ok(true)
            }
            Key::Char(ch) if ch.is_control() => Ok(false),
            Key::Char(ch) => {
                self.insert_text(ch.encode_utf8(&mut [0; 4]))?;
                Ok(true)
            }
            Key::Backspace => self.backspace(),
            Key::Delete => self.delete_forward(),
            Key::Escape => Ok(self.clear_selection()),
            Key::Left | Key::Right | Key::Up | Key::Down | Key::Home | Key::End => {
                Ok(self.navigate(event.key, modifiers))
            }
        }
    }

    fn handle_shortcut(&mut self, ch: char, modifiers: Modifiers) -> bool {
        match (ch.to_ascii_lowercase(), modifiers.shift) {
            ('a', false) => {
                self.select_all();
                true
            }
            ('b', false) => self.toggle_bold(),
            ('i', false) => self.toggle_italic(),
            ('u', false) => self.toggle_underline(),
            ('x', true) => self.toggle_strikethrough(),
            _ => false,
        }
    }

    fn navigate(&mut self, key: Key, modifiers: Modifiers) -> bool {
        let before = self.view_state();
        let len = self.table.len();
        let previous = self.cursor.position();

        if modifiers.shift {
            self.move_caret(key, modifiers.command());
            self.selection
                .extend_selection(previous, self.cursor.position());
        } else {
            let collapsed = match key {
                Key::Left => self.selection.handle_move_left_with_selection(
                    &mut self.cursor,
                    &self.layout,
                    len,
                ),
                Key::Right => self.selection.handle_move_right_with_selection(
                    &mut self.cursor,
                    &self.layout,
                    len,
                ),
                _ => false,
            };
            if !collapsed {
                self.selection.clear_selection();
                self.move_caret(key, modifiers.command());
            }
        }

        self.pending = None;
        self.finish(before);
        true
    }

    fn move_caret(&mut self, key: Key, by_word: bool) {
        let len = self.table.len();
        let layout = &self.layout;
        match key {
            Key::Left if by_word => {
                let text = self.table.get_text();
                self.cursor.move_word_left(layout, &text);
            }
            Key::Right if by_word => {
                let text = self.table.get_text();
                self.cursor.move_word_right(layout, &text);
            }
            Key::Left => {
                self.cursor.move_left(layout, len);
            }
            Key::Right => {
                self.cursor.move_right(layout, len);
            }
            Key::Up => {
                self.cursor.move_up(layout, len);
            }
            Key::Down => {
                self.cursor.move_down(layout, len);
            }
            Key::Home if by_word => {
                self.cursor.set_cursor_position(layout, 0, len);
            }
            Key::End if by_word => {
                self.cursor.set_cursor_position(layout, len, len);
            }
            Key::Home => {
                self.cursor.move_line_start(layout, len);
            }
            Key::End => {
                self.cursor.move_line_end(layout, len);
            }
            _ => {}
        }
    }

    /// Press at a page point: place the caret and start a drag selection.
    pub fn handle_pointer_down(&mut self, event: PointerEvent) -> bool {
        if self.disposed {
            return false;
        }
        let before = self.view_state();
        let len = self.table.len();
        let hit =
            self.selection
                .start_selection(&mut self.cursor, &self.layout, len, event.point());
        if hit {
            self.pending = None;
        }
        self.finish(before);
        hit
    }

    /// Drag to a page point.
    pub fn handle_pointer_move(&mut self, event: PointerEvent) -> bool {
        if self.disposed || self.selection.state() != SelectionState::Selecting {
            return false;
        }
        let before = self.view_state();
        let len = self.table.len();
        self.selection
            .update_selection(&mut self.cursor, &self.layout, len, event.point());
        self.finish(before);
        true
    }

    /// Release at a page point, ending the drag.
    pub fn handle_pointer_up(&mut self, event: PointerEvent) -> bool {
        if self.disposed || self.selection.state() != SelectionState::Selecting {
            return false;
        }
        let before = self.view_state();
        let len = self.table.len();
        self.selection
            .end_selection(&mut self.cursor, &self.layout, len, event.point());
        self.finish(before);
        true
    }

    /// Select the word under a page point.
    pub fn handle_double_click(&mut self, event: PointerEvent) -> bool {
        if self.disposed {
            return false;
        }
        let before = self.view_state();
        let text = self.table.get_text();
        let selected =
            self.selection
                .select_word_at(&mut self.cursor, &self.layout, &text, event.point());
        if selected {
            self.pending = None;
        }
        self.finish(before);
        selected
    }

    /// Move the caret, clearing any selection. Returns whether the caret moved.
    pub fn set_cursor_position(&mut self, offset: usize) -> bool {
        let before = self.view_state();
        self.selection.clear_selection();
        self.pending = None;
        let len = self.table.len();
        let moved = self.cursor.set_cursor_position(&self.layout, offset, len);
        self.finish(before);
        moved
    }

    /// Select `[anchor, active)` (in either order) and put the caret at `active`.
    pub fn set_selection(&mut self, anchor: usize, active: usize) -> bool {
        let before = self.view_state();
        let len = self.table.len();
        let (anchor, active) = (anchor.min(len), active.min(len));
        self.cursor.set_cursor_position(&self.layout, active, len);
        let changed = self.selection.set_selection(anchor, active);
        self.pending = None;
        self.finish(before);
        changed
    }

    /// Select the whole document (nothing when it is empty).
    pub fn select_all(&mut self) -> bool {
        let before = self.view_state();
        let len = self.table.len();
        let changed = self.selection.select_all(len);
        if self.selection.has_selection() {
            self.cursor.set_cursor_position(&self.layout, len, len);
            self.pending = None;
        }
        self.finish(before);
        changed
    }

    /// Drop the selection. Returns whether one existed.
    pub fn clear_selection(&mut self) -> bool {
        let before = self.view_state();
        let cleared = self.selection.clear_selection();
        self.finish(before);
        cleared
    }

    /// Insert `text` at the caret, replacing the selection. The new characters get the typing
    /// styles; the caret ends after them.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditorError> {
        let text = normalize_breaks(text);
        if text.is_empty() {
            return Ok(());
        }
        let before = self.view_state();

        if let Some(selection) = self.selection.selection() {
            self.remove_range(selection.start, selection.end)?;
            self.selection.clear_selection();
            self.pending = None;
            let len = self.table.len();
            self.cursor
                .set_cursor_position(&self.layout, selection.start, len);
        }

        let pos = self.cursor.position().min(self.table.len());
        let typing = self.typing_styles(pos);
        let inserted = text.chars().count();
        let paragraph = self.paragraph_of(pos)?;

        self.table.insert(pos, &text)?;
        self.styles.shift_for_insertion(pos, inserted);
        self.apply_style_set(pos, pos + inserted, typing);

        let breaks = text.matches(PARAGRAPH_BREAK).count();
        if breaks > 0 {
            let format = self.formats.get(paragraph).copied().unwrap_or_default();
            let at = (paragraph + 1).min(self.formats.len());
            self.formats
                .splice(at..at, std::iter::repeat_n(format, breaks));
        }

        let len = self.table.len();
        self.cursor
            .set_cursor_position(&self.layout, pos + inserted, len);
        tracing::trace!(offset = pos, chars = inserted, "inserted text");

        self.relayout();
        self.finish(before);
        Ok(())
    }

    /// Delete the selection. Returns whether anything was deleted.
    pub fn delete_selection(&mut self) -> Result<bool, EditorError> {
        let Some(selection) = self.selection.selection() else {
            return Ok(false);
        };
        self.delete_range(selection.start, selection.end)?;
        Ok(true)
    }

    /// Delete `[start, end)` (clamped to the document) and put the caret at `start`.
    pub fn delete_range(&mut self, start: usize, end: usize) -> Result<(), EditorError> {
        let len = self.table.len();
        let (start, end) = (start.min(len), end.min(len));
        if start >= end {
            return Ok(());
        }
        let before = self.view_state();
        self.remove_range(start, end)?;
        self.selection.clear_selection();
        self.pending = None;
        let len = self.table.len();
        self.cursor.set_cursor_position(&self.layout, start, len);
        self.relayout();
        self.finish(before);
        Ok(())
    }

    fn backspace(&mut self) -> Result<bool, EditorError> {
        if self.selection.has_selection() {
            return self.delete_selection();
        }
        let pos = self.cursor.position();
        if pos == 0 {
            return Ok(false);
        }
        self.delete_range(pos - 1, pos)?;
        Ok(true)
    }

    fn delete_forward(&mut self) -> Result<bool, EditorError> {
        if self.selection.has_selection() {
            return self.delete_selection();
        }
        let pos = self.cursor.position();
        if pos >= self.table.len() {
            return Ok(false);
        }
        self.delete_range(pos, pos + 1)?;
        Ok(true)
    }

    /// Remove `[start, end)` from storage, styles and paragraph formats. No relayout.
    fn remove_range(&mut self, start: usize, end: usize) -> Result<(), EditorError> {
        let removed = self.table.get_range_text(start, end - start)?;
        let paragraph = self.paragraph_of(start)?;
        self.table.delete(start, end - start)?;
        self.styles.shift_for_deletion(start, end);

        let breaks = removed.matches(PARAGRAPH_BREAK).count();
        if breaks > 0 {
            let from = (paragraph + 1).min(self.formats.len());
            let to = (from + breaks).min(self.formats.len());
            self.formats.drain(from..to);
        }
        tracing::trace!(start, end, "deleted range");
        Ok(())
    }

    /// Paragraph index of `offset`, counted from the text rather than the (possibly stale)
    /// layout.
    fn paragraph_of(&self, offset: usize) -> Result<usize, EditorError> {
        Ok(self
            .table
            .get_range_text(0, offset)?
            .matches(PARAGRAPH_BREAK)
            .count())
    }

    /// Styles inherited by a character typed at `pos`: those of the character before it, or
    /// of the one after it at the document start.
    fn inherited_styles(&self, pos: usize) -> StyleSet {
        if pos > 0 {
            self.styles.styles_at(pos - 1)
        } else if !self.table.is_empty() {
            self.styles.styles_at(0)
        } else {
            StyleSet::default()
        }
    }

    fn typing_styles(&self, pos: usize) -> StyleSet {
        self.pending
            .unwrap_or_else(|| self.inherited_styles(pos))
    }

    /// Make `[start, end)` carry exactly `set`.
    fn apply_style_set(&mut self, start: usize, end: usize, set: StyleSet) {
        let flags = [
            (set.bold, StyleTag::Bold),
            (set.italic, StyleTag::Italic),
            (set.underline, StyleTag::Underline),
            (set.strikethrough, StyleTag::Strikethrough),
        ];
        for (on, tag) in flags {
            if on {
                self.styles.add_style(start, end, tag);
            } else {
                self.styles.remove_style(start, end, tag);
            }
        }
        self.styles
            .remove_style(start, end, StyleTag::Color(Rgb::BLACK));
        if let Some(color) = set.color {
            self.styles.add_style(start, end, StyleTag::Color(color));
        }
    }

    /// Toggle bold on the selection, or for the next typed characters.
    pub fn toggle_bold(&mut self) -> bool {
        self.toggle_style(StyleTag::Bold)
    }

    /// Toggle italic on the selection, or for the next typed characters.
    pub fn toggle_italic(&mut self) -> bool {
        self.toggle_style(StyleTag::Italic)
    }

    /// Toggle underline on the selection, or for the next typed characters.
    pub fn toggle_underline(&mut self) -> bool {
        self.toggle_style(StyleTag::Underline)
    }

    /// Toggle strike-through on the selection, or for the next typed characters.
    pub fn toggle_strikethrough(&mut self) -> bool {
        self.toggle_style(StyleTag::Strikethrough)
    }

    /// With a selection, remove `tag` if it covers the whole selection and apply it
    /// otherwise. Without one, flip it in the pending typing styles.
    fn toggle_style(&mut self, tag: StyleTag) -> bool {
        if self.disposed {
            return false;
        }
        let before = self.view_state();
        match self.selection.selection() {
            Some(selection) => {
                if self.styles.covers(selection.start, selection.end, tag) {
                    self.styles.remove_style(selection.start, selection.end, tag);
                } else {
                    self.styles.add_style(selection.start, selection.end, tag);
                }
                tracing::trace!(
                    ?tag,
                    start = selection.start,
                    end = selection.end,
                    "toggled style"
                );
                if tag.affects_metrics() {
                    self.relayout();
                }
            }
            None => {
                let mut typing = self.typing_styles(self.cursor.position());
                typing.toggle(tag);
                self.pending = Some(typing);
            }
        }
        self.finish(before);
        true
    }

    /// Set (or with `None`, clear) the text color of the selection, or for the next typed
    /// characters.
    pub fn set_color(&mut self, color: Option<Rgb>) -> bool {
        if self.disposed {
            return false;
        }
        let before = self.view_state();
        match self.selection.selection() {
            Some(selection) => {
                self.styles
                    .remove_style(selection.start, selection.end, StyleTag::Color(Rgb::BLACK));
                if let Some(color) = color {
                    self.styles
                        .add_style(selection.start, selection.end, StyleTag::Color(color));
                }
            }
            None => {
                let mut typing = self.typing_styles(self.cursor.position());
                typing.color = color;
                self.pending = Some(typing);
            }
        }
        self.finish(before);
        true
    }

    /// Styles in effect. With a selection, a style counts only if it covers the whole
    /// selection (a color only if one color does). At a bare caret, the styles the next typed
    /// character would get.
    pub fn get_active_styles(&self) -> StyleSet {
        let Some(selection) = self.selection.selection() else {
            return self.typing_styles(self.cursor.position());
        };
        let (start, end) = (selection.start, selection.end);
        let mut set = StyleSet::default();
        for tag in [
            StyleTag::Bold,
            StyleTag::Italic,
            StyleTag::Underline,
            StyleTag::Strikethrough,
        ] {
            if self.styles.covers(start, end, tag) {
                set.insert(tag);
            }
        }
        if let Some(color) = self.styles.styles_at(start).color {
            if self.styles.covers(start, end, StyleTag::Color(color)) {
                set.color = Some(color);
            }
        }
        set
    }

    /// Set the default left and right margins. Returns whether layout changed; margins that
    /// leave no room for text are rejected.
    pub fn set_margins(&mut self, left: f32, right: f32) -> bool {
        if !self.horizontal_fit(left, right) {
            tracing::warn!(left, right, "rejected margins");
            return false;
        }
        let before = self.view_state();
        if !self.engine.set_horizontal_margins(left, right) {
            return false;
        }
        self.config.margins.left = left;
        self.config.margins.right = right;
        self.relayout();
        self.finish(before);
        true
    }

    /// Override the left and right margins of the caret's paragraph, or of every paragraph
    /// the selection touches.
    pub fn set_margins_for_current_paragraph(&mut self, left: f32, right: f32) -> bool {
        if !self.horizontal_fit(left, right) {
            tracing::warn!(left, right, "rejected paragraph margins");
            return false;
        }
        self.update_current_formats(|format| {
            format.left_margin = Some(left);
            format.right_margin = Some(right);
        })
    }

    /// Align the caret's paragraph, or every paragraph the selection touches.
    pub fn set_alignment_for_current_paragraph(&mut self, alignment: Alignment) -> bool {
        self.update_current_formats(|format| format.alignment = alignment)
    }

    /// Replace the format of paragraph `index`.
    pub fn set_paragraph_format(
        &mut self,
        index: usize,
        format: ParagraphFormat,
    ) -> Result<bool, EditorError> {
        let current = self
            .formats
            .get_mut(index)
            .ok_or(EditorError::UnknownParagraph(index))?;
        if *current == format {
            return Ok(false);
        }
        *current = format;
        let before = self.view_state();
        self.relayout();
        self.finish(before);
        Ok(true)
    }

    /// Set the page size. Returns whether layout changed; sizes too small for the current
    /// margins and line height are rejected.
    pub fn set_page_size(&mut self, width: f32, height: f32) -> bool {
        let margins = self.config.margins;
        let fits = width.is_finite()
            && height.is_finite()
            && width > margins.left + margins.right
            && height >= margins.top + margins.bottom + self.config.metrics.line_height;
        if !fits {
            tracing::warn!(width, height, "rejected page size");
            return false;
        }
        let before = self.view_state();
        if !self.engine.set_page_size(width, height) {
            return false;
        }
        self.config.page.width = width;
        self.config.page.height = height;
        self.relayout();
        self.finish(before);
        true
    }

    fn horizontal_fit(&self, left: f32, right: f32) -> bool {
        left.is_finite()
            && right.is_finite()
            && left >= 0.0
            && right >= 0.0
            && left + right < self.config.page.width
    }

    fn current_paragraphs(&self) -> RangeInclusive<usize> {
        match self.selection.selection() {
            Some(selection) => {
                let first = self.layout.paragraph_index_at(selection.start);
                let last = self.layout.paragraph_index_at(selection.end - 1);
                first..=last.max(first)
            }
            None => {
                let index = self.layout.paragraph_index_at(self.cursor.position());
                index..=index
            }
        }
    }

    fn update_current_formats(&mut self, mut update: impl FnMut(&mut ParagraphFormat)) -> bool {
        let before = self.view_state();
        let mut changed = false;
        for index in self.current_paragraphs() {
            if let Some(format) = self.formats.get_mut(index) {
                let old = *format;
                update(format);
                changed |= old != *format;
            }
        }
        if changed {
            self.relayout();
            self.finish(before);
        }
        changed
    }

    /// Build the PDF representation of the current document.
    pub fn export_to_pdf(&self) -> PdfDocument {
        let chars: Vec<char> = self.table.get_text().chars().collect();
        PdfDocument::from_layout(&self.layout, &chars, &self.styles)
    }

    /// Build the DOCX document model of the current document.
    pub fn export_to_docx(&self) -> DocxDocument {
        let chars: Vec<char> = self.table.get_text().chars().collect();
        DocxDocument::from_layout(&self.layout, &chars, &self.styles)
    }

    /// Hand the PDF representation to `sink`.
    pub fn export_pdf_with(&self, sink: &mut dyn PdfSink) -> ExportOutcome {
        let outcome = ExportOutcome::from(sink.write_pdf(&self.export_to_pdf()));
        if !outcome.success {
            tracing::warn!(message = ?outcome.message, "PDF export failed");
        }
        outcome
    }

    /// Hand the DOCX document model to `sink`.
    pub fn export_docx_with(&self, sink: &mut dyn DocxSink) -> ExportOutcome {
        let outcome = ExportOutcome::from(sink.write_docx(&self.export_to_docx()));
        if !outcome.success {
            tracing::warn!(message = ?outcome.message, "DOCX export failed");
        }
        outcome
    }

    fn view_state(&self) -> ViewState {
        ViewState {
            offset: self.cursor.position(),
            structure: self.cursor.structure(),
            selection: self.selection.selection(),
        }
    }

    /// Recompute layout and report a page-count change against the last reported count.
    fn relayout(&mut self) {
        let text = self.table.get_text();
        let paragraphs = paragraph_count(&text);
        if self.formats.len() != paragraphs {
            tracing::error!(
                formats = self.formats.len(),
                paragraphs,
                "paragraph formats out of step with text"
            );
            self.formats.resize(paragraphs, ParagraphFormat::default());
        }

        self.layout = self.engine.layout(&text, &self.styles, &self.formats);
        self.cursor.refresh(&self.layout, self.table.len());

        self.listeners.notify(&EditorEvent::LayoutChanged {
            paragraphs: self.layout.paragraphs.len(),
            lines: self.layout.line_count(),
            pages: self.layout.page_count(),
        });

        let pages = self.layout.page_count();
        if pages != self.emitted_page_count {
            let old = std::mem::replace(&mut self.emitted_page_count, pages);
            tracing::debug!(old, new = pages, "page count changed");
            if self.initialized && !self.targets.is_empty() && self.targets.len() < pages {
                tracing::warn!(
                    pages,
                    targets = self.targets.len(),
                    "fewer render targets than pages; drawing for missing pages is skipped"
                );
            }
            self.listeners
                .notify(&EditorEvent::PageCountChanged { old, new: pages });
        }
    }

    /// Send caret and selection notifications for whatever changed since `before`, then
    /// redraw.
    fn finish(&mut self, before: ViewState) {
        let after = self.view_state();
        if after.offset != before.offset || after.structure != before.structure {
            self.listeners.notify(&EditorEvent::CursorChanged {
                offset: after.offset,
                structure: after.structure,
            });
        }
        if after.selection != before.selection {
            self.listeners.notify(&EditorEvent::SelectionChanged {
                selection: after.selection,
            });
        }
        self.render();
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("len", &self.table.len())
            .field("cursor", &self.cursor.position())
            .field("selection", &self.selection.selection())
            .field("pages", &self.layout.page_count())
            .field("targets", &self.targets.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

fn paragraph_count(text: &str) -> usize {
    text.matches(PARAGRAPH_BREAK).count() + 1
}

fn normalize_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
