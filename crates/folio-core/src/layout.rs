//! Paragraph, line and page layout.
//!
//! Turns document text plus a style lookup into paragraphs of wrapped lines, assigns every
//! line a page and a vertical position, and records per-character pixel offsets for hit
//! testing. Character advance widths follow UAX #11 scaled by [`TextMetrics`].
//!
//! Layout output is a pure function of its inputs: the editor recomputes it in full after
//! every text, style or parameter change.

use crate::intervals::{StyleIntervalTree, StyleSet};
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

/// Paragraph break character.
pub const PARAGRAPH_BREAK: char = '\n';

const EPSILON: f32 = 0.001;

/// Page dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    /// Page width.
    pub width: f32,
    /// Page height.
    pub height: f32,
}

impl Default for PageSetup {
    /// A4 at 96 DPI.
    fn default() -> Self {
        Self {
            width: 794.0,
            height: 1123.0,
        }
    }
}

/// Page margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    /// Left margin.
    pub left: f32,
    /// Right margin.
    pub right: f32,
    /// Top margin.
    pub top: f32,
    /// Bottom margin.
    pub bottom: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 72.0,
            right: 72.0,
            top: 72.0,
            bottom: 72.0,
        }
    }
}

/// Glyph metrics used to measure text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMetrics {
    /// Advance of a narrow (single-cell) character.
    pub base_advance: f32,
    /// Height of every line.
    pub line_height: f32,
    /// Advance multiplier for bold text.
    pub bold_scale: f32,
    /// Advance multiplier for italic text.
    pub italic_scale: f32,
    /// Tab stop spacing, in narrow-character cells.
    pub tab_stop: usize,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            base_advance: 8.0,
            line_height: 20.0,
            bold_scale: 1.125,
            italic_scale: 1.0,
            tab_stop: 4,
        }
    }
}

impl TextMetrics {
    /// Pixel advance of `ch` drawn with `styles`, starting `x` pixels into its line.
    pub fn advance(&self, ch: char, styles: &StyleSet, x: f32) -> f32 {
        if ch == '\t' {
            return self.tab_advance(x);
        }

        let mut advance = char_width(ch) as f32 * self.base_advance;
        if styles.bold {
            advance *= self.bold_scale;
        }
        if styles.italic {
            advance *= self.italic_scale;
        }
        advance
    }

    /// Distance from `x` (relative to the line start) to the next tab stop.
    pub fn tab_advance(&self, x: f32) -> f32 {
        let stop = self.base_advance * self.tab_stop.max(1) as f32;
        stop - x % stop
    }
}

/// Calculate cell width of a character (based on UAX #11)
///
/// Return value:
/// - 1: Narrow character (ASCII, etc.)
/// - 2: Wide character (CJK, fullwidth, etc.)
/// - 0: Zero-width character (combining characters, etc.)
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(1)
}

/// Horizontal alignment of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Flush left.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Flush right.
    Right,
    /// Stretched to both edges (last line stays left).
    Justify,
}

/// Per-paragraph formatting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParagraphFormat {
    /// Left margin override.
    pub left_margin: Option<f32>,
    /// Right margin override.
    pub right_margin: Option<f32>,
    /// Alignment.
    pub alignment: Alignment,
}

/// Everything layout needs besides the text and styles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutParams {
    /// Page size.
    pub page: PageSetup,
    /// Document margins.
    pub margins: Margins,
    /// Glyph metrics.
    pub metrics: TextMetrics,
}

/// Source of character styles for layout.
pub trait StyleLookup {
    /// Styles active on the character at `offset`.
    fn styles_at(&self, offset: usize) -> StyleSet;
}

impl StyleLookup for StyleIntervalTree {
    fn styles_at(&self, offset: usize) -> StyleSet {
        StyleIntervalTree::styles_at(self, offset)
    }
}

/// A lookup that reports plain text everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStyles;

impl StyleLookup for PlainStyles {
    fn styles_at(&self, _offset: usize) -> StyleSet {
        StyleSet::default()
    }
}

/// One wrapped line of a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Start offset relative to the paragraph.
    pub offset: usize,
    /// Length in characters, trailing whitespace included.
    pub length: usize,
    /// Width of the whole line, trailing whitespace included.
    pub pixel_length: f32,
    /// Width up to the last visible character.
    pub content_pixel_length: f32,
    /// Start of each word, relative to the line start.
    pub word_pixel_offsets: Vec<f32>,
    /// Left edge of every character boundary (`length + 1` entries), relative to the line start.
    pub char_pixel_offsets: Vec<f32>,
    /// Whether the line ends in whitespace (the wrap point follows a space or tab).
    pub ends_with_whitespace: bool,
    /// Page-space x of the line start (margin plus alignment offset).
    pub x_offset: f32,
    /// Page-space y of the top of the line.
    pub y: f32,
    /// Page the line is placed on.
    pub page_index: usize,
}

impl Line {
    /// Offset just past the last character, relative to the paragraph.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Pixel position of the boundary before `character_index`, relative to the line start.
    pub fn x_for_char(&self, character_index: usize) -> f32 {
        let idx = character_index.min(self.length);
        self.char_pixel_offsets.get(idx).copied().unwrap_or(0.0)
    }

    /// Nearest character boundary to `x` (relative to the line start). An exact midpoint
    /// resolves to the following boundary.
    pub fn char_index_at_x(&self, x: f32) -> usize {
        let offsets = &self.char_pixel_offsets;
        // First boundary strictly to the right of x.
        let right = offsets.partition_point(|&edge| edge <= x);
        if right == 0 {
            return 0;
        }
        if right >= offsets.len() {
            return self.length;
        }
        let left = right - 1;
        let midpoint = (offsets[left] + offsets[right]) / 2.0;
        if x >= midpoint { right } else { left }
    }
}

/// A paragraph of text between paragraph breaks.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// Document offset of the first character.
    pub offset: usize,
    /// Length in characters, excluding the break.
    pub length: usize,
    /// Wrapped lines. Never empty.
    pub lines: Vec<Line>,
    /// Formatting in effect.
    pub format: ParagraphFormat,
}

impl Paragraph {
    /// Document offset just past the last character.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Address of a line inside a [`LayoutResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLocation {
    /// Paragraph index.
    pub paragraph_index: usize,
    /// Line index within the paragraph.
    pub line_index: usize,
}

/// Full layout of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    /// Paragraphs in document order. Never empty.
    pub paragraphs: Vec<Paragraph>,
    /// Number of pages, at least one.
    pub page_count: usize,
    /// Height of every line.
    pub line_height: f32,
    /// Page size used.
    pub page: PageSetup,
    /// Document margins used.
    pub margins: Margins,
}

impl LayoutResult {
    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Look up a line.
    pub fn line(&self, location: LineLocation) -> Option<&Line> {
        self.paragraphs
            .get(location.paragraph_index)?
            .lines
            .get(location.line_index)
    }

    /// Lines placed on `page_index`, top to bottom.
    pub fn lines_on_page(&self, page_index: usize) -> Vec<LineLocation> {
        let mut out = Vec::new();
        for (paragraph_index, paragraph) in self.paragraphs.iter().enumerate() {
            for (line_index, line) in paragraph.lines.iter().enumerate() {
                if line.page_index == page_index {
                    out.push(LineLocation {
                        paragraph_index,
                        line_index,
                    });
                } else if line.page_index > page_index {
                    return out;
                }
            }
        }
        out
    }

    /// Total number of lines across all paragraphs.
    pub fn line_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.lines.len()).sum()
    }

    /// Index of the paragraph containing `offset`. An offset at a paragraph's end (just before
    /// its break) belongs to that paragraph.
    pub fn paragraph_index_at(&self, offset: usize) -> usize {
        let idx = self.paragraphs.partition_point(|p| p.end() < offset);
        idx.min(self.paragraphs.len().saturating_sub(1))
    }
}

/// Layout engine - owns layout parameters and produces [`LayoutResult`]s.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    params: LayoutParams,
}

impl LayoutEngine {
    /// Create a new layout engine
    pub fn new(params: LayoutParams) -> Self {
        Self { params }
    }

    /// Current parameters.
    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Set the default left/right margins. Returns whether anything changed.
    pub fn set_horizontal_margins(&mut self, left: f32, right: f32) -> bool {
        let changed = self.params.margins.left != left || self.params.margins.right != right;
        self.params.margins.left = left;
        self.params.margins.right = right;
        changed
    }

    /// Set the page size. Returns whether anything changed.
    pub fn set_page_size(&mut self, width: f32, height: f32) -> bool {
        let page = PageSetup { width, height };
        let changed = self.params.page != page;
        self.params.page = page;
        changed
    }

    /// Lay out `text`.
    ///
    /// `formats[i]` applies to paragraph `i`; missing entries use [`ParagraphFormat::default`].
    pub fn layout(
        &self,
        text: &str,
        styles: &dyn StyleLookup,
        formats: &[ParagraphFormat],
    ) -> LayoutResult {
        let mut paragraphs = Vec::new();
        let mut offset = 0usize;

        for (index, paragraph_text) in text.split(PARAGRAPH_BREAK).enumerate() {
            let chars: Vec<char> = paragraph_text.chars().collect();
            let format = formats.get(index).copied().unwrap_or_default();
            let lines = self.wrap_paragraph(&chars, offset, styles, &format);
            paragraphs.push(Paragraph {
                offset,
                length: chars.len(),
                lines,
                format,
            });
            offset += chars.len() + 1;
        }

        let page_count = self.paginate(&mut paragraphs);

        tracing::debug!(
            paragraphs = paragraphs.len(),
            pages = page_count,
            "layout recomputed"
        );

        LayoutResult {
            paragraphs,
            page_count,
            line_height: self.params.metrics.line_height,
            page: self.params.page,
            margins: self.params.margins,
        }
    }

    fn horizontal_margins(&self, format: &ParagraphFormat) -> (f32, f32) {
        (
            format.left_margin.unwrap_or(self.params.margins.left),
            format.right_margin.unwrap_or(self.params.margins.right),
        )
    }

    fn wrap_paragraph(
        &self,
        chars: &[char],
        paragraph_offset: usize,
        styles: &dyn StyleLookup,
        format: &ParagraphFormat,
    ) -> Vec<Line> {
        let metrics = &self.params.metrics;
        let (left, right) = self.horizontal_margins(format);
        let available = (self.params.page.width - left - right).max(metrics.base_advance);

        // Tab widths depend on the line they land on; wrap_points settles them.
        let mut advances: Vec<f32> = chars
            .iter()
            .enumerate()
            .map(|(i, ch)| metrics.advance(*ch, &styles.styles_at(paragraph_offset + i), 0.0))
            .collect();

        let breaks = wrap_points(
            chars,
            &mut advances,
            |x| metrics.tab_advance(x),
            available,
            self.params.page.width,
        );
        let line_count = breaks.len() + 1;
        let mut lines = Vec::with_capacity(line_count);
        let mut start = 0usize;
        for (i, end) in breaks
            .iter()
            .copied()
            .chain(std::iter::once(chars.len()))
            .enumerate()
        {
            let mut line = build_line(chars, &advances, start, end);
            let is_last = i + 1 == line_count;
            apply_alignment(&mut line, format.alignment, available, is_last);
            line.x_offset += left;
            lines.push(line);
            start = end;
        }
        lines
    }

    /// Assign pages and vertical positions. Returns the page count.
    ///
    /// Lines are never split across pages: a page takes `floor(available / line_height)` lines
    /// (at least one), so the count can exceed `ceil(content height / available height)` when
    /// the available height is not a multiple of the line height.
    fn paginate(&self, paragraphs: &mut [Paragraph]) -> usize {
        let line_height = self.params.metrics.line_height;
        let top = self.params.margins.top;
        let available = self.params.page.height - top - self.params.margins.bottom;

        let mut page = 0usize;
        let mut y = 0.0f32;
        for line in paragraphs.iter_mut().flat_map(|p| p.lines.iter_mut()) {
            if y > 0.0 && y + line_height > available + EPSILON {
                page += 1;
                y = 0.0;
            }
            line.page_index = page;
            line.y = top + y;
            y += line_height;
        }
        page + 1
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutParams::default())
    }
}

/// Character indices where new lines start.
///
/// Greedy word wrap: a word is a run of non-whitespace plus the whitespace after it, and only
/// its visible part has to fit. A word wider than the line is placed alone; one wider than
/// the whole page is broken between characters.
///
/// Tab advances in `advances` are rewritten with `tab_advance(x)`, where `x` is measured from
/// the start of the line the tab ends up on.
pub fn wrap_points(
    chars: &[char],
    advances: &mut [f32],
    tab_advance: impl Fn(f32) -> f32,
    available: f32,
    page_width: f32,
) -> Vec<usize> {
    let mut breaks = Vec::new();
    let mut line_start = 0usize;
    let mut line_width = 0.0f32;
    let mut i = 0usize;

    while i < chars.len() {
        let word_start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        let visible_end = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let word_end = i;

        let visible: f32 = advances[word_start..visible_end].iter().sum();

        if line_start < word_start && line_width + visible > available + EPSILON {
            breaks.push(word_start);
            line_start = word_start;
            line_width = 0.0;
        }

        if line_start == word_start && visible > page_width + EPSILON {
            let mut width = 0.0f32;
            for k in word_start..visible_end {
                if k > line_start && width + advances[k] > available + EPSILON {
                    breaks.push(k);
                    line_start = k;
                    width = 0.0;
                }
                width += advances[k];
            }
            line_width = width;
        } else {
            line_width += visible;
        }

        for k in visible_end..word_end {
            if chars[k] == '\t' {
                advances[k] = tab_advance(line_width);
            }
            line_width += advances[k];
        }
    }

    breaks
}

fn build_line(chars: &[char], advances: &[f32], start: usize, end: usize) -> Line {
    let mut char_pixel_offsets = Vec::with_capacity(end - start + 1);
    let mut word_pixel_offsets = Vec::new();
    let mut x = 0.0f32;
    let mut content_pixel_length = 0.0f32;

    for k in start..end {
        let starts_word =
            !chars[k].is_whitespace() && (k == start || chars[k - 1].is_whitespace());
        if starts_word {
            word_pixel_offsets.push(x);
        }
        char_pixel_offsets.push(x);
        x += advances[k];
        if !chars[k].is_whitespace() {
            content_pixel_length = x;
        }
    }
    char_pixel_offsets.push(x);

    Line {
        offset: start,
        length: end - start,
        pixel_length: x,
        content_pixel_length,
        word_pixel_offsets,
        char_pixel_offsets,
        ends_with_whitespace: end > start && chars[end - 1].is_whitespace(),
        x_offset: 0.0,
        y: 0.0,
        page_index: 0,
    }
}

/// Position a line horizontally. Only offsets change; the line's characters stay put.
fn apply_alignment(line: &mut Line, alignment: Alignment, available: f32, is_last: bool) {
    let free = (available - line.content_pixel_length).max(0.0);
    match alignment {
        Alignment::Left => {}
        Alignment::Center => line.x_offset = free / 2.0,
        Alignment::Right => line.x_offset = free,
        Alignment::Justify => {
            let gaps = line.word_pixel_offsets.len().saturating_sub(1);
            if is_last || gaps == 0 || free <= 0.0 {
                return;
            }
            let extra = free / gaps as f32;
            let word_starts: Vec<f32> = line.word_pixel_offsets[1..].to_vec();
            // Every boundary at or past the n-th gap moves right by n * extra.
            for edge in line.char_pixel_offsets.iter_mut() {
                let shifted_gaps = word_starts.iter().filter(|w| **w <= *edge).count();
                *edge += extra * shifted_gaps as f32;
            }
            for (n, word) in line.word_pixel_offsets.iter_mut().enumerate() {
                *word += extra * n as f32;
            }
            line.content_pixel_length += free;
            line.pixel_length += extra * gaps as f32;
        }
    }
}
