//! Page scenes and render targets.
//!
//! The engine decides what each page shows: selection highlights, styled text runs, underline
//! and strike-through rules, and the caret. [`build_page_scene`] turns a layout into a list of
//! [`DrawCommand`]s per page, and [`PageScene::replay`] feeds them to whatever
//! [`RenderTarget`] the host linked for that page. Rasterization stays on the host side.

use crate::cursor::CaretGeometry;
use crate::intervals::{Rgb, StyleSet};
use crate::layout::{LayoutResult, PageSetup, StyleLookup};
use crate::selection::Selection;
use serde::{Deserialize, Serialize};

/// A drawable surface showing one page.
pub trait RenderTarget {
    /// Start drawing `page_index`; the surface should be cleared.
    fn begin_page(&mut self, page_index: usize, page: &PageSetup);

    /// Fill a rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Draw a run of text whose line box starts at `(x, y)`.
    fn draw_text(&mut self, x: f32, y: f32, text: &str, styles: &StyleSet);

    /// Draw a horizontal rule from `x1` to `x2` at `y`.
    fn draw_line(&mut self, x1: f32, x2: f32, y: f32, color: Rgb);

    /// Draw the caret.
    fn draw_caret(&mut self, x: f32, y: f32, height: f32, color: Rgb);
}

/// Axis-aligned rectangle in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

/// Colors used when building scenes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderTheme {
    /// Selection highlight.
    pub selection: Rgb,
    /// Caret.
    pub caret: Rgb,
    /// Text without a color style.
    pub text: Rgb,
}

impl Default for RenderTheme {
    fn default() -> Self {
        Self {
            selection: Rgb::new(0xb4, 0xd5, 0xfe),
            caret: Rgb::BLACK,
            text: Rgb::BLACK,
        }
    }
}

/// One drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Filled rectangle (selection highlight).
    FillRect {
        /// Area
        rect: Rect,
        /// Fill color
        color: Rgb,
    },
    /// Styled text run.
    Text {
        /// Page-space x of the run start
        x: f32,
        /// Page-space y of the line top
        y: f32,
        /// Run text
        text: String,
        /// Run styles
        styles: StyleSet,
    },
    /// Horizontal rule (underline, strike-through).
    Rule {
        /// Start x
        x1: f32,
        /// End x
        x2: f32,
        /// Vertical position
        y: f32,
        /// Rule color
        color: Rgb,
    },
    /// Caret bar.
    Caret {
        /// Page-space x
        x: f32,
        /// Page-space y of the top
        y: f32,
        /// Height
        height: f32,
        /// Color
        color: Rgb,
    },
}

/// Everything to draw on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScene {
    /// Page index
    pub page_index: usize,
    /// Page dimensions
    pub page: PageSetup,
    /// Commands in paint order
    pub commands: Vec<DrawCommand>,
}

impl PageScene {
    /// Draw this scene onto `target`.
    pub fn replay(&self, target: &mut dyn RenderTarget) {
        target.begin_page(self.page_index, &self.page);
        for command in &self.commands {
            match command {
                DrawCommand::FillRect { rect, color } => target.fill_rect(*rect, *color),
                DrawCommand::Text { x, y, text, styles } => target.draw_text(*x, *y, text, styles),
                DrawCommand::Rule { x1, x2, y, color } => target.draw_line(*x1, *x2, *y, *color),
                DrawCommand::Caret {
                    x,
                    y,
                    height,
                    color,
                } => target.draw_caret(*x, *y, *height, *color),
            }
        }
    }

    /// Text of every run, in paint order.
    pub fn text_runs(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Result of linking render targets to pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Pages that received a target.
    pub linked: usize,
    /// Pages left without a target; drawing for them is skipped.
    pub missing_pages: Vec<usize>,
    /// Targets beyond the last page, kept for when the document grows.
    pub spare_targets: usize,
}

impl LinkReport {
    /// Whether every page has a target.
    pub fn is_complete(&self) -> bool {
        self.missing_pages.is_empty()
    }
}

/// Inputs shared by all pages of one redraw.
pub struct SceneInput<'a> {
    /// Current layout
    pub layout: &'a LayoutResult,
    /// Document characters
    pub chars: &'a [char],
    /// Character styles
    pub styles: &'a dyn StyleLookup,
    /// Current selection
    pub selection: Option<Selection>,
    /// Caret rectangle, drawn only without a selection
    pub caret: Option<CaretGeometry>,
    /// Colors
    pub theme: RenderTheme,
}

/// Build the scene for `page_index`.
pub fn build_page_scene(input: &SceneInput<'_>, page_index: usize) -> PageScene {
    let layout = input.layout;
    let line_height = layout.line_height;
    let mut highlights = Vec::new();
    let mut text = Vec::new();
    let mut rules = Vec::new();

    for location in layout.lines_on_page(page_index) {
        let Some(paragraph) = layout.paragraphs.get(location.paragraph_index) else {
            continue;
        };
        let Some(line) = paragraph.lines.get(location.line_index) else {
            continue;
        };
        let line_start = paragraph.offset + line.offset;
        let line_end = line_start + line.length;

        if let Some(selection) = input.selection {
            let from = selection.start.max(line_start);
            let to = selection.end.min(line_end);
            let covers_break = location.line_index + 1 == paragraph.lines.len()
                && selection.start <= line_end
                && selection.end > line_end;
            if from < to || covers_break {
                let x1 = line.x_offset + line.x_for_char(from.min(line_end) - line_start);
                let mut x2 = line.x_offset + line.x_for_char(to.max(from) - line_start);
                // Show a selected paragraph break as a narrow block after the line.
                if covers_break {
                    x2 += line_height / 4.0;
                }
                highlights.push(DrawCommand::FillRect {
                    rect: Rect {
                        x: x1,
                        y: line.y,
                        width: x2 - x1,
                        height: line_height,
                    },
                    color: input.theme.selection,
                });
            }
        }

        let chars = input.chars.get(line_start..line_end).unwrap_or(&[]);
        for (run_start, run_end, styles) in style_runs(chars, line_start, input.styles) {
            let run_text: String = chars[run_start..run_end].iter().collect();
            if run_text.chars().all(char::is_whitespace) {
                continue;
            }
            let x = line.x_offset + line.x_for_char(run_start);
            text.push(DrawCommand::Text {
                x,
                y: line.y,
                text: run_text,
                styles,
            });

            let visible_end = chars[run_start..run_end]
                .iter()
                .rposition(|c| !c.is_whitespace())
                .map_or(run_start, |p| run_start + p + 1);
            let x2 = line.x_offset + line.x_for_char(visible_end);
            let color = styles.color.unwrap_or(input.theme.text);
            if styles.underline {
                rules.push(DrawCommand::Rule {
                    x1: x,
                    x2,
                    y: line.y + line_height - 2.0,
                    color,
                });
            }
            if styles.strikethrough {
                rules.push(DrawCommand::Rule {
                    x1: x,
                    x2,
                    y: line.y + line_height / 2.0,
                    color,
                });
            }
        }
    }

    let mut commands = highlights;
    commands.extend(text);
    commands.extend(rules);
    if input.selection.is_none() {
        if let Some(caret) = input.caret.filter(|c| c.page_index == page_index) {
            commands.push(DrawCommand::Caret {
                x: caret.x,
                y: caret.y,
                height: caret.height,
                color: input.theme.caret,
            });
        }
    }

    PageScene {
        page_index,
        page: layout.page,
        commands,
    }
}

/// Split a line into runs of equal style, also breaking at every word start so justified
/// spacing and tab stops land where layout put them.
fn style_runs(
    chars: &[char],
    line_start: usize,
    styles: &dyn StyleLookup,
) -> Vec<(usize, usize, StyleSet)> {
    let mut runs: Vec<(usize, usize, StyleSet)> = Vec::new();
    for (i, ch) in chars.iter().enumerate() {
        let style = styles.styles_at(line_start + i);
        let starts_word = i > 0 && !ch.is_whitespace() && chars[i - 1].is_whitespace();
        match runs.last_mut() {
            Some(run) if run.2 == style && !starts_word => run.1 = i + 1,
            _ => runs.push((i, i + 1, style)),
        }
    }
    runs
}
