//! Export representations.
//!
//! Neither format is written to bytes here. [`PdfDocument`] is a positioned, per-page
//! representation (with an XML markup form) for an external PDF renderer; [`DocxDocument`] is
//! a paragraph/run model for an external document builder. Hosts that own those collaborators
//! implement [`PdfSink`] / [`DocxSink`] and get an [`ExportOutcome`] back instead of an error.

use crate::error::ExportError;
use crate::intervals::StyleSet;
use crate::layout::{Alignment, LayoutResult, Margins, StyleLookup};
use crate::render::{DrawCommand, RenderTheme, SceneInput, build_page_scene};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use std::error::Error;

/// PDF points per layout pixel (96 DPI to 72 DPI).
pub const POINTS_PER_PIXEL: f32 = 0.75;

/// DOCX twips per layout pixel.
pub const TWIPS_PER_PIXEL: f32 = 15.0;

/// Positioned text for one PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfTextItem {
    /// Left edge, points.
    pub x: f32,
    /// Top of the line box, points.
    pub y: f32,
    /// Text content.
    pub text: String,
    /// Font size, points.
    pub font_size: f32,
    /// Applied styles.
    pub styles: StyleSet,
}

/// A horizontal rule (underline or strike-through) on a PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRule {
    /// Start x, points.
    pub x1: f32,
    /// End x, points.
    pub x2: f32,
    /// Vertical position, points.
    pub y: f32,
    /// `#rrggbb`.
    pub color: String,
}

/// One PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    /// Zero-based page index.
    pub index: usize,
    /// Width, points.
    pub width: f32,
    /// Height, points.
    pub height: f32,
    /// Text items in reading order.
    pub items: Vec<PdfTextItem>,
    /// Decoration rules.
    pub rules: Vec<PdfRule>,
}

/// Intermediate representation for PDF output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfDocument {
    /// Pages, in order.
    pub pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Build from a layout. Every page is present, even if empty.
    pub fn from_layout(layout: &LayoutResult, chars: &[char], styles: &dyn StyleLookup) -> Self {
        let theme = RenderTheme::default();
        let input = SceneInput {
            layout,
            chars,
            styles,
            selection: None,
            caret: None,
            theme,
        };
        let font_size = layout.line_height * POINTS_PER_PIXEL * 0.8;

        let pages = (0..layout.page_count())
            .map(|index| {
                let scene = build_page_scene(&input, index);
                let mut items = Vec::new();
                let mut rules = Vec::new();
                for command in scene.commands {
                    match command {
                        DrawCommand::Text { x, y, text, styles } => items.push(PdfTextItem {
                            x: x * POINTS_PER_PIXEL,
                            y: y * POINTS_PER_PIXEL,
                            text,
                            font_size,
                            styles,
                        }),
                        DrawCommand::Rule { x1, x2, y, color } => rules.push(PdfRule {
                            x1: x1 * POINTS_PER_PIXEL,
                            x2: x2 * POINTS_PER_PIXEL,
                            y: y * POINTS_PER_PIXEL,
                            color: color.to_hex(),
                        }),
                        DrawCommand::FillRect { .. } | DrawCommand::Caret { .. } => {}
                    }
                }
                PdfPage {
                    index,
                    width: layout.page.width * POINTS_PER_PIXEL,
                    height: layout.page.height * POINTS_PER_PIXEL,
                    items,
                    rules,
                }
            })
            .collect();

        Self { pages }
    }

    /// Structured XML markup of the document.
    ///
    /// ```text
    /// <document pages="1">
    ///   <page index="0" width="595.5" height="842.25">
    ///     <text x="54" y="54" size="12" style="font-weight:bold">Hello</text>
    ///     <rule x1="54" x2="90" y="67.5" color="#000000"/>
    ///   </page>
    /// </document>
    /// ```
    pub fn to_markup(&self) -> Result<String, ExportError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let pages = self.pages.len().to_string();
        let mut document = BytesStart::new("document");
        document.push_attribute(("pages", pages.as_str()));
        writer.write_event(Event::Start(document))?;

        for page in &self.pages {
            let index = page.index.to_string();
            let width = page.width.to_string();
            let height = page.height.to_string();
            let mut start = BytesStart::new("page");
            start.push_attribute(("index", index.as_str()));
            start.push_attribute(("width", width.as_str()));
            start.push_attribute(("height", height.as_str()));
            writer.write_event(Event::Start(start))?;

            for item in &page.items {
                let x = item.x.to_string();
                let y = item.y.to_string();
                let size = item.font_size.to_string();
                let style = css_style(&item.styles);
                let mut text = BytesStart::new("text");
                text.push_attribute(("x", x.as_str()));
                text.push_attribute(("y", y.as_str()));
                text.push_attribute(("size", size.as_str()));
                if !style.is_empty() {
                    text.push_attribute(("style", style.as_str()));
                }
                writer.write_event(Event::Start(text))?;
                writer.write_event(Event::Text(BytesText::new(&item.text)))?;
                writer.write_event(Event::End(BytesEnd::new("text")))?;
            }

            for rule in &page.rules {
                let x1 = rule.x1.to_string();
                let x2 = rule.x2.to_string();
                let y = rule.y.to_string();
                let mut element = BytesStart::new("rule");
                element.push_attribute(("x1", x1.as_str()));
                element.push_attribute(("x2", x2.as_str()));
                element.push_attribute(("y", y.as_str()));
                element.push_attribute(("color", rule.color.as_str()));
                writer.write_event(Event::Empty(element))?;
            }

            writer.write_event(Event::End(BytesEnd::new("page")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("document")))?;
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

fn css_style(styles: &StyleSet) -> String {
    let mut parts = Vec::new();
    if styles.bold {
        parts.push("font-weight:bold".to_string());
    }
    if styles.italic {
        parts.push("font-style:italic".to_string());
    }
    match (styles.underline, styles.strikethrough) {
        (true, true) => parts.push("text-decoration:underline line-through".to_string()),
        (true, false) => parts.push("text-decoration:underline".to_string()),
        (false, true) => parts.push("text-decoration:line-through".to_string()),
        (false, false) => {}
    }
    if let Some(color) = styles.color {
        parts.push(format!("color:{}", color.to_hex()));
    }
    parts.join(";")
}

/// A run of identically styled text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocxRun {
    /// Text content.
    pub text: String,
    /// Bold.
    pub bold: bool,
    /// Italic.
    pub italic: bool,
    /// Underline.
    pub underline: bool,
    /// Strike-through.
    pub strike: bool,
    /// `rrggbb` without the hash, as DOCX expects.
    pub color: Option<String>,
}

/// One DOCX paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocxParagraph {
    /// Alignment.
    pub alignment: Alignment,
    /// Left indent relative to the page margin, twips.
    pub indent_left: i32,
    /// Right indent relative to the page margin, twips.
    pub indent_right: i32,
    /// Runs in order. Empty for an empty paragraph.
    pub runs: Vec<DocxRun>,
}

/// Section geometry, twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocxSection {
    /// Page width.
    pub page_width: i32,
    /// Page height.
    pub page_height: i32,
    /// Left margin.
    pub margin_left: i32,
    /// Right margin.
    pub margin_right: i32,
    /// Top margin.
    pub margin_top: i32,
    /// Bottom margin.
    pub margin_bottom: i32,
}

/// Structured document for DOCX output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocxDocument {
    /// Page setup.
    pub section: DocxSection,
    /// Paragraphs, in order.
    pub paragraphs: Vec<DocxParagraph>,
}

fn twips(pixels: f32) -> i32 {
    (pixels * TWIPS_PER_PIXEL).round() as i32
}

impl DocxDocument {
    /// Build from a layout's paragraph structure.
    pub fn from_layout(layout: &LayoutResult, chars: &[char], styles: &dyn StyleLookup) -> Self {
        let margins: Margins = layout.margins;
        let section = DocxSection {
            page_width: twips(layout.page.width),
            page_height: twips(layout.page.height),
            margin_left: twips(margins.left),
            margin_right: twips(margins.right),
            margin_top: twips(margins.top),
            margin_bottom: twips(margins.bottom),
        };

        let paragraphs = layout
            .paragraphs
            .iter()
            .map(|paragraph| {
                let mut runs: Vec<(StyleSet, String)> = Vec::new();
                for offset in paragraph.offset..paragraph.end() {
                    let Some(ch) = chars.get(offset).copied() else {
                        break;
                    };
                    let style = styles.styles_at(offset);
                    match runs.last_mut() {
                        Some((current, text)) if *current == style => text.push(ch),
                        _ => runs.push((style, ch.to_string())),
                    }
                }
                let format = paragraph.format;
                DocxParagraph {
                    alignment: format.alignment,
                    indent_left: format
                        .left_margin
                        .map_or(0, |m| twips(m - margins.left)),
                    indent_right: format
                        .right_margin
                        .map_or(0, |m| twips(m - margins.right)),
                    runs: runs
                        .into_iter()
                        .map(|(style, text)| DocxRun {
                            text,
                            bold: style.bold,
                            italic: style.italic,
                            underline: style.underline,
                            strike: style.strikethrough,
                            color: style
                                .color
                                .map(|c| c.to_hex().trim_start_matches('#').to_string()),
                        })
                        .collect(),
                }
            })
            .collect();

        Self {
            section,
            paragraphs,
        }
    }

    /// Plain text, one line per paragraph.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.runs.iter().map(|r| r.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Error type returned by export collaborators.
pub type SinkError = Box<dyn Error + Send + Sync>;

/// Consumer of the PDF representation (a byte renderer, a file writer).
pub trait PdfSink {
    /// Produce output for `document`.
    fn write_pdf(&mut self, document: &PdfDocument) -> Result<(), SinkError>;
}

/// Consumer of the DOCX representation.
pub trait DocxSink {
    /// Produce output for `document`.
    fn write_docx(&mut self, document: &DocxDocument) -> Result<(), SinkError>;
}

/// Result of handing an export to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    /// Whether the sink succeeded.
    pub success: bool,
    /// Failure description.
    pub message: Option<String>,
}

impl ExportOutcome {
    /// A successful export.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A failed export.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<Result<(), SinkError>> for ExportOutcome {
    fn from(result: Result<(), SinkError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervals::{Rgb, StyleIntervalTree, StyleTag};
    use crate::layout::{LayoutEngine, LayoutParams, PageSetup, ParagraphFormat, TextMetrics};

    fn params() -> LayoutParams {
        LayoutParams {
            page: PageSetup {
                width: 200.0,
                height: 100.0,
            },
            margins: Margins {
                left: 20.0,
                right: 20.0,
                top: 20.0,
                bottom: 20.0,
            },
            metrics: TextMetrics {
                base_advance: 10.0,
                line_height: 20.0,
                ..TextMetrics::default()
            },
        }
    }

    #[test]
    fn test_pdf_pages_and_items() {
        let text = "one\ntwo\nthree\nfour";
        let chars: Vec<char> = text.chars().collect();
        let mut tree = StyleIntervalTree::new();
        tree.add_style(4, 7, StyleTag::Bold);
        let layout = LayoutEngine::new(params()).layout(text, &tree, &[]);
        assert_eq!(layout.page_count(), 2);

        let pdf = PdfDocument::from_layout(&layout, &chars, &tree);
        assert_eq!(pdf.pages.len(), 2);
        assert_eq!(pdf.pages[0].width, 150.0);
        let texts: Vec<&str> = pdf.pages[0].items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(pdf.pages[0].items[1].styles.bold);
        assert_eq!(pdf.pages[1].items[0].text, "four");
        assert_eq!(pdf.pages[1].items[0].y, 15.0);
    }

    #[test]
    fn test_pdf_markup_escapes_text() {
        let text = "a<b & c";
        let chars: Vec<char> = text.chars().collect();
        let mut tree = StyleIntervalTree::new();
        tree.add_style(0, 1, StyleTag::Underline);
        let layout = LayoutEngine::new(params()).layout(text, &tree, &[]);
        let markup = PdfDocument::from_layout(&layout, &chars, &tree)
            .to_markup()
            .unwrap();
        assert!(markup.starts_with("<document pages=\"1\">"));
        assert!(markup.contains(">&lt;b </text>"));
        assert!(markup.contains("&amp;"));
        assert!(markup.contains("style=\"text-decoration:underline\""));
        assert!(markup.contains("<rule "));
    }

    #[test]
    fn test_docx_runs_and_indents() {
        let text = "plain bold\n\nred";
        let chars: Vec<char> = text.chars().collect();
        let mut tree = StyleIntervalTree::new();
        tree.add_style(6, 10, StyleTag::Bold);
        tree.add_style(12, 15, StyleTag::Color(Rgb::new(255, 0, 0)));
        let formats = [
            ParagraphFormat {
                left_margin: Some(30.0),
                ..ParagraphFormat::default()
            },
            ParagraphFormat::default(),
            ParagraphFormat {
                alignment: Alignment::Center,
                ..ParagraphFormat::default()
            },
        ];
        let layout = LayoutEngine::new(params()).layout(text, &tree, &formats);
        let docx = DocxDocument::from_layout(&layout, &chars, &tree);

        assert_eq!(docx.section.margin_left, 300);
        assert_eq!(docx.paragraphs.len(), 3);
        let first = &docx.paragraphs[0];
        assert_eq!(first.indent_left, 150);
        assert_eq!(first.runs.len(), 2);
        assert_eq!(first.runs[0].text, "plain ");
        assert!(first.runs[1].bold);
        assert!(docx.paragraphs[1].runs.is_empty());
        assert_eq!(docx.paragraphs[2].alignment, Alignment::Center);
        assert_eq!(docx.paragraphs[2].runs[0].color.as_deref(), Some("ff0000"));
        assert_eq!(docx.plain_text(), text);
    }

    #[test]
    fn test_outcome_from_sink_result() {
        assert_eq!(ExportOutcome::from(Ok::<(), SinkError>(())), ExportOutcome::ok());
        let failed = ExportOutcome::from(Err::<(), SinkError>("disk full".into()));
        assert!(!failed.success);
        assert_eq!(failed.message.as_deref(), Some("disk full"));
    }
}
