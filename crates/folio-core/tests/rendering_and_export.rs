//! Rendering and export tests
//!
//! Validation criteria:
//! 1. Linked render targets receive their page's scene; pages without a target are reported
//!    and skipped without failing.
//! 2. Redraws follow edits, selection changes and relinking.
//! 3. PDF and DOCX representations carry text, styles and page geometry, and sink failures
//!    come back as outcomes rather than panics.

use folio_core::{
    Alignment, DocxDocument, DocxSink, Editor, EditorConfig, Margins, PageSetup, PdfDocument,
    PdfSink, Rect, RenderTarget, Rgb, SinkError, StyleInterval, StyleSet, StyleTag, TextMetrics,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records draw calls as short strings.
#[derive(Clone, Default)]
struct RecordingTarget {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingTarget {
    fn boxed(&self) -> Box<dyn RenderTarget> {
        Box::new(self.clone())
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl RenderTarget for RecordingTarget {
    fn begin_page(&mut self, page_index: usize, _page: &PageSetup) {
        self.push(format!("page {page_index}"));
    }

    fn fill_rect(&mut self, _rect: Rect, _color: Rgb) {
        self.push("highlight".to_string());
    }

    fn draw_text(&mut self, _x: f32, _y: f32, text: &str, styles: &StyleSet) {
        let weight = if styles.bold { "bold " } else { "" };
        self.push(format!("{weight}text {text}"));
    }

    fn draw_line(&mut self, _x1: f32, _x2: f32, _y: f32, _color: Rgb) {
        self.push("rule".to_string());
    }

    fn draw_caret(&mut self, _x: f32, _y: f32, _height: f32, _color: Rgb) {
        self.push("caret".to_string());
    }
}

/// 10 px glyphs, 20 px lines, 20 px margins: eight lines per 200 px page.
fn small_pages() -> EditorConfig {
    EditorConfig {
        page: PageSetup {
            width: 300.0,
            height: 200.0,
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
        ..EditorConfig::default()
    }
}

fn three_page_text() -> String {
    (0..20)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_fewer_targets_than_pages() {
    init_tracing();
    let mut editor = Editor::with_config(&three_page_text(), small_pages());
    assert_eq!(editor.page_count(), 3);

    let first = RecordingTarget::default();
    let report = editor.link_canvases(vec![first.boxed()]);
    assert_eq!(report.linked, 1);
    assert_eq!(report.missing_pages, vec![1, 2]);
    assert!(!report.is_complete());

    // Nothing is drawn before initialization.
    assert!(first.take().is_empty());

    editor.initialize();
    let log = first.take();
    assert_eq!(log.first().map(String::as_str), Some("page 0"));
    assert!(log.contains(&"text line ".to_string()));
    assert!(log.contains(&"text 0".to_string()));
    assert!(log.contains(&"caret".to_string()));
    assert!(!log.iter().any(|entry| entry.starts_with("page 1")));

    // Appending targets covers the remaining pages.
    let second = RecordingTarget::default();
    let third = RecordingTarget::default();
    let report = editor.link_canvases(vec![second.boxed(), third.boxed()]);
    assert!(report.is_complete());
    assert_eq!(second.take().first().map(String::as_str), Some("page 1"));
    assert_eq!(third.take().first().map(String::as_str), Some("page 2"));
}

#[test]
fn test_relinking_replaces_targets() {
    let mut editor = Editor::with_config("short", small_pages());
    editor.initialize();

    let old = RecordingTarget::default();
    editor.link_canvases(vec![old.boxed()]);
    old.take();

    let spare = RecordingTarget::default();
    let new = RecordingTarget::default();
    let report = editor.relink_canvases(vec![new.boxed(), spare.boxed()]);
    assert_eq!(report.linked, 1);
    assert_eq!(report.spare_targets, 1);
    assert!(report.is_complete());

    editor.insert_text("!").unwrap();
    assert!(old.take().is_empty());
    assert!(spare.take().is_empty());
    assert!(new.take().contains(&"text !short".to_string()));
}

#[test]
fn test_redraw_shows_selection_and_styles() {
    let mut editor = Editor::with_config("Hello world", small_pages());
    let target = RecordingTarget::default();
    editor.link_canvases(vec![target.boxed()]);
    editor.initialize();
    target.take();

    editor.set_selection(0, 5);
    let log = target.take();
    assert!(log.contains(&"highlight".to_string()));
    assert!(!log.contains(&"caret".to_string()));

    editor.toggle_bold();
    editor.toggle_underline();
    let log = target.take();
    assert!(log.contains(&"bold text Hello".to_string()));
    assert!(log.contains(&"text world".to_string()));
    assert!(log.contains(&"rule".to_string()));

    editor.dispose();
    editor.insert_text("x").unwrap();
    assert!(target.take().is_empty());
}

#[test]
fn test_pages_appearing_while_typing_are_skipped_without_targets() {
    init_tracing();
    let text = vec!["x"; 8].join("\n");
    let mut editor = Editor::with_config(&text, small_pages());
    let target = RecordingTarget::default();
    editor.link_canvases(vec![target.boxed()]);
    editor.initialize();
    assert_eq!(editor.page_count(), 1);

    editor.set_cursor_position(editor.len());
    editor.insert_text("\nnext page").unwrap();
    assert_eq!(editor.page_count(), 2);
    assert_eq!(editor.link_report().missing_pages, vec![1]);

    let log = target.take();
    assert!(log.iter().all(|entry| entry != "page 1"));
    assert!(!log.contains(&"text page".to_string()));
}

#[test]
fn test_pdf_export_carries_styles_and_geometry() {
    let mut editor = Editor::with_styles(
        "Hello world",
        small_pages(),
        [StyleInterval::new(0, 5, StyleTag::Bold)],
    );
    editor.set_selection(6, 11);
    editor.set_color(Some(Rgb::new(0xcc, 0, 0)));

    let pdf: PdfDocument = editor.export_to_pdf();
    assert_eq!(pdf.pages.len(), 1);
    let page = &pdf.pages[0];
    assert_eq!(page.width, 225.0);
    assert_eq!(page.height, 150.0);

    let texts: Vec<&str> = page.items.iter().map(|item| item.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello", "world"]);
    assert!(page.items[0].styles.bold);
    assert_eq!(page.items[0].x, 15.0);
    assert_eq!(page.items[1].styles.color, Some(Rgb::new(0xcc, 0, 0)));

    let markup = pdf.to_markup().unwrap();
    assert!(markup.starts_with("<document pages=\"1\">"));
    assert!(markup.contains("font-weight:bold"));
    assert!(markup.contains("#cc0000"));
}

#[test]
fn test_docx_export_groups_runs_by_style() {
    let mut editor = Editor::with_styles(
        "Title\nBody text",
        small_pages(),
        [StyleInterval::new(0, 5, StyleTag::Bold)],
    );
    editor.set_cursor_position(0);
    editor.set_alignment_for_current_paragraph(Alignment::Center);
    editor.set_cursor_position(8);
    editor.set_margins_for_current_paragraph(50.0, 20.0);

    let docx: DocxDocument = editor.export_to_docx();
    assert_eq!(docx.section.page_width, 4500);
    assert_eq!(docx.section.margin_left, 300);
    assert_eq!(docx.paragraphs.len(), 2);

    let title = &docx.paragraphs[0];
    assert_eq!(title.alignment, Alignment::Center);
    assert_eq!(title.runs.len(), 1);
    assert!(title.runs[0].bold);

    let body = &docx.paragraphs[1];
    assert_eq!(body.indent_left, 450);
    assert_eq!(body.indent_right, 0);
    assert!(!body.runs[0].bold);
    assert_eq!(docx.plain_text(), "Title\nBody text");
}

struct MemorySink {
    pages: usize,
}

impl PdfSink for MemorySink {
    fn write_pdf(&mut self, document: &PdfDocument) -> Result<(), SinkError> {
        self.pages = document.pages.len();
        Ok(())
    }
}

struct OfflineSink;

impl DocxSink for OfflineSink {
    fn write_docx(&mut self, _document: &DocxDocument) -> Result<(), SinkError> {
        Err("document store offline".into())
    }
}

#[test]
fn test_sink_outcomes() {
    init_tracing();
    let editor = Editor::with_config(&three_page_text(), small_pages());

    let mut sink = MemorySink { pages: 0 };
    let outcome = editor.export_pdf_with(&mut sink);
    assert!(outcome.success);
    assert_eq!(outcome.message, None);
    assert_eq!(sink.pages, 3);

    let outcome = editor.export_docx_with(&mut OfflineSink);
    assert!(!outcome.success);
    assert_eq!(outcome.message.as_deref(), Some("document store offline"));
}
