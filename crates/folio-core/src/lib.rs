#![warn(missing_docs)]
//! Folio Core - Headless Paged Rich-Text Engine
//!
//! # Overview
//!
//! `folio-core` holds the authoritative text of a word-processor document, tracks
//! per-character formatting ranges, lays the text out into wrapped lines and fixed-height
//! pages, and translates between pixel-space pointer input and document offsets. It decides
//! what each page shows but leaves rasterization, windows and file output to the host.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Editor (input routing, notifications)      │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Page Scenes & Export Representations       │  ← Output
//! ├─────────────────────────────────────────────┤
//! │  Cursor & Selection                         │  ← Pixel / offset mapping
//! ├─────────────────────────────────────────────┤
//! │  Layout Engine (wrap, align, paginate)      │  ← Text Layout
//! ├─────────────────────────────────────────────┤
//! │  Style Interval Tree (red-black, augmented) │  ← Formatting
//! ├─────────────────────────────────────────────┤
//! │  Piece Table Storage                        │  ← Text Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use folio_core::{Editor, EditorEventKind, Key, KeyEvent};
//!
//! let mut editor = Editor::new("");
//! editor.add_listener(EditorEventKind::PageCountChanged, |event| {
//!     println!("{event:?}");
//! });
//!
//! for ch in "Hello".chars() {
//!     editor.handle_key_down(KeyEvent::new(Key::Char(ch)));
//! }
//! assert_eq!(editor.text(), "Hello");
//!
//! editor.set_selection(0, 5);
//! editor.toggle_bold();
//! assert!(editor.get_active_styles().bold);
//! ```
//!
//! # Module Description
//!
//! - [`storage`] - Piece Table text storage layer
//! - [`intervals`] - Style interval tree
//! - [`layout`] - Line wrapping, alignment and pagination
//! - [`cursor`] - Caret position and coordinate mapping
//! - [`selection`] - Selection state machine
//! - [`render`] - Per-page draw scenes and the render target seam
//! - [`export`] - PDF and DOCX representations
//! - [`editor`] - The orchestrator
//!
//! # Unicode Support
//!
//! - Offsets count Unicode scalar values; storage is UTF-8
//! - Advance widths follow UAX #11, so CJK characters take two cells
//! - Word movement and double-click selection use UAX #29 word boundaries

pub mod config;
pub mod cursor;
pub mod editor;
pub mod error;
pub mod events;
pub mod export;
pub mod input;
pub mod intervals;
pub mod layout;
pub mod render;
pub mod selection;
pub mod storage;

pub use config::EditorConfig;
pub use cursor::{CaretGeometry, CursorManager, StructurePosition};
pub use editor::Editor;
pub use error::{BoundsError, ConfigError, EditorError, ExportError, InvariantViolation};
pub use events::{EditorEvent, EditorEventKind, ListenerId, ListenerRegistry};
pub use export::{
    DocxDocument, DocxParagraph, DocxRun, DocxSink, ExportOutcome, PdfDocument, PdfPage,
    PdfSink, PdfTextItem, SinkError,
};
pub use input::{Key, KeyEvent, Modifiers, PointerEvent};
pub use intervals::{Rgb, StyleInterval, StyleIntervalTree, StyleSet, StyleTag};
pub use layout::{
    Alignment, LayoutEngine, LayoutParams, LayoutResult, Line, Margins, PageSetup, Paragraph,
    ParagraphFormat, StyleLookup, TextMetrics,
};
pub use render::{DrawCommand, LinkReport, PageScene, Rect, RenderTarget, RenderTheme};
pub use selection::{Selection, SelectionManager, SelectionState};
pub use storage::PieceTable;
