//! Coordinate mapping validation tests
//!
//! Validation criteria:
//! 1. Round trip: offset -> caret rectangle -> pixel hit -> structure -> offset returns the
//!    starting offset for every caret position, across wrapped lines, alignments and pages.
//! 2. Structure round trip: linear -> structure -> linear is the identity.
//! 3. Clicks outside the text are rejected unless they place the caret.

use folio_core::layout::PlainStyles;
use folio_core::{
    Alignment, CursorManager, LayoutEngine, LayoutParams, LayoutResult, Margins, PageSetup,
    ParagraphFormat, StyleIntervalTree, StyleTag, TextMetrics,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn params() -> LayoutParams {
    LayoutParams {
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
    }
}

fn random_document(rng: &mut StdRng) -> String {
    const WORDS: &[&str] = &["paged", "text", "中文", "wrap", "a", "layout", "engine"];
    let mut text = String::new();
    for paragraph in 0..12 {
        if paragraph > 0 {
            text.push('\n');
        }
        for word in 0..rng.gen_range(0..25) {
            if word > 0 {
                text.push(' ');
            }
            text.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
        }
    }
    text
}

fn assert_round_trip(layout: &LayoutResult, len: usize) {
    let cursor = CursorManager::new();
    for offset in 0..=len {
        let caret = cursor
            .caret_geometry(layout, offset)
            .unwrap_or_else(|| panic!("no caret for offset {offset}"));
        let hit = cursor
            .map_pixel_coordinate_to_structure(
                layout,
                caret.x,
                caret.y + caret.height / 2.0,
                caret.page_index,
                true,
            )
            .unwrap_or_else(|| panic!("caret point of offset {offset} missed"));
        assert_eq!(
            cursor.map_structure_to_linear(layout, &hit),
            offset,
            "round trip through {caret:?}"
        );
    }
}

#[test]
fn test_pixel_round_trip_plain_documents() {
    let mut rng = StdRng::seed_from_u64(11);
    let engine = LayoutEngine::new(params());

    for _ in 0..10 {
        let text = random_document(&mut rng);
        let layout = engine.layout(&text, &PlainStyles, &[]);
        assert!(layout.page_count() >= 1);
        assert_round_trip(&layout, text.chars().count());
    }
}

#[test]
fn test_pixel_round_trip_with_alignment_and_styles() {
    let mut rng = StdRng::seed_from_u64(12);
    let engine = LayoutEngine::new(params());
    let alignments = [
        Alignment::Left,
        Alignment::Center,
        Alignment::Right,
        Alignment::Justify,
    ];

    for _ in 0..10 {
        let text = random_document(&mut rng);
        let len = text.chars().count();
        let formats: Vec<ParagraphFormat> = (0..12)
            .map(|i| ParagraphFormat {
                alignment: alignments[i % alignments.len()],
                left_margin: (i % 3 == 0).then_some(40.0),
                ..ParagraphFormat::default()
            })
            .collect();
        let mut styles = StyleIntervalTree::new();
        for _ in 0..5 {
            if len < 2 {
                break;
            }
            let start = rng.gen_range(0..len - 1);
            let end = rng.gen_range(start + 1..=len);
            styles.add_style(start, end, StyleTag::Bold);
        }

        let layout = engine.layout(&text, &styles, &formats);
        assert_round_trip(&layout, len);
    }
}

#[test]
fn test_structure_round_trip_is_identity() {
    let mut rng = StdRng::seed_from_u64(13);
    let engine = LayoutEngine::new(params());
    let text = random_document(&mut rng);
    let layout = engine.layout(&text, &PlainStyles, &[]);
    let cursor = CursorManager::new();

    for offset in 0..=text.chars().count() {
        let structure = cursor.map_linear_to_structure(&layout, offset);
        assert_eq!(cursor.map_structure_to_linear(&layout, &structure), offset);
    }
}

#[test]
fn test_long_document_spans_pages() {
    let engine = LayoutEngine::new(params());
    // 8 lines fit between the vertical margins of a 200 px page.
    let text = vec!["line"; 20].join("\n");
    let layout = engine.layout(&text, &PlainStyles, &[]);

    assert_eq!(layout.page_count(), 3);
    assert_eq!(layout.lines_on_page(0).len(), 8);
    assert_eq!(layout.lines_on_page(2).len(), 4);
    assert_round_trip(&layout, text.chars().count());
}

#[test]
fn test_points_outside_text() {
    let engine = LayoutEngine::new(params());
    let layout = engine.layout("hello\nworld", &PlainStyles, &[]);
    let cursor = CursorManager::new();

    // Left margin, right of the text, below the last line, and a page that does not exist.
    assert!(cursor.map_pixel_coordinate_to_structure(&layout, 5.0, 30.0, 0, false).is_none());
    assert!(cursor.map_pixel_coordinate_to_structure(&layout, 150.0, 30.0, 0, false).is_none());
    assert!(cursor.map_pixel_coordinate_to_structure(&layout, 30.0, 150.0, 0, false).is_none());
    assert!(cursor.map_pixel_coordinate_to_structure(&layout, 30.0, 30.0, 4, true).is_none());

    // For caret placement the same clicks snap to the nearest line end.
    let hit = cursor
        .map_pixel_coordinate_to_structure(&layout, 150.0, 30.0, 0, true)
        .unwrap();
    assert_eq!(cursor.map_structure_to_linear(&layout, &hit), 5);
    let hit = cursor
        .map_pixel_coordinate_to_structure(&layout, 5.0, 150.0, 0, true)
        .unwrap();
    assert_eq!(cursor.map_structure_to_linear(&layout, &hit), 6);
}
