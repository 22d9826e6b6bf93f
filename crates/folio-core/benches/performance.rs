use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use folio_core::{Editor, StyleInterval, StyleIntervalTree, StyleTag};

fn large_text(paragraph_count: usize) -> String {
    let mut out = String::with_capacity(paragraph_count * 96);
    for i in 0..paragraph_count {
        out.push_str(&format!(
            "{i:06} the quick brown fox jumps over the lazy dog while the page layout keeps up\n"
        ));
    }
    // Remove the final '\n' to avoid creating an extra trailing empty paragraph.
    out.pop();
    out
}

fn bench_large_document_open(c: &mut Criterion) {
    let text = large_text(5_000);
    c.bench_function("document_open/5k_paragraphs", |b| {
        b.iter(|| {
            let editor = Editor::new(black_box(&text));
            black_box(editor.page_count());
        })
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let text = large_text(1_000);
    c.bench_function("typing_middle/20_inserts", |b| {
        b.iter_batched(
            || {
                let mut editor = Editor::new(&text);
                editor.set_cursor_position(editor.len() / 2);
                editor
            },
            |mut editor| {
                for _ in 0..20 {
                    editor.insert_text("x").unwrap();
                }
                black_box(editor.len());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_style_queries(c: &mut Criterion) {
    let tags = [StyleTag::Bold, StyleTag::Italic, StyleTag::Underline];
    let tree = StyleIntervalTree::from_intervals((0..10_000).map(|i| {
        let start = (i * 37) % 100_000;
        StyleInterval::new(start, start + 1 + i % 200, tags[i % tags.len()])
    }));

    c.bench_function("style_tree/find_overlapping", |b| {
        let mut query = 0usize;
        b.iter(|| {
            query = (query + 7_919) % 100_000;
            black_box(tree.find_overlapping(query, query + 80));
        })
    });
}

criterion_group!(
    benches,
    bench_large_document_open,
    bench_typing_in_middle,
    bench_style_queries
);
criterion_main!(benches);
