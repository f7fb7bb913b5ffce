//! Performance benchmarks for examcard-rs.
//!
//! Benchmarks cover opening a book, interpreting pages into tokens and the
//! full question extraction across two synthetic book sizes:
//! - Small: 1 page, 12 questions
//! - Large: 20 pages, 12 questions per page, every fourth a picture question

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use examcard::{Book, LayoutOptions};
use lopdf::{Object, Stream, dictionary};

// ---------------------------------------------------------------------------
// PDF fixture generators
// ---------------------------------------------------------------------------

struct PageFixture {
    content: Vec<u8>,
    images: usize,
}

/// Build a book with one page per fixture. Image XObjects are named
/// `Im1..ImN` on each page.
fn build_pdf(pages: &[PageFixture]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");

    let font_f1 = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 32i64,
            "Height" => 24i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        },
        vec![140; 32 * 24 * 3],
    ));

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ];

    let mut page_ids = Vec::new();
    for page in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page.content.clone()));
        let mut xobjects = lopdf::Dictionary::new();
        for i in 1..=page.images {
            xobjects.set(format!("Im{i}"), Object::Reference(image_id));
        }
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => media_box.clone(),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_f1) },
                "XObject" => xobjects,
            },
        }));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages.len() as i64),
    });
    for &pid in &page_ids {
        if let Ok(obj) = doc.get_object_mut(pid) {
            if let Ok(dict) = obj.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn show(ops: &mut String, x: f64, top: f64, text: &str) {
    ops.push_str(&format!(
        "BT /F1 10 Tf {x} {} Td ({text}) Tj ET\n",
        792.0 - top - 7.5
    ));
}

/// A page with the header row and `questions` rows starting at `first`.
///
/// Every fourth question is a picture question with an image below it.
fn question_page(first: usize, questions: usize) -> PageFixture {
    let mut ops = String::new();
    for (x, phrase) in [
        (20.0, "Frage"),
        (120.0, "Antwort A"),
        (220.0, "Antwort B"),
        (320.0, "Antwort C"),
        (420.0, "Richtige Antwort"),
    ] {
        show(&mut ops, x, 30.0, phrase);
    }

    let mut images = 0;
    for i in 0..questions {
        let top = 60.0 + i as f64 * 60.0;
        let n = first + i;
        let label = if n % 4 == 0 {
            format!("B1.{}", n / 4)
        } else {
            format!("1.{:03}", n - n / 4)
        };
        show(&mut ops, 20.0, top, &label);
        show(&mut ops, 56.0, top, "Wie heisst");
        show(&mut ops, 56.0, top + 12.0, "der Fisch?");
        show(&mut ops, 125.0, top, "Hecht");
        show(&mut ops, 225.0, top, "Zander");
        show(&mut ops, 325.0, top, "Barsch");
        show(&mut ops, 425.0, top, ["A", "B", "C"][n % 3]);
        if label.starts_with('B') {
            images += 1;
            ops.push_str(&format!(
                "q 40 0 0 30 60 {} cm /Im{images} Do Q\n",
                792.0 - (top + 25.0) - 30.0
            ));
        }
    }
    PageFixture {
        content: ops.into_bytes(),
        images,
    }
}

fn book_bytes(pages: usize) -> Vec<u8> {
    let fixtures: Vec<PageFixture> = (0..pages).map(|p| question_page(1 + p * 12, 12)).collect();
    build_pdf(&fixtures)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_book_open(c: &mut Criterion) {
    let small = book_bytes(1);
    let large = book_bytes(20);

    let mut group = c.benchmark_group("book_open");

    group.bench_function("small_1page", |b| {
        b.iter(|| {
            let book = Book::open(black_box(&small)).unwrap();
            black_box(book.page_count());
        });
    });

    group.bench_function("large_20page", |b| {
        b.iter(|| {
            let book = Book::open(black_box(&large)).unwrap();
            black_box(book.page_count());
        });
    });

    group.finish();
}

fn bench_page_tokens(c: &mut Criterion) {
    let large = book_bytes(20);

    let mut group = c.benchmark_group("page_tokens");

    group.bench_function("large_20page", |b| {
        let book = Book::open(&large).unwrap();
        b.iter(|| {
            for page in book.pages_iter() {
                black_box(page.unwrap().tokens.len());
            }
        });
    });

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let small = book_bytes(1);
    let large = book_bytes(20);

    let mut group = c.benchmark_group("extraction");

    group.bench_function("small_1page", |b| {
        let book = Book::open(&small).unwrap();
        b.iter(|| {
            let extraction = book.extract(LayoutOptions::default()).unwrap();
            black_box(extraction.records.len());
        });
    });

    group.bench_function("large_20page", |b| {
        let book = Book::open(&large).unwrap();
        b.iter(|| {
            let extraction = book.extract(LayoutOptions::default()).unwrap();
            black_box(extraction.records.len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_book_open, bench_page_tokens, bench_extraction);
criterion_main!(benches);
