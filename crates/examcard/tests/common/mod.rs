//! In-memory question book PDFs for integration tests.
//!
//! Pages are 612 x 792 points. Text is drawn in 10pt Helvetica without a
//! `/Widths` array, so every glyph is 6pt wide and 10pt tall and the `top`
//! given to the builder is exactly the top of the resulting tokens.

#![allow(dead_code)]

use lopdf::{Document, Object, Stream, dictionary};

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;

/// Left edges of the five header phrases.
pub const COLUMNS: [f64; 5] = [20.0, 120.0, 220.0, 320.0, 420.0];

/// One page of a book under construction.
#[derive(Default)]
pub struct BookPage {
    content: Vec<u8>,
    images: Vec<(String, Stream)>,
}

impl BookPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `text` with its top-left corner at `(x, top)`.
    pub fn text(mut self, x: f64, top: f64, text: &str) -> Self {
        let baseline = PAGE_HEIGHT - top - 7.5;
        self.content
            .extend_from_slice(format!("BT /F1 10 Tf {x} {baseline} Td (").as_bytes());
        self.content.extend(literal_bytes(text));
        self.content.extend_from_slice(b") Tj ET\n");
        self
    }

    /// Draw a ZapfDingbats check mark at `(x, top)`.
    pub fn check(mut self, x: f64, top: f64) -> Self {
        let baseline = PAGE_HEIGHT - top - 7.5;
        self.content
            .extend_from_slice(format!("BT /F2 10 Tf {x} {baseline} Td (4) Tj ET\n").as_bytes());
        self
    }

    /// German column header row at `top`.
    pub fn header(self, top: f64) -> Self {
        self.text(COLUMNS[0], top, "Frage")
            .text(COLUMNS[1], top, "Antwort A")
            .text(COLUMNS[2], top, "Antwort B")
            .text(COLUMNS[3], top, "Antwort C")
            .text(COLUMNS[4], top, "Richtige Antwort")
    }

    /// English column header row at `top`.
    pub fn english_header(self, top: f64) -> Self {
        self.text(COLUMNS[0], top, "Question")
            .text(COLUMNS[1], top, "Answer A")
            .text(COLUMNS[2], top, "Answer B")
            .text(COLUMNS[3], top, "Answer C")
            .text(COLUMNS[4], top, "Correct Answer")
    }

    /// A question row: label, question text, three answers and the letter
    /// in the correct-answer column (skipped when empty).
    pub fn question(
        self,
        label: &str,
        top: f64,
        text: &str,
        answers: [&str; 3],
        correct: &str,
    ) -> Self {
        let text_x = COLUMNS[0] + label.len() as f64 * 6.0 + 6.0;
        let page = self
            .text(COLUMNS[0], top, label)
            .text(text_x, top, text)
            .text(COLUMNS[1] + 5.0, top, answers[0])
            .text(COLUMNS[2] + 5.0, top, answers[1])
            .text(COLUMNS[3] + 5.0, top, answers[2]);
        if correct.is_empty() {
            page
        } else {
            page.text(COLUMNS[4] + 5.0, top, correct)
        }
    }

    /// Place a uniform gray image XObject covering `(x, top, width, height)`.
    pub fn image(mut self, x: f64, top: f64, width: f64, height: f64, gray: u8) -> Self {
        let name = format!("Im{}", self.images.len() + 1);
        let y = PAGE_HEIGHT - top - height;
        self.content.extend_from_slice(
            format!("q {width} 0 0 {height} {x} {y} cm /{name} Do Q\n").as_bytes(),
        );
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4i64,
                "Height" => 4i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            },
            vec![gray; 16],
        );
        self.images.push((name, stream));
        self
    }
}

/// WinAnsi bytes of `text` escaped for a PDF literal string.
fn literal_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for ch in text.chars() {
        let byte = u8::try_from(u32::from(ch)).unwrap_or(b'?');
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out
}

/// Assemble the pages into PDF bytes.
pub fn build_book(pages: Vec<BookPage>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let dingbats = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "ZapfDingbats",
    });

    let mut kids = Vec::new();
    for page in pages {
        let mut xobjects = lopdf::Dictionary::new();
        for (name, stream) in page.images {
            let id = doc.add_object(stream);
            xobjects.set(name, Object::Reference(id));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, page.content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => helvetica,
                    "F2" => dingbats,
                },
                "XObject" => xobjects,
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
