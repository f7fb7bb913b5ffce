//! Font metrics extraction from PDF font dictionaries.
//!
//! Parses /Widths, /FirstChar and /FontDescriptor for simple fonts and the
//! /W and /DW entries of CID fonts, giving glyph widths plus ascent and
//! descent for glyph bounding boxes.

use std::collections::HashMap;

use crate::lopdf_backend::{object_to_f64, resolve};

/// Default ascent when not specified (750/1000 of text space).
const DEFAULT_ASCENT: f64 = 750.0;

/// Default descent when not specified (-250/1000 of text space).
const DEFAULT_DESCENT: f64 = -250.0;

/// Default character width for simple fonts without /Widths.
const DEFAULT_WIDTH: f64 = 600.0;

/// Default width of a CID font without /DW.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

#[derive(Debug, Clone)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f64>,
        missing: f64,
    },
    Cid {
        widths: HashMap<u32, f64>,
        default: f64,
    },
}

/// Glyph widths and vertical extent of a font, in glyph space units
/// (1/1000 of text space).
#[derive(Debug, Clone)]
pub struct FontMetrics {
    widths: Widths,
    ascent: f64,
    descent: f64,
}

impl FontMetrics {
    /// Metrics for a simple (single-byte) font.
    pub fn simple(first_char: u32, widths: Vec<f64>, missing: f64, ascent: f64, descent: f64) -> Self {
        let (ascent, descent) = sane_extent(ascent, descent);
        Self {
            widths: Widths::Simple {
                first_char,
                widths,
                missing,
            },
            ascent,
            descent,
        }
    }

    /// Metrics for a CID-keyed font.
    pub fn cid(widths: HashMap<u32, f64>, default: f64, ascent: f64, descent: f64) -> Self {
        let (ascent, descent) = sane_extent(ascent, descent);
        Self {
            widths: Widths::Cid { widths, default },
            ascent,
            descent,
        }
    }

    /// Metrics used when the font dictionary is missing or unusable.
    pub fn default_metrics() -> Self {
        Self::simple(0, Vec::new(), DEFAULT_WIDTH, DEFAULT_ASCENT, DEFAULT_DESCENT)
    }

    pub fn width(&self, code: u32) -> f64 {
        match &self.widths {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
        }
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }
}

/// Ascent and descent with the defaults substituted when the descriptor
/// gives a degenerate (zero or inverted) extent.
fn sane_extent(ascent: f64, descent: f64) -> (f64, f64) {
    if ascent - descent > 0.0 && ascent > 0.0 {
        (ascent, descent.min(0.0))
    } else {
        (DEFAULT_ASCENT, DEFAULT_DESCENT)
    }
}

/// Extract [`FontMetrics`] from a simple font dictionary.
pub fn extract_simple_metrics(doc: &lopdf::Document, font_dict: &lopdf::Dictionary) -> FontMetrics {
    let first_char = font_dict
        .get(b"FirstChar")
        .ok()
        .and_then(|o| object_to_f64(resolve(doc, o)).ok())
        .map(|v| v as u32)
        .unwrap_or(0);

    let widths = font_dict
        .get(b"Widths")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|o| object_to_f64(resolve(doc, o)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();

    let descriptor = Descriptor::read(doc, font_dict);
    FontMetrics::simple(
        first_char,
        widths,
        descriptor.missing_width.unwrap_or(DEFAULT_WIDTH),
        descriptor.ascent,
        descriptor.descent,
    )
}

/// Extract [`FontMetrics`] from the descendant CIDFont of a Type0 font.
pub fn extract_cid_metrics(doc: &lopdf::Document, cid_font: &lopdf::Dictionary) -> FontMetrics {
    let default = cid_font
        .get(b"DW")
        .ok()
        .and_then(|o| object_to_f64(resolve(doc, o)).ok())
        .unwrap_or(DEFAULT_CID_WIDTH);

    let widths = cid_font
        .get(b"W")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .map(|arr| parse_w_array(doc, arr))
        .unwrap_or_default();

    let descriptor = Descriptor::read(doc, cid_font);
    FontMetrics::cid(widths, default, descriptor.ascent, descriptor.descent)
}

struct Descriptor {
    ascent: f64,
    descent: f64,
    missing_width: Option<f64>,
}

impl Descriptor {
    fn read(doc: &lopdf::Document, font_dict: &lopdf::Dictionary) -> Self {
        let desc = font_dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve(doc, o).as_dict().ok());

        let Some(desc) = desc else {
            return Self {
                ascent: DEFAULT_ASCENT,
                descent: DEFAULT_DESCENT,
                missing_width: None,
            };
        };
        let number = |key: &[u8]| {
            desc.get(key)
                .ok()
                .and_then(|o| object_to_f64(resolve(doc, o)).ok())
        };
        Self {
            ascent: number(b"Ascent").unwrap_or(DEFAULT_ASCENT),
            descent: number(b"Descent").unwrap_or(DEFAULT_DESCENT),
            missing_width: number(b"MissingWidth"),
        }
    }
}

/// Parse a CID font /W array.
///
/// Entries are either `c [w1 w2 ...]` (consecutive widths starting at `c`)
/// or `c_first c_last w` (one width for a range).
fn parse_w_array(doc: &lopdf::Document, objects: &[lopdf::Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut items = objects.iter().map(|o| resolve(doc, o));

    while let Some(first) = items.next() {
        let Ok(start) = object_to_f64(first) else {
            continue;
        };
        let start = start as u32;
        match items.next() {
            Some(lopdf::Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Ok(w) = object_to_f64(resolve(doc, w)) {
                        widths.insert(start + offset as u32, w);
                    }
                }
            }
            Some(end) => {
                let (Ok(end), Some(w)) = (object_to_f64(end), items.next()) else {
                    break;
                };
                if let Ok(w) = object_to_f64(w) {
                    for cid in start..=end as u32 {
                        widths.insert(cid, w);
                    }
                }
            }
            None => break,
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, dictionary};

    #[test]
    fn simple_width_lookup_within_range() {
        let metrics = FontMetrics::simple(65, vec![250.0, 500.0, 750.0], 0.0, 700.0, -200.0);
        assert_eq!(metrics.width(65), 250.0);
        assert_eq!(metrics.width(66), 500.0);
        assert_eq!(metrics.width(67), 750.0);
    }

    #[test]
    fn simple_width_out_of_range_uses_missing_width() {
        let metrics = FontMetrics::simple(65, vec![250.0, 500.0], 300.0, 700.0, -200.0);
        assert_eq!(metrics.width(64), 300.0);
        assert_eq!(metrics.width(67), 300.0);
    }

    #[test]
    fn default_metrics() {
        let metrics = FontMetrics::default_metrics();
        assert_eq!(metrics.width(b'A' as u32), 600.0);
        assert_eq!(metrics.ascent(), 750.0);
        assert_eq!(metrics.descent(), -250.0);
    }

    #[test]
    fn degenerate_extent_falls_back_to_defaults() {
        let metrics = FontMetrics::simple(0, Vec::new(), 500.0, 0.0, 0.0);
        assert_eq!(metrics.ascent(), 750.0);
        assert_eq!(metrics.descent(), -250.0);
    }

    #[test]
    fn extract_from_font_dict_with_descriptor() {
        let mut doc = Document::with_version("1.5");
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "Ascent" => 718i64,
            "Descent" => -207i64,
            "MissingWidth" => 278i64,
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "FirstChar" => 32i64,
            "LastChar" => 34i64,
            "Widths" => vec![Object::Integer(278), Object::Integer(278), Object::Real(355.0)],
            "FontDescriptor" => descriptor,
        };

        let metrics = extract_simple_metrics(&doc, &font);
        assert_eq!(metrics.width(32), 278.0);
        assert_eq!(metrics.width(34), 355.0);
        assert_eq!(metrics.width(65), 278.0);
        assert_eq!(metrics.ascent(), 718.0);
        assert_eq!(metrics.descent(), -207.0);
    }

    #[test]
    fn extract_without_widths_uses_default_width() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        let metrics = extract_simple_metrics(&doc, &font);
        assert_eq!(metrics.width(b'x' as u32), 600.0);
    }

    #[test]
    fn cid_w_array_both_forms() {
        let doc = Document::with_version("1.5");
        let cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 500i64,
            "W" => vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(400), Object::Integer(450)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(700),
            ],
        };
        let metrics = extract_cid_metrics(&doc, &cid_font);
        assert_eq!(metrics.width(1), 400.0);
        assert_eq!(metrics.width(2), 450.0);
        assert_eq!(metrics.width(11), 700.0);
        assert_eq!(metrics.width(3), 500.0);
    }
}
