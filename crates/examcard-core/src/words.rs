use crate::geometry::BBox;
use crate::token::Token;

/// A single positioned glyph as reported by a document backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Unicode text of the glyph (usually one character).
    pub text: String,
    /// Bounding box in top-left origin page coordinates.
    pub bbox: BBox,
}

impl Glyph {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Options for grouping glyphs into tokens.
#[derive(Debug, Clone)]
pub struct WordOptions {
    /// Maximum horizontal gap between glyphs of the same token.
    pub x_tolerance: f64,
    /// Maximum vertical offset between glyphs of the same token.
    pub y_tolerance: f64,
    /// If true, expand Latin ligatures (U+FB00–U+FB06).
    pub expand_ligatures: bool,
}

impl Default for WordOptions {
    fn default() -> Self {
        Self {
            x_tolerance: 3.0,
            y_tolerance: 3.0,
            expand_ligatures: true,
        }
    }
}

/// Groups glyphs into whitespace-free tokens based on spatial proximity.
pub struct WordExtractor;

impl WordExtractor {
    /// Group `glyphs` into tokens on page `page` (1-based).
    ///
    /// Whitespace glyphs always split. Otherwise a glyph starts a new token
    /// when its horizontal gap to the previous glyph exceeds `x_tolerance`
    /// or its top differs by more than `y_tolerance`.
    pub fn extract(glyphs: &[Glyph], page: usize, options: &WordOptions) -> Vec<Token> {
        let mut sorted: Vec<&Glyph> = glyphs.iter().collect();
        sorted.sort_by(|a, b| {
            a.bbox
                .top
                .total_cmp(&b.bbox.top)
                .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        });

        let mut tokens = Vec::new();
        let mut current: Vec<&Glyph> = Vec::new();

        for glyph in sorted {
            if glyph.text.chars().all(char::is_whitespace) {
                Self::flush(&mut current, &mut tokens, page, options);
                continue;
            }
            if let Some(last) = current.last() {
                if Self::should_split(last, glyph, options) {
                    Self::flush(&mut current, &mut tokens, page, options);
                }
            }
            current.push(glyph);
        }
        Self::flush(&mut current, &mut tokens, page, options);

        tokens
    }

    /// Overlapping glyphs (fake bold) have a zero gap and always join.
    fn should_split(last: &Glyph, current: &Glyph, options: &WordOptions) -> bool {
        let x_gap =
            (last.bbox.x0.max(current.bbox.x0) - last.bbox.x1.min(current.bbox.x1)).max(0.0);
        let y_diff = (current.bbox.top - last.bbox.top).abs();
        x_gap > options.x_tolerance || y_diff > options.y_tolerance
    }

    fn flush(current: &mut Vec<&Glyph>, tokens: &mut Vec<Token>, page: usize, options: &WordOptions) {
        let Some(bbox) = current.iter().map(|g| g.bbox).reduce(|a, b| a.union(&b)) else {
            return;
        };
        let raw: String = current.iter().map(|g| g.text.as_str()).collect();
        let text = if options.expand_ligatures {
            expand_ligatures(&raw)
        } else {
            raw
        };
        tokens.push(Token::new(text, page, bbox));
        current.clear();
    }
}

fn expand_ligatures(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{FB00}' => result.push_str("ff"),
            '\u{FB01}' => result.push_str("fi"),
            '\u{FB02}' => result.push_str("fl"),
            '\u{FB03}' => result.push_str("ffi"),
            '\u{FB04}' => result.push_str("ffl"),
            '\u{FB05}' => result.push_str("\u{017F}t"),
            '\u{FB06}' => result.push_str("st"),
            _ => result.push(ch),
        }
    }
    result
}
