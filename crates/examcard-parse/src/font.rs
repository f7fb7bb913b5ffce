//! Font loading and character code decoding.
//!
//! A [`LoadedFont`] turns the bytes of a shown string into character codes,
//! their Unicode text and their widths. Text comes from `/ToUnicode` when the
//! font carries one, then from the `/Differences` glyph names, then from
//! WinAnsiEncoding via [`encoding_rs`].

use std::collections::HashMap;

use crate::cmap::ToUnicode;
use crate::error::BackendError;
use crate::font_metrics::{FontMetrics, extract_cid_metrics, extract_simple_metrics};
use crate::lopdf_backend::{decode_stream, object_to_f64, resolve};

/// One decoded character code of a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChar {
    pub code: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseEncoding {
    WinAnsi,
    ZapfDingbats,
}

/// A font resource ready for text extraction.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    base_name: String,
    metrics: FontMetrics,
    to_unicode: Option<ToUnicode>,
    differences: HashMap<u8, char>,
    base_encoding: BaseEncoding,
    code_bytes: usize,
}

impl LoadedFont {
    /// Font used when `Tf` names a resource that does not exist.
    pub fn fallback() -> Self {
        Self {
            base_name: String::new(),
            metrics: FontMetrics::default_metrics(),
            to_unicode: None,
            differences: HashMap::new(),
            base_encoding: BaseEncoding::WinAnsi,
            code_bytes: 1,
        }
    }

    /// Load a font from its resource dictionary.
    pub fn load(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> Result<Self, BackendError> {
        let base_name = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o).as_stream().ok())
            .and_then(|s| decode_stream(s).ok())
            .map(|bytes| ToUnicode::parse(&bytes));

        let subtype = dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        if subtype == Some(b"Type0".as_slice()) {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve(doc, o).as_dict().ok())
                .ok_or_else(|| {
                    BackendError::Font(format!("Type0 font {base_name} has no descendant font"))
                })?;
            return Ok(Self {
                metrics: extract_cid_metrics(doc, descendant),
                code_bytes: to_unicode.as_ref().and_then(ToUnicode::code_bytes).unwrap_or(2),
                base_name,
                to_unicode,
                differences: HashMap::new(),
                base_encoding: BaseEncoding::WinAnsi,
            });
        }

        let base_encoding = if base_name.contains("ZapfDingbats") {
            BaseEncoding::ZapfDingbats
        } else {
            BaseEncoding::WinAnsi
        };
        let differences = dict
            .get(b"Encoding")
            .ok()
            .and_then(|o| resolve(doc, o).as_dict().ok())
            .and_then(|enc| enc.get(b"Differences").ok())
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| parse_differences(arr))
            .unwrap_or_default();

        Ok(Self {
            metrics: extract_simple_metrics(doc, dict),
            base_name,
            to_unicode,
            differences,
            base_encoding,
            code_bytes: 1,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Whether shown strings use multi-byte character codes.
    pub fn is_multi_byte(&self) -> bool {
        self.code_bytes > 1
    }

    pub fn width(&self, code: u32) -> f64 {
        self.metrics.width(code)
    }

    pub fn ascent(&self) -> f64 {
        self.metrics.ascent()
    }

    pub fn descent(&self) -> f64 {
        self.metrics.descent()
    }

    /// Split `bytes` into character codes and decode each one.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedChar> {
        bytes
            .chunks(self.code_bytes)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                DecodedChar {
                    code,
                    text: self.text_for(code),
                }
            })
            .collect()
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(code)) {
            return text.to_string();
        }
        if self.is_multi_byte() {
            return char::REPLACEMENT_CHARACTER.to_string();
        }
        let byte = code as u8;
        if let Some(ch) = self.differences.get(&byte) {
            return ch.to_string();
        }
        if self.base_encoding == BaseEncoding::ZapfDingbats {
            if let Some(ch) = zapf_dingbats(byte) {
                return ch.to_string();
            }
        }
        let bytes = [byte];
        let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&bytes);
        text.into_owned()
    }
}

/// Check marks of the ZapfDingbats built-in encoding.
fn zapf_dingbats(byte: u8) -> Option<char> {
    match byte {
        0x33 => Some('\u{2713}'),
        0x34 => Some('\u{2714}'),
        _ => None,
    }
}

/// Parse an `/Encoding /Differences` array into code to character overrides.
///
/// Glyph names that cannot be resolved are left to the base encoding.
fn parse_differences(items: &[lopdf::Object]) -> HashMap<u8, char> {
    let mut map = HashMap::new();
    let mut code: u32 = 0;
    for item in items {
        match item {
            lopdf::Object::Name(name) => {
                if let (Ok(byte), Some(ch)) = (
                    u8::try_from(code),
                    glyph_name_to_char(&String::from_utf8_lossy(name)),
                ) {
                    map.insert(byte, ch);
                }
                code += 1;
            }
            other => {
                if let Ok(n) = object_to_f64(other) {
                    code = n as u32;
                }
            }
        }
    }
    map
}

/// Resolve an Adobe glyph name for the characters exam books use.
fn glyph_name_to_char(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            return Some(ch);
        }
    }
    let ch = match name {
        "space" => ' ',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" => '-',
        "question" => '?',
        "parenleft" => '(',
        "parenright" => ')',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "adieresis" => 'ä',
        "odieresis" => 'ö',
        "udieresis" => 'ü',
        "Adieresis" => 'Ä',
        "Odieresis" => 'Ö',
        "Udieresis" => 'Ü',
        "germandbls" => 'ß',
        "quotedblbase" => '„',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "endash" => '–',
        "check" | "checkmark" => '\u{2713}',
        _ => return None,
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, Stream, dictionary};

    fn texts(font: &LoadedFont, bytes: &[u8]) -> String {
        font.decode(bytes).into_iter().map(|c| c.text).collect()
    }

    #[test]
    fn fallback_decodes_win_ansi() {
        let font = LoadedFont::fallback();
        assert_eq!(texts(&font, b"Hecht"), "Hecht");
        // 0xFC is ü, 0x80 is the euro sign in WinAnsiEncoding.
        assert_eq!(texts(&font, &[0xFC, 0x80]), "ü€");
        assert!(!font.is_multi_byte());
    }

    #[test]
    fn zapf_dingbats_check_marks() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ZapfDingbats",
        };
        let font = LoadedFont::load(&doc, &dict).unwrap();
        assert_eq!(texts(&font, b"4"), "\u{2714}");
        assert_eq!(texts(&font, b"3"), "\u{2713}");
    }

    #[test]
    fn differences_override_base_encoding() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Custom",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "Differences" => vec![
                    Object::Integer(1),
                    Object::Name(b"udieresis".to_vec()),
                    Object::Name(b"uni2713".to_vec()),
                    Object::Name(b"g1234".to_vec()),
                ],
            },
        };
        let font = LoadedFont::load(&doc, &dict).unwrap();
        assert_eq!(texts(&font, &[1, 2]), "ü\u{2713}");
        // Codes without an override keep WinAnsi.
        assert_eq!(texts(&font, b"A"), "A");
    }

    #[test]
    fn type0_font_uses_two_byte_codes_and_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = b"1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
            2 beginbfchar\n<0001> <0042>\n<0002> <0031>\nendbfchar\n";
        let cmap_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), cmap.to_vec()));
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 520i64,
        });
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Arial",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant)],
            "ToUnicode" => cmap_id,
        };
        let font = LoadedFont::load(&doc, &dict).unwrap();
        assert!(font.is_multi_byte());
        let decoded = font.decode(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x09]);
        assert_eq!(decoded[0], DecodedChar { code: 1, text: "B".to_string() });
        assert_eq!(decoded[1].text, "1");
        assert_eq!(decoded[2].text, "\u{FFFD}");
        assert_eq!(font.width(1), 520.0);
    }

    #[test]
    fn type0_without_descendant_is_a_font_error() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Broken",
        };
        let err = LoadedFont::load(&doc, &dict).unwrap_err();
        assert!(matches!(err, BackendError::Font(_)));
    }
}
