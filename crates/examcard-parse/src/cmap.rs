//! `/ToUnicode` CMap parsing.
//!
//! Only the `bfchar` and `bfrange` sections are read; everything else in the
//! CMap program is ignored. Malformed entries are skipped so one bad line does
//! not cost the whole font its text.

use std::collections::HashMap;

/// Character code to Unicode mapping read from a `/ToUnicode` stream.
#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    mappings: HashMap<u32, String>,
    /// Byte width of source codes, taken from the first codespace range.
    code_bytes: Option<usize>,
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut cmap = ToUnicode::default();

        for section in sections(&text, "begincodespacerange", "endcodespacerange") {
            if let Some(first) = hex_tokens(section).first() {
                cmap.code_bytes = Some(first.len().div_ceil(2).max(1));
                break;
            }
        }
        for section in sections(&text, "beginbfchar", "endbfchar") {
            cmap.read_bfchar(section);
        }
        for section in sections(&text, "beginbfrange", "endbfrange") {
            cmap.read_bfrange(section);
        }
        cmap
    }

    /// Unicode text for `code`, if mapped.
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    /// Width in bytes of the source codes declared by the CMap.
    pub fn code_bytes(&self) -> Option<usize> {
        self.code_bytes
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn read_bfchar(&mut self, section: &str) {
        let tokens = hex_tokens(section);
        for pair in tokens.chunks_exact(2) {
            if let (Some(code), Some(text)) = (parse_code(pair[0]), decode_utf16be(pair[1])) {
                self.mappings.insert(code, text);
            }
        }
    }

    fn read_bfrange(&mut self, section: &str) {
        for line in section.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (head, array) = match line.find('[') {
                Some(open) => (&line[..open], Some(&line[open + 1..])),
                None => (line, None),
            };
            let tokens = hex_tokens(head);
            let (Some(low), Some(high)) = (
                tokens.first().and_then(|t| parse_code(t)),
                tokens.get(1).and_then(|t| parse_code(t)),
            ) else {
                continue;
            };
            if high < low {
                continue;
            }

            match array {
                Some(rest) => {
                    let targets = hex_tokens(rest.split(']').next().unwrap_or(rest));
                    for (code, target) in (low..=high).zip(targets) {
                        if let Some(text) = decode_utf16be(target) {
                            self.mappings.insert(code, text);
                        }
                    }
                }
                None => {
                    let Some(start) = tokens.get(2).and_then(|t| decode_utf16be(t)) else {
                        continue;
                    };
                    // The last UTF-16 unit is incremented across the range.
                    let mut units: Vec<u16> = start.encode_utf16().collect();
                    for code in low..=high {
                        if let Ok(text) = String::from_utf16(&units) {
                            self.mappings.insert(code, text);
                        }
                        match units.last_mut() {
                            Some(last) => *last = last.wrapping_add(1),
                            None => break,
                        }
                    }
                }
            }
        }
    }
}

/// Bodies of every `begin ... end` section in `text`.
fn sections<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        let Some(stop) = body.find(end) else {
            break;
        };
        found.push(&body[..stop]);
        rest = &body[stop + end.len()..];
    }
    found
}

/// All `<hex>` tokens in `text`, in order.
fn hex_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            break;
        };
        tokens.push(after[..close].trim());
        rest = &after[close + 1..];
    }
    tokens
}

fn parse_code(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok()
}

fn decode_utf16be(hex: &str) -> Option<String> {
    if hex.len() == 2 {
        return parse_code(hex).and_then(char::from_u32).map(String::from);
    }
    if hex.is_empty() || hex.len() % 4 != 0 {
        return None;
    }
    let units: Option<Vec<u16>> = hex
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| u16::from_str_radix(s, 16).ok())
        })
        .collect();
    String::from_utf16(&units?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "/CIDInit /ProcSet findresource begin\n\
        12 dict begin\nbegincmap\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n";

    #[test]
    fn empty_cmap_maps_nothing() {
        let cmap = ToUnicode::parse(b"");
        assert!(cmap.is_empty());
        assert_eq!(cmap.lookup(0x41), None);
        assert_eq!(cmap.code_bytes(), None);
    }

    #[test]
    fn codespace_range_sets_code_width() {
        let cmap = ToUnicode::parse(HEADER.as_bytes());
        assert_eq!(cmap.code_bytes(), Some(2));
    }

    #[test]
    fn bfchar_maps_single_codes() {
        let data = format!("{HEADER}2 beginbfchar\n<0003> <0020>\n<0011> <00FC>\nendbfchar\n");
        let cmap = ToUnicode::parse(data.as_bytes());
        assert_eq!(cmap.lookup(0x03), Some(" "));
        assert_eq!(cmap.lookup(0x11), Some("ü"));
        assert_eq!(cmap.len(), 2);
    }

    #[test]
    fn bfchar_ligature_maps_to_several_chars() {
        let cmap = ToUnicode::parse(b"1 beginbfchar\n<1F> <00660069>\nendbfchar");
        assert_eq!(cmap.lookup(0x1F), Some("fi"));
    }

    #[test]
    fn bfchar_checkmark() {
        let cmap = ToUnicode::parse(b"1 beginbfchar\n<0040> <2713>\nendbfchar");
        assert_eq!(cmap.lookup(0x40), Some("\u{2713}"));
    }

    #[test]
    fn bfrange_increments_destination() {
        let cmap = ToUnicode::parse(b"1 beginbfrange\n<0024> <0026> <0041>\nendbfrange");
        assert_eq!(cmap.lookup(0x24), Some("A"));
        assert_eq!(cmap.lookup(0x25), Some("B"));
        assert_eq!(cmap.lookup(0x26), Some("C"));
        assert_eq!(cmap.lookup(0x27), None);
    }

    #[test]
    fn bfrange_array_destination() {
        let cmap =
            ToUnicode::parse(b"1 beginbfrange\n<0005> <0006> [<00C4> <00D6>]\nendbfrange");
        assert_eq!(cmap.lookup(0x05), Some("Ä"));
        assert_eq!(cmap.lookup(0x06), Some("Ö"));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let cmap = ToUnicode::parse(
            b"2 beginbfchar\n<zz> <0041>\n<0042> <0042>\nendbfchar\n\
              1 beginbfrange\n<0010> <0001> <0041>\nendbfrange",
        );
        assert_eq!(cmap.lookup(0x42), Some("B"));
        assert_eq!(cmap.len(), 1);
    }
}
