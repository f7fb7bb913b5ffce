//! Region text assembly and correct-answer markers.

use unicode_normalization::UnicodeNormalization;

use crate::geometry::BBox;
use crate::options::LayoutOptions;
use crate::record::AnswerKey;
use crate::token::Token;

/// Glyphs that mark an answer slot as the correct one.
pub const CHECKMARKS: [char; 4] = ['\u{2713}', '\u{2714}', '\u{2611}', '\u{221A}'];

/// Tokens sharing one visual row, left to right.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub tokens: Vec<&'a Token>,
    pub top: f64,
    pub bottom: f64,
}

/// Group tokens into visual lines.
///
/// A token joins the current line when its top is within `row_tolerance` of
/// the line's first token. Lines come out top to bottom, tokens left to
/// right.
pub fn visual_lines<'a>(tokens: impl IntoIterator<Item = &'a Token>, row_tolerance: f64) -> Vec<Line<'a>> {
    let mut sorted: Vec<&Token> = tokens.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Line<'a>> = Vec::new();
    for token in sorted {
        match lines.last_mut() {
            Some(line) if (token.bbox.top - line.top).abs() <= row_tolerance => {
                line.bottom = line.bottom.max(token.bbox.bottom);
                line.tokens.push(token);
            }
            _ => lines.push(Line {
                tokens: vec![token],
                top: token.bbox.top,
                bottom: token.bbox.bottom,
            }),
        }
    }
    for line in &mut lines {
        line.tokens.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    }
    lines
}

/// Tokens whose centre lies inside `region` (half-open).
pub fn tokens_in<'a>(region: &BBox, tokens: &'a [Token]) -> Vec<&'a Token> {
    tokens
        .iter()
        .filter(|t| {
            let (x, y) = t.center();
            region.contains_point(x, y)
        })
        .collect()
}

/// Text of an answer slot plus whether it carried a checkmark.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerText {
    pub text: String,
    pub marked: bool,
}

/// Reassembles the text of a region.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    row_tolerance: f64,
    paragraph_gap: f64,
}

impl TextExtractor {
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            row_tolerance: options.row_tolerance,
            paragraph_gap: options.paragraph_gap,
        }
    }

    /// Normalized text of the tokens inside `region`.
    ///
    /// Tokens on a line are joined by one space. Consecutive lines are
    /// joined by a space when they flow and by a newline when the vertical
    /// gap exceeds the paragraph gap. The result is NFC normalized and
    /// trimmed.
    pub fn extract(&self, region: &BBox, tokens: &[Token]) -> String {
        self.assemble(tokens_in(region, tokens))
    }

    /// Like [`extract`](Self::extract), but strips checkmarks and reports
    /// whether any were present.
    pub fn extract_answer(&self, region: &BBox, tokens: &[Token]) -> AnswerText {
        let mut marked = false;
        let cleaned: Vec<Token> = tokens_in(region, tokens)
            .into_iter()
            .filter_map(|t| {
                if !t.text.contains(CHECKMARKS) {
                    return Some(t.clone());
                }
                marked = true;
                let text: String = t.text.chars().filter(|c| !CHECKMARKS.contains(c)).collect();
                (!text.trim().is_empty()).then(|| Token::new(text, t.page, t.bbox))
            })
            .collect();
        AnswerText {
            text: self.assemble(cleaned.iter()),
            marked,
        }
    }

    /// First standalone `A`, `B` or `C` inside the correct-answer region.
    pub fn correct_answer(&self, region: &BBox, tokens: &[Token]) -> Option<AnswerKey> {
        visual_lines(tokens_in(region, tokens), self.row_tolerance)
            .iter()
            .flat_map(|line| line.tokens.iter())
            .find_map(|t| {
                AnswerKey::from_letter(
                    t.text
                        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace()),
                )
            })
    }

    fn assemble<'a>(&self, tokens: impl IntoIterator<Item = &'a Token>) -> String {
        let mut out = String::new();
        let mut prev_bottom: Option<f64> = None;

        for line in visual_lines(tokens, self.row_tolerance) {
            let words: Vec<String> = line
                .tokens
                .iter()
                .map(|t| collapse_whitespace(&t.text))
                .filter(|w| !w.is_empty())
                .collect();
            if words.is_empty() {
                continue;
            }
            if let Some(bottom) = prev_bottom {
                out.push(if line.top - bottom > self.paragraph_gap {
                    '\n'
                } else {
                    ' '
                });
            }
            out.push_str(&words.join(" "));
            prev_bottom = Some(line.bottom);
        }

        out.nfc().collect::<String>().trim().to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(text: &str, x0: f64, top: f64) -> Token {
        Token::new(text, 1, BBox::new(x0, top, x0 + 20.0, top + 10.0))
    }

    fn extractor() -> TextExtractor {
        TextExtractor::new(&LayoutOptions::default())
    }

    const REGION: BBox = BBox {
        x0: 0.0,
        top: 0.0,
        x1: 100.0,
        bottom: 200.0,
    };

    #[test]
    fn joins_flowing_lines_with_space() {
        let tokens = vec![
            tok("Wie", 0.0, 10.0),
            tok("lang", 25.0, 10.0),
            tok("ist", 0.0, 22.0),
            tok("das?", 25.0, 22.0),
        ];
        assert_eq!(extractor().extract(&REGION, &tokens), "Wie lang ist das?");
    }

    #[test]
    fn paragraph_gap_inserts_newline() {
        let tokens = vec![tok("first", 0.0, 10.0), tok("second", 0.0, 40.0)];
        assert_eq!(extractor().extract(&REGION, &tokens), "first\nsecond");
    }

    #[test]
    fn centre_selection_is_half_open() {
        let tokens = vec![
            tok("in", 0.0, 10.0),
            // centre x = 100.0, on the right edge: excluded
            tok("out", 90.0, 10.0),
            // centre y = 195.0: inside
            tok("low", 0.0, 190.0),
        ];
        assert_eq!(extractor().extract(&REGION, &tokens), "in\nlow");
    }

    #[test]
    fn tokens_on_jittered_baseline_share_a_line() {
        let tokens = vec![tok("b", 25.0, 11.5), tok("a", 0.0, 10.0)];
        assert_eq!(extractor().extract(&REGION, &tokens), "a b");
    }

    #[test]
    fn collapses_whitespace_and_normalizes_nfc() {
        let tokens = vec![tok("  Fo\u{0308}rde   Fisch ", 0.0, 10.0)];
        assert_eq!(extractor().extract(&REGION, &tokens), "F\u{00F6}rde Fisch");
    }

    #[test]
    fn extraction_is_idempotent() {
        let tokens = vec![
            tok("x", 0.0, 10.0),
            tok("y", 25.0, 10.0),
            tok("z", 0.0, 40.0),
        ];
        let ex = extractor();
        assert_eq!(ex.extract(&REGION, &tokens), ex.extract(&REGION, &tokens));
    }

    #[test]
    fn empty_region_is_empty_string() {
        assert_eq!(extractor().extract(&REGION, &[]), "");
    }

    #[test]
    fn checkmark_token_marks_answer() {
        let tokens = vec![tok("\u{2713}", 0.0, 10.0), tok("Hecht", 25.0, 10.0)];
        let answer = extractor().extract_answer(&REGION, &tokens);
        assert!(answer.marked);
        assert_eq!(answer.text, "Hecht");
    }

    #[test]
    fn glued_checkmark_is_stripped() {
        let tokens = vec![tok("Zander\u{2714}", 0.0, 10.0)];
        let answer = extractor().extract_answer(&REGION, &tokens);
        assert!(answer.marked);
        assert_eq!(answer.text, "Zander");
    }

    #[test]
    fn unmarked_answer() {
        let tokens = vec![tok("Barsch", 0.0, 10.0)];
        let answer = extractor().extract_answer(&REGION, &tokens);
        assert!(!answer.marked);
        assert_eq!(answer.text, "Barsch");
    }

    #[test]
    fn correct_answer_letter_tolerates_punctuation() {
        let ex = extractor();
        assert_eq!(ex.correct_answer(&REGION, &[tok("B", 0.0, 10.0)]), Some(AnswerKey::B));
        assert_eq!(ex.correct_answer(&REGION, &[tok("(C)", 0.0, 10.0)]), Some(AnswerKey::C));
        assert_eq!(ex.correct_answer(&REGION, &[tok("A)", 0.0, 10.0)]), Some(AnswerKey::A));
        assert_eq!(ex.correct_answer(&REGION, &[tok("AB", 0.0, 10.0)]), None);
        assert_eq!(ex.correct_answer(&REGION, &[]), None);
    }

    #[test]
    fn first_letter_in_reading_order_wins() {
        let tokens = vec![tok("C", 0.0, 40.0), tok("A", 0.0, 10.0)];
        assert_eq!(extractor().correct_answer(&REGION, &tokens), Some(AnswerKey::A));
    }

    #[test]
    fn visual_lines_orders_rows_and_tokens() {
        let tokens = vec![tok("d", 30.0, 30.0), tok("b", 30.0, 10.0), tok("a", 0.0, 11.0), tok("c", 0.0, 30.0)];
        let lines = visual_lines(&tokens, 3.0);
        let texts: Vec<Vec<&str>> = lines
            .iter()
            .map(|l| l.tokens.iter().map(|t| t.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec![vec!["a", "b"], vec!["c", "d"]]);
        assert_eq!(lines[0].top, 10.0);
        assert_eq!(lines[0].bottom, 21.0);
    }
}
