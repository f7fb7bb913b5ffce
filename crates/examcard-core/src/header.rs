//! Column header detection.
//!
//! The question book repeats a header row (`Question`, `Answer A`, ...) at
//! the top of most pages. [`HeaderLocator`] finds it and turns it into a
//! [`HeaderSet`] of x boundaries; [`HeaderTracker`] carries the most recent
//! set across pages that omit the row.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Diagnostic, DiagnosticCode, Extracted};
use crate::geometry::BBox;
use crate::options::LayoutOptions;
use crate::token::Token;

/// Logical column of the question table, in left-to-right order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Question,
    AnswerA,
    AnswerB,
    AnswerC,
    CorrectAnswer,
}

impl Column {
    /// All columns in left-to-right order.
    pub const ALL: [Column; 5] = [
        Column::Question,
        Column::AnswerA,
        Column::AnswerB,
        Column::AnswerC,
        Column::CorrectAnswer,
    ];

    /// Position of the column in [`Column::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Question => "question",
            Column::AnswerA => "answerA",
            Column::AnswerB => "answerB",
            Column::AnswerC => "answerC",
            Column::CorrectAnswer => "correctAnswer",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The header phrases of one language, indexed by [`Column`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderVocabulary {
    /// Name used in log output.
    pub name: String,
    phrases: [String; 5],
}

impl HeaderVocabulary {
    /// Build a vocabulary from one phrase per column, in column order.
    pub fn new(name: impl Into<String>, phrases: [&str; 5]) -> Self {
        Self {
            name: name.into(),
            phrases: phrases.map(fold),
        }
    }

    pub fn english() -> Self {
        Self::new(
            "english",
            ["Question", "Answer A", "Answer B", "Answer C", "Correct Answer"],
        )
    }

    pub fn german() -> Self {
        Self::new(
            "german",
            ["Frage", "Antwort A", "Antwort B", "Antwort C", "Richtige Antwort"],
        )
    }

    /// The phrase for `column`, lowercased with whitespace removed.
    pub fn phrase(&self, column: Column) -> &str {
        &self.phrases[column.index()]
    }
}

/// Case-folded text with all whitespace removed, so `"Antwort A"`,
/// `"antwort  a"` and `"AntwortA"` compare equal.
fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Detected x boundaries of the five columns on one page.
///
/// Boundaries are strictly increasing in column order; the constructor
/// rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeaderSet {
    page: usize,
    boundaries: [f64; 5],
    row_bottom: f64,
}

impl HeaderSet {
    /// Returns `None` unless `boundaries` are strictly increasing.
    pub fn new(page: usize, boundaries: [f64; 5], row_bottom: f64) -> Option<Self> {
        boundaries
            .windows(2)
            .all(|w| w[0] < w[1])
            .then_some(Self {
                page,
                boundaries,
                row_bottom,
            })
    }

    /// Left edge of `column`.
    pub fn boundary(&self, column: Column) -> f64 {
        self.boundaries[column.index()]
    }

    pub fn boundaries(&self) -> [f64; 5] {
        self.boundaries
    }

    /// Page (1-based) the header row was detected on.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Lowest bottom edge of any header token.
    pub fn row_bottom(&self) -> f64 {
        self.row_bottom
    }
}

#[derive(Debug, Clone, Copy)]
struct PhraseMatch {
    first: BBox,
    bottom: f64,
}

enum Outcome {
    Found(HeaderSet),
    Misordered([f64; 5]),
    Missing,
}

/// Finds the header row on a page.
#[derive(Debug, Clone)]
pub struct HeaderLocator {
    vocabularies: Vec<HeaderVocabulary>,
    row_tolerance: f64,
    stacked_tolerance: f64,
}

impl HeaderLocator {
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            vocabularies: options.vocabularies.clone(),
            row_tolerance: options.row_tolerance,
            stacked_tolerance: options.stacked_header_tolerance,
        }
    }

    /// Locate a complete, ordered header row among `tokens` of page `page`.
    ///
    /// Vocabularies are tried in order and the first complete match wins. A
    /// row whose five phrases are all present but out of order yields `None`
    /// plus a [`DiagnosticCode::HeaderOrder`] warning.
    pub fn locate(&self, page: usize, tokens: &[Token]) -> Extracted<Option<HeaderSet>> {
        let mut ordered: Vec<&Token> = tokens.iter().filter(|t| !t.is_blank()).collect();
        ordered.sort_by(|a, b| {
            a.bbox
                .top
                .total_cmp(&b.bbox.top)
                .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        });

        let mut misordered = None;
        for vocabulary in &self.vocabularies {
            match self.locate_with(vocabulary, page, &ordered) {
                Outcome::Found(set) => {
                    debug!(
                        page,
                        vocabulary = %vocabulary.name,
                        boundaries = ?set.boundaries(),
                        "header row found"
                    );
                    return Extracted::ok(Some(set));
                }
                Outcome::Misordered(boundaries) => {
                    misordered.get_or_insert((vocabulary.name.clone(), boundaries));
                }
                Outcome::Missing => {}
            }
        }

        match misordered {
            Some((name, boundaries)) => Extracted::with_diagnostics(
                None,
                vec![Diagnostic::on_page(
                    DiagnosticCode::HeaderOrder,
                    format!("{name} header columns out of order at x {boundaries:?}"),
                    page,
                )],
            ),
            None => Extracted::ok(None),
        }
    }

    fn locate_with(&self, vocabulary: &HeaderVocabulary, page: usize, ordered: &[&Token]) -> Outcome {
        let candidates: Vec<Vec<PhraseMatch>> = Column::ALL
            .iter()
            .map(|&column| self.candidates(ordered, vocabulary.phrase(column)))
            .collect();

        let mut outcome = Outcome::Missing;
        for question in &candidates[Column::Question.index()] {
            let mut row = [*question; 5];
            let complete = Column::ALL[1..].iter().all(|&column| {
                match candidates[column.index()]
                    .iter()
                    .find(|m| m.first.overlaps_vertically(&question.first))
                {
                    Some(m) => {
                        row[column.index()] = *m;
                        true
                    }
                    None => false,
                }
            });
            if !complete {
                continue;
            }
            let boundaries = row.map(|m| m.first.x0);
            let row_bottom = row.iter().map(|m| m.bottom).fold(f64::NEG_INFINITY, f64::max);
            match HeaderSet::new(page, boundaries, row_bottom) {
                Some(set) => return Outcome::Found(set),
                None => outcome = Outcome::Misordered(boundaries),
            }
        }
        outcome
    }

    /// Every place in reading order where `phrase` starts.
    fn candidates(&self, ordered: &[&Token], phrase: &str) -> Vec<PhraseMatch> {
        if phrase.is_empty() {
            return Vec::new();
        }
        ordered
            .iter()
            .filter_map(|start| self.match_at(ordered, start, phrase))
            .collect()
    }

    fn match_at(&self, ordered: &[&Token], start: &Token, phrase: &str) -> Option<PhraseMatch> {
        let mut remaining = strip_token(phrase, start)?;
        let mut current = start;
        let mut bottom = start.bbox.bottom;
        while !remaining.is_empty() {
            let (next, rest) = self.next_word(ordered, current, remaining)?;
            bottom = bottom.max(next.bbox.bottom);
            current = next;
            remaining = rest;
        }
        Some(PhraseMatch {
            first: start.bbox,
            bottom,
        })
    }

    /// The token continuing a phrase after `current`: the nearest token to
    /// the right on the same row, or failing that the token stacked
    /// directly underneath.
    fn next_word<'t, 'p>(
        &self,
        ordered: &[&'t Token],
        current: &Token,
        remaining: &'p str,
    ) -> Option<(&'t Token, &'p str)> {
        let max_gap = current.bbox.height().max(self.row_tolerance);

        let right = ordered
            .iter()
            .filter(|t| {
                (t.bbox.top - current.bbox.top).abs() <= self.row_tolerance
                    && t.bbox.x0 > current.bbox.x0
                    && t.bbox.x0 - current.bbox.x1 <= max_gap
            })
            .min_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        if let Some(token) = right {
            if let Some(rest) = strip_token(remaining, token) {
                return Some((token, rest));
            }
        }

        let below = ordered
            .iter()
            .filter(|t| {
                t.bbox.top > current.bbox.top + self.row_tolerance
                    && t.bbox.top - current.bbox.bottom <= max_gap
                    && (t.bbox.x0 - current.bbox.x0).abs() <= self.stacked_tolerance
            })
            .min_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top))?;
        let rest = strip_token(remaining, below)?;
        Some((below, rest))
    }
}

/// The rest of `phrase` once the folded text of `token` is consumed from
/// its front.
fn strip_token<'p>(phrase: &'p str, token: &Token) -> Option<&'p str> {
    let text = fold(&token.text);
    if text.is_empty() {
        return None;
    }
    phrase.strip_prefix(text.as_str())
}

/// Carries the most recently detected [`HeaderSet`] across pages.
#[derive(Debug, Clone, Default)]
pub struct HeaderTracker {
    current: Option<HeaderSet>,
    detections: usize,
}

impl HeaderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the detection result of one page and return the set in force
    /// for that page.
    pub fn observe(&mut self, detected: Option<HeaderSet>) -> Option<HeaderSet> {
        if let Some(set) = detected {
            self.current = Some(set);
            self.detections += 1;
        }
        self.current
    }

    pub fn current(&self) -> Option<HeaderSet> {
        self.current
    }

    /// Whether any page so far carried a header row.
    pub fn ever_found(&self) -> bool {
        self.detections > 0
    }

    /// Number of pages that carried a header row.
    pub fn detections(&self) -> usize {
        self.detections
    }
}
