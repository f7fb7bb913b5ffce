//! Question records: drafts, validation, and the ordered output collection.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::anchor::{Anchor, AnchorKind, Ordinal};
use crate::error::{Diagnostic, DiagnosticCode, ExamError};

/// One of the three answer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnswerKey {
    A,
    B,
    C,
}

impl AnswerKey {
    pub const ALL: [AnswerKey; 3] = [AnswerKey::A, AnswerKey::B, AnswerKey::C];

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerKey::A => "A",
            AnswerKey::B => "B",
            AnswerKey::C => "C",
        }
    }

    /// Parse an uppercase slot letter.
    pub fn from_letter(s: &str) -> Option<Self> {
        match s {
            "A" => Some(AnswerKey::A),
            "B" => Some(AnswerKey::B),
            "C" => Some(AnswerKey::C),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three answer texts, serialized as `{"A": .., "B": .., "C": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Answers {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
}

impl Answers {
    pub fn get(&self, key: AnswerKey) -> &str {
        match key {
            AnswerKey::A => &self.a,
            AnswerKey::B => &self.b,
            AnswerKey::C => &self.c,
        }
    }
}

/// A validated question record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRecord {
    /// The anchor label, e.g. `1.002` or `B2.1`.
    pub id: String,
    /// Page (1-based) the anchor was found on.
    pub page: usize,
    pub text: String,
    pub answers: Answers,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: AnswerKey,
    /// File name of the image asset, for picture questions.
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip)]
    pub kind: AnchorKind,
    #[serde(skip)]
    pub ordinal: Ordinal,
}

/// A record under construction.
///
/// Created when an anchor is resolved and filled in by the extractors; it
/// stays open while the following page may still add continuation text.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub anchor: Anchor,
    pub text: String,
    answers: [String; 3],
    column_answer: Option<AnswerKey>,
    marked: BTreeSet<AnswerKey>,
    pub image_ref: Option<String>,
}

impl RecordDraft {
    pub fn new(anchor: Anchor) -> Self {
        Self {
            anchor,
            text: String::new(),
            answers: Default::default(),
            column_answer: None,
            marked: BTreeSet::new(),
            image_ref: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.anchor.label
    }

    /// Append question text, separated from existing text by a space.
    pub fn append_text(&mut self, text: &str) {
        append(&mut self.text, text);
    }

    /// Append text to an answer slot, separated by a space.
    pub fn append_answer(&mut self, key: AnswerKey, text: &str) {
        append(&mut self.answers[key.index()], text);
    }

    pub fn answer(&self, key: AnswerKey) -> &str {
        &self.answers[key.index()]
    }

    /// Record a checkmark on an answer slot.
    pub fn mark(&mut self, key: AnswerKey) {
        self.marked.insert(key);
    }

    /// Record the letter from the correct-answer column. The first letter
    /// seen is kept.
    pub fn set_column_answer(&mut self, key: AnswerKey) {
        self.column_answer.get_or_insert(key);
    }

    pub fn column_answer(&self) -> Option<AnswerKey> {
        self.column_answer
    }

    /// Resolve the correct answer from the column letter and checkmarks.
    ///
    /// The column wins over checkmarks; a disagreement yields a
    /// [`DiagnosticCode::ConflictingCorrectAnswer`] warning. Without a
    /// column letter a single checkmark decides.
    pub fn resolve_correct(&self) -> (Result<AnswerKey, Violation>, Option<Diagnostic>) {
        match self.column_answer {
            Some(key) => {
                let conflict = !self.marked.is_empty()
                    && !(self.marked.len() == 1 && self.marked.contains(&key));
                let warning = conflict.then(|| {
                    let marks: Vec<&str> = self.marked.iter().map(|k| k.as_str()).collect();
                    Diagnostic::for_label(
                        DiagnosticCode::ConflictingCorrectAnswer,
                        format!(
                            "column says {key}, checkmark on {}; using {key}",
                            marks.join(",")
                        ),
                        self.anchor.page,
                        self.anchor.label.clone(),
                    )
                });
                (Ok(key), warning)
            }
            None => match self.marked.len() {
                0 => (Err(Violation::MissingCorrectAnswer), None),
                1 => (
                    self.marked
                        .first()
                        .copied()
                        .ok_or(Violation::MissingCorrectAnswer),
                    None,
                ),
                _ => (
                    Err(Violation::AmbiguousCorrectAnswer(
                        self.marked.iter().copied().collect(),
                    )),
                    None,
                ),
            },
        }
    }
}

fn append(field: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(text);
}

/// Reason a draft failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    EmptyText,
    MissingAnswer(AnswerKey),
    MissingCorrectAnswer,
    AmbiguousCorrectAnswer(Vec<AnswerKey>),
    MissingImage,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::EmptyText => write!(f, "question text is empty"),
            Violation::MissingAnswer(key) => write!(f, "answer {key} is empty"),
            Violation::MissingCorrectAnswer => write!(f, "no correct answer marker"),
            Violation::AmbiguousCorrectAnswer(keys) => {
                let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
                write!(f, "several answers marked correct ({})", keys.join(","))
            }
            Violation::MissingImage => write!(f, "picture question has no image"),
        }
    }
}

/// Check a draft and turn it into a record.
///
/// `image_required` applies to picture-series drafts only. Every violation
/// is reported, not just the first.
pub fn validate(draft: &RecordDraft, image_required: bool) -> Result<QuestionRecord, Vec<Violation>> {
    let mut violations = Vec::new();

    if draft.text.trim().is_empty() {
        violations.push(Violation::EmptyText);
    }
    for key in AnswerKey::ALL {
        if draft.answer(key).trim().is_empty() {
            violations.push(Violation::MissingAnswer(key));
        }
    }
    let (correct, _) = draft.resolve_correct();
    let correct = correct.map_err(|v| violations.push(v)).ok();
    if draft.anchor.kind == AnchorKind::Picture && image_required && draft.image_ref.is_none() {
        violations.push(Violation::MissingImage);
    }

    match correct {
        Some(correct_answer) if violations.is_empty() => Ok(QuestionRecord {
            id: draft.anchor.label.clone(),
            page: draft.anchor.page,
            text: draft.text.clone(),
            answers: Answers {
                a: draft.answer(AnswerKey::A).to_string(),
                b: draft.answer(AnswerKey::B).to_string(),
                c: draft.answer(AnswerKey::C).to_string(),
            },
            correct_answer,
            image_ref: draft.image_ref.clone(),
            kind: draft.anchor.kind,
            ordinal: draft.anchor.ordinal,
        }),
        _ => Err(violations),
    }
}

/// The ordered output collection.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<QuestionRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: QuestionRecord) {
        self.records.push(record);
    }

    /// Sort numeric series first, then picture series, each by ordinal.
    pub fn sort(&mut self) {
        self.records.sort_by_key(|r| (r.kind, r.ordinal));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: &str) -> Option<&QuestionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn as_slice(&self) -> &[QuestionRecord] {
        &self.records
    }

    /// Serialize as a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String, ExamError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a QuestionRecord;
    type IntoIter = std::slice::Iter<'a, QuestionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
