//! Error and diagnostic types for examcard.
//!
//! Provides [`ExamError`] for fatal errors that stop a run,
//! [`Diagnostic`] for non-fatal issues that are collected while extraction
//! continues, and [`Extracted`] for pairing a value with its diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fatal error types for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamError {
    /// No column header row was found anywhere in the processed pages.
    NoHeaders {
        /// Number of pages that were scanned.
        pages_scanned: usize,
    },
    /// Error parsing the input document.
    ParseError(String),
    /// I/O error reading input or writing output.
    IoError(String),
    /// Error encoding the record collection.
    SerializeError(String),
    /// Error decoding or encoding image data.
    ImageError(String),
    /// Any other error not covered by specific variants.
    Other(String),
}

impl fmt::Display for ExamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamError::NoHeaders { pages_scanned } => write!(
                f,
                "no column header row found in {pages_scanned} scanned page(s)"
            ),
            ExamError::ParseError(msg) => write!(f, "parse error: {msg}"),
            ExamError::IoError(msg) => write!(f, "I/O error: {msg}"),
            ExamError::SerializeError(msg) => write!(f, "serialization error: {msg}"),
            ExamError::ImageError(msg) => write!(f, "image error: {msg}"),
            ExamError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ExamError {}

impl From<std::io::Error> for ExamError {
    fn from(err: std::io::Error) -> Self {
        ExamError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ExamError {
    fn from(err: serde_json::Error) -> Self {
        ExamError::SerializeError(err.to_string())
    }
}

impl From<image::ImageError> for ExamError {
    fn from(err: image::ImageError) -> Self {
        ExamError::ImageError(err.to_string())
    }
}

/// How a non-fatal issue affected the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Recorded for audit; no record was dropped because of it.
    Warning,
    /// An anchor or a whole page was skipped.
    PageSkip,
    /// A sealed record failed validation and was dropped.
    RecordInvalid,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::PageSkip => "page-skip",
            Severity::RecordInvalid => "record-invalid",
        })
    }
}

/// Machine-readable code categorizing a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// An anchor skipped one or more ordinals of its series.
    SequenceGap,
    /// An anchor label repeated the running maximum of its series.
    DuplicateAnchor,
    /// An anchor ordinal went backwards and was dropped as noise.
    RegressedAnchor,
    /// A header row was found but its columns were out of order.
    HeaderOrder,
    /// An anchor-shaped label sat right of the question column and was read
    /// as answer text.
    MisplacedAnchor,
    /// A picture question had no qualifying raster.
    MissingImage,
    /// A qualifying raster could not be decoded for compositing.
    UndecodableImage,
    /// The correct-answer column and an answer checkmark disagreed.
    ConflictingCorrectAnswer,
    /// Anchors were found before any header row had been seen.
    HeaderLayout,
    /// The vertical span of an anchor was empty or negative.
    MalformedSpan,
    /// The page could not be read from the source.
    PageUnreadable,
    /// A record continued past the page-count limit.
    TruncatedByPageLimit,
    /// A sealed record failed validation.
    InvalidRecord,
}

impl DiagnosticCode {
    /// Returns the string tag for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::SequenceGap => "SEQUENCE_GAP",
            DiagnosticCode::DuplicateAnchor => "DUPLICATE_ANCHOR",
            DiagnosticCode::RegressedAnchor => "REGRESSED_ANCHOR",
            DiagnosticCode::HeaderOrder => "HEADER_ORDER",
            DiagnosticCode::MisplacedAnchor => "MISPLACED_ANCHOR",
            DiagnosticCode::MissingImage => "MISSING_IMAGE",
            DiagnosticCode::UndecodableImage => "UNDECODABLE_IMAGE",
            DiagnosticCode::ConflictingCorrectAnswer => "CONFLICTING_CORRECT_ANSWER",
            DiagnosticCode::HeaderLayout => "HEADER_LAYOUT",
            DiagnosticCode::MalformedSpan => "MALFORMED_SPAN",
            DiagnosticCode::PageUnreadable => "PAGE_UNREADABLE",
            DiagnosticCode::TruncatedByPageLimit => "TRUNCATED_BY_PAGE_LIMIT",
            DiagnosticCode::InvalidRecord => "INVALID_RECORD",
        }
    }

    /// The severity implied by this code.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::SequenceGap
            | DiagnosticCode::DuplicateAnchor
            | DiagnosticCode::RegressedAnchor
            | DiagnosticCode::HeaderOrder
            | DiagnosticCode::MisplacedAnchor
            | DiagnosticCode::MissingImage
            | DiagnosticCode::UndecodableImage
            | DiagnosticCode::ConflictingCorrectAnswer => Severity::Warning,
            DiagnosticCode::HeaderLayout
            | DiagnosticCode::MalformedSpan
            | DiagnosticCode::PageUnreadable
            | DiagnosticCode::TruncatedByPageLimit => Severity::PageSkip,
            DiagnosticCode::InvalidRecord => Severity::RecordInvalid,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal issue encountered during a run.
///
/// Diagnostics are accumulated instead of raised so that one bad page never
/// prevents extraction of the rest of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Machine-readable code.
    pub code: DiagnosticCode,
    /// Severity derived from `code`.
    pub severity: Severity,
    /// Human-readable description.
    pub description: String,
    /// Page number (1-based) the issue belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Anchor label or record id the issue belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic with just a code and description.
    pub fn new(code: DiagnosticCode, description: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            description: description.into(),
            page: None,
            label: None,
        }
    }

    /// Create a diagnostic with page context.
    pub fn on_page(code: DiagnosticCode, description: impl Into<String>, page: usize) -> Self {
        Self::new(code, description).with_page(page)
    }

    /// Create a diagnostic attached to an anchor label on a page.
    pub fn for_label(
        code: DiagnosticCode,
        description: impl Into<String>,
        page: usize,
        label: impl Into<String>,
    ) -> Self {
        Self::new(code, description)
            .with_page(page)
            .with_label(label)
    }

    /// Set the page, returning the modified diagnostic (builder pattern).
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the label, returning the modified diagnostic (builder pattern).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(page) = self.page {
            write!(f, " (page {page})")?;
        }
        if let Some(ref label) = self.label {
            write!(f, " [{label}]")?;
        }
        Ok(())
    }
}

/// Wrapper that pairs a value with the diagnostics collected producing it.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    /// The extracted value.
    pub value: T,
    /// Diagnostics collected during extraction.
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Extracted<T> {
    /// Create a result with no diagnostics.
    pub fn ok(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    /// Create a result with diagnostics.
    pub fn with_diagnostics(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// Returns true if there are no diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Transform the value while preserving diagnostics.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        Extracted {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}
