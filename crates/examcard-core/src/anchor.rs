//! Question-number anchors and per-series continuity tracking.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, DiagnosticCode, ExamError, Extracted};
use crate::geometry::BBox;
use crate::token::Token;

/// Default pattern for the numeric series (`1.001`).
pub const NUMERIC_PATTERN: &str = r"^(\d+)\.(\d{3})$";
/// Default pattern for the picture series (`B1.3`).
pub const PICTURE_PATTERN: &str = r"^B(\d+)\.(\d+)$";

/// The two independent anchor series.
///
/// Ordered so that numeric records sort before picture records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    #[default]
    Numeric,
    Picture,
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnchorKind::Numeric => "numeric",
            AnchorKind::Picture => "picture",
        })
    }
}

/// Position of an anchor within its series: `(section, number)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Ordinal {
    pub section: u32,
    pub number: u32,
}

impl Ordinal {
    pub fn new(section: u32, number: u32) -> Self {
        Self { section, number }
    }

    /// Whether `next` directly follows `self`: the next number in the same
    /// section, or the first number of the next section.
    pub fn is_followed_by(&self, next: &Ordinal) -> bool {
        (next.section == self.section && Some(next.number) == self.number.checked_add(1))
            || (Some(next.section) == self.section.checked_add(1) && next.number == 1)
    }

    /// Render as a label of the given series.
    pub fn label(&self, kind: AnchorKind) -> String {
        match kind {
            AnchorKind::Numeric => format!("{}.{:03}", self.section, self.number),
            AnchorKind::Picture => format!("B{}.{}", self.section, self.number),
        }
    }
}

/// A question-number token on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Label exactly as printed, e.g. `1.002` or `B2.1`.
    pub label: String,
    pub kind: AnchorKind,
    /// Page number (1-based).
    pub page: usize,
    pub bbox: BBox,
    pub ordinal: Ordinal,
}

/// Finds anchor tokens on a page and puts them in reading order.
#[derive(Debug, Clone)]
pub struct AnchorLocator {
    numeric: Regex,
    picture: Regex,
}

impl AnchorLocator {
    /// Build a locator from one pattern per series. Each pattern must
    /// capture the section and the number as its first two groups.
    pub fn new(numeric: &str, picture: &str) -> Result<Self, ExamError> {
        let compile =
            |p: &str| Regex::new(p).map_err(|e| ExamError::Other(format!("anchor pattern: {e}")));
        Ok(Self {
            numeric: compile(numeric)?,
            picture: compile(picture)?,
        })
    }

    /// Locator with [`NUMERIC_PATTERN`] and [`PICTURE_PATTERN`].
    pub fn with_default_patterns() -> Result<Self, ExamError> {
        Self::new(NUMERIC_PATTERN, PICTURE_PATTERN)
    }

    /// Classify a single token, if its whole text is an anchor label.
    pub fn classify(&self, token: &Token) -> Option<Anchor> {
        let label = token.text.trim();
        let (kind, caps) = if let Some(caps) = self.numeric.captures(label) {
            (AnchorKind::Numeric, caps)
        } else {
            (AnchorKind::Picture, self.picture.captures(label)?)
        };
        let section = caps.get(1)?.as_str().parse().ok()?;
        let number = caps.get(2)?.as_str().parse().ok()?;
        Some(Anchor {
            label: label.to_string(),
            kind,
            page: token.page,
            bbox: token.bbox,
            ordinal: Ordinal::new(section, number),
        })
    }

    /// All anchors among `tokens`, in reading order.
    pub fn locate(&self, tokens: &[Token]) -> Vec<Anchor> {
        let anchors = tokens.iter().filter_map(|t| self.classify(t)).collect();
        reading_order(anchors)
    }
}

/// Order anchors into rows top to bottom and left to right within a row.
///
/// Anchors whose vertical bands overlap share a row, so two labels printed
/// side by side keep their left-to-right order even when their tops differ
/// slightly.
pub fn reading_order(mut anchors: Vec<Anchor>) -> Vec<Anchor> {
    anchors.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top));

    let mut rows: Vec<(BBox, Vec<Anchor>)> = Vec::new();
    for anchor in anchors {
        match rows.last_mut() {
            Some((band, row)) if band.overlaps_vertically(&anchor.bbox) => {
                *band = band.union(&anchor.bbox);
                row.push(anchor);
            }
            _ => rows.push((anchor.bbox, vec![anchor])),
        }
    }

    rows.into_iter()
        .flat_map(|(_, mut row)| {
            row.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            row
        })
        .collect()
}

/// Result of offering an anchor to a [`SeriesTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Direct successor of the running maximum (or the first anchor).
    InSequence,
    /// Accepted, but one or more ordinals were skipped.
    Gap { expected: String },
    /// Equal to the running maximum; rejected.
    Duplicate,
    /// Below the running maximum; rejected.
    Regressed { max: String },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::InSequence | Admission::Gap { .. })
    }
}

/// Running maximum of one anchor series across the whole document.
#[derive(Debug, Clone)]
pub struct SeriesTracker {
    kind: AnchorKind,
    max: Option<Ordinal>,
}

impl SeriesTracker {
    pub fn new(kind: AnchorKind) -> Self {
        Self { kind, max: None }
    }

    pub fn max(&self) -> Option<Ordinal> {
        self.max
    }

    /// Offer the next ordinal of the series.
    pub fn admit(&mut self, ordinal: Ordinal) -> Admission {
        let Some(max) = self.max else {
            self.max = Some(ordinal);
            return Admission::InSequence;
        };
        match ordinal.cmp(&max) {
            Ordering::Equal => Admission::Duplicate,
            Ordering::Less => Admission::Regressed {
                max: max.label(self.kind),
            },
            Ordering::Greater => {
                self.max = Some(ordinal);
                if max.is_followed_by(&ordinal) {
                    Admission::InSequence
                } else {
                    Admission::Gap {
                        expected: next_labels(max, self.kind),
                    }
                }
            }
        }
    }
}

fn next_labels(max: Ordinal, kind: AnchorKind) -> String {
    let same = Ordinal::new(max.section, max.number.saturating_add(1)).label(kind);
    let next = Ordinal::new(max.section.saturating_add(1), 1).label(kind);
    format!("{same} or {next}")
}

/// Continuity checking for both series at once.
#[derive(Debug, Clone)]
pub struct AnchorSequencer {
    numeric: SeriesTracker,
    picture: SeriesTracker,
}

impl Default for AnchorSequencer {
    fn default() -> Self {
        Self {
            numeric: SeriesTracker::new(AnchorKind::Numeric),
            picture: SeriesTracker::new(AnchorKind::Picture),
        }
    }
}

impl AnchorSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass one page's anchors (in reading order) through the trackers,
    /// dropping duplicates and regressions.
    pub fn sequence(&mut self, anchors: Vec<Anchor>) -> Extracted<Vec<Anchor>> {
        let mut kept = Vec::with_capacity(anchors.len());
        let mut diagnostics = Vec::new();

        for anchor in anchors {
            let tracker = match anchor.kind {
                AnchorKind::Numeric => &mut self.numeric,
                AnchorKind::Picture => &mut self.picture,
            };
            let diagnostic = match tracker.admit(anchor.ordinal) {
                Admission::InSequence => None,
                Admission::Gap { expected } => Some((
                    DiagnosticCode::SequenceGap,
                    format!("expected {expected}, found {}", anchor.label),
                )),
                Admission::Duplicate => Some((
                    DiagnosticCode::DuplicateAnchor,
                    format!("{} repeats the previous anchor; dropped", anchor.label),
                )),
                Admission::Regressed { max } => Some((
                    DiagnosticCode::RegressedAnchor,
                    format!("{} is below {max}; dropped", anchor.label),
                )),
            };
            let accepted = !matches!(
                diagnostic,
                Some((DiagnosticCode::DuplicateAnchor | DiagnosticCode::RegressedAnchor, _))
            );
            if let Some((code, description)) = diagnostic {
                diagnostics.push(Diagnostic::for_label(
                    code,
                    description,
                    anchor.page,
                    anchor.label.clone(),
                ));
            }
            if accepted {
                kept.push(anchor);
            }
        }

        Extracted::with_diagnostics(kept, diagnostics)
    }
}
