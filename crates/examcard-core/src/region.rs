//! Per-question rectangles derived from the header boundaries and anchors.

use std::fmt;

use serde::Serialize;

use crate::anchor::{Anchor, AnchorKind};
use crate::error::{Diagnostic, DiagnosticCode, Extracted};
use crate::geometry::BBox;
use crate::header::{Column, HeaderSet};
use crate::options::LayoutOptions;
use crate::record::AnswerKey;
use crate::text::{tokens_in, visual_lines};
use crate::token::PageContent;

/// What a region is extracted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Question,
    Answer(AnswerKey),
    CorrectAnswer,
    Image,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Question => f.write_str("question"),
            Field::Answer(key) => write!(f, "answer{key}"),
            Field::CorrectAnswer => f.write_str("correctAnswer"),
            Field::Image => f.write_str("image"),
        }
    }
}

/// A half-open rectangle on one page belonging to one anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub label: String,
    pub field: Field,
    pub page: usize,
    pub bbox: BBox,
}

/// The five text columns of one horizontal band.
#[derive(Debug, Clone, PartialEq)]
pub struct TextColumns {
    pub question: Region,
    /// Answer regions in A, B, C order.
    pub answers: [Region; 3],
    pub correct: Region,
}

impl TextColumns {
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        std::iter::once(&self.question)
            .chain(self.answers.iter())
            .chain(std::iter::once(&self.correct))
    }
}

/// All regions of one anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRegions {
    pub anchor: Anchor,
    pub text: TextColumns,
    /// Only for picture anchors with room below their text block.
    pub image: Option<Region>,
}

impl QuestionRegions {
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.text.iter().chain(self.image.iter())
    }
}

/// Builds regions for the anchors of one page.
#[derive(Debug, Clone)]
pub struct RegionBuilder {
    row_tolerance: f64,
    paragraph_gap: f64,
    correct_column_width: f64,
}

impl RegionBuilder {
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            row_tolerance: options.row_tolerance,
            paragraph_gap: options.paragraph_gap,
            correct_column_width: options.correct_column_width,
        }
    }

    /// Regions for `anchors` (in reading order) on `page`.
    ///
    /// An anchor's band runs from its top to the top of the next anchor
    /// outside its row, or to the page bottom. Anchors with an empty band
    /// are skipped with a [`DiagnosticCode::MalformedSpan`] diagnostic.
    pub fn build(
        &self,
        headers: &HeaderSet,
        anchors: &[Anchor],
        page: &PageContent,
    ) -> Extracted<Vec<QuestionRegions>> {
        let mut out = Vec::with_capacity(anchors.len());
        let mut diagnostics = Vec::new();

        for (i, anchor) in anchors.iter().enumerate() {
            let top = anchor.bbox.top;
            let end = anchors[i + 1..]
                .iter()
                .find(|next| !next.bbox.overlaps_vertically(&anchor.bbox))
                .map_or(page.height, |next| next.bbox.top)
                .min(page.height);

            if end <= top {
                diagnostics.push(Diagnostic::for_label(
                    DiagnosticCode::MalformedSpan,
                    format!("vertical span {top:.1}..{end:.1} is empty"),
                    page.number,
                    anchor.label.clone(),
                ));
                continue;
            }

            let (text_bottom, image) = match anchor.kind {
                AnchorKind::Numeric => (end, None),
                AnchorKind::Picture => {
                    let bottom = self.text_block_bottom(headers, anchor, end, page);
                    let image = (bottom < end).then(|| Region {
                        label: anchor.label.clone(),
                        field: Field::Image,
                        page: page.number,
                        bbox: BBox::new(headers.boundary(Column::Question), bottom, page.width, end),
                    });
                    (if image.is_some() { bottom } else { end }, image)
                }
            };

            out.push(QuestionRegions {
                anchor: anchor.clone(),
                text: self.text_columns(headers, page, &anchor.label, top, text_bottom),
                image,
            });
        }

        Extracted::with_diagnostics(out, diagnostics)
    }

    /// The five text columns of the band `[top, bottom)` on `page`.
    pub fn text_columns(
        &self,
        headers: &HeaderSet,
        page: &PageContent,
        label: &str,
        top: f64,
        bottom: f64,
    ) -> TextColumns {
        let region = |field: Field, x0: f64, x1: f64| Region {
            label: label.to_string(),
            field,
            page: page.number,
            bbox: BBox::new(x0, top, x1, bottom),
        };
        let x = |column: Column| headers.boundary(column);
        let correct_x = x(Column::CorrectAnswer);

        TextColumns {
            question: region(Field::Question, x(Column::Question), x(Column::AnswerA)),
            answers: [
                region(Field::Answer(AnswerKey::A), x(Column::AnswerA), x(Column::AnswerB)),
                region(Field::Answer(AnswerKey::B), x(Column::AnswerB), x(Column::AnswerC)),
                region(
                    Field::Answer(AnswerKey::C),
                    x(Column::AnswerC),
                    x(Column::CorrectAnswer),
                ),
            ],
            correct: region(
                Field::CorrectAnswer,
                correct_x,
                (correct_x + self.correct_column_width).min(page.width),
            ),
        }
    }

    /// Bottom of the contiguous text block starting at the anchor row.
    fn text_block_bottom(&self, headers: &HeaderSet, anchor: &Anchor, end: f64, page: &PageContent) -> f64 {
        let area = BBox::new(
            headers.boundary(Column::Question),
            anchor.bbox.top,
            page.width,
            end,
        );
        let mut bottom = anchor.bbox.bottom;
        for line in visual_lines(tokens_in(&area, &page.tokens), self.row_tolerance) {
            if line.top - bottom > self.paragraph_gap {
                break;
            }
            bottom = bottom.max(line.bottom);
        }
        bottom.min(end)
    }
}
