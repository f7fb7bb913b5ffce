//! Page-at-a-time driver threading header, anchor and draft state across
//! the document.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anchor::{Anchor, AnchorKind, AnchorLocator, AnchorSequencer};
use crate::error::{Diagnostic, DiagnosticCode, ExamError, Severity};
use crate::header::{Column, HeaderLocator, HeaderSet, HeaderTracker};
use crate::images::ImageAsset;
use crate::options::LayoutOptions;
use crate::picture::ImageExtractor;
use crate::record::{AnswerKey, RecordDraft, RecordSet, validate};
use crate::region::{Region, RegionBuilder, TextColumns};
use crate::text::TextExtractor;
use crate::token::{PageContent, PageSource, Token};

/// Counts and diagnostics of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Pages in the document.
    pub pages_total: usize,
    /// Pages read and analysed (at most the page limit).
    pub pages_processed: usize,
    /// Pages that carried a header row.
    pub header_pages: usize,
    /// Anchors accepted by the sequence check.
    pub anchors: usize,
    /// Records in the output.
    pub records: usize,
    /// Image assets in the output.
    pub images: usize,
    pub warnings: usize,
    pub page_skips: usize,
    pub invalid_records: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSummary {
    /// Diagnostics with the given severity.
    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity == severity)
    }

    /// Diagnostics with the given code.
    pub fn by_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    pub fn to_json(&self) -> Result<String, ExamError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Output of a run: ordered records, their image files and the summary.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: RecordSet,
    pub assets: Vec<ImageAsset>,
    pub summary: RunSummary,
}

/// A draft together with the image built for it.
#[derive(Debug, Clone)]
struct Pending {
    draft: RecordDraft,
    asset: Option<ImageAsset>,
}

/// Where the anchors and body text of a page are.
struct PageLayout {
    /// Upper edge of content below the header row (or the top margin).
    content_top: f64,
    /// Anchor candidates in reading order, before the sequence check.
    anchors: Vec<Anchor>,
    /// Anchor-shaped labels at or right of the first answer column.
    misplaced: Vec<Anchor>,
    /// Tokens that are not anchor labels.
    body: Vec<Token>,
}


/// Cross-page extraction state.
///
/// Pages must be fed in document order. The open draft is the last record
/// of the previous page, still accepting continuation text.
pub struct Pipeline {
    options: LayoutOptions,
    header_locator: HeaderLocator,
    anchor_locator: AnchorLocator,
    region_builder: RegionBuilder,
    text: TextExtractor,
    images: ImageExtractor,
    headers: HeaderTracker,
    sequencer: AnchorSequencer,
    open: Option<Pending>,
    records: RecordSet,
    assets: Vec<ImageAsset>,
    diagnostics: Vec<Diagnostic>,
    pages_processed: usize,
    anchors_accepted: usize,
}

impl Pipeline {
    pub fn new(options: LayoutOptions) -> Result<Self, ExamError> {
        Ok(Self {
            header_locator: HeaderLocator::new(&options),
            anchor_locator: AnchorLocator::with_default_patterns()?,
            region_builder: RegionBuilder::new(&options),
            text: TextExtractor::new(&options),
            images: ImageExtractor::new(&options),
            options,
            headers: HeaderTracker::new(),
            sequencer: AnchorSequencer::new(),
            open: None,
            records: RecordSet::new(),
            assets: Vec::new(),
            diagnostics: Vec::new(),
            pages_processed: 0,
            anchors_accepted: 0,
        })
    }

    /// Walk `source` up to the page limit and return the finished records.
    ///
    /// Fails with [`ExamError::NoHeaders`] when no processed page carried a
    /// header row. Every other problem becomes a diagnostic.
    pub fn run<S: PageSource + ?Sized>(mut self, source: &S) -> Result<Extraction, ExamError> {
        let total = source.page_count();
        let limit = self.options.max_pages.map_or(total, |max| max.min(total));
        info!(pages = limit, total, "scanning pages for questions");

        for index in 0..limit {
            let number = index + 1;
            if number % 20 == 0 {
                info!("scanned {number} pages");
            }
            match source.page(index) {
                Ok(page) => self.process_page(&page),
                Err(e) => {
                    warn!(page = number, error = %e, "page unreadable");
                    self.diagnostics.push(Diagnostic::on_page(
                        DiagnosticCode::PageUnreadable,
                        e.to_string(),
                        number,
                    ));
                    if let Some(pending) = self.open.take() {
                        self.seal(pending);
                    }
                }
            }
        }

        if !self.headers.ever_found() {
            return Err(ExamError::NoHeaders {
                pages_scanned: limit,
            });
        }

        if let Some(pending) = self.open.take() {
            if limit < total && self.continues_on(source, limit, &pending.draft) {
                warn!(label = pending.draft.label(), "record crosses the page limit; dropped");
                self.diagnostics.push(Diagnostic::for_label(
                    DiagnosticCode::TruncatedByPageLimit,
                    format!("continues on page {} beyond the limit of {limit}", limit + 1),
                    pending.draft.anchor.page,
                    pending.draft.label(),
                ));
            } else {
                self.seal(pending);
            }
        }

        Ok(self.finish(total))
    }

    /// Analyse one page and update the cross-page state.
    pub fn process_page(&mut self, page: &PageContent) {
        self.pages_processed += 1;

        let detection = self.header_locator.locate(page.number, &page.tokens);
        self.diagnostics.extend(detection.diagnostics);
        let detected = detection.value;

        let Some(headers) = self.headers.observe(detected) else {
            let anchors = self.anchor_locator.locate(&page.tokens);
            for anchor in &anchors {
                self.diagnostics.push(Diagnostic::for_label(
                    DiagnosticCode::HeaderLayout,
                    "anchor found before any header row",
                    page.number,
                    anchor.label.clone(),
                ));
            }
            if !anchors.is_empty() {
                warn!(page = page.number, anchors = anchors.len(), "no header row yet; page skipped");
            }
            return;
        };

        let layout = self.layout(page, detected, &headers);
        for anchor in &layout.misplaced {
            self.diagnostics.push(Diagnostic::for_label(
                DiagnosticCode::MisplacedAnchor,
                format!(
                    "{} starts at x {:.1}, right of the question column; read as answer text",
                    anchor.label, anchor.bbox.x0
                ),
                page.number,
                anchor.label.clone(),
            ));
        }
        let sequenced = self.sequencer.sequence(layout.anchors.clone());
        self.diagnostics.extend(sequenced.diagnostics);
        let anchors = sequenced.value;
        self.anchors_accepted += anchors.len();
        debug!(
            page = page.number,
            header = detected.is_some(),
            anchors = anchors.len(),
            "page analysed"
        );

        let first_top = first_anchor_top(&anchors, page);
        if let Some(mut pending) = self.open.take() {
            if first_top > layout.content_top {
                let columns = self.region_builder.text_columns(
                    &headers,
                    page,
                    pending.draft.label(),
                    layout.content_top,
                    first_top,
                );
                if self.fill(&mut pending.draft, &columns, &layout.body) {
                    debug!(label = pending.draft.label(), page = page.number, "continuation text");
                }
            }
            if anchors.is_empty() {
                self.open = Some(pending);
            } else {
                self.seal(pending);
            }
        }

        let built = self.region_builder.build(&headers, &anchors, page);
        self.diagnostics.extend(built.diagnostics);

        let image_regions: Vec<&Region> = built.value.iter().filter_map(|q| q.image.as_ref()).collect();
        let mut assigned = self.images.assign(&image_regions, &page.rasters).into_iter();

        let count = built.value.len();
        for (i, regions) in built.value.iter().enumerate() {
            let mut draft = RecordDraft::new(regions.anchor.clone());
            self.fill(&mut draft, &regions.text, &layout.body);

            let mut asset = None;
            if regions.anchor.kind == AnchorKind::Picture {
                let rasters = if regions.image.is_some() {
                    assigned.next().unwrap_or_default()
                } else {
                    Vec::new()
                };
                let composed = self.images.compose(&regions.anchor.label, page.number, &rasters);
                self.diagnostics.extend(composed.diagnostics);
                if let Some(image) = composed.value {
                    draft.image_ref = Some(image.file_name.clone());
                    asset = Some(image);
                }
            }

            let pending = Pending { draft, asset };
            if i + 1 == count {
                self.open = Some(pending);
            } else {
                self.seal(pending);
            }
        }
    }

    /// Anchor candidates and body tokens of a page under `headers`.
    ///
    /// Anchors must start left of the first answer column and below the
    /// header row; anything else matching an anchor pattern is answer text.
    fn layout(&self, page: &PageContent, detected: Option<HeaderSet>, headers: &HeaderSet) -> PageLayout {
        let content_top = detected.map_or(self.options.top_margin, |h| h.row_bottom());
        let answer_a = headers.boundary(Column::AnswerA);

        let (anchors, misplaced): (Vec<Anchor>, Vec<Anchor>) = self
            .anchor_locator
            .locate(&page.tokens)
            .into_iter()
            .filter(|a| a.bbox.top >= content_top)
            .partition(|a| a.bbox.x0 < answer_a);
        let body = page
            .tokens
            .iter()
            .filter(|t| {
                !anchors
                    .iter()
                    .any(|a| a.bbox == t.bbox && a.label == t.text.trim())
            })
            .cloned()
            .collect();

        PageLayout {
            content_top,
            anchors,
            misplaced,
            body,
        }
    }

    /// Extract the text columns into `draft`. Returns whether any text or
    /// correct-answer letter was found.
    fn fill(&self, draft: &mut RecordDraft, columns: &TextColumns, body: &[Token]) -> bool {
        let mut found = false;

        let question = self.text.extract(&columns.question.bbox, body);
        found |= !question.is_empty();
        draft.append_text(&question);

        for (key, region) in AnswerKey::ALL.into_iter().zip(&columns.answers) {
            let answer = self.text.extract_answer(&region.bbox, body);
            found |= !answer.text.is_empty() || answer.marked;
            draft.append_answer(key, &answer.text);
            if answer.marked {
                draft.mark(key);
            }
        }

        if let Some(key) = self.text.correct_answer(&columns.correct.bbox, body) {
            found = true;
            draft.set_column_answer(key);
        }
        found
    }

    /// Whether page `index` (0-based) starts with text continuing `draft`.
    ///
    /// The page's anchors go through a copy of the sequencer, so the peek
    /// ends the draft exactly where processing the page would.
    fn continues_on<S: PageSource + ?Sized>(&self, source: &S, index: usize, draft: &RecordDraft) -> bool {
        let page = match source.page(index) {
            Ok(page) => page,
            Err(e) => {
                warn!(page = index + 1, error = %e, "could not peek past the page limit");
                return false;
            }
        };
        let detected = self.header_locator.locate(page.number, &page.tokens).value;
        let Some(headers) = detected.or(self.headers.current()) else {
            return false;
        };
        let layout = self.layout(&page, detected, &headers);
        let anchors = self.sequencer.clone().sequence(layout.anchors.clone()).value;
        let first_top = first_anchor_top(&anchors, &page);
        if first_top <= layout.content_top {
            return false;
        }
        let columns =
            self.region_builder
                .text_columns(&headers, &page, draft.label(), layout.content_top, first_top);
        self.fill(&mut draft.clone(), &columns, &layout.body)
    }

    /// Validate a draft and move it into the output, or report why not.
    fn seal(&mut self, pending: Pending) {
        let Pending { draft, asset } = pending;
        let (_, conflict) = draft.resolve_correct();
        self.diagnostics.extend(conflict);

        let image_required = self.options.image_required(draft.label());
        match validate(&draft, image_required) {
            Ok(record) => {
                self.records.push(record);
                self.assets.extend(asset);
            }
            Err(violations) => {
                let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
                warn!(label = draft.label(), reasons = %reasons.join("; "), "record dropped");
                self.diagnostics.push(Diagnostic::for_label(
                    DiagnosticCode::InvalidRecord,
                    reasons.join("; "),
                    draft.anchor.page,
                    draft.label(),
                ));
            }
        }
    }

    fn finish(mut self, pages_total: usize) -> Extraction {
        self.records.sort();
        let count = |severity| self.diagnostics.iter().filter(|d| d.severity == severity).count();
        let summary = RunSummary {
            pages_total,
            pages_processed: self.pages_processed,
            header_pages: self.headers.detections(),
            anchors: self.anchors_accepted,
            records: self.records.len(),
            images: self.assets.len(),
            warnings: count(Severity::Warning),
            page_skips: count(Severity::PageSkip),
            invalid_records: count(Severity::RecordInvalid),
            diagnostics: self.diagnostics,
        };
        info!(
            records = summary.records,
            images = summary.images,
            warnings = summary.warnings,
            page_skips = summary.page_skips,
            invalid = summary.invalid_records,
            "extraction finished"
        );
        Extraction {
            records: self.records,
            assets: self.assets,
            summary,
        }
    }
}

/// Top of the first anchor row, or the page bottom.
fn first_anchor_top(anchors: &[Anchor], page: &PageContent) -> f64 {
    anchors.iter().map(|a| a.bbox.top).fold(page.height, f64::min)
}

/// Run the whole pipeline over `source` with `options`.
pub fn extract<S: PageSource + ?Sized>(source: &S, options: LayoutOptions) -> Result<Extraction, ExamError> {
    Pipeline::new(options)?.run(source)
}
