//! examcard-core: backend-independent layout inference for exam question books.
//!
//! This crate provides the page model ([`PageContent`], [`Token`], [`Raster`]),
//! the extraction components (header, anchor, region, text, picture and
//! record stages) and the [`Pipeline`] that drives them page by page.
//! Document backends plug in through the [`PageSource`] trait.

pub mod anchor;
pub mod error;
pub mod geometry;
pub mod header;
pub mod images;
pub mod options;
pub mod picture;
pub mod pipeline;
pub mod record;
pub mod region;
pub mod text;
pub mod token;
pub mod words;

pub use anchor::{
    Admission, Anchor, AnchorKind, AnchorLocator, AnchorSequencer, NUMERIC_PATTERN,
    Ordinal, PICTURE_PATTERN, SeriesTracker,
};
pub use error::{Diagnostic, DiagnosticCode, ExamError, Extracted, Severity};
pub use geometry::{BBox, Ctm, Point};
pub use header::{Column, HeaderLocator, HeaderSet, HeaderTracker, HeaderVocabulary};
pub use images::{ImageAsset, ImageContent, ImageFilter, ImageFormat};
pub use options::LayoutOptions;
pub use picture::{ImageExtractor, decode_raster, stack_vertically};
pub use pipeline::{Extraction, Pipeline, RunSummary, extract};
pub use record::{AnswerKey, Answers, QuestionRecord, RecordDraft, RecordSet, Violation, validate};
pub use region::{Field, QuestionRegions, Region, RegionBuilder, TextColumns};
pub use text::{AnswerText, TextExtractor, visual_lines};
pub use token::{PageContent, PageSource, Raster, Token};
pub use words::{Glyph, WordExtractor, WordOptions};
