//! examcard: extract exam questions, answers and picture assets from
//! fixed-layout PDF question books.
//!
//! This is the public API facade crate for examcard-rs. It re-exports the
//! types of examcard-core and reads documents through examcard-parse.
//!
//! # Architecture
//!
//! - **examcard-core**: Backend-independent page model and layout pipeline
//! - **examcard-parse**: PDF parsing and content stream interpretation
//! - **examcard** (this crate): Opens a book, runs the pipeline, writes output
//!
//! # Example
//!
//! ```ignore
//! use examcard::{Book, LayoutOptions, OutputPaths, write_extraction};
//!
//! let book = Book::open_file("Fragenkatalog.pdf")?;
//! let extraction = book.extract(LayoutOptions::default())?;
//! write_extraction(&extraction, &OutputPaths::new("out/questions.json"))?;
//! ```

mod book;
mod output;

pub use book::{Book, PagesIter};
pub use output::{OutputPaths, WrittenOutput, write_extraction, write_summary};

pub use examcard_core;
pub use examcard_core::{
    AnchorKind, AnswerKey, Answers, BBox, Diagnostic, DiagnosticCode, ExamError, Extraction,
    HeaderVocabulary, ImageAsset, ImageFormat, LayoutOptions, PageContent, PageSource,
    QuestionRecord, RecordSet, RunSummary, Severity, Token,
};
pub use examcard_parse;
pub use examcard_parse::{LopdfSource, ParseOptions};
