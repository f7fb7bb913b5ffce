//! Top-level question book type for opening and extracting a document.

use std::path::Path;

use examcard_core::{ExamError, Extraction, LayoutOptions, PageContent, PageSource, Pipeline};
use examcard_parse::{LopdfSource, ParseOptions};
use tracing::info;

/// Iterator over the pages of a [`Book`], interpreting each page on demand.
///
/// Created by [`Book::pages_iter()`]. Pages are not retained after being
/// yielded; the caller owns the `PageContent` value.
pub struct PagesIter<'a> {
    book: &'a Book,
    current: usize,
    count: usize,
}

impl Iterator for PagesIter<'_> {
    type Item = Result<PageContent, ExamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.count {
            return None;
        }
        let result = self.book.page(self.current);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PagesIter<'_> {}

/// A question book opened for extraction.
///
/// # Example
///
/// ```ignore
/// let book = Book::open_file("Fragenkatalog.pdf")?;
/// let extraction = book.extract(LayoutOptions::default())?;
/// println!("{}", extraction.records.to_json()?);
/// ```
#[derive(Debug)]
pub struct Book {
    source: LopdfSource,
}

impl Book {
    /// Open a question book from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`ExamError::IoError`] if the file cannot be read and
    /// [`ExamError::ParseError`] if it is not a readable PDF.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, ExamError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ExamError::IoError(format!("{}: {e}", path.display())))?;
        Self::open(&bytes)
    }

    /// Open a question book from PDF bytes.
    pub fn open(bytes: &[u8]) -> Result<Self, ExamError> {
        let source = LopdfSource::from_bytes(bytes)?;
        Ok(Self { source })
    }

    /// Replace the token-building options used when pages are read.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.source = self.source.with_options(options);
        self
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    /// Interpret a single page (0-based index).
    pub fn page(&self, index: usize) -> Result<PageContent, ExamError> {
        self.source.page(index)
    }

    pub fn pages_iter(&self) -> PagesIter<'_> {
        PagesIter {
            book: self,
            current: 0,
            count: self.page_count(),
        }
    }

    /// Run the layout pipeline over the book.
    ///
    /// # Errors
    ///
    /// Returns [`ExamError::NoHeaders`] when no processed page carries a
    /// column header row. Page-level problems are reported in the summary.
    pub fn extract(&self, options: LayoutOptions) -> Result<Extraction, ExamError> {
        info!(pages = self.page_count(), "extracting question book");
        Pipeline::new(options)?.run(&self.source)
    }
}
