//! Positioned page content and the [`PageSource`] seam between a document
//! backend and the extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::error::ExamError;
use crate::geometry::BBox;
use crate::images::ImageContent;

/// A run of text (usually one word) with its page number and box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Text of the token.
    pub text: String,
    /// Page number (1-based).
    pub page: usize,
    /// Bounding box in top-left origin page coordinates.
    pub bbox: BBox,
}

impl Token {
    pub fn new(text: impl Into<String>, page: usize, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
        }
    }

    /// Center point `(x, y)` of the token box.
    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }

    /// Whether the token is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A raster image placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Resource name of the image (e.g. `Im0`).
    pub name: String,
    /// Page number (1-based).
    pub page: usize,
    /// Placement box in top-left origin page coordinates.
    pub bbox: BBox,
    /// Image payload, or `None` when the stream could not be read.
    pub content: Option<ImageContent>,
}

/// Everything the pipeline needs from one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContent {
    /// Page number (1-based).
    pub number: usize,
    /// Page width in points.
    pub width: f64,
    /// Page height in points.
    pub height: f64,
    /// Text tokens in content order.
    pub tokens: Vec<Token>,
    /// Raster images in content order.
    pub rasters: Vec<Raster>,
}

impl PageContent {
    /// Create an empty page of the given size.
    pub fn new(number: usize, width: f64, height: f64) -> Self {
        Self {
            number,
            width,
            height,
            tokens: Vec::new(),
            rasters: Vec::new(),
        }
    }

    /// Page bounding box.
    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }

    /// Append a token on this page (builder style, mostly for fixtures).
    pub fn with_token(mut self, text: &str, bbox: BBox) -> Self {
        self.tokens.push(Token::new(text, self.number, bbox));
        self
    }

    /// Append a raster on this page (builder style, mostly for fixtures).
    pub fn with_raster(mut self, name: &str, bbox: BBox, content: Option<ImageContent>) -> Self {
        self.rasters.push(Raster {
            name: name.to_string(),
            page: self.number,
            bbox,
            content,
        });
        self
    }
}

/// A paged document the pipeline can walk.
///
/// `page` takes a 0-based index; the returned [`PageContent::number`] is
/// 1-based. Implementations load pages lazily so that only the processed
/// range is ever decoded.
pub trait PageSource {
    /// Total number of pages in the document.
    fn page_count(&self) -> usize;

    /// Load the page at `index` (0-based).
    fn page(&self, index: usize) -> Result<PageContent, ExamError>;
}

impl PageSource for [PageContent] {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page(&self, index: usize) -> Result<PageContent, ExamError> {
        self.get(index)
            .cloned()
            .ok_or_else(|| ExamError::Other(format!("page index {index} out of range")))
    }
}

impl PageSource for Vec<PageContent> {
    fn page_count(&self) -> usize {
        self.as_slice().page_count()
    }

    fn page(&self, index: usize) -> Result<PageContent, ExamError> {
        self.as_slice().page(index)
    }
}
