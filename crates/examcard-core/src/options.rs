//! Tunable layout thresholds and output policy.

use std::collections::BTreeSet;

use crate::header::HeaderVocabulary;

/// Options controlling header detection, region building, text assembly,
/// image selection and record validation.
///
/// All distances are in PDF points (1/72 inch).
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Maximum vertical offset between tokens that share a visual row.
    pub row_tolerance: f64,
    /// Vertical gap between consecutive lines above which a paragraph
    /// break (newline) is inserted.
    pub paragraph_gap: f64,
    /// Width of the correct-answer column, measured from its header.
    pub correct_column_width: f64,
    /// Maximum horizontal offset between the words of a header phrase that
    /// is stacked on two lines.
    pub stacked_header_tolerance: f64,
    /// Minimum fraction of a raster's area that must fall inside an image
    /// region for the raster to belong to that question.
    pub min_image_overlap: f64,
    /// Top margin used as the start of continuation text on pages that do
    /// not repeat the header row.
    pub top_margin: f64,
    /// Process at most this many pages (from the first). `None` means all.
    pub max_pages: Option<usize>,
    /// Whether picture-series records without an image are invalid.
    pub require_images: bool,
    /// Picture-series labels exempt from `require_images`.
    pub waived_images: BTreeSet<String>,
    /// Header vocabularies tried in order on every page.
    pub vocabularies: Vec<HeaderVocabulary>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            paragraph_gap: 6.0,
            correct_column_width: 50.0,
            stacked_header_tolerance: 10.0,
            min_image_overlap: 0.5,
            top_margin: 0.0,
            max_pages: None,
            require_images: false,
            waived_images: BTreeSet::new(),
            vocabularies: vec![HeaderVocabulary::english(), HeaderVocabulary::german()],
        }
    }
}

impl LayoutOptions {
    /// Whether a picture-series record with this label needs an image.
    pub fn image_required(&self, label: &str) -> bool {
        self.require_images && !self.waived_images.contains(label)
    }
}
