use std::path::PathBuf;

use clap::Parser;
use examcard::LayoutOptions;

/// Extract exam questions, answers and picture images from a question book PDF.
#[derive(Debug, Parser)]
#[command(name = "examcard", about, version)]
pub struct Cli {
    /// Path to the question book PDF
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output JSON file
    #[arg(short, long, value_name = "FILE", default_value = "questions.json")]
    pub output: PathBuf,

    /// Directory for image files. Default: 'images' next to the output file
    #[arg(long, value_name = "DIR")]
    pub images_dir: Option<PathBuf>,

    /// Process at most this many pages from the start of the book
    #[arg(short = 'p', long = "pages", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_pages: Option<u64>,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Treat picture questions without an image as invalid
    #[arg(long)]
    pub require_images: bool,

    /// Picture question label exempt from --require-images (repeatable)
    #[arg(long = "waive-image", value_name = "LABEL")]
    pub waived_images: Vec<String>,

    /// Fraction of an image's area that must lie inside a question's image region
    #[arg(long, value_name = "F", default_value_t = 0.5, value_parser = overlap_fraction)]
    pub min_image_overlap: f64,

    /// Vertical gap (points) between lines that starts a new paragraph
    #[arg(long, value_name = "F", default_value_t = 6.0, value_parser = non_negative)]
    pub paragraph_gap: f64,

    /// Top margin (points) where continuation text starts on pages without a header
    #[arg(long, value_name = "F", default_value_t = 0.0, value_parser = non_negative)]
    pub top_margin: f64,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Layout options for the pipeline, from the defaults plus the flags.
    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            paragraph_gap: self.paragraph_gap,
            min_image_overlap: self.min_image_overlap,
            top_margin: self.top_margin,
            max_pages: self
                .max_pages
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
            require_images: self.require_images,
            waived_images: self.waived_images.iter().cloned().collect(),
            ..LayoutOptions::default()
        }
    }
}

fn non_negative(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("{value} must be a finite number >= 0"))
    }
}

fn overlap_fraction(s: &str) -> Result<f64, String> {
    let value = non_negative(s)?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!("{value} is not in (0, 1]"))
    }
}
