//! examcard-parse: PDF document backend for examcard.
//!
//! Opens documents with lopdf and interprets page content streams into the
//! positioned tokens and image placements of [`examcard_core::PageContent`].
//! [`LopdfSource`] implements [`examcard_core::PageSource`], so it plugs
//! straight into the extraction pipeline.

pub mod cmap;
pub mod error;
pub mod font;
pub mod font_metrics;
mod image;
mod interpreter;
pub mod lopdf_backend;

pub use error::BackendError;
pub use examcard_core;
pub use lopdf_backend::{LopdfSource, ParseOptions};
