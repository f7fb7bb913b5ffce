//! Persisting an extraction: the record JSON, image files and run summary.

use std::fs;
use std::path::{Path, PathBuf};

use examcard_core::{ExamError, Extraction, RunSummary};
use tracing::{debug, info};

/// Where the output of a run goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Record JSON file.
    pub json: PathBuf,
    /// Directory receiving one file per image asset.
    pub images_dir: PathBuf,
}

impl OutputPaths {
    /// Output at `json`, with images in an `images` directory next to it.
    pub fn new(json: impl Into<PathBuf>) -> Self {
        let json = json.into();
        let images_dir = json
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("images");
        Self { json, images_dir }
    }

    pub fn with_images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.images_dir = dir.into();
        self
    }
}

/// Files written by [`write_extraction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub json: PathBuf,
    pub images: Vec<PathBuf>,
}

/// Write the record JSON and every image asset.
///
/// Parent directories are created as needed. The image directory is only
/// created when the extraction produced at least one asset.
pub fn write_extraction(
    extraction: &Extraction,
    paths: &OutputPaths,
) -> Result<WrittenOutput, ExamError> {
    let json = extraction.records.to_json()?;
    create_parent(&paths.json)?;
    fs::write(&paths.json, json).map_err(|e| io_error(&paths.json, e))?;
    info!(
        path = %paths.json.display(),
        records = extraction.records.len(),
        "wrote records"
    );

    let mut images = Vec::with_capacity(extraction.assets.len());
    if !extraction.assets.is_empty() {
        fs::create_dir_all(&paths.images_dir).map_err(|e| io_error(&paths.images_dir, e))?;
    }
    for asset in &extraction.assets {
        let path = paths.images_dir.join(&asset.file_name);
        fs::write(&path, &asset.data).map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), bytes = asset.data.len(), "wrote image");
        images.push(path);
    }
    if !images.is_empty() {
        info!(dir = %paths.images_dir.display(), count = images.len(), "wrote images");
    }

    Ok(WrittenOutput {
        json: paths.json.clone(),
        images,
    })
}

/// Write the run summary as pretty-printed JSON.
pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<(), ExamError> {
    let json = summary.to_json()?;
    create_parent(path)?;
    fs::write(path, json).map_err(|e| io_error(path, e))
}

fn create_parent(path: &Path) -> Result<(), ExamError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))
        }
        _ => Ok(()),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ExamError {
    ExamError::IoError(format!("{}: {err}", path.display()))
}
