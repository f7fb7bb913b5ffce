//! Raster selection and compositing for picture questions.

use std::io::Cursor;

use image::{
    DynamicImage, GenericImage, GrayImage, ImageFormat as CodecFormat, Rgba, RgbaImage, RgbImage,
};
use tracing::debug;

use crate::error::{Diagnostic, DiagnosticCode, ExamError, Extracted};
use crate::images::{ImageAsset, ImageContent, ImageFormat};
use crate::options::LayoutOptions;
use crate::region::Region;
use crate::token::Raster;

/// Selects the rasters of each image region and turns them into one asset.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    min_overlap: f64,
}

impl ImageExtractor {
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            min_overlap: options.min_image_overlap,
        }
    }

    /// Distribute `rasters` over `regions` (given top to bottom).
    ///
    /// A raster belongs to the region holding the largest fraction of its
    /// area, provided that fraction reaches the minimum overlap; on a tie
    /// the upper region wins. Each returned list is sorted top to bottom,
    /// then left to right.
    pub fn assign<'r>(&self, regions: &[&Region], rasters: &'r [Raster]) -> Vec<Vec<&'r Raster>> {
        let mut assigned: Vec<Vec<&Raster>> = vec![Vec::new(); regions.len()];

        for raster in rasters {
            let mut best: Option<(usize, f64)> = None;
            for (i, region) in regions.iter().enumerate() {
                let fraction = raster.bbox.overlap_fraction(&region.bbox);
                if fraction < self.min_overlap {
                    continue;
                }
                if best.is_none_or(|(_, f)| fraction > f) {
                    best = Some((i, fraction));
                }
            }
            if let Some((i, _)) = best {
                assigned[i].push(raster);
            }
        }

        for list in &mut assigned {
            list.sort_by(|a, b| {
                a.bbox
                    .top
                    .total_cmp(&b.bbox.top)
                    .then(a.bbox.x0.total_cmp(&b.bbox.x0))
            });
        }
        assigned
    }

    /// Build the image asset for `label` from its rasters.
    ///
    /// A lone JPEG or JPEG 2000 raster is passed through byte for byte.
    /// Anything else is decoded and stacked into one PNG.
    pub fn compose(&self, label: &str, page: usize, rasters: &[&Raster]) -> Extracted<Option<ImageAsset>> {
        let missing = |why: &str| {
            Diagnostic::for_label(DiagnosticCode::MissingImage, why.to_string(), page, label)
        };

        if rasters.is_empty() {
            return Extracted::with_diagnostics(None, vec![missing("no raster in image region")]);
        }

        if let [raster] = rasters {
            if let Some(content) = &raster.content {
                if matches!(content.format, ImageFormat::Jpeg | ImageFormat::Jpeg2000) {
                    debug!(label, raster = %raster.name, "passing image through");
                    return Extracted::ok(Some(ImageAsset::new(
                        label,
                        content.data.clone(),
                        content.format,
                    )));
                }
            }
        }

        let mut diagnostics = Vec::new();
        let mut decoded = Vec::with_capacity(rasters.len());
        for raster in rasters {
            let result = match &raster.content {
                Some(content) => decode_raster(content),
                None => Err(ExamError::ImageError("image stream unreadable".to_string())),
            };
            match result {
                Ok(img) => decoded.push(img),
                Err(e) => diagnostics.push(Diagnostic::for_label(
                    DiagnosticCode::UndecodableImage,
                    format!("raster {} skipped: {e}", raster.name),
                    page,
                    label,
                )),
            }
        }

        if decoded.is_empty() {
            diagnostics.push(missing("no decodable raster in image region"));
            return Extracted::with_diagnostics(None, diagnostics);
        }

        match stack_vertically(&decoded).and_then(|canvas| encode_png(&canvas)) {
            Ok(bytes) => {
                debug!(label, parts = decoded.len(), "composited image");
                Extracted::with_diagnostics(
                    Some(ImageAsset::new(label, bytes, ImageFormat::Png)),
                    diagnostics,
                )
            }
            Err(e) => {
                diagnostics.push(Diagnostic::for_label(
                    DiagnosticCode::UndecodableImage,
                    format!("compositing failed: {e}"),
                    page,
                    label,
                ));
                diagnostics.push(missing("image could not be composited"));
                Extracted::with_diagnostics(None, diagnostics)
            }
        }
    }
}

/// Decode a raster payload into pixels.
///
/// Supports JPEG and PNG files and raw 8-bit gray, RGB and CMYK samples.
pub fn decode_raster(content: &ImageContent) -> Result<DynamicImage, ExamError> {
    match content.format {
        ImageFormat::Jpeg => Ok(image::load_from_memory_with_format(
            &content.data,
            CodecFormat::Jpeg,
        )?),
        ImageFormat::Png => Ok(image::load_from_memory_with_format(
            &content.data,
            CodecFormat::Png,
        )?),
        ImageFormat::Raw => decode_samples(content),
        other => Err(ExamError::ImageError(format!(
            "{} images are not supported",
            other.extension()
        ))),
    }
}

fn decode_samples(content: &ImageContent) -> Result<DynamicImage, ExamError> {
    if content.bits_per_component != Some(8) {
        return Err(ExamError::ImageError(format!(
            "unsupported bits per component {:?}",
            content.bits_per_component
        )));
    }
    let len = content
        .raw_len()
        .ok_or_else(|| ExamError::ImageError("unknown sample layout".to_string()))?;
    let samples = content.data.get(..len).ok_or_else(|| {
        ExamError::ImageError(format!(
            "expected {len} sample bytes, found {}",
            content.data.len()
        ))
    })?;
    let (w, h) = (content.width, content.height);
    let too_short = || ExamError::ImageError("sample buffer too short".to_string());

    match content.components {
        Some(1) => GrayImage::from_raw(w, h, samples.to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(too_short),
        Some(3) => RgbImage::from_raw(w, h, samples.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(too_short),
        Some(4) => {
            let rgb: Vec<u8> = samples
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - u16::from(p[3]);
                    [p[0], p[1], p[2]].map(|c| ((255 - u16::from(c)) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(w, h, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(too_short)
        }
        other => Err(ExamError::ImageError(format!(
            "unsupported component count {other:?}"
        ))),
    }
}

/// Stack images top to bottom, left aligned, on a white canvas as wide as
/// the widest image.
pub fn stack_vertically(images: &[DynamicImage]) -> Result<DynamicImage, ExamError> {
    let width = images.iter().map(|i| i.width()).max().unwrap_or(0);
    let height: u32 = images.iter().map(|i| i.height()).sum();
    let mut canvas =
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])));

    let mut y = 0;
    for img in images {
        canvas.copy_from(img, 0, y)?;
        y += img.height();
    }
    Ok(canvas)
}

fn encode_png(canvas: &DynamicImage) -> Result<Vec<u8>, ExamError> {
    let mut bytes = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut bytes), CodecFormat::Png)?;
    Ok(bytes)
}
