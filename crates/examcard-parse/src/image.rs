//! Image XObject payload extraction.

use examcard_core::{ImageContent, ImageFilter, ImageFormat};

use crate::error::BackendError;
use crate::lopdf_backend::resolve;

/// Read the pixel payload of an image XObject stream.
///
/// The last entry of `/Filter` decides the format: DCT and JPX data is
/// returned as an embedded file, everything decodable by lopdf is returned
/// as raw samples with their component layout.
pub(crate) fn image_content(
    doc: &lopdf::Document,
    stream: &lopdf::Stream,
) -> Result<ImageContent, BackendError> {
    let dict = &stream.dict;
    let int = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| resolve(doc, o).as_i64().ok())
    };
    let dimension = |key: &[u8]| match int(key) {
        None => Ok(0),
        Some(value) => u32::try_from(value).map_err(|_| {
            BackendError::Parse(format!(
                "image /{} {value} out of range",
                String::from_utf8_lossy(key)
            ))
        }),
    };
    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;

    let filters = filter_names(doc, dict);
    let format = filters
        .last()
        .map(|name| ImageFilter::from_pdf_name(name).image_format())
        .unwrap_or(ImageFormat::Raw);

    let data = if filters.is_empty() || (filters.len() == 1 && format != ImageFormat::Raw) {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decompress image: {e}")))?
    };

    let is_mask = dict
        .get(b"ImageMask")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);
    let (components, bits_per_component) = if is_mask {
        (Some(1), Some(1))
    } else {
        let components = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|cs| color_components(doc, cs));
        let bits = int(b"BitsPerComponent").and_then(|b| u8::try_from(b).ok());
        (components, bits)
    };

    Ok(ImageContent {
        data,
        format,
        width,
        height,
        components,
        bits_per_component,
    })
}

/// Filter names of a stream, whether given as a single name or an array.
fn filter_names(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> Vec<String> {
    let Ok(filter) = dict.get(b"Filter") else {
        return Vec::new();
    };
    let name = |o: &lopdf::Object| {
        resolve(doc, o)
            .as_name()
            .ok()
            .map(|n| String::from_utf8_lossy(n).into_owned())
    };
    match resolve(doc, filter) {
        lopdf::Object::Array(items) => items.iter().filter_map(name).collect(),
        other => name(other).into_iter().collect(),
    }
}

/// Number of colour components of a colour space, when the samples can be
/// interpreted without a palette or tint transform.
fn color_components(doc: &lopdf::Document, cs: &lopdf::Object) -> Option<u8> {
    match resolve(doc, cs) {
        lopdf::Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        lopdf::Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let profile = resolve(doc, items.get(1)?).as_stream().ok()?;
                    let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
                    u8::try_from(n).ok().filter(|n| matches!(n, 1 | 3 | 4))
                }
                b"CalGray" => Some(1),
                b"CalRGB" | b"Lab" => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}
