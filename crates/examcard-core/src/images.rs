//! Image payload types shared between the document backend and the
//! picture compositor.

use serde::{Deserialize, Serialize};

/// PDF stream filter used to encode image data.
///
/// Maps to the last `/Filter` entry in an image XObject stream dictionary,
/// which determines what the bytes look like once lower filters are undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFilter {
    /// JPEG compression (DCTDecode).
    DCTDecode,
    /// Flate (zlib/deflate) compression.
    FlateDecode,
    /// CCITT fax compression (Group 3 or 4).
    CCITTFaxDecode,
    /// JBIG2 compression.
    JBIG2Decode,
    /// JPEG 2000 compression (JPXDecode).
    JPXDecode,
    /// LZW compression.
    LZWDecode,
    /// Run-length encoding.
    RunLengthDecode,
    /// No filter, raw uncompressed samples.
    Raw,
}

impl ImageFilter {
    /// Parse a PDF filter name string to an `ImageFilter`.
    pub fn from_pdf_name(name: &str) -> Self {
        match name {
            "DCTDecode" | "DCT" => ImageFilter::DCTDecode,
            "FlateDecode" | "Fl" => ImageFilter::FlateDecode,
            "CCITTFaxDecode" | "CCF" => ImageFilter::CCITTFaxDecode,
            "JBIG2Decode" => ImageFilter::JBIG2Decode,
            "JPXDecode" => ImageFilter::JPXDecode,
            "LZWDecode" | "LZW" => ImageFilter::LZWDecode,
            "RunLengthDecode" | "RL" => ImageFilter::RunLengthDecode,
            _ => ImageFilter::Raw,
        }
    }

    /// Format of the bytes once every generic (lossless) filter is undone.
    pub fn image_format(&self) -> ImageFormat {
        match self {
            ImageFilter::DCTDecode => ImageFormat::Jpeg,
            ImageFilter::JPXDecode => ImageFormat::Jpeg2000,
            ImageFilter::JBIG2Decode => ImageFormat::Jbig2,
            ImageFilter::CCITTFaxDecode => ImageFormat::CcittFax,
            ImageFilter::FlateDecode
            | ImageFilter::LZWDecode
            | ImageFilter::RunLengthDecode
            | ImageFilter::Raw => ImageFormat::Raw,
        }
    }
}

/// Format of extracted image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG image (DCTDecode filter).
    Jpeg,
    /// JPEG 2000 codestream (JPXDecode filter).
    Jpeg2000,
    /// PNG image.
    Png,
    /// Raw uncompressed pixel samples.
    Raw,
    /// JBIG2 compressed image.
    Jbig2,
    /// CCITT fax compressed image.
    CcittFax,
}

impl ImageFormat {
    /// Returns the typical file extension for this image format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Jpeg2000 => "jp2",
            ImageFormat::Png => "png",
            ImageFormat::Raw => "raw",
            ImageFormat::Jbig2 => "jbig2",
            ImageFormat::CcittFax => "ccitt",
        }
    }
}

/// Extracted image content from a PDF image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageContent {
    /// The image data bytes.
    pub data: Vec<u8>,
    /// The format of the image data.
    pub format: ImageFormat,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Color components per pixel (1 gray, 3 RGB, 4 CMYK) when known.
    pub components: Option<u8>,
    /// Bits per color component when known.
    pub bits_per_component: Option<u8>,
}

impl ImageContent {
    /// Expected byte length of raw samples, if the layout is fully known.
    pub fn raw_len(&self) -> Option<usize> {
        let components = usize::from(self.components?);
        let bpc = usize::from(self.bits_per_component?);
        let row_bits = (self.width as usize)
            .checked_mul(components)?
            .checked_mul(bpc)?;
        row_bits.div_ceil(8).checked_mul(self.height as usize)
    }
}

/// A finished image file belonging to one picture-series record.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    /// Record id (anchor label) the image belongs to.
    pub label: String,
    /// File name relative to the asset directory, e.g. `B1.3.png`.
    pub file_name: String,
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Format of `data`.
    pub format: ImageFormat,
}

impl ImageAsset {
    pub fn new(label: impl Into<String>, data: Vec<u8>, format: ImageFormat) -> Self {
        let label = label.into();
        let file_name = format!("{label}.{}", format.extension());
        Self {
            label,
            file_name,
            data,
            format,
        }
    }
}
