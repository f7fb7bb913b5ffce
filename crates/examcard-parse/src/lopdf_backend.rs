//! lopdf-based page source.
//!
//! Implements [`PageSource`] using the [lopdf](https://crates.io/crates/lopdf)
//! crate: pages are interpreted one at a time into positioned tokens and
//! image placements.

use std::path::Path;

use examcard_core::{
    BBox, Ctm, ExamError, PageContent, PageSource, Raster, WordExtractor, WordOptions,
};
use tracing::debug;

use crate::error::BackendError;
use crate::interpreter::Interpreter;

/// Options for turning page content into tokens.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum horizontal gap between glyphs of one token.
    pub x_tolerance: f64,
    /// Maximum vertical offset between glyphs of one token.
    pub y_tolerance: f64,
    /// Maximum nesting of Form XObjects before a page is rejected.
    pub max_form_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            x_tolerance: 3.0,
            y_tolerance: 3.0,
            max_form_depth: 10,
        }
    }
}

/// A PDF document opened with lopdf.
pub struct LopdfSource {
    inner: lopdf::Document,
    /// Ordered page ObjectIds (indexed by 0-based page number).
    page_ids: Vec<lopdf::ObjectId>,
    options: ParseOptions,
}

impl std::fmt::Debug for LopdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfSource")
            .field("page_count", &self.page_ids.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl LopdfSource {
    /// Open a PDF file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a PDF held in memory.
    ///
    /// Encrypted documents are opened only when the empty user password
    /// unlocks them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        let mut inner = lopdf::Document::load_mem(bytes)
            .map_err(|e| BackendError::Parse(format!("failed to parse PDF: {e}")))?;

        if inner.is_encrypted() && inner.decrypt("").is_err() {
            return Err(BackendError::Encrypted);
        }

        // get_pages is keyed by 1-based page number.
        let page_ids = inner.get_pages().values().copied().collect();
        Ok(Self {
            inner,
            page_ids,
            options: ParseOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    fn page_id(&self, index: usize) -> Result<lopdf::ObjectId, BackendError> {
        self.page_ids.get(index).copied().ok_or_else(|| {
            BackendError::Parse(format!(
                "page index {index} out of range (0..{})",
                self.page_ids.len()
            ))
        })
    }

    /// The page's /MediaBox as `(x0, y0, x1, y1)` in PDF user space.
    pub fn media_box(&self, index: usize) -> Result<BBox, BackendError> {
        let page_id = self.page_id(index)?;
        let obj = resolve_inherited(&self.inner, page_id, b"MediaBox")?
            .ok_or_else(|| BackendError::Parse("MediaBox not found on page or ancestors".into()))?;
        let array = resolve(&self.inner, obj)
            .as_array()
            .map_err(|e| BackendError::Parse(format!("MediaBox is not an array: {e}")))?;
        extract_bbox_from_array(array)
    }

    /// Interpret page `index` (0-based) into tokens and rasters.
    pub fn read_page(&self, index: usize) -> Result<PageContent, BackendError> {
        let page_id = self.page_id(index)?;
        let number = index + 1;
        let media = self.media_box(index)?;
        let (width, height) = (media.width(), media.height());

        let page_dict = self
            .inner
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
        let content = get_page_content_bytes(&self.inner, page_dict)?;
        let resources = get_page_resources(&self.inner, page_id)?;

        // Shift a non-zero MediaBox origin to the page's top-left corner.
        let base = Ctm::translation(-media.x0, -media.top);
        let sink = Interpreter::new(&self.inner, height, self.options.max_form_depth)
            .run(&content, resources, base)?;

        let word_options = WordOptions {
            x_tolerance: self.options.x_tolerance,
            y_tolerance: self.options.y_tolerance,
            ..WordOptions::default()
        };
        let mut page = PageContent::new(number, width, height);
        page.tokens = WordExtractor::extract(&sink.glyphs, number, &word_options);
        page.rasters = sink
            .images
            .into_iter()
            .map(|image| Raster {
                name: image.name,
                page: number,
                bbox: image.bbox,
                content: image.content,
            })
            .collect();

        debug!(
            page = number,
            glyphs = sink.glyphs.len(),
            tokens = page.tokens.len(),
            rasters = page.rasters.len(),
            "interpreted page"
        );
        Ok(page)
    }
}

impl PageSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page(&self, index: usize) -> Result<PageContent, ExamError> {
        Ok(self.read_page(index)?)
    }
}

/// Extract a rectangle from a lopdf array of 4 numbers `[x0 y0 x1 y1]`.
///
/// The result keeps PDF orientation: `top` holds the lower y and `bottom`
/// the upper one.
fn extract_bbox_from_array(array: &[lopdf::Object]) -> Result<BBox, BackendError> {
    if array.len() != 4 {
        return Err(BackendError::Parse(format!(
            "expected 4-element array for box, got {}",
            array.len()
        )));
    }
    let x0 = object_to_f64(&array[0])?;
    let y0 = object_to_f64(&array[1])?;
    let x1 = object_to_f64(&array[2])?;
    let y1 = object_to_f64(&array[3])?;
    Ok(BBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
}

/// Convert a lopdf numeric object (Integer or Real) to f64.
pub(crate) fn object_to_f64(obj: &lopdf::Object) -> Result<f64, BackendError> {
    match obj {
        lopdf::Object::Integer(i) => Ok(*i as f64),
        lopdf::Object::Real(f) => Ok(f64::from(*f)),
        _ => Err(BackendError::Parse(format!("expected number, got {obj:?}"))),
    }
}

/// Follow an indirect reference; other objects are returned as-is.
pub(crate) fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Decode a stream, decompressing if needed.
pub(crate) fn decode_stream(stream: &lopdf::Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decompress stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Look up a key in the page dictionary, walking up the page tree
/// (via /Parent) if the key is not found on the page itself.
fn resolve_inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, BackendError> {
    let mut current_id = page_id;
    loop {
        let dict = doc
            .get_object(current_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent") {
            Ok(parent_obj) => {
                current_id = parent_obj
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
}

/// Get the content stream bytes of a page.
///
/// Handles both a single stream reference and an array of streams.
fn get_page_content_bytes(
    doc: &lopdf::Document,
    page_dict: &lopdf::Dictionary,
) -> Result<Vec<u8>, BackendError> {
    let Ok(contents) = page_dict.get(b"Contents") else {
        return Ok(Vec::new());
    };

    match resolve(doc, contents) {
        lopdf::Object::Stream(stream) => decode_stream(stream),
        lopdf::Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                let stream = resolve(doc, part).as_stream().map_err(|e| {
                    BackendError::Parse(format!("/Contents array item is not a stream: {e}"))
                })?;
                if !content.is_empty() {
                    content.push(b' ');
                }
                content.extend_from_slice(&decode_stream(stream)?);
            }
            Ok(content)
        }
        _ => Err(BackendError::Parse(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

/// Get the resources dictionary for a page, handling inheritance.
fn get_page_resources(
    doc: &lopdf::Document,
    page_id: lopdf::ObjectId,
) -> Result<&lopdf::Dictionary, BackendError> {
    match resolve_inherited(doc, page_id, b"Resources")? {
        Some(obj) => resolve(doc, obj)
            .as_dict()
            .map_err(|_| BackendError::Parse("/Resources is not a dictionary".to_string())),
        None => {
            static EMPTY_DICT: std::sync::LazyLock<lopdf::Dictionary> =
                std::sync::LazyLock::new(lopdf::Dictionary::new);
            Ok(&EMPTY_DICT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, ObjectId, Stream, dictionary};

    /// Build a PDF whose pages carry the given content streams and share
    /// the resources returned by `resources`.
    fn pdf_with_pages(
        contents: &[&[u8]],
        resources: impl FnOnce(&mut Document) -> lopdf::Dictionary,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let resources = resources(&mut doc);
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for content in contents {
            let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content.to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => contents.len() as i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }

    fn no_resources(_: &mut Document) -> lopdf::Dictionary {
        lopdf::Dictionary::new()
    }

    fn helvetica(_: &mut Document) -> lopdf::Dictionary {
        dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                },
            },
        }
    }

    #[test]
    fn open_counts_pages() {
        let bytes = pdf_with_pages(&[b"", b"", b""], no_resources);
        let source = LopdfSource::from_bytes(&bytes).unwrap();
        assert_eq!(source.page_count(), 3);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = LopdfSource::from_bytes(b"not a pdf").unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let bytes = pdf_with_pages(&[b""], no_resources);
        let source = LopdfSource::from_bytes(&bytes).unwrap();
        let media = source.media_box(0).unwrap();
        assert_eq!((media.width(), media.height()), (612.0, 792.0));
    }

    #[test]
    fn page_index_out_of_range() {
        let bytes = pdf_with_pages(&[b""], no_resources);
        let source = LopdfSource::from_bytes(&bytes).unwrap();
        let err = source.page(5).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn tokens_are_grouped_from_glyphs() {
        let bytes = pdf_with_pages(
            &[b"BT /F1 10 Tf 20 700 Td (1.001 Was ist) Tj ET"],
            helvetica,
        );
        let source = LopdfSource::from_bytes(&bytes).unwrap();
        let page = source.page(0).unwrap();

        assert_eq!(page.number, 1);
        let texts: Vec<&str> = page.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1.001", "Was", "ist"]);
        let label = &page.tokens[0];
        assert!((label.bbox.x0 - 20.0).abs() < 1e-9);
        assert!((label.bbox.x1 - 50.0).abs() < 1e-9);
        assert_eq!(label.page, 1);
    }

    #[test]
    fn second_page_is_numbered_two() {
        let bytes = pdf_with_pages(
            &[b"BT /F1 10 Tf 20 700 Td (a) Tj ET", b"BT /F1 10 Tf 20 700 Td (b) Tj ET"],
            helvetica,
        );
        let source = LopdfSource::from_bytes(&bytes).unwrap();
        let page = source.page(1).unwrap();
        assert_eq!(page.number, 2);
        assert_eq!(page.tokens[0].text, "b");
        assert_eq!(page.tokens[0].page, 2);
    }

    #[test]
    fn image_placements_become_rasters() {
        let bytes = pdf_with_pages(&[b"q 200 0 0 150 100 300 cm /Im0 Do Q"], |doc| {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 2i64,
                    "Height" => 2i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                },
                vec![255u8, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 0],
            ));
            dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            }
        });

        let source = LopdfSource::from_bytes(&bytes).unwrap();
        let page = source.page(0).unwrap();
        assert_eq!(page.rasters.len(), 1);
        let raster = &page.rasters[0];
        assert_eq!(raster.page, 1);
        assert_eq!(raster.bbox, BBox::new(100.0, 342.0, 300.0, 492.0));
        let content = raster.content.as_ref().unwrap();
        assert_eq!(content.components, Some(3));
        assert_eq!(content.data.len(), 12);
    }

    #[test]
    fn custom_tolerance_splits_tokens() {
        let bytes = pdf_with_pages(
            &[b"BT /F1 10 Tf 20 700 Td [(AB) -200 (CD)] TJ ET"],
            helvetica,
        );
        let source = LopdfSource::from_bytes(&bytes).unwrap();
        let joined = source.page(0).unwrap();
        assert_eq!(joined.tokens.len(), 1);

        let strict = LopdfSource::from_bytes(&bytes).unwrap().with_options(ParseOptions {
            x_tolerance: 1.0,
            ..ParseOptions::default()
        });
        let split = strict.page(0).unwrap();
        let texts: Vec<&str> = split.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["AB", "CD"]);
    }

    #[test]
    fn missing_contents_gives_empty_page() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();

        let source = LopdfSource::from_bytes(&buf).unwrap();
        let page = source.page(0).unwrap();
        assert!(page.tokens.is_empty());
        assert_eq!((page.width, page.height), (595.0, 842.0));
    }

    #[test]
    fn object_to_f64_rejects_names() {
        assert_eq!(object_to_f64(&Object::Integer(3)).unwrap(), 3.0);
        assert!(object_to_f64(&Object::Name(b"x".to_vec())).is_err());
    }
}
