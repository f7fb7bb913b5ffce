//! Content stream interpreter.
//!
//! Walks the operators of a decoded content stream, tracking the graphics
//! and text state needed to place glyphs and image XObjects on the page.
//! Form XObjects are entered recursively up to a depth limit.

use std::collections::HashMap;
use std::rc::Rc;

use examcard_core::{BBox, Ctm, Glyph, ImageContent};
use lopdf::content::Content;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::font::LoadedFont;
use crate::image::image_content;
use crate::lopdf_backend::{decode_stream, object_to_f64, resolve};

/// An image XObject drawn on the page.
#[derive(Debug, Clone)]
pub(crate) struct PlacedImage {
    pub name: String,
    pub bbox: BBox,
    pub content: Option<ImageContent>,
}

/// Everything collected from one page's content.
#[derive(Debug, Default)]
pub(crate) struct PageSink {
    pub glyphs: Vec<Glyph>,
    pub images: Vec<PlacedImage>,
}

/// Text state parameters (saved and restored with `q`/`Q`).
#[derive(Debug, Clone)]
struct TextParams {
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    font_size: f64,
    rise: f64,
    font: Option<Rc<LoadedFont>>,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            font_size: 0.0,
            rise: 0.0,
            font: None,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Ctm,
    text: TextParams,
}

/// Text matrix and text line matrix of the current `BT`/`ET` object.
#[derive(Debug, Clone, Copy, Default)]
struct TextObject {
    tm: Ctm,
    tlm: Ctm,
}

impl TextObject {
    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Ctm::translation(tx, ty).concat(&self.tlm);
        self.tm = self.tlm;
    }

    fn set_matrix(&mut self, m: Ctm) {
        self.tlm = m;
        self.tm = m;
    }

    fn advance(&mut self, tx: f64) {
        self.tm = Ctm::translation(tx, 0.0).concat(&self.tm);
    }
}

pub(crate) struct Interpreter<'a> {
    doc: &'a lopdf::Document,
    page_height: f64,
    max_depth: usize,
    fallback_font: Rc<LoadedFont>,
    sink: PageSink,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a lopdf::Document, page_height: f64, max_depth: usize) -> Self {
        Self {
            doc,
            page_height,
            max_depth,
            fallback_font: Rc::new(LoadedFont::fallback()),
            sink: PageSink::default(),
        }
    }

    /// Interpret a page content stream starting from `base` as the CTM.
    pub fn run(
        mut self,
        content: &[u8],
        resources: &lopdf::Dictionary,
        base: Ctm,
    ) -> Result<PageSink, BackendError> {
        let mut state = GraphicsState {
            ctm: base,
            text: TextParams::default(),
        };
        self.walk(content, resources, &mut state, 0)?;
        Ok(self.sink)
    }

    fn walk(
        &mut self,
        bytes: &[u8],
        resources: &lopdf::Dictionary,
        state: &mut GraphicsState,
        depth: usize,
    ) -> Result<(), BackendError> {
        if depth > self.max_depth {
            return Err(BackendError::Interpreter(format!(
                "Form XObject recursion depth {depth} exceeds limit {}",
                self.max_depth
            )));
        }

        let content = Content::decode(bytes).map_err(|e| {
            BackendError::Interpreter(format!("failed to decode content stream: {e}"))
        })?;
        let mut fonts: HashMap<Vec<u8>, Rc<LoadedFont>> = HashMap::new();
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut text = TextObject::default();

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        *state = previous;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix(operands) {
                        state.ctm = m.concat(&state.ctm);
                    }
                }
                "BT" => text = TextObject::default(),
                "Tc" => {
                    if let Some(v) = number(operands, 0) {
                        state.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = number(operands, 0) {
                        state.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = number(operands, 0) {
                        state.text.horizontal_scaling = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(v) = number(operands, 0) {
                        state.text.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(v) = number(operands, 0) {
                        state.text.rise = v;
                    }
                }
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        let font = self.font(resources, name, &mut fonts);
                        state.text.font = Some(font);
                    }
                    if let Some(size) = number(operands, 1) {
                        state.text.font_size = size;
                    }
                }
                "Td" => {
                    if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                        text.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                        state.text.leading = -ty;
                        text.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix(operands) {
                        text.set_matrix(m);
                    }
                }
                "T*" => text.move_line(0.0, -state.text.leading),
                "Tj" => {
                    if let Some(bytes) = string(operands, 0) {
                        self.show(bytes, state, &mut text);
                    }
                }
                "'" => {
                    text.move_line(0.0, -state.text.leading);
                    if let Some(bytes) = string(operands, 0) {
                        self.show(bytes, state, &mut text);
                    }
                }
                "\"" => {
                    if let Some(v) = number(operands, 0) {
                        state.text.word_spacing = v;
                    }
                    if let Some(v) = number(operands, 1) {
                        state.text.char_spacing = v;
                    }
                    text.move_line(0.0, -state.text.leading);
                    if let Some(bytes) = string(operands, 2) {
                        self.show(bytes, state, &mut text);
                    }
                }
                "TJ" => {
                    let Some(items) = operands.first().and_then(|o| o.as_array().ok()) else {
                        continue;
                    };
                    for item in items {
                        match item {
                            lopdf::Object::String(bytes, _) => self.show(bytes, state, &mut text),
                            other => {
                                if let Ok(adjust) = object_to_f64(other) {
                                    let p = &state.text;
                                    text.advance(
                                        -adjust / 1000.0 * p.font_size * p.horizontal_scaling,
                                    );
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(resources, name, state, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn font(
        &self,
        resources: &lopdf::Dictionary,
        name: &[u8],
        cache: &mut HashMap<Vec<u8>, Rc<LoadedFont>>,
    ) -> Rc<LoadedFont> {
        if let Some(font) = cache.get(name) {
            return Rc::clone(font);
        }
        let dict = resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|o| resolve(self.doc, o).as_dict().ok());

        let font = match dict.map(|d| LoadedFont::load(self.doc, d)) {
            Some(Ok(font)) => Rc::new(font),
            Some(Err(e)) => {
                warn!(font = %String::from_utf8_lossy(name), error = %e, "unusable font; using defaults");
                Rc::clone(&self.fallback_font)
            }
            None => {
                debug!(font = %String::from_utf8_lossy(name), "font resource not found");
                Rc::clone(&self.fallback_font)
            }
        };
        cache.insert(name.to_vec(), Rc::clone(&font));
        font
    }

    /// Emit one glyph per character code of `bytes` and advance the text matrix.
    fn show(&mut self, bytes: &[u8], state: &GraphicsState, text: &mut TextObject) {
        let p = &state.text;
        let font = p.font.as_ref().unwrap_or(&self.fallback_font);
        let scale = Ctm::new(p.font_size * p.horizontal_scaling, 0.0, 0.0, p.font_size, 0.0, p.rise);
        let ascent = font.ascent() / 1000.0;
        let descent = font.descent() / 1000.0;

        for ch in font.decode(bytes) {
            let w0 = font.width(ch.code) / 1000.0;
            if !ch.text.is_empty() {
                let glyph_box = Ctm::new(w0, 0.0, 0.0, ascent - descent, 0.0, descent);
                let rendering = glyph_box.concat(&scale).concat(&text.tm).concat(&state.ctm);
                self.sink
                    .glyphs
                    .push(Glyph::new(ch.text, rendering.unit_square_bbox(self.page_height)));
            }
            let mut tx = w0 * p.font_size + p.char_spacing;
            if ch.code == 32 && !font.is_multi_byte() {
                tx += p.word_spacing;
            }
            text.advance(tx * p.horizontal_scaling);
        }
    }

    fn draw_xobject(
        &mut self,
        resources: &lopdf::Dictionary,
        name: &[u8],
        state: &GraphicsState,
        depth: usize,
    ) -> Result<(), BackendError> {
        let label = String::from_utf8_lossy(name).into_owned();
        let stream = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|o| resolve(self.doc, o).as_stream().ok());
        let Some(stream) = stream else {
            warn!(xobject = %label, "XObject not found in resources");
            return Ok(());
        };

        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        match subtype {
            Some(b"Image") => {
                let content = match image_content(self.doc, stream) {
                    Ok(content) => Some(content),
                    Err(e) => {
                        warn!(xobject = %label, error = %e, "image data unavailable");
                        None
                    }
                };
                self.sink.images.push(PlacedImage {
                    name: label,
                    bbox: state.ctm.unit_square_bbox(self.page_height),
                    content,
                });
                Ok(())
            }
            Some(b"Form") => {
                let mut form_state = state.clone();
                if let Some(m) = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| o.as_array().ok())
                    .and_then(|arr| matrix(arr))
                {
                    form_state.ctm = m.concat(&form_state.ctm);
                }
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve(self.doc, o).as_dict().ok())
                    .unwrap_or(resources);
                let bytes = decode_stream(stream).map_err(|e| {
                    BackendError::Interpreter(format!("failed to decode Form XObject /{label}: {e}"))
                })?;
                self.walk(&bytes, form_resources, &mut form_state, depth + 1)
            }
            _ => Ok(()),
        }
    }
}

fn number(operands: &[lopdf::Object], index: usize) -> Option<f64> {
    operands.get(index).and_then(|o| object_to_f64(o).ok())
}

fn string(operands: &[lopdf::Object], index: usize) -> Option<&[u8]> {
    match operands.get(index) {
        Some(lopdf::Object::String(bytes, _)) => Some(bytes),
        _ => None,
    }
}

fn matrix(operands: &[lopdf::Object]) -> Option<Ctm> {
    if operands.len() < 6 {
        return None;
    }
    let v: Vec<f64> = operands[..6]
        .iter()
        .map(|o| object_to_f64(o).ok())
        .collect::<Option<_>>()?;
    Some(Ctm::new(v[0], v[1], v[2], v[3], v[4], v[5]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, Stream, dictionary};

    const PAGE_HEIGHT: f64 = 792.0;

    fn run(doc: &Document, content: &[u8], resources: &lopdf::Dictionary) -> PageSink {
        Interpreter::new(doc, PAGE_HEIGHT, 10)
            .run(content, resources, Ctm::identity())
            .unwrap()
    }

    fn text_of(sink: &PageSink) -> String {
        sink.glyphs.iter().map(|g| g.text.as_str()).collect()
    }

    #[test]
    fn simple_text_positions() {
        let doc = Document::with_version("1.5");
        let sink = run(&doc, b"BT /F1 10 Tf 72 700 Td (Hi) Tj ET", &lopdf::Dictionary::new());

        assert_eq!(text_of(&sink), "Hi");
        let h = &sink.glyphs[0].bbox;
        // 600/1000 default width, 750/-250 default extent, 10pt.
        assert!((h.x0 - 72.0).abs() < 1e-9);
        assert!((h.x1 - 78.0).abs() < 1e-9);
        assert!((h.top - (PAGE_HEIGHT - 707.5)).abs() < 1e-9);
        assert!((h.bottom - (PAGE_HEIGHT - 697.5)).abs() < 1e-9);
        assert!((sink.glyphs[1].bbox.x0 - 78.0).abs() < 1e-9);
    }

    #[test]
    fn tj_array_adjustments_move_glyphs() {
        let doc = Document::with_version("1.5");
        let sink = run(
            &doc,
            b"BT /F1 10 Tf 0 0 Td [(A) -1000 (B)] TJ ET",
            &lopdf::Dictionary::new(),
        );
        assert_eq!(sink.glyphs.len(), 2);
        // 6pt for "A" plus 10pt of positive adjustment.
        assert!((sink.glyphs[1].bbox.x0 - 16.0).abs() < 1e-9);
    }

    #[test]
    fn leading_and_next_line() {
        let doc = Document::with_version("1.5");
        let sink = run(
            &doc,
            b"BT /F1 10 Tf 14 TL 50 500 Td (a) Tj T* (b) Tj (c) ' ET",
            &lopdf::Dictionary::new(),
        );
        let tops: Vec<f64> = sink.glyphs.iter().map(|g| g.bbox.top).collect();
        assert!((tops[1] - tops[0] - 14.0).abs() < 1e-9);
        assert!((tops[2] - tops[1] - 14.0).abs() < 1e-9);
        assert!((sink.glyphs[1].bbox.x0 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn cm_and_state_restore() {
        let doc = Document::with_version("1.5");
        let sink = run(
            &doc,
            b"q 2 0 0 2 0 0 cm BT /F1 10 Tf 10 10 Td (x) Tj ET Q BT /F1 10 Tf 10 10 Td (y) Tj ET",
            &lopdf::Dictionary::new(),
        );
        let x = &sink.glyphs[0].bbox;
        let y = &sink.glyphs[1].bbox;
        assert!((x.x0 - 20.0).abs() < 1e-9);
        assert!((x.width() - 12.0).abs() < 1e-9);
        assert!((y.x0 - 10.0).abs() < 1e-9);
        assert!((y.width() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn font_widths_and_word_spacing() {
        let mut doc = Document::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 32i64,
            "LastChar" => 33i64,
            "Widths" => vec![Object::Integer(250), Object::Integer(400)],
        });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        let sink = run(&doc, b"BT /F1 10 Tf 5 Tw 0 0 Td ( !) Tj ET", &resources);
        // Space advances 2.5pt plus 5pt of word spacing.
        assert!((sink.glyphs[1].bbox.x0 - 7.5).abs() < 1e-9);
        assert!((sink.glyphs[1].bbox.width() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn image_xobject_is_placed_with_ctm() {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1i64,
                "Height" => 1i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            },
            vec![128],
        ));
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        let sink = run(&doc, b"q 200 0 0 150 100 300 cm /Im0 Do Q", &resources);

        assert_eq!(sink.images.len(), 1);
        let image = &sink.images[0];
        assert_eq!(image.name, "Im0");
        assert_eq!(image.bbox, BBox::new(100.0, PAGE_HEIGHT - 450.0, 300.0, PAGE_HEIGHT - 300.0));
        assert_eq!(image.content.as_ref().map(|c| c.data.clone()), Some(vec![128]));
    }

    #[test]
    fn form_xobject_recurses_with_matrix() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 40.into(), 0.into()],
            },
            b"BT /F1 10 Tf 0 0 Td (f) Tj ET".to_vec(),
        ));
        let resources = dictionary! {
            "XObject" => dictionary! { "Fm0" => form_id },
        };
        let sink = run(&doc, b"/Fm0 Do", &resources);
        assert_eq!(text_of(&sink), "f");
        assert!((sink.glyphs[0].bbox.x0 - 40.0).abs() < 1e-9);
    }

    #[test]
    fn self_referencing_form_hits_depth_limit() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.new_object_id();
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Fm0" => form_id },
                    },
                },
                b"/Fm0 Do".to_vec(),
            )),
        );
        let resources = dictionary! {
            "XObject" => dictionary! { "Fm0" => form_id },
        };
        let err = Interpreter::new(&doc, PAGE_HEIGHT, 3)
            .run(b"/Fm0 Do", &resources, Ctm::identity())
            .unwrap_err();
        assert!(err.to_string().contains("exceeds limit 3"));
    }

    #[test]
    fn missing_xobject_is_skipped() {
        let doc = Document::with_version("1.5");
        let sink = run(&doc, b"/Nope Do BT /F1 10 Tf (ok) Tj ET", &lopdf::Dictionary::new());
        assert!(sink.images.is_empty());
        assert_eq!(text_of(&sink), "ok");
    }
}
