//! # Page Rasterizer
//!
//! Paints a [`PageLayout`] onto a tiny-skia pixmap and encodes it as JPEG.
//!
//! Layout coordinates are CSS px; the pixmap is `device_pixel_ratio` times
//! larger, so everything is drawn through one scale transform. Each page
//! region (header, body, footer) is clipped to its rect with a mask, the
//! way `overflow: hidden` clips in the browser.
//!
//! Text is drawn from real glyph outlines. A standard font slot the host
//! could not back with an installed face carries metrics only; its words
//! are greeked, painted as bars of the right width at the right position.

use std::cell::Cell;
use std::collections::HashMap;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, RgbaImage};
use tiny_skia::{
    FillRule, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::error::LaminaError;
use crate::flow::Rect;
use crate::font::{FontContext, FontData};
use crate::image_loader::{AssetStore, LoadedImage};
use crate::layout::{DrawCommand, LayoutElement, PageLayout, PositionedGlyph, TextLine};
use crate::style::{Color, ObjectFit, TextDecoration};

const PLACEHOLDER_FILL: Color = Color {
    r: 0.898,
    g: 0.898,
    b: 0.898,
    a: 1.0,
};
const PLACEHOLDER_STROKE: Color = Color {
    r: 0.69,
    g: 0.69,
    b: 0.69,
    a: 1.0,
};

/// One captured page. Transient: handed to the PDF writer and dropped.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub width_px: u32,
    pub height_px: u32,
    pub jpeg: Vec<u8>,
}

pub struct Rasterizer<'a> {
    fonts: &'a FontContext,
    assets: &'a AssetStore,
    dpr: f64,
    jpeg_quality: u8,
    greek_warned: Cell<bool>,
}

/// Per-page paint state.
struct Canvas<'f> {
    pixmap: Pixmap,
    transform: Transform,
    faces: HashMap<(String, u32, bool), Option<ttf_parser::Face<'f>>>,
}

type Result<T> = std::result::Result<T, String>;

impl<'a> Rasterizer<'a> {
    pub fn new(fonts: &'a FontContext, assets: &'a AssetStore, dpr: f64, jpeg_quality: u8) -> Self {
        Self {
            fonts,
            assets,
            dpr: if dpr > 0.0 { dpr } else { 1.0 },
            jpeg_quality: jpeg_quality.clamp(1, 100),
            greek_warned: Cell::new(false),
        }
    }

    /// Capture page `index` of the export.
    pub fn rasterize(&self, index: usize, layout: &PageLayout) -> std::result::Result<RenderedPage, LaminaError> {
        self.render(layout).map_err(|reason| LaminaError::Raster {
            page: index,
            reason,
        })
    }

    fn render(&self, layout: &PageLayout) -> Result<RenderedPage> {
        let width_px = (layout.width * self.dpr).ceil() as u32;
        let height_px = (layout.height * self.dpr).ceil() as u32;
        let mut pixmap = Pixmap::new(width_px, height_px)
            .ok_or_else(|| format!("cannot allocate a {width_px}x{height_px} pixmap"))?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let mut canvas = Canvas {
            pixmap,
            transform: Transform::from_scale(self.dpr as f32, self.dpr as f32),
            faces: HashMap::new(),
        };
        for region in &layout.regions {
            let Some(clip) = self.clip_mask(&canvas, &region.rect) else {
                continue;
            };
            for element in &region.elements {
                self.paint_element(&mut canvas, element, &clip);
            }
        }

        let jpeg = encode_jpeg(&canvas.pixmap, self.jpeg_quality)?;
        Ok(RenderedPage {
            width_px,
            height_px,
            jpeg,
        })
    }

    fn clip_mask(&self, canvas: &Canvas<'_>, rect: &Rect) -> Option<Mask> {
        let mut mask = Mask::new(canvas.pixmap.width(), canvas.pixmap.height())?;
        let r = skia_rect(rect.x, rect.y, rect.width, rect.height)?;
        mask.fill_path(
            &PathBuilder::from_rect(r),
            FillRule::Winding,
            false,
            canvas.transform,
        );
        Some(mask)
    }

    fn paint_element(&self, canvas: &mut Canvas<'a>, el: &LayoutElement, clip: &Mask) {
        match &el.draw {
            DrawCommand::None => {}
            DrawCommand::Rect {
                background,
                border_width,
                border_color,
            } => {
                if let Some(bg) = background {
                    fill_rect(canvas, el.x, el.y, el.width, el.height, *bg, clip);
                }
                let (x, y, w, h) = (el.x, el.y, el.width, el.height);
                let c = *border_color;
                if border_width.top > 0.0 {
                    fill_rect(canvas, x, y, w, border_width.top, c, clip);
                }
                if border_width.bottom > 0.0 {
                    fill_rect(canvas, x, y + h - border_width.bottom, w, border_width.bottom, c, clip);
                }
                if border_width.left > 0.0 {
                    fill_rect(canvas, x, y, border_width.left, h, c, clip);
                }
                if border_width.right > 0.0 {
                    fill_rect(canvas, x + w - border_width.right, y, border_width.right, h, c, clip);
                }
            }
            DrawCommand::Text { lines } => {
                for line in lines {
                    self.paint_line(canvas, line, clip);
                }
            }
            DrawCommand::Image { src, fit } => match self.assets.image(src) {
                Some(img) => self.paint_image(canvas, el, img, *fit, clip),
                None => paint_placeholder(canvas, el, clip),
            },
            DrawCommand::ImagePlaceholder => paint_placeholder(canvas, el, clip),
        }
        for child in &el.children {
            self.paint_element(canvas, child, clip);
        }
    }

    fn paint_image(
        &self,
        canvas: &mut Canvas<'_>,
        el: &LayoutElement,
        img: &LoadedImage,
        fit: ObjectFit,
        clip: &Mask,
    ) {
        if img.width_px == 0 || img.height_px == 0 {
            paint_placeholder(canvas, el, clip);
            return;
        }
        let (box_w, box_h) = (el.width * self.dpr, el.height * self.dpr);
        let (iw, ih) = (img.width_px as f64, img.height_px as f64);
        let (w, h) = match fit {
            ObjectFit::Fill => (box_w, box_h),
            ObjectFit::Contain => {
                let scale = (box_w / iw).min(box_h / ih);
                (iw * scale, ih * scale)
            }
        };
        let (w, h) = (w.round().max(1.0) as u32, h.round().max(1.0) as u32);
        let left = (el.x * self.dpr + (box_w - w as f64) / 2.0).round() as i32;
        let top = (el.y * self.dpr + (box_h - h as f64) / 2.0).round() as i32;

        let Some(source) = RgbaImage::from_raw(img.width_px, img.height_px, img.rgba.clone()) else {
            paint_placeholder(canvas, el, clip);
            return;
        };
        let resized = imageops::resize(&source, w, h, FilterType::Triangle);
        let Some(pixmap) = premultiplied_pixmap(resized) else {
            paint_placeholder(canvas, el, clip);
            return;
        };
        canvas.pixmap.draw_pixmap(
            left,
            top,
            pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            Some(clip),
        );
    }

    fn paint_line(&self, canvas: &mut Canvas<'a>, line: &TextLine, clip: &Mask) {
        let baseline = line.y + line.baseline;
        // Bar being accumulated for greeked glyphs: (start x, end x, style source).
        let mut bar: Option<(f64, f64, &PositionedGlyph)> = None;

        for glyph in &line.glyphs {
            let x = line.x + glyph.x_offset;
            if !glyph.char_value.is_whitespace() && glyph.char_value != '\u{FFFC}' {
                let drawn = self.paint_outline(canvas, glyph, x, baseline, clip);
                if drawn {
                    flush_bar(canvas, bar.take(), baseline, clip);
                } else {
                    bar = match bar {
                        Some((start, _, first)) if same_run(first, glyph) => {
                            Some((start, x + glyph.width, first))
                        }
                        other => {
                            flush_bar(canvas, other, baseline, clip);
                            Some((x, x + glyph.width, glyph))
                        }
                    };
                }
            } else {
                flush_bar(canvas, bar.take(), baseline, clip);
            }
            paint_decoration(canvas, glyph, x, baseline, clip);
        }
        flush_bar(canvas, bar, baseline, clip);
    }

    /// Draw one glyph from its font outline. Returns false when the font has
    /// no outline for it.
    fn paint_outline(
        &self,
        canvas: &mut Canvas<'a>,
        glyph: &PositionedGlyph,
        x: f64,
        baseline: f64,
        clip: &Mask,
    ) -> bool {
        let italic = glyph.font_style != crate::style::FontStyle::Normal;
        let key = (glyph.font_family.clone(), glyph.font_weight, italic);
        let fonts = self.fonts;
        let face = canvas.faces.entry(key).or_insert_with(|| {
            match fonts.resolve(&glyph.font_family, glyph.font_weight, italic) {
                FontData::Custom { data, .. } => ttf_parser::Face::parse(data, 0).ok(),
                FontData::Standard(_) => None,
            }
        });
        let Some(face) = face.as_ref() else {
            if !self.greek_warned.replace(true) {
                log::warn!(
                    "Font '{}' has no outlines; its text is rasterized as word bars",
                    glyph.font_family
                );
            }
            return false;
        };
        let Some(gid) = face.glyph_index(glyph.char_value) else {
            return false;
        };
        let scale = glyph.font_size / face.units_per_em() as f64;
        let mut outline = OutlinePath {
            builder: PathBuilder::new(),
            origin_x: x as f32,
            origin_y: baseline as f32,
            scale: scale as f32,
        };
        if face.outline_glyph(gid, &mut outline).is_none() {
            // Blank glyph with no contours.
            return true;
        }
        if let Some(path) = outline.builder.finish() {
            let paint = solid(glyph.color);
            canvas
                .pixmap
                .fill_path(&path, &paint, FillRule::Winding, canvas.transform, Some(clip));
        }
        true
    }
}

/// Maps font units (y up) into page px (y down) around the glyph origin.
struct OutlinePath {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl OutlinePath {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for OutlinePath {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn same_run(a: &PositionedGlyph, b: &PositionedGlyph) -> bool {
    a.font_size == b.font_size && a.color == b.color
}

/// Paint a greeked word: a bar spanning the x-height band.
fn flush_bar(
    canvas: &mut Canvas<'_>,
    bar: Option<(f64, f64, &PositionedGlyph)>,
    baseline: f64,
    clip: &Mask,
) {
    let Some((start, end, glyph)) = bar else {
        return;
    };
    let size = glyph.font_size;
    let mut color = glyph.color;
    color.a *= 0.75;
    fill_rect(canvas, start, baseline - size * 0.5, end - start, size * 0.45, color, clip);
}

fn paint_decoration(
    canvas: &mut Canvas<'_>,
    glyph: &PositionedGlyph,
    x: f64,
    baseline: f64,
    clip: &Mask,
) {
    let thickness = (glyph.font_size / 14.0).max(1.0);
    let y = match glyph.text_decoration {
        TextDecoration::None => return,
        TextDecoration::Underline => baseline + glyph.font_size * 0.1,
        TextDecoration::LineThrough => baseline - glyph.font_size * 0.3,
    };
    fill_rect(canvas, x, y, glyph.width, thickness, glyph.color, clip);
}

fn paint_placeholder(canvas: &mut Canvas<'_>, el: &LayoutElement, clip: &Mask) {
    fill_rect(canvas, el.x, el.y, el.width, el.height, PLACEHOLDER_FILL, clip);
    let Some(r) = skia_rect(el.x + 0.5, el.y + 0.5, el.width - 1.0, el.height - 1.0) else {
        return;
    };
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    canvas.pixmap.stroke_path(
        &PathBuilder::from_rect(r),
        &solid(PLACEHOLDER_STROKE),
        &stroke,
        canvas.transform,
        Some(clip),
    );
}

fn fill_rect(canvas: &mut Canvas<'_>, x: f64, y: f64, w: f64, h: f64, color: Color, clip: &Mask) {
    if let Some(r) = skia_rect(x, y, w, h) {
        canvas
            .pixmap
            .fill_rect(r, &solid(color), canvas.transform, Some(clip));
    }
}

fn skia_rect(x: f64, y: f64, w: f64, h: f64) -> Option<tiny_skia::Rect> {
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    tiny_skia::Rect::from_xywh(x as f32, y as f32, w as f32, h as f32)
}

fn solid(color: Color) -> Paint<'static> {
    let [r, g, b, a] = color.to_rgba8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn premultiplied_pixmap(img: RgbaImage) -> Option<Pixmap> {
    let (w, h) = img.dimensions();
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, tiny_skia::IntSize::from_wh(w, h)?)
}

/// The page is painted over opaque white, so alpha is always 255 and the
/// premultiplied channels are the plain ones.
fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>> {
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&rgb, pixmap.width(), pixmap.height(), ColorType::Rgb8)
        .map_err(|e| format!("JPEG encoding failed: {e}"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_fragment;
    use crate::flow::{PageContainer, PageGeometry};
    use crate::layout::LayoutEngine;
    use crate::style::Stylesheet;

    fn page(body_html: &str) -> PageLayout {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let assets = AssetStore::with_defaults(None, 1000);
        let engine = LayoutEngine::new(&fonts, &styles, &assets);
        let container = PageContainer {
            index: 0,
            header: vec![],
            body: parse_fragment(body_html),
            footer: vec![],
        };
        engine.layout_page(&container, &PageGeometry::default())
    }

    fn decode(rendered: &RenderedPage) -> image::RgbImage {
        image::load_from_memory(&rendered.jpeg).unwrap().to_rgb8()
    }

    #[test]
    fn page_size_scales_with_device_pixel_ratio() {
        let fonts = FontContext::new();
        let assets = AssetStore::with_defaults(None, 1000);
        let layout = page("<p>hola</p>");
        let r1 = Rasterizer::new(&fonts, &assets, 1.0, 80).rasterize(0, &layout).unwrap();
        let r2 = Rasterizer::new(&fonts, &assets, 2.0, 80).rasterize(0, &layout).unwrap();
        assert_eq!(r1.width_px, layout.width.ceil() as u32);
        assert_eq!(r2.width_px, (layout.width * 2.0).ceil() as u32);
        assert_eq!(&r1.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn blank_page_is_white() {
        let fonts = FontContext::new();
        let assets = AssetStore::with_defaults(None, 1000);
        let rendered = Rasterizer::new(&fonts, &assets, 1.0, 92)
            .rasterize(0, &page(""))
            .unwrap();
        let img = decode(&rendered);
        let px = img.get_pixel(img.width() / 2, img.height() / 2);
        assert!(px.0.iter().all(|&c| c > 245));
    }

    #[test]
    fn background_is_painted_inside_body() {
        let fonts = FontContext::new();
        let assets = AssetStore::with_defaults(None, 1000);
        let layout = page(r#"<div style="height:200px; background:#000"></div>"#);
        let body = layout.regions[1].rect;
        let rendered = Rasterizer::new(&fonts, &assets, 1.0, 92).rasterize(0, &layout).unwrap();
        let img = decode(&rendered);
        let px = img.get_pixel((body.x + 50.0) as u32, (body.y + 100.0) as u32);
        assert!(px.0.iter().all(|&c| c < 30));
    }

    #[test]
    fn regions_clip_overflowing_content() {
        let fonts = FontContext::new();
        let assets = AssetStore::with_defaults(None, 1000);
        let layout = page(r#"<div style="height:3000px; background:#000"></div>"#);
        let footer = layout.regions[2].rect;
        let rendered = Rasterizer::new(&fonts, &assets, 1.0, 92).rasterize(0, &layout).unwrap();
        let img = decode(&rendered);
        let px = img.get_pixel((footer.x + 50.0) as u32, (footer.y + footer.height / 2.0) as u32);
        assert!(px.0.iter().all(|&c| c > 225));
    }

    #[test]
    fn failed_image_paints_placeholder() {
        let fonts = FontContext::new();
        let mut assets = AssetStore::with_defaults(None, 1000);
        assets.load_all(["/no/such/file.png"]);
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let engine = LayoutEngine::new(&fonts, &styles, &assets);
        let container = PageContainer {
            index: 0,
            header: vec![],
            body: parse_fragment(r#"<img src="/no/such/file.png">"#),
            footer: vec![],
        };
        let geometry = PageGeometry::default();
        let layout = engine.layout_page(&container, &geometry);
        let body = geometry.body_rect();
        let rendered = Rasterizer::new(&fonts, &assets, 1.0, 92).rasterize(0, &layout).unwrap();
        let img = decode(&rendered);
        let px = img.get_pixel((body.x + 60.0) as u32, (body.y + 45.0) as u32);
        assert!(px.0.iter().all(|&c| (200..=240).contains(&c)));
    }

    fn dark_runs(img: &image::RgbImage, y: u32, x0: u32, x1: u32) -> usize {
        let mut runs = 0;
        let mut inside = false;
        for x in x0..x1 {
            let dark = img.get_pixel(x, y).0[0] < 128;
            if dark && !inside {
                runs += 1;
            }
            inside = dark;
        }
        runs
    }

    #[test]
    fn default_fonts_draw_separate_glyphs() {
        let fonts = FontContext::new();
        let assets = AssetStore::with_defaults(None, 1000);
        let layout = page(r#"<p style="font-size:60px; margin:0">IIII</p>"#);
        let body = layout.regions[1].rect;
        let rendered = Rasterizer::new(&fonts, &assets, 1.0, 92).rasterize(0, &layout).unwrap();
        let img = decode(&rendered);
        let runs = dark_runs(&img, (body.y + 30.0) as u32, body.x as u32, (body.x + 400.0) as u32);
        assert_eq!(runs, 4, "expected one stem per glyph");
    }

    #[test]
    fn permuted_text_rasterizes_differently() {
        let fonts = FontContext::new();
        let assets = AssetStore::with_defaults(None, 1000);
        let rasterizer = Rasterizer::new(&fonts, &assets, 1.0, 92);
        let a = decode(&rasterizer.rasterize(0, &page("<p>nu nu nu benigno</p>")).unwrap());
        let b = decode(&rasterizer.rasterize(0, &page("<p>un un un benigno</p>")).unwrap());
        assert_eq!(a.dimensions(), b.dimensions());
        assert_ne!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn afm_only_text_is_greeked_not_blank() {
        let fonts = FontContext::standard();
        let assets = AssetStore::with_defaults(None, 1000);
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let engine = LayoutEngine::new(&fonts, &styles, &assets);
        let container = PageContainer {
            index: 0,
            header: vec![],
            body: parse_fragment(r#"<p style="font-size:40px; margin:0">MMMMMMMM</p>"#),
            footer: vec![],
        };
        let layout = engine.layout_page(&container, &PageGeometry::default());
        let body = layout.regions[1].rect;
        let rendered = Rasterizer::new(&fonts, &assets, 1.0, 92).rasterize(0, &layout).unwrap();
        let img = decode(&rendered);
        let y = (body.y + 30.0) as u32;
        let dark = (0..200)
            .filter(|dx| img.get_pixel((body.x + *dx as f64) as u32, y).0[0] < 128)
            .count();
        assert!(dark > 100, "expected a word bar, found {dark} dark pixels");
        assert_eq!(dark_runs(&img, y, body.x as u32, (body.x + 200.0) as u32), 1);
    }
}
