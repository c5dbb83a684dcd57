//! # Headless Layout
//!
//! A small block-and-inline layout engine standing in for the browser the
//! reports were designed for. The flow engine measures candidate page bodies
//! with it, and the rasterizer paints what it produces, so a page that fits
//! during pagination is exactly what ends up on the raster.
//!
//! Supported formatting:
//! - block stacking with sibling margin collapsing, padding, borders, and an
//!   explicit `height`
//! - anonymous blocks around inline runs (see [`inline`])
//! - `ul`/`ol` with markers
//! - grids and tables of equal-width columns (see [`grid`])
//! - replaced `img` elements sized from attributes, style, or intrinsic size
//!
//! Everything is in CSS pixels with page-absolute coordinates.

pub mod grid;
pub mod inline;

use crate::dom::{ContentNode, Element};
use crate::flow::{Measure, PageContainer, PageGeometry, Rect};
use crate::font::FontContext;
use crate::image_loader::AssetStore;
use crate::style::*;
use crate::text::TextLayout;

/// Size of the box drawn for an image with no usable dimensions.
pub const PLACEHOLDER_SIZE: (f64, f64) = (120.0, 90.0);

/// Gap between a list marker and the item text.
const MARKER_GAP: f64 = 6.0;

/// Laid-out content of one region.
#[derive(Debug, Clone)]
pub struct LayoutFragment {
    pub elements: Vec<LayoutElement>,
    /// Scroll height: stacked content plus any overflow.
    pub height: f64,
}

/// A fully laid-out page ready for rasterization.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    /// Header, body and footer, in paint order. Each clips to its rect.
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub rect: Rect,
    pub elements: Vec<LayoutElement>,
}

/// A positioned element on a page.
#[derive(Debug, Clone)]
pub struct LayoutElement {
    /// Absolute position on the page (top-left corner).
    pub x: f64,
    pub y: f64,
    /// Dimensions including padding and border, excluding margin.
    pub width: f64,
    pub height: f64,
    pub draw: DrawCommand,
    /// Child elements (positioned relative to page, not parent).
    pub children: Vec<LayoutElement>,
}

/// What to actually draw for this element.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// Nothing to draw (just a layout container).
    None,
    /// Background and border.
    Rect {
        background: Option<Color>,
        border_width: Edges,
        border_color: Color,
    },
    Text {
        lines: Vec<TextLine>,
    },
    /// A loaded image from the asset store.
    Image {
        src: String,
        fit: ObjectFit,
    },
    /// Grey box for an image that failed or was never loaded.
    ImagePlaceholder,
}

#[derive(Debug, Clone)]
pub struct TextLine {
    pub x: f64,
    /// Top of the line box.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Baseline offset from `y`.
    pub baseline: f64,
    pub glyphs: Vec<PositionedGlyph>,
}

#[derive(Debug, Clone)]
pub struct PositionedGlyph {
    /// Offset from the line's x.
    pub x_offset: f64,
    pub width: f64,
    pub char_value: char,
    pub font_size: f64,
    pub font_family: String,
    pub font_weight: u32,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_decoration: TextDecoration,
}

/// Numbering state of the list whose items are being laid out.
#[derive(Debug, Clone, Copy)]
struct ListCounter {
    style: ListStyle,
    next: i64,
}

impl ListCounter {
    fn for_element(el: &Element, style: &ResolvedStyle) -> Option<Self> {
        if el.tag != "ul" && el.tag != "ol" {
            return None;
        }
        let next = el
            .get_attr("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);
        Some(Self {
            style: style.list_style,
            next,
        })
    }

    fn marker(&mut self) -> Option<String> {
        let marker = match self.style {
            ListStyle::Disc => Some("•".to_string()),
            ListStyle::Decimal => Some(format!("{}.", self.next)),
            ListStyle::None => None,
        };
        self.next += 1;
        marker
    }
}

/// The main layout engine.
pub struct LayoutEngine<'a> {
    fonts: &'a FontContext,
    styles: &'a Stylesheet,
    assets: &'a AssetStore,
    text_layout: TextLayout,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(fonts: &'a FontContext, styles: &'a Stylesheet, assets: &'a AssetStore) -> Self {
        Self {
            fonts,
            styles,
            assets,
            text_layout: TextLayout::new(),
        }
    }

    /// Lay out `nodes` as a block container at (`x`, `y`) of `width`.
    pub fn layout(&self, nodes: &[ContentNode], x: f64, y: f64, width: f64) -> LayoutFragment {
        let root = self.styles.root().clone();
        let mut elements = Vec::new();
        let stacked = self.layout_flow(nodes, &root, None, x, y, width, &mut elements);
        let overflow = elements.iter().map(max_bottom).fold(y, f64::max) - y;
        LayoutFragment {
            height: stacked.max(overflow),
            elements,
        }
    }

    /// Scroll height of `nodes` laid out at `width`.
    pub fn measure(&self, nodes: &[ContentNode], width: f64) -> f64 {
        self.layout(nodes, 0.0, 0.0, width).height
    }

    /// Lay out a composed page into its three clipped regions.
    pub fn layout_page(&self, page: &PageContainer, geometry: &PageGeometry) -> PageLayout {
        let regions = [
            (geometry.header_rect(), &page.header),
            (geometry.body_rect(), &page.body),
            (geometry.footer_rect(), &page.footer),
        ]
        .into_iter()
        .map(|(rect, nodes)| Region {
            rect,
            elements: self.layout(nodes, rect.x, rect.y, rect.width).elements,
        })
        .collect();
        PageLayout {
            width: geometry.page_width_px(),
            height: geometry.page_height_px(),
            regions,
        }
    }

    /// Block formatting context: stack block children, wrap inline runs in
    /// anonymous blocks. Returns the content height including the last
    /// child's bottom margin.
    #[allow(clippy::too_many_arguments)]
    fn layout_flow(
        &self,
        children: &[ContentNode],
        parent: &ResolvedStyle,
        mut list: Option<ListCounter>,
        x: f64,
        y: f64,
        width: f64,
        out: &mut Vec<LayoutElement>,
    ) -> f64 {
        let mut cursor = y;
        let mut pending_margin = 0.0_f64;
        let mut inline_run: Vec<&ContentNode> = Vec::new();

        for child in children {
            let el = match child {
                ContentNode::Text { .. } => {
                    inline_run.push(child);
                    continue;
                }
                ContentNode::Element(el) => el,
            };
            let style = self.styles.resolve(el, parent);
            if style.display == Display::None {
                continue;
            }
            if style.display.is_inline_level() {
                inline_run.push(child);
                continue;
            }

            self.flush_inline(&mut inline_run, parent, x, width, &mut cursor, &mut pending_margin, out);

            let top = cursor + pending_margin.max(style.margin.top);
            let marker = match (style.display, list.as_mut()) {
                (Display::ListItem, Some(counter)) => counter.marker(),
                _ => None,
            };
            let boxed = self.layout_box(el, &style, x, top, width, marker);
            cursor = top + boxed.height;
            pending_margin = style.margin.bottom;
            out.push(boxed);
        }

        self.flush_inline(&mut inline_run, parent, x, width, &mut cursor, &mut pending_margin, out);
        cursor + pending_margin - y
    }

    #[allow(clippy::too_many_arguments)]
    fn flush_inline(
        &self,
        run: &mut Vec<&ContentNode>,
        parent: &ResolvedStyle,
        x: f64,
        width: f64,
        cursor: &mut f64,
        pending_margin: &mut f64,
        out: &mut Vec<LayoutElement>,
    ) {
        if run.is_empty() {
            return;
        }
        let top = *cursor + *pending_margin;
        let height = self.layout_inline(run, parent, x, top, width, out);
        run.clear();
        if height > 0.0 {
            *cursor = top + height;
            *pending_margin = 0.0;
        }
    }

    /// Lay out one block-level element whose border box starts at `top`.
    /// `x` and `available` describe the containing block's content box.
    fn layout_box(
        &self,
        el: &Element,
        style: &ResolvedStyle,
        x: f64,
        top: f64,
        available: f64,
        marker: Option<String>,
    ) -> LayoutElement {
        let margin = style.margin;
        if el.tag == "img" {
            return self.image_element(el, style, x + margin.left, top, available - margin.horizontal());
        }

        let chrome = style.horizontal_chrome();
        let max_box = (available - margin.horizontal()).max(0.0);
        let mut box_width = match style.width.resolve(available) {
            Some(w) => w + chrome,
            None => max_box,
        };
        if let Some(max) = style.max_width.resolve(available) {
            box_width = box_width.min(max + chrome);
        }
        let box_width = box_width.min(max_box).max(0.0);

        let box_x = x + margin.left;
        let cx = box_x + style.border_width.left + style.padding.left;
        let cy = top + style.border_width.top + style.padding.top;
        let cw = (box_width - chrome).max(0.0);

        let mut children = Vec::new();
        let content_height = match style.display {
            Display::Grid => self.layout_grid(el, style, cx, cy, cw, &mut children),
            Display::Table => self.layout_table(el, style, cx, cy, cw, &mut children),
            _ => self.layout_flow(
                &el.children,
                style,
                ListCounter::for_element(el, style),
                cx,
                cy,
                cw,
                &mut children,
            ),
        };
        let content_height = match style.height {
            Dimension::Px(h) => h,
            _ => content_height,
        };

        if let Some(marker) = marker {
            children.insert(0, self.marker_element(&marker, style, cx, cy));
        }

        LayoutElement {
            x: box_x,
            y: top,
            width: box_width,
            height: content_height + style.vertical_chrome(),
            draw: rect_command(style),
            children,
        }
    }

    /// A list marker hung in the gutter left of the item's first line.
    fn marker_element(&self, marker: &str, style: &ResolvedStyle, cx: f64, cy: f64) -> LayoutElement {
        let italic = style.is_italic();
        let mut glyphs = Vec::new();
        let mut offset = 0.0;
        for ch in marker.chars() {
            let w = self
                .fonts
                .char_width(ch, &style.font_family, style.font_weight, italic, style.font_size);
            glyphs.push(PositionedGlyph {
                x_offset: offset,
                width: w,
                char_value: ch,
                font_size: style.font_size,
                font_family: style.font_family.clone(),
                font_weight: style.font_weight,
                font_style: style.font_style,
                color: style.color,
                text_decoration: TextDecoration::None,
            });
            offset += w;
        }
        let (above, below) = self.strut(style);
        let x = cx - offset - MARKER_GAP;
        LayoutElement {
            x,
            y: cy,
            width: offset,
            height: above + below,
            draw: DrawCommand::Text {
                lines: vec![TextLine {
                    x,
                    y: cy,
                    width: offset,
                    height: above + below,
                    baseline: above,
                    glyphs,
                }],
            },
            children: Vec::new(),
        }
    }

    /// Space above and below the baseline for one line box of `style`.
    fn strut(&self, style: &ResolvedStyle) -> (f64, f64) {
        let line = style.line_box_height();
        let ascent = self
            .fonts
            .ascent_ratio(&style.font_family, style.font_weight, style.is_italic())
            * style.font_size;
        let above = (line - style.font_size) / 2.0 + ascent;
        (above, line - above)
    }

    /// Used size of an image: explicit width/height, else intrinsic size,
    /// else the placeholder size. Never wider than `available`.
    fn image_size(&self, el: &Element, style: &ResolvedStyle, available: f64) -> (f64, f64) {
        let intrinsic = el
            .get_attr("src")
            .and_then(|src| self.assets.dimensions(src))
            .filter(|(w, h)| *w > 0 && *h > 0)
            .map(|(w, h)| (w as f64, h as f64));
        let ratio = intrinsic
            .map(|(w, h)| h / w)
            .unwrap_or(PLACEHOLDER_SIZE.1 / PLACEHOLDER_SIZE.0);

        let width = style.width.resolve(available);
        let height = match style.height {
            Dimension::Px(h) => Some(h),
            _ => None,
        };
        let (mut w, mut h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * ratio),
            (None, Some(h)) => (h / ratio, h),
            (None, None) => intrinsic.unwrap_or(PLACEHOLDER_SIZE),
        };

        let mut cap = available.max(0.0);
        if let Some(max) = style.max_width.resolve(available) {
            cap = cap.min(max);
        }
        if w > cap && w > 0.0 {
            if height.is_none() || width.is_none() {
                h *= cap / w;
            }
            w = cap;
        }
        (w, h)
    }

    fn image_element(
        &self,
        el: &Element,
        style: &ResolvedStyle,
        x: f64,
        y: f64,
        available: f64,
    ) -> LayoutElement {
        let (width, height) = self.image_size(el, style, available);
        LayoutElement {
            x,
            y,
            width,
            height,
            draw: self.image_command(el, style),
            children: Vec::new(),
        }
    }

    fn image_command(&self, el: &Element, style: &ResolvedStyle) -> DrawCommand {
        match el.get_attr("src") {
            Some(src) if self.assets.image(src).is_some() => DrawCommand::Image {
                src: src.to_string(),
                fit: style.object_fit,
            },
            _ => DrawCommand::ImagePlaceholder,
        }
    }
}

fn rect_command(style: &ResolvedStyle) -> DrawCommand {
    let b = style.border_width;
    let has_border = b.top > 0.0 || b.right > 0.0 || b.bottom > 0.0 || b.left > 0.0;
    if style.background_color.is_none() && !has_border {
        return DrawCommand::None;
    }
    DrawCommand::Rect {
        background: style.background_color,
        border_width: b,
        border_color: style.border_color,
    }
}

/// Lowest edge of an element or any descendant.
fn max_bottom(el: &LayoutElement) -> f64 {
    el.children
        .iter()
        .map(max_bottom)
        .fold(el.y + el.height, f64::max)
}

/// [`Measure`] for page bodies of a given geometry.
pub struct BodyMeasure<'a> {
    engine: LayoutEngine<'a>,
    geometry: PageGeometry,
}

impl<'a> BodyMeasure<'a> {
    pub fn new(engine: LayoutEngine<'a>, geometry: PageGeometry) -> Self {
        Self { engine, geometry }
    }
}

impl Measure for BodyMeasure<'_> {
    fn measure(&self, body: &[ContentNode]) -> f64 {
        self.engine.measure(body, self.geometry.content_width_px())
    }

    fn body_height(&self) -> f64 {
        self.geometry.body_height_px()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_fragment;

    struct Fixture {
        fonts: FontContext,
        styles: Stylesheet,
        assets: AssetStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                fonts: FontContext::new(),
                styles: Stylesheet::new("Helvetica", 14.0, None),
                assets: AssetStore::with_defaults(None, 1000),
            }
        }

        fn engine(&self) -> LayoutEngine<'_> {
            LayoutEngine::new(&self.fonts, &self.styles, &self.assets)
        }
    }

    fn line_height() -> f64 {
        14.0 * 1.35
    }

    #[test]
    fn single_line_paragraph_height_includes_margins() {
        let fx = Fixture::new();
        let h = fx.engine().measure(&parse_fragment("<p>Hola</p>"), 600.0);
        // 14px margins top and bottom plus one line box
        assert!((h - (28.0 + line_height())).abs() < 1e-6, "got {h}");
    }

    #[test]
    fn sibling_margins_collapse_to_the_larger() {
        let fx = Fixture::new();
        let html = r#"<div style="margin-bottom: 20px">a</div><div style="margin-top: 5px">b</div>"#;
        let h = fx.engine().measure(&parse_fragment(html), 600.0);
        assert!((h - (2.0 * line_height() + 20.0)).abs() < 1e-6, "got {h}");
    }

    #[test]
    fn long_text_wraps_to_more_lines_when_narrower() {
        let fx = Fixture::new();
        let text = "<div>".to_string() + &"palabra ".repeat(60) + "</div>";
        let nodes = parse_fragment(&text);
        let wide = fx.engine().measure(&nodes, 680.0);
        let narrow = fx.engine().measure(&nodes, 200.0);
        assert!(narrow > wide * 2.0);
    }

    #[test]
    fn padding_and_border_add_to_height() {
        let fx = Fixture::new();
        let plain = fx.engine().measure(&parse_fragment("<div>x</div>"), 300.0);
        let boxed = fx.engine().measure(
            &parse_fragment(r#"<div style="padding: 10px; border: 2px solid #000">x</div>"#),
            300.0,
        );
        assert!((boxed - plain - 24.0).abs() < 1e-6);
    }

    #[test]
    fn display_none_is_skipped() {
        let fx = Fixture::new();
        let h = fx
            .engine()
            .measure(&parse_fragment(r#"<div style="display:none">oculto</div>"#), 300.0);
        assert_eq!(h, 0.0);
    }

    #[test]
    fn explicit_height_overrides_content() {
        let fx = Fixture::new();
        let h = fx
            .engine()
            .measure(&parse_fragment(r#"<div style="height: 50px"></div>"#), 300.0);
        assert!((h - 50.0).abs() < 1e-6);
    }

    #[test]
    fn overflowing_content_counts_toward_scroll_height() {
        let fx = Fixture::new();
        let html = r#"<div style="height: 10px"><div style="height: 80px"></div></div>"#;
        let h = fx.engine().measure(&parse_fragment(html), 300.0);
        assert!((h - 80.0).abs() < 1e-6, "got {h}");
    }

    #[test]
    fn unknown_image_uses_placeholder_size() {
        let fx = Fixture::new();
        let frag = fx.engine().layout(&parse_fragment(r#"<img src="missing.png">"#), 0.0, 0.0, 600.0);
        let img = frag
            .elements
            .iter()
            .flat_map(|e| std::iter::once(e).chain(e.children.iter()))
            .find(|e| matches!(e.draw, DrawCommand::ImagePlaceholder))
            .expect("placeholder element");
        assert_eq!((img.width, img.height), PLACEHOLDER_SIZE);
    }

    #[test]
    fn image_width_is_capped_at_container() {
        let fx = Fixture::new();
        let el = Element::new("img").attr("width", "900");
        let style = fx.styles.resolve(&el, fx.styles.root());
        let (w, h) = fx.engine().image_size(&el, &style, 600.0);
        assert_eq!(w, 600.0);
        assert!((h - 450.0).abs() < 1e-6);
    }

    #[test]
    fn ordered_list_markers_count_from_start() {
        let fx = Fixture::new();
        let frag = fx.engine().layout(
            &parse_fragment(r#"<ol start="4"><li>a</li><li>b</li></ol>"#),
            0.0,
            0.0,
            600.0,
        );
        let markers: Vec<String> = frag.elements[0]
            .children
            .iter()
            .filter_map(|li| li.children.first())
            .filter_map(|m| match &m.draw {
                DrawCommand::Text { lines } => {
                    Some(lines[0].glyphs.iter().map(|g| g.char_value).collect())
                }
                _ => None,
            })
            .collect();
        assert_eq!(markers, vec!["4.", "5."]);
    }

    #[test]
    fn body_measure_uses_geometry() {
        let fx = Fixture::new();
        let measure = BodyMeasure::new(fx.engine(), PageGeometry::default());
        assert!((measure.body_height() - 874.58).abs() < 0.01);
        assert!(measure.measure(&[]) == 0.0);
    }
}
