//! # Style System
//!
//! A browser-like subset of CSS for report content: the box model,
//! typography, colour, borders, and two container modes (lists and grids).
//!
//! Styles resolve in three layers, the same way a browser would:
//! 1. user-agent defaults per tag (`p` gets `1em` margins, `h1` is bold…)
//! 2. the report stylesheet, matched by tag and class
//! 3. legacy presentational attributes and the inline `style` attribute
//!
//! Selectors are single compound selectors (`td`, `.image-card`,
//! `p.field`) in comma lists. That is all the normalizer and the letterhead
//! need, and editor HTML carries its styling inline anyway.

pub mod css;

use serde::{Deserialize, Serialize};

use crate::dom::Element;
pub use css::{parse_color, parse_declarations, parse_length, Declaration};

/// CSS pixels per typographic point.
pub const PX_PER_PT: f64 = 96.0 / 72.0;
/// CSS pixels per millimetre.
pub const PX_PER_MM: f64 = 96.0 / 25.4;

/// The stylesheet applied to every report, before inline styles.
pub const REPORT_CSS: &str = r#"
.field { margin: 2px 0; }
.field-label { font-weight: bold; }
.identification { margin: 0 0 4px 0; }
.divider { margin: 8px 0; border-top: 1px solid #555555; }
.section-title { font-size: 1.05em; font-weight: bold; text-transform: uppercase; margin: 14px 0 4px 0; }
.section-body { margin: 0 0 6px 0; text-align: justify; }
.placeholder { color: #777777; font-style: italic; }
.image-grid { display: grid; grid-template-columns: repeat(2, 1fr); gap: 8px; margin: 10px 0; }
.image-card { margin: 0; padding: 4px; border: 1px solid #cccccc; }
.image-thumb { width: 100%; object-fit: contain; }
.image-caption { font-size: 0.85em; text-align: center; margin: 4px 0 0 0; }
table { width: 100%; margin: 6px 0; }
td, th { padding: 4px; border: 1px solid #999999; }
.letterhead { font-size: 0.8em; line-height: 1.3; }
"#;

/// Resolved box display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Display {
    #[default]
    Block,
    Inline,
    ListItem,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    Grid,
    /// Atomic inline replaced element (`img`).
    Image,
    LineBreak,
    None,
}

impl Display {
    /// Participates in an inline formatting context.
    pub fn is_inline_level(&self) -> bool {
        matches!(self, Display::Inline | Display::Image | Display::LineBreak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectFit {
    #[default]
    Fill,
    Contain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListStyle {
    #[default]
    Disc,
    Decimal,
    None,
}

/// An RGBA color with components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Components as 8-bit RGBA.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b), c(self.a)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Edge values (top, right, bottom, left) used for margin, padding, border.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// A length that can be pixels, a percentage of the container, or auto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    Px(f64),
    Percent(f64),
    Auto,
}

impl Dimension {
    pub fn resolve(&self, parent_size: f64) -> Option<f64> {
        match self {
            Dimension::Px(v) => Some(*v),
            Dimension::Percent(p) => Some(parent_size * p / 100.0),
            Dimension::Auto => None,
        }
    }
}

/// Fully resolved style for one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStyle {
    pub display: Display,
    // Inherited
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u32,
    pub font_style: FontStyle,
    /// Line height as a multiplier of font size.
    pub line_height: f64,
    pub color: Color,
    pub text_align: TextAlign,
    pub text_decoration: TextDecoration,
    pub text_transform: TextTransform,
    pub list_style: ListStyle,
    // Not inherited
    pub background_color: Option<Color>,
    pub margin: Edges,
    pub padding: Edges,
    pub border_width: Edges,
    pub border_color: Color,
    pub width: Dimension,
    pub height: Dimension,
    pub max_width: Dimension,
    pub grid_columns: usize,
    pub gap: f64,
    pub object_fit: ObjectFit,
}

impl ResolvedStyle {
    /// The root style every page region starts from.
    pub fn root(font_family: &str, font_size: f64) -> Self {
        Self {
            display: Display::Block,
            font_family: font_family.to_string(),
            font_size,
            font_weight: 400,
            font_style: FontStyle::Normal,
            line_height: 1.35,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            text_decoration: TextDecoration::None,
            text_transform: TextTransform::None,
            list_style: ListStyle::Disc,
            background_color: None,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: Edges::default(),
            border_color: Color::BLACK,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            grid_columns: 1,
            gap: 0.0,
            object_fit: ObjectFit::Fill,
        }
    }

    /// A child style that inherits the inheritable properties.
    pub fn inherit(&self) -> Self {
        Self {
            display: Display::Inline,
            background_color: None,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: Edges::default(),
            border_color: self.color,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            grid_columns: 1,
            gap: 0.0,
            object_fit: ObjectFit::Fill,
            ..self.clone()
        }
    }

    pub fn is_italic(&self) -> bool {
        matches!(self.font_style, FontStyle::Italic)
    }

    /// Line box height for text in this style.
    pub fn line_box_height(&self) -> f64 {
        self.font_size * self.line_height
    }

    /// Padding plus border on the horizontal axis.
    pub fn horizontal_chrome(&self) -> f64 {
        self.padding.horizontal() + self.border_width.horizontal()
    }

    /// Padding plus border on the vertical axis.
    pub fn vertical_chrome(&self) -> f64 {
        self.padding.vertical() + self.border_width.vertical()
    }
}

/// One stylesheet rule: a compound selector and its declarations.
#[derive(Debug, Clone)]
struct Rule {
    tag: Option<String>,
    classes: Vec<String>,
    declarations: Vec<Declaration>,
    order: usize,
}

impl Rule {
    fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != el.tag {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
    }

    fn specificity(&self) -> (usize, usize, usize) {
        (self.classes.len(), usize::from(self.tag.is_some()), self.order)
    }
}

/// A parsed stylesheet plus the root style it cascades from.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    rules: Vec<Rule>,
    root: ResolvedStyle,
}

impl Stylesheet {
    /// The report stylesheet with an optional extra CSS layer on top.
    pub fn new(font_family: &str, font_size: f64, extra_css: Option<&str>) -> Self {
        let mut sheet = Self {
            rules: Vec::new(),
            root: ResolvedStyle::root(font_family, font_size),
        };
        sheet.add_css(REPORT_CSS);
        if let Some(css) = extra_css {
            sheet.add_css(css);
        }
        sheet
    }

    pub fn root(&self) -> &ResolvedStyle {
        &self.root
    }

    /// Append the rules of a CSS string. Unparseable rules are skipped.
    pub fn add_css(&mut self, source: &str) {
        for block in source.split('}') {
            let Some((selectors, body)) = block.split_once('{') else {
                continue;
            };
            let declarations = parse_declarations(body);
            for selector in selectors.split(',') {
                let selector = selector.trim();
                if selector.is_empty() || selector.contains(char::is_whitespace) {
                    continue;
                }
                let mut parts = selector.split('.');
                let tag = parts
                    .next()
                    .filter(|t| !t.is_empty())
                    .map(|t| t.to_ascii_lowercase());
                let classes: Vec<String> = parts.map(|c| c.to_string()).collect();
                let order = self.rules.len();
                self.rules.push(Rule {
                    tag,
                    classes,
                    declarations: declarations.clone(),
                    order,
                });
            }
        }
        self.rules.sort_by_key(|r| r.specificity());
    }

    /// Resolve the style of `el` given its parent's resolved style.
    pub fn resolve(&self, el: &Element, parent: &ResolvedStyle) -> ResolvedStyle {
        let mut style = parent.inherit();
        apply_user_agent_defaults(el, parent, &mut style);

        for rule in self.rules.iter().filter(|r| r.matches(el)) {
            for decl in &rule.declarations {
                css::apply_declaration(&mut style, decl, parent.font_size);
            }
        }

        apply_presentational_attributes(el, parent, &mut style);

        if let Some(inline) = el.get_attr("style") {
            for decl in parse_declarations(inline) {
                css::apply_declaration(&mut style, &decl, parent.font_size);
            }
        }
        style
    }
}

/// Browser default rendering for each tag.
fn apply_user_agent_defaults(el: &Element, parent: &ResolvedStyle, style: &mut ResolvedStyle) {
    let em = parent.font_size;
    let heading = |style: &mut ResolvedStyle, scale: f64, margin_em: f64| {
        style.display = Display::Block;
        style.font_size = em * scale;
        style.font_weight = 700;
        let m = style.font_size * margin_em;
        style.margin = Edges::symmetric(m, 0.0);
    };

    match el.tag.as_str() {
        "html" | "body" | "div" | "section" | "article" | "header" | "footer" | "main" | "nav"
        | "aside" | "figcaption" | "address" | "form" | "dt" | "caption" => {
            style.display = Display::Block;
        }
        "center" => {
            style.display = Display::Block;
            style.text_align = TextAlign::Center;
        }
        "p" | "pre" | "dl" => {
            style.display = Display::Block;
            style.margin = Edges::symmetric(em, 0.0);
        }
        "blockquote" | "figure" => {
            style.display = Display::Block;
            style.margin = Edges::symmetric(em, 40.0);
        }
        "dd" => {
            style.display = Display::Block;
            style.margin.left = 40.0;
        }
        "h1" => heading(style, 2.0, 0.67),
        "h2" => heading(style, 1.5, 0.83),
        "h3" => heading(style, 1.17, 1.0),
        "h4" => heading(style, 1.0, 1.33),
        "h5" => heading(style, 0.83, 1.67),
        "h6" => heading(style, 0.67, 2.33),
        "ul" | "ol" => {
            style.display = Display::Block;
            style.margin = Edges::symmetric(em, 0.0);
            style.padding.left = 40.0;
            style.list_style = if el.tag == "ol" {
                ListStyle::Decimal
            } else {
                ListStyle::Disc
            };
        }
        "li" => style.display = Display::ListItem,
        "hr" => {
            style.display = Display::Block;
            style.margin = Edges::symmetric(em * 0.5, 0.0);
            style.border_width.top = 1.0;
            style.border_color = Color::from_rgb8(0x80, 0x80, 0x80);
        }
        "table" => style.display = Display::Table,
        "thead" | "tbody" | "tfoot" => style.display = Display::TableRowGroup,
        "tr" => style.display = Display::TableRow,
        "td" => {
            style.display = Display::TableCell;
            style.padding = Edges::uniform(1.0);
        }
        "th" => {
            style.display = Display::TableCell;
            style.padding = Edges::uniform(1.0);
            style.font_weight = 700;
            style.text_align = TextAlign::Center;
        }
        "b" | "strong" => style.font_weight = 700,
        "i" | "em" | "cite" | "var" | "dfn" => style.font_style = FontStyle::Italic,
        "u" | "ins" => style.text_decoration = TextDecoration::Underline,
        "s" | "strike" | "del" => style.text_decoration = TextDecoration::LineThrough,
        "small" | "sub" | "sup" => style.font_size = em * 0.83,
        "big" => style.font_size = em * 1.2,
        "mark" => style.background_color = Some(Color::rgb(1.0, 1.0, 0.0)),
        "a" => {
            style.color = Color::from_rgb8(0x06, 0x45, 0xad);
            style.text_decoration = TextDecoration::Underline;
        }
        "img" => style.display = Display::Image,
        "br" => style.display = Display::LineBreak,
        "script" | "style" | "head" | "title" | "template" | "meta" | "link" => {
            style.display = Display::None;
        }
        _ => style.display = Display::Inline,
    }
}

/// Legacy attributes editors still emit: `align`, `width`, `height`,
/// `border`, and `<font size color face>`.
fn apply_presentational_attributes(el: &Element, parent: &ResolvedStyle, style: &mut ResolvedStyle) {
    if let Some(align) = el.get_attr("align") {
        if let Some(a) = css::parse_text_align(align) {
            style.text_align = a;
        }
    }
    if matches!(el.tag.as_str(), "img" | "table" | "td" | "th") {
        if let Some(w) = el.get_attr("width").and_then(parse_attr_length) {
            style.width = w;
        }
        if let Some(h) = el.get_attr("height").and_then(parse_attr_length) {
            style.height = h;
        }
    }
    if el.tag == "table" {
        if let Some(b) = el.get_attr("border").and_then(|b| b.trim().parse::<f64>().ok()) {
            style.border_width = Edges::uniform(b);
        }
    }
    if el.tag == "ol" {
        if let Some(kind) = el.get_attr("type") {
            if kind == "1" {
                style.list_style = ListStyle::Decimal;
            }
        }
    }
    if el.tag == "font" {
        if let Some(color) = el.get_attr("color").and_then(|c| parse_color(c).flatten()) {
            style.color = color;
        }
        if let Some(size) = el.get_attr("size").and_then(|s| s.trim().parse::<i32>().ok()) {
            let px = match size.clamp(1, 7) {
                1 => 10.0,
                2 => 13.0,
                3 => 16.0,
                4 => 18.0,
                5 => 24.0,
                6 => 32.0,
                _ => 48.0,
            };
            style.font_size = px * parent.font_size / 16.0;
        }
        if let Some(face) = el.get_attr("face") {
            style.font_family = css::first_family(face);
        }
    }
}

/// HTML attribute lengths: bare numbers are pixels, `%` is allowed.
fn parse_attr_length(value: &str) -> Option<Dimension> {
    let value = value.trim();
    if let Ok(px) = value.parse::<f64>() {
        return Some(Dimension::Px(px));
    }
    parse_length(value, 16.0)
}
