//! CSS declaration parsing for the supported property subset.
//!
//! Unknown properties and unparseable values are ignored, the way a browser
//! drops an invalid declaration and keeps the rest of the rule.

use super::{
    Color, Dimension, Display, Edges, FontStyle, ListStyle, ObjectFit, ResolvedStyle, TextAlign,
    TextDecoration, TextTransform, PX_PER_MM, PX_PER_PT,
};

/// One `property: value` pair, property lowercased.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

/// Split a declaration block (`color: red; margin: 0`) into declarations.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    block
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let property = prop.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration {
                property,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Parse a CSS length. `em` is relative to `em_base`.
pub fn parse_length(value: &str, em_base: f64) -> Option<Dimension> {
    let value = value.trim().to_ascii_lowercase();
    if value == "auto" {
        return Some(Dimension::Auto);
    }
    if value == "0" {
        return Some(Dimension::Px(0.0));
    }
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let n: f64 = number.parse().ok()?;
    let px = match unit {
        "px" => n,
        "pt" => n * PX_PER_PT,
        "em" | "rem" => n * em_base,
        "mm" => n * PX_PER_MM,
        "cm" => n * PX_PER_MM * 10.0,
        "in" => n * 96.0,
        "%" => return Some(Dimension::Percent(n)),
        _ => return None,
    };
    Some(Dimension::Px(px))
}

fn parse_px(value: &str, em_base: f64) -> Option<f64> {
    match parse_length(value, em_base)? {
        Dimension::Px(v) => Some(v),
        _ => None,
    }
}

/// Parse a CSS color. `Some(None)` means `transparent`.
pub fn parse_color(value: &str) -> Option<Option<Color>> {
    let value = value.trim().to_ascii_lowercase();
    if value == "transparent" {
        return Some(None);
    }
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).map(Some);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|v| v.strip_suffix(')'))
    {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }
        let channel = |s: &str| -> Option<f64> {
            match s.strip_suffix('%') {
                Some(p) => p.parse::<f64>().ok().map(|v| v / 100.0),
                None => s.parse::<f64>().ok().map(|v| v / 255.0),
            }
        };
        let mut c = Color::rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
        if let Some(alpha) = parts.get(3) {
            c.a = alpha.parse().ok()?;
        }
        return Some(Some(c));
    }
    let named = match value.as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "maroon" => (128, 0, 0),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        "olive" => (128, 128, 0),
        "purple" => (128, 0, 128),
        "orange" => (255, 165, 0),
        "yellow" => (255, 255, 0),
        _ => return None,
    };
    Some(Some(Color::from_rgb8(named.0, named.1, named.2)))
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color::from_rgb8(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
        6 => Some(Color::from_rgb8(pair(0)?, pair(2)?, pair(4)?)),
        _ => None,
    }
}

pub fn parse_text_align(value: &str) -> Option<TextAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some(TextAlign::Left),
        "right" | "end" => Some(TextAlign::Right),
        "center" => Some(TextAlign::Center),
        "justify" => Some(TextAlign::Justify),
        _ => None,
    }
}

/// First family in a `font-family` list, generic names mapped to the
/// standard PDF families.
pub fn first_family(value: &str) -> String {
    let first = value
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    match first.to_ascii_lowercase().as_str() {
        "sans-serif" | "arial" | "system-ui" => "Helvetica".to_string(),
        "serif" | "times new roman" => "Times".to_string(),
        "monospace" => "Courier".to_string(),
        _ => first.to_string(),
    }
}

/// Expand a 1-4 value shorthand into edges.
fn parse_edges(value: &str, em_base: f64) -> Option<Edges> {
    let values: Vec<f64> = value
        .split_whitespace()
        .map(|v| match parse_length(v, em_base) {
            Some(Dimension::Px(px)) => Some(px),
            // auto margins collapse to zero in block flow
            Some(Dimension::Auto) => Some(0.0),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    match values.as_slice() {
        [all] => Some(Edges::uniform(*all)),
        [v, h] => Some(Edges::symmetric(*v, *h)),
        [t, h, b] => Some(Edges {
            top: *t,
            right: *h,
            bottom: *b,
            left: *h,
        }),
        [t, r, b, l] => Some(Edges {
            top: *t,
            right: *r,
            bottom: *b,
            left: *l,
        }),
        _ => None,
    }
}

/// `1px solid #ccc` → (width, color). Missing parts keep the defaults.
fn parse_border(value: &str, em_base: f64, current: Color) -> (f64, Color) {
    let mut width = 1.0;
    let mut color = current;
    for token in value.split_whitespace() {
        if token == "none" || token == "hidden" {
            return (0.0, color);
        }
        if let Some(px) = parse_px(token, em_base) {
            width = px;
        } else if let Some(Some(c)) = parse_color(token) {
            color = c;
        } else if token == "thin" {
            width = 1.0;
        } else if token == "medium" {
            width = 3.0;
        } else if token == "thick" {
            width = 5.0;
        }
    }
    (width, color)
}

fn parse_grid_columns(value: &str) -> Option<usize> {
    let value = value.trim();
    if let Some(args) = value.strip_prefix("repeat(").and_then(|v| v.strip_suffix(')')) {
        let (count, _) = args.split_once(',')?;
        return count.trim().parse().ok().filter(|n| *n > 0);
    }
    let n = value.split_whitespace().count();
    (n > 0).then_some(n)
}

/// Apply one declaration to `style`. `parent_font_size` resolves `em` in
/// `font-size`; every other length uses the element's own font size.
pub fn apply_declaration(style: &mut ResolvedStyle, decl: &Declaration, parent_font_size: f64) {
    let value = decl.value.as_str();
    let lower = value.to_ascii_lowercase();
    let em = style.font_size;
    match decl.property.as_str() {
        "display" => {
            style.display = match lower.as_str() {
                "none" => Display::None,
                "block" | "inline-block" | "flex" => Display::Block,
                "inline" => Display::Inline,
                "grid" => Display::Grid,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                _ => style.display,
            }
        }
        "font-family" => style.font_family = first_family(value),
        "font-size" => {
            let size = match lower.as_str() {
                "x-small" => Some(10.0),
                "small" => Some(13.0),
                "medium" => Some(16.0),
                "large" => Some(18.0),
                "x-large" => Some(24.0),
                "xx-large" => Some(32.0),
                "smaller" => Some(parent_font_size * 0.83),
                "larger" => Some(parent_font_size * 1.2),
                _ => parse_length(value, parent_font_size)
                    .and_then(|d| d.resolve(parent_font_size)),
            };
            if let Some(size) = size.filter(|s| *s > 0.0) {
                style.font_size = size;
            }
        }
        "font-weight" => {
            style.font_weight = match lower.as_str() {
                "bold" | "bolder" => 700,
                "normal" => 400,
                "lighter" => 300,
                other => other.parse().unwrap_or(style.font_weight),
            }
        }
        "font-style" => {
            style.font_style = match lower.as_str() {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "font" => {
            // Only the weight and style keywords of the shorthand.
            for token in lower.split_whitespace() {
                match token {
                    "bold" => style.font_weight = 700,
                    "italic" => style.font_style = FontStyle::Italic,
                    _ => {}
                }
            }
        }
        "line-height" => {
            if lower == "normal" {
                style.line_height = 1.2;
            } else if let Ok(n) = lower.parse::<f64>() {
                style.line_height = n;
            } else {
                match parse_length(value, em) {
                    Some(Dimension::Px(px)) if em > 0.0 => style.line_height = px / em,
                    Some(Dimension::Percent(p)) => style.line_height = p / 100.0,
                    _ => {}
                }
            }
        }
        "color" => {
            if let Some(Some(c)) = parse_color(value) {
                style.color = c;
            }
        }
        "background" | "background-color" => {
            if let Some(c) = value.split_whitespace().find_map(parse_color) {
                style.background_color = c;
            }
        }
        "text-align" => {
            if let Some(a) = parse_text_align(value) {
                style.text_align = a;
            }
        }
        "text-decoration" | "text-decoration-line" => {
            style.text_decoration = if lower.contains("underline") {
                TextDecoration::Underline
            } else if lower.contains("line-through") {
                TextDecoration::LineThrough
            } else {
                TextDecoration::None
            }
        }
        "text-transform" => {
            style.text_transform = match lower.as_str() {
                "uppercase" => TextTransform::Uppercase,
                "lowercase" => TextTransform::Lowercase,
                "capitalize" => TextTransform::Capitalize,
                _ => TextTransform::None,
            }
        }
        "list-style" | "list-style-type" => {
            style.list_style = if lower.contains("none") {
                ListStyle::None
            } else if lower.contains("decimal") {
                ListStyle::Decimal
            } else {
                ListStyle::Disc
            }
        }
        "margin" => {
            if let Some(e) = parse_edges(value, em) {
                style.margin = e;
            }
        }
        "padding" => {
            if let Some(e) = parse_edges(value, em) {
                style.padding = e;
            }
        }
        "margin-top" | "margin-right" | "margin-bottom" | "margin-left" | "padding-top"
        | "padding-right" | "padding-bottom" | "padding-left" => {
            let px = match parse_length(value, em) {
                Some(Dimension::Px(px)) => px,
                Some(Dimension::Auto) => 0.0,
                _ => return,
            };
            let (edges, side) = match decl.property.split_once('-') {
                Some(("margin", side)) => (&mut style.margin, side),
                Some((_, side)) => (&mut style.padding, side),
                None => return,
            };
            set_side(edges, side, px);
        }
        "border" => {
            let (w, c) = parse_border(value, em, style.border_color);
            style.border_width = Edges::uniform(w);
            style.border_color = c;
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let (w, c) = parse_border(value, em, style.border_color);
            if let Some(side) = decl.property.strip_prefix("border-") {
                set_side(&mut style.border_width, side, w);
            }
            style.border_color = c;
        }
        "border-width" => {
            if let Some(e) = parse_edges(value, em) {
                style.border_width = e;
            }
        }
        "border-color" => {
            if let Some(Some(c)) = parse_color(value) {
                style.border_color = c;
            }
        }
        "border-style" => {
            if lower == "none" || lower == "hidden" {
                style.border_width = Edges::default();
            }
        }
        "width" => {
            if let Some(d) = parse_length(value, em) {
                style.width = d;
            }
        }
        "height" => {
            if let Some(d) = parse_length(value, em) {
                style.height = d;
            }
        }
        "max-width" => {
            if lower == "none" {
                style.max_width = Dimension::Auto;
            } else if let Some(d) = parse_length(value, em) {
                style.max_width = d;
            }
        }
        "grid-template-columns" => {
            if let Some(n) = parse_grid_columns(value) {
                style.grid_columns = n;
            }
        }
        "gap" | "grid-gap" | "column-gap" => {
            if let Some(px) = value.split_whitespace().next().and_then(|v| parse_px(v, em)) {
                style.gap = px;
            }
        }
        "object-fit" => {
            style.object_fit = match lower.as_str() {
                "contain" | "scale-down" => ObjectFit::Contain,
                _ => ObjectFit::Fill,
            }
        }
        _ => {}
    }
}

fn set_side(edges: &mut Edges, side: &str, value: f64) {
    match side {
        "top" => edges.top = value,
        "right" => edges.right = value,
        "bottom" => edges.bottom = value,
        "left" => edges.left = value,
        _ => {}
    }
}
