//! # Font Management
//!
//! Font lookup and text measurement for layout and rasterization.
//!
//! The standard Helvetica, Times and Courier families are always present
//! with their AFM metrics. [`FontContext::new`] backs each of them with an
//! installed outline face where the host has one (see [`system`]); only a
//! slot with no such face keeps AFM metrics and is greeked by the
//! rasterizer. Custom TrueType/OpenType fonts come from the export
//! configuration and are parsed with ttf-parser for both metrics and glyph
//! outlines.
//!
//! [`FontContext::load`] is the font readiness barrier: it returns only
//! after every configured font has loaded or failed, so measurement never
//! runs against a half-populated registry.

pub mod metrics;
pub mod system;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LaminaError;
use crate::image_loader::read_local_source;
pub use metrics::StandardFontMetrics;

/// A font the configuration asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontEntry {
    pub family: String,
    /// Base64, a `data:` URI, or a file path relative to the asset dir.
    pub src: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub italic: bool,
}

fn default_weight() -> u32 {
    400
}

/// A font registry that maps font family + weight + style to font data.
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontData>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. Metrics only.
    Standard(StandardFont),
    /// A TrueType/OpenType font with outlines.
    /// Shared, so a context can be rebuilt without re-reading the face.
    Custom {
        data: Arc<[u8]>,
        metrics: Arc<CustomFontMetrics>,
    },
}

impl FontData {
    pub fn has_outlines(&self) -> bool {
        matches!(self, FontData::Custom { .. })
    }
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    /// Maps characters to their glyph IDs in the original font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Advance width of a character in the unit of `font_size`.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    pub fn ascent_ratio(&self) -> f64 {
        self.ascender as f64 / self.units_per_em as f64
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        // The Basic Multilingual Plane covers every script a report uses.
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender,
            descender,
            glyph_ids,
        })
    }
}

/// The standard PDF fonts with built-in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PostScript name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Obliques share the upright widths.
    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            Self::Helvetica | Self::HelveticaOblique => &metrics::HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => &metrics::HELVETICA_BOLD,
            Self::TimesRoman | Self::TimesItalic => &metrics::TIMES_ROMAN,
            Self::TimesBold | Self::TimesBoldItalic => &metrics::TIMES_BOLD,
            Self::Courier | Self::CourierBold | Self::CourierOblique | Self::CourierBoldOblique => {
                &metrics::COURIER
            }
        }
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();

        let standard_mappings = [
            (("Helvetica", 400, false), StandardFont::Helvetica),
            (("Helvetica", 700, false), StandardFont::HelveticaBold),
            (("Helvetica", 400, true), StandardFont::HelveticaOblique),
            (("Helvetica", 700, true), StandardFont::HelveticaBoldOblique),
            (("Times", 400, false), StandardFont::TimesRoman),
            (("Times", 700, false), StandardFont::TimesBold),
            (("Times", 400, true), StandardFont::TimesItalic),
            (("Times", 700, true), StandardFont::TimesBoldItalic),
            (("Courier", 400, false), StandardFont::Courier),
            (("Courier", 700, false), StandardFont::CourierBold),
            (("Courier", 400, true), StandardFont::CourierOblique),
            (("Courier", 700, true), StandardFont::CourierBoldOblique),
        ];

        for ((family, weight, italic), font) in standard_mappings {
            fonts.insert(
                FontKey {
                    family: family.to_string(),
                    weight,
                    italic,
                },
                FontData::Standard(font),
            );
        }

        Self { fonts }
    }

    /// Look up a font: exact key, then snapped weight, then Helvetica.
    pub fn resolve(&self, family: &str, weight: u32, italic: bool) -> &FontData {
        let key = FontKey {
            family: family.to_string(),
            weight,
            italic,
        };
        if let Some(font) = self.fonts.get(&key) {
            return font;
        }

        let snapped_weight = if weight >= 600 { 700 } else { 400 };
        let key = FontKey {
            family: family.to_string(),
            weight: snapped_weight,
            italic,
        };
        if let Some(font) = self.fonts.get(&key) {
            return font;
        }

        let key = FontKey {
            family: "Helvetica".to_string(),
            weight: snapped_weight,
            italic,
        };
        match self.fonts.get(&key) {
            Some(font) => font,
            None => &HELVETICA_FALLBACK,
        }
    }

    /// Register a custom font. Data ttf-parser cannot read is rejected.
    pub fn register(
        &mut self,
        family: &str,
        weight: u32,
        italic: bool,
        data: Vec<u8>,
    ) -> Result<(), LaminaError> {
        let metrics = CustomFontMetrics::from_font_data(&data)
            .ok_or_else(|| LaminaError::Font(format!("'{family}' is not a TrueType/OpenType font")))?;
        self.fonts.insert(
            FontKey {
                family: family.to_string(),
                weight,
                italic,
            },
            FontData::Custom {
                data: Arc::from(data),
                metrics: Arc::new(metrics),
            },
        );
        Ok(())
    }

    pub(crate) fn insert(&mut self, key: FontKey, font: FontData) {
        self.fonts.insert(key, font);
    }

    /// Iterate over all registered fonts.
    pub fn iter(&self) -> impl Iterator<Item = (&FontKey, &FontData)> {
        self.fonts.iter()
    }
}

static HELVETICA_FALLBACK: FontData = FontData::Standard(StandardFont::Helvetica);

/// Shared font context used by layout and rasterization.
/// Provides text measurement with real glyph metrics.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    /// Standard fonts, each backed by a system outline face when the host
    /// has one.
    pub fn new() -> Self {
        let mut registry = FontRegistry::new();
        for (key, font) in system::substitutes() {
            registry.insert(key.clone(), font.clone());
        }
        Self { registry }
    }

    /// Standard fonts with AFM metrics only.
    pub fn standard() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Load every configured font. Each entry either registers or logs a
    /// warning; a broken font never aborts the load.
    pub fn load(entries: &[FontEntry], base_dir: Option<&Path>) -> Self {
        let mut ctx = Self::new();
        for entry in entries {
            let result = read_local_source(&entry.src, base_dir).and_then(|bytes| {
                ctx.registry
                    .register(&entry.family, entry.weight, entry.italic, bytes)
            });
            match result {
                Ok(()) => log::debug!(
                    "Loaded font '{}' weight {} italic {}",
                    entry.family,
                    entry.weight,
                    entry.italic
                ),
                Err(e) => log::warn!("Font '{}' unavailable, using fallback: {}", entry.family, e),
            }
        }
        ctx
    }

    /// Get the advance width of a single character.
    pub fn char_width(
        &self,
        ch: char,
        family: &str,
        weight: u32,
        italic: bool,
        font_size: f64,
    ) -> f64 {
        match self.registry.resolve(family, weight, italic) {
            FontData::Standard(std_font) => std_font.metrics().char_width(ch, font_size),
            FontData::Custom { metrics, .. } => metrics.char_width(ch, font_size),
        }
    }

    /// Measure the width of a string.
    pub fn measure_string(
        &self,
        text: &str,
        family: &str,
        weight: u32,
        italic: bool,
        font_size: f64,
    ) -> f64 {
        match self.registry.resolve(family, weight, italic) {
            FontData::Standard(std_font) => std_font.metrics().measure_string(text, font_size, 0.0),
            FontData::Custom { metrics, .. } => {
                text.chars().map(|ch| metrics.char_width(ch, font_size)).sum()
            }
        }
    }

    /// Ascender as a fraction of the em, for baseline placement.
    pub fn ascent_ratio(&self, family: &str, weight: u32, italic: bool) -> f64 {
        match self.registry.resolve(family, weight, italic) {
            FontData::Standard(std_font) => std_font.metrics().ascent_ratio(),
            FontData::Custom { metrics, .. } => metrics.ascent_ratio(),
        }
    }

    /// Resolve a font key to its font data.
    pub fn resolve(&self, family: &str, weight: u32, italic: bool) -> &FontData {
        self.registry.resolve(family, weight, italic)
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FontRegistry {
        &mut self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_context_helvetica() {
        let ctx = FontContext::standard();
        let w = ctx.char_width(' ', "Helvetica", 400, false, 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_font_context_bold_wider() {
        let ctx = FontContext::standard();
        let regular = ctx.char_width('A', "Helvetica", 400, false, 12.0);
        let bold = ctx.char_width('A', "Helvetica", 700, false, 12.0);
        assert!(bold > regular, "Bold A should be wider than regular A");
    }

    #[test]
    fn test_font_context_fallback() {
        let ctx = FontContext::new();
        let w1 = ctx.char_width('A', "Helvetica", 400, false, 12.0);
        let w2 = ctx.char_width('A', "UnknownFont", 400, false, 12.0);
        assert!((w1 - w2).abs() < 0.001);
    }

    #[test]
    fn test_font_context_weight_resolution() {
        let ctx = FontContext::new();
        let w700 = ctx.char_width('A', "Helvetica", 700, false, 12.0);
        let w800 = ctx.char_width('A', "Helvetica", 800, false, 12.0);
        assert!((w700 - w800).abs() < 0.001);
    }

    #[test]
    fn test_times_is_narrower_than_helvetica() {
        let ctx = FontContext::standard();
        let helv = ctx.measure_string("examen", "Helvetica", 400, false, 12.0);
        let times = ctx.measure_string("examen", "Times", 400, false, 12.0);
        assert!(times < helv);
    }

    #[test]
    fn test_load_skips_broken_fonts() {
        let entries = vec![FontEntry {
            family: "Broken".to_string(),
            src: "bm90IGEgZm9udA==".to_string(),
            weight: 400,
            italic: false,
        }];
        let ctx = FontContext::load(&entries, None);
        let broken = ctx.measure_string("biopsia", "Broken", 400, false, 12.0);
        let helv = ctx.measure_string("biopsia", "Helvetica", 400, false, 12.0);
        assert!((broken - helv).abs() < 0.001);
    }

    #[test]
    fn test_afm_only_fonts_have_no_outlines() {
        let ctx = FontContext::standard();
        assert!(matches!(
            ctx.resolve("Times", 700, true),
            FontData::Standard(StandardFont::TimesBoldItalic)
        ));
        assert!(!ctx.resolve("Times", 700, true).has_outlines());
    }

    #[test]
    fn test_default_context_outlines_standard_families() {
        let ctx = FontContext::new();
        // Every slot the host can back is drawn from outlines.
        for (key, _) in system::substitutes() {
            assert!(ctx.resolve(&key.family, key.weight, key.italic).has_outlines());
        }
    }
}
