//! Inline formatting: styled text runs, line breaks and atomic images
//! flowed into line boxes.
//!
//! White space collapses the way `white-space: normal` does: any run of
//! spaces, tabs and newlines becomes one space, and spaces at the start of a
//! line or after a `<br>` disappear. Non-breaking spaces are kept.

use super::{DrawCommand, LayoutElement, LayoutEngine, PositionedGlyph, TextLine};
use crate::dom::ContentNode;
use crate::style::{Display, ObjectFit, ResolvedStyle, TextAlign, TextTransform};
use crate::text::StyledChar;

/// Stands in for an atomic inline (an image) during line breaking.
const OBJECT_REPLACEMENT: char = '\u{FFFC}';

struct InlineImage {
    src: Option<String>,
    width: f64,
    height: f64,
    fit: ObjectFit,
    loaded: bool,
}

struct InlineRun {
    style: ResolvedStyle,
    image: Option<InlineImage>,
}

#[derive(Default)]
struct InlineCollector {
    runs: Vec<InlineRun>,
    chars: Vec<StyledChar>,
    /// The previous collected char was collapsible white space, or the
    /// line has not started.
    prev_space: bool,
}

impl InlineCollector {
    fn push_run(&mut self, style: &ResolvedStyle, image: Option<InlineImage>) -> usize {
        self.runs.push(InlineRun {
            style: style.clone(),
            image,
        });
        self.runs.len() - 1
    }
}

fn is_collapsible(ch: char) -> bool {
    ch.is_whitespace() && ch != '\u{00A0}' && ch != '\u{202F}'
}

fn transform_char(ch: char, transform: TextTransform, word_start: bool) -> char {
    match transform {
        TextTransform::None => ch,
        TextTransform::Uppercase => ch.to_uppercase().next().unwrap_or(ch),
        TextTransform::Lowercase => ch.to_lowercase().next().unwrap_or(ch),
        TextTransform::Capitalize if word_start => ch.to_uppercase().next().unwrap_or(ch),
        TextTransform::Capitalize => ch,
    }
}

impl LayoutEngine<'_> {
    /// Lay out an inline run as an anonymous block. Returns its height, or
    /// zero when the run is only collapsible white space.
    pub(super) fn layout_inline(
        &self,
        nodes: &[&ContentNode],
        parent: &ResolvedStyle,
        x: f64,
        y: f64,
        width: f64,
        out: &mut Vec<LayoutElement>,
    ) -> f64 {
        let mut collector = InlineCollector {
            prev_space: true,
            ..Default::default()
        };
        for node in nodes {
            self.collect_inline(node, parent, width, &mut collector);
        }
        while collector.chars.last().is_some_and(|c| c.ch == ' ') {
            collector.chars.pop();
        }
        if collector.chars.is_empty() {
            return 0.0;
        }

        let lines = self
            .text_layout
            .break_runs_into_lines(&collector.chars, width);
        let (strut_above, strut_below) = self.strut(parent);

        let mut text_lines = Vec::with_capacity(lines.len());
        let mut line_y = y;
        for line in &lines {
            let (mut above, mut below) = (strut_above, strut_below);
            for sc in &line.chars {
                let run = &collector.runs[sc.run];
                match &run.image {
                    Some(img) => above = above.max(img.height),
                    None => {
                        let (a, b) = self.strut(&run.style);
                        above = above.max(a);
                        below = below.max(b);
                    }
                }
            }
            let height = above + below;

            let offset = match parent.text_align {
                TextAlign::Left | TextAlign::Justify => 0.0,
                TextAlign::Center => ((width - line.width) / 2.0).max(0.0),
                TextAlign::Right => (width - line.width).max(0.0),
            };
            let line_x = x + offset;

            let mut glyphs = Vec::with_capacity(line.chars.len());
            for (sc, &pos) in line.chars.iter().zip(&line.char_positions) {
                let run = &collector.runs[sc.run];
                if let Some(img) = &run.image {
                    out.push(LayoutElement {
                        x: line_x + pos,
                        y: line_y + above - img.height,
                        width: img.width,
                        height: img.height,
                        draw: match (&img.src, img.loaded) {
                            (Some(src), true) => DrawCommand::Image {
                                src: src.clone(),
                                fit: img.fit,
                            },
                            _ => DrawCommand::ImagePlaceholder,
                        },
                        children: Vec::new(),
                    });
                    continue;
                }
                let style = &run.style;
                glyphs.push(PositionedGlyph {
                    x_offset: pos,
                    width: sc.width,
                    char_value: sc.ch,
                    font_size: style.font_size,
                    font_family: style.font_family.clone(),
                    font_weight: style.font_weight,
                    font_style: style.font_style,
                    color: style.color,
                    text_decoration: style.text_decoration,
                });
            }

            text_lines.push(TextLine {
                x: line_x,
                y: line_y,
                width: line.width,
                height,
                baseline: above,
                glyphs,
            });
            line_y += height;
        }

        let height = line_y - y;
        out.push(LayoutElement {
            x,
            y,
            width,
            height,
            draw: DrawCommand::Text { lines: text_lines },
            children: Vec::new(),
        });
        height
    }

    fn collect_inline(
        &self,
        node: &ContentNode,
        parent: &ResolvedStyle,
        container_width: f64,
        col: &mut InlineCollector,
    ) {
        let el = match node {
            ContentNode::Text { text } => {
                self.collect_text(text, parent, col);
                return;
            }
            ContentNode::Element(el) => el,
        };
        let style = self.styles.resolve(el, parent);
        match style.display {
            Display::None => {}
            Display::LineBreak => {
                let run = col.push_run(&style, None);
                col.chars.push(StyledChar {
                    ch: '\n',
                    run,
                    width: 0.0,
                });
                col.prev_space = true;
            }
            Display::Image => {
                let (width, height) = self.image_size(el, &style, container_width);
                let src = el.get_attr("src").map(str::to_string);
                let loaded = src.as_deref().is_some_and(|s| self.assets.image(s).is_some());
                let image = InlineImage {
                    src,
                    width,
                    height,
                    fit: style.object_fit,
                    loaded,
                };
                let run = col.push_run(&style, Some(image));
                col.chars.push(StyledChar {
                    ch: OBJECT_REPLACEMENT,
                    run,
                    width,
                });
                col.prev_space = false;
            }
            // Block-level descendants of inline content flow inline.
            _ => {
                for child in &el.children {
                    self.collect_inline(child, &style, container_width, col);
                }
            }
        }
    }

    fn collect_text(&self, text: &str, style: &ResolvedStyle, col: &mut InlineCollector) {
        let run = col.push_run(style, None);
        let italic = style.is_italic();
        let mut word_start = col.prev_space;
        for ch in text.chars() {
            if is_collapsible(ch) {
                if col.prev_space {
                    continue;
                }
                let width = self
                    .fonts
                    .char_width(' ', &style.font_family, style.font_weight, italic, style.font_size);
                col.chars.push(StyledChar { ch: ' ', run, width });
                col.prev_space = true;
                word_start = true;
                continue;
            }
            let ch = transform_char(ch, style.text_transform, word_start);
            let width = self
                .fonts
                .char_width(ch, &style.font_family, style.font_weight, italic, style.font_size);
            col.chars.push(StyledChar { ch, run, width });
            col.prev_space = false;
            word_start = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::dom::html::parse_fragment;
    use crate::font::FontContext;
    use crate::image_loader::AssetStore;

    fn lines_of(html: &str, width: f64) -> Vec<String> {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let assets = AssetStore::with_defaults(None, 1000);
        let engine = LayoutEngine::new(&fonts, &styles, &assets);
        let frag = engine.layout(&parse_fragment(html), 0.0, 0.0, width);
        let mut out = Vec::new();
        collect_lines(&frag.elements, &mut out);
        out
    }

    fn collect_lines(elements: &[LayoutElement], out: &mut Vec<String>) {
        for el in elements {
            if let DrawCommand::Text { lines } = &el.draw {
                for line in lines {
                    out.push(line.glyphs.iter().map(|g| g.char_value).collect());
                }
            }
            collect_lines(&el.children, out);
        }
    }

    #[test]
    fn whitespace_collapses_across_runs() {
        let lines = lines_of("<p>  uno \n\t <b> dos</b>   tres  </p>", 600.0);
        assert_eq!(lines, vec!["uno dos tres"]);
    }

    #[test]
    fn br_starts_a_new_line_without_leading_space() {
        let lines = lines_of("<p>uno<br> dos</p>", 600.0);
        assert_eq!(lines, vec!["uno", "dos"]);
    }

    #[test]
    fn whitespace_only_run_between_blocks_is_dropped() {
        let lines = lines_of("<p>a</p>\n   \n<p>b</p>", 600.0);
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn text_transform_uppercase() {
        let lines = lines_of(r#"<h3 class="section-title">diagnóstico</h3>"#, 600.0);
        assert_eq!(lines, vec!["DIAGNÓSTICO"]);
    }

    #[test]
    fn nbsp_is_not_collapsed() {
        let lines = lines_of("<p>5&nbsp;&nbsp;mm</p>", 600.0);
        assert_eq!(lines, vec!["5\u{a0}\u{a0}mm"]);
    }

    #[test]
    fn centered_line_is_offset() {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let assets = AssetStore::with_defaults(None, 1000);
        let engine = LayoutEngine::new(&fonts, &styles, &assets);
        let frag = engine.layout(
            &parse_fragment(r#"<div style="text-align:center">x</div>"#),
            0.0,
            0.0,
            400.0,
        );
        let text = &frag.elements[0].children[0];
        match &text.draw {
            DrawCommand::Text { lines } => assert!(lines[0].x > 190.0),
            other => panic!("expected text, got {other:?}"),
        }
    }
}
