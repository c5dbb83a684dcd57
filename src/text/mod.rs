//! # Text Layout
//!
//! Line breaking over styled characters using UAX#14 break opportunities.
//!
//! Widths are measured by the caller (the inline formatter knows each
//! run's font and the size of atomic images), so this module only decides
//! where lines end.

use unicode_linebreak::{linebreaks, BreakOpportunity};

/// One character of inline content. `run` indexes the caller's run table;
/// `width` is its measured advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyledChar {
    pub ch: char,
    pub run: usize,
    pub width: f64,
}

/// A line of text from multi-style (runs) line breaking.
#[derive(Debug, Clone)]
pub struct RunBrokenLine {
    pub chars: Vec<StyledChar>,
    /// X offset of each char from the line start.
    pub char_positions: Vec<f64>,
    /// Width excluding trailing spaces.
    pub width: f64,
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Each entry is the opportunity *before* that character. Index 0 is always
/// `None`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    // linebreaks() yields the byte offset AFTER each break.
    let byte_to_char: Vec<usize> = {
        let mut map = vec![0usize; text.len() + 1];
        for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
            map[byte_idx] = char_idx;
        }
        map[text.len()] = char_count;
        map
    };

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }

    result
}

/// Byte offsets inside `text` where it may be split between lines, in
/// increasing order. Excludes 0 and `text.len()`.
pub fn break_offsets(text: &str) -> Vec<usize> {
    linebreaks(text)
        .map(|(offset, _)| offset)
        .filter(|&offset| offset > 0 && offset < text.len())
        .collect()
}

fn is_newline(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub struct TextLayout;

impl Default for TextLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayout {
    pub fn new() -> Self {
        Self
    }

    /// Break styled characters into lines no wider than `max_width`.
    ///
    /// Lines end at the last UAX#14 opportunity before the overflow, or at a
    /// newline. A word wider than the line is broken at the overflowing
    /// character. Always returns at least one line.
    pub fn break_runs_into_lines(&self, chars: &[StyledChar], max_width: f64) -> Vec<RunBrokenLine> {
        if chars.is_empty() {
            return vec![RunBrokenLine {
                chars: vec![],
                char_positions: vec![],
                width: 0.0,
            }];
        }

        let plain_text: String = chars.iter().map(|sc| sc.ch).collect();
        let break_opps = compute_break_opportunities(&plain_text);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut line_width = 0.0;
        let mut last_break_point: Option<usize> = None;

        for (i, sc) in chars.iter().enumerate() {
            if i > 0 {
                match break_opps[i] {
                    Some(BreakOpportunity::Mandatory) => {
                        let end = if is_newline(chars[i - 1].ch) { i - 1 } else { i };
                        lines.push(self.make_run_line(&chars[line_start..end.max(line_start)]));
                        line_start = i;
                        line_width = 0.0;
                        last_break_point = None;
                    }
                    Some(BreakOpportunity::Allowed) => last_break_point = Some(i - 1),
                    None => {}
                }
            }

            if is_newline(sc.ch) {
                continue;
            }

            // Trailing spaces may hang past the edge.
            if sc.ch == ' ' {
                line_width += sc.width;
                continue;
            }

            if line_width + sc.width > max_width && line_start < i {
                if let Some(bp) = last_break_point.filter(|bp| *bp >= line_start) {
                    lines.push(self.make_run_line(&chars[line_start..=bp]));
                    line_start = bp + 1;
                    line_width = chars[line_start..=i].iter().map(|c| c.width).sum();
                    last_break_point = None;
                    continue;
                }

                lines.push(self.make_run_line(&chars[line_start..i]));
                line_start = i;
                line_width = sc.width;
                last_break_point = None;
                continue;
            }

            line_width += sc.width;
        }

        if line_start < chars.len() {
            let tail: Vec<StyledChar> = chars[line_start..]
                .iter()
                .copied()
                .filter(|c| !is_newline(c.ch))
                .collect();
            lines.push(self.make_run_line(&tail));
        }

        lines
    }

    fn make_run_line(&self, chars: &[StyledChar]) -> RunBrokenLine {
        let mut positions = Vec::with_capacity(chars.len());
        let mut x = 0.0;
        for sc in chars {
            positions.push(x);
            x += sc.width;
        }

        let mut effective_width = x;
        let mut i = chars.len();
        while i > 0 && chars[i - 1].ch == ' ' {
            i -= 1;
            effective_width -= chars[i].width;
        }

        RunBrokenLine {
            chars: chars.to_vec(),
            char_positions: positions,
            width: effective_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str, width: f64) -> Vec<StyledChar> {
        text.chars()
            .map(|ch| StyledChar { ch, run: 0, width })
            .collect()
    }

    fn line_text(line: &RunBrokenLine) -> String {
        line.chars.iter().map(|c| c.ch).collect()
    }

    #[test]
    fn short_text_is_one_line() {
        let lines = TextLayout::new().break_runs_into_lines(&chars("hola mundo", 5.0), 100.0);
        assert_eq!(lines.len(), 1);
        assert!((lines[0].width - 50.0).abs() < 1e-9);
    }

    #[test]
    fn breaks_at_word_boundary() {
        let lines = TextLayout::new().break_runs_into_lines(&chars("aaa bbb ccc", 10.0), 75.0);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["aaa bbb ", "ccc"]);
        assert!((lines[0].width - 70.0).abs() < 1e-9);
    }

    #[test]
    fn overlong_word_is_force_broken() {
        let lines = TextLayout::new().break_runs_into_lines(&chars("abcdefghij", 10.0), 35.0);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["abc", "def", "ghi", "j"]);
    }

    #[test]
    fn newline_is_a_mandatory_break() {
        let lines = TextLayout::new().break_runs_into_lines(&chars("uno\ndos", 5.0), 500.0);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["uno", "dos"]);
    }

    #[test]
    fn trailing_newline_does_not_add_a_line() {
        let lines = TextLayout::new().break_runs_into_lines(&chars("uno\n", 5.0), 500.0);
        assert_eq!(lines.len(), 1);
        let lines = TextLayout::new().break_runs_into_lines(&chars("\n", 5.0), 500.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].chars.is_empty());
    }

    #[test]
    fn empty_input_yields_one_empty_line() {
        let lines = TextLayout::new().break_runs_into_lines(&[], 100.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].width, 0.0);
    }

    #[test]
    fn break_offsets_follow_spaces() {
        assert_eq!(break_offsets("ab cd ef"), vec![3, 6]);
        assert!(break_offsets("palabra").is_empty());
    }
}
