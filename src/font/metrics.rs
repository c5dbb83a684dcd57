//! Advance widths for the standard PDF fonts, from the Adobe AFM files.
//!
//! Tables cover printable ASCII (32..=126) in 1/1000 em units. Accented
//! Latin letters measure as their base letter, which matches the AFM widths
//! for every accented form Spanish text uses.

/// Widths and vertical metrics of one standard font face.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontMetrics {
    widths: &'static [u16; 95],
    /// Fallback for characters outside the table.
    default_width: u16,
    pub ascender: i16,
    pub descender: i16,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in the same unit as `font_size`.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.units(ch) as f64 / 1000.0 * font_size
    }

    pub fn measure_string(&self, text: &str, font_size: f64, letter_spacing: f64) -> f64 {
        text.chars()
            .map(|ch| self.char_width(ch, font_size) + letter_spacing)
            .sum()
    }

    /// Ascender as a fraction of the em.
    pub fn ascent_ratio(&self) -> f64 {
        self.ascender as f64 / 1000.0
    }

    pub fn descent_ratio(&self) -> f64 {
        -(self.descender as f64) / 1000.0
    }

    fn units(&self, ch: char) -> u16 {
        let ch = fold_to_ascii(ch);
        match ch {
            ' '..='~' => self.widths[(ch as usize) - 32],
            '\u{FFFC}' | '\u{200B}' => 0,
            '•' => 350,
            '–' => self.widths[('-' as usize) - 32] * 5 / 3,
            '—' | '…' => 1000,
            '‘' | '’' | '‚' => self.widths[('\'' as usize) - 32] + 30,
            '“' | '”' | '„' => self.widths[('"' as usize) - 32],
            '°' => 400,
            'º' | 'ª' => 350,
            '¿' => self.widths[('?' as usize) - 32],
            '¡' => self.widths[('!' as usize) - 32],
            '×' | '±' | '÷' => self.widths[('+' as usize) - 32],
            'µ' => self.widths[('u' as usize) - 32],
            _ => self.default_width,
        }
    }
}

/// Map accented Latin letters and common spaces to their ASCII base.
pub fn fold_to_ascii(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        '\u{00A0}' | '\u{2009}' | '\u{202F}' => ' ',
        '\t' => ' ',
        _ => ch,
    }
}

pub static HELVETICA: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_WIDTHS,
    default_width: 556,
    ascender: 718,
    descender: -207,
};

pub static HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_BOLD_WIDTHS,
    default_width: 611,
    ascender: 718,
    descender: -207,
};

pub static TIMES_ROMAN: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_ROMAN_WIDTHS,
    default_width: 500,
    ascender: 683,
    descender: -217,
};

pub static TIMES_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_BOLD_WIDTHS,
    default_width: 500,
    ascender: 676,
    descender: -205,
};

pub static COURIER: StandardFontMetrics = StandardFontMetrics {
    widths: &[600; 95],
    default_width: 600,
    ascender: 629,
    descender: -157,
};

#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    // space ! " # $ % & ' ( ) * + , - . /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // : ; < = > ? @
    278, 278, 584, 584, 584, 556, 1015,
    // A-Z
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [ \ ] ^ _ `
    278, 278, 278, 469, 556, 333,
    // a-z
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // { | } ~
    334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    333, 333, 570, 570, 570, 500, 930,
    722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944,
    722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667,
    333, 278, 333, 581, 500, 333,
    500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833,
    556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444,
    394, 220, 394, 520,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_and_capitals() {
        assert!((HELVETICA.char_width(' ', 1000.0) - 278.0).abs() < 1e-9);
        assert!((HELVETICA.char_width('A', 1000.0) - 667.0).abs() < 1e-9);
        assert!((HELVETICA_BOLD.char_width('A', 1000.0) - 722.0).abs() < 1e-9);
        assert!((HELVETICA.char_width('~', 1000.0) - 584.0).abs() < 1e-9);
    }

    #[test]
    fn accented_letters_measure_as_base() {
        assert_eq!(HELVETICA.char_width('ñ', 12.0), HELVETICA.char_width('n', 12.0));
        assert_eq!(TIMES_ROMAN.char_width('É', 12.0), TIMES_ROMAN.char_width('E', 12.0));
    }

    #[test]
    fn object_replacement_has_no_width() {
        assert_eq!(HELVETICA.char_width('\u{FFFC}', 12.0), 0.0);
    }

    #[test]
    fn courier_is_monospaced() {
        let a = COURIER.measure_string("iiii", 10.0, 0.0);
        let b = COURIER.measure_string("MMMM", 10.0, 0.0);
        assert!((a - b).abs() < 1e-9);
    }
}
