//! Text normalization and line wrapping for the built-in PDF fonts.
//!
//! The standard Type1 fonts are used without embedding, and their extended
//! Latin glyph coverage varies between viewers, so every string is reduced to
//! printable ASCII before layout.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Bold glyphs run wider; widths are scaled rather than tabulated twice.
const BOLD_SCALE: f32 = 1.06;

/// Reduce text to printable ASCII: accents are stripped ("Peña" -> "Pena"),
/// typographic punctuation is mapped to its ASCII form, anything else becomes '?'.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        match ch {
            ' '..='~' => out.push(ch),
            '\t' | '\n' | '\r' | '\u{a0}' => out.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{00b4}' => out.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{00ab}' | '\u{00bb}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{00ba}' | '\u{00b0}' => out.push('o'),
            '\u{00aa}' => out.push('a'),
            '\u{00bf}' | '\u{00a1}' => {}
            '\u{2026}' => out.push_str("..."),
            _ => out.push('?'),
        }
    }
    out
}

/// Width of normalized text in points.
pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text
        .bytes()
        .map(|b| match b {
            32..=126 => HELVETICA_WIDTHS[(b - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    let width = units as f32 * size / 1000.0;
    if bold {
        width * BOLD_SCALE
    } else {
        width
    }
}

/// Greedy word wrap to `max_width` points. Words wider than a line are split.
pub fn wrap(text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if text_width(&candidate, size, bold) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if text_width(word, size, bold) <= max_width {
            current = word.to_string();
        } else {
            for ch in word.chars() {
                current.push(ch);
                if text_width(&current, size, bold) > max_width && current.len() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize_text("María José Peña"), "Maria Jose Pena");
        assert_eq!(normalize_text("TÉRMINO DE DURACIÓN"), "TERMINO DE DURACION");
        assert_eq!(normalize_text("Güemes ü"), "Guemes u");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_text("¿Qué? ¡Sí!"), "Que? Si!");
        assert_eq!(normalize_text("“cita” – fin…"), "\"cita\" - fin...");
        assert_eq!(normalize_text("N.º 5"), "N.o 5");
        assert_eq!(normalize_text("línea\nnueva"), "linea nueva");
        assert_eq!(normalize_text("東京"), "??");
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", 10.0, false), 0.0);
        // 'M' is 833 units
        assert!((text_width("M", 10.0, false) - 8.33).abs() < 0.001);
        assert!(text_width("Hola", 10.0, true) > text_width("Hola", 10.0, false));
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "El precio mensual del arrendamiento es la suma pactada por las partes en este contrato";
        let lines = wrap(text, 10.0, false, 150.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 10.0, false) <= 150.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let word = "x".repeat(100);
        let lines = wrap(&word, 10.0, false, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn test_wrap_empty() {
        assert_eq!(wrap("", 10.0, false, 100.0), vec![String::new()]);
    }
}
