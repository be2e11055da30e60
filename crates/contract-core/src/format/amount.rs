//! Currency formatting and Spanish number words.
//!
//! Amounts above [`MAX_AMOUNT_IN_WORDS`] are written as plain numerals; contract
//! amounts in that range have never been needed in words.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest peso amount spelled out by [`amount_in_words`].
pub const MAX_AMOUNT_IN_WORDS: u64 = 9_999_999;

const UNITS: [&str; 30] = [
    "cero",
    "uno",
    "dos",
    "tres",
    "cuatro",
    "cinco",
    "seis",
    "siete",
    "ocho",
    "nueve",
    "diez",
    "once",
    "doce",
    "trece",
    "catorce",
    "quince",
    "dieciséis",
    "diecisiete",
    "dieciocho",
    "diecinueve",
    "veinte",
    "veintiuno",
    "veintidós",
    "veintitrés",
    "veinticuatro",
    "veinticinco",
    "veintiséis",
    "veintisiete",
    "veintiocho",
    "veintinueve",
];

const TENS: [&str; 10] = [
    "", "", "", "treinta", "cuarenta", "cincuenta", "sesenta", "setenta", "ochenta", "noventa",
];

const HUNDREDS: [&str; 10] = [
    "",
    "ciento",
    "doscientos",
    "trescientos",
    "cuatrocientos",
    "quinientos",
    "seiscientos",
    "setecientos",
    "ochocientos",
    "novecientos",
];

/// Format an amount as `$1,600,000.00`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let plain = format!("{:.2}", rounded.abs());
    let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    format!("{}${}.{}", sign, group_thousands(integer), fraction)
}

/// Spell out the integer peso part of an amount in Spanish.
///
/// Negative amounts and amounts above [`MAX_AMOUNT_IN_WORDS`] come back as the
/// plain integer numeral.
pub fn amount_in_words(amount: Decimal) -> String {
    let pesos = amount.trunc();
    match pesos.to_u64() {
        Some(n) if !pesos.is_sign_negative() && n <= MAX_AMOUNT_IN_WORDS => integer_to_words(n),
        _ => pesos.to_string(),
    }
}

/// Spell out 0-100 in Spanish; anything else is returned as a numeral.
pub fn number_to_words(n: i64) -> String {
    match u32::try_from(n) {
        Ok(n) if n <= 100 => below_thousand(n, false),
        _ => n.to_string(),
    }
}

fn integer_to_words(n: u64) -> String {
    if n == 0 {
        return UNITS[0].to_string();
    }

    // n <= MAX_AMOUNT_IN_WORDS so every group fits in u32
    let millions = (n / 1_000_000) as u32;
    let thousands = ((n / 1_000) % 1_000) as u32;
    let rest = (n % 1_000) as u32;

    let mut parts = Vec::with_capacity(3);
    match millions {
        0 => {}
        1 => parts.push("un millón".to_string()),
        m => parts.push(format!("{} millones", below_thousand(m, true))),
    }
    match thousands {
        0 => {}
        1 => parts.push("mil".to_string()),
        t => parts.push(format!("{} mil", below_thousand(t, true))),
    }
    if rest > 0 {
        parts.push(below_thousand(rest, false));
    }

    parts.join(" ")
}

/// Words for 0-999. `apocope` shortens a trailing "uno" to "un" before a
/// multiplier ("veintiún mil", "un millón").
fn below_thousand(n: u32, apocope: bool) -> String {
    if n == 100 {
        return "cien".to_string();
    }

    let hundreds = (n / 100) as usize;
    let rest = n % 100;
    match (hundreds, rest) {
        (0, r) => below_hundred(r, apocope),
        (h, 0) => HUNDREDS[h].to_string(),
        (h, r) => format!("{} {}", HUNDREDS[h], below_hundred(r, apocope)),
    }
}

fn below_hundred(n: u32, apocope: bool) -> String {
    if n < 30 {
        let word = match (n, apocope) {
            (1, true) => "un",
            (21, true) => "veintiún",
            (n, _) => UNITS[n as usize],
        };
        return word.to_string();
    }

    let tens = TENS[(n / 10) as usize];
    match n % 10 {
        0 => tens.to_string(),
        1 if apocope => format!("{} y un", tens),
        unit => format!("{} y {}", tens, UNITS[unit as usize]),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Informal inverse of `integer_to_words` for round-trip checks.
    fn words_to_number(words: &str) -> u64 {
        let value = |w: &str| -> Option<u64> {
            if let Some(i) = UNITS.iter().position(|u| *u == w) {
                return Some(i as u64);
            }
            if let Some(i) = TENS.iter().position(|t| !t.is_empty() && *t == w) {
                return Some(i as u64 * 10);
            }
            if let Some(i) = HUNDREDS.iter().position(|h| !h.is_empty() && *h == w) {
                return Some(i as u64 * 100);
            }
            match w {
                "un" => Some(1),
                "veintiún" => Some(21),
                "cien" => Some(100),
                _ => None,
            }
        };

        let mut total = 0;
        let mut group = 0;
        for word in words.split_whitespace() {
            match word {
                "y" => {}
                "mil" => {
                    total += group.max(1) * 1_000;
                    group = 0;
                }
                "millón" | "millones" => {
                    total += group * 1_000_000;
                    group = 0;
                }
                w => group += value(w).unwrap_or_else(|| panic!("unknown word {w}")),
            }
        }
        total + group
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Decimal::new(1_600_000, 0)), "$1,600,000.00");
        assert_eq!(format_currency(Decimal::new(0, 0)), "$0.00");
        assert_eq!(format_currency(Decimal::new(999, 0)), "$999.00");
        assert_eq!(format_currency(Decimal::new(1000, 0)), "$1,000.00");
        assert_eq!(format_currency(Decimal::new(123_456_789, 2)), "$1,234,567.89");
        assert_eq!(format_currency(Decimal::new(-250_050, 2)), "-$2,500.50");
    }

    #[test]
    fn test_format_currency_rounds_half_up() {
        assert_eq!(format_currency(Decimal::new(10_005, 3)), "$10.01");
        assert_eq!(format_currency(Decimal::new(10_004, 3)), "$10.00");
    }

    #[test]
    fn test_amount_in_words() {
        assert_eq!(amount_in_words(Decimal::new(0, 0)), "cero");
        assert_eq!(amount_in_words(Decimal::new(1, 0)), "uno");
        assert_eq!(amount_in_words(Decimal::new(100, 0)), "cien");
        assert_eq!(amount_in_words(Decimal::new(101, 0)), "ciento uno");
        assert_eq!(amount_in_words(Decimal::new(1_000, 0)), "mil");
        assert_eq!(amount_in_words(Decimal::new(21_000, 0)), "veintiún mil");
        assert_eq!(amount_in_words(Decimal::new(31_500, 0)), "treinta y un mil quinientos");
        assert_eq!(
            amount_in_words(Decimal::new(1_600_000, 0)),
            "un millón seiscientos mil"
        );
        assert_eq!(
            amount_in_words(Decimal::new(2_345_678, 0)),
            "dos millones trescientos cuarenta y cinco mil seiscientos setenta y ocho"
        );
        assert_eq!(
            amount_in_words(Decimal::new(9_999_999, 0)),
            "nueve millones novecientos noventa y nueve mil novecientos noventa y nueve"
        );
    }

    #[test]
    fn test_amount_in_words_ignores_cents() {
        assert_eq!(amount_in_words(Decimal::new(150_099, 2)), "mil quinientos");
    }

    #[test]
    fn test_amount_in_words_degrades_to_numeral() {
        assert_eq!(amount_in_words(Decimal::new(10_000_000, 0)), "10000000");
        assert_eq!(amount_in_words(Decimal::new(-5, 0)), "-5");
    }

    #[test]
    fn test_number_to_words() {
        assert_eq!(number_to_words(0), "cero");
        assert_eq!(number_to_words(5), "cinco");
        assert_eq!(number_to_words(16), "dieciséis");
        assert_eq!(number_to_words(21), "veintiuno");
        assert_eq!(number_to_words(31), "treinta y uno");
        assert_eq!(number_to_words(99), "noventa y nueve");
        assert_eq!(number_to_words(100), "cien");
        assert_eq!(number_to_words(101), "101");
        assert_eq!(number_to_words(-1), "-1");
    }

    #[test]
    fn test_amount_in_words_round_trip() {
        let samples = (0..=2_000u64)
            .chain((0..=9_999_999u64).step_by(7_919))
            .chain([1_000_001, 1_001_000, 9_999_999, 21_021, 100_100]);

        for n in samples {
            let words = amount_in_words(Decimal::from(n));
            assert_eq!(words_to_number(&words), n, "{n} -> {words}");
        }
    }
}
