//! Type inference for raw cell input.
//!
//! Rules, first match wins:
//! 1. starts with `=` -> formula
//! 2. numeric -> number
//! 3. `true`/`false` in any case -> boolean
//! 4. `YYYY-MM-DD` -> date
//! 5. anything else -> text

use regex::Regex;
use std::sync::OnceLock;

use super::cell::{CellType, CellValue};

/// Classify raw input. Pure and deterministic.
pub fn classify(raw: &str) -> CellType {
    if raw.starts_with('=') {
        CellType::Formula
    } else if parse_number(raw).is_some() {
        CellType::Number
    } else if parse_boolean(raw).is_some() {
        CellType::Boolean
    } else if date_re().is_match(raw) {
        CellType::Date
    } else {
        CellType::Text
    }
}

/// Typed scalar for non-formula input. Formula input yields its raw text;
/// callers store the evaluated result instead.
pub fn parse_input(raw: &str) -> (CellType, CellValue) {
    let kind = classify(raw);
    let value = match kind {
        CellType::Number => CellValue::Number(parse_number(raw).unwrap_or_default()),
        CellType::Boolean => CellValue::Boolean(parse_boolean(raw).unwrap_or_default()),
        CellType::Date | CellType::Text | CellType::Formula => CellValue::Text(raw.to_string()),
    };
    (kind, value)
}

/// Parse a number the way a browser's `Number(raw)` would, minus the
/// empty-string-is-zero quirk.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    if let Some(n) = parse_radix_literal(s) {
        return Some(n);
    }

    // Rust also accepts "inf"/"nan"; those are words, not numbers.
    if s.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return None;
    }

    s.parse::<f64>().ok()
}

fn parse_radix_literal(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'0' {
        return None;
    }
    let radix = match bytes[1] {
        b'x' | b'X' => 16,
        b'o' | b'O' => 8,
        b'b' | b'B' => 2,
        _ => return None,
    };
    let digits = &s[2..];
    let mut acc = 0f64;
    for ch in digits.chars() {
        acc = acc * radix as f64 + ch.to_digit(radix)? as f64;
    }
    Some(acc)
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn date_re() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date regex must compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_formula_wins_over_everything() {
        assert_eq!(classify("=1"), CellType::Formula);
        assert_eq!(classify("="), CellType::Formula);
        assert_eq!(classify("=true"), CellType::Formula);
    }

    #[test]
    fn test_numbers() {
        for s in ["123", "-4.5", "+7", ".5", "5.", "1e3", " 42 ", "0x1F", "0b101", "Infinity"] {
            assert_eq!(classify(s), CellType::Number, "{s:?}");
        }
        assert_eq!(parse_number("0x1F"), Some(31.0));
        assert_eq!(parse_number(" 42 "), Some(42.0));
    }

    #[test]
    fn test_not_numbers() {
        for s in ["", "   ", ".", "inf", "NaN", "1,000", "12abc", "0x", "0xZZ", "-0x10"] {
            assert_ne!(classify(s), CellType::Number, "{s:?}");
        }
    }

    #[test]
    fn test_booleans_are_case_insensitive() {
        assert_eq!(classify("true"), CellType::Boolean);
        assert_eq!(classify("FALSE"), CellType::Boolean);
        assert_eq!(classify("True"), CellType::Boolean);
        assert_eq!(classify(" true"), CellType::Text);
    }

    #[test]
    fn test_dates() {
        assert_eq!(classify("2023-12-25"), CellType::Date);
        assert_eq!(classify("2023-12-5"), CellType::Text);
        assert_eq!(classify("2023-12-25T10:00"), CellType::Text);
        // Only ASCII digits make a date.
        let arabic_indic = "\u{0662}\u{0660}\u{0662}\u{0663}-\u{0661}\u{0662}-\u{0662}\u{0665}";
        assert_eq!(classify(arabic_indic), CellType::Text);
        assert_eq!(classify("２０２３-１２-２５"), CellType::Text);
    }

    #[test]
    fn test_parse_input_values() {
        assert_eq!(parse_input("true"), (CellType::Boolean, CellValue::Boolean(true)));
        assert_eq!(parse_input("-4.5"), (CellType::Number, CellValue::Number(-4.5)));
        assert_eq!(
            parse_input("Hello"),
            (CellType::Text, CellValue::Text("Hello".to_string()))
        );
        assert_eq!(
            parse_input("2023-12-25"),
            (CellType::Date, CellValue::Text("2023-12-25".to_string()))
        );
    }

    proptest! {
        #[test]
        fn prop_finite_numbers_classify_as_number(n in -1e12f64..1e12f64) {
            prop_assert_eq!(classify(&n.to_string()), CellType::Number);
        }

        #[test]
        fn prop_integers_classify_as_number(n in any::<i64>()) {
            prop_assert_eq!(classify(&n.to_string()), CellType::Number);
        }

        #[test]
        fn prop_equals_prefix_is_formula(rest in ".*") {
            let raw = format!("={rest}");
            prop_assert_eq!(classify(&raw), CellType::Formula);
        }

        #[test]
        fn prop_classification_is_deterministic(raw in ".*") {
            prop_assert_eq!(classify(&raw), classify(&raw));
        }
    }
}
