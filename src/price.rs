//! Price text normalisation
//!
//! Turns vendor price strings like `"$1,299.99"`, `"1 299,00 €"` or
//! `"$10 - $20"` into a comparable `f64`. Only the first numeral is used,
//! so a range yields its lower bound.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::PriceParseError;

/// Digit groups joined by single separators: `.`, `,`, `'` or a space
/// (plain, no-break, thin or narrow no-break).
static NUMERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:[.,'\s\x{A0}\x{2009}\x{202F}]\d+)*").expect("numeral pattern")
});

/// Parse free-form price text into an amount.
pub fn normalize(text: &str) -> Result<f64, PriceParseError> {
    let err = || PriceParseError {
        text: text.to_string(),
    };

    let numeral = NUMERAL.find(text).ok_or_else(err)?.as_str();
    let numeral = trim_spaced_groups(numeral);
    let amount = canonicalize(numeral).parse::<f64>().map_err(|_| err())?;
    if !amount.is_finite() {
        return Err(err());
    }
    Ok(amount)
}

/// Cut the numeral at the first space not followed by a three-digit group,
/// so `"5 10"` reads as `5` while `"1 299"` stays whole.
fn trim_spaced_groups(numeral: &str) -> &str {
    for (i, c) in numeral.char_indices() {
        if c.is_whitespace() {
            let group = numeral[i + c.len_utf8()..]
                .bytes()
                .take_while(u8::is_ascii_digit)
                .count();
            if group != 3 {
                return &numeral[..i];
            }
        }
    }
    numeral
}

/// Rewrite a numeral with arbitrary grouping into `1234.56` form.
fn canonicalize(numeral: &str) -> String {
    let decimal = decimal_separator(numeral);
    numeral
        .char_indices()
        .filter_map(|(i, c)| match c {
            '0'..='9' => Some(c),
            '.' | ',' if Some(i) == decimal => Some('.'),
            _ => None,
        })
        .collect()
}

/// Byte offset of the decimal separator: the last `.` or `,`, unless
/// exactly three digits follow it, in which case it is grouping.
fn decimal_separator(numeral: &str) -> Option<usize> {
    let at = numeral.rfind(['.', ','])?;
    let fraction = numeral[at + 1..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    (fraction != 3).then_some(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_and_thousands() {
        assert_eq!(normalize("$999.99").unwrap(), 999.99);
        assert_eq!(normalize("$1,450.00").unwrap(), 1450.0);
        assert_eq!(normalize("USD 2,000").unwrap(), 2000.0);
        assert_eq!(normalize("€1.50/kg").unwrap(), 1.5);
    }

    #[test]
    fn test_european_grouping() {
        assert_eq!(normalize("12,99 €").unwrap(), 12.99);
        assert_eq!(normalize("1.234,56 €").unwrap(), 1234.56);
        assert_eq!(normalize("1.234.567 kr").unwrap(), 1234567.0);
        assert_eq!(normalize("CHF 1'299.50").unwrap(), 1299.5);
    }

    #[test]
    fn test_space_grouping() {
        assert_eq!(normalize("1 299,00 €").unwrap(), 1299.0);
        assert_eq!(normalize("1\u{a0}299,00 €").unwrap(), 1299.0);
        assert_eq!(normalize("1\u{202f}299,00 €").unwrap(), 1299.0);
        assert_eq!(normalize("2\u{2009}345\u{2009}678 Ft").unwrap(), 2345678.0);
        assert_eq!(normalize("5 10").unwrap(), 5.0);
    }

    #[test]
    fn test_separator_by_fraction_length() {
        assert_eq!(normalize("12,5 €").unwrap(), 12.5);
        assert_eq!(normalize("1.234 kr").unwrap(), 1234.0);
        assert_eq!(normalize("0.1234 BTC").unwrap(), 0.1234);
        assert_eq!(normalize("1,5").unwrap(), 1.5);
    }

    #[test]
    fn test_trailing_words_and_ranges() {
        assert_eq!(normalize("$25.00 shipping").unwrap(), 25.0);
        assert_eq!(normalize("$10 - $20").unwrap(), 10.0);
        assert_eq!(normalize("  Now only $5  ").unwrap(), 5.0);
    }

    #[test]
    fn test_no_numeral() {
        let err = normalize("Free shipping").unwrap_err();
        assert_eq!(err.text, "Free shipping");
        assert!(normalize("").is_err());
        assert!(normalize("$.").is_err());
    }

    #[test]
    fn test_overflow_is_rejected() {
        let huge = format!("${}", "9".repeat(400));
        let err = normalize(&huge).unwrap_err();
        assert_eq!(err.text, huge);
    }
}
