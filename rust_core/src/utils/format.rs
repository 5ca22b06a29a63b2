//! Display formatting for prices and percent changes.
//!
//! Fiat quote currencies get `fiat_round` decimals, everything else
//! (XRP, BTC, ...) gets `non_fiat_round`. Trailing zeros are dropped and the
//! integer part is grouped with commas, so `50000` in USD reads `50,000`.
//!
//! ```rust
//! use cryptomulti_core::utils::format::{format_change, format_price};
//!
//! assert_eq!(format_price(Some(1234.5), "usd", 2, 6), "1,234.5");
//! assert_eq!(format_change(Some(-0.456)), "-0.46%");
//! assert_eq!(format_change(None), "—");
//! ```

/// Shown wherever a value is missing
pub const PLACEHOLDER: &str = "—";

const FIAT_CODES: &[&str] = &["usd", "eur", "gbp", "cad", "aud", "jpy", "chf", "sek", "nok", "dkk"];

/// Whether `code` is a fiat currency
pub fn is_fiat(code: &str) -> bool {
    let code = code.trim().to_lowercase();
    FIAT_CODES.contains(&code.as_str())
}

/// Decimal places for prices quoted in `vs_currency`
pub fn price_decimals(vs_currency: &str, fiat_round: usize, non_fiat_round: usize) -> usize {
    if is_fiat(vs_currency) {
        fiat_round
    } else {
        non_fiat_round
    }
}

/// Format a price; missing or non-finite values become the placeholder
pub fn format_price(
    value: Option<f64>,
    vs_currency: &str,
    fiat_round: usize,
    non_fiat_round: usize,
) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => {
            let decimals = price_decimals(vs_currency, fiat_round, non_fiat_round);
            group_thousands(&trim_decimals(v, decimals))
        }
        None => PLACEHOLDER.to_string(),
    }
}

/// Direction of a percent change, for colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Up,
    Down,
    Flat,
}

impl ChangeDirection {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Self::Up
        } else if value < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

/// Two-decimal percent, e.g. `2.50%` or `-1.20%`
pub fn format_change(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:.2}%", v),
        None => PLACEHOLDER.to_string(),
    }
}

/// Round to `decimals` places and drop trailing zeros
fn trim_decimals(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };

    // "-0" after rounding a tiny negative
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Insert commas into the integer part of a plain decimal string
fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
