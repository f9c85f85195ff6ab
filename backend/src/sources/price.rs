use lazy_static::lazy_static;
use regex::Regex;
use shared::{Price, UNKNOWN_PRICE};

lazy_static! {
    static ref PRICE_DIGITS: Regex = Regex::new(r"[\d.,]+").expect("valid price pattern");
    static ref COUNT: Regex =
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*([kK])?").expect("valid count pattern");
}

/// Reads the first number out of a display price, treating `.` and `,` as
/// thousands separators: `"₫1.234.000"` -> `1234000`.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let found = PRICE_DIGITS.find(text)?;
    let digits: String = found
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok()
}

/// Sold counters: `"150"`, `"1.2K sold"`, `"Đã bán 2,5k"`.
pub fn parse_count(text: &str) -> Option<u64> {
    let caps = COUNT.captures(text)?;
    let number = caps.get(1)?.as_str();
    if caps.get(2).is_some() {
        let value: f64 = number.replace(',', ".").parse().ok()?;
        return Some((value * 1000.0).round() as u64);
    }
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// `299000.0` -> `"299.000đ"`.
pub fn format_vnd(amount: f64) -> String {
    let whole = amount.max(0.0).round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped.push('đ');
    grouped
}

/// Price plus its display text. Negative or non-finite amounts are unknown.
pub fn price_fields(amount: Option<f64>) -> (Price, String) {
    match amount.map(Price::from_amount) {
        Some(Price::Amount(value)) => (Price::Amount(value), format_vnd(value)),
        _ => (Price::unknown(), UNKNOWN_PRICE.to_string()),
    }
}
