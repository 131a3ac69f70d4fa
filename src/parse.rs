//! Field parsers and text folding.
//!
//! Sources report prices and areas as free text in Brazilian notation
//! (`"R$ 2.200,00"`, `"248,96 m²"`) or as plain JSON numbers. These
//! functions turn either form into a strictly positive `f64`, or `None`.

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

/// Render a scalar JSON value as text. Objects, arrays, booleans and null
/// yield `None`.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a price such as `"R$ 2.200,00"`, `"R$ 440.000"` or `350000`.
///
/// Separator rules apply to text only; a JSON number's dot is always a
/// decimal point.
pub fn parse_price(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => return positive(n.as_f64()?),
        Value::String(s) => s,
        _ => return None,
    };
    let s: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();

    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        (None, Some(_)) if is_dot_grouped(&s) => s.replace('.', ""),
        _ => s,
    };

    positive(normalized.parse::<f64>().ok()?)
}

/// Parse an area such as `"248,96 m²"` or `"120m2"`.
pub fn parse_area(value: &Value) -> Option<f64> {
    let raw = value_text(value)?.to_lowercase();
    let cleaned: String = raw
        .replace("m²", "")
        .replace("m2", "")
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    positive(cleaned.parse::<f64>().ok()?)
}

/// Text form of a count field (bedrooms, bathrooms, parking spots).
pub fn parse_count(value: &Value) -> Option<String> {
    value_text(value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Leading digits of a count, e.g. `"3 quartos"` → 3.
pub fn count_digits(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Lowercase ASCII folding: `"Goiânia"` → `"goiania"`. Characters without
/// an ASCII decomposition are dropped.
pub fn fold_text(text: &str) -> String {
    text.nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase()
}

/// `440.000` and `1.250.000` use dots as thousands separators: every group
/// after the first has exactly three digits.
fn is_dot_grouped(s: &str) -> bool {
    let mut groups = s.split('.');
    let head = groups.next().unwrap_or_default();
    if head.is_empty() || head.len() > 3 || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

fn positive(v: f64) -> Option<f64> {
    if v.is_finite() && v > 0.0 {
        Some(v)
    } else {
        None
    }
}
