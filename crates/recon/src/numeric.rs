// Numeric field ingestion and output formatting.
// Every numeric value read from a label file, report, metadata table or
// ledger goes through `parse_decimal`.

/// Parse a decimal number, accepting `,` as the decimal separator.
///
/// Surrounding whitespace is ignored. Returns `None` for empty input,
/// non-numeric text, NaN and infinities.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer that may have been exported as a float (`"123"`, `"123.0"`).
pub fn parse_integral(raw: &str) -> Option<i64> {
    let value = parse_decimal(raw)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

/// Fixed-point key at gram precision (3 decimals), used for weight equality.
pub fn to_milli(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

/// Shortest round-trip form; integral values keep a trailing `.0`.
///
/// Very small or very large magnitudes come out in exponent form (`1e-7`).
/// `parse_decimal` reads those back unchanged.
pub fn format_float(value: f64) -> String {
    format!("{value:?}")
}
