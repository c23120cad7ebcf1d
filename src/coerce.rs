use crate::cell::CellValue;

/// Strip the formatting characters commonly found in spreadsheet numbers:
/// thousand separators, currency signs, percent signs and whitespace.
fn strip_formatting(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ',' | '$' | '%') && !c.is_whitespace())
        .collect()
}

/// Decide whether a cell value can be treated as a number.
///
/// Total over its input domain; never panics.
///
/// # Arguments
/// * `value` - The cell value to classify
///
/// # Returns
/// * `bool` - True if the value is numeric or a numeric-looking string
///   (after stripping `,`, `$`, `%` and whitespace)
///
/// # Examples
/// ```
/// use chartsheet::cell::CellValue;
/// use chartsheet::coerce::is_numeric;
///
/// assert!(is_numeric(&CellValue::Text("$1,200.50".to_string())));
/// assert!(!is_numeric(&CellValue::Text("abc".to_string())));
/// ```
pub fn is_numeric(value: &CellValue) -> bool {
    match value {
        CellValue::Empty | CellValue::Bool(_) => false,
        CellValue::Number(n) => !n.is_nan(),
        CellValue::Text(s) => {
            let stripped = strip_formatting(s);
            if stripped.is_empty() {
                return false;
            }
            matches!(stripped.parse::<f64>(), Ok(v) if v.is_finite())
        }
    }
}

/// Coerce a cell value to a float, applying the same formatting stripping
/// as [`is_numeric`].
///
/// Returns `f64::NAN` when the value cannot be read as a number; callers
/// either check [`is_numeric`] first or drop non-finite results.
pub fn coerce_numeric(value: &CellValue) -> f64 {
    match value {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => {
            let stripped = strip_formatting(s);
            if stripped.is_empty() {
                f64::NAN
            } else {
                stripped.parse().unwrap_or(f64::NAN)
            }
        }
        CellValue::Empty | CellValue::Bool(_) => f64::NAN,
    }
}
