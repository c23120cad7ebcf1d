use crate::cell::{CellValue, ParsedRow};
use crate::coerce::coerce_numeric;
use serde::{Deserialize, Serialize};

/// Parallel arrays handed to the chart renderer.
///
/// The X axis is a raw categorical passthrough of every row. The Y and Z
/// arrays drop values that fail numeric coercion, so they can be shorter
/// than X; callers that need pairwise alignment must tolerate the skew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartProjection {
    pub x_values: Vec<CellValue>,
    pub y_values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_values: Option<Vec<f64>>,
}

impl ChartProjection {
    /// Empty projection, used when axes are unset or there is no data.
    pub fn empty() -> Self {
        ChartProjection {
            x_values: Vec::new(),
            y_values: Vec::new(),
            z_values: None,
        }
    }

    /// Whether nothing survived projection; the UI blocks rendering on this.
    pub fn is_empty(&self) -> bool {
        self.x_values.is_empty() && self.y_values.is_empty()
    }
}

/// Project rows onto the chosen axes.
///
/// Pure over its inputs. Empty rows or unset X/Y keys yield an empty
/// projection rather than an error.
///
/// # Arguments
/// * `rows` - The parsed data rows
/// * `x_key` - Column supplying categorical X values
/// * `y_key` - Column supplying numeric Y values
/// * `z_key` - Optional column supplying numeric Z values (3-D charts)
///
/// # Returns
/// * `ChartProjection` - Parallel arrays for the plotting backend
pub fn project(
    rows: &[ParsedRow],
    x_key: &str,
    y_key: &str,
    z_key: Option<&str>,
) -> ChartProjection {
    if rows.is_empty() || x_key.is_empty() || y_key.is_empty() {
        return ChartProjection::empty();
    }

    let x_values = rows
        .iter()
        .map(|row| row.get(x_key).cloned().unwrap_or(CellValue::Empty))
        .collect();

    let y_values = numeric_series(rows, y_key);
    let z_values = z_key.filter(|k| !k.is_empty()).map(|k| numeric_series(rows, k));

    ChartProjection {
        x_values,
        y_values,
        z_values,
    }
}

/// Coerce a column to floats, dropping values that do not parse.
fn numeric_series(rows: &[ParsedRow], key: &str) -> Vec<f64> {
    rows.iter()
        .map(|row| coerce_numeric(row.get(key).unwrap_or(&CellValue::Empty)))
        .filter(|v| v.is_finite())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn rows(pairs: &[(&str, &str)]) -> Vec<ParsedRow> {
        pairs
            .iter()
            .map(|(x, y)| {
                let mut row = ParsedRow::new();
                row.insert("category".to_string(), text(x));
                row.insert("amount".to_string(), text(y));
                row
            })
            .collect()
    }

    #[test]
    fn coercion_misses_shorten_y_but_not_x() {
        let data = rows(&[("a", "10"), ("b", "n/a"), ("c", "30")]);
        let projection = project(&data, "category", "amount", None);

        assert_eq!(projection.x_values.len(), 3);
        assert_eq!(projection.y_values, vec![10.0, 30.0]);
    }

    #[test]
    fn empty_inputs_yield_empty_projection() {
        assert!(project(&[], "x", "y", None).is_empty());

        let data = rows(&[("a", "1")]);
        assert!(project(&data, "", "amount", None).is_empty());
        assert!(project(&data, "category", "", None).is_empty());
    }

    #[test]
    fn z_axis_is_projected_like_y() {
        let mut row1 = ParsedRow::new();
        row1.insert("x".to_string(), text("a"));
        row1.insert("y".to_string(), CellValue::Number(1.0));
        row1.insert("z".to_string(), text("$5"));
        let mut row2 = ParsedRow::new();
        row2.insert("x".to_string(), text("b"));
        row2.insert("y".to_string(), CellValue::Number(2.0));
        row2.insert("z".to_string(), text("bad"));

        let projection = project(&[row1, row2], "x", "y", Some("z"));
        assert_eq!(projection.y_values, vec![1.0, 2.0]);
        assert_eq!(projection.z_values, Some(vec![5.0]));
    }

    #[test]
    fn blank_z_key_means_no_z_axis() {
        let data = rows(&[("a", "1")]);
        let projection = project(&data, "category", "amount", Some(""));
        assert_eq!(projection.z_values, None);
    }

    #[test]
    fn missing_axis_column_passes_empty_cells_through() {
        let data = rows(&[("a", "1"), ("b", "2")]);
        let projection = project(&data, "nope", "amount", None);

        assert_eq!(
            projection.x_values,
            vec![CellValue::Empty, CellValue::Empty]
        );
        assert_eq!(projection.y_values, vec![1.0, 2.0]);
    }

    #[test]
    fn region_sales_walkthrough() {
        // 2 of 3 sampled Sales values are numeric (66.7%), below the 70%
        // bar, so Sales types as text while still projecting numerically.
        use crate::infer::{infer_column_type, ColumnKind};

        let data = rows(&[("East", "100"), ("West", "bad"), ("North", "$250")]);

        assert_eq!(infer_column_type("category", &data), ColumnKind::Text);
        assert_eq!(infer_column_type("amount", &data), ColumnKind::Text);

        let projection = project(&data, "category", "amount", None);
        assert_eq!(
            projection.x_values,
            vec![text("East"), text("West"), text("North")]
        );
        assert_eq!(projection.y_values, vec![100.0, 250.0]);
    }
}
