use crate::cell::{CellValue, ParsedRow};
use crate::coerce::is_numeric;
use serde::{Deserialize, Serialize};

/// How many leading rows are sampled when classifying a column.
const SAMPLE_ROWS: usize = 10;

/// Fraction of non-empty sampled values that must be numeric for a column
/// to classify as numeric. Strictly greater than, not equal.
const NUMERIC_THRESHOLD: f64 = 0.7;

/// Column classification used to pick chart axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Text,
}

/// A column's name, inferred kind and a representative sample value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub sample: CellValue,
}

/// Classify a column as numeric or textual from a prefix sample.
///
/// Samples the first `min(10, rows.len())` rows and classifies the column
/// as `Number` when more than 70% of the non-blank sampled values are
/// numeric-coercible. A column whose sampled values are all blank is
/// `Text`. This is a heuristic over a prefix, chosen for responsiveness:
/// it can misclassify columns whose density changes after the sample.
///
/// # Arguments
/// * `name` - The column header to look up in each row
/// * `rows` - The parsed data rows
///
/// # Returns
/// * `ColumnKind` - `Number` or `Text`
pub fn infer_column_type(name: &str, rows: &[ParsedRow]) -> ColumnKind {
    let sample = &rows[..rows.len().min(SAMPLE_ROWS)];

    let mut total = 0usize;
    let mut numeric = 0usize;

    for row in sample {
        let value = row.get(name).unwrap_or(&CellValue::Empty);
        if value.is_blank() {
            continue;
        }
        total += 1;
        if is_numeric(value) {
            numeric += 1;
        }
    }

    if total > 0 && (numeric as f64 / total as f64) > NUMERIC_THRESHOLD {
        ColumnKind::Number
    } else {
        ColumnKind::Text
    }
}

/// Build a descriptor for every header, pairing the inferred kind with the
/// first non-blank sampled value for display in the axis picker.
pub fn describe_columns(headers: &[String], rows: &[ParsedRow]) -> Vec<ColumnDescriptor> {
    headers
        .iter()
        .map(|name| {
            let sample = rows[..rows.len().min(SAMPLE_ROWS)]
                .iter()
                .filter_map(|row| row.get(name))
                .find(|value| !value.is_blank())
                .cloned()
                .unwrap_or(CellValue::Empty);

            ColumnDescriptor {
                name: name.clone(),
                kind: infer_column_type(name, rows),
                sample,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[CellValue]) -> Vec<ParsedRow> {
        values
            .iter()
            .map(|v| {
                let mut row = ParsedRow::new();
                row.insert("col".to_string(), v.clone());
                row
            })
            .collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn eight_of_ten_numeric_is_number() {
        let mut values = vec![CellValue::Number(1.0); 8];
        values.push(text("x"));
        values.push(text("y"));
        let rows = column(&values);

        assert_eq!(infer_column_type("col", &rows), ColumnKind::Number);
    }

    #[test]
    fn exactly_seven_of_ten_is_text() {
        // 0.7 must be exceeded, not met
        let mut values = vec![CellValue::Number(1.0); 7];
        values.extend([text("x"), text("y"), text("z")]);
        let rows = column(&values);

        assert_eq!(infer_column_type("col", &rows), ColumnKind::Text);
    }

    #[test]
    fn all_blank_column_is_text() {
        let rows = column(&[CellValue::Empty, text(""), CellValue::Empty]);
        assert_eq!(infer_column_type("col", &rows), ColumnKind::Text);
    }

    #[test]
    fn missing_column_is_text() {
        let rows = column(&[CellValue::Number(1.0)]);
        assert_eq!(infer_column_type("other", &rows), ColumnKind::Text);
    }

    #[test]
    fn blanks_are_excluded_from_the_ratio() {
        // 3 of 4 non-blank values numeric = 75% > 70%
        let rows = column(&[
            CellValue::Number(1.0),
            CellValue::Empty,
            text("$2"),
            CellValue::Number(3.0),
            text("oops"),
            CellValue::Empty,
        ]);
        assert_eq!(infer_column_type("col", &rows), ColumnKind::Number);
    }

    #[test]
    fn only_the_first_ten_rows_are_sampled() {
        // Numeric prefix, text tail beyond the sample window
        let mut values = vec![CellValue::Number(1.0); 10];
        values.extend(std::iter::repeat(text("tail")).take(20));
        let rows = column(&values);

        assert_eq!(infer_column_type("col", &rows), ColumnKind::Number);
    }

    #[test]
    fn descriptors_carry_first_non_blank_sample() {
        let mut row1 = ParsedRow::new();
        row1.insert("Region".to_string(), CellValue::Empty);
        row1.insert("Sales".to_string(), CellValue::Number(100.0));
        let mut row2 = ParsedRow::new();
        row2.insert("Region".to_string(), text("East"));
        row2.insert("Sales".to_string(), CellValue::Number(250.0));

        let headers = vec!["Region".to_string(), "Sales".to_string()];
        let descriptors = describe_columns(&headers, &[row1, row2]);

        assert_eq!(descriptors[0].sample, text("East"));
        assert_eq!(descriptors[0].kind, ColumnKind::Text);
        assert_eq!(descriptors[1].kind, ColumnKind::Number);
    }
}
