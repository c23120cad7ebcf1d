use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single worksheet value, as stored by the spreadsheet reader.
///
/// Serialized untagged so that persisted rows look like plain JSON:
/// `Empty` becomes `null`, numbers stay numbers, text stays text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
}

/// One data row keyed by column header, in worksheet header order.
pub type ParsedRow = IndexMap<String, CellValue>;

impl CellValue {
    /// Whether the cell carries no usable value (absent or empty string).
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&calamine::Data> for CellValue {
    fn from(data: &calamine::Data) -> Self {
        use calamine::Data;

        match data {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(naive) => CellValue::Text(naive.to_string()),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            // Cell-level errors (#DIV/0! and friends) carry no usable value
            Data::Error(_) => CellValue::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text(String::new()).is_blank());
        assert!(!CellValue::Text(" ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert!(!CellValue::Bool(false).is_blank());
    }

    #[test]
    fn serializes_as_plain_json() {
        let mut row = ParsedRow::new();
        row.insert("Region".to_string(), CellValue::Text("East".to_string()));
        row.insert("Sales".to_string(), CellValue::Number(100.0));
        row.insert("Notes".to_string(), CellValue::Empty);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Region":"East","Sales":100.0,"Notes":null}"#);

        let back: ParsedRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn calamine_conversion() {
        use calamine::Data;

        assert_eq!(CellValue::from(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(CellValue::from(&Data::Float(2.5)), CellValue::Number(2.5));
        assert_eq!(
            CellValue::from(&Data::String("abc".to_string())),
            CellValue::Text("abc".to_string())
        );
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
    }
}
