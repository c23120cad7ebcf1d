use crate::cell::CellValue;
use crate::ledger::UploadRecord;

/// Convert a stored upload back to CSV for download.
///
/// The header row comes from the record's column order; values are written
/// with commas, quotes and newlines escaped.
///
/// # Arguments
/// * `record` - The upload to export
///
/// # Returns
/// * `String` - The CSV content
pub fn to_csv(record: &UploadRecord) -> String {
    let mut csv_content = String::new();

    let headers: Vec<&String> = record
        .data
        .first()
        .map(|row| row.keys().collect())
        .unwrap_or_default();

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            csv_content.push(',');
        }
        csv_content.push_str(&escape_field(header));
    }
    csv_content.push('\n');

    for row in &record.data {
        for (i, header) in headers.iter().enumerate() {
            if i > 0 {
                csv_content.push(',');
            }
            let value = row.get(*header).unwrap_or(&CellValue::Empty);
            csv_content.push_str(&escape_field(&value.to_string()));
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Quote a field when it contains a comma, quote or newline.
fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}
