use crate::cell::{CellValue, ParsedRow};
use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;
use thiserror::Error;

/// Errors produced while turning uploaded bytes into rows.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// The bytes are not a spreadsheet container this reader understands.
    #[error("could not read workbook: {0}")]
    UnreadableWorkbook(String),
}

/// The first worksheet flattened into header-keyed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    /// Column headers in worksheet order, made unique and non-blank.
    pub headers: Vec<String>,

    /// One entry per data row; the header row itself is consumed.
    pub rows: Vec<ParsedRow>,
}

impl SheetData {
    /// Whether the sheet produced no data rows ("no data found", not an error).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Flatten the first sheet of a workbook into a row-major matrix.
///
/// The first row of the result is the header row when the sheet has one;
/// subsequent sheets in the workbook are ignored. A workbook whose first
/// sheet has no rows yields an empty matrix rather than an error.
///
/// # Arguments
/// * `bytes` - The raw `.xls`/`.xlsx` file contents
///
/// # Returns
/// * `Result<Vec<Vec<CellValue>>, FlattenError>` - The matrix, or
///   `UnreadableWorkbook` if the bytes are not a valid spreadsheet
pub fn flatten_matrix(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, FlattenError> {
    first_sheet(bytes)
}

/// Flatten the first sheet of a workbook into one object per data row,
/// keyed by the headers taken from the first row.
///
/// A blank header becomes `Column N` (1-based position) and a duplicate
/// header gets a ` (n)` suffix, so every row key is unique. A sheet with
/// only a header row succeeds with `rows = []`.
///
/// # Arguments
/// * `bytes` - The raw `.xls`/`.xlsx` file contents
///
/// # Returns
/// * `Result<SheetData, FlattenError>` - Headers plus parsed rows, or
///   `UnreadableWorkbook` if the bytes are not a valid spreadsheet
pub fn flatten_objects(bytes: &[u8]) -> Result<SheetData, FlattenError> {
    let matrix = first_sheet(bytes)?;
    let mut rows_iter = matrix.into_iter();

    let header_row = match rows_iter.next() {
        Some(row) => row,
        None => {
            return Ok(SheetData {
                headers: Vec::new(),
                rows: Vec::new(),
            });
        }
    };

    let headers = unique_headers(&header_row);

    let rows = rows_iter
        .map(|row| {
            let mut parsed = ParsedRow::with_capacity(headers.len());
            for (i, name) in headers.iter().enumerate() {
                let value = row.get(i).cloned().unwrap_or(CellValue::Empty);
                parsed.insert(name.clone(), value);
            }
            parsed
        })
        .collect();

    Ok(SheetData { headers, rows })
}

/// Read the first worksheet into cell values, row by row.
fn first_sheet(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, FlattenError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| FlattenError::UnreadableWorkbook(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(FlattenError::UnreadableWorkbook(e.to_string())),
        // A workbook with no sheets at all is "no data", not a parse failure
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect())
}

/// Turn a raw header row into unique, non-blank column names.
fn unique_headers(header_row: &[CellValue]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(header_row.len());

    for (i, cell) in header_row.iter().enumerate() {
        let base = match cell {
            c if c.is_blank() => format!("Column {}", i + 1),
            other => other.to_string(),
        };

        let mut name = base.clone();
        let mut suffix = 2;
        while headers.contains(&name) {
            name = format!("{} ({})", base, suffix);
            suffix += 1;
        }
        headers.push(name);
    }

    headers
}
