use crate::coerce::{DataType, coerce_cell, parse_clock, parse_instant, parse_number};
use crate::envelope::parse_workbook_response;
use crate::error::ServiceError;
use crate::value::CellValue;
use crate::workbook::{Column, Sheet, Workbook};
use log::{debug, warn};
use std::path::Path;

/// Builds a single-sheet workbook from CSV text.
///
/// The first record names the columns. Each column's type is inferred from
/// its non-blank cells and the cells are coerced to that type; blank cells
/// stay `Null`. Quoted fields may span lines. Short records are padded and
/// long ones truncated with a warning; an unterminated quote rejects the
/// whole text.
pub fn from_csv(sheet_name: &str, text: &str) -> Result<Workbook, ServiceError> {
    if has_unclosed_quote(text) {
        warn!("CSV '{}' ends inside a quoted field", sheet_name);
        return Err(ServiceError::Unreadable(sheet_name.to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let names: Vec<String> = match records.next() {
        Some(header) => header?.iter().map(String::from).collect(),
        None => return Err(ServiceError::Unreadable(sheet_name.to_string())),
    };

    let mut raw_rows: Vec<Vec<CellValue>> = Vec::new();
    for record in records {
        let record = record?;
        if record.len() > names.len() {
            warn!(
                "CSV '{}' record {} has {} fields, expected {}; extra fields dropped",
                sheet_name,
                raw_rows.len() + 2,
                record.len(),
                names.len()
            );
        }
        let mut cells: Vec<CellValue> = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    CellValue::Null
                } else {
                    CellValue::text(field)
                }
            })
            .collect();
        cells.resize(names.len(), CellValue::Null);
        raw_rows.push(cells);
    }

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = match name.trim() {
                "" => format!("Column {}", i + 1),
                trimmed => trimmed.to_string(),
            };
            Column::new(name, detect_type(raw_rows.iter().map(|row| &row[i])))
        })
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(columns.iter())
                .map(|(cell, column)| match (column.data_type, cell) {
                    (_, CellValue::Null) => CellValue::Null,
                    (DataType::Boolean, CellValue::Text(s)) => {
                        coerce_cell(&CellValue::Text(s.to_ascii_lowercase()), DataType::Boolean)
                    }
                    (data_type, cell) => coerce_cell(&cell, data_type),
                })
                .collect()
        })
        .collect();

    let sheet = Sheet::new(sheet_name, columns).with_rows(rows);
    debug!(
        "Imported CSV sheet '{}' with {} column(s) and {} row(s)",
        sheet.sheet_name,
        sheet.columns.len(),
        sheet.rows.len()
    );
    Ok(Workbook::from_sheets(vec![sheet]))
}

/// Picks the most specific type every non-blank cell satisfies, falling
/// back to string when cells disagree or the column is empty.
fn detect_type<'a>(cells: impl Iterator<Item = &'a CellValue>) -> DataType {
    let texts: Vec<&str> = cells.filter_map(CellValue::as_text).collect();
    if texts.is_empty() {
        DataType::String
    } else if texts.iter().all(|s| parse_number(s).is_some()) {
        DataType::Number
    } else if texts
        .iter()
        .all(|s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false"))
    {
        DataType::Boolean
    } else if texts.iter().all(|s| is_date_only(s)) {
        DataType::Date
    } else if texts.iter().all(|s| parse_instant(s).is_some()) {
        DataType::Datetime
    } else if texts.iter().all(|s| parse_clock(s).is_some()) {
        DataType::Time
    } else {
        DataType::String
    }
}

fn is_date_only(s: &str) -> bool {
    parse_instant(s).is_some() && !s.contains(':')
}

// Walk the text with the quoting rules: a quote opens a field only at its
// start, and a doubled quote inside a quoted field is literal.
fn has_unclosed_quote(text: &str) -> bool {
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }
        match c {
            '"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            ',' | '\n' | '\r' => at_field_start = true,
            _ => at_field_start = false,
        }
    }
    in_quotes
}

/// Decodes an uploaded file by extension: `.json` bodies may be a workbook
/// or an envelope, `.csv` becomes a single sheet named after the file.
pub fn import_bytes(file_name: &str, bytes: &[u8]) -> Result<Workbook, ServiceError> {
    let path = Path::new(file_name);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    let text = String::from_utf8_lossy(bytes);

    match extension.as_deref() {
        Some("json") => parse_workbook_response(&text)
            .ok_or_else(|| ServiceError::Unreadable(file_name.to_string())),
        Some("csv") => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Sheet1");
            from_csv(stem, &text)
        }
        Some(ext) => Err(ServiceError::UnsupportedFile(ext.to_string())),
        None => Err(ServiceError::UnsupportedFile(file_name.to_string())),
    }
}

/// Reads and decodes a workbook file from disk.
pub fn load_file(path: impl AsRef<Path>) -> Result<Workbook, ServiceError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    import_bytes(name, &bytes)
}
