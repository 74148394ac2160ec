use crate::filter::filter_blank;
use crate::workbook::Sheet;
#[cfg(feature = "xlsx")]
use crate::workbook::Workbook;

/// Convert a sheet to CSV format
///
/// The header line carries the column names. When `required` is given,
/// rows whose required columns are all blank are left out of the export;
/// the sheet itself is not modified.
///
/// # Examples
/// ```
/// use sheetdesk::{Column, DataType, Sheet, CellValue, to_csv};
///
/// let sheet = Sheet::new("S", vec![Column::new("a", DataType::String)])
///     .with_rows(vec![vec![CellValue::text("x,y")]]);
/// assert_eq!(to_csv(&sheet, None), "a\n\"x,y\"\n");
/// ```
pub fn to_csv(sheet: &Sheet, required: Option<&[String]>) -> String {
    let mut csv_content = String::new();

    let names: Vec<String> = sheet.columns.iter().map(|c| escape(&c.name)).collect();
    csv_content.push_str(&names.join(","));
    csv_content.push('\n');

    let filtered;
    let rows = match required {
        Some(required) => {
            filtered = filter_blank(&sheet.rows, &sheet.columns, required);
            &filtered
        }
        None => &sheet.rows,
    };

    for row in rows {
        let fields: Vec<String> = row.iter().map(|cell| escape(&cell.display())).collect();
        csv_content.push_str(&fields.join(","));
        csv_content.push('\n');
    }

    csv_content
}

// Escape commas, quotes, newlines as needed
fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert a workbook to XLSX format, one worksheet per sheet
#[cfg(feature = "xlsx")]
pub fn to_xlsx(workbook: &Workbook) -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    use crate::value::CellValue;

    let mut book = rust_xlsxwriter::Workbook::new();

    for sheet in workbook.sheets() {
        let worksheet = book.add_worksheet();
        worksheet.set_name(&sheet.sheet_name)?;
        for (c, column) in sheet.columns.iter().enumerate() {
            worksheet.write_string(0, c as u16, &column.name)?;
        }
        for (r, row) in sheet.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    CellValue::Number(n) if n.is_finite() => {
                        worksheet.write_number(r, c as u16, *n)?;
                    }
                    CellValue::Text(s) => {
                        worksheet.write_string(r, c as u16, s)?;
                    }
                    _ => {}
                }
            }
        }
    }

    book.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::DataType;
    use crate::value::CellValue;
    use crate::workbook::Column;

    #[test]
    fn exports_filtered_rows() {
        let sheet = Sheet::new(
            "S",
            vec![Column::new("id", DataType::String), Column::new("n", DataType::Number)],
        )
        .with_rows(vec![
            vec![CellValue::text("a"), CellValue::Number(1.0)],
            vec![CellValue::text(" "), CellValue::Number(2.0)],
            vec![CellValue::text("say \"hi\""), CellValue::Number(f64::NAN)],
        ]);
        assert_eq!(
            to_csv(&sheet, Some(&["id".to_string()])),
            "id,n\na,1\n\"say \"\"hi\"\"\",NaN\n"
        );
        assert_eq!(to_csv(&sheet, None).lines().count(), 4);
        assert_eq!(sheet.rows.len(), 3);
    }
}
