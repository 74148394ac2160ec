use crate::workbook::{Column, Row, Sheet};

/// Outcome of a destructive blank-row sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlankRowReport {
    Removed(usize),
    NoneRemoved,
}

impl BlankRowReport {
    pub fn removed(&self) -> usize {
        match self {
            BlankRowReport::Removed(n) => *n,
            BlankRowReport::NoneRemoved => 0,
        }
    }
}

/// Keeps the rows where at least one of the required columns holds a
/// non-blank value. Names that match no column never count as non-blank.
/// With no required names every row is kept.
///
/// This is a view filter: the rows passed in are not modified.
pub fn filter_blank<S: AsRef<str>>(rows: &[Row], columns: &[Column], required: &[S]) -> Vec<Row> {
    if required.is_empty() {
        return rows.to_vec();
    }
    let indices: Vec<Option<usize>> = required
        .iter()
        .map(|name| columns.iter().position(|c| c.name == name.as_ref()))
        .collect();
    rows.iter()
        .filter(|row| {
            indices
                .iter()
                .flatten()
                .any(|&i| row.get(i).is_some_and(|cell| !cell.is_blank()))
        })
        .cloned()
        .collect()
}

/// Drops every row whose cells are all blank.
pub fn strip_blank_rows(sheet: &mut Sheet) -> BlankRowReport {
    let before = sheet.rows.len();
    sheet.rows.retain(|row| row.iter().any(|cell| !cell.is_blank()));
    match before - sheet.rows.len() {
        0 => BlankRowReport::NoneRemoved,
        n => BlankRowReport::Removed(n),
    }
}
