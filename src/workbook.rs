use crate::coerce::{DataType, coerce_cell};
use crate::error::EditError;
use crate::filter::{BlankRowReport, strip_blank_rows};
use crate::value::CellValue;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub type Row = Vec<CellValue>;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub formula: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Column {
            name: name.into(),
            data_type,
            format: String::new(),
            formula: None,
        }
    }
}

/// One tab of a workbook. Every row has exactly `columns.len()` cells and
/// cell `i` belongs to `columns[i]`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub sheet_name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(sheet_name: impl Into<String>, columns: Vec<Column>) -> Self {
        Sheet {
            sheet_name: sheet_name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self.normalize();
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Indices of rows whose length disagrees with the column count.
    pub fn misshapen_rows(&self) -> Vec<usize> {
        let width = self.columns.len();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.len() != width)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn validate_shape(&self) -> bool {
        self.misshapen_rows().is_empty()
    }

    /// Pads short rows with `Null` and truncates long ones.
    pub fn normalize(&mut self) -> usize {
        let width = self.columns.len();
        let mut fixed = 0;
        for row in self.rows.iter_mut().filter(|row| row.len() != width) {
            row.resize(width, CellValue::Null);
            fixed += 1;
        }
        if fixed > 0 {
            warn!(
                "Normalized {} row(s) in sheet '{}' to {} column(s)",
                fixed, self.sheet_name, width
            );
        }
        fixed
    }

    fn check_column(&self, index: usize) -> Result<(), EditError> {
        if index < self.columns.len() {
            Ok(())
        } else {
            Err(EditError::ColumnOutOfRange {
                sheet: self.sheet_name.clone(),
                index,
                len: self.columns.len(),
            })
        }
    }

    fn check_row(&self, index: usize) -> Result<(), EditError> {
        if index < self.rows.len() {
            Ok(())
        } else {
            Err(EditError::RowOutOfRange {
                sheet: self.sheet_name.clone(),
                index,
                len: self.rows.len(),
            })
        }
    }

    /// Renames one column and returns its previous name.
    pub fn rename_column(&mut self, index: usize, new_name: &str) -> Result<String, EditError> {
        self.check_column(index)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(EditError::EmptyColumnName);
        }
        if self
            .columns
            .iter()
            .enumerate()
            .any(|(i, c)| i != index && c.name.eq_ignore_ascii_case(new_name))
        {
            return Err(EditError::DuplicateColumnName(new_name.to_string()));
        }
        Ok(std::mem::replace(
            &mut self.columns[index].name,
            new_name.to_string(),
        ))
    }

    pub fn change_column_type(&mut self, index: usize, data_type: DataType) -> Result<(), EditError> {
        self.change_column_types(&[(index, data_type)])
    }

    /// Sets the declared type of every listed column and re-coerces their
    /// cells in a single pass over the rows. A column listed twice takes
    /// its last type.
    pub fn change_column_types(&mut self, changes: &[(usize, DataType)]) -> Result<(), EditError> {
        for &(index, _) in changes {
            self.check_column(index)?;
        }
        let changes: BTreeMap<usize, DataType> = changes.iter().copied().collect();
        for (&index, &data_type) in &changes {
            self.columns[index].data_type = data_type;
        }
        for row in self.rows.iter_mut() {
            for (&index, &data_type) in &changes {
                row[index] = coerce_cell(&row[index], data_type);
            }
        }
        Ok(())
    }

    /// Removes the listed columns from the header and from every row.
    /// Returns how many distinct columns were removed.
    pub fn delete_columns(&mut self, indices: &[usize]) -> Result<usize, EditError> {
        for &index in indices {
            self.check_column(index)?;
        }
        // Sort indices descending to avoid shifting issues during removal
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for &index in &sorted {
            self.columns.remove(index);
            for row in self.rows.iter_mut() {
                row.remove(index);
            }
        }
        Ok(sorted.len())
    }

    pub fn delete_row(&mut self, index: usize) -> Result<Row, EditError> {
        self.check_row(index)?;
        Ok(self.rows.remove(index))
    }

    /// Promotes a data row to the header. Blank cells become `Column N` and
    /// repeated names get a numeric suffix so names stay unique.
    pub fn use_row_as_header(&mut self, index: usize) -> Result<(), EditError> {
        self.check_row(index)?;
        let header = self.rows.remove(index);
        let mut seen: HashSet<String> = HashSet::new();
        for (i, (column, cell)) in self.columns.iter_mut().zip(header.iter()).enumerate() {
            let base = match coerce_cell(cell, DataType::String).display().trim() {
                "" => format!("Column {}", i + 1),
                name => name.to_string(),
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.to_ascii_lowercase()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            column.name = name;
        }
        Ok(())
    }

    /// Replaces one cell verbatim and returns the previous value. No
    /// coercion happens here; the column editor is trusted.
    pub fn edit_cell(
        &mut self,
        row: usize,
        column: usize,
        value: CellValue,
    ) -> Result<CellValue, EditError> {
        self.check_row(row)?;
        self.check_column(column)?;
        Ok(std::mem::replace(&mut self.rows[row][column], value))
    }

    pub fn add_row(&mut self) -> usize {
        self.rows.push(vec![CellValue::Null; self.columns.len()]);
        self.rows.len() - 1
    }
}

/// A collection of sheets, looked up by name.
///
/// Sheets are shared behind `Arc`, so cloning a workbook is cheap and a
/// mutation only copies the one sheet it touches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Arc<Sheet>>,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::default()
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Workbook {
            sheets: sheets
                .into_iter()
                .map(|mut sheet| {
                    sheet.normalize();
                    Arc::new(sheet)
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter().map(|s| s.as_ref())
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.sheet_name.as_str()).collect()
    }

    /// First sheet carrying `name`.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.sheet_name == name)
            .map(|s| s.as_ref())
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first().map(|s| s.as_ref())
    }

    /// Whether both workbooks still share the same allocation for `name`.
    pub fn shares_sheet_with(&self, other: &Workbook, name: &str) -> bool {
        let find = |wb: &Workbook| wb.sheets.iter().find(|s| s.sheet_name == name).cloned();
        match (find(self), find(other)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet, EditError> {
        let position = self
            .sheets
            .iter()
            .position(|s| s.sheet_name == name)
            .ok_or_else(|| EditError::SheetNotFound(name.to_string()))?;
        Ok(Arc::make_mut(&mut self.sheets[position]))
    }

    fn sheet_ref(&self, name: &str) -> Result<&Sheet, EditError> {
        self.sheet(name)
            .ok_or_else(|| EditError::SheetNotFound(name.to_string()))
    }

    pub fn rename_column(&mut self, sheet: &str, column: usize, new_name: &str) -> Result<(), EditError> {
        self.sheet_ref(sheet)?.check_column(column)?;
        let old = self.sheet_mut(sheet)?.rename_column(column, new_name)?;
        debug!("Renamed column {} in '{}' from '{}' to '{}'", column, sheet, old, new_name.trim());
        Ok(())
    }

    pub fn change_column_type(
        &mut self,
        sheet: &str,
        column: usize,
        data_type: DataType,
    ) -> Result<(), EditError> {
        self.change_column_types(sheet, &[(column, data_type)])
    }

    pub fn change_column_types(
        &mut self,
        sheet: &str,
        changes: &[(usize, DataType)],
    ) -> Result<(), EditError> {
        let target = self.sheet_ref(sheet)?;
        for &(index, _) in changes {
            target.check_column(index)?;
        }
        self.sheet_mut(sheet)?.change_column_types(changes)?;
        debug!("Changed {} column type(s) in '{}'", changes.len(), sheet);
        Ok(())
    }

    pub fn delete_columns(&mut self, sheet: &str, columns: &[usize]) -> Result<usize, EditError> {
        let target = self.sheet_ref(sheet)?;
        for &index in columns {
            target.check_column(index)?;
        }
        let removed = self.sheet_mut(sheet)?.delete_columns(columns)?;
        debug!("Deleted {} column(s) from '{}'", removed, sheet);
        Ok(removed)
    }

    pub fn delete_row(&mut self, sheet: &str, row: usize) -> Result<Row, EditError> {
        self.sheet_ref(sheet)?.check_row(row)?;
        let removed = self.sheet_mut(sheet)?.delete_row(row)?;
        debug!("Deleted row {} from '{}'", row, sheet);
        Ok(removed)
    }

    pub fn use_row_as_header(&mut self, sheet: &str, row: usize) -> Result<(), EditError> {
        self.sheet_ref(sheet)?.check_row(row)?;
        self.sheet_mut(sheet)?.use_row_as_header(row)?;
        debug!("Promoted row {} of '{}' to header", row, sheet);
        Ok(())
    }

    pub fn edit_cell(
        &mut self,
        sheet: &str,
        row: usize,
        column: usize,
        value: CellValue,
    ) -> Result<CellValue, EditError> {
        let target = self.sheet_ref(sheet)?;
        target.check_row(row)?;
        target.check_column(column)?;
        self.sheet_mut(sheet)?.edit_cell(row, column, value)
    }

    pub fn add_row(&mut self, sheet: &str) -> Result<usize, EditError> {
        Ok(self.sheet_mut(sheet)?.add_row())
    }

    pub fn strip_blank_rows(&mut self, sheet: &str) -> Result<BlankRowReport, EditError> {
        let report = strip_blank_rows(self.sheet_mut(sheet)?);
        debug!("Blank row removal on '{}': {:?}", sheet, report);
        Ok(report)
    }
}

#[derive(Serialize)]
struct WorkbookOut<'a> {
    sheets: &'a [Arc<Sheet>],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkbookIn {
    Wrapped { sheets: Vec<Sheet> },
    Bare(Vec<Sheet>),
}

impl Serialize for Workbook {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        WorkbookOut {
            sheets: &self.sheets,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Workbook {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sheets = match WorkbookIn::deserialize(deserializer)? {
            WorkbookIn::Wrapped { sheets } | WorkbookIn::Bare(sheets) => sheets,
        };
        Ok(Workbook::from_sheets(sheets))
    }
}
