//! Projection of a sheet into the column, editor, validator and formatter
//! description a table renderer consumes. Nothing here owns sheet data.

use crate::coerce::{DataType, parse_number};
use crate::error::EditError;
use crate::value::CellValue;
use crate::workbook::Sheet;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_PAGE_SIZE: usize = 10;

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref DATETIME_PATTERN: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$").unwrap();
    static ref TIME_PATTERN: Regex = Regex::new(r"^\d{2}:\d{2}(:\d{2})?$").unwrap();
}

const TRUTHY: [&str; 6] = ["1", "0", "true", "false", "yes", "no"];

/// Dropdown settings for one column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DropdownColumn {
    pub enabled: bool,
    pub values: Vec<String>,
}

/// Per sheet, per column index dropdown flags and custom choice lists.
/// Kept beside the workbook, not inside it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DropdownState {
    sheets: HashMap<String, BTreeMap<usize, DropdownColumn>>,
}

impl DropdownState {
    pub fn set_enabled(&mut self, sheet: &str, column: usize, enabled: bool) {
        self.entry(sheet, column).enabled = enabled;
    }

    pub fn set_values(&mut self, sheet: &str, column: usize, values: Vec<String>) {
        self.entry(sheet, column).values = values;
    }

    pub fn is_enabled(&self, sheet: &str, column: usize) -> bool {
        self.get(sheet, column).is_some_and(|d| d.enabled)
    }

    pub fn values(&self, sheet: &str, column: usize) -> &[String] {
        self.get(sheet, column)
            .map(|d| d.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, sheet: &str, column: usize) -> Option<&DropdownColumn> {
        self.sheets.get(sheet).and_then(|cols| cols.get(&column))
    }

    /// Keeps flags attached to the same columns after `deleted` indices
    /// are removed from `sheet`.
    pub fn columns_deleted(&mut self, sheet: &str, deleted: &[usize]) {
        let Some(columns) = self.sheets.get_mut(sheet) else {
            return;
        };
        let deleted: HashSet<usize> = deleted.iter().copied().collect();
        let shifted: BTreeMap<usize, DropdownColumn> = std::mem::take(columns)
            .into_iter()
            .filter(|(index, _)| !deleted.contains(index))
            .map(|(index, settings)| {
                let shift = deleted.iter().filter(|&&d| d < index).count();
                (index - shift, settings)
            })
            .collect();
        *columns = shifted;
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
    }

    fn entry(&mut self, sheet: &str, column: usize) -> &mut DropdownColumn {
        self.sheets
            .entry(sheet.to_string())
            .or_default()
            .entry(column)
            .or_default()
    }
}

/// UI mode flags the projection depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct PresentationMode {
    pub edit_mode: bool,
    pub page_size: usize,
    pub dropdowns: DropdownState,
}

impl Default for PresentationMode {
    fn default() -> Self {
        PresentationMode {
            edit_mode: false,
            page_size: DEFAULT_PAGE_SIZE,
            dropdowns: DropdownState::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditorKind {
    NumericInput,
    Toggle,
    PlainText,
    Choice(Vec<String>),
}

/// Format check applied to a cell for its column's declared type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Validator {
    Any,
    Numeric,
    Truthy,
    Date,
    Datetime,
    Time,
}

impl Validator {
    pub fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::String => Validator::Any,
            DataType::Number => Validator::Numeric,
            DataType::Boolean => Validator::Truthy,
            DataType::Date => Validator::Date,
            DataType::Datetime => Validator::Datetime,
            DataType::Time => Validator::Time,
        }
    }

    /// Blank cells always pass.
    pub fn accepts(&self, value: &CellValue) -> bool {
        if value.is_blank() {
            return true;
        }
        match (self, value) {
            (Validator::Any, _) => true,
            (Validator::Numeric, CellValue::Number(n)) => !n.is_nan(),
            (Validator::Numeric, CellValue::Text(s)) => parse_number(s).is_some(),
            (Validator::Truthy, CellValue::Number(n)) => *n == 0.0 || *n == 1.0,
            (Validator::Truthy, CellValue::Text(s)) => {
                TRUTHY.contains(&s.trim().to_ascii_lowercase().as_str())
            }
            (Validator::Date, CellValue::Text(s)) => DATE_PATTERN.is_match(s.trim()),
            (Validator::Datetime, CellValue::Text(s)) => DATETIME_PATTERN.is_match(s.trim()),
            (Validator::Time, CellValue::Text(s)) => TIME_PATTERN.is_match(s.trim()),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub index: usize,
    pub field: String,
    pub title: String,
    pub data_type: DataType,
    pub editor: EditorKind,
    pub validator: Validator,
    pub editable: bool,
}

impl ColumnSpec {
    /// Display text for a cell in this column.
    pub fn format(&self, value: &CellValue) -> String {
        match (self.data_type, value) {
            (_, CellValue::Number(n)) if n.is_nan() => String::new(),
            (DataType::Boolean, CellValue::Number(n)) => (*n != 0.0).to_string(),
            _ => value.display(),
        }
    }

    /// Turns text typed into this column's editor into a cell value.
    pub fn parse_input(&self, input: &str) -> CellValue {
        if input.trim().is_empty() {
            return CellValue::Null;
        }
        match self.editor {
            EditorKind::NumericInput => match parse_number(input) {
                Some(n) => CellValue::Number(n),
                None => CellValue::text(input),
            },
            EditorKind::Toggle => match input.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => CellValue::Number(1.0),
                "0" | "false" | "no" | "off" => CellValue::Number(0.0),
                _ => CellValue::text(input),
            },
            EditorKind::PlainText | EditorKind::Choice(_) => CellValue::text(input),
        }
    }
}

/// A cell edit committed through a rendered table.
#[derive(Clone, Debug, PartialEq)]
pub struct CellEdit {
    pub sheet: String,
    pub row: usize,
    pub column: usize,
    pub value: CellValue,
}

/// Renderable view of one sheet. Borrows the sheet; recompute it whenever
/// the sheet or the mode changes.
#[derive(Clone, Debug)]
pub struct TableModel<'a> {
    sheet: &'a Sheet,
    pub columns: Vec<ColumnSpec>,
    pub page_size: usize,
    pub edit_mode: bool,
}

pub fn project<'a>(sheet: &'a Sheet, mode: &PresentationMode) -> TableModel<'a> {
    let columns = sheet
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let editor = if mode.dropdowns.is_enabled(&sheet.sheet_name, index) {
                EditorKind::Choice(choices(sheet, index, mode.dropdowns.values(&sheet.sheet_name, index)))
            } else {
                match column.data_type {
                    DataType::Number => EditorKind::NumericInput,
                    DataType::Boolean => EditorKind::Toggle,
                    _ => EditorKind::PlainText,
                }
            };
            ColumnSpec {
                index,
                field: column.name.clone(),
                title: format!("{} ({})", column.name, column.data_type),
                data_type: column.data_type,
                editor,
                validator: Validator::for_type(column.data_type),
                editable: mode.edit_mode && column.formula.is_none(),
            }
        })
        .collect();
    TableModel {
        sheet,
        columns,
        page_size: mode.page_size.max(1),
        edit_mode: mode.edit_mode,
    }
}

/// Custom values when configured, otherwise the distinct non-blank values
/// already in the column in order of first appearance.
fn choices(sheet: &Sheet, column: usize, custom: &[String]) -> Vec<String> {
    if !custom.is_empty() {
        return custom.to_vec();
    }
    let mut seen = HashSet::new();
    sheet
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|cell| !cell.is_blank())
        .map(CellValue::display)
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

impl<'a> TableModel<'a> {
    pub fn sheet_name(&self) -> &str {
        &self.sheet.sheet_name
    }

    pub fn row_count(&self) -> usize {
        self.sheet.rows.len()
    }

    pub fn page_count(&self) -> usize {
        self.row_count().div_ceil(self.page_size).max(1)
    }

    /// Formatted cells of page `page` (0-based) paired with their row index.
    pub fn page(&self, page: usize) -> Vec<(usize, Vec<String>)> {
        self.sheet
            .rows
            .iter()
            .enumerate()
            .skip(page * self.page_size)
            .take(self.page_size)
            .map(|(index, row)| {
                let cells = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(spec, cell)| spec.format(cell))
                    .collect();
                (index, cells)
            })
            .collect()
    }

    /// Positions of cells failing their column validator.
    pub fn invalid_cells(&self) -> Vec<(usize, usize)> {
        let mut invalid = Vec::new();
        for (r, row) in self.sheet.rows.iter().enumerate() {
            for (spec, cell) in self.columns.iter().zip(row.iter()) {
                if !spec.validator.accepts(cell) {
                    invalid.push((r, spec.index));
                }
            }
        }
        invalid
    }

    /// Builds the edit event for typed input, checking bounds and mode.
    pub fn commit(&self, row: usize, column: usize, input: &str) -> Result<CellEdit, EditError> {
        let spec = self.columns.get(column).ok_or_else(|| EditError::ColumnOutOfRange {
            sheet: self.sheet.sheet_name.clone(),
            index: column,
            len: self.columns.len(),
        })?;
        if row >= self.row_count() {
            return Err(EditError::RowOutOfRange {
                sheet: self.sheet.sheet_name.clone(),
                index: row,
                len: self.row_count(),
            });
        }
        if !spec.editable {
            return Err(EditError::NotEditable(spec.field.clone()));
        }
        Ok(CellEdit {
            sheet: self.sheet.sheet_name.clone(),
            row,
            column,
            value: spec.parse_input(input),
        })
    }
}

/// Narrow seam over a table-rendering backend.
pub trait TableRenderer {
    type Handle;

    fn render(&mut self, model: &TableModel<'_>) -> Self::Handle;

    fn dispose(&mut self, handle: Self::Handle);
}

/// Holds at most one live rendered table; the previous one is always
/// disposed before a new one is created.
pub struct TableHost<R: TableRenderer> {
    renderer: R,
    live: Option<R::Handle>,
}

impl<R: TableRenderer> TableHost<R> {
    pub fn new(renderer: R) -> Self {
        TableHost {
            renderer,
            live: None,
        }
    }

    pub fn refresh(&mut self, model: &TableModel<'_>) {
        self.teardown();
        self.live = Some(self.renderer.render(model));
    }

    pub fn teardown(&mut self) {
        if let Some(handle) = self.live.take() {
            self.renderer.dispose(handle);
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl<R: TableRenderer> Drop for TableHost<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Plain-text table renderer for terminals.
#[derive(Debug, Default)]
pub struct TextRenderer {
    pub page: usize,
    output: String,
    next_handle: usize,
}

impl TextRenderer {
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl TableRenderer for TextRenderer {
    type Handle = usize;

    fn render(&mut self, model: &TableModel<'_>) -> usize {
        let mut out = String::new();
        let page = self.page.min(model.page_count() - 1);
        out.push_str(&format!(
            "[{}] page {}/{} ({} rows){}\n",
            model.sheet_name(),
            page + 1,
            model.page_count(),
            model.row_count(),
            if model.edit_mode { " edit" } else { "" }
        ));
        out.push('\t');
        for spec in &model.columns {
            let marker = if matches!(spec.editor, EditorKind::Choice(_)) { "*" } else { "" };
            out.push_str(&format!("{:<20}", format!("{}{}", spec.title, marker)));
        }
        out.push('\n');
        let invalid: HashSet<(usize, usize)> = model.invalid_cells().into_iter().collect();
        for (index, cells) in model.page(page) {
            out.push_str(&format!("{}\t", index));
            for (column, text) in cells.iter().enumerate() {
                let shown = if invalid.contains(&(index, column)) {
                    format!("!{}", text)
                } else {
                    text.clone()
                };
                out.push_str(&format!("{:<20}", shown));
            }
            out.push('\n');
        }
        self.output = out;
        self.next_handle += 1;
        self.next_handle
    }

    fn dispose(&mut self, _handle: usize) {
        self.output.clear();
    }
}
