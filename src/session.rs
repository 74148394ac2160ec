//! Editor session state: the open workbook, its identifier, presentation
//! mode and the service it came from. One value per editor, passed
//! explicitly; nothing here is global.

use crate::coerce::DataType;
use crate::downloader::to_csv;
use crate::envelope::unwrap_response;
use crate::error::{EditError, SessionError};
use crate::filter::{BlankRowReport, filter_blank};
use crate::present::{CellEdit, PresentationMode, TableModel, project};
use crate::service::{SessionContext, WorkbookService, WorkbookSummary};
use crate::value::CellValue;
use crate::workbook::{Row, Sheet, Workbook};
use log::{info, warn};
use std::path::Path;

pub struct EditorSession<S: WorkbookService> {
    service: S,
    ctx: SessionContext,
    workbook: Option<Workbook>,
    workbook_id: Option<String>,
    name: Option<String>,
    mode: PresentationMode,
    row_filter: Vec<String>,
}

impl<S: WorkbookService> EditorSession<S> {
    pub fn new(service: S, ctx: SessionContext) -> Self {
        EditorSession {
            service,
            ctx,
            workbook: None,
            workbook_id: None,
            name: None,
            mode: PresentationMode::default(),
            row_filter: Vec::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.mode.page_size = page_size.max(1);
        self
    }

    pub fn workbook(&self) -> Option<&Workbook> {
        self.workbook.as_ref()
    }

    pub fn workbook_id(&self) -> Option<&str> {
        self.workbook_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mode(&self) -> &PresentationMode {
        &self.mode
    }

    pub fn list(&self) -> Result<Vec<WorkbookSummary>, SessionError> {
        Ok(self.service.list(&self.ctx)?)
    }

    /// Loads workbook `id`. Returns `false` when the service answered but
    /// the body held no usable workbook; the session is then left empty.
    /// A failed fetch leaves the current workbook open.
    pub fn open(&mut self, id: &str) -> Result<bool, SessionError> {
        let body = self.service.fetch(&self.ctx, id)?;
        self.close();
        let Some(loaded) = unwrap_response(&body) else {
            warn!("Workbook {} returned no data", id);
            return Ok(false);
        };
        let name = loaded.name.unwrap_or_else(|| id.to_string());
        self.install(loaded.workbook, Some(loaded.id.unwrap_or_else(|| id.to_string())), name);
        Ok(true)
    }

    /// Uploads a file through the service and opens the resulting workbook.
    pub fn import(&mut self, file_name: &str, bytes: &[u8]) -> Result<bool, SessionError> {
        let body = self.service.import(&self.ctx, file_name, bytes)?;
        self.close();
        let Some(loaded) = unwrap_response(&body) else {
            warn!("Import of '{}' returned no data", file_name);
            return Ok(false);
        };
        let name = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        self.install(loaded.workbook, loaded.id, name);
        Ok(true)
    }

    /// Opens a workbook that has not been stored yet. The first `save`
    /// assigns it an identifier.
    pub fn load(&mut self, workbook: Workbook, name: &str) {
        self.close();
        self.install(workbook, None, name.to_string());
    }

    fn install(&mut self, workbook: Workbook, id: Option<String>, name: String) {
        info!(
            "Opened '{}' with {} sheet(s): {}",
            name,
            workbook.len(),
            workbook.sheet_names().join(", ")
        );
        self.workbook = Some(workbook);
        self.workbook_id = id;
        self.name = Some(name);
    }

    pub fn close(&mut self) {
        self.workbook = None;
        self.workbook_id = None;
        self.name = None;
        self.row_filter.clear();
        self.mode.dropdowns.clear();
    }

    /// Stores the current workbook and returns its identifier.
    pub fn save(&mut self) -> Result<String, SessionError> {
        let workbook = self.workbook.as_ref().ok_or(SessionError::NoWorkbook)?;
        let name = self.name.as_deref().unwrap_or("Untitled");
        let id = self
            .service
            .store(&self.ctx, self.workbook_id.as_deref(), name, workbook)?;
        info!("Saved '{}' as {}", name, id);
        self.workbook_id = Some(id.clone());
        Ok(id)
    }

    fn workbook_mut(&mut self) -> Result<&mut Workbook, SessionError> {
        self.workbook.as_mut().ok_or(SessionError::NoWorkbook)
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet, SessionError> {
        let workbook = self.workbook.as_ref().ok_or(SessionError::NoWorkbook)?;
        Ok(workbook
            .sheet(name)
            .ok_or_else(|| EditError::SheetNotFound(name.to_string()))?)
    }

    /// Projects `sheet` through the current presentation mode.
    pub fn project(&self, sheet: &str) -> Result<TableModel<'_>, SessionError> {
        Ok(project(self.sheet(sheet)?, &self.mode))
    }

    pub fn apply_edit(&mut self, edit: CellEdit) -> Result<CellValue, SessionError> {
        let CellEdit { sheet, row, column, value } = edit;
        Ok(self.workbook_mut()?.edit_cell(&sheet, row, column, value)?)
    }

    /// Parses typed input the way the rendered table would and applies it.
    pub fn commit(
        &mut self,
        sheet: &str,
        row: usize,
        column: usize,
        input: &str,
    ) -> Result<CellValue, SessionError> {
        let edit = self.project(sheet)?.commit(row, column, input)?;
        self.apply_edit(edit)
    }

    pub fn set_edit_mode(&mut self, enabled: bool) {
        self.mode.edit_mode = enabled;
    }

    /// Turns the dropdown editor on or off for a column. `values` replaces
    /// the custom choice list when given.
    pub fn set_dropdown(
        &mut self,
        sheet: &str,
        column: usize,
        enabled: bool,
        values: Option<Vec<String>>,
    ) -> Result<(), SessionError> {
        let target = self.sheet(sheet)?;
        if column >= target.columns.len() {
            return Err(EditError::ColumnOutOfRange {
                sheet: sheet.to_string(),
                index: column,
                len: target.columns.len(),
            }
            .into());
        }
        self.mode.dropdowns.set_enabled(sheet, column, enabled);
        if let Some(values) = values {
            self.mode.dropdowns.set_values(sheet, column, values);
        }
        Ok(())
    }

    pub fn rename_column(&mut self, sheet: &str, column: usize, name: &str) -> Result<(), SessionError> {
        Ok(self.workbook_mut()?.rename_column(sheet, column, name)?)
    }

    pub fn change_column_type(
        &mut self,
        sheet: &str,
        column: usize,
        data_type: DataType,
    ) -> Result<(), SessionError> {
        Ok(self.workbook_mut()?.change_column_type(sheet, column, data_type)?)
    }

    pub fn change_column_types(
        &mut self,
        sheet: &str,
        changes: &[(usize, DataType)],
    ) -> Result<(), SessionError> {
        Ok(self.workbook_mut()?.change_column_types(sheet, changes)?)
    }

    pub fn delete_columns(&mut self, sheet: &str, columns: &[usize]) -> Result<usize, SessionError> {
        let removed = self.workbook_mut()?.delete_columns(sheet, columns)?;
        self.mode.dropdowns.columns_deleted(sheet, columns);
        Ok(removed)
    }

    pub fn delete_row(&mut self, sheet: &str, row: usize) -> Result<Row, SessionError> {
        Ok(self.workbook_mut()?.delete_row(sheet, row)?)
    }

    pub fn use_row_as_header(&mut self, sheet: &str, row: usize) -> Result<(), SessionError> {
        Ok(self.workbook_mut()?.use_row_as_header(sheet, row)?)
    }

    pub fn add_row(&mut self, sheet: &str) -> Result<usize, SessionError> {
        Ok(self.workbook_mut()?.add_row(sheet)?)
    }

    pub fn strip_blank_rows(&mut self, sheet: &str) -> Result<BlankRowReport, SessionError> {
        Ok(self.workbook_mut()?.strip_blank_rows(sheet)?)
    }

    /// Column names a row must fill at least one of to appear in exports.
    pub fn set_row_filter(&mut self, required: Vec<String>) {
        self.row_filter = required;
    }

    pub fn row_filter(&self) -> &[String] {
        &self.row_filter
    }

    /// Rows of `sheet` that pass the row filter. The sheet is not modified.
    pub fn filtered_rows(&self, sheet: &str) -> Result<Vec<Row>, SessionError> {
        let target = self.sheet(sheet)?;
        Ok(filter_blank(&target.rows, &target.columns, &self.row_filter))
    }

    pub fn export_csv(&self, sheet: &str) -> Result<String, SessionError> {
        let target = self.sheet(sheet)?;
        let required = (!self.row_filter.is_empty()).then_some(self.row_filter.as_slice());
        Ok(to_csv(target, required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::LocalStore;

    fn session(dir: &tempfile::TempDir) -> EditorSession<LocalStore> {
        EditorSession::new(LocalStore::new(dir.path()), SessionContext::new("t", "acme"))
    }

    const CSV: &[u8] = b"name,qty,kind\nbolt,4,a\n,,\nnut,7,b\n";

    #[test]
    fn dropdowns_follow_deleted_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        assert!(session.import("parts.csv", CSV).unwrap());

        session.set_dropdown("parts", 2, true, None).unwrap();
        session.delete_columns("parts", &[0]).unwrap();
        assert!(session.mode().dropdowns.is_enabled("parts", 1));
        assert!(!session.mode().dropdowns.is_enabled("parts", 2));
    }

    #[test]
    fn commit_respects_edit_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.import("parts.csv", CSV).unwrap();

        assert!(matches!(
            session.commit("parts", 0, 1, "9"),
            Err(SessionError::Edit(EditError::NotEditable(_)))
        ));
        session.set_edit_mode(true);
        assert_eq!(session.commit("parts", 0, 1, "9").unwrap(), CellValue::Number(4.0));
        assert_eq!(session.sheet("parts").unwrap().rows[0][1], CellValue::Number(9.0));
    }

    #[test]
    fn export_applies_row_filter_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.import("parts.csv", CSV).unwrap();

        session.set_row_filter(vec!["name".to_string()]);
        assert_eq!(session.filtered_rows("parts").unwrap().len(), 2);
        assert_eq!(session.export_csv("parts").unwrap(), "name,qty,kind\nbolt,4,a\nnut,7,b\n");
        assert_eq!(session.sheet("parts").unwrap().rows.len(), 3);
    }

    struct SingleBook(String);

    impl WorkbookService for SingleBook {
        fn list(&self, _: &SessionContext) -> Result<Vec<WorkbookSummary>, ServiceError> {
            Err(ServiceError::Unauthorized)
        }
        fn fetch(&self, _: &SessionContext, id: &str) -> Result<String, ServiceError> {
            match id {
                "1" => Ok(self.0.clone()),
                _ => Err(ServiceError::NotFound(id.to_string())),
            }
        }
        fn import(&self, _: &SessionContext, name: &str, _: &[u8]) -> Result<String, ServiceError> {
            Err(ServiceError::UnsupportedFile(name.to_string()))
        }
        fn store(
            &self,
            _: &SessionContext,
            _: Option<&str>,
            name: &str,
            _: &Workbook,
        ) -> Result<String, ServiceError> {
            Err(ServiceError::NotFound(name.to_string()))
        }
    }

    #[test]
    fn open_takes_the_name_from_the_response() {
        let body = crate::envelope::wrap_envelope("1", "Ledger", &Workbook::new()).unwrap();
        let mut session = EditorSession::new(SingleBook(body), SessionContext::new("t", "acme"));

        assert!(session.open("1").unwrap());
        assert_eq!(session.name(), Some("Ledger"));
        assert_eq!(session.workbook_id(), Some("1"));

        assert!(matches!(
            session.open("2"),
            Err(SessionError::Service(ServiceError::NotFound(_)))
        ));
        assert_eq!(session.name(), Some("Ledger"));
        assert!(session.workbook().is_some());
    }

    #[test]
    fn requires_an_open_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        assert!(matches!(session.save(), Err(SessionError::NoWorkbook)));
        assert!(matches!(session.add_row("x"), Err(SessionError::NoWorkbook)));
        assert!(matches!(
            session.open("missing"),
            Err(SessionError::Service(ServiceError::NotFound(_)))
        ));
    }
}
