//! Workbook services: listing, retrieval, import and storage.
//!
//! Every call carries a [`SessionContext`] naming the caller's tenant and
//! bearer token. [`LocalStore`] keeps each tenant's workbooks as gzip
//! compressed JSON files under `<root>/<tenant>/`.

use crate::envelope::wrap_envelope;
use crate::error::ServiceError;
use crate::loader::import_bytes;
use crate::saving::{StoredWorkbook, load_workbook, save_workbook};
use crate::workbook::Workbook;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, read_dir};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_SUFFIX: &str = ".json.gz";

lazy_static! {
    static ref TENANT_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Caller identity attached to every service request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub token: String,
    pub tenant: String,
}

impl SessionContext {
    pub fn new(token: impl Into<String>, tenant: impl Into<String>) -> Self {
        SessionContext {
            token: token.into(),
            tenant: tenant.into(),
        }
    }
}

/// One entry of a workbook listing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkbookSummary {
    pub id: String,
    pub name: String,
}

/// Remote surface the editor talks to.
pub trait WorkbookService {
    /// Lists the workbooks visible to the caller's tenant.
    fn list(&self, ctx: &SessionContext) -> Result<Vec<WorkbookSummary>, ServiceError>;

    /// Returns the response body for `id`. Callers must accept both the
    /// bare workbook and the envelope form.
    fn fetch(&self, ctx: &SessionContext, id: &str) -> Result<String, ServiceError>;

    /// Stores an uploaded file as a new workbook and returns the response
    /// envelope carrying its identifier.
    fn import(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ServiceError>;

    /// Writes a workbook, creating a new entry when `id` is `None`.
    /// Returns the identifier it was stored under.
    fn store(
        &self,
        ctx: &SessionContext,
        id: Option<&str>,
        name: &str,
        workbook: &Workbook,
    ) -> Result<String, ServiceError>;
}

/// File-backed workbook service.
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the caller's tenant directory.
    ///
    /// # Returns
    /// * `Err(Unauthorized)` when the token is blank
    /// * `Err(InvalidTenant)` when the tenant is not a plain identifier
    fn tenant_dir(&self, ctx: &SessionContext) -> Result<PathBuf, ServiceError> {
        if ctx.token.trim().is_empty() {
            return Err(ServiceError::Unauthorized);
        }
        if !TENANT_RE.is_match(&ctx.tenant) {
            return Err(ServiceError::InvalidTenant(ctx.tenant.clone()));
        }
        Ok(self.root.join(&ctx.tenant))
    }

    fn workbook_path(&self, ctx: &SessionContext, id: &str) -> Result<PathBuf, ServiceError> {
        // ids share the tenant alphabet so they never escape the directory
        if !TENANT_RE.is_match(id) {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        Ok(self.tenant_dir(ctx)?.join(format!("{}{}", id, FILE_SUFFIX)))
    }

    fn read(&self, ctx: &SessionContext, id: &str) -> Result<StoredWorkbook, ServiceError> {
        let path = self.workbook_path(ctx, id)?;
        if !path.exists() {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        Ok(load_workbook(&path)?)
    }
}

impl WorkbookService for LocalStore {
    fn list(&self, ctx: &SessionContext) -> Result<Vec<WorkbookSummary>, ServiceError> {
        let dir = self.tenant_dir(ctx)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in read_dir(&dir)? {
            let path = entry?.path();
            let Some(id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            match load_workbook(&path) {
                Ok(record) => summaries.push(WorkbookSummary {
                    id: id.to_string(),
                    name: record.name,
                }),
                Err(e) => warn!("Skipping unreadable workbook {}: {}", path.display(), e),
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn fetch(&self, ctx: &SessionContext, id: &str) -> Result<String, ServiceError> {
        let record = self.read(ctx, id)?;
        debug!("Fetched workbook {} for tenant '{}'", id, ctx.tenant);
        Ok(wrap_envelope(id, &record.name, &record.workbook)?)
    }

    fn import(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ServiceError> {
        self.tenant_dir(ctx)?;
        let workbook = import_bytes(file_name, bytes)?;
        let name = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let id = self.store(ctx, None, name, &workbook)?;
        info!("Imported '{}' as workbook {}", file_name, id);
        Ok(wrap_envelope(&id, name, &workbook)?)
    }

    fn store(
        &self,
        ctx: &SessionContext,
        id: Option<&str>,
        name: &str,
        workbook: &Workbook,
    ) -> Result<String, ServiceError> {
        let dir = self.tenant_dir(ctx)?;
        create_dir_all(&dir)?;

        let id = match id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let record = StoredWorkbook {
            name: name.to_string(),
            workbook: workbook.clone(),
        };
        save_workbook(&record, self.workbook_path(ctx, &id)?)?;
        debug!("Stored workbook {} ('{}') for tenant '{}'", id, name, ctx.tenant);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::unwrap_response;

    fn ctx(tenant: &str) -> SessionContext {
        SessionContext::new("secret", tenant)
    }

    #[test]
    fn import_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let body = store.import(&ctx("acme"), "stock.csv", b"sku,qty\nA1,3\n").unwrap();
        let loaded = unwrap_response(&body).unwrap();
        let id = loaded.id.unwrap();

        let fetched = unwrap_response(&store.fetch(&ctx("acme"), &id).unwrap()).unwrap();
        assert_eq!(fetched.id.as_deref(), Some(id.as_str()));
        assert_eq!(fetched.workbook, loaded.workbook);
        assert_eq!(
            store.list(&ctx("acme")).unwrap(),
            vec![WorkbookSummary { id, name: "stock".to_string() }]
        );
    }

    #[test]
    fn tenants_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let id = store
            .store(&ctx("a"), None, "Mine", &Workbook::new())
            .unwrap();

        assert!(store.list(&ctx("b")).unwrap().is_empty());
        assert!(matches!(
            store.fetch(&ctx("b"), &id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn rejects_bad_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        assert!(matches!(
            store.list(&SessionContext::new("  ", "a")),
            Err(ServiceError::Unauthorized)
        ));
        assert!(matches!(
            store.list(&ctx("../etc")),
            Err(ServiceError::InvalidTenant(_))
        ));
        assert!(matches!(
            store.fetch(&ctx("a"), "../a/x"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn store_overwrites_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let id = store.store(&ctx("a"), None, "v1", &Workbook::new()).unwrap();
        let again = store.store(&ctx("a"), Some(&id), "v2", &Workbook::new()).unwrap();

        assert_eq!(id, again);
        let listing = store.list(&ctx("a")).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "v2");
    }
}
