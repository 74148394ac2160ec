use crate::present::DEFAULT_PAGE_SIZE;
use crate::service::SessionContext;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_STORE_DIR: &str = "database";

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "sheetdesk")]
#[command(about = "Interactive workbook editor backed by a local store", long_about = None)]
pub struct Config {
    /// Directory holding one subdirectory of workbooks per tenant
    #[arg(long, env = "SHEETDESK_STORE", default_value = DEFAULT_STORE_DIR)]
    pub store: PathBuf,

    /// Tenant whose workbooks are listed and written
    #[arg(long, env = "SHEETDESK_TENANT", default_value = "default")]
    pub tenant: String,

    /// Bearer token sent with every store request
    #[arg(long, env = "SHEETDESK_TOKEN", default_value = "local")]
    pub token: String,

    /// Rows per page when showing a sheet
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Workbook (.json) or CSV file to open without storing it
    pub file: Option<PathBuf>,
}

impl Config {
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(self.token.clone(), self.tenant.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let config = Config::try_parse_from([
            "sheetdesk",
            "--store",
            "/tmp/books",
            "--tenant",
            "acme",
            "--token",
            "abc",
            "--page-size",
            "25",
            "parts.csv",
        ])
        .unwrap();
        assert_eq!(config.store, PathBuf::from("/tmp/books"));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.file, Some(PathBuf::from("parts.csv")));
        assert_eq!(config.session_context(), SessionContext::new("abc", "acme"));
    }

    #[test]
    fn rejects_bad_page_size() {
        assert!(Config::try_parse_from(["sheetdesk", "--page-size", "many"]).is_err());
    }
}
