use sheetdesk::{
    CellValue, DataType, EditorSession, LocalStore, ServiceError, SessionContext, SessionError,
    TableHost, TextRenderer, WorkbookService, unwrap_response,
};

const ORDERS: &[u8] = b"customer,total,paid\nann,12.5,true\n,,\nbob,7,false\n";

fn open_session(root: &std::path::Path, tenant: &str) -> EditorSession<LocalStore> {
    EditorSession::new(LocalStore::new(root), SessionContext::new("token", tenant))
        .with_page_size(2)
}

#[test]
fn edits_survive_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open_session(dir.path(), "shop");
    assert!(session.import("orders.csv", ORDERS).unwrap());
    let id = session.workbook_id().unwrap().to_string();

    session.strip_blank_rows("orders").unwrap();
    session.rename_column("orders", 0, "client").unwrap();
    session.change_column_type("orders", 1, DataType::String).unwrap();
    session.set_edit_mode(true);
    session.commit("orders", 1, 0, "carl").unwrap();
    assert_eq!(session.save().unwrap(), id);

    let mut reopened = open_session(dir.path(), "shop");
    assert!(reopened.open(&id).unwrap());
    assert_eq!(reopened.name(), Some("orders"));
    let sheet = reopened.sheet("orders").unwrap();
    assert_eq!(sheet.column_names(), vec!["client", "total", "paid"]);
    assert_eq!(sheet.columns[1].data_type, DataType::String);
    assert_eq!(sheet.rows.len(), 2);
    assert_eq!(sheet.rows[0][1], CellValue::text("12.5"));
    assert_eq!(sheet.rows[1][0], CellValue::text("carl"));
}

#[test]
fn listing_is_scoped_to_the_tenant() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = open_session(dir.path(), "north");
    first.import("orders.csv", ORDERS).unwrap();

    let second = open_session(dir.path(), "south");
    assert!(second.list().unwrap().is_empty());
    assert_eq!(first.list().unwrap().len(), 1);
}

#[test]
fn blank_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = EditorSession::new(LocalStore::new(dir.path()), SessionContext::new("", "shop"));
    assert!(matches!(
        session.import("orders.csv", ORDERS),
        Err(SessionError::Service(ServiceError::Unauthorized))
    ));
    assert!(session.workbook().is_none());
}

#[test]
fn envelope_without_data_opens_nothing() {
    struct Broken;

    impl WorkbookService for Broken {
        fn list(&self, _: &SessionContext) -> Result<Vec<sheetdesk::WorkbookSummary>, ServiceError> {
            Ok(Vec::new())
        }
        fn fetch(&self, _: &SessionContext, _: &str) -> Result<String, ServiceError> {
            Ok(r#"{"success":false,"data":{}}"#.to_string())
        }
        fn import(&self, _: &SessionContext, _: &str, _: &[u8]) -> Result<String, ServiceError> {
            Err(ServiceError::UnsupportedFile("none".to_string()))
        }
        fn store(
            &self,
            _: &SessionContext,
            _: Option<&str>,
            _: &str,
            _: &sheetdesk::Workbook,
        ) -> Result<String, ServiceError> {
            Err(ServiceError::NotFound("none".to_string()))
        }
    }

    let mut session = EditorSession::new(Broken, SessionContext::new("t", "x"));
    assert!(!session.open("1").unwrap());
    assert!(session.workbook().is_none());
}

#[test]
fn table_host_renders_pages_with_dropdowns() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open_session(dir.path(), "shop");
    session.import("orders.csv", ORDERS).unwrap();
    session.set_dropdown("orders", 0, true, None).unwrap();

    let mut host = TableHost::new(TextRenderer::default());
    host.renderer_mut().page = 1;
    host.refresh(&session.project("orders").unwrap());
    let output = host.renderer().output().to_string();
    assert!(output.starts_with("[orders] page 2/2 (3 rows)"));
    assert!(output.contains("customer (string)*"));
    assert!(output.contains("bob"));
    assert!(!output.contains("ann"));

    host.teardown();
    assert!(!host.is_live());
    assert!(host.renderer().output().is_empty());
}

#[test]
fn imported_envelope_carries_the_new_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let ctx = SessionContext::new("token", "shop");
    let body = store.import(&ctx, "orders.csv", ORDERS).unwrap();
    let loaded = unwrap_response(&body).unwrap();

    let id = loaded.id.unwrap();
    assert_eq!(store.list(&ctx).unwrap()[0].id, id);
    assert_eq!(
        loaded.workbook.sheet("orders").unwrap().columns[2].data_type,
        DataType::Boolean
    );
}
