#![cfg(not(tarpaulin_include))]

use clap::Parser;
use log::info;
use sheetdesk::config::Config;
use sheetdesk::{
    DataType, EditorSession, LocalStore, Sheet, TableHost, TextRenderer, load_file,
};
use std::io::{self, Write};
use std::time::Instant;

type Session = EditorSession<LocalStore>;

const HELP: &[(&str, &str)] = &[
    ("list", "List stored workbooks"),
    ("open <id>", "Open a stored workbook"),
    ("import <path>", "Import a .json or .csv file into the store"),
    ("sheets", "List the sheets of the open workbook"),
    ("sheet <name>", "Switch to a sheet"),
    ("show [page]", "Show a page of the current sheet"),
    ("rename <col> <name>", "Rename a column"),
    ("type <col> <type>", "Change a column type"),
    ("types <col>=<type>,...", "Change several column types at once"),
    ("delcols <col>,<col>", "Delete columns"),
    ("delrow <row>", "Delete a row"),
    ("header <row>", "Use a row as the column names"),
    ("set <row> <col> <value>", "Edit a cell (edit mode only)"),
    ("addrow", "Append an empty row"),
    ("strip", "Remove rows where every cell is blank"),
    ("filter [name,...]", "Export only rows filling one of these columns"),
    ("dropdown <col> on|off [v1,v2]", "Toggle the dropdown editor for a column"),
    ("edit on|off", "Toggle edit mode"),
    ("save", "Store the open workbook"),
    ("export <path>", "Write the current sheet as CSV, or every sheet to a .xlsx path"),
    ("q", "Quit"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();

    let store = LocalStore::new(&config.store);
    let mut session = EditorSession::new(store, config.session_context())
        .with_page_size(config.page_size);
    if let Some(path) = &config.file {
        let workbook = load_file(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled");
        session.load(workbook, name);
    }
    info!("Store at {} for tenant '{}'", config.store.display(), config.tenant);

    let mut host = TableHost::new(TextRenderer::default());
    let mut current: Option<String> = first_sheet(&session);
    let mut status = String::from("ok");
    let mut show = current.is_some();
    let mut start_time = Instant::now();

    loop {
        if show {
            if let Some(name) = &current {
                if let Ok(model) = session.project(name) {
                    host.refresh(&model);
                    print!("{}", host.renderer().output());
                }
            }
        }
        show = false;

        print!("[{:.1}] ({}) > ", start_time.elapsed().as_secs_f64(), status);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim();
        start_time = Instant::now();

        if command.is_empty() {
            status = String::from("invalid command");
            continue;
        }
        if command == "q" {
            break;
        }

        let (word, rest) = command
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((command, ""));

        let outcome = run_command(&mut session, &mut host, &mut current, word, rest);
        match outcome {
            Ok(Outcome::Show(message)) => {
                status = message;
                show = true;
            }
            Ok(Outcome::Quiet(message)) => status = message,
            Err(message) => status = message,
        }
    }

    host.teardown();
    Ok(())
}

enum Outcome {
    Show(String),
    Quiet(String),
}

fn ok() -> Result<Outcome, String> {
    Ok(Outcome::Show(String::from("ok")))
}

fn first_sheet(session: &Session) -> Option<String> {
    session
        .workbook()
        .and_then(|wb| wb.first_sheet())
        .map(|sheet| sheet.sheet_name.clone())
}

fn current_sheet<'a>(current: &'a Option<String>) -> Result<&'a str, String> {
    current.as_deref().ok_or_else(|| String::from("no sheet"))
}

/// Accepts a 0-based column index or a column name.
fn resolve_column(sheet: &Sheet, arg: &str) -> Result<usize, String> {
    arg.parse::<usize>()
        .ok()
        .or_else(|| sheet.column_index(arg))
        .ok_or_else(|| format!("unknown column '{}'", arg))
}

fn parse_index(arg: &str) -> Result<usize, String> {
    arg.parse::<usize>()
        .map_err(|_| format!("invalid index '{}'", arg))
}

fn run_command(
    session: &mut Session,
    host: &mut TableHost<TextRenderer>,
    current: &mut Option<String>,
    word: &str,
    rest: &str,
) -> Result<Outcome, String> {
    let err = |e: sheetdesk::SessionError| e.to_string();

    match word {
        "help" => {
            println!("Commands:");
            for (usage, description) in HELP {
                println!("  {:<32}{}", usage, description);
            }
            Ok(Outcome::Quiet(String::from("ok")))
        }
        "list" => {
            let workbooks = session.list().map_err(err)?;
            for summary in &workbooks {
                println!("  {}  {}", summary.id, summary.name);
            }
            Ok(Outcome::Quiet(format!("{} workbook(s)", workbooks.len())))
        }
        "open" => {
            if !session.open(rest).map_err(err)? {
                *current = None;
                return Ok(Outcome::Quiet(String::from("no data")));
            }
            *current = first_sheet(session);
            host.renderer_mut().page = 0;
            ok()
        }
        "import" => {
            let bytes = std::fs::read(rest).map_err(|e| e.to_string())?;
            let file_name = std::path::Path::new(rest)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(rest);
            if !session.import(file_name, &bytes).map_err(err)? {
                *current = None;
                return Ok(Outcome::Quiet(String::from("no data")));
            }
            *current = first_sheet(session);
            host.renderer_mut().page = 0;
            ok()
        }
        "sheets" => {
            let workbook = session.workbook().ok_or("no workbook")?;
            for name in workbook.sheet_names() {
                let marker = if current.as_deref() == Some(name) { "*" } else { " " };
                println!(" {}{}", marker, name);
            }
            Ok(Outcome::Quiet(String::from("ok")))
        }
        "sheet" => {
            session.sheet(rest).map_err(err)?;
            *current = Some(rest.to_string());
            host.renderer_mut().page = 0;
            ok()
        }
        "show" => {
            let sheet = current_sheet(current)?;
            let page = if rest.is_empty() { 1 } else { parse_index(rest)? };
            let pages = session.project(sheet).map_err(err)?.page_count();
            if page == 0 || page > pages {
                return Err(format!("page out of range (1-{})", pages));
            }
            host.renderer_mut().page = page - 1;
            ok()
        }
        "rename" => {
            let sheet = current_sheet(current)?;
            let (column, name) = rest.split_once(' ').ok_or("usage: rename <col> <name>")?;
            let column = resolve_column(session.sheet(sheet).map_err(err)?, column)?;
            session.rename_column(sheet, column, name).map_err(err)?;
            ok()
        }
        "type" => {
            let sheet = current_sheet(current)?;
            let (column, data_type) = rest.split_once(' ').ok_or("usage: type <col> <type>")?;
            let column = resolve_column(session.sheet(sheet).map_err(err)?, column)?;
            let data_type = DataType::parse(data_type.trim()).map_err(|e| e.to_string())?;
            session.change_column_type(sheet, column, data_type).map_err(err)?;
            ok()
        }
        "types" => {
            let sheet = current_sheet(current)?;
            let mut changes = Vec::new();
            for pair in rest.split(',') {
                let (column, data_type) = pair.split_once('=').ok_or("usage: types <col>=<type>,...")?;
                let column = resolve_column(session.sheet(sheet).map_err(err)?, column.trim())?;
                let data_type = DataType::parse(data_type.trim()).map_err(|e| e.to_string())?;
                changes.push((column, data_type));
            }
            session.change_column_types(sheet, &changes).map_err(err)?;
            ok()
        }
        "delcols" => {
            let sheet = current_sheet(current)?;
            let columns = rest
                .split(',')
                .map(|c| resolve_column(session.sheet(sheet).map_err(err)?, c.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            let removed = session.delete_columns(sheet, &columns).map_err(err)?;
            Ok(Outcome::Show(format!("{} column(s) deleted", removed)))
        }
        "delrow" => {
            let sheet = current_sheet(current)?;
            session.delete_row(sheet, parse_index(rest)?).map_err(err)?;
            ok()
        }
        "header" => {
            let sheet = current_sheet(current)?;
            session.use_row_as_header(sheet, parse_index(rest)?).map_err(err)?;
            ok()
        }
        "set" => {
            let sheet = current_sheet(current)?;
            let mut parts = rest.splitn(3, ' ');
            let (Some(row), Some(column)) = (parts.next(), parts.next()) else {
                return Err(String::from("usage: set <row> <col> <value>"));
            };
            let value = parts.next().unwrap_or("");
            let row = parse_index(row)?;
            let column = resolve_column(session.sheet(sheet).map_err(err)?, column)?;
            session.commit(sheet, row, column, value).map_err(err)?;
            ok()
        }
        "addrow" => {
            let sheet = current_sheet(current)?;
            let index = session.add_row(sheet).map_err(err)?;
            Ok(Outcome::Show(format!("row {} added", index)))
        }
        "strip" => {
            let sheet = current_sheet(current)?;
            let report = session.strip_blank_rows(sheet).map_err(err)?;
            Ok(Outcome::Show(format!("{} blank row(s) removed", report.removed())))
        }
        "filter" => {
            let required: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
            let message = if required.is_empty() {
                String::from("filter cleared")
            } else {
                format!("exporting rows with {}", required.join(" or "))
            };
            session.set_row_filter(required);
            if let Some(sheet) = current.as_deref() {
                let kept = session.filtered_rows(sheet).map_err(err)?.len();
                let total = session.sheet(sheet).map_err(err)?.rows.len();
                return Ok(Outcome::Quiet(format!("{} ({}/{} rows)", message, kept, total)));
            }
            Ok(Outcome::Quiet(message))
        }
        "dropdown" => {
            let sheet = current_sheet(current)?;
            let mut parts = rest.split_whitespace();
            let (Some(column), Some(flag)) = (parts.next(), parts.next()) else {
                return Err(String::from("usage: dropdown <col> on|off [v1,v2]"));
            };
            let column = resolve_column(session.sheet(sheet).map_err(err)?, column)?;
            let enabled = parse_flag(flag)?;
            let values = parts
                .next()
                .map(|list| list.split(',').map(|v| v.trim().to_string()).collect());
            session.set_dropdown(sheet, column, enabled, values).map_err(err)?;
            ok()
        }
        "edit" => {
            session.set_edit_mode(parse_flag(rest)?);
            ok()
        }
        "save" => {
            let id = session.save().map_err(err)?;
            Ok(Outcome::Quiet(format!("saved as {}", id)))
        }
        "export" if rest.to_ascii_lowercase().ends_with(".xlsx") => export_xlsx(session, rest),
        "export" => {
            let sheet = current_sheet(current)?;
            let csv = session.export_csv(sheet).map_err(err)?;
            std::fs::write(rest, csv).map_err(|e| e.to_string())?;
            Ok(Outcome::Quiet(format!("exported to {}", rest)))
        }
        _ => Err(String::from("invalid command")),
    }
}

#[cfg(feature = "xlsx")]
fn export_xlsx(session: &Session, path: &str) -> Result<Outcome, String> {
    let workbook = session.workbook().ok_or("no workbook")?;
    let bytes = sheetdesk::to_xlsx(workbook).map_err(|e| e.to_string())?;
    std::fs::write(path, bytes).map_err(|e| e.to_string())?;
    Ok(Outcome::Quiet(format!("exported {} sheet(s) to {}", workbook.len(), path)))
}

#[cfg(not(feature = "xlsx"))]
fn export_xlsx(_: &Session, _: &str) -> Result<Outcome, String> {
    Err(String::from("xlsx export needs the xlsx feature"))
}

fn parse_flag(flag: &str) -> Result<bool, String> {
    match flag {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(String::from("expected on or off")),
    }
}
