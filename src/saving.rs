use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::workbook::Workbook;

/// On-disk form of a stored workbook.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredWorkbook {
    pub name: String,
    pub workbook: Workbook,
}

pub fn save_workbook(record: &StoredWorkbook, path: impl AsRef<Path>) -> std::io::Result<()> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serde_json::to_writer(&mut writer, record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .finish()?;

    Ok(())
}

pub fn load_workbook(path: impl AsRef<Path>) -> std::io::Result<StoredWorkbook> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let reader = BufReader::new(decoder);

    let record: StoredWorkbook = serde_json::from_reader(reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::DataType;
    use crate::value::CellValue;
    use crate::workbook::{Column, Sheet};

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json.gz");
        let record = StoredWorkbook {
            name: "Budget".to_string(),
            workbook: Workbook::from_sheets(vec![
                Sheet::new("Q1", vec![Column::new("amount", DataType::Number)])
                    .with_rows(vec![vec![CellValue::Number(12.5)], vec![CellValue::Null]]),
            ]),
        };

        save_workbook(&record, &path).unwrap();
        assert!(path.exists());
        assert_eq!(load_workbook(&path).unwrap(), record);
    }

    #[test]
    fn rejects_uncompressed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.json.gz");
        std::fs::write(&path, b"{\"name\":\"x\"}").unwrap();
        assert!(load_workbook(&path).is_err());
    }
}
