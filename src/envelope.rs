//! Workbook responses arrive either as the workbook itself or wrapped as
//! `{"success": bool, "data": {"data": "<workbook JSON>", "id": ..., "name": ...}}`.
//! The shape is detected at runtime.

use crate::workbook::Workbook;
use log::warn;
use serde_json::Value;

/// A decoded response, with the identifier and display name when the
/// envelope carried them.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedWorkbook {
    pub id: Option<String>,
    pub name: Option<String>,
    pub workbook: Workbook,
}

/// Decodes a workbook response of either shape. Malformed bodies, failed
/// envelopes and non-workbook payloads all yield `None`.
pub fn parse_workbook_response(body: &str) -> Option<Workbook> {
    unwrap_response(body).map(|loaded| loaded.workbook)
}

pub fn unwrap_response(body: &str) -> Option<LoadedWorkbook> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Workbook response is not valid JSON: {}", e);
            return None;
        }
    };
    if is_envelope(&value) {
        unwrap_envelope(value)
    } else {
        decode_workbook(value).map(|workbook| LoadedWorkbook {
            id: None,
            name: None,
            workbook,
        })
    }
}

fn is_envelope(value: &Value) -> bool {
    value.get("success").is_some() && value.get("data").is_some_and(Value::is_object)
}

fn unwrap_envelope(mut value: Value) -> Option<LoadedWorkbook> {
    if !value["success"].as_bool().unwrap_or(false) {
        warn!("Workbook service reported failure");
        return None;
    }
    let mut data = value["data"].take();
    let id = match data["id"].take() {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    };
    let name = match data["name"].take() {
        Value::String(s) => Some(s),
        _ => None,
    };
    let inner = match data["data"].take() {
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
            Ok(inner) => inner,
            Err(e) => {
                warn!("Envelope payload is not valid JSON: {}", e);
                return None;
            }
        },
        // some services inline the workbook instead of encoding it
        inline @ (Value::Object(_) | Value::Array(_)) => inline,
        _ => {
            warn!("Envelope carries no workbook payload");
            return None;
        }
    };
    decode_workbook(inner).map(|workbook| LoadedWorkbook { id, name, workbook })
}

fn decode_workbook(value: Value) -> Option<Workbook> {
    match serde_json::from_value::<Workbook>(value) {
        Ok(workbook) => Some(workbook),
        Err(e) => {
            warn!("Response does not describe a workbook: {}", e);
            None
        }
    }
}

/// Wraps a workbook the way the retrieval service does.
pub fn wrap_envelope(id: &str, name: &str, workbook: &Workbook) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_string(workbook)?;
    serde_json::to_string(&serde_json::json!({
        "success": true,
        "data": { "data": encoded, "id": id, "name": name },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    const DIRECT: &str = r#"{"sheets":[{"sheetName":"S","columns":[{"name":"a","dataType":"string"}],"rows":[["x"]]}]}"#;

    #[test]
    fn reads_direct_workbook() {
        let wb = parse_workbook_response(DIRECT).unwrap();
        assert_eq!(wb.sheet("S").unwrap().rows[0][0], CellValue::text("x"));
    }

    #[test]
    fn unwraps_encoded_envelope() {
        let body = serde_json::json!({
            "success": true,
            "data": { "data": DIRECT, "id": 42 }
        })
        .to_string();
        let loaded = unwrap_response(&body).unwrap();
        assert_eq!(loaded.id.as_deref(), Some("42"));
        assert_eq!(loaded.name, None);
        assert_eq!(loaded.workbook.sheet_names(), vec!["S"]);
    }

    #[test]
    fn envelope_round_trips_through_wrap() {
        let wb = parse_workbook_response(DIRECT).unwrap();
        let body = wrap_envelope("abc", "Budget", &wb).unwrap();
        let loaded = unwrap_response(&body).unwrap();
        assert_eq!(loaded.id.as_deref(), Some("abc"));
        assert_eq!(loaded.name.as_deref(), Some("Budget"));
        assert_eq!(loaded.workbook, wb);
    }

    #[test]
    fn malformed_input_degrades_to_none() {
        assert!(parse_workbook_response("not json").is_none());
        assert!(parse_workbook_response(r#"{"success":false,"data":{"data":"{}"}}"#).is_none());
        assert!(parse_workbook_response(r#"{"success":true,"data":{"data":"{broken"}}"#).is_none());
        assert!(parse_workbook_response(r#"{"success":true,"data":{"id":1}}"#).is_none());
        assert!(parse_workbook_response(r#"{"rows":[]}"#).is_none());
    }
}
