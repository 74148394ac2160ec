use sheetdesk::{CellValue, Column, DataType, RawValue, Sheet, Workbook, coerce, coerce_cell};

fn text(s: &str) -> RawValue {
    RawValue::Text(s.to_string())
}

// Helper function to check a single coercion
fn assert_coerces(value: RawValue, target: DataType, expected: CellValue) {
    let actual = coerce(&value, target);
    match (&actual, &expected) {
        (CellValue::Number(a), CellValue::Number(b)) if a.is_nan() && b.is_nan() => {}
        _ => assert_eq!(actual, expected, "coercing {:?} to {}", value, target),
    }
    println!("✓ {:?} -> {} gives {:?}", value, target, expected);
}

fn test_missing_values() {
    println!("\n====== Testing missing values ======");
    assert_coerces(RawValue::Null, DataType::Number, CellValue::Number(0.0));
    assert_coerces(RawValue::Null, DataType::Boolean, CellValue::Number(0.0));
    assert_coerces(RawValue::Null, DataType::String, CellValue::text(""));
    assert_coerces(RawValue::Null, DataType::Date, CellValue::Null);
}

fn test_scalars() {
    println!("\n====== Testing scalars ======");
    assert_coerces(text("42.5"), DataType::Number, CellValue::Number(42.5));
    assert_coerces(text("abc"), DataType::Number, CellValue::Number(f64::NAN));
    assert_coerces(text("false"), DataType::Boolean, CellValue::Number(0.0));
    assert_coerces(text("no"), DataType::Boolean, CellValue::Number(1.0));
    assert_coerces(RawValue::Number(3.0), DataType::String, CellValue::text("3"));
    assert_coerces(RawValue::Bool(true), DataType::String, CellValue::text("true"));
    assert_coerces(RawValue::Bool(true), DataType::Date, CellValue::Null);
}

fn test_temporal() {
    println!("\n====== Testing temporal targets ======");
    assert_coerces(text("2024-03-05"), DataType::Date, CellValue::text("2024-03-05"));
    assert_coerces(
        text("2024-03-05 14:30:00"),
        DataType::Datetime,
        CellValue::text("2024-03-05T14:30:00"),
    );
    assert_coerces(text("14:30"), DataType::Time, CellValue::text("14:30:00"));
    assert_coerces(RawValue::Number(0.0), DataType::Date, CellValue::text("1970-01-01"));
    assert_coerces(text("soon"), DataType::Time, CellValue::Null);
}

fn test_composites() {
    println!("\n====== Testing lists and objects ======");
    let list = RawValue::List(vec![RawValue::Number(1.0), text("b")]);
    assert_coerces(list.clone(), DataType::String, CellValue::text("1,b"));
    assert_coerces(list.clone(), DataType::Number, CellValue::Number(f64::NAN));
    assert_coerces(list, DataType::Boolean, CellValue::Number(1.0));
    assert_coerces(RawValue::List(vec![]), DataType::Number, CellValue::Number(0.0));
    assert_coerces(RawValue::Object, DataType::String, CellValue::text("[object Object]"));
}

fn test_idempotence() {
    println!("\n====== Testing re-coercion ======");
    let samples = [text("7"), text("2024-01-02 03:04:05"), text(""), RawValue::Bool(false)];
    for target in DataType::ALL {
        for sample in &samples {
            let once = coerce(sample, target);
            let twice = coerce_cell(&once, target);
            let same = match (&once, &twice) {
                (CellValue::Number(a), CellValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => once == twice,
            };
            assert!(same, "{:?} to {} is not stable", sample, target);
        }
        println!("✓ coercion to {} is stable", target);
    }
}

fn test_column_retype() {
    println!("\n====== Testing column type change ======");
    let mut workbook = Workbook::from_sheets(vec![
        Sheet::new("S", vec![Column::new("v", DataType::String)]).with_rows(vec![
            vec![CellValue::text("12")],
            vec![CellValue::text("x")],
        ]),
    ]);
    let before = workbook.clone();
    workbook.change_column_type("S", 0, DataType::Number).unwrap();

    let sheet = workbook.sheet("S").unwrap();
    assert_eq!(sheet.columns[0].data_type, DataType::Number);
    assert_eq!(sheet.rows[0][0], CellValue::Number(12.0));
    assert!(sheet.rows[1][0].as_number().is_some_and(f64::is_nan));
    assert_eq!(before.sheet("S").unwrap().rows[0][0], CellValue::text("12"));
    println!("✓ Column retyped without touching the earlier snapshot");
}

fn main() {
    test_missing_values();
    test_scalars();
    test_temporal();
    test_composites();
    test_idempotence();
    test_column_retype();
    println!("\nAll coercion checks passed");
}
