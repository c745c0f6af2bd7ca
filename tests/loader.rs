mod common;

use common::load_fixture;
use csv_blend::{
    error::ParseError,
    io_utils::detect_delimiter,
    loader::{LoadOptions, load_table, promote_first_row},
    schema::{ColumnType, profile_table},
};

#[test]
fn three_commas_beat_one_semicolon() {
    assert_eq!(detect_delimiter("a,b,c;d\n1,2,3;4\n"), b',');
}

#[test]
fn semicolon_fixture_is_detected_and_typed() {
    let table = load_fixture("sales_semicolon.csv");
    assert_eq!(table.headers(), vec!["region", "product", "units", "sold_on"]);
    let kinds: Vec<ColumnType> = table.columns().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ColumnType::String,
            ColumnType::String,
            ColumnType::Numeric,
            ColumnType::DateTime
        ]
    );
    assert_eq!(table.cell(4, 2), None, "n/a loads as a missing cell");
}

#[test]
fn orders_fixture_infers_types() {
    let table = load_fixture("orders.csv");
    assert_eq!(table.row_count(), 5);
    assert_eq!(table.column("amount").map(|c| c.kind), Some(ColumnType::Numeric));
    assert_eq!(table.column("status").map(|c| c.kind), Some(ColumnType::String));
    assert_eq!(
        table.column("ordered_at").map(|c| c.kind),
        Some(ColumnType::DateTime)
    );
}

#[test]
fn explicit_delimiter_overrides_detection() {
    let options = LoadOptions {
        delimiter: Some(b'|'),
        ..LoadOptions::default()
    };
    let table = load_table(b"a|b,c\n1|2,3\n", &options).unwrap();
    assert_eq!(table.headers(), vec!["a", "b,c"]);
    assert_eq!(table.cell(0, 1), Some("2,3"));
}

#[test]
fn header_only_payload_has_columns_and_no_rows() {
    let table = load_table(b"id,name\n", &LoadOptions::default()).unwrap();
    assert_eq!(table.headers(), vec!["id", "name"]);
    assert_eq!(table.row_count(), 0);
}

#[test]
fn blank_input_is_the_empty_table() {
    let table = load_table(b"  \n\n", &LoadOptions::default()).unwrap();
    assert_eq!(table.column_count(), 0);
    assert!(table.is_empty());
}

#[test]
fn short_rows_are_padded_and_long_rows_rejected() {
    let table = load_table(b"a,b,c\n1,2\n", &LoadOptions::default()).unwrap();
    assert_eq!(table.cell(0, 2), None);

    let err = load_table(b"a,b\n1,2,3\n", &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ParseError::RaggedRow {
            line: 2,
            expected: 2,
            found: 3
        }
    ));
}

#[test]
fn latin1_input_decodes_with_requested_encoding() {
    let bytes = b"name,city\nJos\xe9,M\xfcnchen\n";
    let options = LoadOptions {
        encoding: encoding_rs::WINDOWS_1252,
        ..LoadOptions::default()
    };
    let table = load_table(bytes, &options).unwrap();
    assert_eq!(table.cell(0, 0), Some("José"));
    assert_eq!(table.cell(0, 1), Some("München"));

    assert!(matches!(
        load_table(bytes, &LoadOptions::default()),
        Err(ParseError::Decode { .. })
    ));
}

#[test]
fn promote_first_row_after_headerless_load() {
    let options = LoadOptions {
        has_headers: false,
        ..LoadOptions::default()
    };
    let raw = load_table(b"id,,id\n1,x,2\n", &options).unwrap();
    assert_eq!(raw.headers(), vec!["column_1", "column_2", "column_3"]);

    let promoted = promote_first_row(&raw).unwrap();
    assert_eq!(promoted.headers(), vec!["id", "unknown_1", "id_1"]);
    assert!(promoted.columns()[1].placeholder);
    assert_eq!(promoted.row_count(), 1);
    assert_eq!(promoted.columns()[0].kind, ColumnType::Numeric);
}

#[test]
fn profile_counts_nulls_and_distinct_values() {
    let table = load_fixture("orders.csv");
    let profiles = profile_table(&table);
    let amount = profiles.iter().find(|p| p.name == "amount").unwrap();
    assert_eq!(amount.nulls, 1);
    assert_eq!(amount.non_null, 4);
    let status = profiles.iter().find(|p| p.name == "status").unwrap();
    assert_eq!(status.distinct, 3);
}
