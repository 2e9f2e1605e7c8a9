mod common;

use std::path::Path;

use chrono::NaiveDate;
use common::{TestWorkspace, fixture_path};
use tabular_import::{
    data::Value,
    error::ImportError,
    import::{ImportOptions, ImportSource, ImportStatus, Importer},
    parsers::{FileFormat, ParseOptions, parse_file},
    store::{RelationalStore, memory::MemoryStore},
};

#[test]
fn format_comes_from_extension_then_mime() {
    assert_eq!(FileFormat::detect(Path::new("a.CSV"), None), Some(FileFormat::Csv));
    assert_eq!(FileFormat::detect(Path::new("a.xlsx"), None), Some(FileFormat::Excel));
    assert_eq!(FileFormat::detect(Path::new("a.xls"), None), Some(FileFormat::Excel));
    assert_eq!(FileFormat::detect(Path::new("a.json"), None), Some(FileFormat::Json));
    assert_eq!(
        FileFormat::detect(Path::new("a.tsv"), None),
        Some(FileFormat::DelimitedText)
    );
    assert_eq!(
        FileFormat::detect(Path::new("upload"), Some("application/json")),
        Some(FileFormat::Json)
    );
    assert_eq!(FileFormat::detect(Path::new("upload.bin"), None), None);
}

#[test]
fn json_object_is_a_single_row() {
    let workspace = TestWorkspace::new();
    let parsed = ImportSource::new(workspace.write(
        "one.json",
        r#"{"sku": "A-1", "qty": 4, "tags": ["x", "y"], "note": ""}"#,
    ))
    .parse()
    .expect("parse");

    assert_eq!(parsed.headers, vec!["sku", "qty", "tags", "note"]);
    assert_eq!(parsed.rows.len(), 1);
    let row = &parsed.rows[0];
    assert_eq!(row.value("qty"), Some("4"));
    assert_eq!(row.value("tags"), Some(r#"["x","y"]"#));
    assert_eq!(row.value("note"), None);
}

#[test]
fn json_headers_collect_late_keys() {
    let workspace = TestWorkspace::new();
    let parsed = ImportSource::new(workspace.write(
        "rows.json",
        r#"[{"a": 1}, {"b": true, "a": 2}]"#,
    ))
    .parse()
    .expect("parse");
    assert_eq!(parsed.headers, vec!["a", "b"]);
    assert!(!parsed.rows[0].contains_key("b"));
    assert_eq!(parsed.rows[1].value("b"), Some("true"));
}

#[test]
fn json_scalars_are_rejected() {
    let workspace = TestWorkspace::new();
    let err = ImportSource::new(workspace.write("bad.json", "[{\"a\": 1}, 7]"))
        .parse()
        .expect_err("scalar element");
    assert!(matches!(err, ImportError::Parse { .. }));
    assert!(err.to_string().contains("element 2"));

    let err = ImportSource::new(workspace.write("broken.json", "[{\"a\": 1"))
        .parse()
        .expect_err("truncated document");
    assert!(matches!(err, ImportError::Parse { .. }));
}

#[test]
fn empty_and_header_only_files_have_no_rows() {
    let workspace = TestWorkspace::new();
    for (name, contents) in [("empty.csv", ""), ("header.csv", "id,name\n"), ("list.json", "[]")] {
        let err = ImportSource::new(workspace.write(name, contents))
            .parse()
            .expect_err("no data rows");
        assert!(
            matches!(err, ImportError::EmptyFile { .. }),
            "{name}: unexpected {err}"
        );
    }
}

#[test]
fn oversized_files_are_refused() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("big.csv", "id,name\n1,Ann\n2,Bob\n");
    let options = ParseOptions {
        max_file_bytes: 8,
        ..ParseOptions::default()
    };
    let err = parse_file(&path, FileFormat::Csv, &options).expect_err("too large");
    assert!(matches!(err, ImportError::FileTooLarge { limit: 8, .. }));
}

#[test]
fn explicit_format_overrides_the_extension() {
    let workspace = TestWorkspace::new();
    let mut source = ImportSource::new(workspace.write("export.dat", "sku\tqty\nA-1\t4\n"));
    assert!(matches!(
        source.resolve_format(),
        Err(ImportError::UnsupportedFormat { .. })
    ));

    source.format = Some(FileFormat::DelimitedText);
    let parsed = source.parse().expect("parse");
    assert_eq!(parsed.headers, vec!["sku", "qty"]);
    assert_eq!(parsed.rows[0].value("qty"), Some("4"));
}

#[test]
fn ragged_rows_keep_extra_cells() {
    let workspace = TestWorkspace::new();
    let parsed = ImportSource::new(workspace.write("ragged.csv", "a,b\n1,2,3\n4\n"))
        .parse()
        .expect("parse");
    assert_eq!(parsed.headers, vec!["a", "b", "column_3"]);
    assert_eq!(parsed.rows[0].value("column_3"), Some("3"));
    assert_eq!(parsed.rows[1].value("a"), Some("4"));
    assert_eq!(parsed.rows[1].value("b"), None);
}

#[test]
fn excel_sheet_reads_headers_numbers_and_dates() {
    let parsed = ImportSource::new(fixture_path("people.xlsx"))
        .parse()
        .expect("parse workbook");

    assert_eq!(parsed.headers, vec!["id", "name", "joined", "score"]);
    assert_eq!(parsed.rows.len(), 3);
    let first = &parsed.rows[0];
    assert_eq!(first.value("id"), Some("1"));
    assert_eq!(first.value("name"), Some("Ann"));
    assert_eq!(first.value("joined"), Some("2024-01-01"));
    assert_eq!(first.value("score"), Some("9.5"));
    assert_eq!(parsed.rows[2].value("joined"), Some("2024-03-15"));
    assert_eq!(parsed.rows[1].value("score"), Some("7"));
}

#[test]
fn excel_sheet_imports_into_a_new_table() {
    let source = ImportSource::new(fixture_path("people.xlsx"));
    let mut store = MemoryStore::new();
    let mut options = ImportOptions::new("public", "people");
    options.create_table_if_missing = true;

    let result = Importer::new(options)
        .run(&mut store, &source)
        .expect("import workbook");
    assert_eq!(result.status, ImportStatus::Completed);
    assert_eq!(result.success_rows, 3);
    assert_eq!(result.error_rows, 0);

    let columns = store.get_column_schema("public", "people").expect("schema");
    assert_eq!(columns[0].column_name, "id");
    assert_eq!(columns[0].sql_type, "integer");
    assert_eq!(
        store.column_values("public", "people", "id"),
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
    assert_eq!(
        store.column_values("public", "people", "joined")[1],
        Value::Date(NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date"))
    );
}
