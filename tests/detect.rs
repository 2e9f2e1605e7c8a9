mod common;

use common::TestWorkspace;
use encoding_rs::{UTF_8, WINDOWS_1252};
use tabular_import::{
    detect::{detect_delimiter, detect_header, detect_structure},
    import::ImportSource,
    parsers::ParseOptions,
};

#[test]
fn delimiter_follows_the_first_line() {
    assert_eq!(detect_delimiter("a;b;c"), b';');
    assert_eq!(detect_delimiter("a,b,c"), b',');
    assert_eq!(detect_delimiter("a|b|c"), b'|');
    assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
}

#[test]
fn numeric_first_row_means_no_header() {
    assert!(!detect_header("1;2.5;-3", b';'));
    assert!(detect_header("1;total;3", b';'));
}

#[test]
fn structure_reports_encoding_and_layout() {
    let structure = detect_structure(b"id;name\n1;Ann\n", None, None);
    assert_eq!(structure.delimiter, b';');
    assert!(structure.has_header);
    assert_eq!(structure.encoding, UTF_8);

    let structure = detect_structure(b"caf\xe9|bar\n", None, None);
    assert_eq!(structure.delimiter, b'|');
    assert_eq!(structure.encoding, WINDOWS_1252);

    let structure = detect_structure(b"a;b,c,d\n", None, Some(b';'));
    assert_eq!(structure.delimiter, b';');
}

#[test]
fn semicolon_and_comma_files_parse_alike() {
    let workspace = TestWorkspace::new();
    let semicolon = ImportSource::new(workspace.write("semi.csv", "id;name;city\n1;Ann;Oslo\n"))
        .parse()
        .expect("semicolon file");
    let comma = ImportSource::new(workspace.write("comma.csv", "id,name,city\n1,Ann,Oslo\n"))
        .parse()
        .expect("comma file");

    assert_eq!(semicolon.headers, comma.headers);
    assert_eq!(semicolon.rows, comma.rows);
    assert_eq!(semicolon.structure.map(|s| s.delimiter), Some(b';'));
    assert_eq!(comma.structure.map(|s| s.delimiter), Some(b','));
}

#[test]
fn latin1_file_is_decoded() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_bytes("latin.csv", b"city,country\nM\xfcnchen,DE\n");
    let parsed = ImportSource::new(path).parse().expect("parse");
    assert_eq!(parsed.rows[0].value("city"), Some("München"));
}

#[test]
fn latin1_byte_at_end_of_file_is_decoded() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_bytes("trailing.csv", b"country,city\nCH,Zurich\nFR,Caf\xe9");
    let parsed = ImportSource::new(path).parse().expect("parse");
    assert_eq!(parsed.structure.map(|s| s.encoding), Some(WINDOWS_1252));
    assert_eq!(parsed.rows[1].value("city"), Some("Café"));
}

#[test]
fn explicit_delimiter_overrides_sniffing() {
    let workspace = TestWorkspace::new();
    let mut source = ImportSource::new(workspace.write("odd.csv", "a|b;c\n1|2;3\n"));
    source.parse = ParseOptions {
        delimiter: Some(b';'),
        ..ParseOptions::default()
    };
    let parsed = source.parse().expect("parse");
    assert_eq!(parsed.headers, vec!["a|b", "c"]);
    assert_eq!(parsed.rows[0].value("a|b"), Some("1|2"));
}
