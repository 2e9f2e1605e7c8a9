use tabular_import::{
    infer::TypeInference,
    mapper::{MatchConfidence, MatchRule, Recommendation, map_columns, similarity},
    schema::{Confidence, DetectedColumn, SqlType},
    store::TableColumn,
};

fn source(name: &str, sql_type: SqlType) -> DetectedColumn {
    DetectedColumn::from_inference(
        name.to_string(),
        name.to_string(),
        TypeInference {
            sql_type,
            length: None,
            confidence: Confidence::High,
        },
        Vec::new(),
    )
}

fn target(name: &str, sql_type: &str) -> TableColumn {
    TableColumn {
        column_name: name.to_string(),
        sql_type: sql_type.to_string(),
        nullable: true,
        default_value: None,
        max_length: None,
    }
}

#[test]
fn prefixed_source_finds_its_target() {
    let report = map_columns(
        &[source("emp_name", SqlType::Varchar)],
        &[target("id", "integer"), target("name", "character varying")],
    );
    let mapping = &report.mappings[0];
    assert!(mapping.is_matched);
    assert_eq!(mapping.target_column.as_deref(), Some("name"));
    assert_eq!(mapping.rule, Some(MatchRule::Substring));
    assert_eq!(mapping.confidence, MatchConfidence::Medium);
}

#[test]
fn report_summarizes_coverage() {
    let sources = [
        source("id", SqlType::Integer),
        source("customer_email", SqlType::Varchar),
        source("qty", SqlType::Integer),
        source("zzz", SqlType::Varchar),
    ];
    let targets = [
        target("id", "integer"),
        target("mail", "character varying"),
        target("quantity", "integer"),
    ];
    let report = map_columns(&sources, &targets);

    let matched: Vec<(String, Option<String>)> = report
        .mappings
        .iter()
        .map(|m| (m.source_column.clone(), m.target_column.clone()))
        .collect();
    assert_eq!(matched[0], ("id".to_string(), Some("id".to_string())));
    assert_eq!(matched[1].1.as_deref(), Some("mail"));
    assert_eq!(report.matched, 2);
    assert_eq!(report.total, 4);
    assert_eq!(report.recommendation, Recommendation::ManualReview);
    assert!(!report.mappings[3].is_matched);
}

#[test]
fn each_target_is_used_once() {
    let report = map_columns(
        &[source("name", SqlType::Varchar), source("Name", SqlType::Varchar)],
        &[target("name", "text")],
    );
    assert_eq!(report.matched, 1);
    assert!(report.mappings[0].is_matched);
    assert!(!report.mappings[1].is_matched);
}

#[test]
fn no_targets_recommends_a_new_table() {
    let report = map_columns(&[source("anything", SqlType::Text)], &[]);
    assert_eq!(report.matched, 0);
    assert_eq!(report.recommendation, Recommendation::CreateNewTable);
}

#[test]
fn similarity_is_case_insensitive() {
    assert_eq!(similarity("Email", "email"), 1.0);
    assert!(similarity("colour", "color") > 0.7);
    assert!(similarity("abc", "xyz") < 0.3);
}

#[test]
fn foreign_key_name_does_not_claim_the_primary_key() {
    let report = map_columns(
        &[source("customer_id", SqlType::Integer)],
        &[target("id", "integer"), target("total", "numeric")],
    );
    let mapping = &report.mappings[0];
    assert!(!mapping.is_matched);
    assert_eq!(mapping.target_column, None);
    assert_eq!(report.matched, 0);
}
