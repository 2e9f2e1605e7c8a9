//! Matching inferred source columns onto the columns of an existing table.
//!
//! Each rule only sees sources and targets left unclaimed by earlier rules.

use std::{collections::HashSet, fmt};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    schema::{DetectedColumn, SqlType},
    store::TableColumn,
};

pub const SIMILARITY_THRESHOLD: f64 = 0.7;
pub const SUGGESTION_THRESHOLD: f64 = 0.3;
pub const MAX_SUGGESTIONS: usize = 3;
/// Shorter names are too generic to match by containment.
pub const SUBSTRING_MIN_LENGTH: usize = 3;

pub const READY_RATIO: f64 = 0.9;
pub const REVIEW_RATIO: f64 = 0.7;
pub const MANUAL_RATIO: f64 = 0.5;

const ALIAS_GROUPS: &[&[&str]] = &[
    &["id", "no", "number", "seq", "sequence", "key"],
    &["name", "title", "label", "description", "desc"],
    &["date", "time", "timestamp", "created", "updated", "modified"],
    &["status", "state", "condition", "active", "enabled"],
    &["type", "category", "kind", "class", "group"],
    &["email", "mail", "e_mail", "email_address"],
    &["phone", "telephone", "mobile", "contact"],
    &["address", "location", "addr", "place"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    ExactName,
    OriginalName,
    Substring,
    Alias,
    Similarity,
}

impl MatchRule {
    const ORDER: [MatchRule; 5] = [
        MatchRule::ExactName,
        MatchRule::OriginalName,
        MatchRule::Substring,
        MatchRule::Alias,
        MatchRule::Similarity,
    ];

    pub fn is_exact(&self) -> bool {
        matches!(self, MatchRule::ExactName | MatchRule::OriginalName)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::ExactName => "exact",
            MatchRule::OriginalName => "original",
            MatchRule::Substring => "substring",
            MatchRule::Alias => "alias",
            MatchRule::Similarity => "similarity",
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
    None,
}

impl MatchConfidence {
    fn score(name_exact: bool, type_compatible: bool) -> Self {
        match (name_exact, type_compatible) {
            (true, true) => MatchConfidence::High,
            (true, false) | (false, true) => MatchConfidence::Medium,
            (false, false) => MatchConfidence::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::High => "high",
            MatchConfidence::Medium => "medium",
            MatchConfidence::Low => "low",
            MatchConfidence::None => "none",
        }
    }
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub source_column: String,
    pub original_name: String,
    pub target_column: Option<String>,
    pub is_matched: bool,
    pub confidence: MatchConfidence,
    pub rule: Option<MatchRule>,
    pub suggestion: Option<String>,
}

impl ColumnMapping {
    fn matched(source: &DetectedColumn, target: &TableColumn, rule: MatchRule) -> Self {
        let type_ok = types_compatible(source.inferred_type, &target.sql_type);
        ColumnMapping {
            source_column: source.name.clone(),
            original_name: source.original_name.clone(),
            target_column: Some(target.column_name.clone()),
            is_matched: true,
            confidence: MatchConfidence::score(rule.is_exact(), type_ok),
            rule: Some(rule),
            suggestion: None,
        }
    }

    fn unmatched(source: &DetectedColumn, targets: &[TableColumn]) -> Self {
        ColumnMapping {
            source_column: source.name.clone(),
            original_name: source.original_name.clone(),
            target_column: None,
            is_matched: false,
            confidence: MatchConfidence::None,
            rule: None,
            suggestion: suggest(&source.name, targets),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Ready,
    ReviewUnmapped,
    ManualReview,
    CreateNewTable,
}

impl Recommendation {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= READY_RATIO {
            Recommendation::Ready
        } else if ratio >= REVIEW_RATIO {
            Recommendation::ReviewUnmapped
        } else if ratio >= MANUAL_RATIO {
            Recommendation::ManualReview
        } else {
            Recommendation::CreateNewTable
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::Ready => "Ready for import",
            Recommendation::ReviewUnmapped => "Review unmapped columns before importing",
            Recommendation::ManualReview => "Manual review required",
            Recommendation::CreateNewTable => "Consider creating a new table instead",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingReport {
    pub mappings: Vec<ColumnMapping>,
    pub matched: usize,
    pub total: usize,
    pub match_ratio: f64,
    pub recommendation: Recommendation,
}

impl MappingReport {
    /// `(source column, target column)` pairs of every matched mapping.
    pub fn bindings(&self) -> Vec<(String, String)> {
        self.mappings
            .iter()
            .filter_map(|m| {
                m.target_column
                    .as_ref()
                    .map(|target| (m.source_column.clone(), target.clone()))
            })
            .collect()
    }
}

pub fn levenshtein_distance(left: &str, right: &str) -> usize {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0usize; right.len() + 1];
    for (i, l) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, r) in right.iter().enumerate() {
            let substitution = previous[j] + usize::from(l != r);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[right.len()]
}

/// `1 - distance / longest`, compared case-insensitively.
pub fn similarity(left: &str, right: &str) -> f64 {
    let left = left.to_lowercase();
    let right = right.to_lowercase();
    let longest = left.chars().count().max(right.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(&left, &right) as f64 / longest as f64
}

/// Whether a source of `source` type can be stored in a column declared `target`.
pub fn types_compatible(source: SqlType, target: &str) -> bool {
    let lowered = target.trim().to_ascii_lowercase();
    let base = lowered.split('(').next().unwrap_or_default().trim();
    let accepted: &[&str] = match source {
        SqlType::Boolean => &["boolean", "bool"],
        SqlType::Integer => &[
            "integer", "int", "int4", "bigint", "int8", "smallint", "int2", "numeric", "decimal",
            "serial", "bigserial",
        ],
        SqlType::BigInt => &["bigint", "int8", "numeric", "decimal", "bigserial"],
        SqlType::Serial => &["integer", "int", "int4", "bigint", "int8", "serial", "bigserial"],
        SqlType::Decimal => &[
            "numeric",
            "decimal",
            "real",
            "double precision",
            "float4",
            "float8",
            "money",
        ],
        SqlType::Date => &[
            "date",
            "timestamp",
            "timestamp without time zone",
            "timestamp with time zone",
            "timestamptz",
        ],
        SqlType::Timestamp => &[
            "timestamp",
            "timestamp without time zone",
            "timestamp with time zone",
            "timestamptz",
        ],
        SqlType::Varchar => &["character varying", "varchar", "text", "character", "char", "bpchar"],
        SqlType::Text => &["text", "character varying", "varchar"],
    };
    accepted.contains(&base)
}

/// Groups containing the whole name. Name fragments such as the `id` in
/// `customer_id` never count.
fn alias_groups(name: &str) -> HashSet<usize> {
    let lowered = name.to_lowercase();
    ALIAS_GROUPS
        .iter()
        .enumerate()
        .filter(|(_, group)| group.contains(&lowered.as_str()))
        .map(|(index, _)| index)
        .collect()
}

fn contains_either_way(source: &str, target: &str) -> bool {
    let (shorter, longer) = if source.len() <= target.len() {
        (source, target)
    } else {
        (target, source)
    };
    shorter.chars().count() >= SUBSTRING_MIN_LENGTH && longer.contains(shorter)
}

/// Score of `source` against `target` under `rule`; `None` when it does not apply.
fn rule_score(rule: MatchRule, source: &DetectedColumn, target: &TableColumn) -> Option<f64> {
    let source_name = source.name.to_lowercase();
    let target_name = target.column_name.to_lowercase();
    let applies = match rule {
        MatchRule::ExactName => source_name == target_name,
        MatchRule::OriginalName => source.original_name.trim().to_lowercase() == target_name,
        MatchRule::Substring => contains_either_way(&source_name, &target_name),
        MatchRule::Alias => {
            let source_groups = alias_groups(&source_name);
            !source_groups.is_disjoint(&alias_groups(&target_name))
        }
        MatchRule::Similarity => {
            let score = similarity(&source_name, &target_name);
            return (score > SIMILARITY_THRESHOLD).then_some(score);
        }
    };
    applies.then(|| similarity(&source_name, &target_name))
}

fn suggest(source: &str, targets: &[TableColumn]) -> Option<String> {
    let names = targets
        .iter()
        .map(|t| (similarity(source, &t.column_name), t.column_name.as_str()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .sorted_by(|a, b| b.0.total_cmp(&a.0))
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name)
        .join(", ");
    (!names.is_empty()).then(|| format!("Similar columns: {names}"))
}

/// Maps every source column onto at most one target column.
///
/// Within one rule the best-scoring unclaimed target wins; ties go to the
/// target listed first.
pub fn map_columns(sources: &[DetectedColumn], targets: &[TableColumn]) -> MappingReport {
    let mut assigned: Vec<Option<(usize, MatchRule)>> = vec![None; sources.len()];
    let mut claimed = vec![false; targets.len()];

    for rule in MatchRule::ORDER {
        for (source_index, source) in sources.iter().enumerate() {
            if assigned[source_index].is_some() {
                continue;
            }
            let mut best: Option<(usize, f64)> = None;
            for (target_index, target) in targets.iter().enumerate() {
                if claimed[target_index] {
                    continue;
                }
                if let Some(score) = rule_score(rule, source, target)
                    && best.is_none_or(|(_, best_score)| score > best_score)
                {
                    best = Some((target_index, score));
                }
            }
            if let Some((target_index, _)) = best {
                claimed[target_index] = true;
                assigned[source_index] = Some((target_index, rule));
            }
        }
    }

    let mappings: Vec<ColumnMapping> = sources
        .iter()
        .zip(&assigned)
        .map(|(source, assignment)| match assignment {
            Some((target_index, rule)) => {
                ColumnMapping::matched(source, &targets[*target_index], *rule)
            }
            None => ColumnMapping::unmatched(source, targets),
        })
        .collect();

    let matched = mappings.iter().filter(|m| m.is_matched).count();
    let total = mappings.len();
    let match_ratio = if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    };
    MappingReport {
        mappings,
        matched,
        total,
        match_ratio,
        recommendation: Recommendation::from_ratio(match_ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{infer::TypeInference, schema::Confidence};

    fn source(name: &str, original: &str, sql_type: SqlType) -> DetectedColumn {
        DetectedColumn::from_inference(
            name.to_string(),
            original.to_string(),
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
    fn levenshtein_matches_known_distances() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
        assert!((similarity("Name", "name") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_name_with_compatible_type_is_high() {
        let report = map_columns(
            &[source("amount", "Amount", SqlType::Decimal)],
            &[target("amount", "numeric")],
        );
        let mapping = &report.mappings[0];
        assert_eq!(mapping.rule, Some(MatchRule::ExactName));
        assert_eq!(mapping.confidence, MatchConfidence::High);
        assert_eq!(report.recommendation, Recommendation::Ready);
    }

    #[test]
    fn exact_name_with_incompatible_type_is_medium() {
        let report = map_columns(
            &[source("amount", "amount", SqlType::Varchar)],
            &[target("amount", "integer")],
        );
        assert_eq!(report.mappings[0].confidence, MatchConfidence::Medium);
    }

    #[test]
    fn original_header_matches_before_fuzzier_rules() {
        let report = map_columns(
            &[source("first_name", "FirstName", SqlType::Varchar)],
            &[target("first_name_old", "text"), target("firstname", "text")],
        );
        assert_eq!(report.mappings[0].target_column.as_deref(), Some("firstname"));
        assert_eq!(report.mappings[0].rule, Some(MatchRule::OriginalName));
    }

    #[test]
    fn emp_name_maps_to_name() {
        let report = map_columns(
            &[source("emp_name", "emp_name", SqlType::Varchar)],
            &[target("name", "character varying"), target("department", "character varying")],
        );
        let mapping = &report.mappings[0];
        assert_eq!(mapping.target_column.as_deref(), Some("name"));
        assert!(matches!(
            mapping.confidence,
            MatchConfidence::High | MatchConfidence::Medium
        ));
    }

    #[test]
    fn alias_groups_link_synonyms() {
        let report = map_columns(
            &[source("category", "Category", SqlType::Varchar)],
            &[target("kind", "text")],
        );
        assert_eq!(report.mappings[0].rule, Some(MatchRule::Alias));
        assert_eq!(report.mappings[0].confidence, MatchConfidence::Medium);

        let report = map_columns(
            &[source("e_mail", "E-Mail", SqlType::Varchar)],
            &[target("email_address", "text")],
        );
        assert!(report.mappings[0].is_matched);
    }

    #[test]
    fn alias_needs_the_whole_name() {
        assert!(alias_groups("customer_id").is_empty());
        assert!(alias_groups("status_date").is_empty());
        assert_eq!(alias_groups("Mail"), alias_groups("email"));
    }

    #[test]
    fn targets_are_claimed_once() {
        let report = map_columns(
            &[
                source("customer", "customer", SqlType::Varchar),
                source("customer_name", "customer_name", SqlType::Varchar),
            ],
            &[target("customer_name", "text")],
        );
        assert!(!report.mappings[0].is_matched);
        assert_eq!(
            report.mappings[1].target_column.as_deref(),
            Some("customer_name")
        );
        assert_eq!(report.bindings().len(), 1);
    }

    #[test]
    fn unmatched_columns_get_suggestions() {
        let report = map_columns(
            &[source("zzz", "zzz", SqlType::Varchar), source("qty", "qty", SqlType::Integer)],
            &[target("abc", "text"), target("quantity", "integer")],
        );
        let unmatched = &report.mappings[0];
        assert!(!unmatched.is_matched);
        assert_eq!(unmatched.confidence, MatchConfidence::None);
        assert!(unmatched.target_column.is_none());
        assert_eq!(unmatched.suggestion, None);

        let qty = &report.mappings[1];
        assert!(!qty.is_matched);
        assert_eq!(qty.suggestion.as_deref(), Some("Similar columns: quantity"));
        assert_eq!(report.recommendation, Recommendation::CreateNewTable);
    }

    #[test]
    fn recommendation_thresholds() {
        assert_eq!(Recommendation::from_ratio(0.95), Recommendation::Ready);
        assert_eq!(Recommendation::from_ratio(0.7), Recommendation::ReviewUnmapped);
        assert_eq!(Recommendation::from_ratio(0.5), Recommendation::ManualReview);
        assert_eq!(Recommendation::from_ratio(0.49), Recommendation::CreateNewTable);
    }

    #[test]
    fn type_compatibility_table() {
        assert!(types_compatible(SqlType::Integer, "bigint"));
        assert!(types_compatible(SqlType::Varchar, "character varying(40)"));
        assert!(types_compatible(SqlType::Timestamp, "timestamp with time zone"));
        assert!(!types_compatible(SqlType::Boolean, "integer"));
        assert!(!types_compatible(SqlType::Text, "date"));
    }
}
