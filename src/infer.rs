use crate::{
    data::{parse_naive_date, parse_naive_datetime},
    schema::{Confidence, SqlType},
};

pub const BOOLEAN_THRESHOLD: f64 = 0.8;
pub const INTEGER_THRESHOLD: f64 = 0.9;
pub const DECIMAL_THRESHOLD: f64 = 0.8;
pub const TEMPORAL_THRESHOLD: f64 = 0.8;

pub const HIGH_CONFIDENCE_FILL: f64 = 0.9;
pub const MEDIUM_CONFIDENCE_FILL: f64 = 0.5;

/// Longest value (in chars) that still yields a bounded VARCHAR.
pub const TEXT_LENGTH_THRESHOLD: usize = 1000;
pub const MIN_VARCHAR_LENGTH: u32 = 255;
pub const VARCHAR_LENGTH_STEP: u32 = 50;
pub const VARCHAR_GROWTH_FACTOR: f64 = 1.5;

const INTEGER_LIMIT: u64 = i32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInference {
    pub sql_type: SqlType,
    pub length: Option<u32>,
    pub confidence: Confidence,
}

/// Null-like cells that never count towards a type.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
}

pub fn is_boolean_token(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "false" | "1" | "0" | "yes" | "no" | "y" | "n"
    )
}

pub fn parse_integer_token(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.contains('.') {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

pub fn is_number_token(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

pub fn has_time_marker(value: &str) -> bool {
    value.contains(':') || value.contains('T')
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    total: usize,
    non_empty: usize,
    boolean_matches: usize,
    integer_matches: usize,
    exceeds_integer: bool,
    number_matches: usize,
    timestamp_matches: usize,
    date_matches: usize,
    max_length: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: Option<&str>) {
        self.total += 1;
        let Some(value) = value.filter(|v| !is_missing(v)) else {
            return;
        };
        let trimmed = value.trim();
        self.non_empty += 1;
        self.max_length = self.max_length.max(trimmed.chars().count());

        if is_boolean_token(trimmed) {
            self.boolean_matches += 1;
        }
        if let Some(parsed) = parse_integer_token(trimmed) {
            self.integer_matches += 1;
            if parsed.unsigned_abs() > INTEGER_LIMIT {
                self.exceeds_integer = true;
            }
        }
        if is_number_token(trimmed) {
            self.number_matches += 1;
        }
        if has_time_marker(trimmed) {
            if parse_naive_datetime(trimmed).is_ok() {
                self.timestamp_matches += 1;
            }
        } else if parse_naive_date(trimmed).is_ok() {
            self.date_matches += 1;
        }
    }

    fn coverage(&self, count: usize) -> f64 {
        if self.non_empty == 0 {
            return 0.0;
        }
        count as f64 / self.non_empty as f64
    }

    fn confidence(&self) -> Confidence {
        if self.total == 0 {
            return Confidence::Low;
        }
        let fill = self.non_empty as f64 / self.total as f64;
        if fill >= HIGH_CONFIDENCE_FILL {
            Confidence::High
        } else if fill >= MEDIUM_CONFIDENCE_FILL {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    fn decide(&self) -> TypeInference {
        let confidence = self.confidence();
        let typed = |sql_type| TypeInference {
            sql_type,
            length: None,
            confidence,
        };

        if self.non_empty == 0 {
            return TypeInference {
                sql_type: SqlType::Varchar,
                length: Some(MIN_VARCHAR_LENGTH),
                confidence: Confidence::Low,
            };
        }
        if self.coverage(self.boolean_matches) >= BOOLEAN_THRESHOLD {
            return typed(SqlType::Boolean);
        }
        if self.coverage(self.integer_matches) >= INTEGER_THRESHOLD {
            return typed(if self.exceeds_integer {
                SqlType::BigInt
            } else {
                SqlType::Integer
            });
        }
        if self.coverage(self.number_matches) >= DECIMAL_THRESHOLD {
            return typed(SqlType::Decimal);
        }
        if self.coverage(self.timestamp_matches) >= TEMPORAL_THRESHOLD {
            return typed(SqlType::Timestamp);
        }
        if self.coverage(self.date_matches) >= TEMPORAL_THRESHOLD {
            return typed(SqlType::Date);
        }
        if self.max_length > TEXT_LENGTH_THRESHOLD {
            return typed(SqlType::Text);
        }
        TypeInference {
            sql_type: SqlType::Varchar,
            length: Some(varchar_length(self.max_length)),
            confidence,
        }
    }
}

/// `max(255, ceil(longest * 1.5))` with the grown length rounded up to a
/// multiple of [`VARCHAR_LENGTH_STEP`].
pub fn varchar_length(longest: usize) -> u32 {
    let grown = (longest as f64 * VARCHAR_GROWTH_FACTOR).ceil() as u32;
    let rounded = grown.div_ceil(VARCHAR_LENGTH_STEP) * VARCHAR_LENGTH_STEP;
    rounded.max(MIN_VARCHAR_LENGTH)
}

/// Infers the SQL type of one column from all of its sampled cells.
///
/// `None`, blank, and `"null"` cells are ignored for type matching but still
/// lower the confidence.
pub fn infer_column_type<'a, I>(values: I) -> TypeInference
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut candidate = TypeCandidate::default();
    for value in values {
        candidate.update(value);
    }
    candidate.decide()
}
