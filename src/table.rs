use std::fmt::Write as _;

use crate::{mapper::MappingReport, schema::TablePlan};

const COLUMN_GAP: &str = "  ";
const MIN_RULE_WIDTH: usize = 3;

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

fn clean_cell(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

fn push_line(output: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    let _ = writeln!(output, "{}", line.trim_end());
}

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| clean_cell(h)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().take(headers.len()).map(|c| clean_cell(c)).collect())
        .collect();

    let mut widths: Vec<usize> = headers
        .iter()
        .map(|h| cell_width(h).max(MIN_RULE_WIDTH))
        .collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let mut output = String::new();
    push_line(&mut output, &headers, &widths);
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut output, &rules, &widths);
    for row in &rows {
        push_line(&mut output, row, &widths);
    }
    output
}

fn flag(value: bool) -> String {
    if value { "yes".to_string() } else { String::new() }
}

pub fn render_plan(plan: &TablePlan) -> String {
    let rows: Vec<Vec<String>> = plan
        .columns
        .iter()
        .map(|column| {
            vec![
                column.name.clone(),
                if column.is_generated {
                    "(generated)".to_string()
                } else {
                    column.original_name.clone()
                },
                column.ddl_type(),
                flag(column.is_primary),
                flag(column.is_required),
                column.confidence.to_string(),
                column.sample_values.join(", "),
            ]
        })
        .collect();
    render_table(
        &["column", "source", "type", "primary", "required", "confidence", "samples"],
        &rows,
    )
}

pub fn render_mapping(report: &MappingReport) -> String {
    let rows: Vec<Vec<String>> = report
        .mappings
        .iter()
        .map(|mapping| {
            vec![
                mapping.original_name.clone(),
                mapping.target_column.clone().unwrap_or_else(|| "-".to_string()),
                mapping.rule.map(|r| r.to_string()).unwrap_or_default(),
                mapping.confidence.to_string(),
                mapping.suggestion.clone().unwrap_or_default(),
            ]
        })
        .collect();
    let mut output = render_table(&["source", "target", "rule", "confidence", "note"], &rows);
    let _ = writeln!(
        output,
        "\n{}/{} column(s) matched ({:.0}%). {}.",
        report.matched,
        report.total,
        report.match_ratio * 100.0,
        report.recommendation
    );
    output
}
