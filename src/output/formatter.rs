use owo_colors::OwoColorize;
use std::io::IsTerminal;
use terminal_size::{terminal_size, Width};

use crate::records::Record;
use crate::scoring::{ScoreResult, ScoringRule};

/// A record with its calculated score for display
pub struct ScoredRecord<'a> {
    pub record: &'a Record,
    pub result: &'a ScoreResult,
}

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a score in compact notation (1.5k, 2.3M, 847, -12, 7.5)
pub fn format_score(score: f64) -> String {
    let magnitude = score.abs();
    let formatted = if magnitude >= 1_000_000.0 {
        format!("{:.1}M", magnitude / 1_000_000.0)
    } else if magnitude >= 1_000.0 {
        format!("{:.1}k", magnitude / 1_000.0)
    } else {
        format!("{:.1}", magnitude)
    };

    // Trim trailing .0 (e.g., "1.0k" -> "1k", "7.0" -> "7")
    let trimmed = formatted
        .replace(".0M", "M")
        .replace(".0k", "k");
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(&trimmed);

    if score < 0.0 && trimmed != "0" {
        format!("-{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Format a point value with its sign, e.g. "+10", "-2.5"
fn format_points(points: f64) -> String {
    let magnitude = format_score(points.abs());
    if points < 0.0 {
        format!("-{}", magnitude)
    } else {
        format!("+{}", magnitude)
    }
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, accounting for Unicode
fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

const INDEX_WIDTH: usize = 3;
const SCORE_WIDTH: usize = 7;
const MODULE_WIDTH: usize = 11;
const SEPARATOR: &str = "  ";

/// Name column width left after the fixed columns and the id
fn name_width(term_width: usize, id: &str) -> usize {
    let fixed_width =
        INDEX_WIDTH + 1 + SCORE_WIDTH + MODULE_WIDTH + SEPARATOR.len() * 3 + id.chars().count();
    if term_width > fixed_width + 10 {
        term_width - fixed_width
    } else {
        20
    }
}

/// Format records as scored table with columns: Index, Score, Module, Name, Id
/// No headers.
/// Index column: 3 chars (fits "99."), right-aligned
/// Score column is right-aligned, 7 chars wide (fits "-999.9k")
/// Module column is left-aligned, 11 chars wide (fits "opportunity")
pub fn format_scored_table(records: &[ScoredRecord], use_colors: bool) -> String {
    if records.is_empty() {
        return "No records found.".to_string();
    }

    let term_width = get_terminal_width();

    records
        .iter()
        .enumerate()
        .map(|(idx, scored)| {
            let index_str = format!("{:>2}.", idx + 1);
            let score_str = format!(
                "{:>width$}",
                format_score(scored.result.score),
                width = SCORE_WIDTH
            );
            let module_str = format!(
                "{:<width$}",
                scored.record.module.as_str(),
                width = MODULE_WIDTH
            );

            let display_name = scored.record.display_name();
            let name = match term_width {
                Some(width) => truncate_name(display_name, name_width(width, &scored.record.id)),
                None => display_name.to_string(),
            };

            if use_colors {
                let score_colored = if scored.result.score < 0.0 {
                    score_str.red().bold().to_string()
                } else {
                    score_str.bold().to_string()
                };
                format!(
                    "{} {}{}{}{}{}{}{}",
                    index_str.dimmed(),
                    score_colored,
                    SEPARATOR,
                    module_str.cyan(),
                    SEPARATOR,
                    name,
                    SEPARATOR,
                    scored.record.id.underline()
                )
            } else {
                format!(
                    "{} {}{}{}{}{}{}{}",
                    index_str,
                    score_str,
                    SEPARATOR,
                    module_str,
                    SEPARATOR,
                    name,
                    SEPARATOR,
                    scored.record.id
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format records as tab-separated values for scripting
/// Columns: score, module, id, name (no headers, no colors)
pub fn format_tsv(records: &[ScoredRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }

    records
        .iter()
        .map(|scored| {
            format!(
                "{}\t{}\t{}\t{}",
                scored.result.score,
                scored.record.module,
                scored.record.id,
                scored.record.display_name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format one record's score with every visited criterion
pub fn format_breakdown(record: &Record, result: &ScoreResult, use_colors: bool) -> String {
    let mut lines = Vec::new();

    let header = format!(
        "{} ({} {})",
        record.display_name(),
        record.module,
        record.id
    );
    if use_colors {
        lines.push(header.bold().to_string());
    } else {
        lines.push(header);
    }
    lines.push(format!(
        "  Score: {} ({} rule{} evaluated)",
        format_score(result.score),
        result.rules_evaluated,
        if result.rules_evaluated == 1 { "" } else { "s" }
    ));

    if result.rules_evaluated == 0 {
        lines.push(format!("  No active rules for module {}", record.module));
        return lines.join("\n");
    }

    for contribution in &result.breakdown {
        let signed = format_points(contribution.operation.apply(contribution.points));
        let line = format!(
            "  [{}] {} #{}: {}",
            if contribution.matched { "x" } else { " " },
            contribution.rule,
            contribution.order,
            signed
        );
        if !use_colors {
            lines.push(line);
        } else if contribution.matched {
            lines.push(line.green().to_string());
        } else {
            lines.push(line.dimmed().to_string());
        }
    }

    lines.join("\n")
}

/// Format configured rules, one line per rule with its criteria count
pub fn format_rule_list(rules: &[&ScoringRule], use_colors: bool) -> String {
    if rules.is_empty() {
        return "No rules configured.".to_string();
    }

    rules
        .iter()
        .map(|rule| {
            let count = rule.criteria.len();
            let status = if rule.active { "active" } else { "inactive" };
            let line = format!(
                "{:<11}  {:<8}  {}  ({} criteri{})",
                rule.module.as_str(),
                status,
                rule.name,
                count,
                if count == 1 { "on" } else { "a" }
            );
            if use_colors && !rule.active {
                line.dimmed().to_string()
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
