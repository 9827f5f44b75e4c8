pub mod formatter;

pub use formatter::{
    format_breakdown, format_rule_list, format_score, format_scored_table, format_tsv,
    should_use_colors, ScoredRecord,
};
