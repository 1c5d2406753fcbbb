use anyhow::Result;

use crate::db::DatabaseStats;
use crate::search::{OperatorCategory, ParsedQuery, SearchResult};

pub fn format_search_result(result: &SearchResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn format_parsed_query(parsed: &ParsedQuery) -> Result<String> {
    Ok(serde_json::to_string_pretty(parsed)?)
}

pub fn format_operator_help(help: &[OperatorCategory]) -> Result<String> {
    Ok(serde_json::to_string_pretty(help)?)
}

pub fn format_stats(stats: &DatabaseStats) -> Result<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}
