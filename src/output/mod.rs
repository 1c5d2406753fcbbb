pub mod json;
pub mod table;

use anyhow::Result;

use crate::db::DatabaseStats;
use crate::search::{OperatorCategory, ParsedQuery, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

pub fn format_search_result(format: OutputFormat, result: &SearchResult) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_search_result(result)),
        OutputFormat::Json => json::format_search_result(result),
    }
}

pub fn format_parsed_query(format: OutputFormat, parsed: &ParsedQuery) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_parsed_query(parsed)),
        OutputFormat::Json => json::format_parsed_query(parsed),
    }
}

pub fn format_operator_help(format: OutputFormat, help: &[OperatorCategory]) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_operator_help(help)),
        OutputFormat::Json => json::format_operator_help(help),
    }
}

pub fn format_stats(format: OutputFormat, stats: &DatabaseStats) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_stats(stats)),
        OutputFormat::Json => json::format_stats(stats),
    }
}
