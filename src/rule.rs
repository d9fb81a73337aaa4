//! Split rule definitions and the rule table loader.

use crate::error::{Result, SplitError};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use std::io::Read;

/// Number of fields every rule definition row must carry.
pub const RULE_FIELDS: usize = 7;

/// Raw rule definition as read from CSV.
///
/// Fields are positional; the rule file's header names are ignored.
#[derive(Debug, Deserialize)]
pub struct RuleRecord {
    /// Primary column the pattern is tested against
    pub match_column: String,

    /// Regular expression selecting rows to split
    pub match_pattern: String,

    /// Primary column holding the lookup key
    pub compare_column_a: String,

    /// Secondary column holding the index key
    pub compare_column_b: String,

    /// Semicolon separated primary columns to overwrite
    pub destination_columns: String,

    /// Semicolon separated secondary columns, paired with destinations
    pub source_columns: String,

    /// Destination column that carries the monetary amount
    pub currency_column: String,
}

impl RuleRecord {
    /// Validates the raw record into a [`SplitRule`].
    ///
    /// `row` is the 1-based line number in the rule file, used in errors.
    pub fn parse(&self, row: usize) -> Result<SplitRule> {
        let malformed = |message: String| SplitError::MalformedRule { row, message };

        let match_column = parse_index(&self.match_column, "match column").map_err(malformed)?;
        let match_pattern = Regex::new(&self.match_pattern)
            .map_err(|e| malformed(format!("invalid pattern '{}': {}", self.match_pattern, e)))?;
        let compare_column_a =
            parse_index(&self.compare_column_a, "comparison column A").map_err(malformed)?;
        let compare_column_b =
            parse_index(&self.compare_column_b, "comparison column B").map_err(malformed)?;
        let destination_columns =
            parse_index_list(&self.destination_columns, "destination columns").map_err(malformed)?;
        let source_columns =
            parse_index_list(&self.source_columns, "source columns").map_err(malformed)?;
        let currency_column =
            parse_index(&self.currency_column, "currency column").map_err(malformed)?;

        if destination_columns.len() != source_columns.len() {
            return Err(malformed(format!(
                "{} destination columns but {} source columns",
                destination_columns.len(),
                source_columns.len()
            )));
        }

        if !destination_columns.contains(&currency_column) {
            return Err(malformed(format!(
                "currency column {} is not one of the destination columns",
                currency_column
            )));
        }

        Ok(SplitRule {
            match_column,
            match_pattern,
            compare_column_a,
            compare_column_b,
            destination_columns,
            source_columns,
            currency_column,
        })
    }
}

/// A validated row-splitting directive.
///
/// # Invariants
///
/// - `destination_columns.len() == source_columns.len()`
/// - `currency_column` is one of `destination_columns`
#[derive(Debug, Clone)]
pub struct SplitRule {
    /// Primary column tested by `match_pattern`.
    pub match_column: usize,

    /// Pattern that selects primary rows for splitting.
    pub match_pattern: Regex,

    /// Primary column whose value is looked up in the secondary index.
    pub compare_column_a: usize,

    /// Secondary column whose value keys the secondary index.
    pub compare_column_b: usize,

    /// Primary columns overwritten in each split row.
    pub destination_columns: Vec<usize>,

    /// Secondary columns copied into the destinations, position for position.
    pub source_columns: Vec<usize>,

    /// Destination column holding the amount that must reconcile.
    pub currency_column: usize,
}

impl SplitRule {
    /// Returns `true` if the pattern finds a match anywhere in `value`.
    pub fn matches(&self, value: &str) -> bool {
        self.match_pattern.is_match(value)
    }

    /// Destination columns paired with the position of their source value.
    pub fn destinations(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.destination_columns.iter().copied().enumerate()
    }
}

/// Loads the rule table from a CSV reader.
///
/// The first row is a header and is skipped. Any malformed row aborts the
/// load; no partial table is returned.
pub fn load_rules<R: Read>(reader: R) -> Result<Vec<SplitRule>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rules = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let row_num = row_idx + 2; // 1-indexed, accounting for header row
        let record = result?;
        rules.push(parse_record(&record, row_num)?);
    }

    info!("Loaded {} split rule(s)", rules.len());
    Ok(rules)
}

fn parse_record(record: &StringRecord, row: usize) -> Result<SplitRule> {
    if record.len() != RULE_FIELDS {
        return Err(SplitError::MalformedRule {
            row,
            message: format!("expected {} fields, found {}", RULE_FIELDS, record.len()),
        });
    }

    let raw: RuleRecord = record.deserialize(None).map_err(|e| SplitError::MalformedRule {
        row,
        message: e.to_string(),
    })?;
    let rule = raw.parse(row)?;
    debug!(
        "Row {}: rule on column {} /{}/ -> columns {:?}",
        row, rule.match_column, rule.match_pattern, rule.destination_columns
    );
    Ok(rule)
}

fn parse_index(field: &str, what: &str) -> std::result::Result<usize, String> {
    let trimmed = field.trim();
    trimmed
        .parse::<usize>()
        .map_err(|_| format!("{} '{}' is not a column index", what, trimmed))
}

fn parse_index_list(field: &str, what: &str) -> std::result::Result<Vec<usize>, String> {
    if field.trim().is_empty() {
        return Err(format!("{} list is empty", what));
    }
    field.split(';').map(|part| parse_index(part, what)).collect()
}
