//! Secondary dataset index.
//!
//! Each rule gets its own key space so that rules reading different key
//! columns never see each other's groups.

use crate::error::{Result, SplitError};
use crate::rule::SplitRule;
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use std::collections::HashMap;
use std::io::Read;

/// One secondary row's values at a rule's source columns, in source order.
pub type FieldGroup = Vec<String>;

/// What to do when a row is too short for a referenced column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldAccessPolicy {
    /// Stop the run with [`SplitError::FieldAccess`].
    #[default]
    Abort,

    /// Log a warning and leave the row out of the index for that rule.
    SkipWithWarning,
}

/// Secondary rows grouped by key, one map per rule.
#[derive(Debug, Default)]
pub struct SecondaryIndex {
    scopes: Vec<HashMap<String, Vec<FieldGroup>>>,
}

impl SecondaryIndex {
    /// Builds the index from a secondary CSV reader in one pass.
    ///
    /// The header row is skipped. Rows with an empty key are ignored.
    pub fn build<R: Read>(
        reader: R,
        rules: &[SplitRule],
        policy: FieldAccessPolicy,
    ) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut index = SecondaryIndex {
            scopes: vec![HashMap::new(); rules.len()],
        };

        let mut rows = 0usize;
        for (row_idx, result) in csv_reader.records().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row
            let record = result?;
            rows += 1;

            for (rule_idx, rule) in rules.iter().enumerate() {
                match extract_group(&record, rule, row_num) {
                    Ok(Some((key, group))) => index.insert(rule_idx, key, group),
                    Ok(None) => {}
                    Err(e) => match policy {
                        FieldAccessPolicy::Abort => return Err(e),
                        FieldAccessPolicy::SkipWithWarning => {
                            warn!("Skipping secondary row for rule {}: {}", rule_idx + 1, e);
                        }
                    },
                }
            }
        }

        info!(
            "Indexed {} secondary row(s) into {} key(s)",
            rows,
            index.key_count()
        );
        Ok(index)
    }

    /// Returns the field groups stored for `key` under rule `rule_idx`.
    ///
    /// Unknown rules and keys yield an empty slice.
    pub fn groups(&self, rule_idx: usize, key: &str) -> &[FieldGroup] {
        self.scopes
            .get(rule_idx)
            .and_then(|scope| scope.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of distinct keys across all rule scopes.
    pub fn key_count(&self) -> usize {
        self.scopes.iter().map(HashMap::len).sum()
    }

    fn insert(&mut self, rule_idx: usize, key: String, group: FieldGroup) {
        self.scopes[rule_idx].entry(key).or_default().push(group);
    }
}

/// Returns the key and field group `rule` takes from `record`, or `None` if
/// the key is empty.
fn extract_group(
    record: &StringRecord,
    rule: &SplitRule,
    row: usize,
) -> Result<Option<(String, FieldGroup)>> {
    let key = field(record, rule.compare_column_b, row)?;
    if key.is_empty() {
        return Ok(None);
    }

    let group = rule
        .source_columns
        .iter()
        .map(|&col| field(record, col, row).map(str::to_string))
        .collect::<Result<FieldGroup>>()?;

    Ok(Some((key.to_string(), group)))
}

fn field(record: &StringRecord, column: usize, row: usize) -> Result<&str> {
    record.get(column).ok_or(SplitError::FieldAccess {
        row,
        column,
        width: record.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::load_rules;
    use std::io::Cursor;

    fn rules(rows: &str) -> Vec<SplitRule> {
        let csv = format!("a,b,c,d,e,f,g\n{}", rows);
        load_rules(Cursor::new(csv)).unwrap()
    }

    fn build(rules: &[SplitRule], csv: &str, policy: FieldAccessPolicy) -> Result<SecondaryIndex> {
        SecondaryIndex::build(Cursor::new(csv), rules, policy)
    }

    #[test]
    fn test_groups_in_input_order() {
        let rules = rules("2,SPLIT,0,0,3;4,1;2,4\n");
        let csv = "id,name,amount\nTX1,GroceryA,$60.00\nTX2,Fuel,$10.00\nTX1,GroceryB,$40.00\n";
        let index = build(&rules, csv, FieldAccessPolicy::Abort).unwrap();

        assert_eq!(
            index.groups(0, "TX1"),
            &[
                vec!["GroceryA".to_string(), "$60.00".to_string()],
                vec!["GroceryB".to_string(), "$40.00".to_string()],
            ]
        );
        assert_eq!(index.groups(0, "TX2").len(), 1);
        assert_eq!(index.key_count(), 2);
    }

    #[test]
    fn test_empty_key_skipped() {
        let rules = rules("2,SPLIT,0,0,3,1,3\n");
        let csv = "id,amount\n,5.00\nTX1,6.00\n";
        let index = build(&rules, csv, FieldAccessPolicy::Abort).unwrap();

        assert!(index.groups(0, "").is_empty());
        assert_eq!(index.groups(0, "TX1").len(), 1);
    }

    #[test]
    fn test_rules_do_not_cross_match() {
        // Rule 1 keys on column 0, rule 2 on column 1.
        let rules = rules("2,A,0,0,3,2,3\n2,B,0,1,3,2,3\n");
        let csv = "k0,k1,amt\nX,Y,1.00\n";
        let index = build(&rules, csv, FieldAccessPolicy::Abort).unwrap();

        assert_eq!(index.groups(0, "X").len(), 1);
        assert!(index.groups(0, "Y").is_empty());
        assert_eq!(index.groups(1, "Y").len(), 1);
        assert!(index.groups(1, "X").is_empty());
    }

    #[test]
    fn test_unknown_rule_or_key() {
        let rules = rules("2,A,0,0,3,1,3\n");
        let index = build(&rules, "k,v\nX,1.00\n", FieldAccessPolicy::Abort).unwrap();

        assert!(index.groups(0, "missing").is_empty());
        assert!(index.groups(7, "X").is_empty());
    }

    #[test]
    fn test_short_row_aborts() {
        let rules = rules("2,A,0,0,3,2,3\n");
        let result = build(&rules, "k,v,amt\nX,1.00\n", FieldAccessPolicy::Abort);

        match result {
            Err(SplitError::FieldAccess { row, column, width }) => {
                assert_eq!(row, 2);
                assert_eq!(column, 2);
                assert_eq!(width, 2);
            }
            other => panic!("Expected FieldAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_short_row_skipped_with_policy() {
        let rules = rules("2,A,0,0,3,2,3\n");
        let csv = "k,v,amt\nX,1.00\nX,v,2.00\n";
        let index = build(&rules, csv, FieldAccessPolicy::SkipWithWarning).unwrap();

        assert_eq!(index.groups(0, "X"), &[vec!["2.00".to_string()]]);
    }

    #[test]
    fn test_header_only() {
        let rules = rules("2,A,0,0,3,1,3\n");
        let index = build(&rules, "k,v\n", FieldAccessPolicy::Abort).unwrap();
        assert_eq!(index.key_count(), 0);
    }
}
