//! Row splitting and currency reconciliation.
//!
//! Streams primary rows one at a time. Each row is either passed through
//! unchanged or replaced by one split row per matching secondary entry,
//! optionally followed by an imbalance row when the splits don't add up.

use crate::amount::Amount;
use crate::error::{Result, SplitError};
use crate::index::SecondaryIndex;
use crate::rule::SplitRule;
use csv::ReaderBuilder;
use log::debug;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Placed in every non-currency destination column of an imbalance row.
pub const IMBALANCE_SENTINEL: &str = "IMBALANCE";

/// Runtime switches for a split run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitOptions {
    /// Append an imbalance row instead of reporting a mismatch.
    pub add_imbalance: bool,
}

/// A split set whose amounts don't add up to the row they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 1-based data row number in the primary stream.
    pub row: usize,

    /// Sum of the currency values written to the split rows.
    pub split_amount: Amount,

    /// Currency value of the primary row.
    pub original_amount: Amount,

    /// The primary row as read, comma joined.
    pub raw: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR: Sum of currency in split rows (${}) does not equal starting currency (${}) at row {} ({})!",
            self.split_amount.to_two_places(),
            self.original_amount.to_two_places(),
            self.row,
            self.raw
        )
    }
}

/// Destination for everything produced while splitting a row.
///
/// Rows and mismatches are handed over the moment they are produced, so
/// output written before a fatal error stays written.
pub trait RowSink {
    /// Receives one output row.
    fn emit_row(&mut self, row: &[String]) -> Result<()>;

    /// Receives one unbalanced split set.
    fn report(&mut self, mismatch: &Mismatch) -> Result<()>;
}

/// What one primary row produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    /// Split rows emitted across all rules.
    pub split_rows: usize,

    /// Imbalance rows emitted across all rules.
    pub imbalance_rows: usize,

    /// Mismatches reported across all rules.
    pub mismatches: usize,
}

impl RowCounts {
    /// Returns `true` if the row was emitted unchanged.
    pub fn is_pass_through(&self) -> bool {
        self.split_rows == 0
    }
}

/// Everything produced for one primary row, in emission order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RowOutcome {
    /// Rows written to the output stream.
    pub rows: Vec<Vec<String>>,

    /// Mismatches reported on the diagnostic channel.
    pub mismatches: Vec<Mismatch>,

    /// Number of split rows among `rows`.
    pub split_rows: usize,

    /// Number of imbalance rows among `rows`.
    pub imbalance_rows: usize,
}

impl RowOutcome {
    /// Returns `true` if the row was emitted unchanged.
    pub fn is_pass_through(&self) -> bool {
        self.split_rows == 0
    }
}

impl RowSink for RowOutcome {
    fn emit_row(&mut self, row: &[String]) -> Result<()> {
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn report(&mut self, mismatch: &Mismatch) -> Result<()> {
        self.mismatches.push(mismatch.clone());
        Ok(())
    }
}

/// Writes rows as CSV and mismatches as diagnostic lines.
struct CsvSink<W: Write, D: Write> {
    writer: csv::Writer<W>,
    diagnostics: D,
}

impl<W: Write, D: Write> CsvSink<W, D> {
    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.diagnostics.flush()?;
        Ok(())
    }
}

impl<W: Write, D: Write> RowSink for CsvSink<W, D> {
    fn emit_row(&mut self, row: &[String]) -> Result<()> {
        self.writer.write_record(row)?;
        Ok(())
    }

    fn report(&mut self, mismatch: &Mismatch) -> Result<()> {
        writeln!(self.diagnostics, "{}", mismatch)?;
        Ok(())
    }
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub rows_read: usize,
    pub rows_passed_through: usize,
    pub rows_split: usize,
    pub split_rows_written: usize,
    pub imbalance_rows_written: usize,
    pub mismatches_reported: usize,
}

impl SplitSummary {
    fn record(&mut self, counts: RowCounts) {
        self.rows_read += 1;
        if counts.is_pass_through() {
            self.rows_passed_through += 1;
        } else {
            self.rows_split += 1;
        }
        self.split_rows_written += counts.split_rows;
        self.imbalance_rows_written += counts.imbalance_rows;
        self.mismatches_reported += counts.mismatches;
    }
}

/// Applies split rules to primary rows.
///
/// Borrows the rule table and secondary index; neither is modified while
/// rows are processed.
pub struct RowSplitter<'a> {
    rules: &'a [SplitRule],
    index: &'a SecondaryIndex,
    options: SplitOptions,
}

impl<'a> RowSplitter<'a> {
    /// Creates a splitter over a loaded rule table and its index.
    pub fn new(rules: &'a [SplitRule], index: &'a SecondaryIndex, options: SplitOptions) -> Self {
        RowSplitter {
            rules,
            index,
            options,
        }
    }

    /// Streams the primary CSV from `reader` to `writer`.
    ///
    /// The header is copied verbatim, then every row is written as soon as
    /// it is produced. Mismatches not corrected by an imbalance row are
    /// written to `diagnostics`, one line each. On a fatal error, rows
    /// already produced are flushed before the error is returned.
    pub fn process_csv<R: Read, W: Write, D: Write>(
        &self,
        reader: R,
        writer: W,
        diagnostics: D,
    ) -> Result<SplitSummary> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut sink = CsvSink {
            writer: csv::WriterBuilder::new().flexible(true).from_writer(writer),
            diagnostics,
        };

        let mut records = csv_reader.records();
        let mut summary = SplitSummary::default();

        match records.next() {
            Some(header) => sink.writer.write_record(&header?)?,
            None => return Ok(summary),
        }

        for (row_idx, result) in records.enumerate() {
            let row_num = row_idx + 1;
            let row: Vec<String> = match result {
                Ok(record) => record.iter().map(str::to_string).collect(),
                Err(e) => {
                    sink.flush()?;
                    return Err(e.into());
                }
            };

            match self.split_row_into(row_num, &row, &mut sink) {
                Ok(counts) => summary.record(counts),
                Err(e) => {
                    sink.flush()?;
                    return Err(e);
                }
            }
        }

        sink.flush()?;
        Ok(summary)
    }

    /// Applies every rule to one primary row and collects what it produces.
    ///
    /// `row_num` is the 1-based data row number used in errors and
    /// diagnostics.
    pub fn split_row(&self, row_num: usize, row: &[String]) -> Result<RowOutcome> {
        let mut outcome = RowOutcome::default();
        let counts = self.split_row_into(row_num, row, &mut outcome)?;
        outcome.split_rows = counts.split_rows;
        outcome.imbalance_rows = counts.imbalance_rows;
        Ok(outcome)
    }

    /// Applies every rule to one primary row, handing each produced row and
    /// mismatch to `sink` as soon as it exists.
    pub fn split_row_into<S: RowSink>(
        &self,
        row_num: usize,
        row: &[String],
        sink: &mut S,
    ) -> Result<RowCounts> {
        let out_row = row.to_vec();
        let mut counts = RowCounts::default();
        // Set by any rule; later rules reconcile against it too.
        let mut row_split = false;

        for (rule_idx, rule) in self.rules.iter().enumerate() {
            if !rule.matches(field(row, rule.match_column, row_num)?) {
                continue;
            }

            let original_value = field(row, rule.currency_column, row_num)?;
            let original_amount =
                Amount::from_str(original_value).map_err(|_| SplitError::CurrencyParse {
                    row: row_num,
                    value: original_value.to_string(),
                })?;

            let key = field(row, rule.compare_column_a, row_num)?;
            let groups = self.index.groups(rule_idx, key);
            debug!(
                "Row {}: rule {} matched, {} group(s) for key '{}'",
                row_num,
                rule_idx + 1,
                groups.len(),
                key
            );

            let mut split_amount = Amount::ZERO;
            for group in groups {
                let mut split_row = out_row.clone();
                for (pos, dest) in rule.destinations() {
                    let value = &group[pos];
                    let slot = field_mut(&mut split_row, dest, row_num)?;
                    if dest == rule.currency_column {
                        let (text, amount) =
                            Amount::extract(value).ok_or_else(|| SplitError::CurrencyParse {
                                row: row_num,
                                value: value.clone(),
                            })?;
                        *slot = text.to_string();
                        split_amount = split_amount.checked_add(amount).ok_or_else(|| {
                            SplitError::AmountOverflow {
                                row: row_num,
                                value: value.clone(),
                            }
                        })?;
                    } else {
                        *slot = value.clone();
                    }
                }
                sink.emit_row(&split_row)?;
                counts.split_rows += 1;
                row_split = true;
            }

            if !row_split || original_amount.reconciles_with(split_amount) {
                continue;
            }

            if self.options.add_imbalance {
                let deficit = original_amount.checked_sub(split_amount).ok_or_else(|| {
                    SplitError::AmountOverflow {
                        row: row_num,
                        value: original_value.to_string(),
                    }
                })?;
                debug!(
                    "Row {}: appending imbalance row for {}",
                    row_num,
                    deficit.to_two_places()
                );
                sink.emit_row(&imbalance_row(&out_row, rule, deficit, row_num)?)?;
                counts.imbalance_rows += 1;
            } else {
                sink.report(&Mismatch {
                    row: row_num,
                    split_amount,
                    original_amount,
                    raw: row.join(","),
                })?;
                counts.mismatches += 1;
            }
        }

        if !row_split {
            debug!("Row {}: passed through", row_num);
            sink.emit_row(&out_row)?;
        }

        Ok(counts)
    }
}

fn imbalance_row(
    out_row: &[String],
    rule: &SplitRule,
    deficit: Amount,
    row_num: usize,
) -> Result<Vec<String>> {
    let mut row = out_row.to_vec();
    for (_, dest) in rule.destinations() {
        let slot = field_mut(&mut row, dest, row_num)?;
        *slot = if dest == rule.currency_column {
            deficit.to_two_places()
        } else {
            IMBALANCE_SENTINEL.to_string()
        };
    }
    Ok(row)
}

fn field(row: &[String], column: usize, row_num: usize) -> Result<&str> {
    row.get(column)
        .map(String::as_str)
        .ok_or(SplitError::FieldAccess {
            row: row_num,
            column,
            width: row.len(),
        })
}

fn field_mut(row: &mut [String], column: usize, row_num: usize) -> Result<&mut String> {
    let width = row.len();
    row.get_mut(column).ok_or(SplitError::FieldAccess {
        row: row_num,
        column,
        width,
    })
}
