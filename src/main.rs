//! Split Rows CLI
//!
//! Splits rows of a CSV file using matching rows from a second CSV file,
//! checking that the split amounts add up to the original.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- rules.csv split.csv --input transactions.csv > split.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `info` to control logging verbosity

use clap::Parser;
use log::info;
use split_rows::{
    load_rules, FieldAccessPolicy, Result, RowSplitter, SecondaryIndex, SplitOptions,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    version,
    about = "Split rows where a column matches a regex based on values in a second input."
)]
struct Cli {
    /// CSV rule file: match column, regex, comparison column A, comparison
    /// column B, destination columns (;-separated), source columns
    /// (;-separated), currency column
    filter: PathBuf,

    /// Secondary CSV file holding the data used to split rows
    split: PathBuf,

    /// Primary CSV input. Defaults to stdin
    #[arg(long)]
    input: Option<PathBuf>,

    /// CSV output, overwritten if it exists. Defaults to stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Correct differences between split and original amounts by adding an
    /// imbalance row
    #[arg(long)]
    add_imbalance: bool,

    /// Skip secondary rows too short for a rule instead of aborting
    #[arg(long)]
    skip_malformed: bool,
}

impl Cli {
    fn options(&self) -> SplitOptions {
        SplitOptions {
            add_imbalance: self.add_imbalance,
        }
    }

    fn field_policy(&self) -> FieldAccessPolicy {
        if self.skip_malformed {
            FieldAccessPolicy::SkipWithWarning
        } else {
            FieldAccessPolicy::Abort
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let rules = load_rules(BufReader::new(File::open(&cli.filter)?))?;
    let index = SecondaryIndex::build(
        BufReader::new(File::open(&cli.split)?),
        &rules,
        cli.field_policy(),
    )?;

    let input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    let splitter = RowSplitter::new(&rules, &index, cli.options());
    let summary = splitter.process_csv(input, output, io::stderr())?;

    info!(
        "Processed {} row(s): {} passed through, {} split into {} row(s), {} imbalance row(s), {} mismatch(es) reported",
        summary.rows_read,
        summary.rows_passed_through,
        summary.rows_split,
        summary.split_rows_written,
        summary.imbalance_rows_written,
        summary.mismatches_reported
    );

    Ok(())
}
