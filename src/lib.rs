//! # Split Rows
//!
//! A streaming CSV filter that splits primary rows into several rows using
//! a secondary dataset, and checks that the split amounts add back up to
//! the original.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: Amounts use `rust_decimal`, compared with a 0.001 tolerance
//! - **Streaming processing**: Only the rules and the secondary index are held in memory
//! - **Independent rows**: Every output row is its own copy
//! - **Order preserving**: Output follows input order, then rule order
//!
//! ## Example
//!
//! ```no_run
//! use split_rows::{load_rules, FieldAccessPolicy, RowSplitter, SecondaryIndex, SplitOptions};
//! use std::io::Cursor;
//!
//! let rules = load_rules(Cursor::new("m,r,a,b,d,s,c\n2,SPLIT,0,0,3;4,1;2,4\n")).unwrap();
//! let secondary = "id,name,amount\nTX1,GroceryA,$60.00\nTX1,GroceryB,$40.00\n";
//! let index = SecondaryIndex::build(Cursor::new(secondary), &rules, FieldAccessPolicy::Abort).unwrap();
//!
//! let primary = "id,date,kind,memo,amount\nTX1,2024-01-01,SPLIT,,100.00\n";
//! RowSplitter::new(&rules, &index, SplitOptions::default())
//!     .process_csv(Cursor::new(primary), std::io::stdout(), std::io::stderr())
//!     .unwrap();
//! ```

pub mod amount;
pub mod error;
pub mod index;
pub mod rule;
pub mod splitter;

pub use amount::Amount;
pub use error::{Result, SplitError};
pub use index::{FieldAccessPolicy, FieldGroup, SecondaryIndex};
pub use rule::{load_rules, RuleRecord, SplitRule};
pub use splitter::{
    Mismatch, RowCounts, RowOutcome, RowSink, RowSplitter, SplitOptions, SplitSummary,
    IMBALANCE_SENTINEL,
};
