//! Local Record Table Module
//!
//! Append-only delimited file with the rows a node decided to own, one line per
//! committed record in receipt order. Rows are always normalized to the declared
//! column count so the file keeps a stable shape even when upstream input is
//! malformed. Nothing here deduplicates, indexes or rewrites the file.

pub mod local;

pub use local::{LocalTable, split_fields, table_file_name};
