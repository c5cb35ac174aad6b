//! rcv-ingest: the ledger-row normalizer.
//!
//! Reads delimited SII purchase-ledger exports (semicolon/Latin-1 CSV or
//! tab-separated TSV), detects the column layout once per file, and streams
//! one normalized record or one rejection per data row. Persistence lives in
//! `rcv-store`; this crate never touches the network.

pub mod columns;
pub mod layout;
pub mod normalize;
pub mod reader;
pub mod validate;

pub use columns::{HeaderMap, HeaderScan};
pub use layout::{detect_layout, ColumnLayout, ShiftTable};
pub use normalize::{
    IngestSummary, Normalizer, RejectReason, RowField, RowOutcome, RowRejection,
};
pub use reader::{LedgerReader, ReadOptions, TextEncoding, TotalPolicy};
pub use validate::{validate_file, FieldStats, ValidationReport};
