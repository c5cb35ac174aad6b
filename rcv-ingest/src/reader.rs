//! Encoded delimited-file reading.
//!
//! Observed export variants: semicolon-separated Latin-1 CSV and
//! tab-separated Latin-1 TSV, both with a header row. Delimiter, encoding,
//! date format, and number convention are caller configuration, never
//! hard-coded here.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::StringRecord;
use encoding_rs::{UTF_8, WINDOWS_1252};
use rcv_core::NumberFormat;

use crate::layout::{ColumnLayout, ShiftTable};

/// Character encoding of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Latin-1 (decoded as Windows-1252, its superset). The SII default.
    Latin1,
    Utf8,
}

/// What to do about the total amount column.
///
/// The two historical import paths disagreed: one trusted the file's
/// `Monto Total`, the other recomputed net + IVA + exempt. The policy is an
/// explicit, required choice; `TrustFile` is rejected for SHIFTED layouts,
/// which carry no total column at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalPolicy {
    TrustFile,
    Recompute,
}

/// Per-file ingestion configuration.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub encoding: TextEncoding,
    /// chrono format string for `Fecha Docto`. The semicolon CSV export uses
    /// `%d/%m/%Y`; the TSV export uses `%d-%m-%Y`.
    pub date_format: String,
    pub number_format: NumberFormat,
    pub total_policy: TotalPolicy,
    pub shift_table: ShiftTable,
}

impl ReadOptions {
    /// Defaults for the semicolon/Latin-1 export. The total policy has no
    /// default and must be chosen by the caller.
    pub fn new(total_policy: TotalPolicy) -> Self {
        ReadOptions {
            delimiter: b';',
            encoding: TextEncoding::Latin1,
            date_format: "%d/%m/%Y".to_string(),
            number_format: NumberFormat::LATIN,
            total_policy,
            shift_table: ShiftTable::default(),
        }
    }

    /// Reject configurations that cannot work for the detected layout.
    pub fn check_against(&self, layout: ColumnLayout) -> Result<()> {
        if layout == ColumnLayout::Shifted && self.total_policy == TotalPolicy::TrustFile {
            bail!(
                "total policy 'trust-file' is invalid for a shifted export: \
                 that format carries no total column; use 'recompute'"
            );
        }
        Ok(())
    }
}

/// A decoded, header-parsed ledger file ready for row iteration.
pub struct LedgerReader {
    headers: Vec<String>,
    first_row: Option<StringRecord>,
    rest: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
}

impl LedgerReader {
    /// Open and decode a ledger file. Decode failure (wrong encoding) and an
    /// unreadable file are file-level errors.
    pub fn open(path: impl AsRef<Path>, opts: &ReadOptions) -> Result<LedgerReader> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        let encoding = match opts.encoding {
            TextEncoding::Latin1 => WINDOWS_1252,
            TextEncoding::Utf8 => UTF_8,
        };
        let (decoded, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            bail!(
                "{} is not valid {:?}: decode failed, check --encoding",
                path.display(),
                opts.encoding
            );
        }

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(Cursor::new(decoded.into_owned().into_bytes()));

        let headers: Vec<String> = rdr
            .headers()
            .context("reading header row")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            bail!("{}: empty header row", path.display());
        }

        let mut rest = rdr.into_records();
        let first_row = match rest.next() {
            Some(r) => Some(r.context("reading first data row")?),
            None => None,
        };

        Ok(LedgerReader { headers, first_row, rest })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Cells of the first data row, as layout detection wants them.
    pub fn first_row_cells(&self) -> Vec<String> {
        self.first_row
            .as_ref()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default()
    }

    /// Consume the reader, yielding every data row in file order, the peeked
    /// first row included.
    pub fn into_rows(self) -> impl Iterator<Item = csv::Result<StringRecord>> {
        self.first_row.into_iter().map(Ok).chain(self.rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("rcv-reader-test-{}.csv", std::process::id()));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_latin1_with_semicolons() {
        // "Razón" in Latin-1: 0xF3 for ó
        let bytes = b"Tipo Doc;Raz\xf3n Social\n33;ACME SPA\n";
        let path = write_temp(bytes);
        let opts = ReadOptions::new(TotalPolicy::Recompute);
        let rdr = LedgerReader::open(&path, &opts).unwrap();
        assert_eq!(rdr.headers()[1], "Razón Social");
        assert_eq!(rdr.first_row_cells(), vec!["33", "ACME SPA"]);
        let rows: Vec<_> = rdr.into_rows().collect();
        assert_eq!(rows.len(), 1);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let opts = ReadOptions::new(TotalPolicy::Recompute);
        assert!(LedgerReader::open("/no/such/file.csv", &opts).is_err());
    }

    #[test]
    fn test_trust_file_rejected_for_shifted() {
        let opts = ReadOptions::new(TotalPolicy::TrustFile);
        assert!(opts.check_against(ColumnLayout::Named).is_ok());
        let err = opts.check_against(ColumnLayout::Shifted).unwrap_err();
        assert!(err.to_string().contains("recompute"));
    }
}
