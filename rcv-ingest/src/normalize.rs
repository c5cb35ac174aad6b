//! Row → record normalization with per-row failure containment.
//!
//! One outcome per data row, in file order. A rejected row carries enough to
//! diagnose it (index, field, raw value, reason) and never stops iteration
//! over the rows behind it.

use std::fmt;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use rcv_core::{
    normalize_rut, parse_amount, period_of, truncate_razon_social, DteKind, PurchaseRecord,
};
use serde::Serialize;

use crate::columns::HeaderMap;
use crate::layout::{detect_layout, ColumnLayout, ShiftTable};
use crate::reader::{LedgerReader, ReadOptions, TotalPolicy};

/// Which field a rejection is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowField {
    TipoDte,
    Folio,
    FechaEmision,
    RutEmisor,
    /// The row as a whole (unreadable record).
    Row,
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RowField::TipoDte => "tipo_dte",
            RowField::Folio => "folio",
            RowField::FechaEmision => "fecha_emision",
            RowField::RutEmisor => "rut_emisor",
            RowField::Row => "row",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    Missing,
    Unparseable,
    ReadError(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Missing => f.write_str("missing value"),
            RejectReason::Unparseable => f.write_str("unparseable value"),
            RejectReason::ReadError(e) => write!(f, "unreadable row: {e}"),
        }
    }
}

/// A contained, row-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRejection {
    /// 0-based data-row index (header excluded).
    pub row_index: usize,
    pub field: RowField,
    pub raw: String,
    pub reason: RejectReason,
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: {} ({}): {:?}",
            self.row_index, self.reason, self.field, self.raw
        )
    }
}

pub type RowOutcome = Result<PurchaseRecord, RowRejection>;

/// Per-file counters, emitted once after the last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub layout: ColumnLayout,
}

impl IngestSummary {
    pub fn new(layout: ColumnLayout) -> Self {
        IngestSummary { rows_read: 0, accepted: 0, rejected: 0, layout }
    }

    pub fn tally(&mut self, outcome: &RowOutcome) {
        self.rows_read += 1;
        match outcome {
            Ok(_) => self.accepted += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows read, {} accepted, {} rejected (layout: {:?})",
            self.rows_read, self.accepted, self.rejected, self.layout
        )
    }
}

/// Raw field values for one row, after column resolution, before parsing.
struct RawFields<'a> {
    tipo: &'a str,
    folio: &'a str,
    fecha: &'a str,
    rut: &'a str,
    razon: &'a str,
    neto: &'a str,
    exento: &'a str,
    iva: &'a str,
    /// Absent in SHIFTED layout and when the NAMED header lacks the column.
    total: Option<&'a str>,
}

/// The ledger-row normalizer: layout-aware field extraction plus per-field
/// validation, configured once per file.
#[derive(Debug)]
pub struct Normalizer {
    layout: ColumnLayout,
    header_map: Option<HeaderMap>,
    opts: ReadOptions,
    source_tag: String,
}

impl Normalizer {
    /// Detect the layout from an opened file and resolve its columns.
    /// Fails (file-level) when required NAMED columns are absent or the
    /// options are invalid for the detected layout.
    pub fn for_file(reader: &LedgerReader, opts: ReadOptions, source_tag: &str) -> Result<Self> {
        let first = reader.first_row_cells();
        let layout = detect_layout(reader.headers(), &first);
        opts.check_against(layout)?;

        let header_map = match layout {
            ColumnLayout::Named => {
                let map = HeaderMap::resolve(reader.headers())?;
                if opts.total_policy == TotalPolicy::TrustFile && map.monto_total.is_none() {
                    bail!(
                        "total policy 'trust-file' needs a '{}' column and this \
                         file has none; use 'recompute'",
                        crate::columns::MONTO_TOTAL
                    );
                }
                Some(map)
            }
            ColumnLayout::Shifted => None,
        };

        Ok(Normalizer {
            layout,
            header_map,
            opts,
            source_tag: source_tag.to_string(),
        })
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    /// Stream one outcome per data row, preserving input order. Row failures
    /// are contained; iteration always continues to the next row.
    pub fn records<'a, I>(&'a self, rows: I) -> impl Iterator<Item = RowOutcome> + 'a
    where
        I: Iterator<Item = csv::Result<StringRecord>> + 'a,
    {
        rows.enumerate().map(move |(i, row)| match row {
            Ok(record) => self.normalize_row(i, &record),
            Err(e) => Err(RowRejection {
                row_index: i,
                field: RowField::Row,
                raw: String::new(),
                reason: RejectReason::ReadError(e.to_string()),
            }),
        })
    }

    /// Normalize a single row.
    pub fn normalize_row(&self, row_index: usize, record: &StringRecord) -> RowOutcome {
        let fields = self.extract(record);

        let reject = |field: RowField, raw: &str, reason: RejectReason| RowRejection {
            row_index,
            field,
            raw: raw.to_string(),
            reason,
        };

        let tipo_raw = fields.tipo.trim();
        if tipo_raw.is_empty() {
            return Err(reject(RowField::TipoDte, tipo_raw, RejectReason::Missing));
        }
        let tipo = tipo_raw
            .parse::<u16>()
            .map(DteKind::from_code)
            .map_err(|_| reject(RowField::TipoDte, tipo_raw, RejectReason::Unparseable))?;

        let rut_raw = fields.rut.trim();
        if rut_raw.is_empty() {
            return Err(reject(RowField::RutEmisor, rut_raw, RejectReason::Missing));
        }
        let rut = normalize_rut(rut_raw)
            .ok_or_else(|| reject(RowField::RutEmisor, rut_raw, RejectReason::Unparseable))?;

        let folio_raw = fields.folio.trim();
        if folio_raw.is_empty() {
            return Err(reject(RowField::Folio, folio_raw, RejectReason::Missing));
        }
        let folio = folio_raw
            .parse::<i64>()
            .map_err(|_| reject(RowField::Folio, folio_raw, RejectReason::Unparseable))?;

        let fecha_raw = fields.fecha.trim();
        if fecha_raw.is_empty() {
            return Err(reject(RowField::FechaEmision, fecha_raw, RejectReason::Missing));
        }
        let fecha = NaiveDate::parse_from_str(fecha_raw, &self.opts.date_format)
            .map_err(|_| reject(RowField::FechaEmision, fecha_raw, RejectReason::Unparseable))?;

        let fmt = self.opts.number_format;
        let neto = parse_amount(fields.neto, fmt);
        let iva = parse_amount(fields.iva, fmt);
        let exento = parse_amount(fields.exento, fmt);
        let total = match self.opts.total_policy {
            TotalPolicy::TrustFile => parse_amount(fields.total.unwrap_or(""), fmt),
            TotalPolicy::Recompute => neto + iva + exento,
        };

        Ok(PurchaseRecord {
            tipo_dte: tipo,
            folio,
            fecha_emision: fecha,
            periodo_tributario: period_of(fecha),
            rut_emisor: rut,
            razon_social_emisor: truncate_razon_social(fields.razon),
            monto_neto: neto,
            monto_iva: iva,
            monto_exento: exento,
            monto_total: total,
            importado_desde: self.source_tag.clone(),
        })
    }

    fn extract<'a>(&self, record: &'a StringRecord) -> RawFields<'a> {
        let cell = |i: usize| record.get(i).unwrap_or("");

        match (&self.layout, &self.header_map) {
            (ColumnLayout::Named, Some(map)) => RawFields {
                tipo: cell(map.tipo_dte),
                folio: cell(map.folio),
                fecha: cell(map.fecha_emision),
                rut: cell(map.rut_emisor),
                razon: cell(map.razon_social),
                neto: cell(map.monto_neto),
                exento: map.monto_exento.map(cell).unwrap_or(""),
                iva: map.monto_iva.map(cell).unwrap_or(""),
                total: map.monto_total.map(cell),
            },
            _ => {
                let t: &ShiftTable = &self.opts.shift_table;
                RawFields {
                    tipo: cell(t.tipo_dte),
                    folio: cell(t.folio),
                    fecha: cell(t.fecha_emision),
                    rut: cell(t.rut_emisor),
                    razon: cell(t.razon_social),
                    neto: cell(t.monto_neto),
                    exento: cell(t.monto_exento),
                    iva: cell(t.monto_iva),
                    total: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::TextEncoding;
    use std::fs;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("rcv-normalize-{}-{}", std::process::id(), name));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn opts(policy: TotalPolicy) -> ReadOptions {
        let mut o = ReadOptions::new(policy);
        o.encoding = TextEncoding::Utf8;
        o
    }

    const NAMED_HEADER: &str = "Tipo Doc;Folio;Fecha Docto;RUT Proveedor;Razon Social;Monto Neto;Monto Exento;Monto Total;Monto IVA Recuperable";

    #[test]
    fn test_named_end_to_end_trusts_file_total() {
        let csv = format!(
            "{NAMED_HEADER}\n33;100;15/01/2026;12345678-5;ACME SPA;10000;0;11900;1900\n"
        );
        let path = write_temp("named.csv", &csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::TrustFile)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::TrustFile), "test").unwrap();
        assert_eq!(norm.layout(), ColumnLayout::Named);

        let outcomes: Vec<_> = norm.records(rdr.into_rows()).collect();
        assert_eq!(outcomes.len(), 1);
        let rec = outcomes[0].as_ref().unwrap();
        assert_eq!(rec.tipo_dte, DteKind::FacturaAfecta);
        assert_eq!(rec.folio, 100);
        assert_eq!(rec.rut_emisor, "12.345.678-5");
        assert_eq!(rec.periodo_tributario, "2026-01");
        assert_eq!(rec.monto_total, 11900.0);
        assert_eq!(rec.razon_social_emisor, "ACME SPA");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_recompute_overrides_file_total() {
        let csv = format!(
            "{NAMED_HEADER}\n33;100;15/01/2026;12345678-5;ACME SPA;10000;500;99999;1900\n"
        );
        let path = write_temp("recompute.csv", &csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::Recompute)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::Recompute), "test").unwrap();
        let rec = norm
            .records(rdr.into_rows())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(rec.monto_total, 10000.0 + 1900.0 + 500.0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_shifted_layout_positional_extraction() {
        // Headerless-in-spirit: header names don't match, type code leads.
        // Positions: 0 tipo, 2 rut, 3 razon, 4 folio, 5 fecha, 8 exento, 9 neto, 10 iva
        let csv = "\
Nro;Giro;C2;C3;C4;C5;C6;C7;C8;C9;C10
33;COMERCIO;76543210-9;PROVEEDOR UNO;200;20/01/2026;x;y;0;5000;950
61;COMERCIO;76543210-9;PROVEEDOR UNO;201;21/01/2026;x;y;100;0;0
";
        let path = write_temp("shifted.csv", csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::Recompute)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::Recompute), "test").unwrap();
        assert_eq!(norm.layout(), ColumnLayout::Shifted);

        let recs: Vec<_> = norm
            .records(rdr.into_rows())
            .map(|o| o.unwrap())
            .collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].folio, 200);
        assert_eq!(recs[0].rut_emisor, "76.543.210-9");
        assert_eq!(recs[0].monto_total, 5950.0);
        assert_eq!(recs[1].tipo_dte, DteKind::NotaCredito);
        assert_eq!(recs[1].monto_total, 100.0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_bad_row_does_not_stop_iteration() {
        let mut csv = String::from(NAMED_HEADER);
        csv.push('\n');
        for i in 0..10 {
            let fecha = if i == 5 { "not-a-date" } else { "15/01/2026" };
            csv.push_str(&format!(
                "33;{};{};12345678-5;ACME SPA;1000;0;1190;190\n",
                100 + i,
                fecha
            ));
        }
        let path = write_temp("badrow.csv", &csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::TrustFile)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::TrustFile), "test").unwrap();

        let outcomes: Vec<_> = norm.records(rdr.into_rows()).collect();
        assert_eq!(outcomes.len(), 10);
        let rejections: Vec<&RowRejection> =
            outcomes.iter().filter_map(|o| o.as_ref().err()).collect();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].row_index, 5);
        assert_eq!(rejections[0].field, RowField::FechaEmision);
        assert_eq!(rejections[0].reason, RejectReason::Unparseable);
        // Rows after the bad one still came through
        assert!(outcomes[6..].iter().all(|o| o.is_ok()));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_rut_and_folio_reject() {
        let csv = format!(
            "{NAMED_HEADER}\n33;;15/01/2026;12345678-5;ACME;1000;0;1190;190\n33;101;15/01/2026;;ACME;1000;0;1190;190\n"
        );
        let path = write_temp("missing.csv", &csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::TrustFile)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::TrustFile), "test").unwrap();
        let outcomes: Vec<_> = norm.records(rdr.into_rows()).collect();

        let r0 = outcomes[0].as_ref().unwrap_err();
        assert_eq!(r0.field, RowField::Folio);
        assert_eq!(r0.reason, RejectReason::Missing);

        let r1 = outcomes[1].as_ref().unwrap_err();
        assert_eq!(r1.field, RowField::RutEmisor);
        assert_eq!(r1.reason, RejectReason::Missing);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_trust_file_needs_a_total_column() {
        // No Monto Total header: there is nothing to trust, and silently
        // persisting total=0 against a nonzero net would be wrong.
        let csv = "\
Tipo Doc;Folio;Fecha Docto;RUT Proveedor;Razon Social;Monto Neto;Monto Exento;Monto IVA Recuperable
33;100;15/01/2026;12345678-5;ACME SPA;10000;0;1900
";
        let path = write_temp("nototal.csv", csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::TrustFile)).unwrap();
        let err =
            Normalizer::for_file(&rdr, opts(TotalPolicy::TrustFile), "test").unwrap_err();
        assert!(err.to_string().contains("Monto Total"));

        // The same file imports fine under recompute
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::Recompute)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::Recompute), "test").unwrap();
        let rec = norm.records(rdr.into_rows()).next().unwrap().unwrap();
        assert_eq!(rec.monto_total, 11900.0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unknown_dte_code_passes_through() {
        let csv = format!(
            "{NAMED_HEADER}\n110;100;15/01/2026;12345678-5;ACME;1000;0;1190;190\n"
        );
        let path = write_temp("unknown-dte.csv", &csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::TrustFile)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::TrustFile), "test").unwrap();
        let rec = norm.records(rdr.into_rows()).next().unwrap().unwrap();
        assert_eq!(rec.tipo_dte, DteKind::Otro(110));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_summary_counts() {
        let csv = format!(
            "{NAMED_HEADER}\n33;100;15/01/2026;12345678-5;ACME;1000;0;1190;190\n33;bad;15/01/2026;12345678-5;ACME;1000;0;1190;190\n"
        );
        let path = write_temp("summary.csv", &csv);
        let rdr = LedgerReader::open(&path, &opts(TotalPolicy::TrustFile)).unwrap();
        let norm = Normalizer::for_file(&rdr, opts(TotalPolicy::TrustFile), "test").unwrap();

        let mut summary = IngestSummary::new(norm.layout());
        for outcome in norm.records(rdr.into_rows()) {
            summary.tally(&outcome);
        }
        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        fs::remove_file(&path).ok();
    }
}
