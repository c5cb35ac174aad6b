//! Validation-only mode: check an export's shape without persisting anything.
//!
//! Mirrors what an import would reject, but reports percentages instead of
//! streaming records: per-field validity over the whole file, DTE type
//! distribution, and missing-column findings. A required field under the
//! validity threshold fails the file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use rcv_core::{plausible_rut, DteKind, NumberFormat};
use serde::Serialize;

use crate::columns::HeaderScan;
use crate::layout::{detect_layout, ColumnLayout};
use crate::reader::{LedgerReader, ReadOptions};

/// Minimum share of valid values a required field must reach, in percent.
pub const VALIDITY_THRESHOLD: f64 = 90.0;

/// Validity counters for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    pub checked: usize,
    pub valid: usize,
}

impl FieldStats {
    pub fn count(&mut self, ok: bool) {
        self.checked += 1;
        if ok {
            self.valid += 1;
        }
    }

    pub fn percent_valid(&self) -> f64 {
        if self.checked == 0 {
            return 100.0;
        }
        self.valid as f64 * 100.0 / self.checked as f64
    }

    pub fn passes(&self) -> bool {
        self.percent_valid() >= VALIDITY_THRESHOLD
    }
}

/// Outcome of validating one file.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub layout: ColumnLayout,
    pub rows: usize,
    pub rut: FieldStats,
    pub fecha: FieldStats,
    pub monto: FieldStats,
    /// DTE code → row count, sorted by count descending.
    pub dte_distribution: Vec<(DteKind, usize)>,
    /// File-level problems: missing required columns.
    pub errors: Vec<String>,
    /// Missing optional columns.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.rut.passes() && self.fecha.passes() && self.monto.passes()
    }
}

fn amount_shape_ok(raw: &str, fmt: NumberFormat) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return true; // empty amounts become 0 on import
    }
    let normalized: String = trimmed
        .chars()
        .filter_map(|c| {
            if c == fmt.thousands {
                None
            } else if c == fmt.decimal {
                Some('.')
            } else {
                Some(c)
            }
        })
        .collect();
    normalized.parse::<f64>().is_ok()
}

/// Positions of the fields the validator samples, for either layout.
struct ValidatorColumns {
    tipo: Option<usize>,
    rut: Option<usize>,
    fecha: Option<usize>,
    monto: Option<usize>,
}

/// Run layout detection plus per-row shape checks over a whole file.
/// File-unreadable and decode failures are errors; everything else lands in
/// the report.
pub fn validate_file(path: impl AsRef<Path>, opts: &ReadOptions) -> Result<ValidationReport> {
    let reader = LedgerReader::open(path, opts)?;
    let headers = reader.headers().to_vec();
    let first = reader.first_row_cells();
    let layout = detect_layout(&headers, &first);

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let cols = match layout {
        ColumnLayout::Named => {
            let scan = HeaderScan::scan(&headers);
            for name in scan.missing_validation_required() {
                errors.push(format!("missing required column: {name}"));
            }
            for name in scan.missing_optional() {
                warnings.push(format!("missing optional column: {name}"));
            }
            ValidatorColumns {
                tipo: scan.tipo_dte,
                rut: scan.rut_emisor,
                fecha: scan.fecha_emision,
                // The full-total column when present, net otherwise
                monto: scan.monto_total.or(scan.monto_neto),
            }
        }
        ColumnLayout::Shifted => {
            let t = opts.shift_table;
            warnings.push("shifted export: columns addressed positionally".to_string());
            ValidatorColumns {
                tipo: Some(t.tipo_dte),
                rut: Some(t.rut_emisor),
                fecha: Some(t.fecha_emision),
                monto: Some(t.monto_neto),
            }
        }
    };

    let mut rows = 0usize;
    let mut rut = FieldStats::default();
    let mut fecha = FieldStats::default();
    let mut monto = FieldStats::default();
    let mut dte_counts: HashMap<u16, usize> = HashMap::new();

    for row in reader.into_rows() {
        let Ok(record) = row else {
            rows += 1;
            continue;
        };
        rows += 1;
        let cell = |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or("");

        rut.count(plausible_rut(cell(cols.rut)));
        fecha.count(
            NaiveDate::parse_from_str(cell(cols.fecha).trim(), &opts.date_format).is_ok(),
        );
        monto.count(amount_shape_ok(cell(cols.monto), opts.number_format));

        if let Ok(code) = cell(cols.tipo).trim().parse::<u16>() {
            *dte_counts.entry(code).or_default() += 1;
        }
    }

    let mut dte_distribution: Vec<(DteKind, usize)> = dte_counts
        .into_iter()
        .map(|(code, n)| (DteKind::from_code(code), n))
        .collect();
    dte_distribution.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.code().cmp(&b.0.code())));

    Ok(ValidationReport {
        layout,
        rows,
        rut,
        fecha,
        monto,
        dte_distribution,
        errors,
        warnings,
    })
}
