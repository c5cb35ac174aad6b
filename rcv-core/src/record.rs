//! The canonical purchase record persisted to the `compras_sii` table.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dte::DteKind;

/// Razón social is truncated to this length before persistence.
pub const RAZON_SOCIAL_MAX: usize = 200;

/// One normalized purchase-ledger row. Immutable once built; serde field
/// names match the remote table columns so the record serializes directly
/// into an insert body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub tipo_dte: DteKind,
    /// Sequential document number, unique per issuer + document type.
    pub folio: i64,
    pub fecha_emision: NaiveDate,
    /// `"YYYY-MM"`, derived from `fecha_emision`. Redundant but persisted
    /// for query convenience.
    pub periodo_tributario: String,
    /// Normalized issuer RUT in display form, e.g. `12.345.678-5`.
    pub rut_emisor: String,
    pub razon_social_emisor: String,
    pub monto_neto: f64,
    pub monto_iva: f64,
    pub monto_exento: f64,
    pub monto_total: f64,
    /// Which ingestion path produced the record.
    pub importado_desde: String,
}

impl PurchaseRecord {
    /// Upsert conflict key: (tipo_dte, folio, rut_emisor).
    pub fn conflict_key(&self) -> (u16, i64, &str) {
        (self.tipo_dte.code(), self.folio, &self.rut_emisor)
    }
}

/// Tax period of a date: `"YYYY-MM"` with zero-padded month.
pub fn period_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Truncate a razón social to the persisted limit, on a char boundary.
pub fn truncate_razon_social(raw: &str) -> String {
    raw.trim().chars().take(RAZON_SOCIAL_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_of() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(period_of(d), "2026-01");
        let d = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(period_of(d), "2025-12");
    }

    #[test]
    fn test_truncate_razon_social() {
        let long = "A".repeat(300);
        assert_eq!(truncate_razon_social(&long).len(), RAZON_SOCIAL_MAX);
        assert_eq!(truncate_razon_social("  ACME SPA  "), "ACME SPA");
    }

    #[test]
    fn test_serializes_with_table_column_names() {
        let rec = PurchaseRecord {
            tipo_dte: DteKind::FacturaAfecta,
            folio: 100,
            fecha_emision: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            periodo_tributario: "2026-01".to_string(),
            rut_emisor: "12.345.678-5".to_string(),
            razon_social_emisor: "ACME SPA".to_string(),
            monto_neto: 10000.0,
            monto_iva: 1900.0,
            monto_exento: 0.0,
            monto_total: 11900.0,
            importado_desde: "csv-import".to_string(),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["tipo_dte"], 33);
        assert_eq!(v["folio"], 100);
        assert_eq!(v["fecha_emision"], "2026-01-15");
        assert_eq!(v["periodo_tributario"], "2026-01");
        assert_eq!(v["rut_emisor"], "12.345.678-5");
        assert_eq!(v["monto_total"], 11900.0);
    }
}
