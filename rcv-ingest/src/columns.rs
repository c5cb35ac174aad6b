//! Canonical header names and header → index resolution for NAMED layouts.

use anyhow::{bail, Result};

pub const TIPO_DOC: &str = "Tipo Doc";
pub const FOLIO: &str = "Folio";
pub const FECHA_DOCTO: &str = "Fecha Docto";
pub const RUT_PROVEEDOR: &str = "RUT Proveedor";
pub const RAZON_SOCIAL: &str = "Razon Social";
pub const MONTO_NETO: &str = "Monto Neto";
pub const MONTO_EXENTO: &str = "Monto Exento";
pub const MONTO_TOTAL: &str = "Monto Total";
pub const MONTO_IVA_RECUPERABLE: &str = "Monto IVA Recuperable";
pub const MONTO_IVA: &str = "Monto IVA";

/// Every canonical column's position in a header row, found or not.
///
/// Scanning never fails; which absences are fatal is the caller's policy
/// (import and validation draw the line differently). All lookup rules live
/// here, in one place: exact names first, and for the IVA column a
/// case-insensitive substring fallback (any header containing both "IVA" and
/// "Recuperable"), because the SII renames that column between export
/// versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderScan {
    pub tipo_dte: Option<usize>,
    pub folio: Option<usize>,
    pub fecha_emision: Option<usize>,
    pub rut_emisor: Option<usize>,
    pub razon_social: Option<usize>,
    pub monto_neto: Option<usize>,
    pub monto_exento: Option<usize>,
    pub monto_total: Option<usize>,
    pub monto_iva: Option<usize>,
}

impl HeaderScan {
    pub fn scan<S: AsRef<str>>(headers: &[S]) -> HeaderScan {
        let find = |name: &str| headers.iter().position(|h| h.as_ref().trim() == name);

        let monto_iva = find(MONTO_IVA_RECUPERABLE)
            .or_else(|| find(MONTO_IVA))
            .or_else(|| {
                headers.iter().position(|h| {
                    let lower = h.as_ref().to_lowercase();
                    lower.contains("iva") && lower.contains("recuperable")
                })
            });

        HeaderScan {
            tipo_dte: find(TIPO_DOC),
            folio: find(FOLIO),
            fecha_emision: find(FECHA_DOCTO),
            rut_emisor: find(RUT_PROVEEDOR),
            razon_social: find(RAZON_SOCIAL),
            monto_neto: find(MONTO_NETO),
            monto_exento: find(MONTO_EXENTO),
            monto_total: find(MONTO_TOTAL),
            monto_iva,
        }
    }

    /// Columns an import cannot proceed without. Amount columns other than
    /// net are tolerated at import time (they default to 0 downstream).
    pub fn missing_import_required(&self) -> Vec<&'static str> {
        [
            (TIPO_DOC, self.tipo_dte),
            (FOLIO, self.folio),
            (FECHA_DOCTO, self.fecha_emision),
            (RUT_PROVEEDOR, self.rut_emisor),
            (RAZON_SOCIAL, self.razon_social),
            (MONTO_NETO, self.monto_neto),
        ]
        .into_iter()
        .filter_map(|(name, idx)| idx.is_none().then_some(name))
        .collect()
    }

    /// Columns the validator treats as mandatory, per the SII download
    /// contract: everything except `Monto Exento`.
    pub fn missing_validation_required(&self) -> Vec<&'static str> {
        let mut missing = self.missing_import_required();
        if self.monto_total.is_none() {
            missing.push(MONTO_TOTAL);
        }
        if self.monto_iva.is_none() {
            missing.push(MONTO_IVA_RECUPERABLE);
        }
        missing
    }

    /// Optional columns absent from the header, for validation warnings.
    pub fn missing_optional(&self) -> Vec<&'static str> {
        if self.monto_exento.is_none() {
            vec![MONTO_EXENTO]
        } else {
            vec![]
        }
    }
}

/// Resolved column indices for a NAMED-layout import.
///
/// Required columns missing from the header is a file-level error; the
/// amount columns beyond net degrade to `None` and default to zero
/// downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    pub tipo_dte: usize,
    pub folio: usize,
    pub fecha_emision: usize,
    pub rut_emisor: usize,
    pub razon_social: usize,
    pub monto_neto: usize,
    pub monto_exento: Option<usize>,
    pub monto_total: Option<usize>,
    pub monto_iva: Option<usize>,
}

impl HeaderMap {
    /// Resolve canonical fields against a header row, failing when any
    /// import-required column is absent.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<HeaderMap> {
        let scan = HeaderScan::scan(headers);
        match (
            scan.tipo_dte,
            scan.folio,
            scan.fecha_emision,
            scan.rut_emisor,
            scan.razon_social,
            scan.monto_neto,
        ) {
            (Some(tipo_dte), Some(folio), Some(fecha_emision), Some(rut_emisor), Some(razon_social), Some(monto_neto)) => {
                Ok(HeaderMap {
                    tipo_dte,
                    folio,
                    fecha_emision,
                    rut_emisor,
                    razon_social,
                    monto_neto,
                    monto_exento: scan.monto_exento,
                    monto_total: scan.monto_total,
                    monto_iva: scan.monto_iva,
                })
            }
            _ => bail!(
                "required column(s) not found in header: {}",
                scan.missing_import_required().join(", ")
            ),
        }
    }
}
