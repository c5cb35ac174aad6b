//! Column layout detection.
//!
//! One upstream export variant silently drops a leading column: the DTE type
//! code lands in column 0 and every semantic column shifts by a fixed offset.
//! Left undetected, the shifted file corrupts every later field, so the
//! layout is classified once per file before any row is normalized.

use rcv_core::DteKind;
use serde::Serialize;

use crate::columns::TIPO_DOC;

/// How a file's columns are addressed: by header name, or by the fixed
/// positional table of the known shifted export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnLayout {
    Named,
    Shifted,
}

/// Positional offsets for a shifted export. A data table rather than
/// call-site constants so further shift patterns can be registered without
/// touching the extraction code.
///
/// The shifted format carries no total column; totals are always recomputed
/// for it (see `TotalPolicy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftTable {
    pub tipo_dte: usize,
    pub rut_emisor: usize,
    pub razon_social: usize,
    pub folio: usize,
    pub fecha_emision: usize,
    pub monto_exento: usize,
    pub monto_neto: usize,
    pub monto_iva: usize,
}

impl ShiftTable {
    /// The defective SII export observed in production: type code in column
    /// 0, RUT at 2, razón social at 3, folio at 4, date at 5, amounts at
    /// 8/9/10.
    pub const SII_LEADING_TYPE: ShiftTable = ShiftTable {
        tipo_dte: 0,
        rut_emisor: 2,
        razon_social: 3,
        folio: 4,
        fecha_emision: 5,
        monto_exento: 8,
        monto_neto: 9,
        monto_iva: 10,
    };

    /// Minimum row width this table can address.
    pub fn min_width(&self) -> usize {
        [
            self.tipo_dte,
            self.rut_emisor,
            self.razon_social,
            self.folio,
            self.fecha_emision,
            self.monto_exento,
            self.monto_neto,
            self.monto_iva,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

impl Default for ShiftTable {
    fn default() -> Self {
        ShiftTable::SII_LEADING_TYPE
    }
}

/// Classify a file's layout from its header row and first data row.
///
/// SHIFTED iff the first data cell is one of the leading-type marker codes
/// (33/34/56/61) and no header is literally `"Tipo Doc"`. A file whose
/// header names the type column is NAMED regardless of its first cell.
pub fn detect_layout<S: AsRef<str>>(headers: &[S], first_data_row: &[S]) -> ColumnLayout {
    let has_tipo_header = headers.iter().any(|h| h.as_ref().trim() == TIPO_DOC);
    if has_tipo_header {
        return ColumnLayout::Named;
    }

    let first_cell_is_marker = first_data_row
        .first()
        .and_then(|c| c.as_ref().trim().parse::<u16>().ok())
        .is_some_and(DteKind::is_shift_marker);

    if first_cell_is_marker {
        ColumnLayout::Shifted
    } else {
        ColumnLayout::Named
    }
}
