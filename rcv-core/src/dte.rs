//! Electronic tax document (DTE) type codes as they appear in SII exports.

use serde::{Deserialize, Serialize};

/// DTE document kind. Codes the SII assigns to electronic tax documents;
/// unknown codes pass through as `Otro` rather than being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum DteKind {
    FacturaAfecta,
    FacturaExenta,
    FacturaCompra,
    GuiaDespacho,
    NotaDebito,
    NotaCredito,
    Otro(u16),
}

impl DteKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            33 => DteKind::FacturaAfecta,
            34 => DteKind::FacturaExenta,
            46 => DteKind::FacturaCompra,
            52 => DteKind::GuiaDespacho,
            56 => DteKind::NotaDebito,
            61 => DteKind::NotaCredito,
            other => DteKind::Otro(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            DteKind::FacturaAfecta => 33,
            DteKind::FacturaExenta => 34,
            DteKind::FacturaCompra => 46,
            DteKind::GuiaDespacho => 52,
            DteKind::NotaDebito => 56,
            DteKind::NotaCredito => 61,
            DteKind::Otro(code) => *code,
        }
    }

    /// Display name used in inspection/validation reports.
    pub fn label(&self) -> String {
        match self {
            DteKind::FacturaAfecta => "Factura Afecta".to_string(),
            DteKind::FacturaExenta => "Factura Exenta".to_string(),
            DteKind::FacturaCompra => "Factura de Compra".to_string(),
            DteKind::GuiaDespacho => "Guía de Despacho".to_string(),
            DteKind::NotaDebito => "Nota de Débito".to_string(),
            DteKind::NotaCredito => "Nota de Crédito".to_string(),
            DteKind::Otro(code) => format!("Tipo {code}"),
        }
    }

    /// Codes the shifted-export detector treats as a leading type cell.
    pub fn is_shift_marker(code: u16) -> bool {
        matches!(code, 33 | 34 | 56 | 61)
    }
}

impl From<u16> for DteKind {
    fn from(code: u16) -> Self {
        DteKind::from_code(code)
    }
}

impl From<DteKind> for u16 {
    fn from(kind: DteKind) -> Self {
        kind.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in [33u16, 34, 46, 52, 56, 61, 110, 39] {
            assert_eq!(DteKind::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(DteKind::from_code(801), DteKind::Otro(801));
        assert_eq!(DteKind::Otro(801).label(), "Tipo 801");
    }

    #[test]
    fn test_shift_markers() {
        assert!(DteKind::is_shift_marker(33));
        assert!(DteKind::is_shift_marker(61));
        assert!(!DteKind::is_shift_marker(46));
        assert!(!DteKind::is_shift_marker(52));
    }

    #[test]
    fn test_serde_as_code() {
        let json = serde_json::to_string(&DteKind::FacturaAfecta).unwrap();
        assert_eq!(json, "33");
        let back: DteKind = serde_json::from_str("61").unwrap();
        assert_eq!(back, DteKind::NotaCredito);
    }
}
