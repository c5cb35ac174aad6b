//! Locale-aware monetary amount parsing.
//!
//! SII exports write amounts with Latin-American separators (`1.234.567,89`).
//! Parsing is deliberately lenient: empty or unparsable cells become 0.0 so a
//! single bad amount never drops an otherwise-good row.

/// Thousands/decimal separator convention for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub thousands: char,
    pub decimal: char,
}

impl NumberFormat {
    /// `1.234,56` — the convention of every observed SII export.
    pub const LATIN: NumberFormat = NumberFormat { thousands: '.', decimal: ',' };

    /// `1,234.56`
    pub const ANGLO: NumberFormat = NumberFormat { thousands: ',', decimal: '.' };
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::LATIN
    }
}

/// Parse a raw amount cell. Empty → 0.0; separators normalized per `fmt`;
/// anything that still fails to parse → 0.0.
pub fn parse_amount(raw: &str, fmt: NumberFormat) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
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

    normalized.parse::<f64>().unwrap_or(0.0)
}
