//! rcv-core: canonical types and field normalization for SII purchase-ledger (RCV) exports

pub mod amount;
pub mod dte;
pub mod record;
pub mod rut;

pub use amount::{parse_amount, NumberFormat};
pub use dte::DteKind;
pub use record::{period_of, truncate_razon_social, PurchaseRecord, RAZON_SOCIAL_MAX};
pub use rut::{normalize_rut, plausible_rut};
