//! The single fee policy shared by every credit path.
//!
//! Each gateway historically carried its own copy of this schedule and the copies drifted, producing real
//! amount-mismatch bugs. Every webhook handler and the reconciliation sweep must call [`credit_for`] and nothing
//! else.

use vtu_common::Kobo;

/// Gross amounts at or below this use the flat fee.
pub const FLAT_FEE_THRESHOLD: Kobo = Kobo::from_naira(5_000);
/// Gross amounts above this use the capped fee.
pub const CAPPED_FEE_THRESHOLD: Kobo = Kobo::from_naira(100_000);

pub const FLAT_FEE: Kobo = Kobo::from_naira(40);
pub const FEE_CAP: Kobo = Kobo::from_naira(2_000);

/// Mid-tier rate: 2%, i.e. the wallet is credited 98% of the gross.
const RATE_NUMERATOR: i64 = 98;
const RATE_DENOMINATOR: i64 = 100;

/// Net wallet credit for a gross amount received by a gateway.
///
/// Tiers: flat ₦40 fee up to ₦5,000; 2% in the middle; fee capped at ₦2,000 above ₦100,000. Amounts too small to
/// cover the flat fee credit zero rather than going negative.
pub fn credit_for(gross: Kobo) -> Kobo {
    let net = if gross <= FLAT_FEE_THRESHOLD {
        gross - FLAT_FEE
    } else if gross > CAPPED_FEE_THRESHOLD {
        gross - FEE_CAP
    } else {
        Kobo::from(gross.value() * RATE_NUMERATOR / RATE_DENOMINATOR)
    };
    net.or_zero()
}

/// The fee charged for a gross amount. `gross == credit_for(gross) + fee_for(gross)` always holds.
pub fn fee_for(gross: Kobo) -> Kobo {
    gross - credit_for(gross)
}
