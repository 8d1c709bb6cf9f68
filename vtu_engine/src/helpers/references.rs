//! Internal transaction reference generation.
//!
//! References are assigned once at row creation and never reused. The per-type prefix keeps them human-traceable
//! in logs and support tickets (`FND-...` is a funding attempt, `AIR-...` an airtime purchase, and so on).

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::{Reference, TxType};

const SUFFIX_LEN: usize = 10;

/// Generate a fresh reference for a transaction of the given type, e.g. `FND-20240613-X4QZ81KD0P`.
///
/// Uniqueness is ultimately enforced by the unique constraint on `transactions.reference`; the timestamp plus a
/// 10-character random suffix makes collisions practically impossible in the first place.
pub fn new_reference(tx_type: TxType) -> Reference {
    let date = Utc::now().format("%Y%m%d");
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(SUFFIX_LEN).map(char::from).collect::<String>().to_uppercase();
    Reference(format!("{}-{date}-{suffix}", tx_type.reference_prefix()))
}
