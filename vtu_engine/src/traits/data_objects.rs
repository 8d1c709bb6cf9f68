use crate::db_types::{Reference, Transaction};

//--------------------------------------  FinalizeOutcome  -----------------------------------------------------------
/// Result of an attempt to move a transaction to a terminal state.
///
/// `AlreadyFinalized` is the losing side of the finalizer race: some other path (webhook, sweep, or status check)
/// got there first. It is not an error; callers log a suppressed duplicate and move on.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// This caller won the race. The ledger row and any wallet adjustment were committed together.
    Finalized(Transaction),
    /// Another finalizer already moved this row to a terminal state.
    AlreadyFinalized,
    /// No ledger row matches the reference.
    NotFound,
}

impl FinalizeOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, FinalizeOutcome::Finalized(_))
    }
}

//--------------------------------------  RedebitOutcome   -----------------------------------------------------------
/// Result of the audited refund-correction path.
#[derive(Debug, Clone)]
pub enum RedebitOutcome {
    /// The original row was flipped back to Success and a compensating debit was recorded.
    Corrected { original: Transaction, compensation: Transaction },
    /// The wallet no longer covers the re-debit. Nothing was mutated; an operator must step in.
    InsufficientBalance,
    /// The row is not in a refunded state, or the correction window has lapsed.
    NotCorrectable,
}

//--------------------------------------   SweepOutcome    -----------------------------------------------------------
/// What the reconciliation sweep decided for a single stale transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Credited,
    Delivered,
    Reversed,
    Failed,
    /// Upstream still reports the transaction as in flight.
    StillPending,
    /// Another finalizer won while the sweep was re-querying.
    LostRace,
    /// The upstream call errored transiently; the next sweep will retry.
    Deferred,
}

//--------------------------------------    SweepReport    -----------------------------------------------------------
/// Aggregate result of one sweep run.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub outcomes: Vec<(Reference, SweepOutcome)>,
    pub errors: usize,
}

impl SweepReport {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count_of(&self, outcome: SweepOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}
