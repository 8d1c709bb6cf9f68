use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::{FlowError, FundingFlowApi, PurchaseApi},
    db_types::{Reference, Transaction},
    traits::{FulfillmentError, GatewayError, LedgerDatabase, SweepOutcome, SweepReport},
};

/// `ReconcileApi` chases transactions that the happy paths left in flight: webhooks that never arrived, purchases
/// whose outcome was unknowable at submission time, checkouts the user walked away from.
///
/// It never invents status. Every decision comes from a fresh authoritative re-query, routed through the same
/// settlement paths the webhook handlers use, so the race rules hold no matter which side asks first.
pub struct ReconcileApi<B> {
    db: B,
    funding: FundingFlowApi<B>,
    purchases: PurchaseApi<B>,
}

impl<B> Debug for ReconcileApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconcileApi")
    }
}

impl<B: Clone> Clone for ReconcileApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), funding: self.funding.clone(), purchases: self.purchases.clone() }
    }
}

impl<B> ReconcileApi<B> {
    pub fn new(db: B, funding: FundingFlowApi<B>, purchases: PurchaseApi<B>) -> Self {
        Self { db, funding, purchases }
    }
}

impl<B> ReconcileApi<B>
where B: LedgerDatabase
{
    /// One sweep run: fetch pending rows older than `staleness`, bounded by `batch`, and reconcile each one.
    ///
    /// Items are independent; an error on one is logged and counted, never aborting the run. Funding attempts the
    /// gateway has no record of are marked `Failed` once they are older than `abandon_window`.
    pub async fn sweep(
        &self,
        staleness: Duration,
        abandon_window: Duration,
        batch: i64,
    ) -> Result<SweepReport, FlowError> {
        let cutoff = Utc::now() - staleness;
        let rows = self.db.fetch_stale_pending(cutoff, batch).await?;
        if rows.is_empty() {
            trace!("🔄️🧹️ Sweep found nothing pending older than {cutoff}");
            return Ok(SweepReport::default());
        }
        debug!("🔄️🧹️ Sweep reconciling {} stale pending transaction(s)", rows.len());
        let mut report = SweepReport::default();
        for row in rows {
            let reference = row.reference.clone();
            match self.reconcile_row(&row, abandon_window).await {
                Ok(outcome) => report.outcomes.push((reference, outcome)),
                Err(e) => {
                    warn!("🔄️🧹️ Sweep could not reconcile [{reference}]: {e}");
                    report.errors += 1;
                },
            }
        }
        info!(
            "🔄️🧹️ Sweep done. {} processed: {} credited, {} delivered, {} reversed, {} failed, {} still pending, \
             {} deferred, {} errors",
            report.processed(),
            report.count_of(SweepOutcome::Credited),
            report.count_of(SweepOutcome::Delivered),
            report.count_of(SweepOutcome::Reversed),
            report.count_of(SweepOutcome::Failed),
            report.count_of(SweepOutcome::StillPending),
            report.count_of(SweepOutcome::Deferred),
            report.errors,
        );
        Ok(report)
    }

    /// Reconcile a single transaction by reference, if it is still pending, and return its latest state. Serves
    /// the inline status check on transaction detail reads.
    pub async fn reconcile_one(
        &self,
        reference: &Reference,
        abandon_window: Duration,
    ) -> Result<Option<Transaction>, FlowError> {
        let Some(tx) = self.db.fetch_transaction(reference).await? else {
            return Ok(None);
        };
        if tx.is_pending() {
            if let Err(e) = self.reconcile_row(&tx, abandon_window).await {
                // The read must still succeed; the sweep will retry the reconciliation.
                warn!("🔄️🧹️ Inline reconciliation of [{reference}] failed: {e}");
            }
        }
        Ok(self.db.fetch_transaction(reference).await?)
    }

    async fn reconcile_row(&self, tx: &Transaction, abandon_window: Duration) -> Result<SweepOutcome, FlowError> {
        if tx.tx_type.is_funding() {
            match self.funding.settle_funding(&tx.reference).await {
                Ok(outcome) => Ok(outcome),
                Err(FlowError::Gateway(GatewayError::NotFound)) => {
                    if tx.created_at < Utc::now() - abandon_window {
                        self.funding.abandon_funding(&tx.reference).await
                    } else {
                        trace!("🔄️🧹️ Funding [{}] not known upstream yet; giving it more time", tx.reference);
                        Ok(SweepOutcome::StillPending)
                    }
                },
                Err(FlowError::Gateway(e)) => {
                    debug!("🔄️🧹️ Deferring funding [{}] after gateway error: {e}", tx.reference);
                    Ok(SweepOutcome::Deferred)
                },
                Err(e) => Err(e),
            }
        } else {
            match self.purchases.requery(tx).await {
                Ok(outcome) => Ok(outcome),
                // A provider losing track of an order is never grounds for a refund. Defer and let an operator or
                // a later sweep resolve it.
                Err(FlowError::Fulfillment(e)) => {
                    let level = match e {
                        FulfillmentError::NotFound => Level::Warn,
                        _ => Level::Debug,
                    };
                    log!(level, "🔄️🧹️ Deferring purchase [{}] after provider error: {e}", tx.reference);
                    Ok(SweepOutcome::Deferred)
                },
                Err(e) => Err(e),
            }
        }
    }
}
