use std::fmt::Debug;

use chrono::Duration;
use log::*;
use serde_json::Value;

use crate::{
    api::{registries::ProviderRegistry, FlowError},
    db_types::{NewPurchase, RechargePin, Reference, Transaction},
    events::{EventProducers, TransactionFinalizedEvent},
    helpers::new_reference,
    traits::{
        FinalizeOutcome,
        FulfillmentError,
        FulfillmentStatus,
        LedgerDatabase,
        PurchaseOutcome,
        PurchaseRequest,
        RedebitOutcome,
        ServiceKind,
        SweepOutcome,
    },
};

/// A client's purchase order, before pricing. The amount is deliberately absent: the authoritative price comes
/// from the provider catalog, never from the client.
#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    pub service: ServiceKind,
    pub item_code: String,
    pub recipient: String,
    pub extras: Value,
}

/// What the caller gets back from a purchase.
///
/// `Processing` covers both an explicit upstream "accepted" and a transport failure after the debit: in both cases
/// the money stays debited, the row stays `Pending`, and reconciliation decides the rest. Refunding on a timeout
/// would hand out free goods whenever the timeout hid a success.
#[derive(Debug, Clone)]
pub enum PurchaseReceipt {
    Delivered { transaction: Transaction, token: Option<String>, pins: Vec<RechargePin> },
    Processing { transaction: Transaction },
    Failed { transaction: Transaction, reason: String },
}

/// `PurchaseApi` owns the debit-then-deliver flow and its aftermath.
///
/// The ordering is fixed: debit first (atomically, with the balance check), then call the provider outside any
/// database transaction. Holding a database transaction across an upstream HTTP call would serialize every
/// purchase behind the slowest provider.
pub struct PurchaseApi<B> {
    db: B,
    providers: ProviderRegistry,
    producers: EventProducers,
}

impl<B> Debug for PurchaseApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PurchaseApi")
    }
}

impl<B: Clone> Clone for PurchaseApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), providers: self.providers.clone(), producers: self.producers.clone() }
    }
}

impl<B> PurchaseApi<B> {
    pub fn new(db: B, providers: ProviderRegistry, producers: EventProducers) -> Self {
        Self { db, providers, producers }
    }
}

impl<B> PurchaseApi<B>
where B: LedgerDatabase
{
    /// Execute a purchase end to end: price it from the catalog, debit the wallet, place the order, and settle the
    /// ledger row according to what the provider said.
    pub async fn purchase(
        &self,
        user_id: i64,
        provider_tag: &str,
        order: PurchaseOrder,
    ) -> Result<PurchaseReceipt, FlowError> {
        let provider =
            self.providers.get(provider_tag).ok_or_else(|| FlowError::UnsupportedProvider(provider_tag.into()))?;
        let price = provider.price_for(order.service, &order.item_code).await?;
        let reference = new_reference(order.service.tx_type());
        let metadata = serde_json::json!({
            "service": order.service.to_string(),
            "item_code": order.item_code,
            "recipient": order.recipient,
        });
        let purchase = NewPurchase {
            user_id,
            amount: price,
            tx_type: order.service.tx_type(),
            reference: reference.clone(),
            provider: provider_tag.to_string(),
            metadata,
        };
        let tx = self.db.debit_for_purchase(purchase).await?;
        debug!("🔄️🛒️ Purchase [{reference}] debited {price} from user {user_id}; placing order on {provider_tag}");
        let request = PurchaseRequest {
            service: order.service,
            item_code: order.item_code,
            recipient: order.recipient,
            amount: price,
            extras: order.extras,
        };
        match provider.purchase(request, reference.as_str()).await {
            Ok(PurchaseOutcome::Delivered { order_id, raw_status, token, pins }) => {
                let outcome = self
                    .db
                    .finalize_purchase(&reference, Some(&order_id), Some(&raw_status), token.as_deref())
                    .await?;
                match outcome {
                    FinalizeOutcome::Finalized(tx) => {
                        let stored =
                            if pins.is_empty() { Vec::new() } else { self.db.store_pins(tx.id, &pins).await? };
                        info!("🔄️🛒️ Purchase [{reference}] delivered by {provider_tag} ({raw_status})");
                        self.call_transaction_finalized_hook(&tx).await;
                        Ok(PurchaseReceipt::Delivered { transaction: tx, token, pins: stored })
                    },
                    // a racing finalizer can only have seen the same delivery
                    _ => Ok(PurchaseReceipt::Processing { transaction: tx }),
                }
            },
            Ok(PurchaseOutcome::Accepted { order_id, raw_status }) => {
                self.db.record_provider_reference(&reference, &order_id, Some(&raw_status)).await?;
                info!("🔄️🛒️ Purchase [{reference}] accepted by {provider_tag} as {order_id}; awaiting delivery");
                Ok(PurchaseReceipt::Processing { transaction: tx })
            },
            Err(FulfillmentError::Rejected(reason)) | Err(FulfillmentError::UnknownItem(reason)) => {
                let outcome = self.db.reverse_purchase(&reference, Some(&reason)).await?;
                if let FinalizeOutcome::Finalized(tx) = &outcome {
                    info!("🔄️🛒️ Purchase [{reference}] rejected by {provider_tag} ({reason}); {} refunded", tx.amount);
                    self.call_transaction_finalized_hook(tx).await;
                }
                let transaction = match outcome {
                    FinalizeOutcome::Finalized(tx) => tx,
                    _ => tx,
                };
                Ok(PurchaseReceipt::Failed { transaction, reason })
            },
            Err(e) => {
                // Transient, NotFound and Unknown all mean the truth is unknowable right now. The row stays
                // pending and reconciliation takes over.
                warn!("🔄️🛒️ Purchase [{reference}] outcome unknown after {provider_tag} call ({e}); leaving pending");
                Ok(PurchaseReceipt::Processing { transaction: tx })
            },
        }
    }

    /// Re-query a pending purchase against its provider and settle the row accordingly. Used by the sweep and the
    /// inline status check.
    pub async fn requery(&self, tx: &Transaction) -> Result<SweepOutcome, FlowError> {
        let tag = tx.provider.as_deref().unwrap_or_default();
        let provider = self.providers.get(tag).ok_or_else(|| FlowError::UnsupportedProvider(tag.into()))?;
        let reference = &tx.reference;
        // Providers that accepted asynchronously gave us an order id; the rest re-query by our own reference,
        // which doubled as the idempotent request id at submission.
        let order_id = tx.provider_reference.clone().unwrap_or_else(|| reference.to_string());
        match provider.query_status(&order_id).await? {
            FulfillmentStatus::Delivered { token } => {
                let outcome = self.db.finalize_purchase(reference, Some(&order_id), None, token.as_deref()).await?;
                match outcome {
                    FinalizeOutcome::Finalized(tx) => {
                        info!("🔄️🛒️ Purchase [{reference}] confirmed delivered on re-query");
                        self.call_transaction_finalized_hook(&tx).await;
                        Ok(SweepOutcome::Delivered)
                    },
                    FinalizeOutcome::AlreadyFinalized => Ok(SweepOutcome::LostRace),
                    FinalizeOutcome::NotFound => Err(FlowError::TransactionNotFound(reference.clone())),
                }
            },
            FulfillmentStatus::Failed { raw_status } => {
                let outcome = self.db.reverse_purchase(reference, Some(&raw_status)).await?;
                match outcome {
                    FinalizeOutcome::Finalized(tx) => {
                        info!("🔄️🛒️ Purchase [{reference}] failed upstream ({raw_status}); {} refunded", tx.amount);
                        self.call_transaction_finalized_hook(&tx).await;
                        Ok(SweepOutcome::Reversed)
                    },
                    FinalizeOutcome::AlreadyFinalized => Ok(SweepOutcome::LostRace),
                    FinalizeOutcome::NotFound => Err(FlowError::TransactionNotFound(reference.clone())),
                }
            },
            FulfillmentStatus::Pending => Ok(SweepOutcome::StillPending),
        }
    }

    /// The audited exception to "refunds are final": a purchase that was refunded on a provider failure report,
    /// which the provider later contradicts with a success. See
    /// [`LedgerDatabase::redebit_corrected_purchase`](crate::traits::LedgerDatabase::redebit_corrected_purchase)
    /// for the guardrails.
    pub async fn correct_refund(&self, reference: &Reference, window: Duration) -> Result<RedebitOutcome, FlowError> {
        let outcome = self.db.redebit_corrected_purchase(reference, window).await?;
        if let RedebitOutcome::Corrected { original, compensation } = &outcome {
            warn!(
                "🔄️🛒️ Refund on [{reference}] corrected: {} re-debited from user {} as [{}]",
                compensation.amount, original.user_id, compensation.reference
            );
            self.call_transaction_finalized_hook(compensation).await;
        }
        Ok(outcome)
    }

    async fn call_transaction_finalized_hook(&self, tx: &Transaction) {
        for emitter in &self.producers.transaction_finalized_producer {
            let event = TransactionFinalizedEvent::new(tx.clone());
            emitter.publish_event(event).await;
        }
    }
}
