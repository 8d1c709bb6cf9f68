use std::fmt::Debug;

use log::*;
use serde_json::Value;
use vtu_common::Kobo;

use crate::{
    api::{registries::GatewayRegistry, FlowError},
    db_types::{NewFunding, NewVirtualAccount, Reference, Transaction, TxType, VirtualAccount, VirtualAccountCredit},
    events::{EventProducers, TransactionFinalizedEvent, WalletCreditedEvent},
    fees,
    helpers::new_reference,
    traits::{
        CheckoutSession,
        DedicatedAccountRequest,
        FinalizeOutcome,
        InitializePayment,
        LedgerDatabase,
        SweepOutcome,
        VerifiedStatus,
        VerifyTarget,
    },
};

/// `FundingFlowApi` owns every path by which money enters a wallet: checkout initialization, webhook settlement,
/// and inbound dedicated-account transfers.
///
/// The one rule that never bends here: a webhook payload is a hint, not a source of truth. Every credit goes
/// through a fresh `verify` call against the gateway, and the verified amount (minus fees) is what lands on the
/// wallet.
pub struct FundingFlowApi<B> {
    db: B,
    gateways: GatewayRegistry,
    producers: EventProducers,
}

impl<B> Debug for FundingFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FundingFlowApi")
    }
}

impl<B: Clone> Clone for FundingFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), gateways: self.gateways.clone(), producers: self.producers.clone() }
    }
}

impl<B> FundingFlowApi<B> {
    pub fn new(db: B, gateways: GatewayRegistry, producers: EventProducers) -> Self {
        Self { db, gateways, producers }
    }
}

impl<B> FundingFlowApi<B>
where B: LedgerDatabase
{
    /// Start a funding attempt: record a `Pending` ledger row, then ask the gateway for a checkout session.
    ///
    /// The row goes in first so that a gateway success can never be left unaccounted for. If the gateway call
    /// fails, the row is immediately marked `Failed` (nothing was collected) before the error propagates.
    pub async fn initialize_funding(
        &self,
        user_id: i64,
        amount: Kobo,
        email: &str,
        gateway_tag: &str,
    ) -> Result<CheckoutSession, FlowError> {
        if fees::credit_for(amount).is_zero() {
            return Err(FlowError::AmountTooSmall(amount));
        }
        let gateway = self.gateways.get(gateway_tag).ok_or_else(|| FlowError::UnsupportedGateway(gateway_tag.into()))?;
        let reference = new_reference(TxType::Funding);
        let funding = NewFunding {
            user_id,
            amount,
            reference: reference.clone(),
            gateway: gateway_tag.to_string(),
            metadata: serde_json::json!({ "email": email }),
        };
        self.db.create_funding(funding).await?;
        let request =
            InitializePayment { user_id, amount, email: email.to_string(), reference: reference.to_string() };
        match gateway.initialize(request).await {
            Ok(session) => {
                info!("🔄️💰️ Funding [{reference}] initialized on {gateway_tag} for user {user_id} ({amount})");
                Ok(session)
            },
            Err(e) => {
                warn!("🔄️💰️ Gateway {gateway_tag} refused to initialize funding [{reference}]: {e}");
                let _ = self.db.fail_funding(&reference, Some("initialization-failed")).await?;
                Err(e.into())
            },
        }
    }

    /// The single settlement path for a pending funding row, shared by the webhook handler, the inline status
    /// check and the reconciliation sweep.
    ///
    /// Re-verifies the transaction with the gateway that owns it and acts on the verified status only. Exactly one
    /// concurrent caller can observe [`SweepOutcome::Credited`]; every other racer sees
    /// [`SweepOutcome::LostRace`]. A gateway that has no record of the transaction surfaces as
    /// [`crate::traits::GatewayError::NotFound`] so the caller can decide whether the attempt was abandoned.
    pub async fn settle_funding(&self, reference: &Reference) -> Result<SweepOutcome, FlowError> {
        let tx = self
            .db
            .fetch_transaction(reference)
            .await?
            .ok_or_else(|| FlowError::TransactionNotFound(reference.clone()))?;
        if !tx.is_pending() {
            debug!("🔄️💰️ Funding [{reference}] is already {}; suppressing duplicate settlement", tx.status);
            return Ok(SweepOutcome::LostRace);
        }
        if !tx.tx_type.is_funding() {
            return Err(FlowError::NotReconcilable(format!("[{reference}] is a {} transaction", tx.tx_type)));
        }
        let tag = tx.provider.as_deref().unwrap_or_default();
        let gateway = self.gateways.get(tag).ok_or_else(|| FlowError::UnsupportedGateway(tag.into()))?;
        let verification = gateway.verify(VerifyTarget::ByReference(reference.to_string())).await?;
        match verification.status {
            VerifiedStatus::Successful => {
                let gross = verification.amount_paid;
                let net = fees::credit_for(gross);
                let outcome = self
                    .db
                    .credit_funding(
                        reference,
                        gross,
                        net,
                        Some(&verification.provider_id),
                        Some(&verification.raw_status),
                    )
                    .await?;
                match outcome {
                    FinalizeOutcome::Finalized(tx) => {
                        info!("🔄️💰️ Funding [{reference}] settled. {net} credited to user {} ({gross} gross)", tx.user_id);
                        self.call_wallet_credited_hook(&tx).await;
                        self.call_transaction_finalized_hook(&tx).await;
                        Ok(SweepOutcome::Credited)
                    },
                    FinalizeOutcome::AlreadyFinalized => {
                        debug!("🔄️💰️ Funding [{reference}] was settled by a concurrent finalizer");
                        Ok(SweepOutcome::LostRace)
                    },
                    FinalizeOutcome::NotFound => Err(FlowError::TransactionNotFound(reference.clone())),
                }
            },
            VerifiedStatus::Failed => {
                let outcome = self.db.fail_funding(reference, Some(&verification.raw_status)).await?;
                match outcome {
                    FinalizeOutcome::Finalized(tx) => {
                        info!("🔄️💰️ Funding [{reference}] failed upstream ({})", verification.raw_status);
                        self.call_transaction_finalized_hook(&tx).await;
                        Ok(SweepOutcome::Failed)
                    },
                    FinalizeOutcome::AlreadyFinalized => Ok(SweepOutcome::LostRace),
                    FinalizeOutcome::NotFound => Err(FlowError::TransactionNotFound(reference.clone())),
                }
            },
            VerifiedStatus::Pending => {
                trace!("🔄️💰️ Funding [{reference}] is still in flight upstream");
                Ok(SweepOutcome::StillPending)
            },
        }
    }

    /// Mark an abandoned funding attempt as `Failed`. No wallet mutation; nothing was ever collected.
    pub async fn abandon_funding(&self, reference: &Reference) -> Result<SweepOutcome, FlowError> {
        match self.db.fail_funding(reference, Some("abandoned")).await? {
            FinalizeOutcome::Finalized(tx) => {
                info!("🔄️💰️ Funding [{reference}] abandoned; marking failed");
                self.call_transaction_finalized_hook(&tx).await;
                Ok(SweepOutcome::Failed)
            },
            FinalizeOutcome::AlreadyFinalized => Ok(SweepOutcome::LostRace),
            FinalizeOutcome::NotFound => Err(FlowError::TransactionNotFound(reference.clone())),
        }
    }

    /// Credit an inbound transfer into a dedicated virtual account.
    ///
    /// There is no pending row for these; the ledger insert itself is the idempotency lock. A transfer whose
    /// account reference matches no wallet is an operator incident, not a silent drop.
    pub async fn process_virtual_account_credit(
        &self,
        gateway_tag: &str,
        account_reference: &str,
        gross: Kobo,
        provider_id: String,
        provider_status: Option<String>,
        metadata: Value,
    ) -> Result<FinalizeOutcome, FlowError> {
        let owner = self.db.virtual_account_owner(account_reference).await?.ok_or_else(|| {
            error!(
                "🔄️🏦️ Inbound transfer {provider_id} ({gross}) on {gateway_tag} references unknown account \
                 {account_reference}. Operator attention required."
            );
            FlowError::UnmatchedInflow(format!("account reference {account_reference}, transfer {provider_id}"))
        })?;
        let net = fees::credit_for(gross);
        let credit = VirtualAccountCredit {
            user_id: owner.user_id,
            gross,
            net,
            gateway: gateway_tag.to_string(),
            provider_id,
            provider_status,
            metadata,
        };
        let outcome = self.db.credit_virtual_account(credit).await?;
        match &outcome {
            FinalizeOutcome::Finalized(tx) => {
                info!("🔄️🏦️ Transfer [{}] credited {net} to user {} ({gross} gross)", tx.reference, tx.user_id);
                self.call_wallet_credited_hook(tx).await;
                self.call_transaction_finalized_hook(tx).await;
            },
            FinalizeOutcome::AlreadyFinalized => {
                debug!("🔄️🏦️ Duplicate transfer delivery on account {account_reference} suppressed");
            },
            FinalizeOutcome::NotFound => {},
        }
        Ok(outcome)
    }

    /// Ask the gateway for a dedicated virtual account for this user and persist the assignment.
    pub async fn create_virtual_account(
        &self,
        gateway_tag: &str,
        request: DedicatedAccountRequest,
    ) -> Result<VirtualAccount, FlowError> {
        let gateway = self.gateways.get(gateway_tag).ok_or_else(|| FlowError::UnsupportedGateway(gateway_tag.into()))?;
        let user_id = request.user_id;
        let account = gateway.create_dedicated_account(request).await?;
        let saved = self
            .db
            .save_virtual_account(NewVirtualAccount {
                user_id,
                provider: gateway_tag.to_string(),
                account_reference: account.account_reference,
                account_number: account.account_number,
                bank_name: account.bank_name,
            })
            .await?;
        info!("🔄️🏦️ Dedicated account {} ({}) assigned to user {user_id}", saved.account_number, saved.bank_name);
        Ok(saved)
    }

    async fn call_wallet_credited_hook(&self, tx: &Transaction) {
        for emitter in &self.producers.wallet_credited_producer {
            let event = WalletCreditedEvent::new(tx.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_transaction_finalized_hook(&self, tx: &Transaction) {
        for emitter in &self.producers.transaction_finalized_producer {
            let event = TransactionFinalizedEvent::new(tx.clone());
            emitter.publish_event(event).await;
        }
    }
}
