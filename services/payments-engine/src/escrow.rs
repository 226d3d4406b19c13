//! Escrow lifecycle
//!
//! Each operation locks the escrow row, validates the transition through
//! the state machine, moves money through the ledger, and writes its
//! audit rows, all in one unit of work. Release is idempotent: releasing
//! an already-released escrow returns the original outcome unchanged.

use crate::audit::{self, Actor, AuditEvent};
use crate::config::PaymentsConfig;
use crate::database::{Database, PgTx};
use crate::errors::{PaymentsError, Result};
use crate::events::EventPublisher;
use crate::ledger::{LedgerService, NewTransaction, DIRECTION_CREDIT};
use crate::models::{EscrowAccount, SweepReport, Transaction};
use chrono::{Duration, Utc};
use escrow_core::commission::commission_amount;
use escrow_core::state::apply;
use escrow_core::types::{
    DisputeDecision, DisputeResolution, EscrowKind, EscrowStatus, OrderPaymentStatus, OrderStatus,
    PaymentStatus, ReleaseConditions, TransactionType, WalletType,
};
use escrow_core::Error as DomainError;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a release, also returned for repeated release calls.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub escrow: EscrowAccount,
    pub release_transaction_id: Uuid,
    /// False when the escrow was already released and nothing moved
    pub performed: bool,
}

#[derive(Clone)]
pub struct EscrowService {
    db: Database,
    ledger: LedgerService,
    events: EventPublisher,
    settings: PaymentsConfig,
}

impl EscrowService {
    pub fn new(
        db: Database,
        ledger: LedgerService,
        events: EventPublisher,
        settings: PaymentsConfig,
    ) -> Self {
        EscrowService {
            db,
            ledger,
            events,
            settings,
        }
    }

    fn rate_for(&self, kind: EscrowKind) -> Decimal {
        match kind {
            EscrowKind::Order => self.settings.marketplace_commission_rate,
            EscrowKind::Consultation => self.settings.expert_commission_rate,
        }
    }

    /// Open an escrow in `awaiting_deposit` inside the caller's unit of
    /// work. The commission rate is frozen onto the row at creation so a
    /// later schedule change cannot alter an open escrow.
    pub async fn open(
        &self,
        tx: &mut PgTx<'_>,
        kind: EscrowKind,
        amount: Decimal,
        buyer_id: Uuid,
        counterparty_id: Uuid,
        order_id: Option<Uuid>,
        consultation_id: Option<Uuid>,
        actor: Actor,
    ) -> Result<EscrowAccount> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::NonPositiveAmount(amount).into());
        }

        let rate = self.rate_for(kind);
        let commission = commission_amount(amount, rate);
        let conditions = match kind {
            EscrowKind::Order => ReleaseConditions::for_order(),
            EscrowKind::Consultation => ReleaseConditions::for_consultation(),
        };
        let now = Utc::now();
        let expires_at = now + Duration::days(self.settings.escrow_expiry_days);
        let reference = format!(
            "ESC-{}-{}",
            now.format("%Y%m%d"),
            &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        );

        let escrow = sqlx::query_as::<_, EscrowAccount>(
            r#"
            INSERT INTO escrow_accounts (
                id, reference, kind, status, amount, currency,
                commission_rate, commission_amount,
                buyer_id, counterparty_id, order_id, consultation_id,
                release_conditions, expires_at, last_status_change,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15, $15)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&reference)
        .bind(kind.as_str())
        .bind(EscrowStatus::AwaitingDeposit.as_str())
        .bind(amount)
        .bind(&self.settings.currency)
        .bind(rate)
        .bind(commission)
        .bind(buyer_id)
        .bind(counterparty_id)
        .bind(order_id)
        .bind(consultation_id)
        .bind(serde_json::to_value(&conditions)?)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::ESCROW_CREATED,
                actor,
                entity_type: "escrow",
                entity_id: Some(escrow.id),
                details: json!({
                    "reference": reference,
                    "kind": kind.as_str(),
                    "amount": amount,
                    "commission_rate": rate,
                    "commission_amount": commission,
                    "expires_at": expires_at,
                }),
            },
        )
        .await?;

        info!("Opened {} escrow {} for {} {}", kind, escrow.id, amount, self.settings.currency);
        Ok(escrow)
    }

    /// Lock the escrow row for the rest of the unit of work.
    pub async fn lock(&self, tx: &mut PgTx<'_>, escrow_id: Uuid) -> Result<EscrowAccount> {
        sqlx::query_as::<_, EscrowAccount>(
            "SELECT * FROM escrow_accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(escrow_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(PaymentsError::EscrowNotFound(escrow_id))
    }

    pub async fn lock_by_order(&self, tx: &mut PgTx<'_>, order_id: Uuid) -> Result<EscrowAccount> {
        sqlx::query_as::<_, EscrowAccount>(
            "SELECT * FROM escrow_accounts WHERE order_id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(PaymentsError::OrderNotFound(order_id))
    }

    /// Mark an escrow funded from a completed funding transaction. The
    /// funding amount must equal the escrow amount exactly; partial
    /// funding is never accepted.
    pub async fn fund(
        &self,
        tx: &mut PgTx<'_>,
        escrow: &EscrowAccount,
        funding: &Transaction,
        actor: Actor,
    ) -> Result<EscrowAccount> {
        let status = parse_status(&escrow.status)?;

        if PaymentStatus::from_str(&funding.status) != Some(PaymentStatus::Completed) {
            return Err(PaymentsError::PaymentNotCompleted(funding.reference.clone()));
        }

        // The transaction must actually be this escrow's deposit; a
        // completed transaction of the right amount is not enough.
        let references_escrow = funding.escrow_id == Some(escrow.id)
            || (escrow.order_id.is_some() && funding.order_id == escrow.order_id);
        if !references_escrow {
            return Err(PaymentsError::Validation(format!(
                "transaction {} does not reference escrow {}",
                funding.reference, escrow.id
            )));
        }

        if funding.amount != escrow.amount {
            return Err(DomainError::AmountMismatch {
                expected: escrow.amount,
                actual: funding.amount,
            }
            .into());
        }

        let next = apply(status, EscrowStatus::Funded).map_err(PaymentsError::from)?;
        let now = Utc::now();
        // Recomputed on entry; the exact-match guard above makes this a
        // restatement of the frozen value, never a change.
        let commission = commission_amount(escrow.amount, escrow.commission_rate);
        // Expiry is measured from the status change, so the window
        // restarts when funds actually arrive.
        let expires_at = now + Duration::days(self.settings.escrow_expiry_days);

        let escrow = sqlx::query_as::<_, EscrowAccount>(
            r#"
            UPDATE escrow_accounts
            SET status = $2, funding_transaction_id = $3, commission_amount = $4,
                funded_at = $5, last_status_change = $5, expires_at = $6, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(escrow.id)
        .bind(next.as_str())
        .bind(funding.id)
        .bind(commission)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut **tx)
        .await?;

        self.record_status_change(tx, &escrow, status, next, actor, json!({
            "funding_transaction_id": funding.id,
        }))
        .await?;

        Ok(escrow)
    }

    /// Fund an escrow from an existing completed transaction, in its own
    /// unit of work. The HTTP surface for out-of-band funding.
    pub async fn fund_from_transaction(
        &self,
        escrow_id: Uuid,
        funding_transaction_id: Uuid,
        actor: Actor,
    ) -> Result<EscrowAccount> {
        let mut tx = self.db.begin().await?;

        let escrow = self.lock(&mut tx, escrow_id).await?;
        let funding = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1",
        )
        .bind(funding_transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            PaymentsError::TransactionNotFound(funding_transaction_id.to_string())
        })?;

        let escrow = self.fund(&mut tx, &escrow, &funding, actor).await?;
        tx.commit().await?;

        self.events
            .escrow_status_changed(
                escrow.id,
                EscrowStatus::AwaitingDeposit.as_str(),
                &escrow.status,
            )
            .await;

        Ok(escrow)
    }

    /// Release held funds: net amount to the counterparty, commission to
    /// the platform wallet. Calling release on an already-released escrow
    /// returns the original outcome without moving money again.
    pub async fn release(&self, escrow_id: Uuid, actor: Actor) -> Result<ReleaseOutcome> {
        let mut tx = self.db.begin().await?;

        let escrow = self.lock(&mut tx, escrow_id).await?;
        let status = parse_status(&escrow.status)?;

        if status == EscrowStatus::Released {
            let release_transaction_id = escrow.release_transaction_id.ok_or_else(|| {
                PaymentsError::Internal(format!(
                    "released escrow {} has no release transaction",
                    escrow.id
                ))
            })?;
            tx.commit().await?;
            return Ok(ReleaseOutcome {
                escrow,
                release_transaction_id,
                performed: false,
            });
        }

        if !status.is_releasable() {
            return Err(DomainError::InvalidTransition {
                from: status,
                to: EscrowStatus::Released,
            }
            .into());
        }

        self.check_release_conditions(&mut tx, &escrow, &actor).await?;

        let outcome = match self
            .perform_release(&mut tx, escrow, status, actor.clone())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tx.rollback().await.ok();
                self.record_credit_rejection(escrow_id, actor, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        self.events
            .escrow_status_changed(
                outcome.escrow.id,
                status.as_str(),
                EscrowStatus::Released.as_str(),
            )
            .await;
        self.events
            .notify(
                outcome.escrow.counterparty_id,
                "escrow_released",
                "Funds from your escrow have been released to your wallet",
            )
            .await;

        Ok(outcome)
    }

    /// Check the conditions frozen onto the escrow at creation before a
    /// release is allowed to proceed.
    ///
    /// The buyer confirming receipt satisfies both kinds of condition;
    /// a delivery-gated escrow otherwise waits for the order to reach
    /// `delivered`. Admin resolutions bypass the check, and expiry never
    /// releases, so neither path comes through here.
    async fn check_release_conditions(
        &self,
        tx: &mut PgTx<'_>,
        escrow: &EscrowAccount,
        actor: &Actor,
    ) -> Result<()> {
        if actor.role == "admin" {
            return Ok(());
        }

        let conditions: ReleaseConditions =
            serde_json::from_value(escrow.release_conditions.clone())?;
        let buyer_confirmed = actor.id == Some(escrow.buyer_id);

        if conditions.requires_delivery_confirmation && !buyer_confirmed {
            let delivered = match escrow.order_id {
                Some(order_id) => {
                    let (status,): (String,) =
                        sqlx::query_as("SELECT status FROM orders WHERE id = $1")
                            .bind(order_id)
                            .fetch_one(&mut **tx)
                            .await?;
                    OrderStatus::from_str(&status) == Some(OrderStatus::Delivered)
                }
                None => false,
            };
            if !delivered {
                return Err(DomainError::ReleaseConditionUnmet {
                    condition: "delivery_confirmation",
                }
                .into());
            }
        }

        if conditions.requires_consultation_completion && !buyer_confirmed {
            return Err(DomainError::ReleaseConditionUnmet {
                condition: "consultation_completion",
            }
            .into());
        }

        Ok(())
    }

    /// The money-moving half of release, shared with dispute resolution
    /// and run inside the caller's unit of work.
    async fn perform_release(
        &self,
        tx: &mut PgTx<'_>,
        escrow: EscrowAccount,
        status: EscrowStatus,
        actor: Actor,
    ) -> Result<ReleaseOutcome> {
        let kind = parse_kind(&escrow.kind)?;
        // Retry of an interrupted release is already in `releasing`
        let releasing = if status == EscrowStatus::Releasing {
            status
        } else {
            apply(status, EscrowStatus::Releasing)?
        };

        let counterparty_type = match kind {
            EscrowKind::Order => WalletType::Seller,
            EscrowKind::Consultation => WalletType::Expert,
        };
        let counterparty_wallet = self
            .ledger
            .lock_or_create_wallet(tx, escrow.counterparty_id, counterparty_type)
            .await?;

        let mut release_tx = NewTransaction::new(
            counterparty_wallet.id,
            TransactionType::Payment,
            DIRECTION_CREDIT,
            escrow.amount,
        );
        release_tx.payer_id = Some(escrow.buyer_id);
        release_tx.payee_id = Some(escrow.counterparty_id);
        release_tx.platform_fee = Some(escrow.commission_amount);
        release_tx.order_id = escrow.order_id;
        release_tx.escrow_id = Some(escrow.id);
        release_tx.description = Some(format!("Escrow release {}", escrow.reference));
        let release_transaction = self
            .ledger
            .credit(tx, &counterparty_wallet, actor.clone(), release_tx)
            .await?;

        let platform_wallet = self
            .ledger
            .lock_or_create_wallet(tx, self.settings.platform_user_id, WalletType::Platform)
            .await?;

        let mut fee_tx = NewTransaction::new(
            platform_wallet.id,
            TransactionType::Fee,
            DIRECTION_CREDIT,
            escrow.commission_amount,
        );
        fee_tx.payer_id = Some(escrow.buyer_id);
        fee_tx.payee_id = Some(self.settings.platform_user_id);
        fee_tx.order_id = escrow.order_id;
        fee_tx.escrow_id = Some(escrow.id);
        fee_tx.parent_transaction_id = Some(release_transaction.id);
        fee_tx.description = Some(format!("Commission on {}", escrow.reference));
        self.ledger
            .credit(tx, &platform_wallet, Actor::system(), fee_tx)
            .await?;

        let released = apply(releasing, EscrowStatus::Released)?;
        let now = Utc::now();
        let escrow = sqlx::query_as::<_, EscrowAccount>(
            r#"
            UPDATE escrow_accounts
            SET status = $2, release_transaction_id = $3, released_at = $4,
                last_status_change = $4, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(escrow.id)
        .bind(released.as_str())
        .bind(release_transaction.id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        self.record_status_change(tx, &escrow, status, released, actor, json!({
            "release_transaction_id": release_transaction.id,
            "counterparty_credit": escrow.amount - escrow.commission_amount,
            "commission": escrow.commission_amount,
        }))
        .await?;

        Ok(ReleaseOutcome {
            escrow,
            release_transaction_id: release_transaction.id,
            performed: true,
        })
    }

    /// Freeze an escrow under dispute. Only funded or releasing escrows
    /// can be disputed.
    pub async fn dispute(
        &self,
        escrow_id: Uuid,
        raised_by: Uuid,
        reason: &str,
    ) -> Result<EscrowAccount> {
        let mut tx = self.db.begin().await?;

        let escrow = self.lock(&mut tx, escrow_id).await?;
        let status = parse_status(&escrow.status)?;
        let next = apply(status, EscrowStatus::Disputed)?;

        let now = Utc::now();
        // A live dispute restarts the expiry clock so it cannot be swept
        // out from under the parties mid-review.
        let expires_at = now + Duration::days(self.settings.escrow_expiry_days);
        let escrow = sqlx::query_as::<_, EscrowAccount>(
            r#"
            UPDATE escrow_accounts
            SET status = $2, dispute_reason = $3, disputed_by = $4,
                last_status_change = $5, expires_at = $6, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(escrow.id)
        .bind(next.as_str())
        .bind(reason)
        .bind(raised_by)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            AuditEvent {
                action: audit::ESCROW_DISPUTED,
                actor: Actor::user(raised_by),
                entity_type: "escrow",
                entity_id: Some(escrow.id),
                details: json!({ "from": status.as_str(), "reason": reason }),
            },
        )
        .await?;

        tx.commit().await?;

        self.events
            .escrow_status_changed(escrow.id, status.as_str(), next.as_str())
            .await;

        Ok(escrow)
    }

    /// Resolve a disputed escrow by an admin decision: release to the
    /// counterparty or refund the buyer. The decision is recorded on the
    /// escrow row alongside the audit trail.
    pub async fn resolve(
        &self,
        escrow_id: Uuid,
        decision: DisputeDecision,
        resolved_by: Uuid,
        notes: Option<String>,
    ) -> Result<EscrowAccount> {
        let mut tx = self.db.begin().await?;

        let escrow = self.lock(&mut tx, escrow_id).await?;
        let status = parse_status(&escrow.status)?;

        if status != EscrowStatus::Disputed {
            return Err(DomainError::InvalidTransition {
                from: status,
                to: match decision {
                    DisputeDecision::Release => EscrowStatus::Releasing,
                    DisputeDecision::Refund => EscrowStatus::Refunding,
                },
            }
            .into());
        }

        let resolution = DisputeResolution {
            decision,
            resolved_by,
            notes: notes.clone(),
            resolved_at: Utc::now(),
        };
        sqlx::query(
            "UPDATE escrow_accounts SET dispute_resolution = $2, admin_notes = $3 WHERE id = $1",
        )
        .bind(escrow.id)
        .bind(serde_json::to_value(&resolution)?)
        .bind(notes.as_deref())
        .execute(&mut *tx)
        .await?;

        let actor = Actor::admin(resolved_by);
        let result = match decision {
            DisputeDecision::Release => self
                .perform_release(&mut tx, escrow, status, actor.clone())
                .await
                .map(|outcome| outcome.escrow),
            DisputeDecision::Refund => {
                self.perform_refund(&mut tx, escrow, status, actor.clone())
                    .await
            }
        };
        let escrow = match result {
            Ok(escrow) => escrow,
            Err(e) => {
                tx.rollback().await.ok();
                self.record_credit_rejection(escrow_id, actor, &e).await;
                return Err(e);
            }
        };

        audit::record(
            &mut tx,
            AuditEvent {
                action: audit::ESCROW_RESOLVED,
                actor,
                entity_type: "escrow",
                entity_id: Some(escrow.id),
                details: json!({
                    "decision": match decision {
                        DisputeDecision::Release => "release",
                        DisputeDecision::Refund => "refund",
                    },
                    "notes": notes,
                }),
            },
        )
        .await?;

        tx.commit().await?;

        self.events
            .escrow_status_changed(escrow.id, EscrowStatus::Disputed.as_str(), &escrow.status)
            .await;

        Ok(escrow)
    }

    /// Refund held funds to the buyer in full.
    pub async fn refund(&self, escrow_id: Uuid, actor: Actor) -> Result<EscrowAccount> {
        let mut tx = self.db.begin().await?;

        let escrow = self.lock(&mut tx, escrow_id).await?;
        let status = parse_status(&escrow.status)?;

        if !status.is_refundable() {
            return Err(DomainError::InvalidTransition {
                from: status,
                to: EscrowStatus::Refunding,
            }
            .into());
        }

        let escrow = match self
            .perform_refund(&mut tx, escrow, status, actor.clone())
            .await
        {
            Ok(escrow) => escrow,
            Err(e) => {
                tx.rollback().await.ok();
                self.record_credit_rejection(escrow_id, actor, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        self.events
            .escrow_status_changed(escrow.id, status.as_str(), &escrow.status)
            .await;
        self.events
            .notify(
                escrow.buyer_id,
                "escrow_refunded",
                "Your escrowed payment has been refunded to your wallet",
            )
            .await;

        Ok(escrow)
    }

    /// The money-moving half of refund: full amount back to the buyer,
    /// refund transaction linked to the funding transaction it reverses.
    async fn perform_refund(
        &self,
        tx: &mut PgTx<'_>,
        escrow: EscrowAccount,
        status: EscrowStatus,
        actor: Actor,
    ) -> Result<EscrowAccount> {
        // Retry of an interrupted refund is already in `refunding`
        let refunding = if status == EscrowStatus::Refunding {
            status
        } else {
            apply(status, EscrowStatus::Refunding)?
        };

        let funding_transaction_id = escrow.funding_transaction_id.ok_or_else(|| {
            PaymentsError::from(DomainError::NotFunded(status))
        })?;

        let buyer_wallet = self
            .ledger
            .lock_or_create_wallet(tx, escrow.buyer_id, WalletType::Buyer)
            .await?;

        let mut refund_tx = NewTransaction::new(
            buyer_wallet.id,
            TransactionType::Refund,
            DIRECTION_CREDIT,
            escrow.amount,
        );
        refund_tx.payee_id = Some(escrow.buyer_id);
        refund_tx.parent_transaction_id = Some(funding_transaction_id);
        refund_tx.order_id = escrow.order_id;
        refund_tx.escrow_id = Some(escrow.id);
        refund_tx.description = Some(format!("Escrow refund {}", escrow.reference));
        let refund_transaction = self
            .ledger
            .credit(tx, &buyer_wallet, actor.clone(), refund_tx)
            .await?;

        let refunded = apply(refunding, EscrowStatus::Refunded)?;
        let now = Utc::now();
        let escrow = sqlx::query_as::<_, EscrowAccount>(
            r#"
            UPDATE escrow_accounts
            SET status = $2, refund_transaction_id = $3, refunded_at = $4,
                last_status_change = $4, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(escrow.id)
        .bind(refunded.as_str())
        .bind(refund_transaction.id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        if let Some(order_id) = escrow.order_id {
            sqlx::query(
                "UPDATE orders SET payment_status = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(order_id)
            .bind(OrderPaymentStatus::Refunded.as_str())
            .bind(now)
            .execute(&mut **tx)
            .await?;

            audit::record(
                tx,
                AuditEvent {
                    action: audit::ORDER_REFUNDED,
                    actor: actor.clone(),
                    entity_type: "order",
                    entity_id: Some(order_id),
                    details: json!({ "escrow_id": escrow.id, "amount": escrow.amount }),
                },
            )
            .await?;
        }

        self.record_status_change(tx, &escrow, status, refunded, actor, json!({
            "refund_transaction_id": refund_transaction.id,
            "parent_transaction_id": funding_transaction_id,
        }))
        .await?;

        Ok(escrow)
    }

    /// Refund escrows whose expiry has passed. Each escrow gets its own
    /// unit of work; `SKIP LOCKED` keeps concurrent sweeps and in-flight
    /// releases from colliding.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let candidates: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM escrow_accounts
            WHERE expires_at < now()
              AND status IN ('funded', 'releasing', 'disputed')
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut swept = 0usize;
        let mut skipped = 0usize;

        for (escrow_id,) in candidates {
            match self.sweep_one(escrow_id).await {
                Ok(true) => swept += 1,
                Ok(false) => skipped += 1,
                Err(e) => {
                    warn!("Failed to sweep expired escrow {}: {}", escrow_id, e);
                    skipped += 1;
                }
            }
        }

        if swept > 0 || skipped > 0 {
            info!("Expiry sweep complete: {} refunded, {} skipped", swept, skipped);
        }

        Ok(SweepReport { swept, skipped })
    }

    async fn sweep_one(&self, escrow_id: Uuid) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        // Re-check under the lock: the escrow may have been released or
        // refunded since the candidate scan.
        let Some(escrow) = sqlx::query_as::<_, EscrowAccount>(
            r#"
            SELECT * FROM escrow_accounts
            WHERE id = $1 AND expires_at < now()
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(escrow_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(false);
        };

        let status = parse_status(&escrow.status)?;
        if !status.can_expire() {
            return Ok(false);
        }

        audit::record(
            &mut tx,
            AuditEvent {
                action: audit::ESCROW_EXPIRED,
                actor: Actor::system(),
                entity_type: "escrow",
                entity_id: Some(escrow.id),
                details: json!({ "expired_at": escrow.expires_at, "status": status.as_str() }),
            },
        )
        .await?;

        let escrow = self
            .perform_refund(&mut tx, escrow, status, Actor::system())
            .await?;
        tx.commit().await?;

        self.events
            .notify(
                escrow.buyer_id,
                "escrow_expired",
                "An expired escrow has been refunded to your wallet",
            )
            .await;

        Ok(true)
    }

    pub async fn get(&self, escrow_id: Uuid) -> Result<EscrowAccount> {
        sqlx::query_as::<_, EscrowAccount>("SELECT * FROM escrow_accounts WHERE id = $1")
            .bind(escrow_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(PaymentsError::EscrowNotFound(escrow_id))
    }

    /// A ledger guard stopping a release or refund rolls the unit of
    /// work back; the attempt itself still belongs on the audit trail.
    async fn record_credit_rejection(&self, escrow_id: Uuid, actor: Actor, e: &PaymentsError) {
        let guard_failure = matches!(
            e,
            PaymentsError::Domain(
                DomainError::InsufficientFunds { .. }
                    | DomainError::SingleLimitExceeded { .. }
                    | DomainError::DailyLimitExceeded { .. }
                    | DomainError::WalletInactive(_)
            )
        );
        if !guard_failure {
            return;
        }

        audit::record_rejection(
            self.db.pool(),
            audit::WALLET_CREDIT_REJECTED,
            actor,
            "escrow",
            Some(escrow_id),
            json!({ "reason": e.to_string() }),
        )
        .await;
    }

    async fn record_status_change(
        &self,
        tx: &mut PgTx<'_>,
        escrow: &EscrowAccount,
        from: EscrowStatus,
        to: EscrowStatus,
        actor: Actor,
        details: serde_json::Value,
    ) -> Result<()> {
        let mut merged = json!({ "from": from.as_str(), "to": to.as_str() });
        if let (Some(base), Some(extra)) = (merged.as_object_mut(), details.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }

        audit::record(
            tx,
            AuditEvent {
                action: audit::ESCROW_STATUS_CHANGED,
                actor,
                entity_type: "escrow",
                entity_id: Some(escrow.id),
                details: merged,
            },
        )
        .await
    }
}

fn parse_status(s: &str) -> Result<EscrowStatus> {
    EscrowStatus::from_str(s).ok_or_else(|| {
        DomainError::UnknownValue {
            field: "escrow.status",
            value: s.to_string(),
        }
        .into()
    })
}

fn parse_kind(s: &str) -> Result<EscrowKind> {
    EscrowKind::from_str(s).ok_or_else(|| {
        DomainError::UnknownValue {
            field: "escrow.kind",
            value: s.to_string(),
        }
        .into()
    })
}
