//! Wallet ledger
//!
//! All balance changes go through [`LedgerService::credit`] and
//! [`LedgerService::debit`]: lock the wallet row, build a snapshot with
//! today's totals, run the guards, then apply the change and record the
//! transaction and audit rows in the caller's unit of work.

use crate::audit::{self, Actor, AuditEvent};
use crate::config::PaymentsConfig;
use crate::database::PgTx;
use crate::errors::{PaymentsError, Result};
use crate::models::{Transaction, Wallet};
use chrono::Utc;
use escrow_core::commission::net_amount;
use escrow_core::ledger::{check_credit, check_debit, WalletSnapshot};
use escrow_core::types::{
    PaymentStatus, SettlementStatus, TransactionType, VerificationLevel, WalletStatus, WalletType,
};
use escrow_core::Error as DomainError;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

pub const DIRECTION_DEBIT: &str = "debit";
pub const DIRECTION_CREDIT: &str = "credit";

/// Everything needed to write one ledger transaction row.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: Uuid,
    pub payer_id: Option<Uuid>,
    pub payee_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub direction: &'static str,
    pub amount: Decimal,
    pub provider_fee: Option<Decimal>,
    pub platform_fee: Option<Decimal>,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub provider_reference: Option<String>,
    pub parent_transaction_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub escrow_id: Option<Uuid>,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(
        wallet_id: Uuid,
        transaction_type: TransactionType,
        direction: &'static str,
        amount: Decimal,
    ) -> Self {
        NewTransaction {
            wallet_id,
            payer_id: None,
            payee_id: None,
            transaction_type,
            direction,
            amount,
            provider_fee: None,
            platform_fee: None,
            status: PaymentStatus::Completed,
            payment_method: None,
            provider_reference: None,
            parent_transaction_id: None,
            order_id: None,
            escrow_id: None,
            description: None,
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    settings: PaymentsConfig,
}

impl LedgerService {
    pub fn new(settings: PaymentsConfig) -> Self {
        LedgerService { settings }
    }

    /// Load a user's wallet, creating it with the configured limits on
    /// first use.
    pub async fn get_or_create_wallet(
        &self,
        tx: &mut PgTx<'_>,
        user_id: Uuid,
        wallet_type: WalletType,
    ) -> Result<Wallet> {
        if let Some(wallet) = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        {
            return Ok(wallet);
        }

        let now = Utc::now();
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (
                id, user_id, wallet_type, balance, pending_balance, currency, status,
                verification_level, single_transaction_limit, daily_transaction_limit,
                total_credited, total_debited, settings, created_at, updated_at
            )
            VALUES ($1, $2, $3, 0, 0, $4, $5, $6, $7, $8, 0, 0, '{}'::jsonb, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(wallet_type.as_str())
        .bind(&self.settings.currency)
        .bind(WalletStatus::Active.as_str())
        .bind(VerificationLevel::Basic.as_str())
        .bind(self.settings.single_transaction_limit)
        .bind(self.settings.daily_transaction_limit)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::WALLET_CREATED,
                actor: Actor::system(),
                entity_type: "wallet",
                entity_id: Some(wallet.id),
                details: json!({
                    "user_id": user_id,
                    "wallet_type": wallet_type.as_str(),
                    "currency": self.settings.currency,
                }),
            },
        )
        .await?;

        info!("Created {} wallet {} for user {}", wallet_type, wallet.id, user_id);
        Ok(wallet)
    }

    /// Lock the wallet row for the rest of the unit of work.
    pub async fn lock_wallet(&self, tx: &mut PgTx<'_>, user_id: Uuid) -> Result<Wallet> {
        sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(PaymentsError::WalletNotFound(user_id))
    }

    /// Lock the wallet, creating it first when absent. New wallets are
    /// inserted inside this unit of work, so the insert itself holds the
    /// row lock.
    pub async fn lock_or_create_wallet(
        &self,
        tx: &mut PgTx<'_>,
        user_id: Uuid,
        wallet_type: WalletType,
    ) -> Result<Wallet> {
        self.get_or_create_wallet(tx, user_id, wallet_type).await?;
        self.lock_wallet(tx, user_id).await
    }

    /// Build the guard snapshot: current row state plus today's completed
    /// debits and credits (UTC day window).
    pub async fn snapshot(&self, tx: &mut PgTx<'_>, wallet: &Wallet) -> Result<WalletSnapshot> {
        let (debited_today, credited_today): (Option<Decimal>, Option<Decimal>) =
            sqlx::query_as(
                r#"
                SELECT
                    SUM(amount) FILTER (WHERE direction = 'debit'),
                    SUM(amount) FILTER (WHERE direction = 'credit')
                FROM transactions
                WHERE wallet_id = $1
                  AND status = 'completed'
                  AND created_at >= date_trunc('day', now() AT TIME ZONE 'utc')
                "#,
            )
            .bind(wallet.id)
            .fetch_one(&mut **tx)
            .await?;

        let status = WalletStatus::from_str(&wallet.status).ok_or_else(|| {
            DomainError::UnknownValue {
                field: "wallet.status",
                value: wallet.status.clone(),
            }
        })?;

        Ok(WalletSnapshot {
            balance: wallet.balance,
            status,
            single_transaction_limit: wallet.single_transaction_limit,
            daily_transaction_limit: wallet.daily_transaction_limit,
            debited_today: debited_today.unwrap_or(Decimal::ZERO),
            credited_today: credited_today.unwrap_or(Decimal::ZERO),
        })
    }

    /// Credit a locked wallet and write the transaction and audit rows.
    ///
    /// Guards run against the gross amount; the balance moves by the net
    /// (gross minus fees), so fee-bearing credits land already netted.
    pub async fn credit(
        &self,
        tx: &mut PgTx<'_>,
        wallet: &Wallet,
        actor: Actor,
        new_tx: NewTransaction,
    ) -> Result<Transaction> {
        debug_assert_eq!(new_tx.direction, DIRECTION_CREDIT);

        let snapshot = self.snapshot(tx, wallet).await?;
        check_credit(&snapshot, new_tx.amount)?;

        let net = net_amount(new_tx.amount, new_tx.provider_fee, new_tx.platform_fee);

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                total_credited = total_credited + $2,
                last_transaction_at = $3,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(wallet.id)
        .bind(net)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        let transaction = self.record_transaction(tx, new_tx).await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::WALLET_CREDITED,
                actor,
                entity_type: "wallet",
                entity_id: Some(wallet.id),
                details: json!({
                    "transaction_id": transaction.id,
                    "amount": transaction.amount,
                    "net_amount": net,
                    "balance_before": snapshot.balance,
                    "balance_after": snapshot.balance + net,
                }),
            },
        )
        .await?;

        Ok(transaction)
    }

    /// Debit a locked wallet. Guard failures surface as domain errors;
    /// the caller rolls back and records the rejection separately.
    pub async fn debit(
        &self,
        tx: &mut PgTx<'_>,
        wallet: &Wallet,
        actor: Actor,
        new_tx: NewTransaction,
    ) -> Result<Transaction> {
        debug_assert_eq!(new_tx.direction, DIRECTION_DEBIT);

        let snapshot = self.snapshot(tx, wallet).await?;
        check_debit(&snapshot, new_tx.amount)?;

        let amount = new_tx.amount;

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance - $2,
                total_debited = total_debited + $2,
                last_transaction_at = $3,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(wallet.id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        let transaction = self.record_transaction(tx, new_tx).await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::WALLET_DEBITED,
                actor,
                entity_type: "wallet",
                entity_id: Some(wallet.id),
                details: json!({
                    "transaction_id": transaction.id,
                    "amount": amount,
                    "balance_before": snapshot.balance,
                    "balance_after": snapshot.balance - amount,
                }),
            },
        )
        .await?;

        Ok(transaction)
    }

    /// Insert one transaction row; `net_amount` is derived from the
    /// gross amount and fees, never supplied by the caller.
    pub async fn record_transaction(
        &self,
        tx: &mut PgTx<'_>,
        new_tx: NewTransaction,
    ) -> Result<Transaction> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let reference = generate_reference(new_tx.transaction_type);
        let net = net_amount(new_tx.amount, new_tx.provider_fee, new_tx.platform_fee);
        let completed_at = match new_tx.status {
            PaymentStatus::Completed => Some(now),
            _ => None,
        };
        // Internal movements settle the moment they complete; captures
        // held at a provider stay pending until settlement runs.
        let (settlement_status, settled_at) =
            if new_tx.provider_reference.is_none() && completed_at.is_some() {
                (SettlementStatus::Completed, Some(now))
            } else {
                (SettlementStatus::Pending, None)
            };

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id, reference, wallet_id, payer_id, payee_id,
                transaction_type, direction, amount, currency,
                provider_fee, platform_fee, net_amount,
                status, settlement_status, settled_at,
                payment_method, provider_reference,
                parent_transaction_id, order_id, escrow_id, description,
                completed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $23)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&reference)
        .bind(new_tx.wallet_id)
        .bind(new_tx.payer_id)
        .bind(new_tx.payee_id)
        .bind(new_tx.transaction_type.as_str())
        .bind(new_tx.direction)
        .bind(new_tx.amount)
        .bind(&self.settings.currency)
        .bind(new_tx.provider_fee.unwrap_or(Decimal::ZERO))
        .bind(new_tx.platform_fee.unwrap_or(Decimal::ZERO))
        .bind(net)
        .bind(new_tx.status.as_str())
        .bind(settlement_status.as_str())
        .bind(settled_at)
        .bind(new_tx.payment_method.as_deref())
        .bind(new_tx.provider_reference.as_deref())
        .bind(new_tx.parent_transaction_id)
        .bind(new_tx.order_id)
        .bind(new_tx.escrow_id)
        .bind(new_tx.description.as_deref())
        .bind(completed_at)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::TRANSACTION_CREATED,
                actor: Actor::system(),
                entity_type: "transaction",
                entity_id: Some(transaction.id),
                details: json!({
                    "reference": reference,
                    "type": transaction.transaction_type,
                    "amount": transaction.amount,
                    "net_amount": transaction.net_amount,
                }),
            },
        )
        .await?;

        Ok(transaction)
    }

    /// Wallet plus recent activity, read outside any unit of work.
    pub async fn wallet_with_history(
        &self,
        pool: &sqlx::PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<(Wallet, Vec<Transaction>)> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(PaymentsError::WalletNotFound(user_id))?;

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(wallet.id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok((wallet, transactions))
    }

    /// Suspend, block, or reactivate a wallet. Suspended and blocked
    /// wallets fail the ledger guards until reactivated.
    pub async fn set_wallet_status(
        &self,
        tx: &mut PgTx<'_>,
        user_id: Uuid,
        status: WalletStatus,
        reason: Option<String>,
        actor: Actor,
    ) -> Result<Wallet> {
        let wallet = self.lock_wallet(tx, user_id).await?;
        let previous = wallet.status.clone();

        let reason = match status {
            WalletStatus::Active => None,
            _ => reason,
        };
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET status = $2, suspension_reason = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(wallet.id)
        .bind(status.as_str())
        .bind(reason.as_deref())
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::WALLET_STATUS_CHANGED,
                actor,
                entity_type: "wallet",
                entity_id: Some(wallet.id),
                details: json!({
                    "from": previous,
                    "to": status.as_str(),
                    "reason": reason,
                }),
            },
        )
        .await?;

        info!("Wallet {} status changed to {}", wallet.id, status);
        Ok(wallet)
    }
}

/// Human-scannable reference: type prefix, UTC date, random tail.
fn generate_reference(transaction_type: TransactionType) -> String {
    let prefix = match transaction_type {
        TransactionType::Payment => "PAY",
        TransactionType::Refund => "RFD",
        TransactionType::Withdrawal => "WDL",
        TransactionType::Deposit => "DEP",
        TransactionType::Transfer => "TRF",
        TransactionType::Fee => "FEE",
    };
    let date = Utc::now().format("%Y%m%d");
    let tail = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, date, &tail[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let r = generate_reference(TransactionType::Payment);
        let parts: Vec<&str> = r.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PAY");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_references_are_unique() {
        let a = generate_reference(TransactionType::Refund);
        let b = generate_reference(TransactionType::Refund);
        assert_ne!(a, b);
        assert!(a.starts_with("RFD-"));
    }
}
