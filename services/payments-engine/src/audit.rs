//! Append-only audit trail
//!
//! Every state-changing operation writes its audit rows inside the same
//! unit of work as the rows it changes, so an audit entry exists exactly
//! when the change it describes was committed. Rejected attempts are the
//! one exception: they are recorded in their own short transaction at
//! the service boundary, after the failing unit of work has rolled back.

use crate::database::PgTx;
use crate::errors::Result;
use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

pub const WALLET_CREATED: &str = "wallet.created";
pub const WALLET_STATUS_CHANGED: &str = "wallet.status_changed";
pub const WALLET_CREDITED: &str = "wallet.credited";
pub const WALLET_DEBITED: &str = "wallet.debited";
pub const WALLET_DEBIT_REJECTED: &str = "wallet.debit_rejected";
pub const WALLET_CREDIT_REJECTED: &str = "wallet.credit_rejected";
pub const TRANSACTION_CREATED: &str = "transaction.created";
pub const ESCROW_CREATED: &str = "escrow.created";
pub const ESCROW_STATUS_CHANGED: &str = "escrow.status_changed";
pub const ESCROW_DISPUTED: &str = "escrow.disputed";
pub const ESCROW_RESOLVED: &str = "escrow.resolved";
pub const ESCROW_EXPIRED: &str = "escrow.expired";
pub const ORDER_CREATED: &str = "order.created";
pub const CHECKOUT_REJECTED: &str = "checkout.rejected";
pub const ORDER_PAID: &str = "order.paid";
pub const ORDER_REFUNDED: &str = "order.refunded";

/// Who performed the action.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub role: String,
}

impl Actor {
    pub fn user(id: Uuid) -> Self {
        Actor {
            id: Some(id),
            role: "user".to_string(),
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Actor {
            id: Some(id),
            role: "admin".to_string(),
        }
    }

    /// Scheduled jobs and other non-interactive callers.
    pub fn system() -> Self {
        Actor {
            id: None,
            role: "system".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct AuditEvent<'a> {
    pub action: &'a str,
    pub actor: Actor,
    pub entity_type: &'a str,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Insert an audit row inside the caller's unit of work.
pub async fn record(tx: &mut PgTx<'_>, event: AuditEvent<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, actor_id, actor_role, entity_type, entity_id, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.action)
    .bind(event.actor.id)
    .bind(&event.actor.role)
    .bind(event.entity_type)
    .bind(event.entity_id)
    .bind(&event.details)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Record a rejected attempt in its own transaction.
///
/// Runs after the failing unit of work rolled back, so the rejection
/// survives while the attempted change does not. A failure here is
/// logged and swallowed: the caller's error is the one that matters.
pub async fn record_rejection(
    pool: &PgPool,
    action: &str,
    actor: Actor,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: serde_json::Value,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, actor_id, actor_role, entity_type, entity_id, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(action)
    .bind(actor.id)
    .bind(&actor.role)
    .bind(entity_type)
    .bind(entity_id)
    .bind(&details)
    .bind(Utc::now())
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!("Failed to record rejection audit entry for {}: {}", action, e);
    }
}
