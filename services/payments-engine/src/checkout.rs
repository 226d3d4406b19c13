//! Checkout orchestration
//!
//! One unit of work per checkout: lock the cart, validate the lines,
//! write the order, open the escrow, and initiate the capture with the
//! payment provider. A failure at any step, including the provider call,
//! rolls the whole checkout back; no half-created orders survive.

use crate::audit::{self, Actor, AuditEvent};
use crate::config::PaymentsConfig;
use crate::database::{Database, PgTx};
use crate::errors::{PaymentsError, Result};
use crate::escrow::EscrowService;
use crate::events::EventPublisher;
use crate::ledger::{LedgerService, NewTransaction, DIRECTION_DEBIT};
use crate::models::{
    Cart, CartItemDetail, CheckoutRequest, CheckoutResponse, Order, OrderItem,
    VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::provider::{CaptureRequest, CaptureStatus, PaymentProvider};
use chrono::Utc;
use escrow_core::checkout::{compute_totals, validate_address, validate_lines, CartLine};
use escrow_core::types::{
    CartStatus, EscrowKind, OrderPaymentStatus, OrderStatus, PaymentMethod, PaymentStatus,
    TransactionType, WalletType,
};
use escrow_core::Error as DomainError;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct CheckoutService {
    db: Database,
    ledger: LedgerService,
    escrow: EscrowService,
    provider: Arc<dyn PaymentProvider>,
    events: EventPublisher,
    settings: PaymentsConfig,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        ledger: LedgerService,
        escrow: EscrowService,
        provider: Arc<dyn PaymentProvider>,
        events: EventPublisher,
        settings: PaymentsConfig,
    ) -> Self {
        CheckoutService {
            db,
            ledger,
            escrow,
            provider,
            events,
            settings,
        }
    }

    /// Check out the user's active cart.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutResponse> {
        let method = PaymentMethod::from_str(&request.payment_method)
            .ok_or(DomainError::MissingPaymentMethod)?;
        validate_address(&request.delivery_address).map_err(PaymentsError::from)?;

        let result = self.run_checkout(&request, method).await;

        // The failing unit of work rolled back; record the rejected
        // attempt so disputes about "my order disappeared" are answerable.
        if let Err(PaymentsError::Domain(e)) = &result {
            let action = match e {
                DomainError::InsufficientFunds { .. }
                | DomainError::SingleLimitExceeded { .. }
                | DomainError::DailyLimitExceeded { .. }
                | DomainError::WalletInactive(_) => audit::WALLET_DEBIT_REJECTED,
                _ => audit::CHECKOUT_REJECTED,
            };
            audit::record_rejection(
                self.db.pool(),
                action,
                Actor::user(request.user_id),
                "cart",
                None,
                json!({ "reason": e.to_string(), "payment_method": method.as_str() }),
            )
            .await;
        }

        let response = result?;

        self.events
            .order_created(
                response.order.id,
                response.order.buyer_id,
                response.order.seller_id,
                response.order.total,
            )
            .await;
        self.events
            .notify(
                response.order.seller_id,
                "order_received",
                &format!("New order {} received", response.order.order_number),
            )
            .await;
        self.events
            .notify(
                response.order.buyer_id,
                "order_confirmed",
                &format!("Your order {} has been placed", response.order.order_number),
            )
            .await;

        Ok(response)
    }

    async fn run_checkout(
        &self,
        request: &CheckoutRequest,
        method: PaymentMethod,
    ) -> Result<CheckoutResponse> {
        if method == PaymentMethod::BankTransfer {
            return Err(PaymentsError::Validation(
                "bank transfers are not accepted at checkout".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT * FROM carts
            WHERE user_id = $1 AND status = $2
            FOR UPDATE
            "#,
        )
        .bind(request.user_id)
        .bind(CartStatus::Active.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::EmptyCart)?;
        let cart_id = cart.id;

        // Product rows are locked too so the stock decrement below cannot
        // race a concurrent checkout of the same product.
        let details: Vec<CartItemDetail> = sqlx::query_as(
            r#"
            SELECT ci.product_id, p.seller_id, p.name AS product_name,
                   p.active AS product_active, p.available_quantity,
                   ci.quantity, ci.price_at_add
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at
            FOR UPDATE OF p
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        let lines: Vec<CartLine> = details
            .iter()
            .map(|d| CartLine {
                product_id: d.product_id,
                seller_id: d.seller_id,
                product_name: d.product_name.clone(),
                product_active: d.product_active,
                available_quantity: d.available_quantity,
                quantity: d.quantity,
                price_at_add: d.price_at_add,
            })
            .collect();

        let seller_id = validate_lines(&lines).map_err(PaymentsError::from)?;
        let totals = compute_totals(&lines, self.settings.delivery_fee);

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, order_number, buyer_id, seller_id, status, payment_status,
                payment_method, subtotal, delivery_fee, total, currency,
                item_count, delivery_address, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(&order_number)
        .bind(request.user_id)
        .bind(seller_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(OrderPaymentStatus::Pending.as_str())
        .bind(method.as_str())
        .bind(totals.subtotal)
        .bind(totals.delivery_fee)
        .bind(totals.total)
        .bind(&self.settings.currency)
        .bind(totals.item_count)
        .bind(serde_json::to_value(&request.delivery_address)?)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, quantity,
                    price_at_purchase, line_total, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.price_at_add)
            .bind(line.price_at_add * Decimal::from(line.quantity))
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);

            if line.available_quantity.is_some() {
                sqlx::query(
                    r#"
                    UPDATE products
                    SET available_quantity = available_quantity - $2, updated_at = $3
                    WHERE id = $1
                    "#,
                )
                .bind(line.product_id)
                .bind(line.quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        let escrow = if method.skips_escrow() {
            None
        } else {
            let escrow = self
                .escrow
                .open(
                    &mut tx,
                    EscrowKind::Order,
                    totals.total,
                    request.user_id,
                    seller_id,
                    Some(order_id),
                    None,
                    Actor::user(request.user_id),
                )
                .await?;
            sqlx::query("UPDATE orders SET escrow_id = $2 WHERE id = $1")
                .bind(order_id)
                .bind(escrow.id)
                .execute(&mut *tx)
                .await?;
            Some(escrow)
        };

        let payment_reference = match method {
            PaymentMethod::MobileMoneyMtn | PaymentMethod::MobileMoneyOrange => {
                // Inside the unit of work on purpose: a gateway failure
                // rolls back the order, items, and escrow together.
                let capture = self
                    .provider
                    .initiate(&CaptureRequest {
                        order_id,
                        amount: totals.total,
                        currency: self.settings.currency.clone(),
                        payment_method: method.as_str().to_string(),
                        phone_number: request.phone_number.clone(),
                        description: format!("Order {}", order_number),
                    })
                    .await?;

                sqlx::query("UPDATE orders SET payment_reference = $2 WHERE id = $1")
                    .bind(order_id)
                    .bind(&capture.reference)
                    .execute(&mut *tx)
                    .await?;
                Some(capture.reference)
            }
            PaymentMethod::Wallet => {
                self.pay_from_wallet(&mut tx, &order, escrow.as_ref().map(|e| e.id))
                    .await?;
                None
            }
            _ => None,
        };

        sqlx::query("UPDATE carts SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(cart_id)
            .bind(CartStatus::CheckedOut.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut tx,
            AuditEvent {
                action: audit::ORDER_CREATED,
                actor: Actor::user(request.user_id),
                entity_type: "order",
                entity_id: Some(order_id),
                details: json!({
                    "order_number": order_number,
                    "seller_id": seller_id,
                    "total": totals.total,
                    "item_count": totals.item_count,
                    "payment_method": method.as_str(),
                    "escrow_id": escrow.as_ref().map(|e| e.id),
                }),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            "Checkout complete: order {} ({} items, {} {})",
            order_number, totals.item_count, totals.total, self.settings.currency
        );

        // Re-read the final order state outside the closed transaction
        let order = self.get_order(order_id).await?;

        Ok(CheckoutResponse {
            escrow_id: escrow.map(|e| e.id),
            payment_reference,
            order,
            items,
        })
    }

    /// Wallet payment settles immediately: debit the buyer and fund the
    /// escrow in the same unit of work as the order itself.
    async fn pay_from_wallet(
        &self,
        tx: &mut PgTx<'_>,
        order: &Order,
        escrow_id: Option<Uuid>,
    ) -> Result<()> {
        let wallet = self
            .ledger
            .lock_or_create_wallet(tx, order.buyer_id, WalletType::Buyer)
            .await?;

        let mut payment = NewTransaction::new(
            wallet.id,
            TransactionType::Payment,
            DIRECTION_DEBIT,
            order.total,
        );
        payment.payer_id = Some(order.buyer_id);
        payment.payee_id = Some(order.seller_id);
        payment.payment_method = Some(PaymentMethod::Wallet.as_str().to_string());
        payment.order_id = Some(order.id);
        payment.escrow_id = escrow_id;
        payment.description = Some(format!("Payment for order {}", order.order_number));
        let funding = self
            .ledger
            .debit(tx, &wallet, Actor::user(order.buyer_id), payment)
            .await?;

        if let Some(escrow_id) = escrow_id {
            let escrow = self.escrow.lock(tx, escrow_id).await?;
            self.escrow
                .fund(tx, &escrow, &funding, Actor::user(order.buyer_id))
                .await?;
        }

        self.mark_paid(tx, order.id).await?;
        Ok(())
    }

    /// Confirm a pending mobile-money capture and fund the escrow.
    ///
    /// Idempotent: verifying an already-paid order returns its current
    /// state without touching the ledger.
    pub async fn verify_payment(
        &self,
        request: VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse> {
        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(request.order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PaymentsError::OrderNotFound(request.order_id))?;

        if OrderPaymentStatus::from_str(&order.payment_status) == Some(OrderPaymentStatus::Paid) {
            let escrow_status = match order.escrow_id {
                Some(id) => Some(self.escrow.lock(&mut tx, id).await?.status),
                None => None,
            };
            tx.commit().await?;
            return Ok(VerifyPaymentResponse {
                order_id: order.id,
                payment_status: order.payment_status,
                escrow_status,
            });
        }

        let reference = order
            .payment_reference
            .clone()
            .filter(|r| *r == request.transaction_reference)
            .ok_or_else(|| {
                PaymentsError::TransactionNotFound(request.transaction_reference.clone())
            })?;

        let capture = self.provider.status(&reference).await?;
        if capture.status != CaptureStatus::Completed {
            return Err(PaymentsError::PaymentNotCompleted(reference));
        }

        // The capture settled externally; record it against the buyer's
        // wallet without moving the wallet balance.
        let buyer_wallet = self
            .ledger
            .get_or_create_wallet(&mut tx, order.buyer_id, WalletType::Buyer)
            .await?;
        let mut funding = NewTransaction::new(
            buyer_wallet.id,
            TransactionType::Payment,
            DIRECTION_DEBIT,
            order.total,
        );
        funding.payer_id = Some(order.buyer_id);
        funding.payee_id = Some(order.seller_id);
        funding.provider_fee = capture.provider_fee;
        funding.status = PaymentStatus::Completed;
        funding.payment_method = Some(order.payment_method.clone());
        funding.provider_reference = Some(reference.clone());
        funding.order_id = Some(order.id);
        funding.escrow_id = order.escrow_id;
        funding.description = Some(format!("Payment for order {}", order.order_number));
        let funding = self.ledger.record_transaction(&mut tx, funding).await?;

        let escrow_status = if order.escrow_id.is_some() {
            let escrow = self.escrow.lock_by_order(&mut tx, order.id).await?;
            let escrow = self
                .escrow
                .fund(&mut tx, &escrow, &funding, Actor::user(order.buyer_id))
                .await?;
            Some(escrow.status)
        } else {
            None
        };

        self.mark_paid(&mut tx, order.id).await?;
        tx.commit().await?;

        self.events
            .payment_confirmed(order.id, order.escrow_id, order.total)
            .await;
        self.events
            .notify(
                order.buyer_id,
                "payment_confirmed",
                &format!("Payment for order {} confirmed", order.order_number),
            )
            .await;

        Ok(VerifyPaymentResponse {
            order_id: order.id,
            payment_status: OrderPaymentStatus::Paid.as_str().to_string(),
            escrow_status,
        })
    }

    async fn mark_paid(&self, tx: &mut PgTx<'_>, order_id: Uuid) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = $2, status = $3, paid_at = $4, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(OrderPaymentStatus::Paid.as_str())
        .bind(OrderStatus::Confirmed.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await?;

        audit::record(
            tx,
            AuditEvent {
                action: audit::ORDER_PAID,
                actor: Actor::system(),
                entity_type: "order",
                entity_id: Some(order_id),
                details: json!({}),
            },
        )
        .await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(PaymentsError::OrderNotFound(order_id))
    }

    pub async fn get_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        Ok(sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(self.db.pool())
        .await?)
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE (buyer_id = $1 OR seller_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.db.pool())
        .await?)
    }
}

/// Order number: UTC date plus a random tail, unique enough for support
/// conversations without leaking volume.
fn generate_order_number() -> String {
    let tail = Uuid::new_v4().simple().to_string();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), &tail[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let n = generate_order_number();
        assert!(n.starts_with("ORD-"));
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_order_numbers_unique() {
        assert_ne!(generate_order_number(), generate_order_number());
    }
}
