use crate::audit::Actor;
use crate::checkout::CheckoutService;
use crate::database::Database;
use crate::errors::PaymentsError;
use crate::escrow::EscrowService;
use crate::ledger::LedgerService;
use crate::metrics;
use crate::models::{
    CheckoutRequest, DisputeRequest, EscrowResponse, FundEscrowRequest, ListOrdersQuery,
    ReleaseEscrowRequest, ResolveDisputeRequest, UpdateWalletStatusRequest, VerifyPaymentRequest,
    WalletResponse,
};
use actix_web::{web, HttpResponse};
use escrow_core::types::{DisputeDecision, OrderStatus, WalletStatus};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Health check endpoint
pub async fn health_check(db: web::Data<Database>) -> HttpResponse {
    match db.health_check().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "payments-engine",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "error": e.to_string()
        })),
    }
}

/// Checkout endpoint
pub async fn checkout(
    service: web::Data<Arc<CheckoutService>>,
    request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let result = service.checkout(request.into_inner()).await;

    match &result {
        Ok(response) => {
            metrics::ORDERS_CREATED.inc();
            metrics::ORDER_VALUE.observe(response.order.total.to_f64().unwrap_or(0.0));
        }
        Err(PaymentsError::Domain(e)) => {
            metrics::CHECKOUTS_REJECTED
                .with_label_values(&[rejection_label(e)])
                .inc();
        }
        Err(_) => {}
    }

    Ok(HttpResponse::Created().json(result?))
}

fn rejection_label(e: &escrow_core::Error) -> &'static str {
    use escrow_core::Error;
    match e {
        Error::EmptyCart => "empty_cart",
        Error::MultiSellerCheckout { .. } => "multi_seller",
        Error::InsufficientStock { .. } => "stock",
        Error::ProductUnavailable { .. } => "unavailable",
        Error::InvalidAddress(_) => "address",
        Error::InsufficientFunds { .. } => "funds",
        Error::SingleLimitExceeded { .. } | Error::DailyLimitExceeded { .. } => "limits",
        _ => "other",
    }
}

/// Verify a pending mobile-money payment
pub async fn verify_payment(
    service: web::Data<Arc<CheckoutService>>,
    request: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let response = service.verify_payment(request.into_inner()).await?;
    metrics::PAYMENTS_CONFIRMED.inc();
    Ok(HttpResponse::Ok().json(response))
}

/// Fetch one order with its items
pub async fn get_order(
    service: web::Data<Arc<CheckoutService>>,
    order_id: web::Path<Uuid>,
) -> Result<HttpResponse, PaymentsError> {
    let order = service.get_order(*order_id).await?;
    let items = service.get_order_items(*order_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "order": order, "items": items })))
}

/// List a user's orders (as buyer or seller), optionally filtered by
/// fulfillment status
pub async fn list_orders(
    service: web::Data<Arc<CheckoutService>>,
    user_id: web::Path<Uuid>,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, PaymentsError> {
    let status = match query.status.as_deref() {
        Some(s) => Some(OrderStatus::from_str(s).ok_or_else(|| {
            PaymentsError::Validation(format!("unknown order status \"{}\"", s))
        })?),
        None => None,
    };
    let orders = service.list_orders(*user_id, status).await?;
    let count = orders.len();
    Ok(HttpResponse::Ok().json(json!({ "orders": orders, "count": count })))
}

/// Fetch one escrow account
pub async fn get_escrow(
    service: web::Data<Arc<EscrowService>>,
    escrow_id: web::Path<Uuid>,
) -> Result<HttpResponse, PaymentsError> {
    let escrow = service.get(*escrow_id).await?;
    Ok(HttpResponse::Ok().json(EscrowResponse { escrow }))
}

/// Fund an escrow from a completed transaction
pub async fn fund_escrow(
    service: web::Data<Arc<EscrowService>>,
    escrow_id: web::Path<Uuid>,
    request: web::Json<FundEscrowRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let escrow = service
        .fund_from_transaction(*escrow_id, request.funding_transaction_id, Actor::system())
        .await?;
    Ok(HttpResponse::Ok().json(EscrowResponse { escrow }))
}

/// Release an escrow to its counterparty
pub async fn release_escrow(
    service: web::Data<Arc<EscrowService>>,
    escrow_id: web::Path<Uuid>,
    request: web::Json<ReleaseEscrowRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let actor = match request.released_by {
        Some(user_id) => Actor::user(user_id),
        None => Actor::system(),
    };
    let outcome = service.release(*escrow_id, actor).await?;
    if outcome.performed {
        metrics::ESCROWS_RELEASED.inc();
    }
    Ok(HttpResponse::Ok().json(json!({
        "escrow": outcome.escrow,
        "release_transaction_id": outcome.release_transaction_id,
        "already_released": !outcome.performed,
    })))
}

/// Raise a dispute against a funded escrow
pub async fn dispute_escrow(
    service: web::Data<Arc<EscrowService>>,
    escrow_id: web::Path<Uuid>,
    request: web::Json<DisputeRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let escrow = service
        .dispute(*escrow_id, request.raised_by, &request.reason)
        .await?;
    Ok(HttpResponse::Ok().json(EscrowResponse { escrow }))
}

/// Resolve a disputed escrow by admin decision
pub async fn resolve_escrow(
    service: web::Data<Arc<EscrowService>>,
    escrow_id: web::Path<Uuid>,
    request: web::Json<ResolveDisputeRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let request = request.into_inner();
    let decision = DisputeDecision::from_str(&request.decision).ok_or_else(|| {
        PaymentsError::Validation(format!(
            "decision must be \"release\" or \"refund\", got \"{}\"",
            request.decision
        ))
    })?;

    let escrow = service
        .resolve(*escrow_id, decision, request.resolved_by, request.notes)
        .await?;

    match decision {
        DisputeDecision::Release => metrics::ESCROWS_RELEASED.inc(),
        DisputeDecision::Refund => metrics::ESCROWS_REFUNDED.inc(),
    }

    Ok(HttpResponse::Ok().json(EscrowResponse { escrow }))
}

/// Refund an escrow to the buyer
pub async fn refund_escrow(
    service: web::Data<Arc<EscrowService>>,
    escrow_id: web::Path<Uuid>,
) -> Result<HttpResponse, PaymentsError> {
    let escrow = service.refund(*escrow_id, Actor::system()).await?;
    metrics::ESCROWS_REFUNDED.inc();
    Ok(HttpResponse::Ok().json(EscrowResponse { escrow }))
}

/// Wallet with recent transactions
pub async fn get_wallet(
    db: web::Data<Database>,
    ledger: web::Data<Arc<LedgerService>>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, PaymentsError> {
    let (wallet, recent_transactions) =
        ledger.wallet_with_history(db.pool(), *user_id, 20).await?;
    Ok(HttpResponse::Ok().json(WalletResponse {
        wallet,
        recent_transactions,
    }))
}

/// Suspend, block, or reactivate a wallet (admin)
pub async fn update_wallet_status(
    db: web::Data<Database>,
    ledger: web::Data<Arc<LedgerService>>,
    user_id: web::Path<Uuid>,
    request: web::Json<UpdateWalletStatusRequest>,
) -> Result<HttpResponse, PaymentsError> {
    let request = request.into_inner();
    let status = WalletStatus::from_str(&request.status).ok_or_else(|| {
        PaymentsError::Validation(format!(
            "status must be \"active\", \"suspended\", or \"blocked\", got \"{}\"",
            request.status
        ))
    })?;

    let mut tx = db.begin().await?;
    let wallet = ledger
        .set_wallet_status(
            &mut tx,
            *user_id,
            status,
            request.reason,
            Actor::admin(request.changed_by),
        )
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({ "wallet": wallet })))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/checkout", web::post().to(checkout))
            .route("/payments/verify", web::post().to(verify_payment))
            .route("/orders/{order_id}", web::get().to(get_order))
            .route("/users/{user_id}/orders", web::get().to(list_orders))
            .route("/escrow/{escrow_id}", web::get().to(get_escrow))
            .route("/escrow/{escrow_id}/fund", web::post().to(fund_escrow))
            .route("/escrow/{escrow_id}/release", web::post().to(release_escrow))
            .route("/escrow/{escrow_id}/dispute", web::post().to(dispute_escrow))
            .route("/escrow/{escrow_id}/resolve", web::post().to(resolve_escrow))
            .route("/escrow/{escrow_id}/refund", web::post().to(refund_escrow))
            .route("/wallets/{user_id}", web::get().to(get_wallet))
            .route("/wallets/{user_id}/status", web::post().to(update_wallet_status)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
