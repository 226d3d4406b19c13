use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use escrow_core::types::DeliveryAddress;

/// Wallet row. Statuses and types are stored as text; the typed views
/// live in `escrow_core::types`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_type: String,
    pub balance: Decimal,
    /// Funds promised but not yet available (held captures)
    pub pending_balance: Decimal,
    pub currency: String,
    pub status: String,
    pub suspension_reason: Option<String>,
    pub verification_level: String,
    pub single_transaction_limit: Decimal,
    pub daily_transaction_limit: Decimal,
    pub total_credited: Decimal,
    pub total_debited: Decimal,
    pub settings: serde_json::Value,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger transaction row. Refunds point at the transaction they reverse
/// through `parent_transaction_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub wallet_id: Uuid,
    /// Parties to the movement as a historical fact; the wallet row above
    /// is whose balance this entry touches
    pub payer_id: Option<Uuid>,
    pub payee_id: Option<Uuid>,
    pub transaction_type: String,
    /// "debit" or "credit" from the wallet's point of view
    pub direction: String,
    pub amount: Decimal,
    pub currency: String,
    pub provider_fee: Decimal,
    pub platform_fee: Decimal,
    pub net_amount: Decimal,
    pub status: String,
    pub settlement_status: String,
    pub settled_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub provider_reference: Option<String>,
    pub parent_transaction_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub escrow_id: Option<Uuid>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Escrow account row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EscrowAccount {
    pub id: Uuid,
    pub reference: String,
    pub kind: String,
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub buyer_id: Uuid,
    pub counterparty_id: Uuid,
    pub order_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub funding_transaction_id: Option<Uuid>,
    pub release_transaction_id: Option<Uuid>,
    pub refund_transaction_id: Option<Uuid>,
    pub release_conditions: serde_json::Value,
    pub dispute_reason: Option<String>,
    pub disputed_by: Option<Uuid>,
    pub dispute_resolution: Option<serde_json::Value>,
    pub admin_notes: Option<String>,
    pub funded_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Stamped on every status transition; the expiry window is measured
    /// from this, never from `updated_at`
    pub last_status_change: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub item_count: i64,
    pub delivery_address: serde_json::Value,
    pub escrow_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line row with the price frozen at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_purchase: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Cart row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cart item joined with its product, as loaded inside the checkout
/// unit of work.
#[derive(Debug, Clone, FromRow)]
pub struct CartItemDetail {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub product_active: bool,
    pub available_quantity: Option<i64>,
    pub quantity: i64,
    pub price_at_add: Decimal,
}

/// Audit log row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub actor_role: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    /// Mobile-money number the capture is initiated against
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub escrow_id: Option<Uuid>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Optional fulfillment-status filter ("pending", "confirmed", ...)
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    pub transaction_reference: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub order_id: Uuid,
    pub payment_status: String,
    pub escrow_status: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FundEscrowRequest {
    pub funding_transaction_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReleaseEscrowRequest {
    /// Admin or buyer confirming release; system release when absent
    pub released_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DisputeRequest {
    pub raised_by: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResolveDisputeRequest {
    /// "release" or "refund"
    pub decision: String,
    pub resolved_by: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EscrowResponse {
    pub escrow: EscrowAccount,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateWalletStatusRequest {
    /// "active", "suspended", or "blocked"
    pub status: String,
    pub reason: Option<String>,
    pub changed_by: Uuid,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub wallet: Wallet,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub swept: usize,
    pub skipped: usize,
}
