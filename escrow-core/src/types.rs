//! Core types shared by the ledger, escrow, and checkout components
//!
//! Statuses are persisted as text and surfaced as enums with
//! `as_str`/`from_str` round-trips. Monetary values are exact decimals
//! with two minor-unit digits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Escrow account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Created at checkout, waiting for the buyer's deposit
    AwaitingDeposit,
    /// Funding transaction completed; funds held in trust
    Funded,
    /// Release in progress (transactions being written)
    Releasing,
    /// Funds released to seller and platform (terminal)
    Released,
    /// A party raised a dispute; automatic transitions frozen
    Disputed,
    /// Refund in progress
    Refunding,
    /// Funds returned to the buyer (terminal)
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::AwaitingDeposit => "awaiting_deposit",
            EscrowStatus::Funded => "funded",
            EscrowStatus::Releasing => "releasing",
            EscrowStatus::Released => "released",
            EscrowStatus::Disputed => "disputed",
            EscrowStatus::Refunding => "refunding",
            EscrowStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "awaiting_deposit" => Some(EscrowStatus::AwaitingDeposit),
            "funded" => Some(EscrowStatus::Funded),
            "releasing" => Some(EscrowStatus::Releasing),
            "released" => Some(EscrowStatus::Released),
            "disputed" => Some(EscrowStatus::Disputed),
            "refunding" => Some(EscrowStatus::Refunding),
            "refunded" => Some(EscrowStatus::Refunded),
            _ => None,
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which fee schedule an escrow is created under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowKind {
    /// Marketplace order between buyer and seller
    Order,
    /// Expert consultation engagement
    Consultation,
}

impl EscrowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowKind::Order => "order",
            EscrowKind::Consultation => "consultation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "order" => Some(EscrowKind::Order),
            "consultation" => Some(EscrowKind::Consultation),
            _ => None,
        }
    }
}

impl fmt::Display for EscrowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    Refund,
    Withdrawal,
    Deposit,
    Transfer,
    Fee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
            TransactionType::Transfer => "transfer",
            TransactionType::Fee => "fee",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(TransactionType::Payment),
            "refund" => Some(TransactionType::Refund),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "deposit" => Some(TransactionType::Deposit),
            "transfer" => Some(TransactionType::Transfer),
            "fee" => Some(TransactionType::Fee),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment processing status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement status of a completed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Completed,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Completed => "completed",
            SettlementStatus::Failed => "failed",
        }
    }
}

/// Supported payment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoneyMtn,
    MobileMoneyOrange,
    CashOnDelivery,
    BankTransfer,
    Wallet,
    /// Internal movements (escrow release, fees, refunds)
    System,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoneyMtn => "mobile_money_mtn",
            PaymentMethod::MobileMoneyOrange => "mobile_money_orange",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::System => "system",
        }
    }

    /// Parse either the stored form or the short client aliases
    /// ("mtn", "orange") used by the checkout API.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mobile_money_mtn" | "mtn" => Some(PaymentMethod::MobileMoneyMtn),
            "mobile_money_orange" | "orange" => Some(PaymentMethod::MobileMoneyOrange),
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "wallet" => Some(PaymentMethod::Wallet),
            "system" => Some(PaymentMethod::System),
            _ => None,
        }
    }

    /// Cash-on-delivery orders skip escrow entirely.
    pub fn skips_escrow(&self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wallet administrative status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Active,
    Suspended,
    Blocked,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Suspended => "suspended",
            WalletStatus::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(WalletStatus::Active),
            "suspended" => Some(WalletStatus::Suspended),
            "blocked" => Some(WalletStatus::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wallet role classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    Buyer,
    Seller,
    Expert,
    /// The platform commission account
    Platform,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Buyer => "buyer",
            WalletType::Seller => "seller",
            WalletType::Expert => "expert",
            WalletType::Platform => "platform",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "buyer" => Some(WalletType::Buyer),
            "seller" => Some(WalletType::Seller),
            "expert" => Some(WalletType::Expert),
            "platform" => Some(WalletType::Platform),
            _ => None,
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wallet verification tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    Basic,
    Verified,
    Enhanced,
}

impl VerificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationLevel::Basic => "basic",
            VerificationLevel::Verified => "verified",
            VerificationLevel::Enhanced => "enhanced",
        }
    }
}

/// Order fulfillment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Payment status of an order (distinct from transaction status)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "pending",
            OrderPaymentStatus::Paid => "paid",
            OrderPaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderPaymentStatus::Pending),
            "paid" => Some(OrderPaymentStatus::Paid),
            "refunded" => Some(OrderPaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Cart status; flipping `active -> checked_out` inside the checkout unit
/// of work makes double checkout impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Active,
    CheckedOut,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::CheckedOut => "checked_out",
        }
    }
}

/// Admin decision resolving a disputed escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeDecision {
    /// Release funds to the seller despite the dispute
    Release,
    /// Return funds to the buyer
    Refund,
}

impl DisputeDecision {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "release" => Some(DisputeDecision::Release),
            "refund" => Some(DisputeDecision::Refund),
            _ => None,
        }
    }
}

/// Structured criteria for automatic escrow release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseConditions {
    /// Buyer must confirm delivery before release
    #[serde(default)]
    pub requires_delivery_confirmation: bool,
    /// Consultation must be marked completed before release
    #[serde(default)]
    pub requires_consultation_completion: bool,
}

impl ReleaseConditions {
    /// Default conditions for a marketplace order escrow.
    pub fn for_order() -> Self {
        Self {
            requires_delivery_confirmation: true,
            requires_consultation_completion: false,
        }
    }

    /// Default conditions for an expert consultation escrow.
    pub fn for_consultation() -> Self {
        Self {
            requires_delivery_confirmation: false,
            requires_consultation_completion: true,
        }
    }
}

/// Recorded outcome of a dispute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub decision: DisputeDecision,
    pub resolved_by: Uuid,
    pub notes: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Delivery address captured on the order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub address: String,
    pub city: String,
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "Cameroon".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_status_round_trip() {
        for status in [
            EscrowStatus::AwaitingDeposit,
            EscrowStatus::Funded,
            EscrowStatus::Releasing,
            EscrowStatus::Released,
            EscrowStatus::Disputed,
            EscrowStatus::Refunding,
            EscrowStatus::Refunded,
        ] {
            assert_eq!(EscrowStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(EscrowStatus::from_str("open"), None);
    }

    #[test]
    fn test_payment_method_aliases() {
        assert_eq!(
            PaymentMethod::from_str("mtn"),
            Some(PaymentMethod::MobileMoneyMtn)
        );
        assert_eq!(
            PaymentMethod::from_str("mobile_money_orange"),
            Some(PaymentMethod::MobileMoneyOrange)
        );
        assert!(PaymentMethod::from_str("cash_on_delivery")
            .unwrap()
            .skips_escrow());
        assert!(!PaymentMethod::from_str("wallet").unwrap().skips_escrow());
    }

    #[test]
    fn test_release_conditions_defaults() {
        let order = ReleaseConditions::for_order();
        assert!(order.requires_delivery_confirmation);
        assert!(!order.requires_consultation_completion);

        let consultation = ReleaseConditions::for_consultation();
        assert!(consultation.requires_consultation_completion);
    }
}
