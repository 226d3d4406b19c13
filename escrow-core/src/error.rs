//! Domain errors for escrow, ledger, and checkout operations

use crate::types::{EscrowStatus, WalletStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for domain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors
///
/// Validation errors are recoverable by the caller correcting input;
/// business-rule violations carry enough detail to adjust the request;
/// invariant violations are fatal to the operation and never clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Amount must be strictly positive
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Debit would push the wallet balance below zero
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// Operation exceeds the wallet's single-transaction limit
    #[error("Single transaction limit exceeded: amount {amount}, limit {limit}")]
    SingleLimitExceeded { amount: Decimal, limit: Decimal },

    /// Operation exceeds the wallet's daily limit
    #[error("Daily limit exceeded: today {today} + amount {amount} > limit {limit}")]
    DailyLimitExceeded {
        today: Decimal,
        amount: Decimal,
        limit: Decimal,
    },

    /// Wallet is suspended or blocked
    #[error("Wallet is not active: {0}")]
    WalletInactive(WalletStatus),

    /// Transition not permitted by the escrow state machine
    #[error("Invalid escrow transition: {from} -> {to}")]
    InvalidTransition {
        from: EscrowStatus,
        to: EscrowStatus,
    },

    /// Escrow has no completed funding transaction where one is required
    #[error("Escrow is not funded (status {0})")]
    NotFunded(EscrowStatus),

    /// Funding amount must equal the escrow amount exactly (no partial funding)
    #[error("Funding amount {actual} does not match escrow amount {expected}")]
    AmountMismatch { expected: Decimal, actual: Decimal },

    /// A release condition stored on the escrow has not been satisfied
    #[error("Release condition not met: {condition}")]
    ReleaseConditionUnmet { condition: &'static str },

    /// Cart is missing or has no items
    #[error("Cart is empty")]
    EmptyCart,

    /// Delivery address is missing a required field
    #[error("Incomplete delivery address: missing {0}")]
    InvalidAddress(&'static str),

    /// No payment method supplied
    #[error("Payment method required")]
    MissingPaymentMethod,

    /// Product is no longer purchasable
    #[error("Product \"{name}\" is no longer available")]
    ProductUnavailable { name: String },

    /// Requested quantity exceeds available stock
    #[error("Insufficient stock for \"{name}\": available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Cart mixes items from more than one seller
    #[error("Cart contains items from {sellers} sellers; orders are single-seller")]
    MultiSellerCheckout { sellers: usize },

    /// Unknown status or enum value read from the store
    #[error("Unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: String },

    /// Schema-level validation failure
    #[error("Validation error: {0}")]
    Validation(String),
}
