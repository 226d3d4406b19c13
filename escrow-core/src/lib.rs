//! AgroMarket Escrow Core
//!
//! Domain layer for the escrow-backed payment and wallet ledger:
//! the escrow lifecycle state machine, commission arithmetic, wallet
//! debit/credit guards, and checkout validation. Pure logic only — all
//! persistence and I/O lives in `payments-engine`.
//!
//! # Invariants
//!
//! - Wallet balance never goes negative; violating operations are rejected
//! - Commission is derived from amount × rate and frozen at escrow creation
//! - Escrow status only moves along the transition table in [`state`]
//! - A released escrow releases exactly once; retries are no-ops

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod checkout;
pub mod commission;
pub mod error;
pub mod ledger;
pub mod state;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    CartStatus, DeliveryAddress, DisputeDecision, EscrowKind, EscrowStatus, OrderPaymentStatus,
    OrderStatus, PaymentMethod, PaymentStatus, SettlementStatus, TransactionType,
    VerificationLevel, WalletStatus, WalletType,
};
