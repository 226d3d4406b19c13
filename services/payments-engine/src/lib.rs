//! AgroMarket Payments Engine
//!
//! Service crate for the escrow-backed payment subsystem: checkout
//! orchestration, escrow lifecycle, wallet ledger, and the append-only
//! audit trail, persisted in Postgres with one `sqlx` transaction per
//! logical operation.

pub mod audit;
pub mod checkout;
pub mod config;
pub mod database;
pub mod errors;
pub mod escrow;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod sweeper;

pub use config::Config;
pub use database::Database;
pub use errors::{PaymentsError, Result};
