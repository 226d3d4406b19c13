//! Wallet debit/credit guards
//!
//! The persistence layer re-reads the wallet row under a lock, builds a
//! [`WalletSnapshot`], and runs these checks immediately before mutating
//! the balance. Guards never clamp: a violating operation is rejected and
//! the balance stays untouched.

use crate::error::{Error, Result};
use crate::types::WalletStatus;
use rust_decimal::Decimal;

/// Point-in-time view of a wallet, read under a row lock.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSnapshot {
    pub balance: Decimal,
    pub status: WalletStatus,
    pub single_transaction_limit: Decimal,
    pub daily_transaction_limit: Decimal,
    /// Sum of same-day completed debits against this wallet
    pub debited_today: Decimal,
    /// Sum of same-day completed credits to this wallet
    pub credited_today: Decimal,
}

/// Check that `amount` may be debited from the wallet.
pub fn check_debit(wallet: &WalletSnapshot, amount: Decimal) -> Result<()> {
    check_common(wallet, amount, wallet.debited_today)?;

    if wallet.balance - amount < Decimal::ZERO {
        return Err(Error::InsufficientFunds {
            available: wallet.balance,
            requested: amount,
        });
    }

    Ok(())
}

/// Check that `amount` may be credited to the wallet.
pub fn check_credit(wallet: &WalletSnapshot, amount: Decimal) -> Result<()> {
    check_common(wallet, amount, wallet.credited_today)
}

fn check_common(wallet: &WalletSnapshot, amount: Decimal, today: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount(amount));
    }

    if wallet.status != WalletStatus::Active {
        return Err(Error::WalletInactive(wallet.status));
    }

    if amount > wallet.single_transaction_limit {
        return Err(Error::SingleLimitExceeded {
            amount,
            limit: wallet.single_transaction_limit,
        });
    }

    if today + amount > wallet.daily_transaction_limit {
        return Err(Error::DailyLimitExceeded {
            today,
            amount,
            limit: wallet.daily_transaction_limit,
        });
    }

    Ok(())
}
